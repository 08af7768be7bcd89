//! Nearest-delta selection per side.

use std::collections::HashMap;
use wheel_scan_core::error::{stage, Result, ScreenError};
use wheel_scan_core::types::GreeksSnapshot;

/// Default absolute delta for wheel entries.
pub const TARGET_DELTA: f64 = 0.30;

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPick {
    pub symbol: String,
    pub delta: f64,
}

impl DeltaPick {
    #[must_use]
    pub fn distance(&self, target: f64) -> f64 {
        (self.delta.abs() - target).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSelection {
    pub put: DeltaPick,
    pub call: DeltaPick,
}

/// Candidate minimising `| |delta| - target |`; symbols without greeks are
/// skipped. Ties keep the first candidate in list order.
#[must_use]
pub fn nearest_delta(
    candidates: &[String],
    greeks: &HashMap<String, GreeksSnapshot>,
    target: f64,
) -> Option<DeltaPick> {
    let mut best: Option<(f64, DeltaPick)> = None;
    for symbol in candidates {
        let Some(g) = greeks.get(symbol) else {
            continue;
        };
        let distance = (g.delta.abs() - target).abs();
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((
                distance,
                DeltaPick {
                    symbol: symbol.clone(),
                    delta: g.delta,
                },
            ));
        }
    }
    best.map(|(_, pick)| pick)
}

/// Picks both sides independently.
///
/// # Errors
/// `InsufficientData` when either side has no candidate with a known delta.
pub fn select(
    puts: &[String],
    calls: &[String],
    greeks: &HashMap<String, GreeksSnapshot>,
    target: f64,
) -> Result<DeltaSelection> {
    let put = nearest_delta(puts, greeks, target);
    let call = nearest_delta(calls, greeks, target);
    match (put, call) {
        (Some(put), Some(call)) => Ok(DeltaSelection { put, call }),
        (put, call) => {
            let missing: Vec<&str> = [("put", put.is_none()), ("call", call.is_none())]
                .into_iter()
                .filter_map(|(side, missing)| missing.then_some(side))
                .collect();
            Err(ScreenError::insufficient_data(
                stage::NO_DELTA_CANDIDATES,
                format!(
                    "no {} candidate with a known delta ({} puts, {} calls requested)",
                    missing.join(" or "),
                    puts.len(),
                    calls.len()
                ),
            ))
        }
    }
}
