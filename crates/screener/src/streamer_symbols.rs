//! Maps an expiration's strikes to DXLink streamer symbols.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use wheel_scan_core::error::{stage, Result, ScreenError};
use wheel_scan_core::traits::OptionChainProvider;
use wheel_scan_core::types::{OptionChain, OptionRight};

/// Candidate streamer symbols per side, in listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSymbols {
    pub puts: Vec<String>,
    pub calls: Vec<String>,
    /// Streamer symbol to strike price, both sides.
    pub strikes: HashMap<String, Decimal>,
}

impl ResolvedSymbols {
    /// Collects the symbols of every strike listed for `expiration`.
    ///
    /// A symbol listed under more than one chain root is kept once.
    #[must_use]
    pub fn from_chain(chain: &OptionChain, expiration: NaiveDate) -> Self {
        let mut resolved = Self::default();
        for strike in chain.entries_for(expiration).flat_map(|e| &e.strikes) {
            for right in [OptionRight::Put, OptionRight::Call] {
                let Some(symbol) = strike.streamer_symbol(right) else {
                    continue;
                };
                if resolved.strikes.contains_key(symbol) {
                    continue;
                }
                resolved.strikes.insert(symbol.to_string(), strike.price);
                match right {
                    OptionRight::Put => resolved.puts.push(symbol.to_string()),
                    OptionRight::Call => resolved.calls.push(symbol.to_string()),
                }
            }
        }
        resolved
    }

    /// Puts then calls, as one subscription batch.
    #[must_use]
    pub fn all_symbols(&self) -> Vec<String> {
        self.puts.iter().chain(&self.calls).cloned().collect()
    }

    #[must_use]
    pub fn strike(&self, symbol: &str) -> Option<Decimal> {
        self.strikes.get(symbol).copied()
    }
}

/// Fetches the chain for one expiration and resolves both sides.
///
/// # Errors
/// `DataUnavailable` when the fetch fails or either side has no symbols.
pub async fn resolve(
    chains: &Arc<dyn OptionChainProvider>,
    symbol: &str,
    expiration: NaiveDate,
    access_token: &str,
) -> Result<ResolvedSymbols> {
    let chain = chains
        .option_chain(symbol, Some(expiration), access_token)
        .await
        .map_err(|e| {
            ScreenError::data_unavailable(
                stage::CHAIN_FETCH_FAILED,
                format!("option chain for {symbol} {expiration}: {e:#}"),
            )
        })?;

    let resolved = ResolvedSymbols::from_chain(&chain, expiration);
    debug!(
        symbol,
        %expiration,
        puts = resolved.puts.len(),
        calls = resolved.calls.len(),
        "resolved streamer symbols"
    );

    if resolved.puts.is_empty() || resolved.calls.is_empty() {
        return Err(ScreenError::data_unavailable(
            stage::NO_STREAMER_SYMBOLS,
            format!(
                "{symbol} {expiration} has {} put and {} call streamer symbols",
                resolved.puts.len(),
                resolved.calls.len()
            ),
        ));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wheel_scan_core::types::{ChainExpiration, Strike};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 6).unwrap()
    }

    fn strike(price: Decimal, call: Option<&str>, put: Option<&str>) -> Strike {
        Strike {
            price,
            call_streamer_symbol: call.map(str::to_string),
            put_streamer_symbol: put.map(str::to_string),
        }
    }

    fn chain(entries: Vec<ChainExpiration>) -> OptionChain {
        OptionChain {
            underlying: "XYZ".to_string(),
            expirations: entries,
        }
    }

    #[test]
    fn test_from_chain_maps_both_sides_to_strikes() {
        let chain = chain(vec![
            ChainExpiration {
                date: date(),
                days_to_expiration: Some(18),
                strikes: vec![
                    strike(dec!(95), Some(".C95"), Some(".P95")),
                    strike(dec!(100), Some(".C100"), None),
                    strike(dec!(105), None, Some(".P105")),
                ],
            },
            ChainExpiration {
                date: NaiveDate::from_ymd_opt(2026, 11, 20).unwrap(),
                days_to_expiration: Some(32),
                strikes: vec![strike(dec!(95), Some(".OTHER"), Some(".OTHERP"))],
            },
        ]);

        let resolved = ResolvedSymbols::from_chain(&chain, date());

        assert_eq!(resolved.puts, vec![".P95", ".P105"]);
        assert_eq!(resolved.calls, vec![".C95", ".C100"]);
        assert_eq!(resolved.strike(".C100"), Some(dec!(100)));
        assert_eq!(resolved.strike(".OTHER"), None);
        assert_eq!(resolved.all_symbols().len(), 4);
    }

    #[test]
    fn test_duplicate_roots_do_not_duplicate_symbols() {
        let entry = ChainExpiration {
            date: date(),
            days_to_expiration: None,
            strikes: vec![strike(dec!(95), Some(".C95"), Some(".P95"))],
        };
        let resolved = ResolvedSymbols::from_chain(&chain(vec![entry.clone(), entry]), date());
        assert_eq!(resolved.puts.len(), 1);
        assert_eq!(resolved.calls.len(), 1);
    }
}
