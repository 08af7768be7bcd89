//! Joins the delta picks with strikes and quotes into the final result.

use crate::delta::{DeltaPick, DeltaSelection};
use crate::expiration::ExpirationChoice;
use crate::streamer_symbols::ResolvedSymbols;
use rust_decimal::Decimal;
use wheel_scan_core::types::{MarketSnapshot, OptionLeg, SelectionResult};

fn leg(pick: &DeltaPick, resolved: &ResolvedSymbols, snapshot: &MarketSnapshot) -> OptionLeg {
    let quote = snapshot.quote(&pick.symbol).copied().unwrap_or_default();
    OptionLeg {
        streamer_symbol: pick.symbol.clone(),
        // picks always come from resolved symbols
        strike: resolved.strike(&pick.symbol).unwrap_or(Decimal::ZERO),
        bid: quote.bid,
        ask: quote.ask,
        delta: pick.delta,
    }
}

/// Builds the result. Legs without a quote keep `bid`/`ask` as `None`.
#[must_use]
pub fn assemble(
    symbol: &str,
    expiration: &ExpirationChoice,
    selection: &DeltaSelection,
    resolved: &ResolvedSymbols,
    snapshot: &MarketSnapshot,
) -> SelectionResult {
    SelectionResult {
        symbol: symbol.to_string(),
        expiration: expiration.date,
        dte: expiration.dte,
        put: leg(&selection.put, resolved, snapshot),
        call: leg(&selection.call, resolved, snapshot),
    }
}
