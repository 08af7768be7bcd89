//! Domain types shared by the brokerage adapter and the screener.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Option side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
}

impl std::fmt::Display for OptionRight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "C"),
            Self::Put => write!(f, "P"),
        }
    }
}

/// One strike of one expiration, with the feed identifiers for each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strike {
    pub price: Decimal,
    pub call_streamer_symbol: Option<String>,
    pub put_streamer_symbol: Option<String>,
}

impl Strike {
    /// Streamer symbol for the given side, if listed.
    #[must_use]
    pub fn streamer_symbol(&self, right: OptionRight) -> Option<&str> {
        match right {
            OptionRight::Call => self.call_streamer_symbol.as_deref(),
            OptionRight::Put => self.put_streamer_symbol.as_deref(),
        }
    }
}

/// One expiration entry of a nested chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainExpiration {
    pub date: NaiveDate,
    /// DTE as reported by the brokerage, when present.
    pub days_to_expiration: Option<i64>,
    pub strikes: Vec<Strike>,
}

/// Nested option chain for one underlying, flattened across chain roots.
///
/// The same date may appear more than once (weekly and monthly roots).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub expirations: Vec<ChainExpiration>,
}

impl OptionChain {
    /// Distinct expiration dates in listing order.
    #[must_use]
    pub fn expiration_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        for expiration in &self.expirations {
            if !dates.contains(&expiration.date) {
                dates.push(expiration.date);
            }
        }
        dates
    }

    /// Entries for one date.
    pub fn entries_for(&self, date: NaiveDate) -> impl Iterator<Item = &ChainExpiration> {
        self.expirations.iter().filter(move |e| e.date == date)
    }

    /// True when at least one entry for `date` lists strikes.
    #[must_use]
    pub fn has_strikes_for(&self, date: NaiveDate) -> bool {
        self.entries_for(date).any(|e| !e.strikes.is_empty())
    }
}

/// Scoped credential for the streaming market-data session.
#[derive(Clone, Serialize, Deserialize)]
pub struct QuoteToken {
    pub token: String,
    pub dxlink_url: String,
    pub level: Option<String>,
}

impl std::fmt::Debug for QuoteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteToken")
            .field("token", &"[REDACTED]")
            .field("dxlink_url", &self.dxlink_url)
            .field("level", &self.level)
            .finish()
    }
}

/// Latest bid/ask seen for one streamer symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

/// Latest greeks seen for one streamer symbol. The delta is always known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GreeksSnapshot {
    pub delta: f64,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub rho: Option<f64>,
    pub vega: Option<f64>,
    pub volatility: Option<f64>,
}

impl GreeksSnapshot {
    #[must_use]
    pub fn with_delta(delta: f64) -> Self {
        Self {
            delta,
            ..Default::default()
        }
    }
}

/// Everything collected from one streaming session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    pub quotes: HashMap<String, QuoteSnapshot>,
    pub greeks: HashMap<String, GreeksSnapshot>,
}

impl MarketSnapshot {
    #[must_use]
    pub fn quote(&self, symbol: &str) -> Option<&QuoteSnapshot> {
        self.quotes.get(symbol)
    }

    #[must_use]
    pub fn delta(&self, symbol: &str) -> Option<f64> {
        self.greeks.get(symbol).map(|g| g.delta)
    }
}

/// The winning contract for one side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub streamer_symbol: String,
    pub strike: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub delta: f64,
}

/// Final answer of one screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub symbol: String,
    pub expiration: NaiveDate,
    pub dte: i64,
    pub put: OptionLeg,
    pub call: OptionLeg,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn strike(price: Decimal) -> Strike {
        Strike {
            price,
            call_streamer_symbol: Some(format!(".XYZC{price}")),
            put_streamer_symbol: None,
        }
    }

    #[test]
    fn test_expiration_dates_are_distinct_in_listing_order() {
        let chain = OptionChain {
            underlying: "XYZ".to_string(),
            expirations: vec![
                ChainExpiration {
                    date: date(2026, 11, 20),
                    days_to_expiration: Some(32),
                    strikes: vec![],
                },
                ChainExpiration {
                    date: date(2026, 11, 6),
                    days_to_expiration: Some(18),
                    strikes: vec![],
                },
                ChainExpiration {
                    date: date(2026, 11, 20),
                    days_to_expiration: Some(32),
                    strikes: vec![strike(dec!(100))],
                },
            ],
        };

        assert_eq!(
            chain.expiration_dates(),
            vec![date(2026, 11, 20), date(2026, 11, 6)]
        );
        assert!(chain.has_strikes_for(date(2026, 11, 20)));
        assert!(!chain.has_strikes_for(date(2026, 11, 6)));
        assert!(!chain.has_strikes_for(date(2027, 1, 15)));
    }

    #[test]
    fn test_strike_side_lookup() {
        let s = strike(dec!(42.5));
        assert_eq!(s.streamer_symbol(OptionRight::Call), Some(".XYZC42.5"));
        assert_eq!(s.streamer_symbol(OptionRight::Put), None);
    }

    #[test]
    fn test_selection_result_serializes_missing_quotes_as_null() {
        let leg = OptionLeg {
            streamer_symbol: ".XYZ261106P95".to_string(),
            strike: dec!(95),
            bid: None,
            ask: Some(dec!(1.25)),
            delta: -0.31,
        };
        let result = SelectionResult {
            symbol: "XYZ".to_string(),
            expiration: date(2026, 11, 6),
            dte: 18,
            put: leg.clone(),
            call: OptionLeg {
                delta: 0.29,
                ..leg
            },
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["put"]["bid"].is_null());
        assert_eq!(json["expiration"], "2026-11-06");
        assert_eq!(json["dte"], 18);
    }

    #[test]
    fn test_quote_token_debug_redacts_token() {
        let token = QuoteToken {
            token: "scoped-secret".to_string(),
            dxlink_url: "wss://tasty-openapi-ws.dxfeed.com/realtime".to_string(),
            level: Some("api".to_string()),
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("scoped-secret"));
        assert!(debug.contains("dxfeed"));
    }

    #[test]
    fn test_option_right_display() {
        assert_eq!(OptionRight::Call.to_string(), "C");
        assert_eq!(OptionRight::Put.to_string(), "P");
    }
}
