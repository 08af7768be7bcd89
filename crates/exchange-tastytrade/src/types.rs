//! Decoded wire records for the tastytrade REST endpoints.
//!
//! Every optional nested field has a serde default so a sparse response
//! decodes into empty collections instead of failing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use wheel_scan_core::types::{ChainExpiration, OptionChain, QuoteToken, Strike};

/// Every tastytrade REST response wraps its payload in `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

// =============================================================================
// Nested option chain
// =============================================================================

/// `GET /option-chains/{symbol}/nested`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawNestedChain {
    #[serde(default)]
    pub items: Vec<RawChainItem>,
}

/// One chain root (standard, weekly, non-standard deliverable).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawChainItem {
    #[serde(default)]
    pub underlying_symbol: String,
    #[serde(default)]
    pub expirations: Vec<RawExpiration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawExpiration {
    #[serde(default)]
    pub expiration_date: String,
    #[serde(default)]
    pub days_to_expiration: Option<i64>,
    #[serde(default)]
    pub strikes: Vec<RawStrike>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawStrike {
    #[serde(default)]
    pub strike_price: Option<Decimal>,
    #[serde(default)]
    pub call_streamer_symbol: Option<String>,
    #[serde(default)]
    pub put_streamer_symbol: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl RawStrike {
    fn into_strike(self) -> Option<Strike> {
        Some(Strike {
            price: self.strike_price?,
            call_streamer_symbol: non_empty(self.call_streamer_symbol),
            put_streamer_symbol: non_empty(self.put_streamer_symbol),
        })
    }
}

impl RawExpiration {
    fn into_expiration(self) -> Option<ChainExpiration> {
        let date = match NaiveDate::parse_from_str(&self.expiration_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                tracing::debug!(raw = %self.expiration_date, error = %e, "skipping expiration with unparseable date");
                return None;
            }
        };
        Some(ChainExpiration {
            date,
            days_to_expiration: self.days_to_expiration,
            strikes: self
                .strikes
                .into_iter()
                .filter_map(RawStrike::into_strike)
                .collect(),
        })
    }
}

impl From<RawNestedChain> for OptionChain {
    fn from(raw: RawNestedChain) -> Self {
        let underlying = raw
            .items
            .iter()
            .map(|item| item.underlying_symbol.clone())
            .find(|s| !s.is_empty())
            .unwrap_or_default();

        let expirations = raw
            .items
            .into_iter()
            .flat_map(|item| item.expirations)
            .filter_map(RawExpiration::into_expiration)
            .collect();

        Self {
            underlying,
            expirations,
        }
    }
}

// =============================================================================
// Quote token
// =============================================================================

/// `GET /api-quote-tokens`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawQuoteToken {
    pub token: String,
    pub dxlink_url: String,
    #[serde(default)]
    pub level: Option<String>,
}

impl From<RawQuoteToken> for QuoteToken {
    fn from(raw: RawQuoteToken) -> Self {
        Self {
            token: raw.token,
            dxlink_url: raw.dxlink_url,
            level: raw.level,
        }
    }
}

// =============================================================================
// OAuth token endpoint
// =============================================================================

/// `POST /oauth/token` response. Providers may omit the refresh token.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn nested_chain_json() -> serde_json::Value {
        serde_json::json!({
            "data": {
                "items": [
                    {
                        "underlying-symbol": "XYZ",
                        "root-symbol": "XYZ",
                        "expirations": [
                            {
                                "expiration-date": "2026-11-06",
                                "days-to-expiration": 18,
                                "expiration-type": "Weekly",
                                "strikes": [
                                    {
                                        "strike-price": "95.0",
                                        "call": "XYZ   261106C00095000",
                                        "call-streamer-symbol": ".XYZ261106C95",
                                        "put": "XYZ   261106P00095000",
                                        "put-streamer-symbol": ".XYZ261106P95"
                                    },
                                    {
                                        "strike-price": "100.0",
                                        "call-streamer-symbol": ".XYZ261106C100",
                                        "put-streamer-symbol": ""
                                    }
                                ]
                            },
                            {
                                "expiration-date": "not-a-date",
                                "strikes": []
                            },
                            {
                                "expiration-date": "2026-11-20"
                            }
                        ]
                    }
                ]
            }
        })
    }

    #[test]
    fn test_nested_chain_conversion() {
        let envelope: Envelope<RawNestedChain> =
            serde_json::from_value(nested_chain_json()).unwrap();
        let chain: OptionChain = envelope.data.into();

        assert_eq!(chain.underlying, "XYZ");
        assert_eq!(chain.expirations.len(), 2);

        let first = &chain.expirations[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2026, 11, 6).unwrap());
        assert_eq!(first.days_to_expiration, Some(18));
        assert_eq!(first.strikes.len(), 2);
        assert_eq!(first.strikes[0].price, dec!(95));
        assert_eq!(
            first.strikes[0].put_streamer_symbol.as_deref(),
            Some(".XYZ261106P95")
        );
        // blank streamer symbols count as absent
        assert_eq!(first.strikes[1].put_streamer_symbol, None);

        assert!(chain.expirations[1].strikes.is_empty());
    }

    #[test]
    fn test_empty_data_decodes_to_empty_chain() {
        let envelope: Envelope<RawNestedChain> =
            serde_json::from_value(serde_json::json!({ "data": {} })).unwrap();
        let chain: OptionChain = envelope.data.into();
        assert!(chain.expirations.is_empty());
        assert!(chain.underlying.is_empty());
    }

    #[test]
    fn test_quote_token_decoding() {
        let envelope: Envelope<RawQuoteToken> = serde_json::from_value(serde_json::json!({
            "data": {
                "token": "scoped",
                "dxlink-url": "wss://tasty-openapi-ws.dxfeed.com/realtime",
                "level": "api"
            }
        }))
        .unwrap();
        let token: QuoteToken = envelope.data.into();
        assert_eq!(token.token, "scoped");
        assert_eq!(token.dxlink_url, "wss://tasty-openapi-ws.dxfeed.com/realtime");
    }

    #[test]
    fn test_token_response_without_refresh_token() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "new-access",
            "expires_in": 900,
            "token_type": "Bearer"
        }))
        .unwrap();
        assert_eq!(response.access_token, "new-access");
        assert!(response.refresh_token.is_none());
        assert!(!format!("{response:?}").contains("new-access"));
    }
}
