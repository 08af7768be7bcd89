//! Expiration selection by days-to-expiration proximity.
//!
//! Candidates are ranked by `|dte - target|` and probed in that order for a
//! chain entry that actually lists strikes. Chain metadata and strike
//! availability are not always consistent upstream, so when none of the
//! probed dates has strikes the closest date is returned anyway.

use chrono::{NaiveDate, Utc};
use chrono_tz::US::Eastern;
use std::sync::Arc;
use tracing::{debug, warn};
use wheel_scan_core::error::{stage, Result, ScreenError};
use wheel_scan_core::traits::OptionChainProvider;

/// Source of "today" for DTE arithmetic.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Calendar date on the US equity options exchanges.
#[derive(Debug, Clone, Copy, Default)]
pub struct EasternClock;

impl Clock for EasternClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&Eastern).date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Days from `today` to `date`; negative for stale listings.
#[must_use]
pub fn days_to_expiration(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Orders dates by distance from the target DTE, earlier date first on ties.
#[must_use]
pub fn rank_by_dte(dates: &[NaiveDate], today: NaiveDate, target_dte: i64) -> Vec<(NaiveDate, i64)> {
    let mut ranked: Vec<(NaiveDate, i64)> = dates
        .iter()
        .map(|&date| (date, days_to_expiration(date, today)))
        .collect();
    ranked.sort_by_key(|&(date, dte)| ((dte - target_dte).abs(), date));
    ranked.dedup_by_key(|(date, _)| *date);
    ranked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationChoice {
    pub date: NaiveDate,
    pub dte: i64,
    /// False when every probe came back empty and the closest date was used.
    pub has_strikes: bool,
}

pub struct ExpirationSelector {
    chains: Arc<dyn OptionChainProvider>,
    target_dte: i64,
    max_probes: usize,
}

impl ExpirationSelector {
    pub fn new(chains: Arc<dyn OptionChainProvider>, target_dte: i64, max_probes: usize) -> Self {
        Self {
            chains,
            target_dte,
            max_probes,
        }
    }

    /// Picks the usable expiration closest to the target DTE.
    ///
    /// # Errors
    /// `DataUnavailable` when the listing or a probe fetch fails, or when no
    /// dates are listed. Empty probes are not errors.
    pub async fn select(
        &self,
        symbol: &str,
        access_token: &str,
        today: NaiveDate,
    ) -> Result<ExpirationChoice> {
        let chain = self
            .chains
            .option_chain(symbol, None, access_token)
            .await
            .map_err(|e| {
                ScreenError::data_unavailable(
                    stage::EXPIRATIONS_FETCH_FAILED,
                    format!("option chain listing for {symbol}: {e:#}"),
                )
            })?;

        let dates = chain.expiration_dates();
        if dates.is_empty() {
            return Err(ScreenError::data_unavailable(
                stage::NO_EXPIRATIONS,
                format!("no expirations listed for {symbol}"),
            ));
        }

        let ranked = rank_by_dte(&dates, today, self.target_dte);
        debug!(
            symbol,
            candidates = ranked.len(),
            closest = %ranked[0].0,
            "ranked expirations"
        );

        for &(date, dte) in ranked.iter().take(self.max_probes) {
            let filtered = self
                .chains
                .option_chain(symbol, Some(date), access_token)
                .await
                .map_err(|e| {
                    ScreenError::data_unavailable(
                        stage::EXPIRATIONS_FETCH_FAILED,
                        format!("option chain for {symbol} expiring {date}: {e:#}"),
                    )
                })?;
            if filtered.has_strikes_for(date) {
                return Ok(ExpirationChoice {
                    date,
                    dte,
                    has_strikes: true,
                });
            }
            debug!(symbol, %date, dte, "expiration probe found no strikes");
        }

        let (date, dte) = ranked[0];
        warn!(
            symbol,
            %date,
            dte,
            probes = self.max_probes.min(ranked.len()),
            "no probed expiration listed strikes, falling back to closest"
        );
        Ok(ExpirationChoice {
            date,
            dte,
            has_strikes: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use wheel_scan_core::types::{ChainExpiration, OptionChain, Strike};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn in_days(days: i64) -> NaiveDate {
        today() + Duration::days(days)
    }

    /// Lists `listed` dates; only dates in `with_strikes` return strikes when probed.
    struct FakeChains {
        listed: Vec<NaiveDate>,
        with_strikes: HashSet<NaiveDate>,
        probes: parking_lot::Mutex<Vec<NaiveDate>>,
        fail_listing: bool,
        fail_probe: Option<NaiveDate>,
    }

    impl FakeChains {
        fn new(listed: Vec<NaiveDate>, with_strikes: &[NaiveDate]) -> Self {
            Self {
                listed,
                with_strikes: with_strikes.iter().copied().collect(),
                probes: parking_lot::Mutex::new(Vec::new()),
                fail_listing: false,
                fail_probe: None,
            }
        }

        fn entry(&self, date: NaiveDate) -> ChainExpiration {
            let strikes = if self.with_strikes.contains(&date) {
                vec![Strike {
                    price: dec!(100),
                    call_streamer_symbol: Some(".C".into()),
                    put_streamer_symbol: Some(".P".into()),
                }]
            } else {
                vec![]
            };
            ChainExpiration {
                date,
                days_to_expiration: None,
                strikes,
            }
        }
    }

    #[async_trait]
    impl OptionChainProvider for FakeChains {
        async fn option_chain(
            &self,
            symbol: &str,
            expiration: Option<NaiveDate>,
            _access_token: &str,
        ) -> anyhow::Result<OptionChain> {
            let expirations = match expiration {
                None if self.fail_listing => anyhow::bail!("connection reset"),
                None => self.listed.iter().map(|&d| self.entry(d)).collect(),
                Some(date) => {
                    self.probes.lock().push(date);
                    if self.fail_probe == Some(date) {
                        anyhow::bail!("503 service unavailable");
                    }
                    vec![self.entry(date)]
                }
            };
            Ok(OptionChain {
                underlying: symbol.to_string(),
                expirations,
            })
        }
    }

    fn selector(chains: Arc<FakeChains>) -> ExpirationSelector {
        ExpirationSelector::new(chains, 21, 6)
    }

    #[test]
    fn test_rank_by_dte_prefers_distance_then_earlier_date() {
        let dates = [in_days(40), in_days(25), in_days(17), in_days(10), in_days(18)];
        let ranked = rank_by_dte(&dates, today(), 21);
        let order: Vec<i64> = ranked.iter().map(|&(_, dte)| dte).collect();
        // 17 and 25 are both 4 away; 17 is earlier
        assert_eq!(order, vec![18, 17, 25, 10, 40]);
    }

    #[test]
    fn test_negative_dte_for_stale_dates() {
        assert_eq!(days_to_expiration(in_days(-3), today()), -3);
    }

    #[tokio::test]
    async fn test_selects_closest_expiration_with_strikes() {
        let listed = vec![in_days(10), in_days(18), in_days(25), in_days(40)];
        let chains = Arc::new(FakeChains::new(listed.clone(), &listed));

        let choice = selector(chains.clone())
            .select("XYZ", "token", today())
            .await
            .unwrap();

        assert_eq!(choice.date, in_days(18));
        assert_eq!(choice.dte, 18);
        assert!(choice.has_strikes);
        assert_eq!(chains.probes.lock().as_slice(), &[in_days(18)]);
    }

    #[tokio::test]
    async fn test_skips_empty_candidates_in_rank_order() {
        let listed = vec![in_days(10), in_days(18), in_days(25), in_days(40)];
        let chains = Arc::new(FakeChains::new(listed, &[in_days(10)]));

        let choice = selector(chains.clone())
            .select("XYZ", "token", today())
            .await
            .unwrap();

        assert_eq!(choice.date, in_days(10));
        assert_eq!(
            chains.probes.lock().as_slice(),
            &[in_days(18), in_days(25), in_days(10)]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_closest_when_no_probe_has_strikes() {
        let listed: Vec<NaiveDate> = (1..=8).map(|w| in_days(w * 7)).collect();
        let chains = Arc::new(FakeChains::new(listed.clone(), &[]));

        let choice = selector(chains.clone())
            .select("XYZ", "token", today())
            .await
            .unwrap();

        assert_eq!(choice.date, in_days(21));
        assert!(!choice.has_strikes);
        assert_eq!(chains.probes.lock().len(), 6);
        assert!(listed.contains(&choice.date));
    }

    #[tokio::test]
    async fn test_no_expirations_is_data_unavailable() {
        let chains = Arc::new(FakeChains::new(vec![], &[]));
        let err = selector(chains).select("XYZ", "token", today()).await.unwrap_err();
        assert_eq!(err.kind(), "data_unavailable");
        assert_eq!(err.stage(), "no_expirations");
    }

    #[tokio::test]
    async fn test_listing_failure_is_tagged() {
        let mut fake = FakeChains::new(vec![in_days(7)], &[]);
        fake.fail_listing = true;
        let err = selector(Arc::new(fake))
            .select("XYZ", "token", today())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "expirations_fetch_failed");
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_failed_candidate_fetch_aborts_selection() {
        let listed = vec![in_days(10), in_days(18), in_days(25)];
        let mut fake = FakeChains::new(listed.clone(), &listed);
        fake.fail_probe = Some(in_days(18));
        let chains = Arc::new(fake);

        let err = selector(chains.clone())
            .select("XYZ", "token", today())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "data_unavailable");
        assert_eq!(err.stage(), "expirations_fetch_failed");
        assert!(err.to_string().contains("503 service unavailable"));
        // no fallback to later candidates
        assert_eq!(chains.probes.lock().as_slice(), &[in_days(18)]);
    }

    #[test]
    fn test_fixed_clock() {
        assert_eq!(FixedClock(today()).today(), today());
    }
}
