//! End-to-end screening run.
//!
//! token -> expiration -> streamer symbols -> quote token -> stream -> delta -> result.
//! Each stage fails with its own tagged [`wheel_scan_core::ScreenError`]; nothing is retried here.

use crate::assembler::assemble;
use crate::delta;
use crate::expiration::{Clock, EasternClock, ExpirationSelector};
use crate::streamer_symbols;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wheel_scan_core::config::ScreenerConfig;
use wheel_scan_core::error::Result;
use wheel_scan_core::symbol::normalize_symbol;
use wheel_scan_core::traits::{
    AccessTokenSource, MarketDataStream, OptionChainProvider, QuoteTokenProvider, ScreenService,
};
use wheel_scan_core::types::SelectionResult;

/// Selection targets for one screener instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSettings {
    pub target_dte: i64,
    pub target_delta: f64,
    pub max_expiration_probes: usize,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self::from(&ScreenerConfig::default())
    }
}

impl From<&ScreenerConfig> for ScreenSettings {
    fn from(config: &ScreenerConfig) -> Self {
        Self {
            target_dte: config.target_dte,
            target_delta: config.target_delta,
            max_expiration_probes: config.max_expiration_probes,
        }
    }
}

pub struct WheelScreener {
    tokens: Arc<dyn AccessTokenSource>,
    chains: Arc<dyn OptionChainProvider>,
    quote_tokens: Arc<dyn QuoteTokenProvider>,
    stream: Arc<dyn MarketDataStream>,
    clock: Arc<dyn Clock>,
    settings: ScreenSettings,
}

impl WheelScreener {
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        chains: Arc<dyn OptionChainProvider>,
        quote_tokens: Arc<dyn QuoteTokenProvider>,
        stream: Arc<dyn MarketDataStream>,
        settings: ScreenSettings,
    ) -> Self {
        Self {
            tokens,
            chains,
            quote_tokens,
            stream,
            clock: Arc::new(EasternClock),
            settings,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the pipeline; `cancel` stops the streaming stage early.
    ///
    /// # Errors
    /// The first failing stage's [`wheel_scan_core::ScreenError`].
    pub async fn screen_with_cancel(
        &self,
        raw_symbol: &str,
        cancel: CancellationToken,
    ) -> Result<SelectionResult> {
        let started = Instant::now();
        let symbol = normalize_symbol(raw_symbol)?;
        info!(symbol = %symbol, "screening started");

        let result = self.run(&symbol, cancel).await;
        match &result {
            Ok(selection) => info!(
                symbol = %symbol,
                expiration = %selection.expiration,
                dte = selection.dte,
                put = %selection.put.streamer_symbol,
                put_delta = selection.put.delta,
                call = %selection.call.streamer_symbol,
                call_delta = selection.call.delta,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "screening complete"
            ),
            Err(e) => warn!(
                symbol = %symbol,
                kind = e.kind(),
                stage = e.stage(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "screening failed"
            ),
        }
        result
    }

    async fn run(&self, symbol: &str, cancel: CancellationToken) -> Result<SelectionResult> {
        let access_token = self.tokens.valid_access_token().await?;

        let selector = ExpirationSelector::new(
            Arc::clone(&self.chains),
            self.settings.target_dte,
            self.settings.max_expiration_probes,
        );
        let expiration = selector
            .select(symbol, &access_token, self.clock.today())
            .await?;
        debug!(
            symbol,
            expiration = %expiration.date,
            dte = expiration.dte,
            has_strikes = expiration.has_strikes,
            "expiration selected"
        );

        let resolved =
            streamer_symbols::resolve(&self.chains, symbol, expiration.date, &access_token).await?;

        let quote_token = self.quote_tokens.quote_token(&access_token).await?;

        let symbols = resolved.all_symbols();
        let snapshot = self.stream.collect(&quote_token, &symbols, cancel).await?;
        debug!(
            symbol,
            requested = symbols.len(),
            quotes = snapshot.quotes.len(),
            greeks = snapshot.greeks.len(),
            "market data collected"
        );

        let selection = delta::select(
            &resolved.puts,
            &resolved.calls,
            &snapshot.greeks,
            self.settings.target_delta,
        )?;

        Ok(assemble(symbol, &expiration, &selection, &resolved, &snapshot))
    }
}

#[async_trait]
impl ScreenService for WheelScreener {
    async fn screen(&self, symbol: &str) -> Result<SelectionResult> {
        self.screen_with_cancel(symbol, CancellationToken::new()).await
    }
}

impl std::fmt::Debug for WheelScreener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WheelScreener")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
