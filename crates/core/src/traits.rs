use crate::error::Result;
use crate::types::{MarketSnapshot, OptionChain, QuoteToken, SelectionResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

/// Hands out an access token that passed the probe or was just refreshed.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn valid_access_token(&self) -> Result<String>;
}

/// Nested option chain listing. Callers tag failures with their own stage.
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
        access_token: &str,
    ) -> anyhow::Result<OptionChain>;
}

/// Issues the scoped token for the streaming session.
#[async_trait]
pub trait QuoteTokenProvider: Send + Sync {
    async fn quote_token(&self, access_token: &str) -> Result<QuoteToken>;
}

/// Collects quotes and greeks for a batch of streamer symbols within a deadline.
#[async_trait]
pub trait MarketDataStream: Send + Sync {
    async fn collect(
        &self,
        quote_token: &QuoteToken,
        symbols: &[String],
        cancel: CancellationToken,
    ) -> Result<MarketSnapshot>;
}

/// One full screening run for a symbol.
#[async_trait]
pub trait ScreenService: Send + Sync {
    async fn screen(&self, symbol: &str) -> Result<SelectionResult>;
}

/// One-time authorization-code flow used to bootstrap credentials.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    fn authorization_url(&self, state: &str) -> Result<String>;
    async fn complete_authorization(&self, code: &str) -> Result<()>;
}
