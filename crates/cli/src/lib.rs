//! Wiring of the tastytrade adapters into the screening pipeline.

use std::sync::Arc;
use wheel_scan_core::config::AppConfig;
use wheel_scan_screener::{ScreenSettings, WheelScreener};
use wheel_scan_tastytrade::{
    DxLinkConfig, DxLinkStreamer, InMemoryTokenStore, OAuthCredentials, TastytradeClient,
    TastytradeClientConfig, TokenManager,
};
use wheel_scan_web_api::ApiServer;

/// Long-lived services shared by every command.
pub struct Services {
    pub tokens: Arc<TokenManager>,
    pub screener: Arc<WheelScreener>,
}

impl Services {
    /// Builds the REST client, token manager, DXLink streamer and screener.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be configured.
    pub fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let client = Arc::new(TastytradeClient::new(
            TastytradeClientConfig::from_app_config(&config.tastytrade)?,
        )?);

        let (credentials, pair) = OAuthCredentials::from_app_config(&config.tastytrade);
        let tokens = Arc::new(TokenManager::new(
            client.clone(),
            credentials,
            Arc::new(InMemoryTokenStore::new(pair)),
        ));

        let streamer = Arc::new(DxLinkStreamer::new(DxLinkConfig::from(&config.screener)));
        let screener = Arc::new(WheelScreener::new(
            tokens.clone(),
            client.clone(),
            client.clone(),
            streamer,
            ScreenSettings::from(&config.screener),
        ));

        tracing::debug!(
            api_url = %config.tastytrade.api_url,
            target_dte = config.screener.target_dte,
            target_delta = config.screener.target_delta,
            "services built"
        );

        Ok(Self { tokens, screener })
    }

    #[must_use]
    pub fn api_server(&self) -> ApiServer {
        ApiServer::new(self.screener.clone(), self.tokens.clone())
    }
}
