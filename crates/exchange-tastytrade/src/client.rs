//! tastytrade REST API client with rate limiting.
//!
//! Covers the handful of endpoints the screener consumes: the OAuth token
//! endpoint, the account probe, nested option chains and scoped quote tokens.
//!
//! # Example
//!
//! ```ignore
//! use wheel_scan_tastytrade::{TastytradeClient, TastytradeClientConfig};
//!
//! let client = TastytradeClient::new(TastytradeClientConfig::sandbox())?;
//! let chain = client.option_chain("SPY", None, &access_token).await?;
//! let quote_token = client.quote_token(&access_token).await?;
//! ```

use crate::error::{Result, TastytradeError};
use crate::types::{Envelope, RawNestedChain, RawQuoteToken, TokenResponse};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use std::num::NonZeroU32;
use std::sync::Arc;
use wheel_scan_core::config::TastytradeConfig;
use wheel_scan_core::error::stage;
use wheel_scan_core::traits::{OptionChainProvider, QuoteTokenProvider};
use wheel_scan_core::types::{OptionChain, QuoteToken};

// =============================================================================
// Constants
// =============================================================================

/// tastytrade production API base URL.
pub const TASTYTRADE_PROD_URL: &str = "https://api.tastyworks.com";

/// tastytrade certification (sandbox) API base URL.
pub const TASTYTRADE_SANDBOX_URL: &str = "https://api.cert.tastyworks.com";

pub const TOKEN_PATH: &str = "/oauth/token";
pub const PROBE_PATH: &str = "/customers/me";
pub const QUOTE_TOKEN_PATH: &str = "/api-quote-tokens";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the tastytrade client.
#[derive(Debug, Clone)]
pub struct TastytradeClientConfig {
    /// REST root, without a trailing slash.
    pub base_url: String,

    /// Shared budget for every endpoint, token grants included.
    pub requests_per_minute: NonZeroU32,

    pub timeout_secs: u64,

    /// Sent on every request; tastytrade asks integrations to identify themselves.
    pub user_agent: String,
}

impl Default for TastytradeClientConfig {
    fn default() -> Self {
        Self {
            base_url: TASTYTRADE_PROD_URL.to_string(),
            requests_per_minute: nonzero!(120u32),
            timeout_secs: 15,
            user_agent: "wheel-scan/0.1".to_string(),
        }
    }
}

impl TastytradeClientConfig {
    /// Creates a configuration for the certification environment.
    #[must_use]
    pub fn sandbox() -> Self {
        Self {
            base_url: TASTYTRADE_SANDBOX_URL.to_string(),
            ..Default::default()
        }
    }

    /// Builds the client configuration from application settings.
    ///
    /// # Errors
    /// Returns error if the rate limit is zero.
    pub fn from_app_config(config: &TastytradeConfig) -> Result<Self> {
        let requests_per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            TastytradeError::Configuration("requests_per_minute must be positive".to_string())
        })?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            requests_per_minute,
            timeout_secs: config.timeout_secs,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// TastytradeClient
// =============================================================================

/// tastytrade REST API client.
///
/// All requests share one rate limiter. Bearer tokens are passed per call;
/// the client itself holds no credentials.
pub struct TastytradeClient {
    config: TastytradeClientConfig,
    http: Client,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for TastytradeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TastytradeClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl TastytradeClient {
    /// Builds the HTTP client and its rate limiter.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: TastytradeClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TastytradeError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
        })
    }

    /// Full URL of the OAuth token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}{}", self.config.base_url, TOKEN_PATH)
    }

    /// Waits for the rate limiter and makes a bearer-authenticated GET request.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(%url, "tastytrade GET");

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TastytradeError::api(status.as_u16(), text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    // =========================================================================
    // OAuth
    // =========================================================================

    /// Posts a form-encoded grant to the token endpoint.
    ///
    /// Any failure, transport or HTTP, comes back as
    /// [`TastytradeError::TokenEndpoint`] carrying the endpoint, status and body.
    ///
    /// # Errors
    /// Returns error if the grant is rejected or the response cannot be decoded.
    pub async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        self.rate_limiter.until_ready().await;

        let endpoint = self.token_endpoint();
        let grant = form
            .iter()
            .find(|(k, _)| *k == "grant_type")
            .map_or("unknown", |(_, v)| *v);
        tracing::debug!(grant_type = grant, "POST {}", endpoint);

        let response = self
            .http
            .post(&endpoint)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| TastytradeError::token_endpoint(&endpoint, None, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TastytradeError::token_endpoint(&endpoint, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(TastytradeError::token_endpoint(
                &endpoint,
                Some(status.as_u16()),
                body,
            ));
        }

        serde_json::from_str::<TokenResponse>(&body).map_err(|e| {
            TastytradeError::token_endpoint(
                &endpoint,
                Some(status.as_u16()),
                format!("undecodable token response: {e}"),
            )
        })
    }

    /// Lightweight authenticated call used to check an access token.
    ///
    /// Returns `Ok(true)` only for HTTP 200.
    ///
    /// # Errors
    /// Returns error on transport failure.
    pub async fn probe(&self, access_token: &str) -> Result<bool> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, PROBE_PATH);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "access token probe");
        Ok(status == StatusCode::OK)
    }

    // =========================================================================
    // Market Data Endpoints
    // =========================================================================

    /// Gets the nested option chain for an underlying.
    ///
    /// When `expiration` is given the server-side filter is requested and the
    /// result is also filtered locally, since not every deployment honours it.
    ///
    /// # Errors
    /// [`TastytradeError::Api`] on a non-2xx answer, or a decode error.
    pub async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
        access_token: &str,
    ) -> Result<OptionChain> {
        let path = format!("/option-chains/{symbol}/nested");
        let query: Vec<(&str, String)> = expiration
            .map(|date| vec![("expiration-date", date.format("%Y-%m-%d").to_string())])
            .unwrap_or_default();

        let envelope: Envelope<RawNestedChain> = self.get(&path, &query, access_token).await?;
        let mut chain: OptionChain = envelope.data.into();

        if chain.underlying.is_empty() {
            chain.underlying = symbol.to_string();
        }
        if let Some(date) = expiration {
            chain.expirations.retain(|e| e.date == date);
        }

        tracing::debug!(
            symbol,
            expiration = ?expiration,
            entries = chain.expirations.len(),
            "fetched option chain"
        );
        Ok(chain)
    }

    /// Issues a scoped token for the DXLink streaming session.
    ///
    /// # Errors
    /// Fails when the account has no market data entitlement or the token is stale.
    pub async fn quote_token(&self, access_token: &str) -> Result<QuoteToken> {
        let envelope: Envelope<RawQuoteToken> =
            self.get(QUOTE_TOKEN_PATH, &[], access_token).await?;
        Ok(envelope.data.into())
    }
}

#[async_trait]
impl OptionChainProvider for TastytradeClient {
    async fn option_chain(
        &self,
        symbol: &str,
        expiration: Option<NaiveDate>,
        access_token: &str,
    ) -> anyhow::Result<OptionChain> {
        Ok(TastytradeClient::option_chain(self, symbol, expiration, access_token).await?)
    }
}

#[async_trait]
impl QuoteTokenProvider for TastytradeClient {
    async fn quote_token(&self, access_token: &str) -> wheel_scan_core::Result<QuoteToken> {
        TastytradeClient::quote_token(self, access_token)
            .await
            .map_err(|e| {
                let endpoint = format!("{}{}", self.config.base_url, QUOTE_TOKEN_PATH);
                e.into_auth_error(stage::QUOTE_TOKEN_FAILED, &endpoint)
            })
    }
}
