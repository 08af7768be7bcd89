//! OAuth2 credential lifecycle for the tastytrade API.
//!
//! The access/refresh pair lives in an injected [`TokenStore`]. The
//! [`TokenManager`] validates the cached access token with a probe call and
//! falls back to a single `refresh_token` grant when the probe fails.
//!
//! Refreshes are single-flight: callers that observe an expired token queue on
//! one async mutex, and whoever gets it second finds the store already updated.
//!
//! # Security
//!
//! - The client secret is held as a `SecretString`
//! - Tokens are never logged; `Debug` impls redact them
//! - Refreshed credentials are kept in memory only

use crate::client::TastytradeClient;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use wheel_scan_core::config::TastytradeConfig;
use wheel_scan_core::error::{stage, ScreenError};
use wheel_scan_core::traits::{AccessTokenSource, OAuthFlow};

// =============================================================================
// Token Store
// =============================================================================

/// The mutable half of the credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Where the current token pair lives.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> TokenPair;
    fn store(&self, pair: TokenPair);
}

/// Process-lifetime store; refreshed tokens are lost on restart.
pub struct InMemoryTokenStore {
    inner: RwLock<TokenPair>,
}

impl InMemoryTokenStore {
    #[must_use]
    pub fn new(pair: TokenPair) -> Self {
        Self {
            inner: RwLock::new(pair),
        }
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self) -> TokenPair {
        self.inner.read().clone()
    }

    fn store(&self, pair: TokenPair) {
        *self.inner.write() = pair;
    }
}

// =============================================================================
// OAuth Credentials
// =============================================================================

/// Static client credentials for the OAuth grants.
pub struct OAuthCredentials {
    pub client_id: String,
    client_secret: SecretString,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub scopes: Vec<String>,
    /// Some providers reject `client_id` on the refresh grant.
    pub send_client_id: bool,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("scopes", &self.scopes)
            .field("send_client_id", &self.send_client_id)
            .finish()
    }
}

impl OAuthCredentials {
    /// Creates credentials with defaults for everything but the client pair.
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        let defaults = TastytradeConfig::default();
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: defaults.redirect_uri,
            authorize_url: defaults.authorize_url,
            scopes: defaults.scopes,
            send_client_id: defaults.send_client_id,
        }
    }

    /// Splits application settings into client credentials and the initial token pair.
    #[must_use]
    pub fn from_app_config(config: &TastytradeConfig) -> (Self, TokenPair) {
        let credentials = Self {
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.clone()),
            redirect_uri: config.redirect_uri.clone(),
            authorize_url: config.authorize_url.clone(),
            scopes: config.scopes.clone(),
            send_client_id: config.send_client_id,
        };
        let pair = TokenPair {
            access_token: config
                .access_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            refresh_token: config.refresh_token.clone(),
        };
        (credentials, pair)
    }

    /// Sets whether `client_id` is sent on refresh.
    #[must_use]
    pub fn with_send_client_id(mut self, send: bool) -> Self {
        self.send_client_id = send;
        self
    }
}

// =============================================================================
// TokenManager
// =============================================================================

/// Hands out access tokens that pass the probe, refreshing when needed.
pub struct TokenManager {
    client: Arc<TastytradeClient>,
    credentials: OAuthCredentials,
    store: Arc<dyn TokenStore>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client", &self.client)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(
        client: Arc<TastytradeClient>,
        credentials: OAuthCredentials,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            client,
            credentials,
            store,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the cached access token if the probe accepts it, otherwise a
    /// freshly refreshed one.
    ///
    /// # Errors
    /// Returns [`crate::TastytradeError::TokenEndpoint`] if the refresh grant fails.
    pub async fn valid_access_token(&self) -> Result<String> {
        let observed = self.store.load().access_token;

        if let Some(token) = observed.as_deref() {
            match self.client.probe(token).await {
                Ok(true) => return Ok(token.to_string()),
                Ok(false) => debug!("cached access token rejected by probe"),
                Err(e) => warn!(error = %e, "access token probe failed"),
            }
        } else {
            debug!("no cached access token");
        }

        self.refresh(observed).await
    }

    /// Runs the refresh grant unless another caller already replaced `observed`.
    async fn refresh(&self, observed: Option<String>) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.store.load();
        if let Some(token) = current.access_token.as_ref() {
            if observed.as_ref() != Some(token) {
                debug!("access token refreshed by a concurrent caller");
                return Ok(token.clone());
            }
        }

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
        ];
        if self.credentials.send_client_id {
            form.push(("client_id", self.credentials.client_id.as_str()));
        }

        let response = self.client.request_token(&form).await?;
        let rotated = response.refresh_token.is_some();

        let access_token = response.access_token;
        self.store.store(TokenPair {
            access_token: Some(access_token.clone()),
            refresh_token: response
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
        });

        info!(
            rotated_refresh_token = rotated,
            expires_in = ?response.expires_in,
            "access token refreshed"
        );
        Ok(access_token)
    }

    /// Consent page URL for the authorization-code flow.
    ///
    /// # Errors
    /// Returns error if the configured authorize URL is not a valid URL.
    pub fn authorization_url(&self, state: &str) -> std::result::Result<String, url::ParseError> {
        let scope = self.credentials.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.credentials.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    /// Exchanges an authorization code and installs the resulting token pair.
    ///
    /// # Errors
    /// Returns [`crate::TastytradeError::TokenEndpoint`] if the exchange fails.
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
        ];
        let response = self.client.request_token(&form).await?;

        let current = self.store.load();
        self.store.store(TokenPair {
            access_token: Some(response.access_token),
            refresh_token: response.refresh_token.unwrap_or(current.refresh_token),
        });

        info!("authorization code exchanged for a new token pair");
        Ok(())
    }
}

#[async_trait]
impl AccessTokenSource for TokenManager {
    async fn valid_access_token(&self) -> wheel_scan_core::Result<String> {
        TokenManager::valid_access_token(self)
            .await
            .map_err(|e| e.into_auth_error(stage::TOKEN_REFRESH_FAILED, &self.client.token_endpoint()))
    }
}

#[async_trait]
impl OAuthFlow for TokenManager {
    fn authorization_url(&self, state: &str) -> wheel_scan_core::Result<String> {
        TokenManager::authorization_url(self, state).map_err(|e| {
            ScreenError::auth(
                stage::AUTHORIZATION_CODE_FAILED,
                self.credentials.authorize_url.clone(),
                None,
                format!("invalid authorize url: {e}"),
            )
        })
    }

    async fn complete_authorization(&self, code: &str) -> wheel_scan_core::Result<()> {
        self.exchange_authorization_code(code).await.map_err(|e| {
            e.into_auth_error(
                stage::AUTHORIZATION_CODE_FAILED,
                &self.client.token_endpoint(),
            )
        })
    }
}
