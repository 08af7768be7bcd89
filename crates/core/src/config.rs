use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tastytrade: TastytradeConfig,
    pub screener: ScreenerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Brokerage connection settings.
///
/// Secrets are plain strings here so figment can load them; the tastytrade
/// crate moves them into `SecretString` as soon as the client is built.
#[derive(Clone, Serialize, Deserialize)]
pub struct TastytradeConfig {
    /// REST base URL (token endpoint, chains, quote tokens).
    pub api_url: String,
    /// Consent page used by the authorization-code flow.
    pub authorize_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Blank until the authorization-code flow installs one.
    pub refresh_token: String,
    /// Optional access token to seed the store with.
    #[serde(default)]
    pub access_token: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Whether `client_id` is sent on refresh; some providers reject it.
    pub send_client_id: bool,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    pub user_agent: String,
}

impl std::fmt::Debug for TastytradeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TastytradeConfig")
            .field("api_url", &self.api_url)
            .field("authorize_url", &self.authorize_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("send_client_id", &self.send_client_id)
            .field("timeout_secs", &self.timeout_secs)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

/// Selection and streaming knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Days-to-expiration the expiration selector aims for.
    pub target_dte: i64,
    /// Absolute delta the delta selector aims for.
    pub target_delta: f64,
    /// How many DTE-ranked expirations are probed for live strikes.
    pub max_expiration_probes: usize,
    pub collection_deadline_ms: u64,
    pub read_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub keepalive_timeout_secs: u64,
    /// DXLink channel number requested for the feed service.
    pub feed_channel: u32,
}

impl ScreenerConfig {
    #[must_use]
    pub const fn collection_deadline(&self) -> Duration {
        Duration::from_millis(self.collection_deadline_ms)
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            target_dte: 21,
            target_delta: 0.30,
            max_expiration_probes: 6,
            collection_deadline_ms: 3_000,
            read_timeout_ms: 250,
            connect_timeout_ms: 5_000,
            keepalive_timeout_secs: 60,
            feed_channel: 3,
        }
    }
}

impl Default for TastytradeConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.tastyworks.com".to_string(),
            authorize_url: "https://my.tastytrade.com/auth.html".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            access_token: None,
            redirect_uri: "http://localhost:8080/oauth/callback".to_string(),
            scopes: vec!["read".to_string()],
            send_client_id: true,
            timeout_secs: 15,
            requests_per_minute: 120,
            user_agent: "wheel-scan/0.1".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            tastytrade: TastytradeConfig::default(),
            screener: ScreenerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Checks the values that would otherwise fail deep inside a request.
    ///
    /// # Errors
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        let tt = &self.tastytrade;
        if tt.client_id.trim().is_empty() {
            return Err("tastytrade.client_id is required".to_string());
        }
        if tt.client_secret.trim().is_empty() {
            return Err("tastytrade.client_secret is required".to_string());
        }
        if tt.requests_per_minute == 0 {
            return Err("tastytrade.requests_per_minute must be positive".to_string());
        }

        let sc = &self.screener;
        if sc.max_expiration_probes == 0 {
            return Err("screener.max_expiration_probes must be positive".to_string());
        }
        if !(sc.target_delta > 0.0 && sc.target_delta < 1.0) {
            return Err(format!(
                "screener.target_delta must be in (0, 1), got {}",
                sc.target_delta
            ));
        }
        if sc.collection_deadline_ms == 0 || sc.read_timeout_ms == 0 {
            return Err("screener deadlines must be positive".to_string());
        }
        if sc.read_timeout_ms > sc.collection_deadline_ms {
            return Err("screener.read_timeout_ms exceeds the collection deadline".to_string());
        }
        Ok(())
    }
}
