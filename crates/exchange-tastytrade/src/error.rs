//! Error types for the tastytrade integration.
//!
//! Adapter errors stay close to the wire; they are mapped into the screening
//! taxonomy (`ScreenError`) with a stage tag at the port boundary.

use thiserror::Error;
use wheel_scan_core::error::{stage, ScreenError};

/// Errors that can occur when talking to tastytrade or its DXLink feed.
#[derive(Debug, Error)]
pub enum TastytradeError {
    /// Non-success response from a REST endpoint.
    #[error("tastytrade returned {status_code}: {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Response body.
        message: String,
    },

    /// The OAuth token endpoint rejected a grant.
    #[error("token endpoint {endpoint} rejected the grant ({status:?}): {body}")]
    TokenEndpoint {
        /// Full token endpoint URL.
        endpoint: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Response body or transport error.
        body: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Streaming session failed after reaching `state`.
    #[error("stream failed in state {state}: {message}")]
    Stream {
        /// Last protocol state reached.
        state: String,
        /// Underlying failure.
        message: String,
    },

    #[error("invalid client configuration: {0}")]
    Configuration(String),

    /// Response or frame did not decode.
    #[error("decode error: {0}")]
    Serialization(String),
}

impl TastytradeError {
    /// Non-2xx REST answer.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a token endpoint error.
    pub fn token_endpoint(
        endpoint: impl Into<String>,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::TokenEndpoint {
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a stream error for the given protocol state.
    pub fn stream(state: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Stream {
            state: state.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            Self::TokenEndpoint { status, .. } => *status,
            _ => None,
        }
    }

    /// Maps the error into an authentication failure at `stage`.
    #[must_use]
    pub fn into_auth_error(self, stage: &'static str, endpoint: &str) -> ScreenError {
        match self {
            Self::TokenEndpoint {
                endpoint,
                status,
                body,
            } => ScreenError::auth(stage, endpoint, status, body),
            Self::Api {
                status_code,
                message,
            } => ScreenError::auth(stage, endpoint, Some(status_code), message),
            other => ScreenError::auth(stage, endpoint, None, other.to_string()),
        }
    }

    /// Maps the error into a streaming failure.
    #[must_use]
    pub fn into_stream_error(self) -> ScreenError {
        match self {
            Self::Stream { state, message } => {
                ScreenError::stream(stage::STREAM_FAILED, state, message)
            }
            other => ScreenError::stream(stage::STREAM_FAILED, "Disconnected", other.to_string()),
        }
    }
}

impl From<reqwest::Error> for TastytradeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TastytradeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TastytradeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

/// Result type alias for tastytrade operations.
pub type Result<T> = std::result::Result<T, TastytradeError>;
