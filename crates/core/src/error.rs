//! Error taxonomy of the screening pipeline.
//!
//! Every failure carries a stage tag naming where the pipeline stopped, so
//! callers get a structured `{kind, stage, details}` answer.

use thiserror::Error;

/// Stage tags attached to [`ScreenError`].
pub mod stage {
    pub const INVALID_SYMBOL: &str = "invalid_symbol";
    pub const TOKEN_REFRESH_FAILED: &str = "token_refresh_failed";
    pub const AUTHORIZATION_CODE_FAILED: &str = "authorization_code_failed";
    pub const EXPIRATIONS_FETCH_FAILED: &str = "expirations_fetch_failed";
    pub const NO_EXPIRATIONS: &str = "no_expirations";
    pub const CHAIN_FETCH_FAILED: &str = "chain_fetch_failed";
    pub const NO_STREAMER_SYMBOLS: &str = "no_streamer_symbols";
    pub const QUOTE_TOKEN_FAILED: &str = "quote_token_failed";
    pub const STREAM_FAILED: &str = "stream_failed";
    pub const NO_DELTA_CANDIDATES: &str = "no_delta_candidates";
}

/// Errors surfaced by a screening run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScreenError {
    /// Request rejected before the pipeline started.
    #[error("invalid request: {details}")]
    InvalidRequest {
        /// Why the input was rejected.
        details: String,
    },

    /// Token probe/refresh or quote-token issuance failed.
    #[error("authentication error [{stage}]: {endpoint} returned {status:?}: {body}")]
    Auth {
        /// Stage tag.
        stage: &'static str,
        /// Endpoint that rejected the request.
        endpoint: String,
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Response body or transport error text.
        body: String,
    },

    /// No expirations, strikes or streamer symbols for the symbol.
    #[error("data unavailable [{stage}]: {details}")]
    DataUnavailable {
        /// Stage tag.
        stage: &'static str,
        /// Human-readable detail.
        details: String,
    },

    /// Streaming connection or protocol failure.
    #[error("stream error [{stage}] in state {state}: {message}")]
    Stream {
        /// Stage tag.
        stage: &'static str,
        /// Protocol state reached before the failure.
        state: String,
        /// Last error seen.
        message: String,
    },

    /// A side had no candidate with a known delta.
    #[error("insufficient data [{stage}]: {details}")]
    InsufficientData {
        /// Stage tag.
        stage: &'static str,
        /// Human-readable detail.
        details: String,
    },
}

impl ScreenError {
    /// Creates an invalid request error.
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::InvalidRequest {
            details: details.into(),
        }
    }

    /// Creates an authentication error.
    pub fn auth(
        stage: &'static str,
        endpoint: impl Into<String>,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::Auth {
            stage,
            endpoint: endpoint.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a data unavailable error.
    pub fn data_unavailable(stage: &'static str, details: impl Into<String>) -> Self {
        Self::DataUnavailable {
            stage,
            details: details.into(),
        }
    }

    /// Creates a stream error.
    pub fn stream(
        stage: &'static str,
        state: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Stream {
            stage,
            state: state.into(),
            message: message.into(),
        }
    }

    /// Creates an insufficient data error.
    pub fn insufficient_data(stage: &'static str, details: impl Into<String>) -> Self {
        Self::InsufficientData {
            stage,
            details: details.into(),
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Auth { .. } => "auth_error",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::Stream { .. } => "stream_error",
            Self::InsufficientData { .. } => "insufficient_data",
        }
    }

    /// Stage tag where the pipeline stopped.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => stage::INVALID_SYMBOL,
            Self::Auth { stage, .. }
            | Self::DataUnavailable { stage, .. }
            | Self::Stream { stage, .. }
            | Self::InsufficientData { stage, .. } => *stage,
        }
    }

    /// Returns true for failures caused by upstream credentials.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Result type alias for screening operations.
pub type Result<T> = std::result::Result<T, ScreenError>;
