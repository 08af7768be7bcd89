//! Error payloads for the HTTP front end.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use wheel_scan_core::error::ScreenError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub stage: &'static str,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Wraps a [`ScreenError`] so handlers can return it with `?`.
#[derive(Debug)]
pub struct ApiError(pub ScreenError);

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            ScreenError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ScreenError::Auth { .. } => StatusCode::UNAUTHORIZED,
            ScreenError::DataUnavailable { .. } => StatusCode::NOT_FOUND,
            ScreenError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ScreenError::Stream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ScreenError> for ApiError {
    fn from(err: ScreenError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.0.is_auth() {
            tracing::warn!(stage = self.0.stage(), error = %self.0, "upstream credentials rejected; re-run /oauth/authorize if the refresh token was revoked");
        } else if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), stage = self.0.stage(), error = %self.0, "request failed");
        } else {
            tracing::warn!(kind = self.0.kind(), stage = self.0.stage(), error = %self.0, "request rejected");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.0.kind(),
                stage: self.0.stage(),
                details: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheel_scan_core::error::stage;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ScreenError::invalid_request("symbol is required"), 400),
            (
                ScreenError::auth(stage::TOKEN_REFRESH_FAILED, "/oauth/token", Some(401), ""),
                401,
            ),
            (ScreenError::data_unavailable(stage::NO_EXPIRATIONS, "none"), 404),
            (ScreenError::insufficient_data(stage::NO_DELTA_CANDIDATES, "none"), 422),
            (ScreenError::stream(stage::STREAM_FAILED, "Connecting", "refused"), 502),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).status().as_u16(), expected);
        }
    }
}
