use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Redirect,
    Json,
};
use serde::{Deserialize, Serialize};
use wheel_scan_core::error::ScreenError;
use wheel_scan_core::types::SelectionResult;

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn index() -> &'static str {
    "wheel-scan is running"
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "wheel-scan",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Runs one screening pass for the posted symbol.
///
/// # Errors
/// A malformed body is an invalid request; pipeline failures map by kind.
pub async fn fetch(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<SelectionResult>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ScreenError::invalid_request(format!("malformed request body: {e}")))?;
    let result = state.screener.screen(&request.symbol).await?;
    Ok(Json(result))
}

/// Redirects to the provider consent page with a fresh single-use state.
///
/// # Errors
/// When the consent URL cannot be built from the configured credentials.
pub async fn authorize(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    let csrf = uuid::Uuid::new_v4().to_string();
    let url = state.oauth.authorization_url(&csrf)?;
    state.pending_states.issue(csrf);
    tracing::info!("redirecting to OAuth consent page");
    Ok(Redirect::to(&url))
}

/// Exchanges the authorization code after checking the state.
///
/// # Errors
/// Unknown or reused state, a provider error, or a failed code exchange.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<&'static str, ApiError> {
    let known = params
        .state
        .as_deref()
        .is_some_and(|s| state.pending_states.take(s));
    if !known {
        return Err(ScreenError::invalid_request("unknown, expired or reused OAuth state").into());
    }
    if let Some(error) = params.error {
        return Err(ScreenError::invalid_request(format!("authorization denied: {error}")).into());
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ScreenError::invalid_request("missing authorization code"))?;

    state.oauth.complete_authorization(&code).await?;
    tracing::info!("OAuth authorization complete, tokens installed");
    Ok("authorization complete")
}
