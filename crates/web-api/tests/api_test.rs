//! Router tests driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use wheel_scan_core::error::{stage, Result, ScreenError};
use wheel_scan_core::traits::{OAuthFlow, ScreenService};
use wheel_scan_core::types::{OptionLeg, SelectionResult};
use wheel_scan_web_api::{ApiServer, MAX_PENDING_STATES};

// ==================== Fakes ====================

/// Succeeds for "XYZ"; other symbols map to a canned error.
struct FakeScreener;

#[async_trait]
impl ScreenService for FakeScreener {
    async fn screen(&self, symbol: &str) -> Result<SelectionResult> {
        match symbol {
            "" => Err(ScreenError::invalid_request("symbol is required")),
            "XYZ" => Ok(SelectionResult {
                symbol: "XYZ".to_string(),
                expiration: NaiveDate::from_ymd_opt(2026, 11, 6).unwrap(),
                dte: 18,
                put: OptionLeg {
                    streamer_symbol: ".XYZ261106P95".to_string(),
                    strike: dec!(95),
                    bid: Some(dec!(1.05)),
                    ask: Some(dec!(1.15)),
                    delta: -0.31,
                },
                call: OptionLeg {
                    streamer_symbol: ".XYZ261106C105".to_string(),
                    strike: dec!(105),
                    bid: None,
                    ask: None,
                    delta: 0.29,
                },
            }),
            "AUTH" => Err(ScreenError::auth(
                stage::TOKEN_REFRESH_FAILED,
                "https://api.tastyworks.com/oauth/token",
                Some(401),
                "invalid_grant",
            )),
            "NONE" => Err(ScreenError::data_unavailable(
                stage::NO_EXPIRATIONS,
                "no expirations listed for NONE",
            )),
            "THIN" => Err(ScreenError::insufficient_data(
                stage::NO_DELTA_CANDIDATES,
                "no call candidate with a known delta",
            )),
            _ => Err(ScreenError::stream(
                stage::STREAM_FAILED,
                "Authenticated",
                "auth rejected",
            )),
        }
    }
}

#[derive(Default)]
struct FakeOAuth {
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl OAuthFlow for FakeOAuth {
    fn authorization_url(&self, state: &str) -> Result<String> {
        Ok(format!("https://my.tastytrade.com/auth.html?state={state}"))
    }

    async fn complete_authorization(&self, code: &str) -> Result<()> {
        if code == "bad" {
            return Err(ScreenError::auth(
                stage::AUTHORIZATION_CODE_FAILED,
                "https://api.tastyworks.com/oauth/token",
                Some(400),
                "invalid_grant",
            ));
        }
        self.codes.lock().push(code.to_string());
        Ok(())
    }
}

fn app() -> (Router, Arc<FakeOAuth>) {
    let oauth = Arc::new(FakeOAuth::default());
    let router = ApiServer::new(Arc::new(FakeScreener), oauth.clone()).router();
    (router, oauth)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_fetch(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/fetch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ==================== Liveness Tests ====================

#[tokio::test]
async fn test_index_and_health() {
    let (router, _) = app();
    let response = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

// ==================== Fetch Tests ====================

#[tokio::test]
async fn test_fetch_returns_selection() {
    let (router, _) = app();
    let response = router.oneshot(post_fetch(r#"{"symbol":"XYZ"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["symbol"], "XYZ");
    assert_eq!(json["expiration"], "2026-11-06");
    assert_eq!(json["dte"], 18);
    assert_eq!(json["put"]["streamer_symbol"], ".XYZ261106P95");
    assert!(json["call"]["bid"].is_null());
}

#[tokio::test]
async fn test_fetch_error_statuses() {
    let cases = [
        ("AUTH", StatusCode::UNAUTHORIZED, "auth_error", "token_refresh_failed"),
        ("NONE", StatusCode::NOT_FOUND, "data_unavailable", "no_expirations"),
        (
            "THIN",
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_data",
            "no_delta_candidates",
        ),
        ("DOWN", StatusCode::BAD_GATEWAY, "stream_error", "stream_failed"),
    ];
    for (symbol, status, kind, stage) in cases {
        let (router, _) = app();
        let body = format!(r#"{{"symbol":"{symbol}"}}"#);
        let response = router.oneshot(post_fetch(&body)).await.unwrap();

        assert_eq!(response.status(), status, "{symbol}");
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], kind);
        assert_eq!(json["error"]["stage"], stage);
        assert!(json["error"]["details"].is_string());
    }
}

#[tokio::test]
async fn test_fetch_rejects_malformed_body() {
    let (router, _) = app();
    let response = router.clone().oneshot(post_fetch("not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["kind"], "invalid_request");

    let response = router.oneshot(post_fetch("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["stage"], "invalid_symbol");
}

// ==================== OAuth Tests ====================

fn state_from_location(response: &axum::response::Response) -> String {
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    location.split("state=").nth(1).unwrap().to_string()
}

#[tokio::test]
async fn test_authorize_then_callback_installs_code_once() {
    let (router, oauth) = app();

    let response = router.clone().oneshot(get("/oauth/authorize")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let state = state_from_location(&response);
    assert_eq!(state.len(), 36);

    let uri = format!("/oauth/callback?code=abc&state={state}");
    let response = router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(oauth.codes.lock().as_slice(), &["abc".to_string()]);

    // states are single use
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(oauth.codes.lock().len(), 1);
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let (router, oauth) = app();
    let response = router
        .oneshot(get("/oauth/callback?code=abc&state=forged"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["kind"], "invalid_request");
    assert!(oauth.codes.lock().is_empty());
}

#[tokio::test]
async fn test_callback_surfaces_exchange_failure() {
    let (router, _) = app();
    let response = router.clone().oneshot(get("/oauth/authorize")).await.unwrap();
    let state = state_from_location(&response);

    let uri = format!("/oauth/callback?code=bad&state={state}");
    let response = router.oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["stage"], "authorization_code_failed");
}

#[tokio::test]
async fn test_repeated_authorize_keeps_pending_states_bounded() {
    let server = ApiServer::new(Arc::new(FakeScreener), Arc::new(FakeOAuth::default()));
    let router = server.router();

    let mut last_state = String::new();
    for _ in 0..MAX_PENDING_STATES * 3 {
        let response = router.clone().oneshot(get("/oauth/authorize")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        last_state = state_from_location(&response);
    }

    assert_eq!(server.state().pending_states.len(), MAX_PENDING_STATES);

    // the newest state is still redeemable
    let uri = format!("/oauth/callback?code=abc&state={last_state}");
    let response = router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
