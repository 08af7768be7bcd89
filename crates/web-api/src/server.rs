use crate::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use crate::oauth_state::PendingStates;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use wheel_scan_core::traits::{OAuthFlow, ScreenService};

#[derive(Clone)]
pub struct AppState {
    pub screener: Arc<dyn ScreenService>,
    pub oauth: Arc<dyn OAuthFlow>,
    /// OAuth `state` values issued by `/oauth/authorize` and not yet used.
    pub pending_states: Arc<PendingStates>,
}

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub fn new(screener: Arc<dyn ScreenService>, oauth: Arc<dyn OAuthFlow>) -> Self {
        Self {
            state: AppState {
                screener,
                oauth,
                pending_states: Arc::new(PendingStates::default()),
            },
        }
    }

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .route("/fetch", post(handlers::fetch))
            .route("/oauth/authorize", get(handlers::authorize))
            .route("/oauth/callback", get(handlers::callback))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "wheel-scan API listening");

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
