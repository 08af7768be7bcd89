//! tastytrade integration for the wheel delta screener.
//!
//! This crate provides:
//! - REST client with rate limiting for option chains, quote tokens and the
//!   OAuth token endpoint
//! - OAuth2 token manager with probe-then-refresh and single-flight refreshes
//! - DXLink streaming client that snapshots quotes and greeks within a deadline
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wheel_scan_tastytrade::{
//!     DxLinkConfig, DxLinkStreamer, InMemoryTokenStore, OAuthCredentials, TastytradeClient,
//!     TastytradeClientConfig, TokenManager,
//! };
//!
//! let client = Arc::new(TastytradeClient::new(TastytradeClientConfig::default())?);
//! let (credentials, pair) = OAuthCredentials::from_app_config(&config.tastytrade);
//! let tokens = TokenManager::new(client.clone(), credentials, Arc::new(InMemoryTokenStore::new(pair)));
//!
//! let access = tokens.valid_access_token().await?;
//! let quote_token = client.quote_token(&access).await?;
//! let snapshot = DxLinkStreamer::new(DxLinkConfig::default())
//!     .collect(&quote_token, &symbols, CancellationToken::new())
//!     .await?;
//! ```
//!
//! # API Endpoints
//!
//! - `POST /oauth/token` - refresh and authorization-code grants
//! - `GET /customers/me` - access token probe
//! - `GET /option-chains/{symbol}/nested` - nested option chain
//! - `GET /api-quote-tokens` - scoped DXLink token

pub mod auth;
pub mod client;
pub mod dxlink;
pub mod error;
pub mod types;

pub use auth::{InMemoryTokenStore, OAuthCredentials, TokenManager, TokenPair, TokenStore};
pub use client::{TastytradeClient, TastytradeClientConfig};
pub use dxlink::{DxLinkConfig, DxLinkStreamer, FeedConnector, FeedTransport, StreamState, WsConnector};
pub use error::{Result, TastytradeError};
