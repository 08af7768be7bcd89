pub mod config;
pub mod config_loader;
pub mod error;
pub mod symbol;
pub mod traits;
pub mod types;

pub use config::{AppConfig, ScreenerConfig, ServerConfig, TastytradeConfig};
pub use config_loader::ConfigLoader;
pub use error::{ScreenError, Result};
pub use symbol::normalize_symbol;
pub use traits::{
    AccessTokenSource, MarketDataStream, OAuthFlow, OptionChainProvider, QuoteTokenProvider,
    ScreenService,
};
pub use types::{
    ChainExpiration, GreeksSnapshot, MarketSnapshot, OptionChain, OptionLeg, OptionRight,
    QuoteSnapshot, QuoteToken, SelectionResult, Strike,
};
