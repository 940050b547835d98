pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::links::LinkIssuer;
pub use app::market_service::MarketService;
pub use error::MarketError;
pub use infra::config::Config;
pub use storage::{MarketStore, MemoryStore, PgMarketStore};
