//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract the
//! collaborators the forecasting core depends on:
//! - Historical market data (daily OHLCV series per symbol)

pub mod market_data;
pub mod mocks;

pub use market_data::{FetchError, HistoricalDataPort};
pub use mocks::StaticHistoryPort;
