use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RawSeries;

/// Historical data retrieval error type
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("provider rejected the request: {0}")]
    Provider(String),

    #[error("rate limit hit: {0}")]
    RateLimited(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("response parsing error: {0}")]
    Parse(String),
}

/// Source of daily OHLCV history for a symbol.
///
/// Implementations return rows in any order with possible duplicates;
/// the pipeline sorts and deduplicates before validation. The only hard
/// contract is at least 100 usable rows or a `FetchError`.
#[async_trait]
pub trait HistoricalDataPort: Send + Sync {
    /// Fetch up to `lookback` most recent daily bars for `symbol`.
    async fn fetch(&self, symbol: &str, lookback: usize) -> Result<RawSeries, FetchError>;
}
