//! Raw OHLCV series and input validation

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of daily bars required before a forecast is attempted
pub const MIN_HISTORY: usize = 100;

/// One daily OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Historical price series for a single symbol, ordered by date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSeries {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
}

/// Input validation errors; fatal to the request
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("series for {symbol} too short: {got} rows (minimum {min})")]
    TooShort {
        symbol: String,
        got: usize,
        min: usize,
    },
    #[error("non-finite {field} value at row {index}")]
    NonFinite { field: &'static str, index: usize },
    #[error("too few rows after removing duplicate dates: {got}")]
    Degenerate { got: usize },
}

impl RawSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Check the caller-side contract: enough history and finite prices.
    /// Ordering and duplicate dates are repaired by the preprocessor, so
    /// they are not rejected here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bars.len() < MIN_HISTORY {
            return Err(ValidationError::TooShort {
                symbol: self.symbol.clone(),
                got: self.bars.len(),
                min: MIN_HISTORY,
            });
        }
        for (index, bar) in self.bars.iter().enumerate() {
            for (field, value) in [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
                ("volume", bar.volume),
            ] {
                if !value.is_finite() {
                    return Err(ValidationError::NonFinite { field, index });
                }
            }
        }
        Ok(())
    }
}
