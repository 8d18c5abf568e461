use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::RawSeries;
use crate::ports::market_data::{FetchError, HistoricalDataPort};

/// Mock history port that records calls and serves canned series
#[derive(Debug, Default)]
pub struct StaticHistoryPort {
    calls: Arc<Mutex<Vec<(String, usize)>>>,
    responses: Arc<Mutex<HashMap<String, RawSeries>>>,
}

impl StaticHistoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the series returned for a symbol
    pub fn with_series(self, series: RawSeries) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(series.symbol.clone(), series);
        self
    }

    /// Get all recorded (symbol, lookback) calls
    pub fn get_calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoricalDataPort for StaticHistoryPort {
    async fn fetch(&self, symbol: &str, lookback: usize) -> Result<RawSeries, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), lookback));
        self.responses
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| FetchError::UnknownSymbol(symbol.to_string()))
    }
}
