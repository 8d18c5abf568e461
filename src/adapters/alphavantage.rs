//! Alpha Vantage API Client
//!
//! HTTP client for the Alpha Vantage TIME_SERIES_DAILY endpoint.
//! Handles retries, the service's soft error envelopes (rate-limit
//! notes and error messages arrive as HTTP 200 bodies), and conversion
//! into the domain series type.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::{OhlcvBar, RawSeries};
use crate::ports::market_data::{FetchError, HistoricalDataPort};

/// Alpha Vantage client configuration
#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    /// Base URL for the query endpoint
    pub api_base_url: String,
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Number of retry attempts
    pub max_retries: u32,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.alphavantage.co/query".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Daily OHLCV history client
#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    config: AlphaVantageConfig,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    /// Rate-limit notices arrive in this field with HTTP 200
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: String) -> Result<Self, FetchError> {
        Self::with_config(AlphaVantageConfig {
            api_key,
            ..AlphaVantageConfig::default()
        })
    }

    pub fn with_config(config: AlphaVantageConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    async fn get_daily(&self, symbol: &str, lookback: usize) -> Result<String, FetchError> {
        // The compact output is capped at 100 rows, below the pipeline
        // minimum, so anything longer needs the full dump.
        let outputsize = if lookback > 100 { "full" } else { "compact" };
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            let response = self
                .http
                .get(&self.config.api_base_url)
                .query(&[
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol),
                    ("outputsize", outputsize),
                    ("apikey", &self.config.api_key),
                ])
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    return response
                        .text()
                        .await
                        .map_err(|e| FetchError::Transport(e.to_string()));
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                    tracing::warn!(
                        "rate limited (429), backing off for {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        self.config.max_retries
                    );
                    last_error = Some(FetchError::RateLimited("HTTP 429".into()));
                    tokio::time::sleep(backoff).await;
                }
                Ok(response) if response.status().is_server_error() => {
                    last_error =
                        Some(FetchError::Provider(format!("server error: {}", response.status())));
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
                Ok(response) => {
                    return Err(FetchError::Provider(format!(
                        "unexpected status {}",
                        response.status()
                    )));
                }
                Err(e) => {
                    last_error = Some(FetchError::Transport(e.to_string()));
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::Transport("max retries exceeded".into())))
    }
}

#[async_trait]
impl HistoricalDataPort for AlphaVantageClient {
    async fn fetch(&self, symbol: &str, lookback: usize) -> Result<RawSeries, FetchError> {
        let body = self.get_daily(symbol, lookback).await?;
        let mut series = parse_daily_series(symbol, &body)?;
        if series.bars.len() > lookback {
            let start = series.bars.len() - lookback;
            series.bars.drain(..start);
        }
        tracing::debug!(symbol, rows = series.bars.len(), "fetched daily history");
        Ok(series)
    }
}

/// Parse a TIME_SERIES_DAILY body into an ascending-date series.
///
/// Kept free of the HTTP layer so it can be tested against canned
/// payloads.
pub fn parse_daily_series(symbol: &str, body: &str) -> Result<RawSeries, FetchError> {
    let parsed: DailyResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if let Some(message) = parsed.error_message {
        return Err(FetchError::UnknownSymbol(message));
    }
    if let Some(note) = parsed.note.or(parsed.information) {
        return Err(FetchError::RateLimited(note));
    }
    let series = parsed
        .series
        .ok_or_else(|| FetchError::Parse("missing Time Series (Daily) field".into()))?;

    // BTreeMap keys are ISO dates, so iteration is already ascending
    let mut bars = Vec::with_capacity(series.len());
    for (date, bar) in series {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| FetchError::Parse(format!("bad date {date}: {e}")))?;
        bars.push(OhlcvBar {
            date,
            open: parse_field(&bar.open, "open")?,
            high: parse_field(&bar.high, "high")?,
            low: parse_field(&bar.low, "low")?,
            close: parse_field(&bar.close, "close")?,
            volume: parse_field(&bar.volume, "volume")?,
        });
    }
    Ok(RawSeries::new(symbol, bars))
}

fn parse_field(raw: &str, field: &str) -> Result<f64, FetchError> {
    raw.parse::<f64>()
        .map_err(|e| FetchError::Parse(format!("bad {field} value {raw:?}: {e}")))
}
