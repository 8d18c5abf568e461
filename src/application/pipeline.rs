//! Forecast Pipeline Orchestrator
//!
//! Coordinates one forecast request end to end: fetch history, validate
//! and preprocess, run the three forecasters concurrently, combine, and
//! assemble the report. Validation and preprocessing failures are fatal
//! to the request; a failure inside any single forecaster is absorbed
//! by substituting a broadcast of the last observed value for that
//! model, so the pipeline either returns a complete 7-day report or a
//! single upfront error, never a partial result.
//!
//! Model fitting is CPU-bound, so each fit runs on the blocking thread
//! pool behind a shared semaphore that caps concurrent fits across
//! requests. Each fit also carries a deadline; exceeding it counts as a
//! model failure and triggers that model's fallback.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{
    ForecastDay, ForecastResult, ModelId, PredictionReport, PriceSnapshot, ValidationError,
    HORIZON,
};
use crate::ensemble::{CombineStrategy, EnsembleCombiner, EnsembleWeights};
use crate::features::preprocess;
use crate::models::{
    ArimaConfig, ModelError, ModelOutcome, SeasonalConfig, SeasonalTrendForecaster,
    SequenceConfig, SequenceForecaster, StatisticalForecaster,
};
use crate::ports::market_data::{FetchError, HistoricalDataPort};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("input validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("history fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Tunables for one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rows requested from the history provider
    pub lookback: usize,
    /// Per-model fit deadline; exceeding it triggers that model's fallback
    pub model_deadline: Duration,
    /// Cap on simultaneously running model fits across all requests
    pub max_concurrent_fits: usize,
    pub weights: EnsembleWeights,
    pub strategy: CombineStrategy,
    pub arima: ArimaConfig,
    pub sequence: SequenceConfig,
    pub seasonal: SeasonalConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: 500,
            model_deadline: Duration::from_secs(60),
            max_concurrent_fits: 4,
            weights: EnsembleWeights::default(),
            strategy: CombineStrategy::Weighted,
            arima: ArimaConfig::default(),
            sequence: SequenceConfig::default(),
            seasonal: SeasonalConfig::default(),
        }
    }
}

/// One full pipeline run: the report plus per-model outcomes so callers
/// can see which forecasters fell back and why.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: PredictionReport,
    pub statistical: ModelOutcome,
    pub sequence: ModelOutcome,
    pub seasonal: ModelOutcome,
    /// Horizon steps where the combiner fixed an inverted high/low pair
    pub corrected_steps: Vec<usize>,
}

pub struct ForecastPipeline {
    port: Arc<dyn HistoricalDataPort>,
    combiner: EnsembleCombiner,
    config: PipelineConfig,
    fit_pool: Arc<tokio::sync::Semaphore>,
}

impl ForecastPipeline {
    pub fn new(port: Arc<dyn HistoricalDataPort>, config: PipelineConfig) -> Self {
        let combiner = EnsembleCombiner::new(config.weights, config.strategy);
        let fit_pool = Arc::new(tokio::sync::Semaphore::new(config.max_concurrent_fits.max(1)));
        Self {
            port,
            combiner,
            config,
            fit_pool,
        }
    }

    /// Run one forecast request for `symbol`.
    pub async fn forecast(&self, symbol: &str) -> Result<PipelineOutcome, OrchestrationError> {
        let series = self.port.fetch(symbol, self.config.lookback).await?;
        series.validate()?;
        let dataset = Arc::new(preprocess(&series)?);
        tracing::info!(symbol, rows = dataset.len(), "preprocessed history");

        let anchor = PriceSnapshot {
            high: dataset.last_high(),
            low: dataset.last_low(),
        };

        let arima = StatisticalForecaster::new(self.config.arima.clone());
        let sequence = SequenceForecaster::new(self.config.sequence.clone());
        let seasonal = SeasonalTrendForecaster::new(self.config.seasonal.clone());

        let (statistical, sequence, seasonal) = tokio::join!(
            self.run_model(ModelId::Statistical, anchor, {
                let ds = Arc::clone(&dataset);
                move || arima.forecast(&ds)
            }),
            self.run_model(ModelId::Sequence, anchor, {
                let ds = Arc::clone(&dataset);
                move || sequence.forecast(&ds)
            }),
            self.run_model(ModelId::Seasonal, anchor, {
                let ds = Arc::clone(&dataset);
                move || seasonal.forecast(&ds)
            }),
        );

        let combined = self.combiner.combine(
            statistical.result(),
            sequence.result(),
            seasonal.result(),
            None,
        );
        debug_assert!(combined.is_well_formed());

        let days = (0..HORIZON)
            .map(|step| ForecastDay {
                day: step as u8 + 1,
                high: combined.highs[step],
                low: combined.lows[step],
            })
            .collect();

        Ok(PipelineOutcome {
            report: PredictionReport {
                symbol: symbol.to_string(),
                current: anchor,
                days,
            },
            statistical,
            sequence,
            seasonal,
            corrected_steps: combined.corrected_steps,
        })
    }

    /// Run one model fit on the blocking pool under the shared permit
    /// cap and the per-model deadline. Any failure becomes a fallback
    /// broadcasting the last observed high/low.
    async fn run_model<F>(&self, model: ModelId, anchor: PriceSnapshot, fit: F) -> ModelOutcome
    where
        F: FnOnce() -> Result<ForecastResult, ModelError> + Send + 'static,
    {
        let fallback = ForecastResult::broadcast(anchor.high, anchor.low, model);
        let permit = match Arc::clone(&self.fit_pool).acquire_owned().await {
            Ok(permit) => permit,
            Err(closed) => {
                return fallback_outcome(model, fallback, ModelError::TaskFailed(closed.to_string()))
            }
        };

        let job = tokio::task::spawn_blocking(fit);
        let outcome = match tokio::time::timeout(self.config.model_deadline, job).await {
            Err(_) => fallback_outcome(model, fallback, ModelError::DeadlineExceeded),
            Ok(Err(join_err)) => {
                fallback_outcome(model, fallback, ModelError::TaskFailed(join_err.to_string()))
            }
            Ok(Ok(Err(model_err))) => fallback_outcome(model, fallback, model_err),
            Ok(Ok(Ok(result))) => ModelOutcome::Fitted(result),
        };
        drop(permit);
        outcome
    }
}

fn fallback_outcome(model: ModelId, fallback: ForecastResult, reason: ModelError) -> ModelOutcome {
    tracing::warn!(%model, %reason, "forecaster fell back to last observed value");
    ModelOutcome::Fallback {
        result: fallback,
        reason,
    }
}
