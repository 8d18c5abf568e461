//! Model Layer - the three ensemble members
//!
//! - `stationarity`: ADF unit-root test and differencing-order selection
//! - `statistical`: ARIMA-style forecaster (p=5, q=2, d from the selector)
//! - `sequence`: recurrent network with autoregressive 7-step rollout
//! - `seasonal`: additive trend + Fourier seasonality model
//!
//! Each forecaster exposes a fallible `forecast(&ProcessedDataset)`;
//! the orchestrator converts failures into a [`ModelOutcome::Fallback`]
//! rather than letting them abort the request.

pub mod seasonal;
pub mod sequence;
pub mod stationarity;
pub mod statistical;

use thiserror::Error;

use crate::domain::ForecastResult;

pub use seasonal::{SeasonalConfig, SeasonalTrendForecaster};
pub use sequence::{SequenceConfig, SequenceForecaster};
pub use stationarity::{adf_test, select_difference_order, AdfResult, MAX_DIFF_ORDER};
pub use statistical::{ArimaConfig, StatisticalForecaster};

/// Failure of a single forecaster's fit or predict step. Recovered
/// locally via the broadcast-last-value fallback; never fatal.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("insufficient data: {got} usable points (need at least {need})")]
    InsufficientData { got: usize, need: usize },
    #[error("singular regression matrix in {stage}")]
    SingularMatrix { stage: &'static str },
    #[error("non-finite value produced in {stage}")]
    NonFinite { stage: &'static str },
    #[error("training diverged: loss became non-finite at epoch {epoch}")]
    Diverged { epoch: usize },
    #[error("model fit exceeded its deadline")]
    DeadlineExceeded,
    #[error("model task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of running one forecaster, carrying either a fitted result
/// or the degraded fallback plus the original failure reason. The
/// orchestrator inspects the variant instead of catching panics.
#[derive(Debug, Clone)]
pub enum ModelOutcome {
    Fitted(ForecastResult),
    Fallback {
        result: ForecastResult,
        reason: ModelError,
    },
}

impl ModelOutcome {
    pub fn result(&self) -> &ForecastResult {
        match self {
            ModelOutcome::Fitted(result) => result,
            ModelOutcome::Fallback { result, .. } => result,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ModelOutcome::Fallback { .. })
    }
}
