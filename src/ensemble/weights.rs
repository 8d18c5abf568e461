//! Per-model blend weights
//!
//! Weights are immutable once constructed and passed explicitly to the
//! combiner, never read from shared state, so tests and alternative
//! strategies can swap weight sets freely.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ModelId;

const SUM_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeightsError {
    #[error("weight for {model} is negative: {value}")]
    Negative { model: ModelId, value: f64 },
    #[error("weights sum to {sum}, expected 1.0")]
    SumNotOne { sum: f64 },
    #[error("weight for {model} is not finite")]
    NonFinite { model: ModelId },
}

/// Non-negative weights over the three models, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub statistical: f64,
    pub sequence: f64,
    pub seasonal: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            statistical: 0.25,
            sequence: 0.45,
            seasonal: 0.30,
        }
    }
}

impl EnsembleWeights {
    pub fn new(statistical: f64, sequence: f64, seasonal: f64) -> Result<Self, WeightsError> {
        let weights = Self {
            statistical,
            sequence,
            seasonal,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for (model, value) in [
            (ModelId::Statistical, self.statistical),
            (ModelId::Sequence, self.sequence),
            (ModelId::Seasonal, self.seasonal),
        ] {
            if !value.is_finite() {
                return Err(WeightsError::NonFinite { model });
            }
            if value < 0.0 {
                return Err(WeightsError::Negative { model, value });
            }
        }
        let sum = self.statistical + self.sequence + self.seasonal;
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(WeightsError::SumNotOne { sum });
        }
        Ok(())
    }

    pub fn get(&self, model: ModelId) -> f64 {
        match model {
            ModelId::Statistical => self.statistical,
            ModelId::Sequence => self.sequence,
            ModelId::Seasonal => self.seasonal,
        }
    }

    /// Weights inversely proportional to historical per-model error.
    /// Zero or missing total error yields the uniform split.
    pub fn from_errors(statistical: f64, sequence: f64, seasonal: f64) -> Self {
        const FLOOR: f64 = 1e-9;
        let errors = [statistical, sequence, seasonal];
        if errors.iter().any(|e| !e.is_finite() || *e < 0.0)
            || errors.iter().sum::<f64>() <= FLOOR
        {
            return Self {
                statistical: 1.0 / 3.0,
                sequence: 1.0 / 3.0,
                seasonal: 1.0 / 3.0,
            };
        }
        let inverses: Vec<f64> = errors.iter().map(|e| 1.0 / e.max(FLOOR)).collect();
        let total: f64 = inverses.iter().sum();
        Self {
            statistical: inverses[0] / total,
            sequence: inverses[1] / total,
            seasonal: inverses[2] / total,
        }
    }
}
