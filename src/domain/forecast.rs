//! Per-model forecast results and the final prediction report
//!
//! Every forecaster produces a [`ForecastResult`] covering exactly
//! [`HORIZON`] days with `high >= low` enforced per step. The pipeline
//! blends three of them into a [`PredictionReport`].

use serde::Serialize;
use std::fmt;

/// Fixed forecast horizon in days
pub const HORIZON: usize = 7;

/// Identifier of one of the three ensemble members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelId {
    Statistical,
    Sequence,
    Seasonal,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Statistical => "statistical",
            ModelId::Sequence => "sequence",
            ModelId::Seasonal => "seasonal",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 7-day high/low forecast from a single model
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub source: ModelId,
}

impl ForecastResult {
    /// Build a result from per-step paths, swapping any step where the
    /// model produced `high < low` (illogical-order correction).
    ///
    /// Both paths must cover exactly [`HORIZON`] steps; forecasters
    /// guarantee this by construction.
    pub fn from_paths(mut highs: Vec<f64>, mut lows: Vec<f64>, source: ModelId) -> Self {
        debug_assert_eq!(highs.len(), HORIZON);
        debug_assert_eq!(lows.len(), HORIZON);
        for (h, l) in highs.iter_mut().zip(lows.iter_mut()) {
            if *h < *l {
                std::mem::swap(h, l);
            }
        }
        Self {
            highs,
            lows,
            source,
        }
    }

    /// Degraded result: the last observed high/low broadcast across the
    /// whole horizon. Used as the per-model fallback.
    pub fn broadcast(high: f64, low: f64, source: ModelId) -> Self {
        Self::from_paths(vec![high; HORIZON], vec![low; HORIZON], source)
    }

    /// Invariant check used by tests and the combiner.
    pub fn is_well_formed(&self) -> bool {
        self.highs.len() == HORIZON
            && self.lows.len() == HORIZON
            && self
                .highs
                .iter()
                .zip(self.lows.iter())
                .all(|(h, l)| h.is_finite() && l.is_finite() && h >= l)
    }
}

/// Most recent actual prices, anchoring the report
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceSnapshot {
    pub high: f64,
    pub low: f64,
}

/// One horizon step of the final report (day 1 = tomorrow)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ForecastDay {
    pub day: u8,
    pub high: f64,
    pub low: f64,
}

/// Final output of one pipeline run; not persisted anywhere
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub symbol: String,
    pub current: PriceSnapshot,
    pub days: Vec<ForecastDay>,
}
