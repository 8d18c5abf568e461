//! Forecast combination strategies
//!
//! The combiner is total: given three well-formed forecasts it always
//! produces a combined path. After blending, any step whose high falls
//! below its low is replaced by a small symmetric spread around the
//! step mean so the output keeps a positive high/low gap.

use serde::{Deserialize, Serialize};

use crate::domain::{ForecastResult, HORIZON};
use crate::ensemble::weights::EnsembleWeights;

/// Spread applied around the mean when a blended step inverts
const CORRECTION_SPREAD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineStrategy {
    /// Fixed-weight linear blend
    #[default]
    Weighted,
    /// Per-step median of the three models
    Median,
    /// Weights renormalized from inverse historical error
    ErrorAdaptive,
}

/// Blended 7-step path plus which steps needed the inversion fix
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedForecast {
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub corrected_steps: Vec<usize>,
}

impl CombinedForecast {
    pub fn is_well_formed(&self) -> bool {
        self.highs.len() == HORIZON
            && self.lows.len() == HORIZON
            && self
                .highs
                .iter()
                .zip(&self.lows)
                .all(|(h, l)| h.is_finite() && l.is_finite() && h >= l)
    }
}

#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    weights: EnsembleWeights,
    strategy: CombineStrategy,
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self {
            weights: EnsembleWeights::default(),
            strategy: CombineStrategy::Weighted,
        }
    }
}

impl EnsembleCombiner {
    pub fn new(weights: EnsembleWeights, strategy: CombineStrategy) -> Self {
        Self { weights, strategy }
    }

    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    /// Blend the three forecasts step by step. `errors` feeds the
    /// error-adaptive strategy and is ignored by the others.
    pub fn combine(
        &self,
        statistical: &ForecastResult,
        sequence: &ForecastResult,
        seasonal: &ForecastResult,
        errors: Option<[f64; 3]>,
    ) -> CombinedForecast {
        let weights = match self.strategy {
            CombineStrategy::ErrorAdaptive => match errors {
                Some([s, q, n]) => EnsembleWeights::from_errors(s, q, n),
                None => EnsembleWeights::from_errors(0.0, 0.0, 0.0),
            },
            _ => self.weights,
        };

        let mut highs = Vec::with_capacity(HORIZON);
        let mut lows = Vec::with_capacity(HORIZON);
        for step in 0..HORIZON {
            let (high, low) = match self.strategy {
                CombineStrategy::Median => (
                    median3(
                        statistical.highs[step],
                        sequence.highs[step],
                        seasonal.highs[step],
                    ),
                    median3(
                        statistical.lows[step],
                        sequence.lows[step],
                        seasonal.lows[step],
                    ),
                ),
                _ => (
                    weights.statistical * statistical.highs[step]
                        + weights.sequence * sequence.highs[step]
                        + weights.seasonal * seasonal.highs[step],
                    weights.statistical * statistical.lows[step]
                        + weights.sequence * sequence.lows[step]
                        + weights.seasonal * seasonal.lows[step],
                ),
            };
            highs.push(high);
            lows.push(low);
        }
        correct_inversions(highs, lows)
    }
}

/// Replace any inverted step with a spread around the step mean so the
/// high always clears the low.
fn correct_inversions(mut highs: Vec<f64>, mut lows: Vec<f64>) -> CombinedForecast {
    let mut corrected_steps = Vec::new();
    for step in 0..highs.len() {
        if highs[step] < lows[step] {
            let mean = (highs[step] + lows[step]) / 2.0;
            highs[step] = mean * (1.0 + CORRECTION_SPREAD);
            lows[step] = mean * (1.0 - CORRECTION_SPREAD);
            corrected_steps.push(step);
        }
    }
    if !corrected_steps.is_empty() {
        tracing::debug!(steps = ?corrected_steps, "corrected inverted forecast steps");
    }
    CombinedForecast {
        highs,
        lows,
        corrected_steps,
    }
}

fn median3(a: f64, b: f64, c: f64) -> f64 {
    a.max(b).min(a.min(b).max(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelId;
    use approx::assert_relative_eq;

    fn flat(high: f64, low: f64, source: ModelId) -> ForecastResult {
        ForecastResult::broadcast(high, low, source)
    }

    // Builds the result verbatim. `broadcast` repairs inverted pairs on
    // the way in, so tests of the combiner's own inversion handling
    // need paths that arrive inverted.
    fn raw(high: f64, low: f64, source: ModelId) -> ForecastResult {
        ForecastResult {
            highs: vec![high; HORIZON],
            lows: vec![low; HORIZON],
            source,
        }
    }

    #[test]
    fn weighted_blend_without_correction() {
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(
            &flat(110.0, 100.0, ModelId::Statistical),
            &flat(90.0, 80.0, ModelId::Sequence),
            &flat(95.0, 85.0, ModelId::Seasonal),
            None,
        );
        for step in 0..HORIZON {
            assert_relative_eq!(out.highs[step], 96.5);
            assert_relative_eq!(out.lows[step], 86.5);
        }
        assert!(out.corrected_steps.is_empty());
        assert!(out.is_well_formed());
    }

    #[test]
    fn inversion_triggers_mean_spread_correction() {
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(
            &raw(70.0, 75.0, ModelId::Statistical),
            &raw(60.0, 65.0, ModelId::Sequence),
            &raw(50.0, 90.0, ModelId::Seasonal),
            None,
        );
        // blended high 59.5, low 75.0, mean 67.25
        for step in 0..HORIZON {
            assert_relative_eq!(out.highs[step], 67.9225);
            assert_relative_eq!(out.lows[step], 66.5775);
        }
        assert_eq!(out.corrected_steps.len(), HORIZON);
        assert!(out.is_well_formed());
    }

    #[test]
    fn correct_inversions_only_touches_inverted_steps() {
        let highs = vec![100.0, 40.0, 100.0, 100.0, 100.0, 100.0, 100.0];
        let lows = vec![90.0, 60.0, 90.0, 90.0, 90.0, 90.0, 90.0];
        let out = correct_inversions(highs, lows);
        assert_eq!(out.corrected_steps, vec![1]);
        // inverted step collapses to mean 50 with the 1% spread
        assert_relative_eq!(out.highs[1], 50.5);
        assert_relative_eq!(out.lows[1], 49.5);
        assert_relative_eq!(out.highs[0], 100.0);
        assert_relative_eq!(out.lows[0], 90.0);
        assert!(out.is_well_formed());
    }

    #[test]
    fn equal_high_and_low_is_left_alone() {
        let combiner = EnsembleCombiner::default();
        let out = combiner.combine(
            &flat(50.0, 50.0, ModelId::Statistical),
            &flat(50.0, 50.0, ModelId::Sequence),
            &flat(50.0, 50.0, ModelId::Seasonal),
            None,
        );
        for step in 0..HORIZON {
            assert_relative_eq!(out.highs[step], 50.0);
            assert_relative_eq!(out.lows[step], 50.0);
        }
        assert!(out.corrected_steps.is_empty());
    }

    #[test]
    fn median_strategy_discards_the_outlier() {
        let combiner =
            EnsembleCombiner::new(EnsembleWeights::default(), CombineStrategy::Median);
        let out = combiner.combine(
            &flat(100.0, 90.0, ModelId::Statistical),
            &flat(102.0, 92.0, ModelId::Sequence),
            &flat(500.0, 400.0, ModelId::Seasonal),
            None,
        );
        assert_relative_eq!(out.highs[0], 102.0);
        assert_relative_eq!(out.lows[0], 92.0);
    }

    #[test]
    fn error_adaptive_without_history_uses_uniform_weights() {
        let combiner =
            EnsembleCombiner::new(EnsembleWeights::default(), CombineStrategy::ErrorAdaptive);
        let out = combiner.combine(
            &flat(90.0, 80.0, ModelId::Statistical),
            &flat(120.0, 110.0, ModelId::Sequence),
            &flat(150.0, 140.0, ModelId::Seasonal),
            None,
        );
        assert_relative_eq!(out.highs[0], 120.0, epsilon = 1e-9);
        assert_relative_eq!(out.lows[0], 110.0, epsilon = 1e-9);
    }

    #[test]
    fn median3_orders_correctly() {
        assert_relative_eq!(median3(1.0, 2.0, 3.0), 2.0);
        assert_relative_eq!(median3(3.0, 1.0, 2.0), 2.0);
        assert_relative_eq!(median3(2.0, 3.0, 1.0), 2.0);
        assert_relative_eq!(median3(5.0, 5.0, 1.0), 5.0);
    }
}
