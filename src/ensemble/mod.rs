//! Ensemble combination of the three model forecasts

pub mod combiner;
pub mod weights;

pub use combiner::{CombineStrategy, CombinedForecast, EnsembleCombiner};
pub use weights::{EnsembleWeights, WeightsError};
