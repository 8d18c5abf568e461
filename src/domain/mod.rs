//! Domain Layer - Core types for the forecasting pipeline
//!
//! Pure data types with no dependencies beyond chrono/serde: raw OHLCV
//! series, per-model forecast results and the final report. Everything
//! here is request-scoped; nothing survives past one `forecast()` call.

pub mod forecast;
pub mod series;

pub use forecast::{
    ForecastDay, ForecastResult, ModelId, PredictionReport, PriceSnapshot, HORIZON,
};
pub use series::{OhlcvBar, RawSeries, ValidationError, MIN_HISTORY};
