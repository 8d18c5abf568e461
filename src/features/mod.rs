//! Feature Layer - turns a raw OHLCV series into model-ready inputs
//!
//! One pass over the validated series produces an immutable
//! [`ProcessedDataset`]: capped history, rolling statistics, min-max
//! scaled high/low columns with their invertible scalers, and the
//! date/value frames consumed by the seasonal-trend model.

pub mod preprocessor;
pub mod rolling;
pub mod scaler;

pub use preprocessor::{preprocess, ProcessedDataset, ValueFrame, MAX_HISTORY};
pub use scaler::MinMaxScaler;
