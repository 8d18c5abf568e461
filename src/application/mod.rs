//! Application layer: the forecast pipeline orchestrator

pub mod pipeline;

pub use pipeline::{ForecastPipeline, OrchestrationError, PipelineConfig, PipelineOutcome};
