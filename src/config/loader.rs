//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching the
//! config.toml structure.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::application::PipelineConfig;
use crate::ensemble::{CombineStrategy, EnsembleWeights};
use crate::models::{ArimaConfig, SeasonalConfig, SequenceConfig};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub provider: ProviderSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub weights: WeightsSection,
    #[serde(default)]
    pub models: ModelsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Historical data provider section
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    /// Alpha Vantage query endpoint
    pub api_url: String,
    /// API key; ALPHAVANTAGE_API_KEY env var takes precedence
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Pipeline tuning section
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// Rows requested from the provider per forecast
    pub lookback: usize,
    /// Per-model fit deadline in seconds
    pub model_deadline_seconds: u64,
    /// Cap on concurrent model fits
    pub max_concurrent_fits: usize,
    /// Combination strategy: "weighted", "median", "error-adaptive"
    pub strategy: CombineStrategy,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            lookback: 500,
            model_deadline_seconds: 60,
            max_concurrent_fits: 4,
            strategy: CombineStrategy::Weighted,
        }
    }
}

/// Ensemble weights section
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsSection {
    pub statistical: f64,
    pub sequence: f64,
    pub seasonal: f64,
}

impl Default for WeightsSection {
    fn default() -> Self {
        let weights = EnsembleWeights::default();
        Self {
            statistical: weights.statistical,
            sequence: weights.sequence,
            seasonal: weights.seasonal,
        }
    }
}

/// Per-model hyperparameter section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ModelsSection {
    #[serde(default)]
    pub arima: ArimaConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
    #[serde(default)]
    pub seasonal: SeasonalConfig,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.api_url cannot be empty".to_string(),
            ));
        }

        if self.pipeline.lookback < crate::domain::MIN_HISTORY {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.lookback must be >= {}, got {}",
                crate::domain::MIN_HISTORY,
                self.pipeline.lookback
            )));
        }

        if self.pipeline.model_deadline_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.model_deadline_seconds must be > 0".to_string(),
            ));
        }

        if self.pipeline.max_concurrent_fits == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_concurrent_fits must be > 0".to_string(),
            ));
        }

        self.ensemble_weights()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.models.sequence.window == 0 || self.models.sequence.epochs == 0 {
            return Err(ConfigError::ValidationError(
                "models.sequence window and epochs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn ensemble_weights(&self) -> EnsembleWeights {
        EnsembleWeights {
            statistical: self.weights.statistical,
            sequence: self.weights.sequence,
            seasonal: self.weights.seasonal,
        }
    }

    /// Get API key with environment variable override.
    /// Checks ALPHAVANTAGE_API_KEY first, falls back to the config value.
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("ALPHAVANTAGE_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.api_key_from_file()
    }

    fn api_key_from_file(&self) -> Option<String> {
        self.provider
            .api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .cloned()
    }

    /// Build the pipeline configuration from the loaded sections
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            lookback: self.pipeline.lookback,
            model_deadline: Duration::from_secs(self.pipeline.model_deadline_seconds),
            max_concurrent_fits: self.pipeline.max_concurrent_fits,
            weights: self.ensemble_weights(),
            strategy: self.pipeline.strategy,
            arima: self.models.arima.clone(),
            sequence: self.models.sequence.clone(),
            seasonal: self.models.seasonal.clone(),
        }
    }
}
