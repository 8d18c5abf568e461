//! CLI Adapter
//!
//! Command-line interface for the forecaster.
//! Uses clap derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// hilo-forecast - 7-day high/low price forecaster
#[derive(Parser, Debug)]
#[command(
    name = "hilo-forecast",
    version = env!("CARGO_PKG_VERSION"),
    about = "Ensemble 7-day high/low price forecaster",
    long_about = "Forecasts the next seven daily highs and lows for a symbol by blending \
                  an ARIMA-style statistical model, a recurrent sequence model, and a \
                  seasonal-trend model, with per-model fallback on failure."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce a 7-day forecast for a symbol
    Forecast(ForecastCmd),

    /// Load and validate the configuration file
    CheckConfig(CheckConfigCmd),
}

/// Produce a forecast
#[derive(Parser, Debug)]
pub struct ForecastCmd {
    /// Ticker symbol, e.g. IBM
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Emit the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckConfigCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}
