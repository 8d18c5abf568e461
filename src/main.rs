//! hilo-forecast - Ensemble 7-Day High/Low Price Forecaster
//!
//! Fetches daily history for a symbol and prints a 7-day high/low
//! forecast built from three blended time-series models.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use hilo_forecast::adapters::alphavantage::{AlphaVantageClient, AlphaVantageConfig};
use hilo_forecast::adapters::cli::{CheckConfigCmd, CliApp, Command, ForecastCmd};
use hilo_forecast::application::{ForecastPipeline, PipelineOutcome};
use hilo_forecast::config::{load_config, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (the API key goes here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Forecast(cmd) => forecast_command(cmd).await,
        Command::CheckConfig(cmd) => check_config_command(cmd),
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt().with_env_filter(filter).init();
}

async fn forecast_command(cmd: ForecastCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    let client = build_client(&config)?;

    let pipeline = ForecastPipeline::new(Arc::new(client), config.pipeline_config());
    let outcome = pipeline
        .forecast(&cmd.symbol)
        .await
        .with_context(|| format!("Forecast failed for {}", cmd.symbol))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        print_report(&outcome);
    }
    Ok(())
}

fn check_config_command(cmd: CheckConfigCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    if config.api_key().is_none() {
        tracing::warn!("no API key configured; set ALPHAVANTAGE_API_KEY or provider.api_key");
    }
    println!("Configuration OK: {}", cmd.config.display());
    Ok(())
}

fn build_client(config: &AppConfig) -> Result<AlphaVantageClient> {
    let Some(api_key) = config.api_key() else {
        bail!("no API key found; set ALPHAVANTAGE_API_KEY or provider.api_key in config.toml");
    };
    AlphaVantageClient::with_config(AlphaVantageConfig {
        api_base_url: config.provider.api_url.clone(),
        api_key,
        timeout: std::time::Duration::from_secs(config.provider.timeout_seconds),
        max_retries: config.provider.max_retries,
    })
    .context("Failed to create data provider client")
}

fn print_report(outcome: &PipelineOutcome) {
    let report = &outcome.report;
    println!(
        "{} | current high {:.2} low {:.2}",
        report.symbol, report.current.high, report.current.low
    );
    println!("{:>4} {:>10} {:>10}", "day", "high", "low");
    for day in &report.days {
        println!("{:>4} {:>10.2} {:>10.2}", day.day, day.high, day.low);
    }

    for (name, outcome) in [
        ("statistical", &outcome.statistical),
        ("sequence", &outcome.sequence),
        ("seasonal", &outcome.seasonal),
    ] {
        if outcome.is_fallback() {
            println!("note: {name} model fell back to last observed value");
        }
    }
}
