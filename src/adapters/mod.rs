//! Adapters Layer - Implementations of the ports against real services

pub mod alphavantage;
pub mod cli;

pub use alphavantage::{AlphaVantageClient, AlphaVantageConfig};
pub use cli::{CliApp, Command};
