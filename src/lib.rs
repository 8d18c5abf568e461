#![allow(dead_code, unused_imports)]
//! hilo-forecast - Ensemble 7-Day High/Low Price Forecaster Library
//!
//! Blends three independent time-series models into one 7-day forecast
//! of daily highs and lows, with per-model fallback so a single model
//! failure never fails the request.
//!
//! # Modules
//!
//! - `domain`: Core types (RawSeries, ForecastResult, PredictionReport)
//! - `features`: Preprocessing (capping, rolling stats, scaling, frames)
//! - `models`: The three forecasters and the stationarity selector
//! - `ensemble`: Weights and combination strategies
//! - `ports`: Trait abstractions (HistoricalDataPort)
//! - `adapters`: External implementations (Alpha Vantage, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: The forecast pipeline orchestrator

pub mod domain;
pub mod features;
pub mod models;
pub mod ensemble;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
