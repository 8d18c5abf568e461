//! Seasonal-trend forecaster
//!
//! A decomposable additive model in the Prophet mould: a piecewise
//! linear trend with evenly spaced changepoints plus weekly and yearly
//! Fourier seasonality, fit by ridge regression. Changepoint slope
//! deltas carry a strong penalty derived from the changepoint prior
//! scale so the trend stays close to linear unless the data insists.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{ForecastResult, ModelId, HORIZON};
use crate::features::{ProcessedDataset, ValueFrame};
use crate::models::ModelError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalConfig {
    /// Candidate trend changepoints, spread over the first 80% of history
    pub n_changepoints: usize,
    /// Flexibility of the trend at changepoints
    pub changepoint_prior_scale: f64,
    /// Flexibility of the seasonal components
    pub seasonality_prior_scale: f64,
    /// Fourier order for the weekly component
    pub weekly_order: usize,
    /// Fourier order for the yearly component
    pub yearly_order: usize,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            weekly_order: 3,
            yearly_order: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeasonalTrendForecaster {
    config: SeasonalConfig,
}

impl SeasonalTrendForecaster {
    pub fn new(config: SeasonalConfig) -> Self {
        Self { config }
    }

    /// Fit one additive model per field and project seven days past the
    /// last observed date. Negative price projections are clipped to
    /// zero.
    pub fn forecast(&self, dataset: &ProcessedDataset) -> Result<ForecastResult, ModelError> {
        let highs = self.forecast_frame(&dataset.frame_high)?;
        let lows = self.forecast_frame(&dataset.frame_low)?;
        Ok(ForecastResult::from_paths(highs, lows, ModelId::Seasonal))
    }

    fn forecast_frame(&self, frame: &ValueFrame) -> Result<Vec<f64>, ModelError> {
        let n = frame.dates.len();
        if n < 2 {
            return Err(ModelError::InsufficientData { got: n, need: 2 });
        }
        let origin = frame.dates[0];
        let days: Vec<f64> = frame
            .dates
            .iter()
            .map(|d| (*d - origin).num_days() as f64)
            .collect();
        let span = days[n - 1].max(1.0);

        let cfg = &self.config;
        let changepoints = changepoint_grid(span, cfg.n_changepoints);
        let design = build_design(&days, span, &changepoints, cfg);
        let beta = ridge_solve(&design, &frame.values, &penalties(&changepoints, cfg))?;

        let last = frame.dates[n - 1];
        let future: Vec<f64> = (1..=HORIZON)
            .map(|step| (last - origin).num_days() as f64 + step as f64)
            .collect();
        let future_design = build_design(&future, span, &changepoints, cfg);
        let projected = &future_design * &beta;
        if projected.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite {
                stage: "seasonal projection",
            });
        }
        Ok(projected.iter().map(|v| v.max(0.0)).collect())
    }
}

/// Changepoints in day units, evenly spaced over the first 80% of the
/// observed span.
fn changepoint_grid(span: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let limit = span * 0.8;
    (1..=count).map(|i| limit * i as f64 / count as f64).collect()
}

/// Design matrix columns: intercept, linear trend, hinge per
/// changepoint, then weekly and yearly Fourier pairs.
fn build_design(
    days: &[f64],
    span: f64,
    changepoints: &[f64],
    cfg: &SeasonalConfig,
) -> DMatrix<f64> {
    let cols = 2 + changepoints.len() + 2 * (cfg.weekly_order + cfg.yearly_order);
    let mut data = Vec::with_capacity(days.len() * cols);
    for &t in days {
        data.push(1.0);
        data.push(t / span);
        for &cp in changepoints {
            data.push(((t - cp) / span).max(0.0));
        }
        push_fourier(&mut data, t, 7.0, cfg.weekly_order);
        push_fourier(&mut data, t, 365.25, cfg.yearly_order);
    }
    DMatrix::from_row_slice(days.len(), cols, &data)
}

fn push_fourier(data: &mut Vec<f64>, t: f64, period: f64, order: usize) {
    for k in 1..=order {
        let arg = 2.0 * std::f64::consts::PI * k as f64 * t / period;
        data.push(arg.sin());
        data.push(arg.cos());
    }
}

/// Per-column ridge penalties. The intercept and base slope are
/// unpenalized; changepoint deltas and seasonal terms get penalties
/// inversely tied to their prior scales.
fn penalties(changepoints: &[f64], cfg: &SeasonalConfig) -> Vec<f64> {
    let cp_lambda = 1.0 / (2.0 * cfg.changepoint_prior_scale.powi(2));
    let seas_lambda = 1.0 / (2.0 * cfg.seasonality_prior_scale.powi(2));
    let mut out = vec![0.0, 0.0];
    out.extend(std::iter::repeat(cp_lambda).take(changepoints.len()));
    out.extend(std::iter::repeat(seas_lambda).take(2 * (cfg.weekly_order + cfg.yearly_order)));
    out
}

fn ridge_solve(
    design: &DMatrix<f64>,
    values: &[f64],
    penalties: &[f64],
) -> Result<DVector<f64>, ModelError> {
    let y = DVector::from_row_slice(values);
    let mut normal = design.transpose() * design;
    for (i, &lambda) in penalties.iter().enumerate() {
        normal[(i, i)] += lambda;
    }
    // The unpenalized corner keeps the matrix merely positive
    // semidefinite in degenerate cases, so fall back to a plain inverse
    // when the Cholesky factorization fails.
    let rhs = design.transpose() * y;
    if let Some(chol) = normal.clone().cholesky() {
        let beta = chol.solve(&rhs);
        if beta.iter().all(|v| v.is_finite()) {
            return Ok(beta);
        }
    }
    let inv = normal.try_inverse().ok_or(ModelError::SingularMatrix {
        stage: "seasonal normal equations",
    })?;
    let beta = &inv * rhs;
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite {
            stage: "seasonal coefficients",
        });
    }
    Ok(beta)
}
