//! Statistical forecaster: ARIMA-style model with fixed p=5, q=2
//!
//! The differencing order d comes from the stationarity selector, run
//! independently for the high and the low series. The ARMA part is
//! estimated on the differenced data with the two-stage Hannan-Rissanen
//! procedure (a long autoregression supplies residual proxies, then AR
//! and MA terms are fit jointly by OLS). Forecasting feeds the recursion
//! forward with future shocks at their zero expectation and integrates
//! the differencing back out through the stored per-level tails.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::domain::{ForecastResult, ModelId, HORIZON};
use crate::features::ProcessedDataset;
use crate::models::stationarity::{difference, select_difference_order};
use crate::models::ModelError;

/// Order of the long autoregression used for residual proxies
const PROXY_AR_FLOOR: usize = 10;

/// Fixed ARMA orders; d is selected per field at fit time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArimaConfig {
    /// Autoregressive order (lagged observations)
    pub p: usize,
    /// Moving-average order (lagged shocks)
    pub q: usize,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self { p: 5, q: 2 }
    }
}

/// ARIMA-style ensemble member
#[derive(Debug, Clone, Default)]
pub struct StatisticalForecaster {
    config: ArimaConfig,
}

impl StatisticalForecaster {
    pub fn new(config: ArimaConfig) -> Self {
        Self { config }
    }

    /// Fit and forecast both fields. Returns the swap-corrected 7-step
    /// result or the first per-field failure.
    pub fn forecast(&self, dataset: &ProcessedDataset) -> Result<ForecastResult, ModelError> {
        let d_high = select_difference_order(&dataset.high);
        let d_low = select_difference_order(&dataset.low);
        tracing::debug!(d_high, d_low, "selected differencing orders");

        let highs = self.forecast_field(&dataset.high, d_high)?;
        let lows = self.forecast_field(&dataset.low, d_low)?;
        Ok(ForecastResult::from_paths(highs, lows, ModelId::Statistical))
    }

    fn forecast_field(&self, series: &[f64], d: usize) -> Result<Vec<f64>, ModelError> {
        let diffed = difference(series, d);
        let model = ArmaModel::fit(&diffed, self.config.p, self.config.q)?;
        let forecasts = model.forecast(&diffed, HORIZON);
        let levels = undifference(forecasts, series, d);
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite {
                stage: "arima forecast",
            });
        }
        Ok(levels)
    }
}

/// Fitted ARMA(p, q) model on an already-differenced series
#[derive(Debug, Clone)]
struct ArmaModel {
    ar: Vec<f64>,
    ma: Vec<f64>,
    constant: f64,
    residuals: Vec<f64>,
    sigma2: f64,
}

impl ArmaModel {
    fn fit(data: &[f64], p: usize, q: usize) -> Result<Self, ModelError> {
        let n = data.len();
        let proxy_order = (p + q).max(PROXY_AR_FLOOR).min(n / 4);
        let start = p.max(q).max(proxy_order);
        let need = start + p + q + 5;
        if n < need {
            return Err(ModelError::InsufficientData { got: n, need });
        }

        let data_mean = data.mean();
        let centered: Vec<f64> = data.iter().map(|v| v - data_mean).collect();

        // Stage 1: long AR for residual proxies
        let proxy_residuals = fit_long_ar(&centered, proxy_order)?;

        // Stage 2: joint OLS on AR lags and lagged proxy residuals
        let rows = n - start;
        let cols = 1 + p + q;
        let mut x = Vec::with_capacity(rows * cols);
        let mut y = Vec::with_capacity(rows);
        for t in start..n {
            y.push(centered[t]);
            x.push(1.0);
            for i in 1..=p {
                x.push(centered[t - i]);
            }
            for i in 1..=q {
                x.push(proxy_residuals[t - i]);
            }
        }
        let x = DMatrix::from_row_slice(rows, cols, &x);
        let y = DVector::from_vec(y);
        let xtx = x.transpose() * &x;
        let xtx_inv = xtx.try_inverse().ok_or(ModelError::SingularMatrix {
            stage: "arma regression",
        })?;
        let beta = &xtx_inv * (x.transpose() * &y);
        if beta.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite {
                stage: "arma coefficients",
            });
        }

        let fitted = &x * &beta;
        let residuals: Vec<f64> = (&y - fitted).iter().copied().collect();
        let sigma2 = residuals.iter().map(|r| r * r).sum::<f64>() / rows as f64;

        Ok(Self {
            ar: beta.iter().skip(1).take(p).copied().collect(),
            ma: beta.iter().skip(1 + p).take(q).copied().collect(),
            constant: beta[0] + data_mean * (1.0 - beta.iter().skip(1).take(p).sum::<f64>()),
            residuals,
            sigma2,
        })
    }

    /// Native multi-step forecast: the recursion is extended h steps
    /// with future shocks at zero expectation.
    fn forecast(&self, data: &[f64], horizon: usize) -> Vec<f64> {
        let mut values = data.to_vec();
        let mut shocks = self.residuals.clone();
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let mut next = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                if let Some(&v) = values.get(values.len().wrapping_sub(i + 1)) {
                    next += phi * v;
                }
            }
            for (i, theta) in self.ma.iter().enumerate() {
                if let Some(&e) = shocks.get(shocks.len().wrapping_sub(i + 1)) {
                    next += theta * e;
                }
            }
            values.push(next);
            shocks.push(0.0);
            out.push(next);
        }
        out
    }
}

/// Long AR fit by OLS, returning residuals aligned with the input
/// (leading `order` entries are zero so indices line up).
fn fit_long_ar(centered: &[f64], order: usize) -> Result<Vec<f64>, ModelError> {
    let n = centered.len();
    let rows = n - order;
    let cols = order + 1;
    let mut x = Vec::with_capacity(rows * cols);
    let mut y = Vec::with_capacity(rows);
    for t in order..n {
        y.push(centered[t]);
        x.push(1.0);
        for i in 1..=order {
            x.push(centered[t - i]);
        }
    }
    let x = DMatrix::from_row_slice(rows, cols, &x);
    let y = DVector::from_vec(y);
    let xtx = x.transpose() * &x;
    let xtx_inv = xtx.try_inverse().ok_or(ModelError::SingularMatrix {
        stage: "residual proxy regression",
    })?;
    let beta = &xtx_inv * (x.transpose() * &y);
    let fitted = &x * &beta;
    let mut residuals = vec![0.0; order];
    residuals.extend((&y - fitted).iter().copied());
    if residuals.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite {
            stage: "residual proxies",
        });
    }
    Ok(residuals)
}

/// Integrate d-th-difference forecasts back to price levels using the
/// last value of each intermediate difference level.
fn undifference(forecasts: Vec<f64>, series: &[f64], d: usize) -> Vec<f64> {
    let mut tails = Vec::with_capacity(d);
    let mut level = series.to_vec();
    for _ in 0..d {
        tails.push(*level.last().unwrap_or(&0.0));
        level = difference(&level, 1);
    }
    let mut out = forecasts;
    for &tail in tails.iter().rev() {
        let mut running = tail;
        for v in out.iter_mut() {
            running += *v;
            *v = running;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawSeries;
    use crate::features::preprocess;
    use approx::assert_relative_eq;
    use chrono::{Days, NaiveDate};

    fn noise(state: &mut u64) -> f64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (*state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
    }

    #[test]
    fn undifference_restores_levels() {
        // y = t^2 so second differences are constant 2
        let series: Vec<f64> = (0..10).map(|t| (t * t) as f64).collect();
        let forecasts = vec![2.0, 2.0, 2.0];
        let levels = undifference(forecasts, &series, 2);
        assert_relative_eq!(levels[0], 100.0);
        assert_relative_eq!(levels[1], 121.0);
        assert_relative_eq!(levels[2], 144.0);
    }

    #[test]
    fn undifference_identity_at_order_zero() {
        let out = undifference(vec![1.0, 2.0], &[5.0, 6.0], 0);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn recovers_ar_coefficient_from_synthetic_process() {
        let mut state = 11u64;
        let phi = 0.7;
        let mut data = vec![0.0];
        for i in 1..400 {
            let next = phi * data[i - 1] + noise(&mut state);
            data.push(next);
        }
        let model = ArmaModel::fit(&data, 1, 0).unwrap();
        assert!(
            (model.ar[0] - phi).abs() < 0.15,
            "estimated phi {}",
            model.ar[0]
        );
        assert!(model.sigma2 > 0.0);
    }

    #[test]
    fn fit_rejects_short_series() {
        let data = vec![1.0; 12];
        assert!(matches!(
            ArmaModel::fit(&data, 5, 2),
            Err(ModelError::InsufficientData { .. })
        ));
    }

    #[test]
    fn forecast_tracks_a_noisy_trend() {
        let mut state = 3u64;
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let bars = (0..200)
            .map(|i| {
                let base = 100.0 + 0.2 * i as f64 + noise(&mut state);
                crate::domain::OhlcvBar {
                    date: start + Days::new(i as u64),
                    open: base,
                    high: base + 1.0,
                    low: base - 1.0,
                    close: base,
                    volume: 500.0,
                }
            })
            .collect();
        let dataset = preprocess(&RawSeries::new("TREND", bars)).unwrap();

        let result = StatisticalForecaster::default().forecast(&dataset).unwrap();
        assert!(result.is_well_formed());
        // Should stay in the neighbourhood of the last prices
        let last_high = dataset.last_high();
        for h in &result.highs {
            assert!((h - last_high).abs() < 20.0, "forecast {h} vs {last_high}");
        }
    }
}
