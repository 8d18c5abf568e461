//! Augmented Dickey-Fuller test and differencing-order selection
//!
//! The regression `Δy_t = α + β·y_{t-1} + Σ γ_i·Δy_{t-i} + ε_t` is
//! estimated by OLS; the t-statistic of β is compared against
//! approximate MacKinnon critical values. Lag order is chosen
//! automatically by AIC over a common sample, Schwert-style upper bound.

use nalgebra::{DMatrix, DVector};

use crate::models::ModelError;

/// Reject the unit-root hypothesis below this p-value
pub const STATIONARY_P_VALUE: f64 = 0.05;
/// Highest differencing order tested; also the conservative default
pub const MAX_DIFF_ORDER: usize = 2;
/// Observations below this make the ADF regression meaningless
const MIN_OBS: usize = 15;
/// A residual sum of squares at this floor means a degenerate fit
const SSE_FLOOR: f64 = 1e-12;

/// Outcome of one ADF run
#[derive(Debug, Clone, Copy)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lag: usize,
}

/// d-th consecutive difference, dropping leading undefined values
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        if out.len() < 2 {
            return Vec::new();
        }
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// OLS solve returning (beta, sse, (X'X)^-1)
fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<(DVector<f64>, f64, DMatrix<f64>)> {
    let xtx = x.transpose() * x;
    let xtx_inv = xtx.try_inverse()?;
    let beta = &xtx_inv * (x.transpose() * y);
    let residuals = y - x * &beta;
    let sse = residuals.dot(&residuals);
    if !sse.is_finite() {
        return None;
    }
    Some((beta, sse, xtx_inv))
}

/// Build the ADF design matrix for rows `start..` of the differenced
/// series: [1, y_{t-1}, Δy_{t-1}, ..., Δy_{t-lag}]
fn adf_design(series: &[f64], diff: &[f64], lag: usize, start: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = diff.len() - start;
    let cols = 2 + lag;
    let mut x = Vec::with_capacity(rows * cols);
    let mut y = Vec::with_capacity(rows);
    for t in start..diff.len() {
        y.push(diff[t]);
        x.push(1.0);
        x.push(series[t]);
        for i in 1..=lag {
            x.push(diff[t - i]);
        }
    }
    (
        DMatrix::from_row_slice(rows, cols, &x),
        DVector::from_vec(y),
    )
}

/// Run the ADF test with automatic lag selection. Errors when the
/// series is too short or the regression is degenerate (constant or
/// perfectly deterministic input); callers treat that as "this order
/// could not be tested".
pub fn adf_test(series: &[f64]) -> Result<AdfResult, ModelError> {
    let n = series.len();
    if n < MIN_OBS {
        return Err(ModelError::InsufficientData {
            got: n,
            need: MIN_OBS,
        });
    }

    let diff = difference(series, 1);

    // Schwert-style bound, clamped so the common sample keeps residual dof
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)) as usize;
    let max_lag = schwert.min(diff.len().saturating_sub(8) / 2);

    // Lag order by AIC over the common sample starting at max_lag
    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=max_lag {
        let (x, y) = adf_design(series, &diff, lag, max_lag);
        let n_eff = y.len() as f64;
        let k = (lag + 2) as f64;
        if n_eff <= k + 1.0 {
            continue;
        }
        let Some((_, sse, _)) = ols(&x, &y) else {
            continue;
        };
        if sse <= SSE_FLOOR {
            // Perfect fit: the t-statistic would be 0/0
            continue;
        }
        let aic = n_eff * (sse / n_eff).ln() + 2.0 * k;
        if best.map_or(true, |(_, b)| aic < b) {
            best = Some((lag, aic));
        }
    }
    let (lag, _) = best.ok_or(ModelError::SingularMatrix {
        stage: "adf lag selection",
    })?;

    // Final regression with the chosen lag on the full available sample
    let (x, y) = adf_design(series, &diff, lag, lag);
    let n_eff = y.len();
    let k = lag + 2;
    if n_eff <= k {
        return Err(ModelError::InsufficientData {
            got: n_eff,
            need: k + 1,
        });
    }
    let (beta, sse, xtx_inv) = ols(&x, &y).ok_or(ModelError::SingularMatrix {
        stage: "adf regression",
    })?;
    let mse = sse / (n_eff - k) as f64;
    let se = (mse * xtx_inv[(1, 1)]).sqrt();
    if !se.is_finite() || se <= 0.0 {
        return Err(ModelError::NonFinite {
            stage: "adf standard error",
        });
    }
    let statistic = beta[1] / se;
    if !statistic.is_finite() {
        return Err(ModelError::NonFinite {
            stage: "adf t-statistic",
        });
    }

    Ok(AdfResult {
        statistic,
        p_value: approx_p_value(statistic, n),
        lag,
    })
}

/// Approximate p-value by interpolating between the constant-case
/// MacKinnon critical values with a small-sample adjustment.
fn approx_p_value(t_stat: f64, n: usize) -> f64 {
    let n = n as f64;
    let cv_1 = -3.43 - 6.0 / n;
    let cv_5 = -2.86 - 4.0 / n;
    let cv_10 = -2.57 - 3.0 / n;

    let p = if t_stat < cv_1 {
        0.01 * (t_stat - cv_1).exp()
    } else if t_stat < cv_5 {
        0.01 + 0.04 * (t_stat - cv_1) / (cv_5 - cv_1)
    } else if t_stat < cv_10 {
        0.05 + 0.05 * (t_stat - cv_5) / (cv_10 - cv_5)
    } else {
        0.10 + 0.90 * (1.0 - (-0.5 * (t_stat - cv_10)).exp())
    };
    p.clamp(1e-6, 1.0)
}

/// Pick the differencing order d in {0, 1, 2}: the first order at which
/// the differenced series tests stationary wins (short-circuit). Orders
/// whose test errors are skipped; when nothing passes, the maximum
/// tested order is returned as the conservative default.
pub fn select_difference_order(series: &[f64]) -> usize {
    for d in 0..=MAX_DIFF_ORDER {
        let data = difference(series, d);
        match adf_test(&data) {
            Ok(result) if result.p_value < STATIONARY_P_VALUE => {
                tracing::debug!(
                    d,
                    statistic = result.statistic,
                    p_value = result.p_value,
                    "series stationary"
                );
                return d;
            }
            Ok(result) => {
                tracing::debug!(d, p_value = result.p_value, "not stationary");
            }
            Err(err) => {
                tracing::debug!(d, error = %err, "stationarity test skipped");
            }
        }
    }
    MAX_DIFF_ORDER
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-noise, same LCG trick as the estimator tests
    fn noise(state: &mut u64) -> f64 {
        *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (*state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
    }

    fn mean_reverting(n: usize) -> Vec<f64> {
        let mut state = 42u64;
        let mut y = 0.0;
        (0..n)
            .map(|_| {
                y = 0.3 * y + noise(&mut state);
                y
            })
            .collect()
    }

    fn random_walk(n: usize) -> Vec<f64> {
        let mut state = 7u64;
        let mut y = 100.0;
        (0..n)
            .map(|_| {
                y += noise(&mut state);
                y
            })
            .collect()
    }

    #[test]
    fn difference_orders() {
        let data = vec![1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&data, 0), data);
        assert_eq!(difference(&data, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&data, 2), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn stationary_series_rejects_unit_root() {
        let result = adf_test(&mean_reverting(200)).unwrap();
        assert!(result.statistic < -3.0, "statistic {}", result.statistic);
        assert!(result.p_value < STATIONARY_P_VALUE);
    }

    #[test]
    fn selector_short_circuits_at_zero_for_stationary_input() {
        assert_eq!(select_difference_order(&mean_reverting(200)), 0);
    }

    #[test]
    fn selector_picks_one_for_random_walk() {
        assert_eq!(select_difference_order(&random_walk(250)), 1);
    }

    #[test]
    fn selector_defaults_to_max_order_for_constant_series() {
        let flat = vec![50.0; 150];
        assert_eq!(select_difference_order(&flat), MAX_DIFF_ORDER);
    }

    #[test]
    fn selector_is_defined_for_monotonic_ramp() {
        let ramp: Vec<f64> = (0..150).map(|i| i as f64).collect();
        let d = select_difference_order(&ramp);
        assert!(d <= MAX_DIFF_ORDER);
    }

    #[test]
    fn adf_errors_on_tiny_series() {
        assert!(matches!(
            adf_test(&[1.0, 2.0, 3.0]),
            Err(ModelError::InsufficientData { .. })
        ));
    }

    #[test]
    fn p_value_stays_in_unit_interval() {
        for t in [-12.0, -3.0, -1.0, 0.0, 4.0] {
            let p = approx_p_value(t, 150);
            assert!((0.0..=1.0).contains(&p), "p({t}) = {p}");
        }
    }
}
