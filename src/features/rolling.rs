//! Rolling-window statistics with pandas-style minimum-period semantics

use statrs::statistics::Statistics;

/// Rolling mean with minimum period 1: early rows use whatever history
/// exists instead of being dropped.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(window - 1);
            values[start..=i].mean()
        })
        .collect()
}

/// Rolling sample standard deviation with minimum period 1. A window of
/// a single observation has no sample std, so the first entry is NaN and
/// is expected to be patched by [`fill_gaps`].
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(window - 1);
            let slice = &values[start..=i];
            if slice.len() < 2 {
                f64::NAN
            } else {
                slice.std_dev()
            }
        })
        .collect()
}

/// Forward-fill non-finite entries from the last finite value; a leading
/// gap is backfilled from the first finite value. An all-NaN column
/// becomes zeros.
pub fn fill_gaps(mut values: Vec<f64>) -> Vec<f64> {
    let first_finite = values
        .iter()
        .copied()
        .find(|v| v.is_finite())
        .unwrap_or(0.0);
    let mut last = first_finite;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = *v;
        } else {
            *v = last;
        }
    }
    values
}
