//! Feature preprocessor: RawSeries -> ProcessedDataset
//!
//! Mirrors the request lifecycle: sort, de-duplicate, cap history,
//! derive rolling features, fit scalers and build the seasonal-model
//! frames. The resulting dataset is immutable for the request and is the
//! only input any forecaster sees.

use chrono::NaiveDate;

use crate::domain::{RawSeries, ValidationError};
use crate::features::rolling::{fill_gaps, rolling_mean, rolling_std};
use crate::features::scaler::MinMaxScaler;

/// Most recent rows kept; older history is discarded for speed
pub const MAX_HISTORY: usize = 500;

const MA_SHORT_WINDOW: usize = 7;
const MA_LONG_WINDOW: usize = 21;
const VOLATILITY_WINDOW: usize = 10;

/// Date/value pair frame for the seasonal-trend model
#[derive(Debug, Clone)]
pub struct ValueFrame {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

/// All model inputs derived from one validated series
#[derive(Debug, Clone)]
pub struct ProcessedDataset {
    pub dates: Vec<NaiveDate>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    /// Rolling close mean, window 7
    pub ma_short: Vec<f64>,
    /// Rolling close mean, window 21
    pub ma_long: Vec<f64>,
    /// Rolling close std, window 10
    pub volatility: Vec<f64>,
    pub high_scaled: Vec<f64>,
    pub low_scaled: Vec<f64>,
    pub scaler_high: MinMaxScaler,
    pub scaler_low: MinMaxScaler,
    pub frame_high: ValueFrame,
    pub frame_low: ValueFrame,
}

impl ProcessedDataset {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Most recent observed high; the fallback broadcast anchor.
    pub fn last_high(&self) -> f64 {
        *self.high.last().unwrap_or(&f64::NAN)
    }

    /// Most recent observed low; the fallback broadcast anchor.
    pub fn last_low(&self) -> f64 {
        *self.low.last().unwrap_or(&f64::NAN)
    }
}

/// Run the full preprocessing pass. The caller has already validated
/// length >= 100, so the degenerate-row error should never fire in
/// practice, but it is checked regardless.
pub fn preprocess(series: &RawSeries) -> Result<ProcessedDataset, ValidationError> {
    let mut bars = series.bars.clone();
    bars.sort_by_key(|bar| bar.date);
    bars.dedup_by_key(|bar| bar.date);

    if bars.len() < 2 {
        return Err(ValidationError::Degenerate { got: bars.len() });
    }

    if bars.len() > MAX_HISTORY {
        bars.drain(..bars.len() - MAX_HISTORY);
    }

    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ma_short = fill_gaps(rolling_mean(&close, MA_SHORT_WINDOW));
    let ma_long = fill_gaps(rolling_mean(&close, MA_LONG_WINDOW));
    let volatility = fill_gaps(rolling_std(&close, VOLATILITY_WINDOW));

    let scaler_high = MinMaxScaler::fit(&high);
    let scaler_low = MinMaxScaler::fit(&low);
    let high_scaled = scaler_high.transform(&high);
    let low_scaled = scaler_low.transform(&low);

    let frame_high = ValueFrame {
        dates: dates.clone(),
        values: high.clone(),
    };
    let frame_low = ValueFrame {
        dates: dates.clone(),
        values: low.clone(),
    };

    Ok(ProcessedDataset {
        dates,
        high,
        low,
        close,
        ma_short,
        ma_long,
        volatility,
        high_scaled,
        low_scaled,
        scaler_high,
        scaler_low,
        frame_high,
        frame_low,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OhlcvBar;
    use approx::assert_relative_eq;
    use chrono::Days;

    fn bar(date: NaiveDate, price: f64) -> OhlcvBar {
        OhlcvBar {
            date,
            open: price,
            high: price + 2.0,
            low: price - 2.0,
            close: price,
            volume: 1_000.0,
        }
    }

    fn series_of(n: usize) -> RawSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..n)
            .map(|i| bar(start + Days::new(i as u64), 100.0 + (i as f64 * 0.3).sin()))
            .collect();
        RawSeries::new("TEST", bars)
    }

    #[test]
    fn caps_history_at_500_rows() {
        let dataset = preprocess(&series_of(800)).unwrap();
        assert_eq!(dataset.len(), MAX_HISTORY);
        // The kept rows are the most recent ones
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        assert_eq!(dataset.dates[0], start + Days::new(300));
    }

    #[test]
    fn drops_duplicate_dates_and_sorts() {
        let mut raw = series_of(120);
        let dup = raw.bars[50];
        raw.bars.push(dup);
        raw.bars.swap(0, 60);
        let dataset = preprocess(&raw).unwrap();
        assert_eq!(dataset.len(), 120);
        assert!(dataset.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rejects_degenerate_input() {
        let raw = series_of(1);
        assert!(matches!(
            preprocess(&raw),
            Err(ValidationError::Degenerate { got: 1 })
        ));
    }

    #[test]
    fn rolling_features_have_no_gaps() {
        let dataset = preprocess(&series_of(150)).unwrap();
        assert!(dataset.ma_short.iter().all(|v| v.is_finite()));
        assert!(dataset.ma_long.iter().all(|v| v.is_finite()));
        assert!(dataset.volatility.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn scaled_columns_invert_to_prices() {
        let dataset = preprocess(&series_of(150)).unwrap();
        for (scaled, price) in dataset.high_scaled.iter().zip(dataset.high.iter()) {
            assert!(*scaled >= 0.0 && *scaled <= 1.0);
            assert_relative_eq!(dataset.scaler_high.inverse(*scaled), *price, epsilon = 1e-9);
        }
    }

    #[test]
    fn frames_carry_dates_and_values() {
        let dataset = preprocess(&series_of(110)).unwrap();
        assert_eq!(dataset.frame_high.dates.len(), 110);
        assert_eq!(dataset.frame_low.values, dataset.low);
    }
}
