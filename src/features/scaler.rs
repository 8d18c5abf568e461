//! Invertible min-max scaling to the [0, 1] range

/// Below this range a column is treated as constant
const MIN_RANGE: f64 = 1e-12;

/// Min-max scaler fit on a single column. A constant column maps every
/// value to 0.0 and inverts back to the column minimum, so a flat series
/// round-trips exactly.
#[derive(Debug, Clone, Copy)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        Self { min, max }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.max - self.min).is_finite() || (self.max - self.min) < MIN_RANGE
    }

    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            (value - self.min) / (self.max - self.min)
        }
    }

    pub fn inverse(&self, scaled: f64) -> f64 {
        if self.is_degenerate() {
            self.min
        } else {
            self.min + scaled * (self.max - self.min)
        }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.scale(v)).collect()
    }
}
