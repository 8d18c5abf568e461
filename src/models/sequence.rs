//! Autoregressive sequence forecaster
//!
//! Two stacked tanh recurrent layers over a sliding window of scaled
//! prices, followed by a small dense head. Trained with plain SGD and
//! backpropagation through time, with inverted dropout between layers
//! and early stopping that restores the best weights seen. Forecasts
//! roll the network forward one step at a time, feeding each prediction
//! back into the window.

use nalgebra::{DMatrix, DVector, RowDVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::{ForecastResult, ModelId, HORIZON};
use crate::features::{MinMaxScaler, ProcessedDataset};
use crate::models::ModelError;

/// Minimum number of training windows required to fit at all
pub const MIN_TRAIN_WINDOWS: usize = 30;

/// Global gradient norm ceiling
const GRAD_CLIP: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Sliding window length fed to the network
    pub window: usize,
    /// Only the most recent points are used for training
    pub max_points: usize,
    /// Hidden units per recurrent layer
    pub hidden: usize,
    /// Units in the dense head
    pub dense: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Epochs without improvement before stopping
    pub patience: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    /// Fixed seed for reproducible training; None draws from entropy
    pub seed: Option<u64>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            window: 30,
            max_points: 300,
            hidden: 30,
            dense: 15,
            epochs: 15,
            batch_size: 16,
            patience: 3,
            dropout: 0.2,
            learning_rate: 0.02,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequenceForecaster {
    config: SequenceConfig,
}

impl SequenceForecaster {
    pub fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    /// Train one network per field and roll each forward seven steps.
    pub fn forecast(&self, dataset: &ProcessedDataset) -> Result<ForecastResult, ModelError> {
        let highs = self.forecast_field(&dataset.high_scaled, &dataset.scaler_high)?;
        let lows = self.forecast_field(&dataset.low_scaled, &dataset.scaler_low)?;
        Ok(ForecastResult::from_paths(highs, lows, ModelId::Sequence))
    }

    fn forecast_field(
        &self,
        scaled: &[f64],
        scaler: &MinMaxScaler,
    ) -> Result<Vec<f64>, ModelError> {
        let cfg = &self.config;
        let tail_start = scaled.len().saturating_sub(cfg.max_points);
        let tail = &scaled[tail_start..];
        let n_windows = tail.len().saturating_sub(cfg.window);
        if n_windows < MIN_TRAIN_WINDOWS {
            return Err(ModelError::InsufficientData {
                got: n_windows,
                need: MIN_TRAIN_WINDOWS,
            });
        }

        let samples: Vec<(&[f64], f64)> = (0..n_windows)
            .map(|i| (&tail[i..i + cfg.window], tail[i + cfg.window]))
            .collect();

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut net = RecurrentNet::new(cfg, &mut rng);
        net.train(&samples, cfg, &mut rng)?;

        let mut window: Vec<f64> = tail[tail.len() - cfg.window..].to_vec();
        let mut out = Vec::with_capacity(HORIZON);
        for _ in 0..HORIZON {
            let (pred, advanced) = net.next_step(&window);
            if !pred.is_finite() {
                return Err(ModelError::NonFinite {
                    stage: "sequence rollout",
                });
            }
            out.push(scaler.inverse(pred));
            window = advanced;
        }
        Ok(out)
    }
}

/// Elman-style recurrent layer: h_t = tanh(wx x_t + wh h_{t-1} + b)
#[derive(Debug, Clone)]
struct RecurrentLayer {
    wx: DMatrix<f64>,
    wh: DMatrix<f64>,
    b: DVector<f64>,
}

impl RecurrentLayer {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / (input + hidden) as f64).sqrt();
        Self {
            wx: DMatrix::from_fn(hidden, input, |_, _| rng.gen_range(-bound..bound)),
            wh: DMatrix::from_fn(hidden, hidden, |_, _| rng.gen_range(-bound..bound)),
            b: DVector::zeros(hidden),
        }
    }

    fn step(&self, x: &DVector<f64>, h_prev: &DVector<f64>) -> DVector<f64> {
        (&self.wx * x + &self.wh * h_prev + &self.b).map(f64::tanh)
    }
}

#[derive(Debug, Clone)]
struct DenseLayer {
    w: DMatrix<f64>,
    b: DVector<f64>,
}

impl DenseLayer {
    fn new(input: usize, output: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / (input + output) as f64).sqrt();
        Self {
            w: DMatrix::from_fn(output, input, |_, _| rng.gen_range(-bound..bound)),
            b: DVector::zeros(output),
        }
    }
}

#[derive(Debug, Clone)]
struct RecurrentNet {
    rec1: RecurrentLayer,
    rec2: RecurrentLayer,
    dense1: DenseLayer,
    dense2: DenseLayer,
}

/// Per-sample forward caches needed for backpropagation through time
struct ForwardTrace {
    h1: Vec<DVector<f64>>,
    h1_dropped: Vec<DVector<f64>>,
    h2: Vec<DVector<f64>>,
    h2_dropped: DVector<f64>,
    z1: DVector<f64>,
    a1: DVector<f64>,
    output: f64,
    mask1: Vec<DVector<f64>>,
    mask2: DVector<f64>,
}

/// Accumulated parameter gradients for one minibatch
struct Gradients {
    rec1_wx: DMatrix<f64>,
    rec1_wh: DMatrix<f64>,
    rec1_b: DVector<f64>,
    rec2_wx: DMatrix<f64>,
    rec2_wh: DMatrix<f64>,
    rec2_b: DVector<f64>,
    dense1_w: DMatrix<f64>,
    dense1_b: DVector<f64>,
    dense2_w: DMatrix<f64>,
    dense2_b: DVector<f64>,
}

impl Gradients {
    fn zeros(net: &RecurrentNet) -> Self {
        Self {
            rec1_wx: DMatrix::zeros(net.rec1.wx.nrows(), net.rec1.wx.ncols()),
            rec1_wh: DMatrix::zeros(net.rec1.wh.nrows(), net.rec1.wh.ncols()),
            rec1_b: DVector::zeros(net.rec1.b.len()),
            rec2_wx: DMatrix::zeros(net.rec2.wx.nrows(), net.rec2.wx.ncols()),
            rec2_wh: DMatrix::zeros(net.rec2.wh.nrows(), net.rec2.wh.ncols()),
            rec2_b: DVector::zeros(net.rec2.b.len()),
            dense1_w: DMatrix::zeros(net.dense1.w.nrows(), net.dense1.w.ncols()),
            dense1_b: DVector::zeros(net.dense1.b.len()),
            dense2_w: DMatrix::zeros(net.dense2.w.nrows(), net.dense2.w.ncols()),
            dense2_b: DVector::zeros(net.dense2.b.len()),
        }
    }

    fn norm(&self) -> f64 {
        (self.rec1_wx.norm_squared()
            + self.rec1_wh.norm_squared()
            + self.rec1_b.norm_squared()
            + self.rec2_wx.norm_squared()
            + self.rec2_wh.norm_squared()
            + self.rec2_b.norm_squared()
            + self.dense1_w.norm_squared()
            + self.dense1_b.norm_squared()
            + self.dense2_w.norm_squared()
            + self.dense2_b.norm_squared())
        .sqrt()
    }

    fn scale(&mut self, factor: f64) {
        self.rec1_wx *= factor;
        self.rec1_wh *= factor;
        self.rec1_b *= factor;
        self.rec2_wx *= factor;
        self.rec2_wh *= factor;
        self.rec2_b *= factor;
        self.dense1_w *= factor;
        self.dense1_b *= factor;
        self.dense2_w *= factor;
        self.dense2_b *= factor;
    }
}

impl RecurrentNet {
    fn new(cfg: &SequenceConfig, rng: &mut StdRng) -> Self {
        Self {
            rec1: RecurrentLayer::new(1, cfg.hidden, rng),
            rec2: RecurrentLayer::new(cfg.hidden, cfg.hidden, rng),
            dense1: DenseLayer::new(cfg.hidden, cfg.dense, rng),
            dense2: DenseLayer::new(cfg.dense, 1, rng),
        }
    }

    /// Inference forward pass, dropout off.
    fn predict(&self, window: &[f64]) -> f64 {
        let hidden = self.rec1.wx.nrows();
        let mut h1 = DVector::zeros(hidden);
        let mut h2 = DVector::zeros(hidden);
        for &x in window {
            let input = DVector::from_element(1, x);
            h1 = self.rec1.step(&input, &h1);
            h2 = self.rec2.step(&h1, &h2);
        }
        let a1 = (&self.dense1.w * &h2 + &self.dense1.b).map(|v| v.max(0.0));
        (&self.dense2.w * &a1 + &self.dense2.b)[0]
    }

    /// One step of the autoregressive rollout. Predicts from `window`
    /// and returns the prediction with the window advanced by one, the
    /// input untouched.
    fn next_step(&self, window: &[f64]) -> (f64, Vec<f64>) {
        let pred = self.predict(window);
        let mut advanced = Vec::with_capacity(window.len());
        advanced.extend_from_slice(&window[1..]);
        advanced.push(pred);
        (pred, advanced)
    }

    /// Training forward pass with dropout masks recorded for backprop.
    fn forward(&self, window: &[f64], dropout: f64, rng: &mut StdRng) -> ForwardTrace {
        let hidden = self.rec1.wx.nrows();
        let keep = 1.0 - dropout;
        let mut h1_prev = DVector::zeros(hidden);
        let mut h2_prev = DVector::zeros(hidden);
        let mut h1 = Vec::with_capacity(window.len());
        let mut h1_dropped = Vec::with_capacity(window.len());
        let mut h2 = Vec::with_capacity(window.len());
        let mut mask1 = Vec::with_capacity(window.len());
        for &x in window {
            let input = DVector::from_element(1, x);
            let next1 = self.rec1.step(&input, &h1_prev);
            let m1 = dropout_mask(hidden, keep, rng);
            let dropped1 = next1.component_mul(&m1);
            let next2 = self.rec2.step(&dropped1, &h2_prev);
            h1_prev = next1.clone();
            h2_prev = next2.clone();
            h1.push(next1);
            h1_dropped.push(dropped1);
            h2.push(next2);
            mask1.push(m1);
        }
        let last2 = h2.last().cloned().unwrap_or_else(|| DVector::zeros(hidden));
        let mask2 = dropout_mask(hidden, keep, rng);
        let h2_dropped = last2.component_mul(&mask2);
        let z1 = &self.dense1.w * &h2_dropped + &self.dense1.b;
        let a1 = z1.map(|v| v.max(0.0));
        let output = (&self.dense2.w * &a1 + &self.dense2.b)[0];
        ForwardTrace {
            h1,
            h1_dropped,
            h2,
            h2_dropped,
            z1,
            a1,
            output,
            mask1,
            mask2,
        }
    }

    /// Backpropagation through time for a single sample. Adds into the
    /// minibatch gradient accumulator and returns the squared error.
    fn backward(&self, window: &[f64], target: f64, trace: &ForwardTrace, grads: &mut Gradients) -> f64 {
        let steps = window.len();
        let hidden = self.rec1.wx.nrows();
        let err = trace.output - target;

        // Dense head
        let d_out = 2.0 * err;
        grads.dense2_w += d_out * trace.a1.transpose();
        grads.dense2_b[0] += d_out;
        let dz1 = DVector::from_fn(trace.z1.len(), |i, _| {
            if trace.z1[i] > 0.0 {
                d_out * self.dense2.w[(0, i)]
            } else {
                0.0
            }
        });
        grads.dense1_w += &dz1 * trace.h2_dropped.transpose();
        grads.dense1_b += &dz1;

        // Gradient into the last layer-2 state, through its dropout mask
        let mut dh2 = (self.dense1.w.transpose() * &dz1).component_mul(&trace.mask2);
        let mut dh1: DVector<f64> = DVector::zeros(hidden);

        for t in (0..steps).rev() {
            // Layer 2
            let dz2 = dh2.zip_map(&trace.h2[t], |g, h| g * (1.0 - h * h));
            grads.rec2_wx += &dz2 * trace.h1_dropped[t].transpose();
            let h2_prev: RowDVector<f64> = if t > 0 {
                trace.h2[t - 1].transpose()
            } else {
                RowDVector::zeros(hidden)
            };
            grads.rec2_wh += &dz2 * h2_prev;
            grads.rec2_b += &dz2;
            dh2 = self.rec2.wh.transpose() * &dz2;
            dh1 += (self.rec2.wx.transpose() * &dz2).component_mul(&trace.mask1[t]);

            // Layer 1
            let dz1t = dh1.zip_map(&trace.h1[t], |g, h| g * (1.0 - h * h));
            grads.rec1_wx += &dz1t * RowDVector::from_element(1, window[t]);
            let h1_prev: RowDVector<f64> = if t > 0 {
                trace.h1[t - 1].transpose()
            } else {
                RowDVector::zeros(hidden)
            };
            grads.rec1_wh += &dz1t * h1_prev;
            grads.rec1_b += &dz1t;
            dh1 = self.rec1.wh.transpose() * &dz1t;
        }
        err * err
    }

    fn apply(&mut self, grads: &Gradients, lr: f64) {
        self.rec1.wx -= lr * &grads.rec1_wx;
        self.rec1.wh -= lr * &grads.rec1_wh;
        self.rec1.b -= lr * &grads.rec1_b;
        self.rec2.wx -= lr * &grads.rec2_wx;
        self.rec2.wh -= lr * &grads.rec2_wh;
        self.rec2.b -= lr * &grads.rec2_b;
        self.dense1.w -= lr * &grads.dense1_w;
        self.dense1.b -= lr * &grads.dense1_b;
        self.dense2.w -= lr * &grads.dense2_w;
        self.dense2.b -= lr * &grads.dense2_b;
    }

    /// Minibatch SGD with gradient clipping and patience-based early
    /// stopping. The best weights seen are restored at the end.
    fn train(
        &mut self,
        samples: &[(&[f64], f64)],
        cfg: &SequenceConfig,
        rng: &mut StdRng,
    ) -> Result<(), ModelError> {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut best_loss = f64::INFINITY;
        let mut best_weights = self.clone();
        let mut stale = 0usize;

        for epoch in 0..cfg.epochs {
            order.shuffle(rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(cfg.batch_size) {
                let mut grads = Gradients::zeros(self);
                for &idx in batch {
                    let (window, target) = samples[idx];
                    let trace = self.forward(window, cfg.dropout, rng);
                    epoch_loss += self.backward(window, target, &trace, &mut grads);
                }
                grads.scale(1.0 / batch.len() as f64);
                let norm = grads.norm();
                if norm > GRAD_CLIP {
                    grads.scale(GRAD_CLIP / norm);
                }
                self.apply(&grads, cfg.learning_rate);
            }
            epoch_loss /= samples.len() as f64;
            if !epoch_loss.is_finite() {
                return Err(ModelError::Diverged { epoch });
            }
            tracing::trace!(epoch, loss = epoch_loss, "sequence epoch");

            if epoch_loss < best_loss {
                best_loss = epoch_loss;
                best_weights = self.clone();
                stale = 0;
            } else {
                stale += 1;
                if stale >= cfg.patience {
                    tracing::debug!(epoch, best_loss, "early stop");
                    break;
                }
            }
        }
        *self = best_weights;
        Ok(())
    }
}

fn dropout_mask(len: usize, keep: f64, rng: &mut StdRng) -> DVector<f64> {
    if keep >= 1.0 {
        return DVector::from_element(len, 1.0);
    }
    DVector::from_fn(len, |_, _| {
        if rng.gen::<f64>() < keep {
            1.0 / keep
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> SequenceConfig {
        SequenceConfig {
            window: 8,
            max_points: 120,
            hidden: 8,
            dense: 4,
            epochs: 10,
            batch_size: 8,
            patience: 3,
            dropout: 0.0,
            learning_rate: 0.05,
            seed: Some(7),
        }
    }

    fn build_samples(series: &[f64], window: usize) -> Vec<(&[f64], f64)> {
        (0..series.len() - window)
            .map(|i| (&series[i..i + window], series[i + window]))
            .collect()
    }

    #[test]
    fn training_reduces_loss_on_a_sine_wave() {
        let cfg = tiny_config();
        let series: Vec<f64> = (0..100)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.3).sin())
            .collect();
        let samples = build_samples(&series, cfg.window);
        let mut rng = StdRng::seed_from_u64(7);
        let mut net = RecurrentNet::new(&cfg, &mut rng);

        let initial: f64 = samples
            .iter()
            .map(|(w, t)| (net.predict(w) - t).powi(2))
            .sum::<f64>()
            / samples.len() as f64;
        net.train(&samples, &cfg, &mut rng).unwrap();
        let trained: f64 = samples
            .iter()
            .map(|(w, t)| (net.predict(w) - t).powi(2))
            .sum::<f64>()
            / samples.len() as f64;
        assert!(trained < initial, "loss {trained} vs {initial}");
    }

    #[test]
    fn rejects_too_few_windows() {
        let cfg = SequenceConfig {
            seed: Some(1),
            ..SequenceConfig::default()
        };
        let forecaster = SequenceForecaster::new(cfg);
        let scaled = vec![0.5; 40];
        let scaler = MinMaxScaler::fit(&[1.0, 2.0]);
        let err = forecaster.forecast_field(&scaled, &scaler).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientData { .. }));
    }

    #[test]
    fn constant_series_predicts_the_constant() {
        // A degenerate scaler maps everything to 0 and inverts to the
        // column minimum, so the rollout must return the input level.
        let forecaster = SequenceForecaster::new(tiny_config());
        let scaled = vec![0.0; 120];
        let scaler = MinMaxScaler::fit(&vec![50.0; 120]);
        let out = forecaster.forecast_field(&scaled, &scaler).unwrap();
        assert_eq!(out.len(), HORIZON);
        for v in out {
            assert!((v - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn next_step_advances_the_window_without_mutating_the_input() {
        let cfg = tiny_config();
        let mut rng = StdRng::seed_from_u64(11);
        let net = RecurrentNet::new(&cfg, &mut rng);
        let window: Vec<f64> = (0..cfg.window).map(|i| i as f64 / 10.0).collect();
        let before = window.clone();

        let (pred, advanced) = net.next_step(&window);
        assert_eq!(window, before);
        assert_eq!(advanced.len(), window.len());
        assert_eq!(advanced[..window.len() - 1], window[1..]);
        assert_eq!(*advanced.last().unwrap(), pred);

        // Threading the returned window must agree with a hand-rolled
        // two-step rollout over the same net.
        let (pred2, _) = net.next_step(&advanced);
        let mut manual = window.clone();
        manual.remove(0);
        manual.push(pred);
        assert_eq!(net.predict(&manual), pred2);
    }

    #[test]
    fn predictions_stay_finite_with_dropout_enabled() {
        let cfg = SequenceConfig {
            dropout: 0.2,
            ..tiny_config()
        };
        let series: Vec<f64> = (0..120).map(|i| (i % 10) as f64 / 10.0).collect();
        let scaler = MinMaxScaler::fit(&series);
        let forecaster = SequenceForecaster::new(cfg);
        let out = forecaster.forecast_field(&series, &scaler).unwrap();
        assert_eq!(out.len(), HORIZON);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
