//! Negative log-likelihood of a [`Model`] on a [`Dataset`].
//!
//! Extended models:
//!
//! ```text
//! NLL = Σ_j ν_j − Σ_i w_i · ln λ(x_i),   λ(x) = Σ_j ν_j f_j(x)
//! ```
//!
//! Non-extended (single component) models: `NLL = −Σ_i w_i · ln f(x_i)`.
//!
//! Per-event terms are summed in fixed-size chunks. With implicit multi-threading
//! the chunks run on the rayon pool; the chunk partial sums are always added
//! sequentially in chunk order, so the threaded and sequential paths give
//! bit-identical results.

use rayon::prelude::*;

use crate::data::Dataset;
use crate::error::AppError;
use crate::models::Model;

/// Events per summation chunk.
pub const CHUNK_SIZE: usize = 4096;

/// Below this intensity `ln` is continued linearly (its tangent at the floor).
pub const INTENSITY_FLOOR: f64 = 1e-12;

/// `ln d`, continued by the tangent at [`INTENSITY_FLOOR`] for small or
/// non-positive `d` so the objective stays finite and continuous.
pub fn ln_continued(d: f64) -> f64 {
    if d > INTENSITY_FLOOR {
        d.ln()
    } else if d.is_nan() {
        f64::NAN
    } else {
        INTENSITY_FLOOR.ln() + (d - INTENSITY_FLOOR) / INTENSITY_FLOOR
    }
}

/// Which per-event weights enter the log term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    /// `w_i`
    Plain,
    /// `w_i²`, used for the sum-of-weights-squared error correction.
    Squared,
}

/// Likelihood evaluator borrowing a model and a dataset.
pub struct Nll<'a> {
    model: &'a Model,
    data: &'a Dataset,
    mode: WeightMode,
    implicit_mt: bool,
}

impl<'a> Nll<'a> {
    pub fn new(model: &'a Model, data: &'a Dataset) -> Self {
        Self {
            model,
            data,
            mode: WeightMode::Plain,
            implicit_mt: true,
        }
    }

    pub fn with_weights(mut self, mode: WeightMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_implicit_mt(mut self, on: bool) -> Self {
        self.implicit_mt = on;
        self
    }

    /// Evaluate at a full parameter vector (one value per model parameter).
    pub fn eval(&self, values: &[f64]) -> Result<f64, AppError> {
        if values.len() != self.model.params().len() {
            return Err(AppError::fit(format!(
                "expected {} parameter values, got {}",
                self.model.params().len(),
                values.len()
            )));
        }
        let eval = self.model.evaluate(values);
        let extended = self.model.is_extended();
        let xs = self.data.values();
        let weights = self.data.weights();
        let mode = self.mode;

        let chunk_sum = |(chunk_idx, chunk): (usize, &[f64])| -> f64 {
            let offset = chunk_idx * CHUNK_SIZE;
            let mut acc = 0.0;
            for (k, &x) in chunk.iter().enumerate() {
                let w = match weights {
                    Some(w) => w[offset + k],
                    None => 1.0,
                };
                let w = match mode {
                    WeightMode::Plain => w,
                    WeightMode::Squared => w * w,
                };
                let ln_f = if extended {
                    ln_continued(self.model.intensity(&eval, x))
                } else {
                    self.model.ln_density(&eval, x)
                };
                acc += w * ln_f;
            }
            acc
        };

        let partials: Vec<f64> = if self.implicit_mt && xs.len() > CHUNK_SIZE {
            xs.par_chunks(CHUNK_SIZE).enumerate().map(chunk_sum).collect()
        } else {
            xs.chunks(CHUNK_SIZE).enumerate().map(chunk_sum).collect()
        };
        let log_sum: f64 = partials.iter().sum();

        let mut nll = -log_sum;
        if extended {
            let mut nu = self.model.expected_events(values);
            if mode == WeightMode::Squared && self.data.sum_weights() != 0.0 {
                // Scale the Poisson term like the log term: Σw² / Σw.
                nu *= self.data.sum_weights_squared() / self.data.sum_weights();
            }
            nll += nu;
        }

        if nll.is_nan() {
            return Err(AppError::fit(format!(
                "likelihood of model '{}' is NaN at {values:?}",
                self.model.name
            )));
        }
        Ok(nll)
    }
}
