//! In-memory event dataset for one observable.

use crate::data::histogram::Hist1D;
use crate::domain::Observable;
use crate::error::AppError;

/// Observed values of one observable, optionally weighted.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    values: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            weights: None,
        }
    }

    pub fn weighted(name: impl Into<String>, values: Vec<f64>, weights: Vec<f64>) -> Result<Self, AppError> {
        if values.len() != weights.len() {
            return Err(AppError::invalid(format!(
                "weights length mismatch: expected {}, got {}",
                values.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(AppError::invalid("weights must be finite"));
        }
        Ok(Self {
            name: name.into(),
            values,
            weights: Some(weights),
        })
    }

    pub fn num_entries(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_weighted(&self) -> bool {
        self.weights.is_some()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn weight(&self, i: usize) -> f64 {
        match &self.weights {
            Some(w) => w[i],
            None => 1.0,
        }
    }

    pub fn sum_weights(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().sum(),
            None => self.values.len() as f64,
        }
    }

    pub fn sum_weights_squared(&self) -> f64 {
        match &self.weights {
            Some(w) => w.iter().map(|w| w * w).sum(),
            None => self.values.len() as f64,
        }
    }

    /// Check every value lies inside the observable's domain.
    pub fn validate_against(&self, obs: &Observable) -> Result<(), AppError> {
        if let Some((i, x)) = self.values.iter().enumerate().find(|(_, x)| !obs.contains(**x)) {
            return Err(AppError::invalid(format!(
                "dataset '{}' event {i} has {}={x} outside [{}, {}]",
                self.name, obs.name, obs.min, obs.max
            )));
        }
        Ok(())
    }

    /// Bin into `obs.bins` bins over the observable's domain.
    pub fn binned(&self, obs: &Observable) -> Hist1D {
        let mut h = Hist1D::new(&self.name, &obs.title, obs.bins, obs.min, obs.max);
        for (i, &x) in self.values.iter().enumerate() {
            // The upper domain edge is inclusive for datasets; keep it in the last bin.
            let x = if x == obs.max { obs.max - 0.5 * obs.bin_width() } else { x };
            h.fill_weighted(x, self.weight(i));
        }
        h
    }
}
