//! Component densities on a bounded observable.
//!
//! Every density is split into an unnormalized shape and its integral over the
//! observable domain. The likelihood computes the integral once per parameter
//! point and then evaluates the shape per event.

use crate::domain::Observable;
use crate::math::{chebyshev_fill, chebyshev_integral, normal_mass};

/// A density over one observable, parameterized by `n_params()` shape values.
pub trait Pdf: Send + Sync + std::fmt::Debug {
    /// Short kind name used in diagnostics.
    fn kind(&self) -> &'static str;

    fn n_params(&self) -> usize;

    /// Unnormalized shape at `x`. May be non-positive for polynomial shapes.
    fn shape(&self, x: f64, params: &[f64]) -> f64;

    /// `∫ shape dx` over the observable domain.
    fn integral(&self, params: &[f64]) -> f64;

    /// `ln shape(x)`; overridden where a direct form avoids underflow.
    fn ln_shape(&self, x: f64, params: &[f64]) -> f64 {
        self.shape(x, params).ln()
    }

    /// Normalized density.
    fn density(&self, x: f64, params: &[f64]) -> f64 {
        self.shape(x, params) / self.integral(params)
    }

    /// Check shape parameters that are not constrained by bounds.
    fn validate(&self, _params: &[f64]) -> Result<(), String> {
        Ok(())
    }
}

/// Gaussian truncated to the observable domain. Parameters: `[mean, sigma]`.
#[derive(Debug, Clone)]
pub struct GaussianPdf {
    lo: f64,
    hi: f64,
}

impl GaussianPdf {
    pub fn new(obs: &Observable) -> Self {
        Self {
            lo: obs.min,
            hi: obs.max,
        }
    }
}

impl Pdf for GaussianPdf {
    fn kind(&self) -> &'static str {
        "gaussian"
    }

    fn n_params(&self) -> usize {
        2
    }

    fn shape(&self, x: f64, params: &[f64]) -> f64 {
        self.ln_shape(x, params).exp()
    }

    fn ln_shape(&self, x: f64, params: &[f64]) -> f64 {
        let z = (x - params[0]) / params[1];
        -0.5 * z * z
    }

    fn integral(&self, params: &[f64]) -> f64 {
        let (mean, sigma) = (params[0], params[1]);
        // ∫ exp(-z²/2) dx = σ √(2π) · P(lo < X < hi)
        sigma * (2.0 * std::f64::consts::PI).sqrt() * normal_mass(mean, sigma, self.lo, self.hi)
    }

    fn validate(&self, params: &[f64]) -> Result<(), String> {
        let sigma = params[1];
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(format!("gaussian width must be positive, got {sigma}"));
        }
        if self.integral(params) <= 0.0 {
            return Err(format!(
                "gaussian with mean {} has no mass inside [{}, {}]",
                params[0], self.lo, self.hi
            ));
        }
        Ok(())
    }
}

/// Chebyshev series `1 + Σ a_k T_k(x')` with `x'` the domain mapped onto `[-1, 1]`.
/// Parameters: `[a_1, ..., a_order]`.
#[derive(Debug, Clone)]
pub struct ChebyshevPdf {
    obs: Observable,
    order: usize,
}

impl ChebyshevPdf {
    pub fn new(obs: &Observable, order: usize) -> Self {
        Self {
            obs: obs.clone(),
            order,
        }
    }
}

impl Pdf for ChebyshevPdf {
    fn kind(&self) -> &'static str {
        "chebyshev"
    }

    fn n_params(&self) -> usize {
        self.order
    }

    fn shape(&self, x: f64, params: &[f64]) -> f64 {
        let mut t = [0.0f64; 8];
        let mut heap;
        let t: &mut [f64] = if self.order < t.len() {
            &mut t[..=self.order]
        } else {
            heap = vec![0.0f64; self.order + 1];
            &mut heap
        };
        chebyshev_fill(self.obs.to_unit(x), t);
        1.0 + params.iter().zip(&t[1..]).map(|(a, tk)| a * tk).sum::<f64>()
    }

    fn integral(&self, params: &[f64]) -> f64 {
        // I = w/2 · (2 + Σ a_k ∫T_k)
        let half_width = 0.5 * self.obs.width();
        let series: f64 = params
            .iter()
            .enumerate()
            .map(|(i, a)| a * chebyshev_integral(i + 1))
            .sum();
        half_width * (2.0 + series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Midpoint-rule integral of the normalized density.
    fn integrate(pdf: &dyn Pdf, params: &[f64], obs: &Observable) -> f64 {
        let n = 20_000;
        let h = obs.width() / n as f64;
        (0..n)
            .map(|i| pdf.density(obs.min + (i as f64 + 0.5) * h, params) * h)
            .sum()
    }

    #[test]
    fn gaussian_is_normalized_on_domain() {
        let obs = Observable::diphoton_mass();
        let g = GaussianPdf::new(&obs);
        for params in [[125.0, 2.0], [124.897, 2.9402], [106.0, 5.0]] {
            assert_relative_eq!(integrate(&g, &params, &obs), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn gaussian_ln_shape_does_not_underflow() {
        let obs = Observable::diphoton_mass();
        let g = GaussianPdf::new(&obs);
        let params = [125.0, 0.5];
        assert_eq!(g.shape(160.0, &params), 0.0);
        assert_relative_eq!(g.ln_shape(160.0, &params), -0.5 * 70.0 * 70.0, epsilon = 1e-9);
    }

    #[test]
    fn chebyshev_is_normalized_on_domain() {
        let obs = Observable::diphoton_mass();
        let c = ChebyshevPdf::new(&obs, 3);
        for params in [[-0.5, 0.1, 0.01], [0.0, 0.0, 0.0], [0.9, -0.3, 0.2]] {
            assert_relative_eq!(integrate(&c, &params, &obs), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn chebyshev_flat_when_coefficients_vanish() {
        let obs = Observable::diphoton_mass();
        let c = ChebyshevPdf::new(&obs, 3);
        assert_relative_eq!(c.density(130.0, &[0.0, 0.0, 0.0]), 1.0 / 55.0, epsilon = 1e-15);
    }

    #[test]
    fn chebyshev_high_order_uses_heap_buffer() {
        let obs = Observable::new("x", "x", -1.0, 1.0);
        let c = ChebyshevPdf::new(&obs, 9);
        let mut params = [0.0; 9];
        params[8] = 0.5;
        // T_9(1) = 1
        assert_relative_eq!(c.shape(1.0, &params), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_rejects_non_positive_width() {
        let obs = Observable::diphoton_mass();
        let g = GaussianPdf::new(&obs);
        assert!(g.validate(&[125.0, 0.0]).is_err());
        assert!(g.validate(&[125.0, 2.0]).is_ok());
    }
}
