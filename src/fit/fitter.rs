//! Maximum-likelihood fit of a [`Model`] to a [`Dataset`].
//!
//! Given:
//! - a model whose free parameters carry start values and bounds
//! - an unbinned (optionally weighted) dataset
//!
//! we
//! - minimize the NLL in scaled coordinates `u = (x - x0) / s`, where `s` is a
//!   per-parameter curvature scale, so that yields of order 10³ and shape
//!   coefficients of order 10⁻¹ look alike to the quasi-Newton solver
//! - compute a central-difference Hessian at the minimum and invert it
//! - optionally apply the sum-of-weights-squared correction `V' = V H₂ V`
//! - write fitted values and errors back into the model.
//!
//! Status codes follow the usual minimizer convention:
//!
//! | code | meaning |
//! |---|---|
//! | 0 | converged, covariance accurate |
//! | 1 | covariance forced positive-definite |
//! | 2 | Hessian not invertible (errors reported as 0) |
//! | 3 | EDM above threshold |
//! | 4 | iteration limit reached or minimizer aborted |

use log::{debug, info, warn};
use nalgebra::DMatrix;

use crate::data::Dataset;
use crate::domain::Param;
use crate::error::AppError;
use crate::fit::nll::{Nll, WeightMode};
use crate::fit::optimizer::{project_gradient, BoundedLbfgs, Objective, OptimizerConfig};
use crate::math::{diagonal_curvature, edm, hessian, invert_hessian, sandwich, CovarianceQuality};
use crate::models::Model;

/// EDM threshold for a converged fit.
pub const EDM_MAX: f64 = 1e-3;

/// Hessian step as a fraction of the curvature scale.
const HESSIAN_STEP: f64 = 0.02;

pub const STATUS_OK: i32 = 0;
pub const STATUS_FORCED_POS_DEF: i32 = 1;
pub const STATUS_HESSIAN_INVALID: i32 = 2;
pub const STATUS_EDM_ABOVE_MAX: i32 = 3;
pub const STATUS_CALL_LIMIT: i32 = 4;

#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Use the sandwich estimator for weighted data.
    pub sumw2_error: bool,
    /// Evaluate the likelihood on the rayon pool.
    pub implicit_mt: bool,
    pub optimizer: OptimizerConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            sumw2_error: false,
            implicit_mt: true,
            optimizer: OptimizerConfig {
                max_iter: 1000,
                tol: 1e-5,
                m: 10,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub status: i32,
    /// All model parameters after the fit (constants included).
    pub params: Vec<Param>,
    /// Names of the free parameters, in covariance order.
    pub free: Vec<String>,
    pub covariance: Option<DMatrix<f64>>,
    pub nll: f64,
    pub edm: f64,
    pub n_iter: u64,
    pub n_fev: usize,
    pub converged: bool,
    pub message: String,
}

impl FitResult {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> f64 {
        self.param(name).map_or(f64::NAN, |p| p.value)
    }

    pub fn error(&self, name: &str) -> f64 {
        self.param(name).map_or(0.0, |p| p.error)
    }
}

/// NLL as a function of the free parameters only, in scaled coordinates.
struct ScaledObjective<'a> {
    nll: Nll<'a>,
    template: Vec<f64>,
    free: &'a [usize],
    origin: &'a [f64],
    scale: &'a [f64],
}

impl ScaledObjective<'_> {
    fn full(&self, u: &[f64]) -> Vec<f64> {
        let mut full = self.template.clone();
        for (k, &i) in self.free.iter().enumerate() {
            full[i] = self.origin[k] + self.scale[k] * u[k];
        }
        full
    }
}

impl Objective for ScaledObjective<'_> {
    fn eval(&self, u: &[f64]) -> Result<f64, AppError> {
        self.nll.eval(&self.full(u))
    }
}

/// Fit `model` to `data` and store the fitted values and errors in `model`.
///
/// Input problems (bad model, data outside the domain) are errors; a fit that
/// fails to converge is not, it is reported through [`FitResult::status`].
pub fn fit_to(model: &mut Model, data: &Dataset, opts: &FitOptions) -> Result<FitResult, AppError> {
    model.validate()?;
    data.validate_against(&model.observable)?;
    if data.is_empty() {
        return Err(AppError::invalid(format!("dataset '{}' is empty", data.name)));
    }

    let template = model.values();
    let free: Vec<usize> = model
        .params()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_free())
        .map(|(i, _)| i)
        .collect();
    let x0: Vec<f64> = free.iter().map(|&i| template[i]).collect();
    let bounds: Vec<(f64, f64)> = free.iter().map(|&i| model.params()[i].bounds()).collect();

    let nll = Nll::new(model, data).with_implicit_mt(opts.implicit_mt);
    let f_free = |x: &[f64]| -> Result<f64, AppError> {
        let mut full = template.clone();
        for (k, &i) in free.iter().enumerate() {
            full[i] = x[k];
        }
        nll.eval(&full)
    };

    let scale = curvature_scales(&f_free, &x0, &bounds)?;
    debug!("parameter scales: {scale:?}");

    let u_bounds: Vec<(f64, f64)> = bounds
        .iter()
        .zip(&x0)
        .zip(&scale)
        .map(|((&(lo, hi), &x), &s)| ((lo - x) / s, (hi - x) / s))
        .collect();
    let objective = ScaledObjective {
        nll: Nll::new(model, data).with_implicit_mt(opts.implicit_mt),
        template: template.clone(),
        free: &free,
        origin: &x0,
        scale: &scale,
    };

    let optimizer = BoundedLbfgs::new(opts.optimizer.clone());
    let (x_hat, converged, n_iter, n_fev, message) =
        match optimizer.minimize(&objective, &vec![0.0; free.len()], &u_bounds) {
            Ok(r) => {
                let x: Vec<f64> = r
                    .parameters
                    .iter()
                    .zip(&x0)
                    .zip(&scale)
                    .zip(&bounds)
                    .map(|(((&u, &x), &s), &(lo, hi))| (x + s * u).clamp(lo, hi))
                    .collect();
                (x, r.converged, r.n_iter, r.n_fev, r.message)
            }
            Err(e) => {
                warn!("minimizer aborted: {e}");
                (x0.clone(), false, 0, 0, e.to_string())
            }
        };
    let nll_min = f_free(&x_hat)?;
    info!("minimum NLL {nll_min:.6} after {n_iter} iterations ({message})");

    // Re-derive step sizes at the minimum before the full Hessian.
    let post_scale = curvature_scales(&f_free, &x_hat, &bounds)?;
    let steps: Vec<f64> = post_scale.iter().map(|s| HESSIAN_STEP * s).collect();
    let h = hessian(&f_free, &x_hat, &steps)?;
    let (v, quality) = invert_hessian(&h);

    let mut grad = central_gradient(&f_free, &x_hat, &steps)?;
    project_gradient(&x_hat, &bounds, &mut grad);
    let edm_value = v.as_ref().map_or(f64::NAN, |v| edm(&grad, v));

    let cov = match v {
        Some(v) if opts.sumw2_error && data.is_weighted() => {
            let nll2 = Nll::new(model, data)
                .with_weights(WeightMode::Squared)
                .with_implicit_mt(opts.implicit_mt);
            let f2 = |x: &[f64]| -> Result<f64, AppError> {
                let mut full = template.clone();
                for (k, &i) in free.iter().enumerate() {
                    full[i] = x[k];
                }
                nll2.eval(&full)
            };
            let h2 = hessian(&f2, &x_hat, &steps)?;
            Some(sandwich(&v, &h2))
        }
        other => other,
    };

    let status = if !converged {
        STATUS_CALL_LIMIT
    } else if quality == CovarianceQuality::NotInvertible {
        STATUS_HESSIAN_INVALID
    } else if edm_value.is_nan() || edm_value > EDM_MAX {
        STATUS_EDM_ABOVE_MAX
    } else if quality == CovarianceQuality::ForcedPosDef {
        STATUS_FORCED_POS_DEF
    } else {
        STATUS_OK
    };
    if status != STATUS_OK {
        warn!("fit of '{}' finished with status {status} (edm {edm_value:.3e}, {message})", model.name);
    }

    for (k, &i) in free.iter().enumerate() {
        let p = &mut model.params_mut()[i];
        p.value = x_hat[k];
        p.error = cov
            .as_ref()
            .map(|c| c[(k, k)])
            .filter(|v| v.is_finite() && *v > 0.0)
            .map_or(0.0, f64::sqrt);
    }

    Ok(FitResult {
        status,
        params: model.params().to_vec(),
        free: free.iter().map(|&i| model.params()[i].name.clone()).collect(),
        covariance: cov,
        nll: nll_min,
        edm: edm_value,
        n_iter,
        n_fev,
        converged,
        message,
    })
}

/// Per-parameter scale `1 / sqrt(∂²f/∂x²)`, falling back to a tenth of the
/// allowed range where the curvature is not positive.
fn curvature_scales<F>(f: &F, x: &[f64], bounds: &[(f64, f64)]) -> Result<Vec<f64>, AppError>
where
    F: Fn(&[f64]) -> Result<f64, AppError>,
{
    let steps: Vec<f64> = bounds.iter().map(|&(lo, hi)| 1e-3 * (hi - lo)).collect();
    let curv = diagonal_curvature(f, x, &steps)?;
    Ok(curv
        .iter()
        .zip(bounds)
        .map(|(&c, &(lo, hi))| {
            let range = hi - lo;
            if c.is_finite() && c > 0.0 {
                (1.0 / c.sqrt()).min(range)
            } else {
                0.1 * range
            }
        })
        .collect())
}

fn central_gradient<F>(f: &F, x: &[f64], steps: &[f64]) -> Result<Vec<f64>, AppError>
where
    F: Fn(&[f64]) -> Result<f64, AppError>,
{
    let mut work = x.to_vec();
    let mut grad = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let h = steps[i];
        work[i] = x[i] + h;
        let fp = f(&work)?;
        work[i] = x[i] - h;
        let fm = f(&work)?;
        work[i] = x[i];
        grad.push((fp - fm) / (2.0 * h));
    }
    Ok(grad)
}

/// `nsig / err(nsig)` when the error is positive, else `0`.
pub fn significance(value: f64, error: f64) -> f64 {
    if error > 0.0 { value / error } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observable;
    use crate::models::GaussianPdf;
    use approx::assert_relative_eq;

    /// Deterministic "data": normal quantiles on a midpoint grid.
    fn normal_quantiles(mean: f64, sigma: f64, n: usize) -> Vec<f64> {
        use statrs::distribution::{ContinuousCDF, Normal};
        let d = Normal::new(mean, sigma).unwrap();
        (0..n).map(|i| d.inverse_cdf((i as f64 + 0.5) / n as f64)).collect()
    }

    fn gauss_model() -> Model {
        let obs = Observable::new("x", "x", 80.0, 120.0);
        let mut m = Model::new("g", obs.clone());
        let mean = m.add_param(Param::new("mean", "mean", 98.0, 90.0, 110.0)).unwrap();
        let sigma = m.add_param(Param::new("sigma", "sigma", 3.0, 0.5, 10.0)).unwrap();
        m.add_component("g", Box::new(GaussianPdf::new(&obs)), vec![mean, sigma], None)
            .unwrap();
        m
    }

    #[test]
    fn recovers_gaussian_parameters() {
        let mut m = gauss_model();
        let ds = Dataset::new("d", normal_quantiles(100.0, 2.0, 2000));
        let r = fit_to(&mut m, &ds, &FitOptions::default()).unwrap();
        assert_eq!(r.status, STATUS_OK, "{}", r.message);
        assert_relative_eq!(r.value("mean"), 100.0, epsilon = 1e-3);
        assert_relative_eq!(r.value("sigma"), 2.0, epsilon = 5e-3);
        // σ/√N and σ/√(2N)
        assert_relative_eq!(r.error("mean"), 2.0 / 2000f64.sqrt(), max_relative = 0.05);
        assert_relative_eq!(r.error("sigma"), 2.0 / 4000f64.sqrt(), max_relative = 0.05);
        assert_eq!(m.param("mean").unwrap().value, r.value("mean"));
        assert!(r.edm < EDM_MAX);
    }

    #[test]
    fn unit_weights_do_not_change_sumw2_errors() {
        let xs = normal_quantiles(100.0, 2.0, 1000);
        let mut plain = gauss_model();
        let r1 = fit_to(&mut plain, &Dataset::new("d", xs.clone()), &FitOptions::default()).unwrap();
        let mut weighted = gauss_model();
        let ds = Dataset::weighted("d", xs.clone(), vec![1.0; xs.len()]).unwrap();
        let opts = FitOptions {
            sumw2_error: true,
            ..FitOptions::default()
        };
        let r2 = fit_to(&mut weighted, &ds, &opts).unwrap();
        assert_relative_eq!(r1.error("mean"), r2.error("mean"), max_relative = 1e-6);
    }

    #[test]
    fn sumw2_scales_errors_with_effective_entries() {
        let xs = normal_quantiles(100.0, 2.0, 1000);
        // Constant weight 0.1: Σw = 100 but effective N stays 1000.
        let ds = Dataset::weighted("d", xs.clone(), vec![0.1; xs.len()]).unwrap();
        let mut m = gauss_model();
        let opts = FitOptions {
            sumw2_error: true,
            ..FitOptions::default()
        };
        let r = fit_to(&mut m, &ds, &opts).unwrap();
        assert_relative_eq!(r.error("mean"), 2.0 / 1000f64.sqrt(), max_relative = 0.05);
    }

    #[test]
    fn data_outside_domain_is_rejected() {
        let mut m = gauss_model();
        let ds = Dataset::new("d", vec![100.0, 200.0]);
        assert!(fit_to(&mut m, &ds, &FitOptions::default()).is_err());
    }

    #[test]
    fn significance_is_zero_without_error() {
        assert_eq!(significance(12.0, 0.0), 0.0);
        assert_relative_eq!(significance(12.0, 4.0), 3.0);
    }
}
