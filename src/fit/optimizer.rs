//! Bounded quasi-Newton minimization.
//!
//! A thin wrapper around argmin's L-BFGS with a More-Thuente line search. Box
//! bounds are handled by clamping every evaluation point into the box and
//! projecting the gradient at active bounds.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use log::warn;

use crate::error::AppError;

/// Minimizer settings.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub max_iter: u64,
    /// Gradient-norm tolerance; the cost tolerance is a tenth of it.
    pub tol: f64,
    /// L-BFGS history length.
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-6,
            m: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub parameters: Vec<f64>,
    pub fval: f64,
    pub n_iter: u64,
    pub n_fev: usize,
    pub converged: bool,
    pub message: String,
}

/// Scalar objective with an optional analytic gradient.
pub trait Objective: Sync {
    fn eval(&self, x: &[f64]) -> Result<f64, AppError>;

    /// Central differences with a relative step.
    fn gradient(&self, x: &[f64]) -> Result<Vec<f64>, AppError> {
        let mut work = x.to_vec();
        let mut grad = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            let h = 1e-5 * x[i].abs().max(1.0);
            work[i] = x[i] + h;
            let fp = self.eval(&work)?;
            work[i] = x[i] - h;
            let fm = self.eval(&work)?;
            work[i] = x[i];
            grad.push((fp - fm) / (2.0 * h));
        }
        Ok(grad)
    }
}

pub fn clamp_params(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

/// Zero gradient components that point out of the box at an active bound.
pub fn project_gradient(x: &[f64], bounds: &[(f64, f64)], grad: &mut [f64]) {
    const EPS: f64 = 1e-12;
    for ((&v, &(lo, hi)), g) in x.iter().zip(bounds).zip(grad.iter_mut()) {
        if (v <= lo + EPS && *g > 0.0) || (v >= hi - EPS && *g < 0.0) {
            *g = 0.0;
        }
    }
}

/// Lowest finite cost seen so far and where it was evaluated.
type BestPoint = Mutex<Option<(f64, Vec<f64>)>>;

struct Problem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
    n_fev: &'a AtomicUsize,
    best: &'a BestPoint,
}

impl Problem<'_> {
    fn record(&self, x: &[f64], f: f64) {
        if !f.is_finite() {
            return;
        }
        if let Ok(mut best) = self.best.lock() {
            if best.as_ref().is_none_or(|(fb, _)| f < *fb) {
                *best = Some((f, x.to_vec()));
            }
        }
    }
}

impl CostFunction for Problem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        self.n_fev.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(x, self.bounds);
        let f = self
            .objective
            .eval(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        self.record(&clamped, f);
        Ok(f)
    }
}

impl Gradient for Problem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let clamped = clamp_params(x, self.bounds);
        let mut g = self
            .objective
            .gradient(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        project_gradient(&clamped, self.bounds, &mut g);
        Ok(g)
    }
}

/// L-BFGS with box constraints.
#[derive(Debug, Clone, Default)]
pub struct BoundedLbfgs {
    config: OptimizerConfig,
}

impl BoundedLbfgs {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` from `init` inside `bounds`.
    ///
    /// Returns `Err` for invalid input, or when the solver aborts before any
    /// cost was evaluated. Hitting the iteration limit, or aborting later, is
    /// reported through `converged = false` with the best point seen.
    pub fn minimize(
        &self,
        objective: &dyn Objective,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult, AppError> {
        if init.len() != bounds.len() {
            return Err(AppError::invalid(format!(
                "parameter and bounds length mismatch: {} != {}",
                init.len(),
                bounds.len()
            )));
        }
        if init.is_empty() {
            let fval = objective.eval(init)?;
            return Ok(OptimizationResult {
                parameters: Vec::new(),
                fval,
                n_iter: 0,
                n_fev: 1,
                converged: true,
                message: "no free parameters".to_string(),
            });
        }

        let n_fev = AtomicUsize::new(0);
        let best: BestPoint = Mutex::new(None);
        let problem = Problem {
            objective,
            bounds,
            n_fev: &n_fev,
            best: &best,
        };

        let tol_cost = if self.config.tol == 0.0 {
            0.0
        } else {
            (0.1 * self.config.tol).max(1e-12)
        };
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.config.m)
            .with_tolerance_grad(self.config.tol)
            .and_then(|s| s.with_tolerance_cost(tol_cost))
            .map_err(|e| AppError::invalid(format!("invalid optimizer tolerance: {e}")))?;

        let run = Executor::new(problem, solver)
            .configure(|state| state.param(clamp_params(init, bounds)).max_iters(self.config.max_iter))
            .run();
        let res = match run {
            Ok(res) => res,
            Err(e) => {
                let best = best.lock().ok().and_then(|mut b| b.take());
                let Some((fval, parameters)) = best else {
                    return Err(AppError::fit(format!("minimization aborted: {e}")));
                };
                warn!("minimizer aborted, keeping best point (cost {fval}): {e}");
                return Ok(OptimizationResult {
                    parameters,
                    fval,
                    n_iter: 0,
                    n_fev: n_fev.load(Ordering::Relaxed),
                    converged: false,
                    message: format!("aborted: {e}"),
                });
            }
        };

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| AppError::fit("minimizer returned no parameters"))?;
        let termination = state.get_termination_status();
        let converged = matches!(
            termination,
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
                | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
        );

        Ok(OptimizationResult {
            parameters: clamp_params(best, bounds),
            fval: state.get_best_cost(),
            n_iter: state.get_iter(),
            n_fev: n_fev.load(Ordering::Relaxed),
            converged,
            message: termination.to_string(),
        })
    }
}
