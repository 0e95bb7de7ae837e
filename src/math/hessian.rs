//! Finite-difference curvature and covariance estimation.
//!
//! The objective is only available as a black-box scalar function, so second
//! derivatives are taken with central differences:
//!
//! ```text
//! H_ii ≈ (f(x + h_i e_i) - 2 f(x) + f(x - h_i e_i)) / h_i²
//! H_ij ≈ (f(++) - f(+-) - f(-+) + f(--)) / (4 h_i h_j)
//! ```
//!
//! The off-diagonal stencil is symmetric in `(i, j)`, so the result is symmetric
//! by construction. Steps are supplied by the caller; the fitter sizes them as a
//! small fraction of the expected parameter uncertainty.

use nalgebra::{DMatrix, DVector};

/// How trustworthy the covariance matrix returned by [`invert_hessian`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceQuality {
    /// Hessian was positive definite and inverted directly.
    Accurate,
    /// Hessian needed a diagonal shift before it could be inverted.
    ForcedPosDef,
    /// No usable inverse.
    NotInvertible,
}

/// Second derivative along each coordinate only (`n` extra evaluation pairs).
pub fn diagonal_curvature<F, E>(f: &F, x: &[f64], steps: &[f64]) -> Result<Vec<f64>, E>
where
    F: Fn(&[f64]) -> Result<f64, E>,
{
    let f0 = f(x)?;
    let mut work = x.to_vec();
    let mut out = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let h = steps[i];
        work[i] = x[i] + h;
        let fp = f(&work)?;
        work[i] = x[i] - h;
        let fm = f(&work)?;
        work[i] = x[i];
        out.push((fp - 2.0 * f0 + fm) / (h * h));
    }
    Ok(out)
}

/// Full central-difference Hessian of `f` at `x`.
pub fn hessian<F, E>(f: &F, x: &[f64], steps: &[f64]) -> Result<DMatrix<f64>, E>
where
    F: Fn(&[f64]) -> Result<f64, E>,
{
    let n = x.len();
    let mut h = DMatrix::zeros(n, n);
    let diag = diagonal_curvature(f, x, steps)?;
    for i in 0..n {
        h[(i, i)] = diag[i];
    }

    let mut work = x.to_vec();
    for i in 0..n {
        for j in (i + 1)..n {
            let (hi, hj) = (steps[i], steps[j]);
            let mut corner = |si: f64, sj: f64| -> Result<f64, E> {
                work[i] = x[i] + si * hi;
                work[j] = x[j] + sj * hj;
                let v = f(&work);
                work[i] = x[i];
                work[j] = x[j];
                v
            };
            let fpp = corner(1.0, 1.0)?;
            let fpm = corner(1.0, -1.0)?;
            let fmp = corner(-1.0, 1.0)?;
            let fmm = corner(-1.0, -1.0)?;
            let v = (fpp - fpm - fmp + fmm) / (4.0 * hi * hj);
            h[(i, j)] = v;
            h[(j, i)] = v;
        }
    }
    Ok(h)
}

/// Invert a Hessian into a covariance matrix.
///
/// A plain Cholesky factorization is tried first. If the matrix is not positive
/// definite, the diagonal is shifted by a geometrically growing amount (scaled to
/// the largest diagonal element) until the factorization succeeds.
pub fn invert_hessian(hessian: &DMatrix<f64>) -> (Option<DMatrix<f64>>, CovarianceQuality) {
    let n = hessian.nrows();
    if n == 0 {
        return (Some(DMatrix::zeros(0, 0)), CovarianceQuality::Accurate);
    }
    if hessian.iter().any(|v| !v.is_finite()) {
        return (None, CovarianceQuality::NotInvertible);
    }

    let identity = DMatrix::identity(n, n);
    if let Some(chol) = hessian.clone().cholesky() {
        let cov = chol.solve(&identity);
        if has_positive_diagonal(&cov) {
            return (Some(cov), CovarianceQuality::Accurate);
        }
    }

    let diag_scale = (0..n)
        .map(|i| hessian[(i, i)].abs())
        .fold(0.0_f64, f64::max)
        .max(1e-300);
    let mut shift = diag_scale * 1e-8;
    for _ in 0..12 {
        let mut damped = hessian.clone();
        for i in 0..n {
            damped[(i, i)] += shift;
        }
        if let Some(chol) = damped.cholesky() {
            let cov = chol.solve(&identity);
            if has_positive_diagonal(&cov) {
                return (Some(cov), CovarianceQuality::ForcedPosDef);
            }
        }
        shift *= 10.0;
    }
    (None, CovarianceQuality::NotInvertible)
}

fn has_positive_diagonal(cov: &DMatrix<f64>) -> bool {
    (0..cov.nrows()).all(|i| {
        let v = cov[(i, i)];
        v.is_finite() && v > 0.0
    })
}

/// Estimated distance to minimum, `½ gᵀ V g`.
pub fn edm(gradient: &[f64], covariance: &DMatrix<f64>) -> f64 {
    let g = DVector::from_column_slice(gradient);
    0.5 * g.dot(&(covariance * &g))
}

/// Sandwich estimator `V · H₂ · V` for weighted likelihoods.
pub fn sandwich(v: &DMatrix<f64>, h2: &DMatrix<f64>) -> DMatrix<f64> {
    v * h2 * v
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(x: &[f64]) -> Result<f64, ()> {
        // f = 2x² + 3xy + 5y²
        Ok(2.0 * x[0] * x[0] + 3.0 * x[0] * x[1] + 5.0 * x[1] * x[1])
    }

    #[test]
    fn hessian_of_quadratic_is_exact() {
        let h = hessian(&quad, &[0.3, -0.7], &[1e-3, 1e-3]).unwrap();
        assert_relative_eq!(h[(0, 0)], 4.0, epsilon = 1e-6);
        assert_relative_eq!(h[(1, 1)], 10.0, epsilon = 1e-6);
        assert_relative_eq!(h[(0, 1)], 3.0, epsilon = 1e-6);
        assert_eq!(h[(0, 1)], h[(1, 0)]);
    }

    #[test]
    fn invert_positive_definite() {
        let h = DMatrix::from_row_slice(2, 2, &[4.0, 3.0, 3.0, 10.0]);
        let (cov, q) = invert_hessian(&h);
        let cov = cov.unwrap();
        assert_eq!(q, CovarianceQuality::Accurate);
        let prod = &h * &cov;
        assert_relative_eq!(prod[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(prod[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn indefinite_hessian_is_forced() {
        let h = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1e-6]);
        let (cov, q) = invert_hessian(&h);
        assert_eq!(q, CovarianceQuality::ForcedPosDef);
        let cov = cov.unwrap();
        assert!(cov[(0, 0)] > 0.0 && cov[(1, 1)] > 0.0);
    }

    #[test]
    fn non_finite_hessian_is_rejected() {
        let h = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        let (cov, q) = invert_hessian(&h);
        assert!(cov.is_none());
        assert_eq!(q, CovarianceQuality::NotInvertible);
    }

    #[test]
    fn edm_of_known_gradient() {
        let v = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 0.5]);
        assert_relative_eq!(edm(&[1.0, 2.0], &v), 0.5 * (2.0 + 2.0), epsilon = 1e-15);
    }
}
