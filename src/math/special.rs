//! Special functions used by the model densities.
//!
//! Numerical notes:
//! - The normal CDF is written in terms of `erfc` rather than `erf` so that the far
//!   lower tail keeps relative precision (`1 + erf(z)` cancels catastrophically).
//! - Chebyshev polynomials are evaluated with the three-term recurrence
//!   `T_{k+1}(x) = 2x T_k(x) - T_{k-1}(x)`, which is stable on `[-1, 1]`.

use statrs::function::erf::erfc;

/// Standard normal cumulative distribution `Φ(z)`.
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

/// Probability mass of `N(mean, sigma)` inside `[a, b]`.
pub fn normal_mass(mean: f64, sigma: f64, a: f64, b: f64) -> f64 {
    let za = (a - mean) / sigma;
    let zb = (b - mean) / sigma;
    if za > 0.0 {
        // Both edges in the upper tail: use the mirrored form for precision.
        std_normal_cdf(-za) - std_normal_cdf(-zb)
    } else {
        std_normal_cdf(zb) - std_normal_cdf(za)
    }
}

/// Fill `out[k] = T_k(x)` for `k = 0..out.len()`.
pub fn chebyshev_fill(x: f64, out: &mut [f64]) {
    if out.is_empty() {
        return;
    }
    out[0] = 1.0;
    if out.len() == 1 {
        return;
    }
    out[1] = x;
    for k in 2..out.len() {
        out[k] = 2.0 * x * out[k - 1] - out[k - 2];
    }
}

/// `∫_{-1}^{1} T_k(x) dx`: zero for odd `k`, `2 / (1 - k²)` for even `k`.
pub fn chebyshev_integral(k: usize) -> f64 {
    if k % 2 == 1 {
        0.0
    } else {
        let k = k as f64;
        2.0 / (1.0 - k * k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normal_cdf_reference_values() {
        assert_relative_eq!(std_normal_cdf(0.0), 0.5, epsilon = 1e-15);
        // erfc is good to about 1e-11 absolute.
        assert_relative_eq!(std_normal_cdf(1.0), 0.841_344_746_068_542_9, max_relative = 1e-9);
        assert_relative_eq!(std_normal_cdf(-3.0), 0.001_349_898_031_630_094_6, max_relative = 1e-10);
        assert!(std_normal_cdf(-40.0) >= 0.0);
    }

    #[test]
    fn normal_mass_is_symmetric() {
        let inner = normal_mass(0.0, 1.0, -1.0, 1.0);
        assert_relative_eq!(inner, 0.682_689_492_137_085_9, max_relative = 1e-9);
        let upper = normal_mass(0.0, 1.0, 5.0, 6.0);
        let lower = normal_mass(0.0, 1.0, -6.0, -5.0);
        assert_relative_eq!(upper, lower, max_relative = 1e-10);
        assert!(upper > 0.0);
    }

    #[test]
    fn chebyshev_recurrence_matches_closed_form() {
        let mut t = [0.0; 5];
        for &x in &[-1.0, -0.3, 0.0, 0.5, 1.0] {
            chebyshev_fill(x, &mut t);
            assert_relative_eq!(t[2], 2.0 * x * x - 1.0, epsilon = 1e-14);
            assert_relative_eq!(t[3], 4.0 * x * x * x - 3.0 * x, epsilon = 1e-14);
            assert_relative_eq!(t[4], 8.0 * x.powi(4) - 8.0 * x * x + 1.0, epsilon = 1e-14);
            // T_k(cos θ) = cos(kθ)
            let theta = f64::acos(x);
            assert_relative_eq!(t[3], (3.0 * theta).cos(), epsilon = 1e-12);
        }
    }

    #[test]
    fn chebyshev_integrals() {
        assert_eq!(chebyshev_integral(0), 2.0);
        assert_eq!(chebyshev_integral(1), 0.0);
        assert_relative_eq!(chebyshev_integral(2), -2.0 / 3.0, epsilon = 1e-15);
        assert_eq!(chebyshev_integral(3), 0.0);
    }
}
