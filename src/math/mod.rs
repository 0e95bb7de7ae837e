//! Mathematical utilities: special functions, Chebyshev polynomials and
//! finite-difference curvature / covariance estimation.

pub mod hessian;
pub mod special;

pub use hessian::*;
pub use special::*;
