//! Likelihood fitting.
//!
//! Responsibilities:
//!
//! - evaluate the (extended, optionally weighted) NLL of a model on a dataset
//! - minimize it under box bounds
//! - derive errors, EDM and a status code from the curvature at the minimum

pub mod fitter;
pub mod nll;
pub mod optimizer;

pub use fitter::*;
pub use nll::*;
pub use optimizer::*;
