//! Signal/background model implementations.
//!
//! Densities are small immutable values behind the [`Pdf`] trait; a [`Model`] owns
//! the parameter list and ties densities to parameters by index so that the
//! likelihood code can stay generic.

pub mod diphoton;
pub mod model;
pub mod pdf;

pub use diphoton::*;
pub use model::*;
pub use pdf::*;
