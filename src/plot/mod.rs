//! PNG and SVG rendering of fit results and of the synthetic demo panels.

pub mod figure;
pub mod fonts;
pub mod panels;

pub use figure::*;
pub use panels::*;
