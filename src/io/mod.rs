//! Input/output helpers.
//!
//! - named Parquet tables: read, range-filtered dataset load, write (`table`)
//! - JSON side files: signal shape, fit summary, demo histograms (`json`)

pub mod json;
pub mod table;

pub use json::*;
pub use table::*;
