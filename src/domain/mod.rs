//! Shared domain types.
//!
//! These types are intentionally kept lightweight. The ones that leave the process
//! (signal shape hand-off, fit summaries) are serializable so they can be:
//!
//! - exported to JSON after a fit
//! - reloaded by a later pipeline run

pub mod types;

pub use types::*;
