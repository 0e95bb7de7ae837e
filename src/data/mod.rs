//! Event data: datasets, histograms, preprocessing and synthetic samples.
//!
//! - `dataset`: unbinned (optionally weighted) values of one observable
//! - `histogram`: fixed-width 1-D / 2-D histograms and profiles
//! - `prepare`: raw photon records to `m_yy` tables
//! - `sample`: synthetic datasets with known content

pub mod dataset;
pub mod histogram;
pub mod prepare;
pub mod sample;

pub use dataset::*;
pub use histogram::*;
pub use prepare::*;
pub use sample::*;
