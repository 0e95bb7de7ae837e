//! `massfit` library crate.
//!
//! The binary (`massfit`) is a thin wrapper around this library so that:
//!
//! - the fitting pipelines are testable without spawning processes
//! - the model, likelihood and plotting pieces are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod hsimple;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
