//! Read/write JSON side files.
//!
//! - signal shape hand-off (`SignalShape`): written by the MC fit, read by the
//!   data fit
//! - fit summaries (`FitSummary`)
//! - the histograms of the synthetic demo

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::{FitSummary, SignalShape};
use crate::error::AppError;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| AppError::io(format!("Failed to write '{}': {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path).map_err(|_| AppError::input_missing(path))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::invalid(format!("Invalid JSON in '{}': {e}", path.display())))
}

pub fn write_signal_shape(path: &Path, shape: &SignalShape) -> Result<(), AppError> {
    write_json(path, shape)
}

/// Read a signal shape and check it describes a usable peak.
pub fn read_signal_shape(path: &Path) -> Result<SignalShape, AppError> {
    let shape: SignalShape = read_json(path)?;
    if !(shape.mean.is_finite() && shape.sigma.is_finite() && shape.sigma > 0.0) {
        return Err(AppError::invalid(format!(
            "signal shape in '{}' has mean {} and width {}; width must be positive",
            path.display(),
            shape.mean,
            shape.sigma
        )));
    }
    Ok(shape)
}

pub fn write_fit_summary(path: &Path, summary: &FitSummary) -> Result<(), AppError> {
    write_json(path, summary)
}
