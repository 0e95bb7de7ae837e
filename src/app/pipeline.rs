//! The two fitting pipelines shared by the CLI and the integration tests.
//!
//! Both run in two phases: load and validate the input (returning early when the
//! file or table is missing, before anything is written), then build the model,
//! minimize, draw and print.

use std::path::PathBuf;

use chrono::Utc;
use log::info;

use crate::data::Dataset;
use crate::domain::{DataFitConfig, FitSummary, McFitConfig, ParamSummary, SignalShape};
use crate::error::AppError;
use crate::fit::{fit_to, significance, FitOptions, FitResult};
use crate::io::{load_dataset, write_fit_summary, write_signal_shape};
use crate::models::{data_model, mc_signal_model, Model, BACKGROUND};
use crate::plot::{render_fit_png, FitFigure};

pub const FIT_PNG_SIZE: (u32, u32) = (800, 600);
pub const DATA_FIT_TITLE: &str = "H->yy Data Fit (Mean Fixed)";
pub const MC_FIT_TITLE: &str = "Invariant Mass of Photons (Weighted MC)";

/// Everything a fitting pipeline produced.
#[derive(Debug)]
pub struct FitRun {
    pub fit: FitResult,
    /// Model with the fitted values.
    pub model: Model,
    pub n_entries: usize,
    /// Only set for the data fit.
    pub significance: Option<f64>,
    pub outputs: Vec<PathBuf>,
}

/// Extended signal + background fit with the signal shape held constant.
pub fn run_data_fit(cfg: &DataFitConfig) -> Result<FitRun, AppError> {
    let data = load_dataset(&cfg.input, &cfg.table, &cfg.observable, None)?;
    println!("{}", crate::report::format_data_events(data.num_entries()));

    let mut model = data_model(&cfg.observable, &cfg.signal, data.num_entries())?;
    println!("{}", crate::report::DATA_FIT_START);
    let opts = FitOptions {
        implicit_mt: cfg.implicit_mt,
        ..FitOptions::default()
    };
    let fit = fit_to(&mut model, &data, &opts)?;
    let z = significance(fit.value("nsig"), fit.error("nsig"));
    info!("data fit: status {} nll {:.4} edm {:.3e} after {} iterations", fit.status, fit.nll, fit.edm, fit.n_iter);

    let fig = FitFigure::from_model(DATA_FIT_TITLE, &model, &data, &[BACKGROUND]);
    render_fit_png(&cfg.output_png, &fig, FIT_PNG_SIZE)?;
    let mut outputs = vec![cfg.output_png.clone()];

    println!("\n{}", crate::report::format_data_fit(&fit, z));

    if let Some(path) = &cfg.export_summary {
        write_fit_summary(path, &summary("data-fit", &cfg.input, &data, &fit, Some(z)))?;
        outputs.push(path.clone());
    }

    Ok(FitRun {
        fit,
        model,
        n_entries: data.num_entries(),
        significance: Some(z),
        outputs,
    })
}

/// Weighted Gaussian fit to simulated signal with sum-of-weights-squared errors.
pub fn run_mc_fit(cfg: &McFitConfig) -> Result<FitRun, AppError> {
    let data = load_dataset(&cfg.input, &cfg.table, &cfg.observable, Some(&cfg.weight))?;
    info!(
        "mc fit: {} events, sum of weights {:.4}",
        data.num_entries(),
        data.sum_weights()
    );

    let mut model = mc_signal_model(&cfg.observable)?;
    let opts = FitOptions {
        sumw2_error: true,
        implicit_mt: cfg.implicit_mt,
        ..FitOptions::default()
    };
    let fit = fit_to(&mut model, &data, &opts)?;
    info!("mc fit: status {} nll {:.4} edm {:.3e} after {} iterations", fit.status, fit.nll, fit.edm, fit.n_iter);

    let fig = FitFigure::from_model(MC_FIT_TITLE, &model, &data, &[]);
    render_fit_png(&cfg.output_png, &fig, FIT_PNG_SIZE)?;
    let mut outputs = vec![cfg.output_png.clone()];

    println!("\n{}", crate::report::format_mc_fit(&fit));

    if let Some(path) = &cfg.export_shape {
        let shape = SignalShape {
            mean: fit.value("mean"),
            mean_error: fit.error("mean"),
            sigma: fit.value("sigma"),
            sigma_error: fit.error("sigma"),
            source: cfg.input.display().to_string(),
            status: fit.status,
            created: Utc::now(),
        };
        write_signal_shape(path, &shape)?;
        outputs.push(path.clone());
    }
    if let Some(path) = &cfg.export_summary {
        write_fit_summary(path, &summary("mc-fit", &cfg.input, &data, &fit, None))?;
        outputs.push(path.clone());
    }

    Ok(FitRun {
        fit,
        model,
        n_entries: data.num_entries(),
        significance: None,
        outputs,
    })
}

fn summary(
    pipeline: &str,
    input: &std::path::Path,
    data: &Dataset,
    fit: &FitResult,
    significance: Option<f64>,
) -> FitSummary {
    FitSummary {
        tool: format!("massfit {}", env!("CARGO_PKG_VERSION")),
        pipeline: pipeline.to_string(),
        input: input.display().to_string(),
        n_entries: data.num_entries(),
        status: fit.status,
        nll: fit.nll,
        edm: fit.edm,
        params: fit.params.iter().map(ParamSummary::from).collect(),
        significance,
        created: Utc::now(),
    }
}
