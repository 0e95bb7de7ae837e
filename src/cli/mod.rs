//! Command-line parsing for the diphoton mass fitter.
//!
//! Every subcommand runs with no arguments; the defaults reproduce the reference
//! analysis scripts. Arguments are mapped into the typed configs in
//! [`crate::domain`] before any pipeline runs.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{
    DataFitConfig, HsimpleConfig, McFitConfig, Observable, PrepareConfig, SignalShape, DEFAULT_TABLE,
};
use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "massfit", version, about = "H->γγ invariant-mass fits and demo data")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extended signal + background fit to data with the signal shape fixed.
    DataFit(DataFitArgs),
    /// Weighted Gaussian fit to simulated signal.
    McFit(McFitArgs),
    /// Fill demo histograms, a profile and an n-tuple from random numbers.
    Hsimple(HsimpleArgs),
    /// Derive the fit input table from raw photon records.
    Prepare(PrepareArgs),
}

#[derive(Debug, Args, Clone)]
pub struct DataFitArgs {
    /// Input Parquet file.
    #[arg(short, long, default_value = "temp_data_for_fit.parquet")]
    pub input: PathBuf,

    /// Table name inside the input file.
    #[arg(short, long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Output image.
    #[arg(short, long, default_value = "data_fit.png")]
    pub output: PathBuf,

    /// Signal shape JSON written by `massfit mc-fit --export-shape`.
    #[arg(long, value_name = "JSON")]
    pub signal_shape: Option<PathBuf>,

    /// Write a JSON fit summary.
    #[arg(long, value_name = "JSON")]
    pub export_summary: Option<PathBuf>,

    /// Evaluate the likelihood on one thread.
    #[arg(long)]
    pub single_thread: bool,
}

#[derive(Debug, Args, Clone)]
pub struct McFitArgs {
    /// Input Parquet file.
    #[arg(short, long, default_value = "temp_mc_processed.parquet")]
    pub input: PathBuf,

    /// Table name inside the input file.
    #[arg(short, long, default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Output image.
    #[arg(short, long, default_value = "mc_signal_gauss_fit.png")]
    pub output: PathBuf,

    /// Write the fitted signal shape as JSON (input for `data-fit --signal-shape`).
    #[arg(long, value_name = "JSON")]
    pub export_shape: Option<PathBuf>,

    /// Write a JSON fit summary.
    #[arg(long, value_name = "JSON")]
    pub export_summary: Option<PathBuf>,

    /// Evaluate the likelihood on one thread.
    #[arg(long)]
    pub single_thread: bool,
}

#[derive(Debug, Args, Clone)]
pub struct HsimpleArgs {
    /// Directory for hsimple.png, hsimple.parquet and hsimple.json.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of iterations.
    #[arg(short = 'n', long, default_value_t = 25_000)]
    pub events: usize,

    /// Redraw every N iterations.
    #[arg(long, default_value_t = 1_000)]
    pub update_every: usize,

    /// Random seed.
    #[arg(long, default_value_t = 4357)]
    pub seed: u64,

    /// Show the panels in the terminal while filling (q / Esc stops).
    #[arg(long)]
    pub live: bool,

    /// Reuse hsimple.parquet and hsimple.json from the output directory if both exist.
    #[arg(long)]
    pub reuse: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PrepareArgs {
    /// Raw input Parquet file.
    #[arg(short, long, default_value = "mc_343981.ggH125_gamgam.GamGam.parquet")]
    pub input: PathBuf,

    /// Table name inside the raw file.
    #[arg(long, default_value = "mini")]
    pub input_table: String,

    /// Output Parquet file.
    #[arg(short, long, default_value = "temp_mc_processed.parquet")]
    pub output: PathBuf,

    /// Table name for the output.
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub output_table: String,

    /// Real data: skip the MC weight.
    #[arg(long)]
    pub data: bool,
}

impl DataFitArgs {
    /// Build the pipeline config; reads the signal shape file if one is given.
    pub fn to_config(&self) -> Result<DataFitConfig, AppError> {
        let signal = match &self.signal_shape {
            Some(path) => crate::io::read_signal_shape(path)?,
            None => SignalShape::transcribed(),
        };
        Ok(DataFitConfig {
            input: self.input.clone(),
            table: self.table.clone(),
            output_png: self.output.clone(),
            signal,
            implicit_mt: !self.single_thread,
            export_summary: self.export_summary.clone(),
            ..DataFitConfig::default()
        })
    }
}

impl From<&McFitArgs> for McFitConfig {
    fn from(args: &McFitArgs) -> Self {
        Self {
            input: args.input.clone(),
            table: args.table.clone(),
            output_png: args.output.clone(),
            implicit_mt: !args.single_thread,
            export_shape: args.export_shape.clone(),
            export_summary: args.export_summary.clone(),
            ..McFitConfig::default()
        }
    }
}

impl From<&HsimpleArgs> for HsimpleConfig {
    fn from(args: &HsimpleArgs) -> Self {
        Self {
            output_dir: args.output_dir.clone(),
            n_events: args.events,
            update_every: args.update_every,
            seed: args.seed,
            live: args.live,
            reuse: args.reuse,
        }
    }
}

impl From<&PrepareArgs> for PrepareConfig {
    fn from(args: &PrepareArgs) -> Self {
        Self {
            input: args.input.clone(),
            input_table: args.input_table.clone(),
            output: args.output.clone(),
            output_table: args.output_table.clone(),
            weighted: !args.data,
            observable: Observable::diphoton_mass(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_run_without_arguments() {
        let cli = Cli::try_parse_from(["massfit", "data-fit"]).unwrap();
        let Command::DataFit(args) = cli.command else {
            panic!("expected data-fit");
        };
        let cfg = args.to_config().unwrap();
        assert_eq!(cfg.input, PathBuf::from("temp_data_for_fit.parquet"));
        assert_eq!(cfg.table, "small_tree");
        assert_eq!(cfg.signal, SignalShape::transcribed());
        assert!(cfg.implicit_mt);

        let cli = Cli::try_parse_from(["massfit", "-vv", "mc-fit", "--single-thread"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::McFit(args) = cli.command else {
            panic!("expected mc-fit");
        };
        let cfg = McFitConfig::from(&args);
        assert_eq!(cfg.output_png, PathBuf::from("mc_signal_gauss_fit.png"));
        assert!(!cfg.implicit_mt);
    }

    #[test]
    fn hsimple_and_prepare_defaults() {
        let cli = Cli::try_parse_from(["massfit", "hsimple"]).unwrap();
        let Command::Hsimple(args) = cli.command else {
            panic!("expected hsimple");
        };
        let cfg = HsimpleConfig::from(&args);
        assert_eq!(cfg.n_events, 25_000);
        assert_eq!(cfg.update_every, 1_000);
        assert_eq!(cfg.seed, 4357);
        assert!(!cfg.live);
        assert!(!cfg.reuse);

        let cli = Cli::try_parse_from(["massfit", "prepare", "--data"]).unwrap();
        let Command::Prepare(args) = cli.command else {
            panic!("expected prepare");
        };
        let cfg = PrepareConfig::from(&args);
        assert!(!cfg.weighted);
        assert_eq!(cfg.input_table, "mini");
    }

    #[test]
    fn missing_signal_shape_file_is_reported() {
        let cli = Cli::try_parse_from(["massfit", "data-fit", "--signal-shape", "/nonexistent/shape.json"]).unwrap();
        let Command::DataFit(args) = cli.command else {
            panic!("expected data-fit");
        };
        let err = args.to_config().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InputMissing);
    }
}
