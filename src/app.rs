//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module parses the CLI, sets up logging and
//! dispatches to the pipelines.

use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, HsimpleArgs};
use crate::domain::{HsimpleConfig, McFitConfig, PrepareConfig};
use crate::error::AppError;
use crate::hsimple::Headless;

pub mod pipeline;

/// Entry point for the `massfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::DataFit(args) => {
            let cfg = args.to_config()?;
            let run = pipeline::run_data_fit(&cfg)?;
            info!("wrote {:?}", run.outputs);
            Ok(())
        }
        Command::McFit(args) => {
            let run = pipeline::run_mc_fit(&McFitConfig::from(&args))?;
            info!("wrote {:?}", run.outputs);
            Ok(())
        }
        Command::Hsimple(args) => handle_hsimple(&args),
        Command::Prepare(args) => {
            let cfg = PrepareConfig::from(&args);
            let stats = crate::data::prepare(&cfg)?;
            println!("{}", crate::report::format_prepare_stats(&stats, &cfg));
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise warn, raised by each `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).try_init();
}

fn handle_hsimple(args: &HsimpleArgs) -> Result<(), AppError> {
    let cfg = HsimpleConfig::from(args);
    if cfg.reuse {
        if let Some(run) = crate::hsimple::open_existing(&cfg)? {
            println!("{}", crate::report::format_hsimple_run(&run));
            return Ok(());
        }
    }
    let run = if cfg.live {
        let mut view = crate::tui::LiveView::new(cfg.n_events)?;
        let run = crate::hsimple::generate(&cfg, &mut view)?;
        if !run.stopped_early {
            view.finish(run.iterations, &run.hists)?;
        }
        run
    } else {
        crate::hsimple::generate(&cfg, &mut Headless)?
    };
    println!("{}", crate::report::format_hsimple_run(&run));
    Ok(())
}
