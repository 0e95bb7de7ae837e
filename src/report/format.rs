//! Formatted terminal output.
//!
//! Report text goes to stdout, so every block is built as a `String` here and
//! printed by the caller. That keeps the wording testable without a process.

use crate::data::PrepareStats;
use crate::domain::PrepareConfig;
use crate::fit::FitResult;
use crate::hsimple::HsimpleRun;

const RULE_WIDTH: usize = 40;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn format_data_events(n: usize) -> String {
    format!(">>> Data events: {n}")
}

pub const DATA_FIT_START: &str = ">>> Starting data fit...";

/// Result block of the data fit.
pub fn format_data_fit(fit: &FitResult, significance: f64) -> String {
    let mut out = String::new();
    out.push_str(&rule());
    out.push('\n');
    out.push_str(&format!("Fit status: {} (0=success)\n", fit.status));
    out.push_str(&format!("Mean (Fixed)  : {:.4} GeV\n", fit.value("mean")));
    out.push_str(&format!("Sigma (Fixed) : {:.4} GeV\n", fit.value("sigma")));
    out.push_str(&format!(
        "Signal Yield  : {:.2} +/- {:.2}\n",
        fit.value("nsig"),
        fit.error("nsig")
    ));
    out.push_str(&format!(
        "Background Yield: {:.2} +/- {:.2}\n",
        fit.value("nbkg"),
        fit.error("nbkg")
    ));
    out.push_str(&format!("Significance  : {significance:.2} sigma (approx)\n"));
    out.push_str(&rule());
    out
}

/// Result block of the weighted MC fit.
pub fn format_mc_fit(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&rule());
    out.push('\n');
    out.push_str(&format!("Fit status: {}\n", fit.status));
    out.push_str("Extracted signal parameters (inputs for the data fit):\n");
    out.push_str(&format!(
        "  FINAL MEAN:  {:.4} +/- {:.4} GeV\n",
        fit.value("mean"),
        fit.error("mean")
    ));
    out.push_str(&format!(
        "  FINAL SIGMA: {:.4} +/- {:.4} GeV\n",
        fit.value("sigma"),
        fit.error("sigma")
    ));
    out.push_str(&rule());
    out
}

/// Benchmark line plus the list of written files.
pub fn format_hsimple_run(run: &HsimpleRun) -> String {
    let mut out = format!(
        "hsimple   : Real Time = {:>7.2} seconds ({} iterations{})",
        run.elapsed.as_secs_f64(),
        run.iterations,
        if run.stopped_early { ", stopped early" } else { "" }
    );
    for path in &run.outputs {
        out.push_str(&format!("\n  wrote {}", path.display()));
    }
    out
}

pub fn format_prepare_stats(stats: &PrepareStats, cfg: &PrepareConfig) -> String {
    let kind = if cfg.weighted { "MC" } else { "data" };
    format!(
        "Prepared {kind} table '{}' -> {}\n  rows read      : {}\n  trigger + 2γ   : {}\n  in mass window : {}",
        cfg.output_table,
        cfg.output.display(),
        stats.rows_read,
        stats.passed_trigger,
        stats.rows_written
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Param;
    use std::path::PathBuf;
    use std::time::Duration;

    fn result(params: Vec<Param>, status: i32) -> FitResult {
        FitResult {
            status,
            free: params.iter().filter(|p| p.is_free()).map(|p| p.name.clone()).collect(),
            params,
            covariance: None,
            nll: 0.0,
            edm: 0.0,
            n_iter: 0,
            n_fev: 0,
            converged: true,
            message: String::new(),
        }
    }

    fn with_error(mut p: Param, error: f64) -> Param {
        p.error = error;
        p
    }

    #[test]
    fn data_fit_block_layout() {
        let fit = result(
            vec![
                Param::fixed("mean", "Signal Mean", 124.897),
                Param::fixed("sigma", "Signal Width", 2.9402),
                with_error(Param::new("nsig", "Signal Yield", 123.456, -500.0, 2000.0), 30.0),
                with_error(Param::new("nbkg", "Background Yield", 9876.5, 0.0, 15000.0), 101.25),
            ],
            0,
        );
        let text = format_data_fit(&fit, 4.1152);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "=".repeat(40));
        assert_eq!(lines[1], "Fit status: 0 (0=success)");
        assert_eq!(lines[2], "Mean (Fixed)  : 124.8970 GeV");
        assert_eq!(lines[3], "Sigma (Fixed) : 2.9402 GeV");
        assert_eq!(lines[4], "Signal Yield  : 123.46 +/- 30.00");
        assert_eq!(lines[5], "Background Yield: 9876.50 +/- 101.25");
        assert_eq!(lines[6], "Significance  : 4.12 sigma (approx)");
        assert_eq!(lines[7], "=".repeat(40));
    }

    #[test]
    fn mc_fit_block_layout() {
        let fit = result(
            vec![
                with_error(Param::new("mean", "Signal Mean", 124.89701, 120.0, 130.0), 0.01234),
                with_error(Param::new("sigma", "Signal Width", 2.94019, 0.5, 5.0), 0.0099),
            ],
            1,
        );
        let text = format_mc_fit(&fit);
        assert!(text.contains("Fit status: 1\n"));
        assert!(text.contains("  FINAL MEAN:  124.8970 +/- 0.0123 GeV\n"));
        assert!(text.contains("  FINAL SIGMA: 2.9402 +/- 0.0099 GeV\n"));
    }

    #[test]
    fn hsimple_benchmark_line() {
        let run = HsimpleRun {
            hists: Default::default(),
            ntuple: Default::default(),
            iterations: 25_000,
            stopped_early: false,
            elapsed: Duration::from_millis(1234),
            outputs: vec![PathBuf::from("hsimple.png")],
        };
        let text = format_hsimple_run(&run);
        assert!(text.starts_with("hsimple   : Real Time =    1.23 seconds (25000 iterations)"));
        assert!(text.ends_with("wrote hsimple.png"));
    }

    #[test]
    fn data_events_line() {
        assert_eq!(format_data_events(1234), ">>> Data events: 1234");
    }
}
