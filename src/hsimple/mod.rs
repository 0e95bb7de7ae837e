//! Dynamic-filling demo: random `(px, py)` pairs fill a histogram, a 2-D
//! histogram, a profile and a flat n-tuple, with a periodic redraw.
//!
//! Every `update_every` iterations the panels are drawn to `hsimple.png` and
//! `hsimple.svg` and pending UI events are processed; a quit request stops the
//! loop early. Afterwards the n-tuple is written to `hsimple.parquet` (table
//! `ntuple`) and the histograms to `hsimple.json`. [`open_existing`] reloads
//! those two files instead of generating them again.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::data::{Hist1D, Hist2D, Profile};
use crate::domain::HsimpleConfig;
use crate::error::AppError;
use crate::io::{read_json, read_table, write_json, write_table, Column};
use crate::plot::{render_panels_png, render_panels_svg};

pub const PNG_NAME: &str = "hsimple.png";
pub const SVG_NAME: &str = "hsimple.svg";
pub const NTUPLE_NAME: &str = "hsimple.parquet";
pub const HISTOGRAMS_NAME: &str = "hsimple.json";
pub const NTUPLE_TABLE: &str = "ntuple";

/// Columns of the flat tuple (`px:py:pz:random:i`), single precision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ntuple {
    pub px: Vec<f32>,
    pub py: Vec<f32>,
    pub pz: Vec<f32>,
    pub random: Vec<f32>,
    pub i: Vec<f32>,
}

impl Ntuple {
    pub fn fill(&mut self, px: f32, py: f32, pz: f32, random: f32, i: f32) {
        self.px.push(px);
        self.py.push(py);
        self.pz.push(pz);
        self.random.push(random);
        self.i.push(i);
    }

    pub fn len(&self) -> usize {
        self.px.len()
    }

    pub fn is_empty(&self) -> bool {
        self.px.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        write_table(
            path,
            NTUPLE_TABLE,
            vec![
                ("px", Column::F32(self.px.clone())),
                ("py", Column::F32(self.py.clone())),
                ("pz", Column::F32(self.pz.clone())),
                ("random", Column::F32(self.random.clone())),
                ("i", Column::F32(self.i.clone())),
            ],
        )
    }

    pub fn read(path: &Path) -> Result<Self, AppError> {
        let t = read_table(path, NTUPLE_TABLE)?;
        let col = |name: &str| -> Result<Vec<f32>, AppError> {
            Ok(t.column_f64(name)?.into_iter().map(|v| v as f32).collect())
        };
        Ok(Self {
            px: col("px")?,
            py: col("py")?,
            pz: col("pz")?,
            random: col("random")?,
            i: col("i")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histograms {
    pub hpx: Hist1D,
    pub hpxpy: Hist2D,
    pub hprof: Profile,
}

impl Histograms {
    pub fn new() -> Self {
        Self {
            hpx: Hist1D::new("hpx", "This is the px distribution", 100, -4.0, 4.0),
            hpxpy: Hist2D::new("hpxpy", "py vs px", 40, -4.0, 4.0, 40, -4.0, 4.0),
            hprof: Profile::new("hprof", "Profile of pz versus px", 100, -4.0, 4.0, 0.0, 20.0),
        }
    }
}

impl Default for Histograms {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of "pending UI events" checked after every redraw.
pub trait UiEvents {
    /// Show the current state; return `true` when the user asked to stop.
    fn process(&mut self, iteration: usize, hists: &Histograms) -> Result<bool, AppError>;
}

/// No UI: never requests a stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl UiEvents for Headless {
    fn process(&mut self, _iteration: usize, _hists: &Histograms) -> Result<bool, AppError> {
        Ok(false)
    }
}

#[derive(Debug, Clone)]
pub struct HsimpleRun {
    pub hists: Histograms,
    pub ntuple: Ntuple,
    /// Iterations actually run.
    pub iterations: usize,
    pub stopped_early: bool,
    pub elapsed: Duration,
    pub outputs: Vec<PathBuf>,
}

/// Fill the objects for `cfg.n_events` iterations (or until `ui` asks to stop).
pub fn fill(cfg: &HsimpleConfig, ui: &mut dyn UiEvents) -> Result<HsimpleRun, AppError> {
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut hists = Histograms::new();
    let mut ntuple = Ntuple::default();
    let mut stopped_early = false;
    let mut iterations = 0;

    for i in 0..cfg.n_events {
        let px = rng.sample::<f64, _>(StandardNormal) as f32;
        let py = rng.sample::<f64, _>(StandardNormal) as f32;
        let pz = px * px + py * py;
        let random: f32 = rng.r#gen();

        hists.hpx.fill(px as f64);
        hists.hpxpy.fill(px as f64, py as f64);
        hists.hprof.fill(px as f64, pz as f64);
        ntuple.fill(px, py, pz, random, i as f32);
        iterations = i + 1;

        if i > 0 && cfg.update_every > 0 && i % cfg.update_every == 0 {
            draw(cfg, &hists)?;
            debug!("hsimple: redraw at iteration {i}");
            if ui.process(i, &hists)? {
                info!("hsimple: stopped by user at iteration {i}");
                stopped_early = true;
                break;
            }
        }
    }

    Ok(HsimpleRun {
        hists,
        ntuple,
        iterations,
        stopped_early,
        elapsed: start.elapsed(),
        outputs: Vec::new(),
    })
}

fn draw(cfg: &HsimpleConfig, hists: &Histograms) -> Result<[PathBuf; 2], AppError> {
    let png = cfg.output_dir.join(PNG_NAME);
    let svg = cfg.output_dir.join(SVG_NAME);
    render_panels_png(&png, &hists.hpx, &hists.hpxpy)?;
    render_panels_svg(&svg, &hists.hpx, &hists.hpxpy)?;
    Ok([png, svg])
}

/// Run the demo and persist its objects under `cfg.output_dir`.
pub fn generate(cfg: &HsimpleConfig, ui: &mut dyn UiEvents) -> Result<HsimpleRun, AppError> {
    std::fs::create_dir_all(&cfg.output_dir).map_err(|e| {
        AppError::io(format!("Cannot create '{}': {e}", cfg.output_dir.display()))
    })?;
    let mut run = fill(cfg, ui)?;

    let ntuple_path = cfg.output_dir.join(NTUPLE_NAME);
    run.ntuple.write(&ntuple_path)?;
    let hist_path = cfg.output_dir.join(HISTOGRAMS_NAME);
    write_json(&hist_path, &run.hists)?;
    let [png, svg] = draw(cfg, &run.hists)?;

    run.outputs = vec![png, svg, ntuple_path, hist_path];
    Ok(run)
}

/// Reload a previous run's n-tuple and histograms from `cfg.output_dir`.
///
/// `None` when either file is absent, so the caller generates a fresh run.
pub fn open_existing(cfg: &HsimpleConfig) -> Result<Option<HsimpleRun>, AppError> {
    let start = Instant::now();
    let ntuple_path = cfg.output_dir.join(NTUPLE_NAME);
    let hist_path = cfg.output_dir.join(HISTOGRAMS_NAME);
    if !(ntuple_path.is_file() && hist_path.is_file()) {
        return Ok(None);
    }
    let ntuple = Ntuple::read(&ntuple_path)?;
    let hists: Histograms = read_json(&hist_path)?;
    info!("hsimple: reusing {} and {}", ntuple_path.display(), hist_path.display());
    Ok(Some(HsimpleRun {
        iterations: ntuple.len(),
        hists,
        ntuple,
        stopped_early: false,
        elapsed: start.elapsed(),
        outputs: vec![ntuple_path, hist_path],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StopAfter(usize, Vec<usize>);

    impl UiEvents for StopAfter {
        fn process(&mut self, iteration: usize, _hists: &Histograms) -> Result<bool, AppError> {
            self.1.push(iteration);
            Ok(self.1.len() >= self.0)
        }
    }

    fn cfg(dir: &Path, n: usize) -> HsimpleConfig {
        HsimpleConfig {
            output_dir: dir.to_path_buf(),
            n_events: n,
            ..HsimpleConfig::default()
        }
    }

    #[test]
    fn full_run_fills_every_object() {
        let dir = tempfile::tempdir().unwrap();
        let run = generate(&cfg(dir.path(), 3000), &mut Headless).unwrap();
        assert_eq!(run.iterations, 3000);
        assert!(!run.stopped_early);
        assert_eq!(run.ntuple.len(), 3000);
        assert_eq!(run.hists.hpx.entries(), 3000);
        assert_eq!(run.hists.hpxpy.entries(), 3000);
        // pz = px² + py² > 20 is rare but possible; those are not profiled.
        assert!(run.hists.hprof.entries() <= 3000 && run.hists.hprof.entries() > 2900);
        // pz is exactly px² + py² in single precision
        let k = 17;
        let (px, py) = (run.ntuple.px[k], run.ntuple.py[k]);
        assert_eq!(run.ntuple.pz[k], px * px + py * py);
        assert_eq!(run.ntuple.i[k], 17.0);
        assert!(run.ntuple.random.iter().all(|r| (0.0..1.0).contains(r)));

        for p in &run.outputs {
            assert!(p.exists(), "{} missing", p.display());
        }
        let t = read_table(&dir.path().join(NTUPLE_NAME), NTUPLE_TABLE).unwrap();
        assert_eq!(t.num_rows(), 3000);
        assert!(dir.path().join(SVG_NAME).exists());
    }

    #[test]
    fn existing_outputs_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let c = cfg(dir.path(), 1200);
        assert!(open_existing(&c).unwrap().is_none());

        let fresh = generate(&c, &mut Headless).unwrap();
        let reused = open_existing(&c).unwrap().unwrap();
        assert_eq!(reused.iterations, 1200);
        assert_eq!(reused.ntuple, fresh.ntuple);
        assert_eq!(reused.hists.hpx.entries(), fresh.hists.hpx.entries());
        assert_eq!(reused.hists.hpxpy, fresh.hists.hpxpy);
        assert_eq!(reused.outputs.len(), 2);
    }

    #[test]
    fn same_seed_same_content() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let ra = fill(&cfg(a.path(), 1500), &mut Headless).unwrap();
        let rb = fill(&cfg(b.path(), 1500), &mut Headless).unwrap();
        assert_eq!(ra.ntuple, rb.ntuple);
        assert_eq!(ra.hists, rb.hists);
    }

    #[test]
    fn ui_quit_stops_after_redraw() {
        let dir = tempfile::tempdir().unwrap();
        let mut ui = StopAfter(2, Vec::new());
        let run = fill(&cfg(dir.path(), 25_000), &mut ui).unwrap();
        assert_eq!(ui.1, vec![1000, 2000]);
        assert!(run.stopped_early);
        assert_eq!(run.iterations, 2001);
        assert!(dir.path().join(PNG_NAME).exists());
    }
}
