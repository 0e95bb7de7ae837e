use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal mean (GeV) transcribed from the weighted MC fit.
pub const DEFAULT_SIGNAL_MEAN: f64 = 124.8970;
/// Signal width (GeV) transcribed from the weighted MC fit.
pub const DEFAULT_SIGNAL_SIGMA: f64 = 2.9402;

/// Default name of the event table inside input files.
pub const DEFAULT_TABLE: &str = "small_tree";
/// Default mass column.
pub const MASS_COLUMN: &str = "m_yy";
/// Default weight column.
pub const WEIGHT_COLUMN: &str = "weight";

/// A named scalar with a bounded domain.
///
/// The domain restricts which rows enter a dataset and defines the support on
/// which every PDF is normalized. `bins` only affects display.
#[derive(Debug, Clone, PartialEq)]
pub struct Observable {
    pub name: String,
    pub title: String,
    pub min: f64,
    pub max: f64,
    pub bins: usize,
}

impl Observable {
    pub fn new(name: impl Into<String>, title: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            min,
            max,
            bins: 100,
        }
    }

    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    /// The diphoton invariant mass, 105-160 GeV in 30 bins.
    pub fn diphoton_mass() -> Self {
        Self::new(MASS_COLUMN, "m_{γγ} [GeV]", 105.0, 160.0).with_bins(30)
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn bin_width(&self) -> f64 {
        self.width() / self.bins.max(1) as f64
    }

    /// Inclusive range check (both edges accepted).
    pub fn contains(&self, x: f64) -> bool {
        x.is_finite() && x >= self.min && x <= self.max
    }

    /// Map `[min, max]` onto `[-1, 1]`.
    pub fn to_unit(&self, x: f64) -> f64 {
        ((2.0 * x - (self.min + self.max)) / self.width()).clamp(-1.0, 1.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(format!(
                "invalid range for observable '{}': expected min < max, got ({}, {})",
                self.name, self.min, self.max
            ));
        }
        if self.bins == 0 {
            return Err(format!("observable '{}' needs at least one bin", self.name));
        }
        Ok(())
    }
}

/// A fit parameter.
///
/// Constant parameters keep `min == max == value` and never enter the minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub title: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub constant: bool,
    /// Symmetric (parabolic) error after the fit; `0.0` before.
    pub error: f64,
}

impl Param {
    /// Floating parameter with start value and bounds.
    pub fn new(name: impl Into<String>, title: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            value,
            min,
            max,
            constant: false,
            error: 0.0,
        }
    }

    /// Parameter frozen at `value`.
    pub fn fixed(name: impl Into<String>, title: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            value,
            min: value,
            max: value,
            constant: true,
            error: 0.0,
        }
    }

    pub fn is_free(&self) -> bool {
        !self.constant
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.value.is_finite() {
            return Err(format!("parameter '{}' start value is not finite", self.name));
        }
        if self.constant {
            return Ok(());
        }
        if self.min.is_nan() || self.max.is_nan() || self.min >= self.max {
            return Err(format!(
                "parameter '{}' has invalid bounds [{}, {}]",
                self.name, self.min, self.max
            ));
        }
        if self.value < self.min || self.value > self.max {
            return Err(format!(
                "parameter '{}' start value {} outside bounds [{}, {}]",
                self.name, self.value, self.min, self.max
            ));
        }
        Ok(())
    }
}

/// Signal peak shape handed from the MC fit to the data fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalShape {
    pub mean: f64,
    pub mean_error: f64,
    pub sigma: f64,
    pub sigma_error: f64,
    /// Input file the shape was extracted from.
    pub source: String,
    /// Fit status code of the producing fit.
    pub status: i32,
    pub created: DateTime<Utc>,
}

impl SignalShape {
    /// The hard-coded transcription used when no shape file is given.
    pub fn transcribed() -> Self {
        Self {
            mean: DEFAULT_SIGNAL_MEAN,
            mean_error: 0.0,
            sigma: DEFAULT_SIGNAL_SIGMA,
            sigma_error: 0.0,
            source: "transcribed".to_string(),
            status: 0,
            created: DateTime::<Utc>::default(),
        }
    }
}

/// One parameter line of an exported fit summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSummary {
    pub name: String,
    pub value: f64,
    pub error: f64,
    pub constant: bool,
}

impl From<&Param> for ParamSummary {
    fn from(p: &Param) -> Self {
        Self {
            name: p.name.clone(),
            value: p.value,
            error: p.error,
            constant: p.constant,
        }
    }
}

/// Portable record of a finished fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub tool: String,
    pub pipeline: String,
    pub input: String,
    pub n_entries: usize,
    pub status: i32,
    pub nll: f64,
    pub edm: f64,
    pub params: Vec<ParamSummary>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub significance: Option<f64>,
    pub created: DateTime<Utc>,
}

/// Configuration of the data-fit pipeline.
#[derive(Debug, Clone)]
pub struct DataFitConfig {
    pub input: PathBuf,
    pub table: String,
    pub observable: Observable,
    pub output_png: PathBuf,
    pub signal: SignalShape,
    pub implicit_mt: bool,
    pub export_summary: Option<PathBuf>,
}

impl Default for DataFitConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("temp_data_for_fit.parquet"),
            table: DEFAULT_TABLE.to_string(),
            observable: Observable::diphoton_mass(),
            output_png: PathBuf::from("data_fit.png"),
            signal: SignalShape::transcribed(),
            implicit_mt: true,
            export_summary: None,
        }
    }
}

/// Configuration of the weighted MC-fit pipeline.
#[derive(Debug, Clone)]
pub struct McFitConfig {
    pub input: PathBuf,
    pub table: String,
    pub observable: Observable,
    pub weight: Observable,
    pub output_png: PathBuf,
    pub implicit_mt: bool,
    pub export_shape: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
}

impl Default for McFitConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("temp_mc_processed.parquet"),
            table: DEFAULT_TABLE.to_string(),
            observable: Observable::diphoton_mass(),
            weight: Observable::new(WEIGHT_COLUMN, "event weight", -1e6, 1e6),
            output_png: PathBuf::from("mc_signal_gauss_fit.png"),
            implicit_mt: true,
            export_shape: None,
            export_summary: None,
        }
    }
}

/// Configuration of the raw-table preprocessing step.
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub input: PathBuf,
    pub input_table: String,
    pub output: PathBuf,
    pub output_table: String,
    /// Compute and store the per-event MC weight.
    pub weighted: bool,
    pub observable: Observable,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("mc_343981.ggH125_gamgam.GamGam.parquet"),
            input_table: "mini".to_string(),
            output: PathBuf::from("temp_mc_processed.parquet"),
            output_table: DEFAULT_TABLE.to_string(),
            weighted: true,
            observable: Observable::diphoton_mass(),
        }
    }
}

/// Configuration of the synthetic demo generator.
#[derive(Debug, Clone)]
pub struct HsimpleConfig {
    pub output_dir: PathBuf,
    pub n_events: usize,
    /// Redraw cadence (iterations).
    pub update_every: usize,
    pub seed: u64,
    pub live: bool,
    /// Load existing outputs from `output_dir` instead of regenerating.
    pub reuse: bool,
}

impl Default for HsimpleConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            n_events: 25_000,
            update_every: 1_000,
            seed: 4357,
            live: false,
            reuse: false,
        }
    }
}
