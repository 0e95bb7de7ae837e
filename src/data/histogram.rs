//! Fixed-width histograms and profiles.
//!
//! Bin numbering follows the usual HEP convention: bin `0` is the underflow,
//! bins `1..=n` cover `[min, max)`, and bin `n + 1` is the overflow. The upper
//! edge therefore belongs to the overflow bin.

use serde::{Deserialize, Serialize};

fn find_bin(x: f64, nbins: usize, min: f64, max: f64) -> usize {
    if x.is_nan() || x < min {
        return 0;
    }
    if x >= max {
        return nbins + 1;
    }
    let idx = ((x - min) / (max - min) * nbins as f64).floor() as usize;
    (idx + 1).min(nbins)
}

/// One-dimensional weighted histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub name: String,
    pub title: String,
    pub nbins: usize,
    pub min: f64,
    pub max: f64,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
    // In-range moments for mean / RMS.
    sum_w: f64,
    sum_wx: f64,
    sum_wx2: f64,
}

impl Hist1D {
    pub fn new(name: impl Into<String>, title: impl Into<String>, nbins: usize, min: f64, max: f64) -> Self {
        let nbins = nbins.max(1);
        Self {
            name: name.into(),
            title: title.into(),
            nbins,
            min,
            max,
            contents: vec![0.0; nbins + 2],
            sumw2: vec![0.0; nbins + 2],
            entries: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
            sum_wx2: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64) -> usize {
        self.fill_weighted(x, 1.0)
    }

    /// Add `w` to the bin containing `x`; returns the bin index.
    pub fn fill_weighted(&mut self, x: f64, w: f64) -> usize {
        let bin = self.find_bin(x);
        self.contents[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1;
        if (1..=self.nbins).contains(&bin) {
            self.sum_w += w;
            self.sum_wx += w * x;
            self.sum_wx2 += w * x * x;
        }
        bin
    }

    pub fn find_bin(&self, x: f64) -> usize {
        find_bin(x, self.nbins, self.min, self.max)
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.nbins as f64
    }

    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 1.0) * self.bin_width()
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.bin_width()
    }

    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// `sqrt(Σ w²)` of the bin.
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).copied().unwrap_or(0.0).sqrt()
    }

    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    pub fn overflow(&self) -> f64 {
        self.contents[self.nbins + 1]
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.nbins].iter().sum()
    }

    pub fn max_content(&self) -> f64 {
        self.contents[1..=self.nbins]
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    pub fn mean(&self) -> f64 {
        if self.sum_w == 0.0 {
            return 0.0;
        }
        self.sum_wx / self.sum_w
    }

    pub fn std_dev(&self) -> f64 {
        if self.sum_w == 0.0 {
            return 0.0;
        }
        let m = self.mean();
        (self.sum_wx2 / self.sum_w - m * m).max(0.0).sqrt()
    }

    /// `(center, content, error)` for every in-range bin.
    pub fn points(&self) -> Vec<(f64, f64, f64)> {
        (1..=self.nbins)
            .map(|b| (self.bin_center(b), self.bin_content(b), self.bin_error(b)))
            .collect()
    }
}

/// Two-dimensional histogram (unit weights).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    pub name: String,
    pub title: String,
    pub nx: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub ny: usize,
    pub y_min: f64,
    pub y_max: f64,
    /// Row-major over `(nx + 2) × (ny + 2)` including under/overflow.
    contents: Vec<f64>,
    entries: u64,
}

impl Hist2D {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        nx: usize,
        x_min: f64,
        x_max: f64,
        ny: usize,
        y_min: f64,
        y_max: f64,
    ) -> Self {
        let nx = nx.max(1);
        let ny = ny.max(1);
        Self {
            name: name.into(),
            title: title.into(),
            nx,
            x_min,
            x_max,
            ny,
            y_min,
            y_max,
            contents: vec![0.0; (nx + 2) * (ny + 2)],
            entries: 0,
        }
    }

    fn index(&self, bx: usize, by: usize) -> usize {
        by * (self.nx + 2) + bx
    }

    pub fn fill(&mut self, x: f64, y: f64) -> (usize, usize) {
        let bx = find_bin(x, self.nx, self.x_min, self.x_max);
        let by = find_bin(y, self.ny, self.y_min, self.y_max);
        let idx = self.index(bx, by);
        self.contents[idx] += 1.0;
        self.entries += 1;
        (bx, by)
    }

    pub fn bin_content(&self, bx: usize, by: usize) -> f64 {
        if bx > self.nx + 1 || by > self.ny + 1 {
            return 0.0;
        }
        self.contents[self.index(bx, by)]
    }

    pub fn x_bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.nx as f64
    }

    pub fn y_bin_width(&self) -> f64 {
        (self.y_max - self.y_min) / self.ny as f64
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn max_content(&self) -> f64 {
        let mut best = 0.0f64;
        for by in 1..=self.ny {
            for bx in 1..=self.nx {
                best = best.max(self.bin_content(bx, by));
            }
        }
        best
    }

    pub fn integral(&self) -> f64 {
        let mut total = 0.0;
        for by in 1..=self.ny {
            for bx in 1..=self.nx {
                total += self.bin_content(bx, by);
            }
        }
        total
    }
}

/// Profile histogram: mean of `y` in bins of `x`.
///
/// Entries with `y` outside `[y_min, y_max]` are ignored. The bin error is the
/// error on the mean, `spread / sqrt(n)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub title: String,
    pub nbins: usize,
    pub min: f64,
    pub max: f64,
    pub y_min: f64,
    pub y_max: f64,
    sum_w: Vec<f64>,
    sum_wy: Vec<f64>,
    sum_wy2: Vec<f64>,
    entries: u64,
}

impl Profile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        nbins: usize,
        min: f64,
        max: f64,
        y_min: f64,
        y_max: f64,
    ) -> Self {
        let nbins = nbins.max(1);
        Self {
            name: name.into(),
            title: title.into(),
            nbins,
            min,
            max,
            y_min,
            y_max,
            sum_w: vec![0.0; nbins + 2],
            sum_wy: vec![0.0; nbins + 2],
            sum_wy2: vec![0.0; nbins + 2],
            entries: 0,
        }
    }

    /// Returns the bin that was filled, or `None` when `y` is out of range.
    pub fn fill(&mut self, x: f64, y: f64) -> Option<usize> {
        if !(y >= self.y_min && y <= self.y_max) {
            return None;
        }
        let bin = find_bin(x, self.nbins, self.min, self.max);
        self.sum_w[bin] += 1.0;
        self.sum_wy[bin] += y;
        self.sum_wy2[bin] += y * y;
        self.entries += 1;
        Some(bin)
    }

    pub fn bin_entries(&self, bin: usize) -> f64 {
        self.sum_w.get(bin).copied().unwrap_or(0.0)
    }

    pub fn bin_mean(&self, bin: usize) -> f64 {
        let n = self.bin_entries(bin);
        if n == 0.0 {
            return 0.0;
        }
        self.sum_wy[bin] / n
    }

    pub fn bin_error(&self, bin: usize) -> f64 {
        let n = self.bin_entries(bin);
        if n == 0.0 {
            return 0.0;
        }
        let mean = self.sum_wy[bin] / n;
        let var = (self.sum_wy2[bin] / n - mean * mean).max(0.0);
        (var / n).sqrt()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}
