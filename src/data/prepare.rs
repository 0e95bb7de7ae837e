//! Reduce raw per-event photon records to the `m_yy` (+ `weight`) tables the
//! fitting pipelines read.
//!
//! Selection, in order:
//! 1. `trigP && photon_n >= 2`
//! 2. diphoton mass of the first two photons, `m_yy = M(p0 + p1) / 1000`
//!    (MeV to GeV), kept inside the observable domain
//!
//! Simulation additionally gets `weight = scaleFactor_PHOTON ·
//! scaleFactor_PhotonTRIGGER · scaleFactor_PILEUP · mcWeight`.

use log::{debug, info};

use crate::domain::{PrepareConfig, MASS_COLUMN, WEIGHT_COLUMN};
use crate::error::AppError;
use crate::io::{read_table, write_table, Column, Table};

/// Columns multiplied into the MC event weight.
pub const WEIGHT_FACTORS: [&str; 4] = [
    "scaleFactor_PHOTON",
    "scaleFactor_PhotonTRIGGER",
    "scaleFactor_PILEUP",
    "mcWeight",
];

/// A Lorentz vector in `(px, py, pz, E)` components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourVector {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl FourVector {
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self {
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: pt * eta.sinh(),
            e,
        }
    }

    /// Invariant mass; negative (`-sqrt(-m²)`) for space-like vectors.
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz);
        if m2 >= 0.0 { m2.sqrt() } else { -(-m2).sqrt() }
    }
}

impl std::ops::Add for FourVector {
    type Output = FourVector;

    fn add(self, o: FourVector) -> FourVector {
        FourVector {
            px: self.px + o.px,
            py: self.py + o.py,
            pz: self.pz + o.pz,
            e: self.e + o.e,
        }
    }
}

/// Outcome counts of one preprocessing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareStats {
    pub rows_read: usize,
    pub passed_trigger: usize,
    pub rows_written: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selected {
    pub m_yy: Vec<f64>,
    pub weight: Option<Vec<f64>>,
}

/// Apply the selection to an already-loaded raw table.
pub fn select_diphoton(
    raw: &Table,
    cfg: &PrepareConfig,
) -> Result<(Selected, PrepareStats), AppError> {
    let trig = raw.column_bool("trigP")?;
    let n_photons = raw.column_f64("photon_n")?;
    let pt = raw.column_list_f64("photon_pt")?;
    let eta = raw.column_list_f64("photon_eta")?;
    let phi = raw.column_list_f64("photon_phi")?;
    let energy = raw.column_list_f64("photon_E")?;
    let factors = if cfg.weighted {
        Some(
            WEIGHT_FACTORS
                .iter()
                .map(|c| raw.column_f64(c))
                .collect::<Result<Vec<_>, _>>()?,
        )
    } else {
        None
    };

    let mut out = Selected {
        m_yy: Vec::new(),
        weight: factors.as_ref().map(|_| Vec::new()),
    };
    let mut passed_trigger = 0;
    for i in 0..raw.num_rows() {
        if !(trig[i] && n_photons[i] >= 2.0) {
            continue;
        }
        passed_trigger += 1;
        let lead = |k: usize| -> Option<FourVector> {
            Some(FourVector::from_pt_eta_phi_e(
                *pt[i].get(k)?,
                *eta[i].get(k)?,
                *phi[i].get(k)?,
                *energy[i].get(k)?,
            ))
        };
        let (Some(p0), Some(p1)) = (lead(0), lead(1)) else {
            debug!("row {i}: photon_n = {} but fewer photon entries", n_photons[i]);
            continue;
        };
        let m_yy = (p0 + p1).mass() / 1000.0;
        if !cfg.observable.contains(m_yy) {
            continue;
        }
        out.m_yy.push(m_yy);
        if let (Some(ws), Some(f)) = (out.weight.as_mut(), factors.as_ref()) {
            ws.push(f.iter().map(|col| col[i]).product());
        }
    }

    let stats = PrepareStats {
        rows_read: raw.num_rows(),
        passed_trigger,
        rows_written: out.m_yy.len(),
    };
    Ok((out, stats))
}

/// Read the raw table, select, and write the reduced table.
pub fn prepare(cfg: &PrepareConfig) -> Result<PrepareStats, AppError> {
    let raw = read_table(&cfg.input, &cfg.input_table)?;
    let (sel, stats) = select_diphoton(&raw, cfg)?;
    info!(
        "prepare: {} rows, {} pass trigger, {} in mass window",
        stats.rows_read, stats.passed_trigger, stats.rows_written
    );

    let mut columns = vec![(MASS_COLUMN, Column::F64(sel.m_yy))];
    if let Some(w) = sel.weight {
        columns.push((WEIGHT_COLUMN, Column::F64(w)));
    }
    write_table(&cfg.output, &cfg.output_table, columns)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn back_to_back_photons() {
        // Two massless 62.5 GeV photons back to back: m = 125 GeV.
        let p0 = FourVector::from_pt_eta_phi_e(62_500.0, 0.0, 0.0, 62_500.0);
        let p1 = FourVector::from_pt_eta_phi_e(62_500.0, 0.0, std::f64::consts::PI, 62_500.0);
        assert_relative_eq!((p0 + p1).mass() / 1000.0, 125.0, epsilon = 1e-9);
    }

    #[test]
    fn forward_photon_mass() {
        // m² = 2 pt1 pt2 (cosh Δη - cos Δφ) for massless photons.
        let (pt1, pt2, eta1, eta2, dphi) = (50.0f64, 40.0f64, 1.2f64, -0.4f64, 2.0f64);
        let p0 = FourVector::from_pt_eta_phi_e(pt1, eta1, 0.3, pt1 * eta1.cosh());
        let p1 = FourVector::from_pt_eta_phi_e(pt2, eta2, 0.3 + dphi, pt2 * eta2.cosh());
        let expected = (2.0 * pt1 * pt2 * ((eta1 - eta2).cosh() - dphi.cos())).sqrt();
        assert_relative_eq!((p0 + p1).mass(), expected, epsilon = 1e-9);
    }

    #[test]
    fn space_like_mass_is_negative() {
        let v = FourVector { px: 3.0, py: 0.0, pz: 4.0, e: 3.0 };
        assert_relative_eq!(v.mass(), -4.0);
    }

    #[test]
    fn selection_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.parquet");
        let photon = |phi: f32| (62_500.0f32, 0.0f32, phi, 62_500.0f32);
        let pi = std::f32::consts::PI;
        let (a, b) = (photon(0.0), photon(pi));
        // rows: pass; fails trigger; one photon; mass 250 GeV (outside window)
        write_table(
            &raw,
            "mini",
            vec![
                ("trigP", Column::Bool(vec![true, false, true, true])),
                ("photon_n", Column::I32(vec![2, 2, 1, 2])),
                ("photon_pt", Column::ListF32(vec![vec![a.0, b.0]; 3].into_iter().chain([vec![125_000.0, 125_000.0]]).collect())),
                ("photon_eta", Column::ListF32(vec![vec![0.0, 0.0]; 4])),
                ("photon_phi", Column::ListF32(vec![vec![a.2, b.2]; 4])),
                ("photon_E", Column::ListF32(vec![vec![a.3, b.3]; 3].into_iter().chain([vec![125_000.0, 125_000.0]]).collect())),
                ("scaleFactor_PHOTON", Column::F32(vec![0.5; 4])),
                ("scaleFactor_PhotonTRIGGER", Column::F32(vec![2.0; 4])),
                ("scaleFactor_PILEUP", Column::F32(vec![1.5; 4])),
                ("mcWeight", Column::F32(vec![0.25; 4])),
            ],
        )
        .unwrap();

        let cfg = PrepareConfig {
            input: raw,
            output: dir.path().join("small.parquet"),
            ..PrepareConfig::default()
        };
        let stats = prepare(&cfg).unwrap();
        assert_eq!(
            stats,
            PrepareStats {
                rows_read: 4,
                passed_trigger: 2,
                rows_written: 1
            }
        );

        let t = read_table(&cfg.output, "small_tree").unwrap();
        let m = t.column_f64("m_yy").unwrap();
        assert_eq!(m.len(), 1);
        assert_relative_eq!(m[0], 125.0, epsilon = 1e-3);
        assert_relative_eq!(t.column_f64("weight").unwrap()[0], 0.375, epsilon = 1e-12);
    }
}
