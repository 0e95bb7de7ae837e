//! The two diphoton-mass models used by the fitting pipelines.

use crate::domain::{Observable, Param, SignalShape};
use crate::error::AppError;
use crate::models::{ChebyshevPdf, GaussianPdf, Model};

/// Component name of the Gaussian peak.
pub const SIGNAL: &str = "sig_pdf";
/// Component name of the Chebyshev continuum.
pub const BACKGROUND: &str = "bkg_pdf";

/// Fixed-shape Gaussian signal on top of a third-order Chebyshev background,
/// with both yields floating.
///
/// `n_events` sets the background start value and its upper bound (`1.5 N`).
pub fn data_model(obs: &Observable, signal: &SignalShape, n_events: usize) -> Result<Model, AppError> {
    let n = n_events as f64;
    let mut m = Model::new("total_model", obs.clone());
    let mean = m.add_param(Param::fixed("mean", "Signal Mean", signal.mean))?;
    let sigma = m.add_param(Param::fixed("sigma", "Signal Width", signal.sigma))?;
    let a1 = m.add_param(Param::new("a1", "a1", -0.5, -2.0, 2.0))?;
    let a2 = m.add_param(Param::new("a2", "a2", 0.1, -2.0, 2.0))?;
    let a3 = m.add_param(Param::new("a3", "a3", 0.01, -2.0, 2.0))?;
    let nsig = m.add_param(Param::new("nsig", "Signal Yield", 50.0, -500.0, 2000.0))?;
    // An empty dataset still needs a non-degenerate range.
    let nbkg_max = (1.5 * n).max(1.0);
    let nbkg = m.add_param(Param::new("nbkg", "Background Yield", n.min(nbkg_max), 0.0, nbkg_max))?;

    m.add_component(SIGNAL, Box::new(GaussianPdf::new(obs)), vec![mean, sigma], Some(nsig))?;
    m.add_component(
        BACKGROUND,
        Box::new(ChebyshevPdf::new(obs, 3)),
        vec![a1, a2, a3],
        Some(nbkg),
    )?;
    Ok(m)
}

/// Single floating Gaussian for the weighted signal-MC fit.
pub fn mc_signal_model(obs: &Observable) -> Result<Model, AppError> {
    let mut m = Model::new("gauss_pdf", obs.clone());
    let mean = m.add_param(Param::new("mean", "Signal Mean", 125.0, 120.0, 130.0))?;
    let sigma = m.add_param(Param::new("sigma", "Signal Width", 2.0, 0.5, 5.0))?;
    m.add_component("gauss_pdf", Box::new(GaussianPdf::new(obs)), vec![mean, sigma], None)?;
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_model_start_point() {
        let obs = Observable::diphoton_mass();
        let m = data_model(&obs, &SignalShape::transcribed(), 1000).unwrap();
        m.validate().unwrap();
        assert!(m.is_extended());
        let nbkg = m.param("nbkg").unwrap();
        assert_eq!(nbkg.value, 1000.0);
        assert_eq!(nbkg.bounds(), (0.0, 1500.0));
        assert!(m.param("mean").unwrap().constant);
        assert_eq!(m.param("sigma").unwrap().value, 2.9402);
        assert_eq!(m.params().iter().filter(|p| p.is_free()).count(), 5);
    }

    #[test]
    fn mc_model_is_not_extended() {
        let m = mc_signal_model(&Observable::diphoton_mass()).unwrap();
        m.validate().unwrap();
        assert!(!m.is_extended());
        assert_eq!(m.param("sigma").unwrap().bounds(), (0.5, 5.0));
    }
}
