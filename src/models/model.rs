//! Composite model: parameters plus yield-weighted component densities.
//!
//! Components reference parameters by index into [`Model::params`]. A model is
//! either
//! - extended: every component carries a yield parameter and the model's
//!   intensity is `λ(x) = Σ_j ν_j f_j(x)`, or
//! - non-extended: exactly one component without a yield, `λ(x) = f(x)`.

use crate::domain::{Observable, Param};
use crate::error::AppError;
use crate::models::Pdf;

/// One term of the model sum.
#[derive(Debug)]
pub struct Component {
    pub name: String,
    pub pdf: Box<dyn Pdf>,
    /// Parameter indices passed to the pdf, in order.
    pub shape: Vec<usize>,
    /// Yield parameter index (extended models only).
    pub yield_param: Option<usize>,
}

#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub observable: Observable,
    params: Vec<Param>,
    components: Vec<Component>,
}

/// Component integrals for one parameter point, computed once per evaluation.
#[derive(Debug, Clone)]
pub struct Evaluated {
    /// `(yield, 1 / integral)` per component; yield is `1.0` for non-extended models.
    terms: Vec<(f64, f64)>,
    shape_values: Vec<Vec<f64>>,
}

impl Model {
    pub fn new(name: impl Into<String>, observable: Observable) -> Self {
        Self {
            name: name.into(),
            observable,
            params: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Register a parameter and return its index.
    pub fn add_param(&mut self, param: Param) -> Result<usize, AppError> {
        if self.param_index(&param.name).is_some() {
            return Err(AppError::invalid(format!(
                "duplicate parameter '{}' in model '{}'",
                param.name, self.name
            )));
        }
        self.params.push(param);
        Ok(self.params.len() - 1)
    }

    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        pdf: Box<dyn Pdf>,
        shape: Vec<usize>,
        yield_param: Option<usize>,
    ) -> Result<(), AppError> {
        let name = name.into();
        if shape.len() != pdf.n_params() {
            return Err(AppError::invalid(format!(
                "component '{name}' ({}) expects {} parameters, got {}",
                pdf.kind(),
                pdf.n_params(),
                shape.len()
            )));
        }
        if let Some(bad) = shape.iter().chain(yield_param.iter()).find(|&&i| i >= self.params.len()) {
            return Err(AppError::invalid(format!(
                "component '{name}' references unknown parameter index {bad}"
            )));
        }
        self.components.push(Component {
            name,
            pdf,
            shape,
            yield_param,
        });
        Ok(())
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [Param] {
        &mut self.params
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn component_index(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name == name)
    }

    /// Current values of all parameters.
    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn is_extended(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|c| c.yield_param.is_some())
    }

    /// Check structure, parameter bounds and the start point.
    pub fn validate(&self) -> Result<(), AppError> {
        self.observable.validate().map_err(AppError::invalid)?;
        if self.components.is_empty() {
            return Err(AppError::invalid(format!("model '{}' has no components", self.name)));
        }
        let with_yield = self.components.iter().filter(|c| c.yield_param.is_some()).count();
        if with_yield != 0 && with_yield != self.components.len() {
            return Err(AppError::invalid(format!(
                "model '{}' mixes components with and without yields",
                self.name
            )));
        }
        if with_yield == 0 && self.components.len() != 1 {
            return Err(AppError::invalid(format!(
                "model '{}' needs yields to combine {} components",
                self.name,
                self.components.len()
            )));
        }
        for p in &self.params {
            p.validate().map_err(AppError::invalid)?;
        }
        let values = self.values();
        for c in &self.components {
            let shape: Vec<f64> = c.shape.iter().map(|&i| values[i]).collect();
            c.pdf
                .validate(&shape)
                .map_err(|e| AppError::invalid(format!("component '{}': {e}", c.name)))?;
        }
        Ok(())
    }

    /// Precompute per-component yields and normalizations at `values`.
    pub fn evaluate(&self, values: &[f64]) -> Evaluated {
        let mut terms = Vec::with_capacity(self.components.len());
        let mut shape_values = Vec::with_capacity(self.components.len());
        for c in &self.components {
            let shape: Vec<f64> = c.shape.iter().map(|&i| values[i]).collect();
            let integral = c.pdf.integral(&shape);
            let inv = if integral.is_finite() && integral > 0.0 {
                1.0 / integral
            } else {
                f64::NAN
            };
            let nu = c.yield_param.map_or(1.0, |i| values[i]);
            terms.push((nu, inv));
            shape_values.push(shape);
        }
        Evaluated {
            terms,
            shape_values,
        }
    }

    /// Total expected count `Σ ν_j` (zero for non-extended models).
    pub fn expected_events(&self, values: &[f64]) -> f64 {
        self.components
            .iter()
            .filter_map(|c| c.yield_param.map(|i| values[i]))
            .sum()
    }

    /// `λ(x)` for precomputed terms.
    pub fn intensity(&self, eval: &Evaluated, x: f64) -> f64 {
        self.components
            .iter()
            .zip(&eval.terms)
            .zip(&eval.shape_values)
            .map(|((c, &(nu, inv)), shape)| nu * inv * c.pdf.shape(x, shape))
            .sum()
    }

    /// `ln f(x)` for a non-extended single-component model, without underflow.
    pub fn ln_density(&self, eval: &Evaluated, x: f64) -> f64 {
        let c = &self.components[0];
        c.pdf.ln_shape(x, &eval.shape_values[0]) + eval.terms[0].1.ln()
    }

    /// Normalized density of one component at `x` using the model's current values.
    pub fn component_density(&self, component: usize, x: f64) -> f64 {
        let values = self.values();
        let c = &self.components[component];
        let shape: Vec<f64> = c.shape.iter().map(|&i| values[i]).collect();
        c.pdf.density(x, &shape)
    }

    /// Yield of one component at the current values (`None` when non-extended).
    pub fn component_yield(&self, component: usize) -> Option<f64> {
        self.components[component]
            .yield_param
            .map(|i| self.params[i].value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChebyshevPdf, GaussianPdf};
    use approx::assert_relative_eq;

    fn two_component() -> Model {
        let obs = Observable::diphoton_mass();
        let mut m = Model::new("m", obs.clone());
        let mean = m.add_param(Param::fixed("mean", "mean", 125.0)).unwrap();
        let sigma = m.add_param(Param::fixed("sigma", "sigma", 2.0)).unwrap();
        let a1 = m.add_param(Param::new("a1", "a1", 0.0, -2.0, 2.0)).unwrap();
        let nsig = m.add_param(Param::new("nsig", "nsig", 10.0, -50.0, 100.0)).unwrap();
        let nbkg = m.add_param(Param::new("nbkg", "nbkg", 90.0, 0.0, 150.0)).unwrap();
        m.add_component("sig", Box::new(GaussianPdf::new(&obs)), vec![mean, sigma], Some(nsig))
            .unwrap();
        m.add_component("bkg", Box::new(ChebyshevPdf::new(&obs, 1)), vec![a1], Some(nbkg))
            .unwrap();
        m
    }

    #[test]
    fn intensity_integrates_to_total_yield() {
        let m = two_component();
        assert!(m.is_extended());
        m.validate().unwrap();
        let values = m.values();
        let eval = m.evaluate(&values);
        let n = 20_000;
        let h = m.observable.width() / n as f64;
        let total: f64 = (0..n)
            .map(|i| m.intensity(&eval, m.observable.min + (i as f64 + 0.5) * h) * h)
            .sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-6);
        assert_relative_eq!(m.expected_events(&values), 100.0);
    }

    #[test]
    fn rejects_duplicates_and_bad_wiring() {
        let mut m = two_component();
        assert!(m.add_param(Param::fixed("mean", "mean", 1.0)).is_err());
        let obs = m.observable.clone();
        assert!(m
            .add_component("x", Box::new(GaussianPdf::new(&obs)), vec![0], None)
            .is_err());
        assert!(m
            .add_component("x", Box::new(GaussianPdf::new(&obs)), vec![0, 99], None)
            .is_err());
    }

    #[test]
    fn mixed_yields_are_invalid() {
        let obs = Observable::diphoton_mass();
        let mut m = Model::new("m", obs.clone());
        let mean = m.add_param(Param::fixed("mean", "mean", 125.0)).unwrap();
        let sigma = m.add_param(Param::fixed("sigma", "sigma", 2.0)).unwrap();
        let n = m.add_param(Param::new("n", "n", 1.0, 0.0, 2.0)).unwrap();
        m.add_component("a", Box::new(GaussianPdf::new(&obs)), vec![mean, sigma], Some(n))
            .unwrap();
        m.add_component("b", Box::new(GaussianPdf::new(&obs)), vec![mean, sigma], None)
            .unwrap();
        assert!(m.validate().is_err());
    }
}
