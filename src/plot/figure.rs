//! Fit diagnostic figure: binned data with error bars, model curves scaled to
//! events per bin, and a parameter box.

use std::path::Path;

use plotters::prelude::*;

use crate::data::Dataset;
use crate::error::AppError;
use crate::models::Model;
use crate::plot::fonts::{ensure_font, FAMILY};

/// Points per curve.
const CURVE_POINTS: usize = 400;

#[derive(Debug, Clone)]
pub struct Curve {
    pub label: String,
    pub color: RGBColor,
    pub dashed: bool,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct FitFigure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    /// `(bin center, content, error)`
    pub data: Vec<(f64, f64, f64)>,
    pub curves: Vec<Curve>,
    pub param_lines: Vec<String>,
}

impl FitFigure {
    /// Bin `data` on the model's observable and sample the model at its current
    /// parameter values.
    ///
    /// The full model is drawn in red. For extended models each component named
    /// in `dashed_components` is drawn as a dashed blue curve.
    pub fn from_model(
        title: impl Into<String>,
        model: &Model,
        data: &Dataset,
        dashed_components: &[&str],
    ) -> Self {
        let obs = &model.observable;
        let hist = data.binned(obs);
        let bw = obs.bin_width();
        let grid: Vec<f64> = (0..=CURVE_POINTS)
            .map(|i| obs.min + obs.width() * i as f64 / CURVE_POINTS as f64)
            .collect();

        let n_components = model.components().len();
        let scale: Vec<f64> = (0..n_components)
            .map(|j| model.component_yield(j).unwrap_or_else(|| data.sum_weights()) * bw)
            .collect();
        let total: Vec<(f64, f64)> = grid
            .iter()
            .map(|&x| {
                let y = (0..n_components)
                    .map(|j| scale[j] * model.component_density(j, x))
                    .sum();
                (x, y)
            })
            .collect();

        let mut curves = vec![Curve {
            label: model.name.clone(),
            color: RED,
            dashed: false,
            points: total,
        }];
        for name in dashed_components {
            if let Some(j) = model.component_index(name) {
                curves.push(Curve {
                    label: name.to_string(),
                    color: BLUE,
                    dashed: true,
                    points: grid
                        .iter()
                        .map(|&x| (x, scale[j] * model.component_density(j, x)))
                        .collect(),
                });
            }
        }

        let param_lines = model
            .params()
            .iter()
            .map(|p| {
                if p.constant {
                    format!("{} = {:.4} (fixed)", p.name, p.value)
                } else {
                    format!("{} = {:.4} ± {:.4}", p.name, p.value, p.error)
                }
            })
            .collect();

        Self {
            title: title.into(),
            x_label: obs.title.clone(),
            y_label: format!("Events / ( {:.2} GeV )", bw),
            x_range: (obs.min, obs.max),
            data: hist.points(),
            curves,
            param_lines,
        }
    }

    fn y_max(&self) -> f64 {
        let data_max = self.data.iter().map(|&(_, y, e)| y + e).fold(0.0, f64::max);
        let curve_max = self
            .curves
            .iter()
            .flat_map(|c| c.points.iter().map(|&(_, y)| y))
            .fold(0.0, f64::max);
        let m = data_max.max(curve_max);
        if m.is_finite() && m > 0.0 { 1.25 * m } else { 1.0 }
    }
}

/// Rasterize `fig` to a PNG at `path`.
pub fn render_fit_png(path: &Path, fig: &FitFigure, size: (u32, u32)) -> Result<(), AppError> {
    draw_fit(path, fig, size, ensure_font())
        .map_err(|e| AppError::render(format!("Failed to render '{}': {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn draw_fit(
    path: &Path,
    fig: &FitFigure,
    size: (u32, u32),
    text: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (x0, x1) = fig.x_range;
    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, if text { 70 } else { 10 })
        .set_label_area_size(LabelAreaPosition::Bottom, if text { 50 } else { 10 });
    if text {
        builder.caption(&fig.title, (FAMILY, 24));
    }
    let mut chart = builder.build_cartesian_2d(x0..x1, 0.0..fig.y_max())?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().disable_y_mesh();
    if text {
        mesh.x_desc(fig.x_label.as_str())
            .y_desc(fig.y_label.as_str())
            .label_style((FAMILY, 14));
    } else {
        mesh.x_labels(0).y_labels(0);
    }
    mesh.draw()?;

    chart.draw_series(fig.data.iter().map(|&(x, y, e)| {
        ErrorBar::new_vertical(x, (y - e).max(0.0), y, y + e, BLACK.filled(), 6)
    }))?;
    chart.draw_series(
        fig.data
            .iter()
            .map(|&(x, y, _)| Circle::new((x, y), 3, BLACK.filled())),
    )?;

    for c in &fig.curves {
        let style = c.color.stroke_width(2);
        if c.dashed {
            chart.draw_series(DashedLineSeries::new(c.points.iter().copied(), 8, 6, style))?;
        } else {
            chart.draw_series(LineSeries::new(c.points.iter().copied(), style))?;
        }
    }

    if text && !fig.param_lines.is_empty() {
        let (w, _) = root.dim_in_pixel();
        let line_h = 20;
        let box_w = 260;
        let left = w as i32 - box_w - 40;
        let top = 60;
        let bottom = top + 10 + line_h * fig.param_lines.len() as i32;
        root.draw(&Rectangle::new(
            [(left, top), (left + box_w, bottom)],
            WHITE.filled(),
        ))?;
        root.draw(&Rectangle::new([(left, top), (left + box_w, bottom)], BLACK.stroke_width(1)))?;
        for (i, line) in fig.param_lines.iter().enumerate() {
            root.draw(&Text::new(
                line.clone(),
                (left + 8, top + 6 + line_h * i as i32),
                (FAMILY, 15),
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Observable, SignalShape};
    use crate::models::{data_model, BACKGROUND};

    #[test]
    fn curves_are_scaled_to_events_per_bin() {
        let obs = Observable::diphoton_mass();
        let m = data_model(&obs, &SignalShape::transcribed(), 1100).unwrap();
        let ds = Dataset::new("d", vec![130.0; 10]);
        let fig = FitFigure::from_model("t", &m, &ds, &[BACKGROUND]);
        assert_eq!(fig.curves.len(), 2);
        assert!(fig.curves[1].dashed);
        // Trapezoid sum over the curve divided by the bin width gives the total yield.
        let bw = obs.bin_width();
        let area: f64 = fig.curves[0]
            .points
            .windows(2)
            .map(|p| 0.5 * (p[0].1 + p[1].1) * (p[1].0 - p[0].0))
            .sum();
        assert!((area / bw - 1150.0).abs() < 1.0, "area {}", area / bw);
        assert_eq!(fig.data.len(), 30);
        assert!(fig.param_lines.iter().any(|l| l.starts_with("mean = 124.8970 (fixed)")));
    }

    #[test]
    fn renders_png_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.png");
        let obs = Observable::diphoton_mass();
        let m = data_model(&obs, &SignalShape::transcribed(), 20).unwrap();
        let ds = Dataset::new("d", vec![110.0, 125.0, 126.0, 150.0]);
        let fig = FitFigure::from_model("t", &m, &ds, &[BACKGROUND]);
        render_fit_png(&path, &fig, (800, 600)).unwrap();
        assert!(path.exists());
    }
}
