//! Two-panel view of the synthetic demo: `hpx` as filled bars on top, `hpxpy`
//! as a colour map below.
//!
//! The drawing code is generic over the plotters backend so the same panels
//! are rasterized to PNG, exported as SVG and rendered live in the terminal.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::data::{Hist1D, Hist2D};
use crate::error::AppError;
use crate::plot::fonts::{ensure_font, FAMILY};

/// Canvas size of the PNG and SVG renderings.
pub const PANELS_SIZE: (u32, u32) = (700, 500);

/// Bar fill of the 1-D histogram.
pub const BAR_FILL: RGBColor = RGBColor(153, 153, 204);

/// Colour for a bin holding `t ∈ [0, 1]` of the maximum content, blue to red.
pub fn colz(t: f64) -> HSLColor {
    let t = t.clamp(0.0, 1.0);
    HSLColor(0.7 * (1.0 - t), 0.9, 0.5)
}

#[derive(Debug, Clone, Copy)]
pub struct PanelStyle {
    /// Draw captions and tick labels.
    pub text: bool,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub label_size: u32,
}

impl PanelStyle {
    pub fn bitmap(text: bool) -> Self {
        Self {
            text,
            background: WHITE,
            foreground: BLACK,
            label_size: 12,
        }
    }

    pub fn terminal() -> Self {
        Self {
            text: true,
            background: BLACK,
            foreground: WHITE,
            label_size: 10,
        }
    }
}

/// Draw both panels onto `root`.
pub fn draw_panels<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    hpx: &Hist1D,
    hpxpy: &Hist2D,
    style: &PanelStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&style.background)?;
    let panels = root.split_evenly((2, 1));
    draw_bars(&panels[0], hpx, style)?;
    draw_colz(&panels[1], hpxpy, style)?;
    Ok(())
}

fn draw_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    h: &Hist1D,
    style: &PanelStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let y_max = (h.max_content() * 1.1).max(1.0);
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(8)
        .set_label_area_size(LabelAreaPosition::Left, if style.text { 40 } else { 4 })
        .set_label_area_size(LabelAreaPosition::Bottom, if style.text { 20 } else { 4 });
    if style.text {
        builder.caption(&h.title, (FAMILY, style.label_size + 4).into_font().color(&style.foreground));
    }
    let mut chart = builder.build_cartesian_2d(h.min..h.max, 0.0..y_max)?;
    configure_axes(&mut chart, style)?;

    chart.draw_series((1..=h.nbins).filter(|&b| h.bin_content(b) > 0.0).map(|b| {
        let x0 = h.bin_low_edge(b);
        Rectangle::new(
            [(x0, 0.0), (x0 + h.bin_width(), h.bin_content(b))],
            BAR_FILL.filled(),
        )
    }))?;
    Ok(())
}

fn draw_colz<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    h: &Hist2D,
    style: &PanelStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let max = h.max_content();
    let mut builder = ChartBuilder::on(area);
    builder
        .margin(8)
        .set_label_area_size(LabelAreaPosition::Left, if style.text { 40 } else { 4 })
        .set_label_area_size(LabelAreaPosition::Bottom, if style.text { 20 } else { 4 });
    if style.text {
        builder.caption(&h.title, (FAMILY, style.label_size + 4).into_font().color(&style.foreground));
    }
    let mut chart = builder.build_cartesian_2d(h.x_min..h.x_max, h.y_min..h.y_max)?;
    configure_axes(&mut chart, style)?;

    let (dx, dy) = (h.x_bin_width(), h.y_bin_width());
    let cells = (1..=h.ny).flat_map(|by| (1..=h.nx).map(move |bx| (bx, by)));
    chart.draw_series(cells.filter(|&(bx, by)| h.bin_content(bx, by) > 0.0).map(|(bx, by)| {
        let x0 = h.x_min + (bx as f64 - 1.0) * dx;
        let y0 = h.y_min + (by as f64 - 1.0) * dy;
        let t = if max > 0.0 { h.bin_content(bx, by) / max } else { 0.0 };
        Rectangle::new([(x0, y0), (x0 + dx, y0 + dy)], colz(t).filled())
    }))?;
    Ok(())
}

fn configure_axes<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<plotters::coord::types::RangedCoordf64, plotters::coord::types::RangedCoordf64>>,
    style: &PanelStyle,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh()
        .disable_y_mesh()
        .axis_style(&style.foreground);
    if style.text {
        mesh.x_labels(5)
            .y_labels(4)
            .label_style((FAMILY, style.label_size).into_font().color(&style.foreground));
    } else {
        mesh.x_labels(0).y_labels(0);
    }
    mesh.draw()
}

/// Rasterize both panels to a PNG at `path`.
pub fn render_panels_png(path: &Path, hpx: &Hist1D, hpxpy: &Hist2D) -> Result<(), AppError> {
    let style = PanelStyle::bitmap(ensure_font());
    let root = BitMapBackend::new(path, PANELS_SIZE).into_drawing_area();
    draw_panels(&root, hpx, hpxpy, &style)
        .and_then(|_| root.present())
        .map_err(|e| AppError::render(format!("Failed to render '{}': {e}", path.display())))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Vector copy of the panels.
pub fn render_panels_svg(path: &Path, hpx: &Hist1D, hpxpy: &Hist2D) -> Result<(), AppError> {
    let style = PanelStyle::bitmap(ensure_font());
    let root = SVGBackend::new(path, PANELS_SIZE).into_drawing_area();
    draw_panels(&root, hpx, hpxpy, &style)
        .and_then(|_| root.present())
        .map_err(|e| AppError::render(format!("Failed to render '{}': {e}", path.display())))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colz_runs_from_blue_to_red() {
        let lo = colz(0.0).to_backend_color().rgb;
        let hi = colz(1.0).to_backend_color().rgb;
        assert!(lo.2 > lo.0, "low end should be blue, got {lo:?}");
        assert!(hi.0 > hi.2, "high end should be red, got {hi:?}");
    }

    fn sample_hists() -> (Hist1D, Hist2D) {
        let mut hpx = Hist1D::new("hpx", "This is the px distribution", 100, -4.0, 4.0);
        let mut hpxpy = Hist2D::new("hpxpy", "py vs px", 40, -4.0, 4.0, 40, -4.0, 4.0);
        for i in 0..200 {
            let x = (i as f64 / 25.0) - 4.0;
            hpx.fill(x);
            hpxpy.fill(x, -x);
        }
        (hpx, hpxpy)
    }

    #[test]
    fn renders_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsimple.png");
        let (hpx, hpxpy) = sample_hists();
        render_panels_png(&path, &hpx, &hpxpy).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn renders_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsimple.svg");
        let (hpx, hpxpy) = sample_hists();
        render_panels_svg(&path, &hpx, &hpxpy).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<rect"));
    }
}
