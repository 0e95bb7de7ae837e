//! Plotters-powered histogram panels for Ratatui.
//!
//! The panels are drawn by the same backend-generic code as the PNG output and
//! rendered into the Ratatui buffer through `plotters-ratatui-backend`.

use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::data::{Hist1D, Hist2D};
use crate::plot::{draw_panels, PanelStyle};

pub struct PanelsChart<'a> {
    pub hpx: &'a Hist1D,
    pub hpxpy: &'a Hist2D,
}

impl Widget for PanelsChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters cannot lay out two charts in a handful of cells.
        if area.width < 30 || area.height < 12 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let style = PanelStyle::terminal();
        let widget = widget_fn(move |root| {
            draw_panels(&root, self.hpx, self.hpxpy, &style)?;
            Ok(())
        });
        widget.render(area, buf);
    }
}
