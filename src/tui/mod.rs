//! Ratatui-based live view of the filling demo.
//!
//! The view redraws the two histogram panels at every update and turns `q`,
//! `Esc` or `Ctrl-C` into a stop request for the filling loop.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Terminal,
};

use crate::error::AppError;
use crate::hsimple::{Histograms, UiEvents};

mod plotters_chart;

use plotters_chart::PanelsChart;

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::render(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::render(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Live terminal view; owns the terminal for its lifetime.
pub struct LiveView {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    total: usize,
    status: String,
    // Dropped last so the terminal is restored after the final frame.
    _guard: TerminalGuard,
}

impl LiveView {
    pub fn new(total: usize) -> Result<Self, AppError> {
        let guard = TerminalGuard::new()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
            .map_err(|e| AppError::render(format!("Failed to initialize terminal: {e}")))?;
        Ok(Self {
            terminal,
            total,
            status: "filling…".to_string(),
            _guard: guard,
        })
    }

    fn draw(&mut self, iteration: usize, hists: &Histograms) -> Result<(), AppError> {
        let total = self.total;
        let status = self.status.clone();
        self.terminal
            .draw(|f| draw_frame(f, iteration, total, &status, hists))
            .map_err(|e| AppError::render(format!("Terminal draw error: {e}")))?;
        Ok(())
    }

    /// Show the final state and wait for a quit key.
    pub fn finish(&mut self, iterations: usize, hists: &Histograms) -> Result<(), AppError> {
        self.status = "done, press q to exit".to_string();
        self.draw(iterations, hists)?;
        loop {
            if quit_key(Duration::from_millis(200))? {
                return Ok(());
            }
        }
    }
}

impl UiEvents for LiveView {
    fn process(&mut self, iteration: usize, hists: &Histograms) -> Result<bool, AppError> {
        self.draw(iteration, hists)?;
        quit_key(Duration::ZERO)
    }
}

/// Drain pending events; `true` if one of them is a quit key.
fn quit_key(timeout: Duration) -> Result<bool, AppError> {
    let mut wait = timeout;
    while event::poll(wait).map_err(|e| AppError::render(format!("Event poll error: {e}")))? {
        wait = Duration::ZERO;
        let ev = event::read().map_err(|e| AppError::render(format!("Event read error: {e}")))?;
        if let Event::Key(key) = ev {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn draw_frame(f: &mut ratatui::Frame<'_>, iteration: usize, total: usize, status: &str, hists: &Histograms) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    let ratio = if total == 0 { 1.0 } else { (iteration as f64 / total as f64).clamp(0.0, 1.0) };
    let gauge = Gauge::default()
        .block(Block::default().title("hsimple").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!("{iteration} / {total}"));
    f.render_widget(gauge, chunks[0]);

    draw_chart(f, chunks[1], hists);

    let line = Line::from(vec![
        Span::styled("q / Esc / Ctrl-C stop", Style::default().fg(Color::Gray)),
        Span::raw(" | "),
        Span::styled(status, Style::default().fg(Color::Yellow)),
    ]);
    f.render_widget(Paragraph::new(line).block(Block::default().borders(Borders::ALL)), chunks[2]);
}

fn draw_chart(f: &mut ratatui::Frame<'_>, area: Rect, hists: &Histograms) {
    let block = Block::default().title("Dynamic Filling Example").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        PanelsChart {
            hpx: &hists.hpx,
            hpxpy: &hists.hpxpy,
        },
        inner,
    );
}
