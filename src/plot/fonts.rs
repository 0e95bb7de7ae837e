//! Runtime font discovery for bitmap text.
//!
//! The bitmap backend rasterizes text with `ab_glyph`, which needs font bytes
//! registered under a family name. Nothing is bundled: the first readable font
//! from `MASSFIT_FONT` or a list of common system locations is registered as
//! `sans-serif`. Without one, plots are still drawn but carry no text.

use std::sync::OnceLock;

use log::{debug, warn};
use plotters::style::{register_font, FontStyle};

/// Environment variable naming a TTF/OTF file to use for plot text.
pub const FONT_ENV: &str = "MASSFIT_FONT";

pub const FAMILY: &str = "sans-serif";

const CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static REGISTERED: OnceLock<bool> = OnceLock::new();

/// Register a system font once per process; returns whether text can be drawn.
pub fn ensure_font() -> bool {
    *REGISTERED.get_or_init(|| {
        let env_path = std::env::var(FONT_ENV).ok();
        for path in env_path.iter().map(String::as_str).chain(CANDIDATES.iter().copied()) {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            // The registry keeps a `'static` reference; fonts live for the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FAMILY, FontStyle::Normal, bytes) {
                Ok(()) => {
                    debug!("plot font: {path}");
                    return true;
                }
                Err(_) => debug!("{path} is not a usable font"),
            }
        }
        warn!("no usable font found (set {FONT_ENV}); plots will have no text");
        false
    })
}
