//! The single TrueType font used by a report run.
//!
//! One font file serves both consumers: the chart rasterizer draws labels
//! through plotters' `ab_glyph` text layer, and the PDF composer embeds the
//! raw file as a CID font and measures header lines with `fontdue`.
//!
//! plotters keeps its fonts in a process-wide registry keyed by family name
//! that only accepts `'static` data. Every distinct font file gets its own
//! family, registered once, so renderers never pick up another report's font
//! and reloading a font does not leak another copy.

use crate::error::ReportError;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Prefix of the plotters family names handed out to report fonts.
pub const CHART_FAMILY_PREFIX: &str = "decel-report";

struct Registered {
    data: &'static [u8],
    family: &'static str,
}

static CHART_FONTS: Mutex<Vec<Registered>> = Mutex::new(Vec::new());

pub struct ReportFont {
    path: PathBuf,
    data: Vec<u8>,
    font: fontdue::Font,
    family: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct VerticalMetrics {
    /// Per 1000 units of em, positive upwards.
    pub ascent: f32,
    /// Per 1000 units of em, negative below the baseline.
    pub descent: f32,
}

impl ReportFont {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::MissingAsset {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read(path)?;
        Self::from_bytes(path, data)
    }

    pub fn from_bytes(path: &Path, data: Vec<u8>) -> Result<Self, ReportError> {
        let invalid = |reason: String| ReportError::InvalidFont {
            path: path.to_path_buf(),
            reason,
        };

        let font = fontdue::Font::from_bytes(data.as_slice(), fontdue::FontSettings::default())
            .map_err(|e| invalid(e.to_string()))?;
        let family = register_chart_font(&data).map_err(invalid)?;

        debug!(
            "font {} loaded as {family:?}: {} glyphs, {} bytes",
            path.display(),
            font.glyph_count(),
            data.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            data,
            font,
            family,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// plotters family name this font is registered under.
    pub fn chart_family(&self) -> &'static str {
        self.family
    }

    pub fn glyph_id(&self, ch: char) -> u16 {
        self.font.lookup_glyph_index(ch)
    }

    /// Advance width of a glyph per 1000 units of em.
    pub fn advance(&self, glyph: u16) -> f32 {
        self.font.metrics_indexed(glyph, 1000.0).advance_width
    }

    /// Width of `text` in points when set at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .map(|ch| self.advance(self.glyph_id(ch)))
            .sum::<f32>()
            * size
            / 1000.0
    }

    pub fn vertical_metrics(&self) -> VerticalMetrics {
        match self.font.horizontal_line_metrics(1000.0) {
            Some(m) => VerticalMetrics {
                ascent: m.ascent,
                descent: m.descent,
            },
            None => VerticalMetrics {
                ascent: 800.0,
                descent: -200.0,
            },
        }
    }

    /// Characters of `text` the font has no glyph for.
    pub fn missing_glyphs(&self, text: &str) -> Vec<char> {
        let mut missing: Vec<char> = text
            .chars()
            .filter(|ch| !ch.is_whitespace() && self.glyph_id(*ch) == 0)
            .collect();
        missing.sort_unstable();
        missing.dedup();
        missing
    }
}

fn register_chart_font(data: &[u8]) -> Result<&'static str, String> {
    let mut fonts = CHART_FONTS
        .lock()
        .map_err(|_| "chart font registry poisoned".to_string())?;
    if let Some(known) = fonts.iter().find(|f| f.data == data) {
        return Ok(known.family);
    }

    let family: &'static str =
        Box::leak(format!("{CHART_FAMILY_PREFIX}-{}", fonts.len()).into_boxed_str());
    let leaked: &'static [u8] = Box::leak(data.to_vec().into_boxed_slice());
    register_font(family, FontStyle::Normal, leaked)
        .map_err(|_| "font rejected by the chart text renderer".to_string())?;
    fonts.push(Registered {
        data: leaked,
        family,
    });
    Ok(family)
}
