#![allow(dead_code)]

pub mod pdf;

use decel_report::{config::Config, fonts::ReportFont, input::InputRow};
use std::path::PathBuf;

const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

/// The font rasterizing tests use; `DECEL_REPORT_TEST_FONT` overrides the
/// bundled fixture. A font that fails to load fails the test.
pub fn test_font() -> ReportFont {
    let path = std::env::var_os("DECEL_REPORT_TEST_FONT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FIXTURE_FONT));
    match ReportFont::load(&path) {
        Ok(font) => font,
        Err(err) => panic!("test font {}: {err}", path.display()),
    }
}

/// Default config with small charts so rendering tests stay quick.
pub fn small_config() -> Config {
    let mut cfg = Config::default();
    cfg.chart.dpi = 72.0;
    cfg
}

pub fn row(name: &str, category: Option<&str>, left: f64, right: f64) -> InputRow {
    let row = InputRow::new(name, left, right);
    match category {
        Some(c) => row.with_category(c),
        None => row,
    }
}
