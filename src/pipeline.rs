use crate::{
    chart::AxisLabels,
    compose::{ComposedReport, Composer},
    config::Config,
    fonts::ReportFont,
    input::{self, InputRow, LoadedSheet},
    stats::{self, EnvelopeTable},
};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub struct Pipeline {
    cfg: Config,
    font: ReportFont,
}

pub struct ReportOutput {
    pub sheet: String,
    pub envelopes: EnvelopeTable,
    pub report: ComposedReport,
}

impl Pipeline {
    pub fn new(cfg: &Config, font: ReportFont) -> Self {
        Self {
            cfg: cfg.clone(),
            font,
        }
    }

    /// Loads the configured font and builds the pipeline around it.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let font_path = Path::new(&cfg.paths.font_path);
        let font = ReportFont::load(font_path)
            .with_context(|| format!("loading report font: {}", font_path.display()))?;
        Ok(Self::new(cfg, font))
    }

    pub fn font(&self) -> &ReportFont {
        &self.font
    }

    pub fn labels(&self) -> AxisLabels {
        AxisLabels::new(&self.cfg.report.axis_label_text, &self.cfg.report.axis_unit)
    }

    pub fn envelopes(&self, rows: &[InputRow]) -> EnvelopeTable {
        stats::aggregate(rows).with_fallback((&self.cfg.chart.fallback).into())
    }

    pub fn generate(
        &self,
        rows: &[InputRow],
        labels: &AxisLabels,
    ) -> Result<(EnvelopeTable, ComposedReport)> {
        let started = Instant::now();
        if rows.is_empty() {
            warn!("no data rows; the report will have no pages");
        }

        let envelopes = self.envelopes(rows);
        info!(
            "rows={} categories={} uncategorized={}",
            rows.len(),
            envelopes.len(),
            envelopes.uncategorized().is_some()
        );

        let report = Composer::new(&self.cfg, &self.font)
            .compose(rows, &envelopes, labels)
            .with_context(|| "composing report")?;

        info!(
            "generated {} pages in {} ms",
            report.page_count(),
            started.elapsed().as_millis()
        );
        Ok((envelopes, report))
    }

    pub fn run(&self, input: &Path, labels: &AxisLabels) -> Result<ReportOutput> {
        let LoadedSheet { sheet, rows } = input::load_rows(&self.cfg.input, input)
            .with_context(|| format!("reading spreadsheet: {}", input.display()))?;
        let (envelopes, report) = self.generate(&rows, labels)?;
        Ok(ReportOutput {
            sheet,
            envelopes,
            report,
        })
    }
}
