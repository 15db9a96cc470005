use crate::{
    chart::AxisLabels,
    config::Config,
    error::ReportError,
    fonts::ReportFont,
    pipeline::Pipeline,
    report::{RunSummary, StatsReport},
    stats,
    util::{ensure_dir, hash_file, now_rfc3339, sha256_hex},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "decel-report")]
#[command(about = "Deceleration report generator (spreadsheet in, one PDF page per athlete out)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./decel-report.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the font and template assets are usable.
    Doctor {},
    /// Print the first rows of a spreadsheet as parsed.
    Preview {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        rows: Option<usize>,
    },
    /// Print the per-category envelopes of a spreadsheet.
    Stats {
        #[arg(long)]
        input: PathBuf,
    },
    /// Generate the PDF report.
    Generate {
        #[arg(long)]
        input: PathBuf,
        /// Output PDF path; defaults to <out_dir>/<pdf_filename>.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        axis_label: Option<String>,
        #[arg(long)]
        axis_unit: Option<String>,
    },
    /// Copy the blank template spreadsheet.
    Template {
        #[arg(long)]
        out: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Preview { input, rows } => {
            preview(&cfg, input, rows.unwrap_or(cfg.input.preview_rows))
        }
        Command::Stats { input } => show_stats(&cfg, input),
        Command::Generate {
            input,
            out,
            axis_label,
            axis_unit,
        } => {
            let labels = AxisLabels::new(
                axis_label.as_deref().unwrap_or(&cfg.report.axis_label_text),
                axis_unit.as_deref().unwrap_or(&cfg.report.axis_unit),
            );
            generate(&cfg, input, out.as_deref(), &labels)
        }
        Command::Template { out } => template(&cfg, out),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["decel-report.toml", "decel-report.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(
    args: &Args,
    cfg: &Config,
    file_path: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON results, so log lines go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let font_path = Path::new(&cfg.paths.font_path);
    let template_path = Path::new(&cfg.paths.template_path);

    let labels = [
        cfg.report.axis_label_text.as_str(),
        cfg.report.axis_unit.as_str(),
        cfg.chart.left_series_name.as_str(),
        cfg.chart.right_series_name.as_str(),
        cfg.chart.median_series_name.as_str(),
        cfg.chart.difference_suffix.as_str(),
    ]
    .join(" ");

    let font = match ReportFont::load(font_path) {
        Ok(font) => serde_json::json!({
            "path": font_path,
            "ok": true,
            "bytes": font.data().len(),
            "missing_label_glyphs": font.missing_glyphs(&labels),
        }),
        Err(err) => serde_json::json!({
            "path": font_path,
            "ok": false,
            "error": err.to_string(),
        }),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "font": font,
            "template": {
                "path": template_path,
                "present": template_path.is_file(),
            },
            "out_dir": cfg.paths.out_dir,
        }))?
    );
    Ok(())
}

fn preview(cfg: &Config, input: &Path, rows: usize) -> Result<()> {
    validate_input(input)?;
    let sheet = crate::input::load_rows(&cfg.input, input)
        .with_context(|| format!("reading spreadsheet: {}", input.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "sheet": sheet.sheet,
            "total_rows": sheet.rows.len(),
            "rows": &sheet.rows[..rows.min(sheet.rows.len())],
        }))?
    );
    Ok(())
}

fn show_stats(cfg: &Config, input: &Path) -> Result<()> {
    validate_input(input)?;
    let sheet = crate::input::load_rows(&cfg.input, input)
        .with_context(|| format!("reading spreadsheet: {}", input.display()))?;
    let table = stats::aggregate(&sheet.rows).with_fallback((&cfg.chart.fallback).into());
    println!(
        "{}",
        serde_json::to_string_pretty(&StatsReport::from(&table))?
    );
    Ok(())
}

fn generate(
    cfg: &Config,
    input: &Path,
    out_override: Option<&Path>,
    labels: &AxisLabels,
) -> Result<()> {
    validate_input(input)?;

    let out_path = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(&cfg.paths.out_dir).join(&cfg.output.pdf_filename));
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let started = now_rfc3339();
    let input_sha256 =
        hash_file(input).with_context(|| format!("hashing input: {}", input.display()))?;
    info!("input={} sha256={input_sha256}", input.display());

    let pipeline = Pipeline::from_config(cfg)?;
    let output = pipeline.run(input, labels)?;

    std::fs::write(&out_path, &output.report.pdf)
        .with_context(|| format!("writing report: {}", out_path.display()))?;
    info!(
        "wrote {} pages to {}",
        output.report.page_count(),
        out_path.display()
    );

    let summary = RunSummary {
        input: input.display().to_string(),
        input_sha256,
        config_sha256: sha256_hex(cfg.normalized_for_hash().as_bytes()),
        sheet: output.sheet,
        started,
        finished: now_rfc3339(),
        output: out_path.display().to_string(),
        pdf_bytes: output.report.pdf.len(),
        labels: labels.clone(),
        stats: StatsReport::from(&output.envelopes),
        pages: output.report.pages,
    };

    if cfg.output.write_summary_json {
        let summary_path = out_path.with_file_name(&cfg.output.summary_filename);
        std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing summary: {}", summary_path.display()))?;
    }

    if cfg.output.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "output": summary.output,
                "pages": summary.pages.len(),
                "status": "ok"
            }))?
        );
    }

    Ok(())
}

fn template(cfg: &Config, out: &Path) -> Result<()> {
    let src = Path::new(&cfg.paths.template_path);
    if !src.is_file() {
        return Err(ReportError::MissingAsset {
            path: src.to_path_buf(),
        }
        .into());
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    std::fs::copy(src, out)
        .with_context(|| format!("copying template {} to {}", src.display(), out.display()))?;
    info!("template copied to {}", out.display());
    Ok(())
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    let ext = input
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    if !matches!(ext.as_str(), "xlsx" | "xlsm" | "xlsb" | "xls" | "ods") {
        return Err(anyhow!("input is not a spreadsheet: {}", input.display()));
    }

    Ok(())
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("decel-report.log"))
}
