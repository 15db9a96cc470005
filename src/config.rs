use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub chart: Chart,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

/// Spreadsheet layout. Column names match the header row exactly after
/// trimming and NFC normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Input {
    pub sheet: String,
    pub name_column: String,
    pub team_column: String,
    pub position_column: String,
    pub category_column: String,
    pub left_column: String,
    pub right_column: String,
    pub preview_rows: usize,
}
impl Default for Input {
    fn default() -> Self {
        Self {
            sheet: "".into(),
            name_column: "Meno".into(),
            team_column: "Tím".into(),
            position_column: "Pozícia".into(),
            category_column: "Kategória".into(),
            left_column: "ĽDK".into(),
            right_column: "PDK".into(),
            preview_rows: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub title: String,
    pub axis_label_text: String,
    pub axis_unit: String,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub header_font_size: f32,
    pub header_line_height_mm: f32,
    pub image_x_mm: f32,
    pub image_y_mm: f32,
    pub image_width_mm: f32,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            title: "Deceleration Report".into(),
            axis_label_text: "Decelerácia".into(),
            axis_unit: "m/s²".into(),
            page_width_mm: 297.0,
            page_height_mm: 210.0,
            margin_mm: 10.0,
            header_font_size: 16.0,
            header_line_height_mm: 10.0,
            image_x_mm: 48.5,
            image_y_mm: 50.0,
            image_width_mm: 200.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub dpi: f64,
    pub width_in: f64,
    pub height_in: f64,
    pub font_size_pt: f64,
    pub marker_y: f64,
    pub y_max: f64,
    pub label_offset: f64,
    pub marker_size_pt: f64,
    pub median_line_width_pt: f64,
    pub left_series_name: String,
    pub right_series_name: String,
    pub median_series_name: String,
    pub difference_suffix: String,
    #[serde(default)]
    pub fallback: Fallback,
}
impl Default for Chart {
    fn default() -> Self {
        Self {
            dpi: 300.0,
            width_in: 6.0,
            height_in: 4.0,
            font_size_pt: 12.0,
            marker_y: 3.0,
            y_max: 6.0,
            label_offset: 0.6,
            marker_size_pt: 14.0,
            median_line_width_pt: 3.0,
            left_series_name: "Ľavá".into(),
            right_series_name: "Pravá".into(),
            median_series_name: "Medián".into(),
            difference_suffix: "rozdiel".into(),
            fallback: Default::default(),
        }
    }
}

/// Envelope used when a row's category has no statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Fallback {
    pub median: f64,
    pub min: f64,
    pub max: f64,
}
impl Default for Fallback {
    fn default() -> Self {
        Self {
            median: 8.0,
            min: 5.0,
            max: 11.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub font_path: String,
    pub template_path: String,
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            font_path: "OpenSans.ttf".into(),
            template_path: "template.xlsx".into(),
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub pdf_filename: String,
    pub write_summary_json: bool,
    pub summary_filename: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            pdf_filename: "export.pdf".into(),
            write_summary_json: true,
            summary_filename: "export.json".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
