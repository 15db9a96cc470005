use crate::{config, error::ReportError};
use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRow {
    pub name: String,
    pub team: Option<String>,
    pub position: Option<String>,
    pub category: Option<String>,
    pub left_value: f64,
    pub right_value: f64,
}

impl InputRow {
    pub fn new(name: impl Into<String>, left_value: f64, right_value: f64) -> Self {
        Self {
            name: name.into(),
            team: None,
            position: None,
            category: None,
            left_value,
            right_value,
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Page header lines: the name, then team, position and category when set.
    pub fn header_lines(&self) -> Vec<&str> {
        let mut lines = vec![self.name.as_str()];
        lines.extend(
            [&self.team, &self.position, &self.category]
                .into_iter()
                .filter_map(|f| f.as_deref()),
        );
        lines
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedSheet {
    pub sheet: String,
    pub rows: Vec<InputRow>,
}

pub fn load_rows(cfg: &config::Input, path: &Path) -> Result<LoadedSheet, ReportError> {
    if !path.exists() {
        return Err(ReportError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let mut workbook =
        open_workbook_auto(path).map_err(|e| ReportError::Spreadsheet(e.to_string()))?;

    let sheet = if cfg.sheet.is_empty() {
        workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReportError::Spreadsheet("workbook has no sheets".into()))?
    } else {
        cfg.sheet.clone()
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ReportError::Spreadsheet(format!("sheet {sheet:?}: {e}")))?;
    let rows = rows_from_range(&range, cfg)?;

    info!("loaded {} rows from sheet {sheet:?} of {}", rows.len(), path.display());
    Ok(LoadedSheet { sheet, rows })
}

struct ColumnIndex {
    name: usize,
    team: Option<usize>,
    position: Option<usize>,
    category: Option<usize>,
    left: usize,
    right: usize,
}

impl ColumnIndex {
    fn resolve(header: &[Data], cfg: &config::Input) -> Result<Self, ReportError> {
        let names: Vec<Option<String>> = header.iter().map(cell_text).collect();
        let find = |wanted: &str| {
            let wanted = normalize(wanted);
            names.iter().position(|n| n.as_deref() == Some(wanted.as_str()))
        };
        let require = |wanted: &str| {
            find(wanted).ok_or_else(|| ReportError::MissingColumn(wanted.to_string()))
        };

        Ok(Self {
            name: require(&cfg.name_column)?,
            team: find(&cfg.team_column),
            position: find(&cfg.position_column),
            category: find(&cfg.category_column),
            left: require(&cfg.left_column)?,
            right: require(&cfg.right_column)?,
        })
    }
}

/// Parses data rows below the header row of `range`.
pub fn rows_from_range(
    range: &Range<Data>,
    cfg: &config::Input,
) -> Result<Vec<InputRow>, ReportError> {
    let mut iter = range.rows();
    let header = iter
        .next()
        .ok_or_else(|| ReportError::Spreadsheet("sheet is empty".into()))?;
    let cols = ColumnIndex::resolve(header, cfg)?;

    // Spreadsheet row numbers are 1-based and the header occupies the first.
    let first_row = range.start().map(|(r, _)| r as usize + 2).unwrap_or(2);

    let mut out = Vec::new();
    for (i, cells) in iter.enumerate() {
        let row = first_row + i;
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            debug!("skipping empty row {row}");
            continue;
        }

        let text_at = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).and_then(cell_text);
        let number_at = |idx: usize, column: &str| {
            cell_number(cells.get(idx).unwrap_or(&Data::Empty), row, column)
        };

        let name = text_at(Some(cols.name)).ok_or_else(|| ReportError::MissingValue {
            row,
            column: cfg.name_column.clone(),
        })?;

        out.push(InputRow {
            name,
            team: text_at(cols.team),
            position: text_at(cols.position),
            category: text_at(cols.category),
            left_value: number_at(cols.left, &cfg.left_column)?,
            right_value: number_at(cols.right, &cfg.right_column)?,
        });
    }
    Ok(out)
}

fn normalize(s: &str) -> String {
    s.trim().nfc().collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) => normalize(s),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::DateTime(_) => cell.to_string(),
        Data::Error(_) | Data::Empty => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn cell_number(cell: &Data, row: usize, column: &str) -> Result<f64, ReportError> {
    let invalid = |value: String| ReportError::InvalidNumber {
        row,
        column: column.to_string(),
        value,
    };

    let value = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) if s.trim().is_empty() => {
            return Err(ReportError::MissingValue {
                row,
                column: column.to_string(),
            });
        }
        Data::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map_err(|_| invalid(s.clone()))?,
        Data::Empty => {
            return Err(ReportError::MissingValue {
                row,
                column: column.to_string(),
            });
        }
        other => return Err(invalid(other.to_string())),
    };

    if !value.is_finite() {
        return Err(invalid(value.to_string()));
    }
    Ok(value)
}
