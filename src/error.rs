use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("left value is zero for {name}; percentage difference is undefined")]
    DivisionByZero { name: String },

    #[error("missing asset: {}", path.display())]
    MissingAsset { path: PathBuf },

    #[error("input spreadsheet not found: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("invalid font {}: {reason}", path.display())]
    InvalidFont { path: PathBuf, reason: String },

    #[error("spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("row {row}: missing value in column {column}")]
    MissingValue { row: usize, column: String },

    #[error("row {row}: column {column} is not a number: {value:?}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("chart rendering failed: {0}")]
    Render(String),

    #[error("image encoding failed: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub(crate) fn render(err: impl std::fmt::Display) -> Self {
        ReportError::Render(err.to_string())
    }

    pub(crate) fn image(err: impl std::fmt::Display) -> Self {
        ReportError::Image(err.to_string())
    }
}
