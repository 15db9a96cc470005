use crate::{
    chart::AxisLabels,
    compose::PageRecord,
    stats::{CategoryEnvelope, EnvelopeTable},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub input: String,
    pub input_sha256: String,
    pub config_sha256: String,
    pub sheet: String,
    pub started: String,
    pub finished: String,
    pub output: String,
    pub pdf_bytes: usize,
    pub labels: AxisLabels,
    pub stats: StatsReport,
    pub pages: Vec<PageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsReport {
    pub categories: Vec<CategoryStats>,
    pub uncategorized: Option<CategoryEnvelope>,
    pub fallback: CategoryEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    #[serde(flatten)]
    pub envelope: CategoryEnvelope,
}

impl From<&EnvelopeTable> for StatsReport {
    fn from(table: &EnvelopeTable) -> Self {
        StatsReport {
            categories: table
                .iter()
                .map(|(category, envelope)| CategoryStats {
                    category: category.to_string(),
                    envelope: *envelope,
                })
                .collect(),
            uncategorized: table.uncategorized(),
            fallback: table.fallback(),
        }
    }
}
