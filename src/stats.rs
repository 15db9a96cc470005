use crate::{config, input::InputRow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryEnvelope {
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl CategoryEnvelope {
    pub const FALLBACK: CategoryEnvelope = CategoryEnvelope {
        median: 8.0,
        min: 5.0,
        max: 11.0,
    };

    fn from_columns(left: &mut [f64], right: &mut [f64]) -> Self {
        left.sort_by(f64::total_cmp);
        right.sort_by(f64::total_cmp);
        let (lo_l, hi_l) = (left[0], left[left.len() - 1]);
        let (lo_r, hi_r) = (right[0], right[right.len() - 1]);
        CategoryEnvelope {
            median: (median_sorted(left) + median_sorted(right)) / 2.0,
            min: lo_l.min(lo_r) - 1.0,
            max: hi_l.max(hi_r) + 1.0,
        }
    }
}

impl From<&config::Fallback> for CategoryEnvelope {
    fn from(f: &config::Fallback) -> Self {
        CategoryEnvelope {
            median: f.median,
            min: f.min,
            max: f.max,
        }
    }
}

fn median_sorted(values: &[f64]) -> f64 {
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Per-category envelopes for one report run.
///
/// Rows without a category are aggregated into their own group, but lookups
/// for a missing category always resolve to the fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeTable {
    categories: BTreeMap<String, CategoryEnvelope>,
    uncategorized: Option<CategoryEnvelope>,
    fallback: CategoryEnvelope,
}

impl EnvelopeTable {
    pub fn with_fallback(mut self, fallback: CategoryEnvelope) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn get(&self, category: Option<&str>) -> Option<&CategoryEnvelope> {
        category.and_then(|c| self.categories.get(c))
    }

    pub fn lookup(&self, category: Option<&str>) -> CategoryEnvelope {
        self.get(category).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> CategoryEnvelope {
        self.fallback
    }

    pub fn uncategorized(&self) -> Option<CategoryEnvelope> {
        self.uncategorized
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryEnvelope)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

pub fn aggregate(rows: &[InputRow]) -> EnvelopeTable {
    let mut groups: BTreeMap<Option<&str>, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let (left, right) = groups.entry(row.category.as_deref()).or_default();
        left.push(row.left_value);
        right.push(row.right_value);
    }

    let mut categories = BTreeMap::new();
    let mut uncategorized = None;
    for (key, (mut left, mut right)) in groups {
        let envelope = CategoryEnvelope::from_columns(&mut left, &mut right);
        match key {
            Some(name) => {
                categories.insert(name.to_string(), envelope);
            }
            None => uncategorized = Some(envelope),
        }
    }

    EnvelopeTable {
        categories,
        uncategorized,
        fallback: CategoryEnvelope::FALLBACK,
    }
}
