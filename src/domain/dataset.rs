use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::error::{AppError, Result};

/// One spreadsheet cell as the workbook declared it, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Text(String),
    Numeric(f64),
    Boolean(bool),
    /// Last cached evaluation result. `None` when evaluation failed or is unsupported.
    Formula(Option<Box<RawCell>>),
    Blank,
}

impl RawCell {
    pub fn formula(cached: RawCell) -> Self {
        RawCell::Formula(Some(Box::new(cached)))
    }
}

#[cfg(test)]
impl RawCell {
    pub fn text(value: &str) -> Self {
        RawCell::Text(value.to_string())
    }
}

/// Minimum sizes a dataset must reach before it is considered analyzable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct ValidationPolicy {
    #[validate(range(min = 1))]
    pub min_groups: usize,
    #[validate(range(min = 1))]
    pub min_values_per_group: usize,
    #[validate(range(min = 2))]
    pub min_pairs: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_groups: 3,
            min_values_per_group: 2,
            min_pairs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub values: Vec<f64>,
}

/// Named groups of observations, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedDataset {
    pub groups: Vec<Group>,
}

impl GroupedDataset {
    pub fn n(&self) -> usize {
        self.groups.iter().map(|g| g.values.len()).sum()
    }

    pub fn k(&self) -> usize {
        self.groups.len()
    }

    pub fn all_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.groups.iter().flat_map(|g| g.values.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairedDataset {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl PairedDataset {
    pub fn n(&self) -> usize {
        self.x.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedMetadata {
    pub case_name: String,
    pub dependent_name: String,
    pub independent_name: String,
    pub alpha: f64,
    pub input_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedMetadata {
    pub case_name: String,
    pub x_name: String,
    pub y_name: String,
    pub alpha: f64,
    pub input_method: String,
}

/// Which kinds of spread a grouped dataset shows. At least one holds for any accepted dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceReport {
    pub within_group: bool,
    pub between_group: bool,
}

impl VarianceReport {
    pub fn is_limited(&self) -> bool {
        !(self.within_group && self.between_group)
    }
}

/// Normalized grouped dataset ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRecord {
    pub metadata: GroupedMetadata,
    pub dataset: GroupedDataset,
    pub variance: VarianceReport,
}

impl GroupedRecord {
    pub fn n(&self) -> usize {
        self.dataset.n()
    }

    pub fn k(&self) -> usize {
        self.dataset.k()
    }

    /// Flattened `(group, value)` rows in dataset order.
    pub fn rows(&self) -> Vec<(&str, f64)> {
        self.dataset
            .groups
            .iter()
            .flat_map(|g| g.values.iter().map(move |v| (g.name.as_str(), *v)))
            .collect()
    }
}

/// Normalized paired dataset ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRecord {
    pub metadata: PairedMetadata,
    pub dataset: PairedDataset,
}

impl PairedRecord {
    pub fn n(&self) -> usize {
        self.dataset.n()
    }

    pub fn rows(&self) -> Vec<(f64, f64)> {
        self.dataset
            .x
            .iter()
            .copied()
            .zip(self.dataset.y.iter().copied())
            .collect()
    }
}

/// Outcome of validating one dataset. A rejection carries exactly one reason.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationVerdict<T> {
    Accepted(T),
    Rejected(AppError),
}

impl<T> ValidationVerdict<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            ValidationVerdict::Accepted(value) => Ok(value),
            ValidationVerdict::Rejected(err) => Err(err),
        }
    }
}

impl<T> From<Result<T>> for ValidationVerdict<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => ValidationVerdict::Accepted(value),
            Err(err) => ValidationVerdict::Rejected(err),
        }
    }
}
