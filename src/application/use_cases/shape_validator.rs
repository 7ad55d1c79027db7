//! Structural rules for submitted datasets.
//!
//! Rules run top to bottom and the first failure is the only one reported.
//! Keep the order: callers and tests rely on which message wins.

use std::collections::HashSet;

use crate::domain::analysis::{AnovaInput, CorrelationInput};
use crate::domain::dataset::{
    Group, GroupedDataset, GroupedMetadata, PairedDataset, PairedMetadata, ValidationPolicy,
};
use crate::domain::error::{AppError, Result};

pub const GROUPS_INCOMPLETE: &str = "Please make sure all group data is filled in.";
pub const GROUP_COUNT_MISMATCH: &str =
    "The number of group names and group value lists must be the same.";
pub const BLANK_GROUP_NAME: &str = "Group names must not be empty.";
pub const DUPLICATE_GROUP_NAME: &str = "Group names must not be duplicated.";
pub const GROUP_VALUES_EMPTY: &str = "Please make sure no group values are empty.";
pub const INVALID_GROUP_VALUE: &str = "Group values must be finite numbers.";

pub const FIELDS_INCOMPLETE: &str = "Please make sure all fields are filled in correctly.";
pub const ALPHA_NOT_POSITIVE: &str = "Alpha must be greater than 0.";
pub const INPUT_METHOD_MISSING: &str = "Please choose a data input method first.";
pub const PAIR_LENGTH_MISMATCH: &str = "X and Y must have the same number of values.";
pub const INVALID_PAIR_VALUE: &str = "X and Y values must not be empty or non-finite.";

fn violation(message: impl Into<String>) -> AppError {
    AppError::ShapeViolation(message.into())
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn valid_alpha(alpha: Option<f64>) -> Result<f64> {
    match alpha {
        None => Err(violation(FIELDS_INCOMPLETE)),
        Some(alpha) if alpha.is_finite() && alpha > 0.0 => Ok(alpha),
        Some(_) => Err(violation(ALPHA_NOT_POSITIVE)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetShapeValidator {
    policy: ValidationPolicy,
}

impl DatasetShapeValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn validate_grouped(
        &self,
        input: &AnovaInput,
    ) -> Result<(GroupedMetadata, GroupedDataset)> {
        let (Some(names), Some(values)) = (&input.group_names, &input.group_values) else {
            return Err(violation(GROUPS_INCOMPLETE));
        };

        if names.is_empty() || values.is_empty() {
            return Err(violation(GROUPS_INCOMPLETE));
        }

        if names.len() != values.len() {
            return Err(violation(GROUP_COUNT_MISMATCH));
        }

        if names.len() < self.policy.min_groups {
            return Err(violation(format!(
                "At least {} groups are required.",
                self.policy.min_groups
            )));
        }

        let mut group_names = Vec::with_capacity(names.len());
        for name in names {
            match name {
                Some(name) if !name.trim().is_empty() => group_names.push(name.clone()),
                _ => return Err(violation(BLANK_GROUP_NAME)),
            }
        }

        let unique: HashSet<&str> = group_names.iter().map(String::as_str).collect();
        if unique.len() != group_names.len() {
            return Err(violation(DUPLICATE_GROUP_NAME));
        }

        let mut groups = Vec::with_capacity(values.len());
        for (name, group_values) in group_names.into_iter().zip(values) {
            let Some(group_values) = group_values.as_ref().filter(|v| !v.is_empty()) else {
                return Err(violation(GROUP_VALUES_EMPTY));
            };

            if group_values.len() < self.policy.min_values_per_group {
                return Err(violation(format!(
                    "Each group needs at least {} values.",
                    self.policy.min_values_per_group
                )));
            }

            let mut finite = Vec::with_capacity(group_values.len());
            for value in group_values {
                match value {
                    Some(value) if value.is_finite() => finite.push(*value),
                    _ => return Err(violation(INVALID_GROUP_VALUE)),
                }
            }

            groups.push(Group {
                name,
                values: finite,
            });
        }

        let metadata = self.grouped_metadata(input)?;
        Ok((metadata, GroupedDataset { groups }))
    }

    /// Checked after the data rules so it never masks one of their messages.
    fn grouped_metadata(&self, input: &AnovaInput) -> Result<GroupedMetadata> {
        let (Some(case_name), Some(dependent_name), Some(independent_name)) = (
            present(&input.case_name),
            present(&input.dependent_name),
            present(&input.independent_name),
        ) else {
            return Err(violation(FIELDS_INCOMPLETE));
        };

        let alpha = valid_alpha(input.alpha)?;

        let Some(input_method) = present(&input.input_method) else {
            return Err(violation(INPUT_METHOD_MISSING));
        };

        Ok(GroupedMetadata {
            case_name: case_name.to_string(),
            dependent_name: dependent_name.to_string(),
            independent_name: independent_name.to_string(),
            alpha,
            input_method: input_method.to_string(),
        })
    }

    pub fn validate_paired(
        &self,
        input: &CorrelationInput,
    ) -> Result<(PairedMetadata, PairedDataset)> {
        let (Some(case_name), Some(x_name), Some(y_name)) = (
            present(&input.case_name),
            present(&input.x_name),
            present(&input.y_name),
        ) else {
            return Err(violation(FIELDS_INCOMPLETE));
        };

        let alpha = valid_alpha(input.alpha)?;

        let Some(input_method) = present(&input.input_method) else {
            return Err(violation(INPUT_METHOD_MISSING));
        };

        let (Some(x), Some(y)) = (&input.x_values, &input.y_values) else {
            return Err(violation(FIELDS_INCOMPLETE));
        };
        if x.is_empty() || y.is_empty() {
            return Err(violation(FIELDS_INCOMPLETE));
        }

        if x.len() < self.policy.min_pairs || y.len() < self.policy.min_pairs {
            return Err(violation(format!(
                "At least {} values are required for both X and Y.",
                self.policy.min_pairs
            )));
        }

        if x.len() != y.len() {
            return Err(violation(PAIR_LENGTH_MISMATCH));
        }

        let finite = |values: &[Option<f64>]| -> Result<Vec<f64>> {
            values
                .iter()
                .map(|value| match value {
                    Some(value) if value.is_finite() => Ok(*value),
                    _ => Err(violation(INVALID_PAIR_VALUE)),
                })
                .collect()
        };
        let dataset = PairedDataset {
            x: finite(x.as_slice())?,
            y: finite(y.as_slice())?,
        };

        let metadata = PairedMetadata {
            case_name: case_name.to_string(),
            x_name: x_name.to_string(),
            y_name: y_name.to_string(),
            alpha,
            input_method: input_method.to_string(),
        };
        Ok((metadata, dataset))
    }
}
