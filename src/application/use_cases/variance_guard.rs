use std::collections::HashSet;

use tracing::warn;

use crate::domain::dataset::{GroupedDataset, PairedDataset, VarianceReport};
use crate::domain::error::{AppError, Result};

pub const IDENTICAL_VALUES: &str =
    "All values are identical (identical values), so there is no variance to analyze.";
pub const INSUFFICIENT_VARIANCE: &str =
    "The data has insufficient variance: no group varies internally and all group means are equal.";
pub const X_NO_VARIANCE: &str = "X has no variance: all X values are identical.";
pub const Y_NO_VARIANCE: &str = "Y has no variance: all Y values are identical.";

/// Decimal places group means are compared at.
const MEAN_DECIMALS: i32 = 6;

fn distinct_count(values: impl IntoIterator<Item = f64>) -> usize {
    values
        .into_iter()
        .map(f64::to_bits)
        .collect::<HashSet<u64>>()
        .len()
}

/// Round half up, so `x.5` always moves toward positive infinity.
fn round_half_up(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale + 0.5).floor() / scale
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reject grouped data that carries no usable spread.
///
/// Identical values are compared exactly, group means only up to
/// [`MEAN_DECIMALS`] places. Data with just one kind of spread is accepted.
pub fn check_grouped(dataset: &GroupedDataset) -> Result<VarianceReport> {
    if distinct_count(dataset.all_values()) == 1 {
        return Err(AppError::VarianceViolation(IDENTICAL_VALUES.to_string()));
    }

    let within_group = dataset
        .groups
        .iter()
        .any(|g| distinct_count(g.values.iter().copied()) > 1);

    let rounded_means = dataset
        .groups
        .iter()
        .filter(|g| !g.values.is_empty())
        .map(|g| round_half_up(mean(&g.values), MEAN_DECIMALS));
    let between_group = distinct_count(rounded_means) > 1;

    let report = VarianceReport {
        within_group,
        between_group,
    };

    match (within_group, between_group) {
        (false, false) => Err(AppError::VarianceViolation(INSUFFICIENT_VARIANCE.to_string())),
        (true, true) => Ok(report),
        _ => {
            warn!(
                within_group,
                between_group,
                groups = dataset.k(),
                "Dataset shows only one kind of variance; results may be of limited use"
            );
            Ok(report)
        }
    }
}

pub fn check_paired(dataset: &PairedDataset) -> Result<()> {
    if distinct_count(dataset.x.iter().copied()) == 1 {
        return Err(AppError::VarianceViolation(X_NO_VARIANCE.to_string()));
    }
    if distinct_count(dataset.y.iter().copied()) == 1 {
        return Err(AppError::VarianceViolation(Y_NO_VARIANCE.to_string()));
    }
    Ok(())
}
