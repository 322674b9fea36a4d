use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::clustering::descriptions::is_constant;
use crate::clustering::labels::GroupLabels;
use crate::dataset::{stats, Table};
use crate::model::GroupId;
use crate::TARGET_ANALYSIS;

/// Default magnitude a group's mean z-score must reach.
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 1.0;

/// Default bound on a group's coefficient of variation.
pub const DEFAULT_STD_THRESHOLD: f64 = 1.0;

/// Per-group means of globally z-scored raw columns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZScoreTable {
    /// Retained columns, in raw table order.
    pub columns: Vec<String>,
    /// Constant columns left out of the table.
    pub dropped: Vec<String>,
    /// One mean z-score per retained column, for every non-empty group.
    pub rows: BTreeMap<GroupId, Vec<f64>>,
}

impl ZScoreTable {
    pub fn get(&self, group: GroupId, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&group).map(|row| row[idx])
    }
}

/// Z-scores every numeric raw column against the whole data set and
/// averages the scores per group.
///
/// The global spread is the sample standard deviation (ddof 1). Columns
/// with zero spread, or fewer than two values, are dropped rather than
/// divided by.
pub fn compute_zscores(raw: &Table, group_labels: &GroupLabels) -> ZScoreTable {
    let mut table = ZScoreTable::default();
    let mut scored: Vec<Vec<f64>> = Vec::new();

    for name in raw.numeric_columns() {
        let Some(values) = raw.numeric(name) else {
            continue;
        };
        match (stats::mean(values), stats::sample_std(values)) {
            (Some(mu), Some(sigma)) if !is_constant(sigma, mu) => {
                table.columns.push(name.to_string());
                scored.push(values.iter().map(|v| (v - mu) / sigma).collect());
            }
            _ => table.dropped.push(name.to_string()),
        }
    }

    for (&group, items) in &group_labels.members {
        if items.is_empty() {
            continue;
        }
        let row = scored
            .iter()
            .map(|z| stats::mean(&stats::values_at(z, items)).unwrap_or(f64::NAN))
            .collect();
        table.rows.insert(group, row);
    }

    if !table.dropped.is_empty() {
        debug!(
            target: TARGET_ANALYSIS,
            "Dropped constant columns before z-scoring: {}",
            table.dropped.join(", ")
        );
    }

    table
}

/// Columns that identify each group.
///
/// A column identifies a group when the group's mean z-score reaches
/// `zscore_threshold` in magnitude and the coefficient of variation of the
/// group's raw values (sample std over mean) is at most `std_threshold`.
/// Groups with fewer than two values or a zero mean fail the second test.
/// Every group in `group_labels` gets an entry, possibly empty.
pub fn group_identifiers(
    zscores: &ZScoreTable,
    raw: &Table,
    group_labels: &GroupLabels,
    zscore_threshold: f64,
    std_threshold: f64,
) -> BTreeMap<GroupId, Vec<String>> {
    let mut identifiers: BTreeMap<GroupId, Vec<String>> = group_labels
        .members
        .keys()
        .map(|&group| (group, Vec::new()))
        .collect();

    for (&group, row) in &zscores.rows {
        let Some(items) = group_labels.members.get(&group) else {
            continue;
        };

        for (column, &z) in zscores.columns.iter().zip(row) {
            if z.is_nan() || z.abs() < zscore_threshold {
                continue;
            }
            let Some(values) = raw.numeric(column) else {
                continue;
            };
            let group_values = stats::values_at(values, items);
            let (Some(mean), Some(std)) =
                (stats::mean(&group_values), stats::sample_std(&group_values))
            else {
                continue;
            };
            if mean == 0.0 {
                continue;
            }
            if (std / mean).abs() <= std_threshold {
                identifiers.entry(group).or_default().push(column.clone());
            }
        }
    }

    identifiers
}
