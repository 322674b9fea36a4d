use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::clustering::labels::GroupLabels;
use crate::dataset::{stats, Table};
use crate::error::{PolicyGroupError, Result};
use crate::model::{GroupId, UNCLUSTERED};
use crate::TARGET_ANALYSIS;

/// A single held-out record with numeric values by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRecord {
    values: BTreeMap<String, f64>,
}

impl TargetRecord {
    /// Keeps only present (non-NaN) values.
    pub fn new(values: BTreeMap<String, f64>) -> Self {
        Self {
            values: values.into_iter().filter(|(_, v)| !v.is_nan()).collect(),
        }
    }

    /// Reads the numeric cells of a one-row table.
    pub fn from_table(table: &Table) -> Result<Self> {
        if table.n_rows() != 1 {
            return Err(PolicyGroupError::malformed_dataset(format!(
                "target must have exactly one row, found {}",
                table.n_rows()
            )));
        }

        let values = table
            .numeric_columns()
            .into_iter()
            .filter_map(|name| table.numeric(name).map(|v| (name.to_string(), v[0])))
            .collect();

        Ok(TargetRecord::new(values))
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// What to do when a group's mean for a scored column is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroMeanPolicy {
    /// Score the column as an infinite error for that group and report it.
    #[default]
    Penalize,
    /// Fail with `DivisionByZero`.
    Fail,
}

#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub remove_unclustered: bool,
    /// Restrict scoring to these columns instead of every numeric raw column.
    pub column_filter: Option<Vec<String>>,
    pub zero_mean: ZeroMeanPolicy,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            remove_unclustered: true,
            column_filter: None,
            zero_mean: ZeroMeanPolicy::Penalize,
        }
    }
}

/// Scores of every candidate group and the best fitting one.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub scores: BTreeMap<GroupId, f64>,
    pub best: GroupId,
    /// Columns the target and the data set share.
    pub columns: Vec<String>,
    /// `(group, column)` pairs scored as infinite because the group mean was
    /// zero or missing.
    pub skipped: Vec<(GroupId, String)>,
}

/// Matches a target record to the group whose column means it is closest to.
///
/// The score of a group is the sum over shared numeric columns of the
/// relative error `|target - mean| / |mean|`, so the arg-min is a
/// nearest-centroid assignment under L1 relative error. Ties go to the lowest
/// group id.
///
/// A zero or missing group mean makes the relative error undefined. Under
/// `ZeroMeanPolicy::Penalize` that group's score becomes infinite, so it only
/// wins when no group has a finite score.
pub fn target_matching(
    target: &TargetRecord,
    raw: &Table,
    group_labels: &GroupLabels,
    options: &MatchOptions,
) -> Result<MatchReport> {
    let allowed: BTreeSet<&str> = match &options.column_filter {
        Some(filter) => filter.iter().map(String::as_str).collect(),
        None => raw.numeric_columns().into_iter().collect(),
    };
    let columns: Vec<String> = target
        .columns()
        .filter(|c| allowed.contains(c) && raw.numeric(c).is_some())
        .map(str::to_string)
        .collect();

    let mut scores = BTreeMap::new();
    let mut skipped = Vec::new();

    for (&group, items) in &group_labels.members {
        if items.is_empty() || (options.remove_unclustered && group == UNCLUSTERED) {
            continue;
        }

        let mut score = 0.0;
        for column in &columns {
            let (Some(x), Some(values)) = (target.get(column), raw.numeric(column)) else {
                continue;
            };
            let mu = match stats::mean(&stats::values_at(values, items)) {
                Some(mu) if mu != 0.0 => mu,
                Some(_) if options.zero_mean == ZeroMeanPolicy::Fail => {
                    return Err(PolicyGroupError::DivisionByZero {
                        group,
                        column: column.clone(),
                    });
                }
                _ => {
                    skipped.push((group, column.clone()));
                    score = f64::INFINITY;
                    continue;
                }
            };
            score += ((x - mu) / mu).abs();
        }
        scores.insert(group, score);
    }

    let mut best: Option<(GroupId, f64)> = None;
    for (&group, &score) in &scores {
        if best.map_or(true, |(_, current)| score < current) {
            best = Some((group, score));
        }
    }
    let (best, best_score) = best.ok_or(PolicyGroupError::NoCandidateGroups)?;

    debug!(
        target: TARGET_ANALYSIS,
        "Target matched group {} with score {:.4} over {} columns",
        best,
        best_score,
        columns.len()
    );

    Ok(MatchReport {
        scores,
        best,
        columns,
        skipped,
    })
}
