//! Column statistics. NaN marks a missing value and is skipped everywhere.

use crate::model::ItemId;

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = present(values).fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
fn std_with_ddof(values: &[f64], ddof: usize) -> Option<f64> {
    let mu = mean(values)?;
    let (sq, count) = present(values).fold((0.0, 0usize), |(s, c), v| {
        (s + (v - mu) * (v - mu), c + 1)
    });
    (count > ddof).then(|| (sq / (count - ddof) as f64).sqrt())
}

/// Population standard deviation (ddof = 0).
pub fn population_std(values: &[f64]) -> Option<f64> {
    std_with_ddof(values, 0)
}

/// Sample standard deviation (ddof = 1); `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    std_with_ddof(values, 1)
}

/// Gathers the values of `column` at the given rows; rows past the end are ignored.
pub fn values_at(column: &[f64], rows: &[ItemId]) -> Vec<f64> {
    rows.iter().filter_map(|&r| column.get(r).copied()).collect()
}
