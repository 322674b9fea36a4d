use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PolicyGroupError, Result};
use crate::model::ModelId;

/// Largest tolerated difference between `d[i][j]` and `d[j][i]`.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Pairwise distances between fitted models, indexed by `model_ids`.
///
/// Only constructible through [`DistanceMatrix::new`], so a value of this
/// type is always square, symmetric, finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceMatrix {
    model_ids: Vec<ModelId>,
    distances: Vec<Vec<f64>>,
}

/// On-disk form of a distance matrix plus the threshold chosen upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceFile {
    pub model_ids: Vec<ModelId>,
    pub distances: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_threshold: Option<f64>,
}

impl DistanceMatrix {
    pub fn new(model_ids: Vec<ModelId>, distances: Vec<Vec<f64>>) -> Result<Self> {
        let n = model_ids.len();
        if distances.len() != n {
            return Err(PolicyGroupError::DimensionMismatch {
                expected: n,
                actual: distances.len(),
            });
        }
        if let Some(row) = distances.iter().find(|row| row.len() != n) {
            return Err(PolicyGroupError::DimensionMismatch {
                expected: n,
                actual: row.len(),
            });
        }
        if n < 2 {
            return Err(PolicyGroupError::EmptyInputSet { actual: n });
        }

        for (i, row) in distances.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || value < 0.0 {
                    return Err(PolicyGroupError::InvalidDistance {
                        row: i,
                        col: j,
                        value,
                    });
                }
                let backward = distances[j][i];
                if (value - backward).abs() > SYMMETRY_TOLERANCE {
                    return Err(PolicyGroupError::AsymmetricMatrix {
                        row: i,
                        col: j,
                        forward: value,
                        backward,
                    });
                }
            }
        }

        let mut seen = HashMap::with_capacity(n);
        for (idx, id) in model_ids.iter().enumerate() {
            if let Some(first) = seen.insert(id.as_str(), idx) {
                return Err(PolicyGroupError::malformed_record(
                    id.clone(),
                    format!("listed twice in distance matrix (rows {} and {})", first, idx),
                ));
            }
        }

        Ok(Self {
            model_ids,
            distances,
        })
    }

    pub fn len(&self) -> usize {
        self.model_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model_ids.is_empty()
    }

    pub fn model_ids(&self) -> &[ModelId] {
        &self.model_ids
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.distances[i][j]
    }

    pub fn index_of(&self, model: &str) -> Option<usize> {
        self.model_ids.iter().position(|id| id == model)
    }

    /// Sub-matrix over `keep`, in the order the ids appear in this matrix.
    ///
    /// Ids not present in the matrix fail with `UnknownKey`.
    pub fn restrict(&self, keep: &[ModelId]) -> Result<DistanceMatrix> {
        let mut indices = keep
            .iter()
            .map(|id| {
                self.index_of(id)
                    .ok_or_else(|| PolicyGroupError::unknown_key(id))
            })
            .collect::<Result<Vec<usize>>>()?;
        indices.sort_unstable();
        indices.dedup();

        let model_ids = indices.iter().map(|&i| self.model_ids[i].clone()).collect();
        let distances = indices
            .iter()
            .map(|&i| indices.iter().map(|&j| self.distances[i][j]).collect())
            .collect();

        DistanceMatrix::new(model_ids, distances)
    }
}

impl TryFrom<DistanceFile> for DistanceMatrix {
    type Error = PolicyGroupError;

    fn try_from(file: DistanceFile) -> Result<Self> {
        DistanceMatrix::new(file.model_ids, file.distances)
    }
}
