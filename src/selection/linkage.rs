use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyGroupError;

/// How the distance between two clusters is derived from their members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Closest pair of members.
    Single,
    /// Farthest pair of members.
    Complete,
    /// Mean over all member pairs (UPGMA).
    #[default]
    Average,
}

impl Linkage {
    /// Lance-Williams update: distance from the merge of `a` and `b` (of
    /// sizes `size_a` and `size_b`) to a third cluster.
    pub(crate) fn update(&self, d_a: f64, d_b: f64, size_a: usize, size_b: usize) -> f64 {
        match self {
            Linkage::Single => d_a.min(d_b),
            Linkage::Complete => d_a.max(d_b),
            Linkage::Average => {
                let total = (size_a + size_b) as f64;
                (size_a as f64 * d_a + size_b as f64 * d_b) / total
            }
        }
    }
}

impl FromStr for Linkage {
    type Err = PolicyGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            _ => Err(PolicyGroupError::UnknownLinkage(s.to_string())),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
        };
        write!(f, "{}", name)
    }
}
