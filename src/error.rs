//! Error types for policy group analysis and model selection.

use thiserror::Error;

use crate::model::{GroupId, ItemId};

/// Errors surfaced by the library. Every variant carries the identifier that
/// caused it so batch runs can log and isolate the failure.
#[derive(Debug, Error)]
pub enum PolicyGroupError {
    /// An item index outside the known universe was looked up.
    #[error("Unknown item {item}")]
    UnknownItem { item: ItemId },

    /// A node or group id is not present in the index tables.
    #[error("Unknown key: {key}")]
    UnknownKey { key: String },

    /// The data set (or model) describes zero items.
    #[error("Empty item universe")]
    EmptyUniverse,

    /// A ratio was requested against a zero mean or zero spread.
    #[error("Division by zero in group {group}, column '{column}'")]
    DivisionByZero { group: GroupId, column: String },

    /// The pairwise distance matrix is not symmetric.
    #[error("Asymmetric distance matrix at ({row}, {col}): {forward} vs {backward}")]
    AsymmetricMatrix {
        row: usize,
        col: usize,
        forward: f64,
        backward: f64,
    },

    /// Clustering needs at least two models.
    #[error("Insufficient models: required 2, actual {actual}")]
    EmptyInputSet { actual: usize },

    /// An equivalence class has no member models.
    #[error("Equivalence class {class} has no models")]
    EmptyClass { class: usize },

    /// A model record is missing required fields or is internally inconsistent.
    #[error("Malformed model record '{model}': {reason}")]
    MalformedModelRecord { model: String, reason: String },

    /// An item is claimed by nodes in two different components.
    #[error("Item {item} assigned to group {first} and group {second}")]
    ConflictingGroupAssignment {
        item: ItemId,
        first: GroupId,
        second: GroupId,
    },

    /// A node exists in the cover but belongs to no component.
    #[error("Node '{node}' belongs to no component")]
    OrphanNode { node: String },

    /// Matrix or table dimensions don't line up.
    #[error("Dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A distance entry is negative or not finite.
    #[error("Invalid distance at ({row}, {col}): {value}")]
    InvalidDistance { row: usize, col: usize, value: f64 },

    /// Linkage method name not recognised.
    #[error("Unknown linkage method '{0}'")]
    UnknownLinkage(String),

    /// Raw/clean tables are inconsistent.
    #[error("Malformed dataset: {reason}")]
    MalformedDataset { reason: String },

    /// Target matching had no group to score against.
    #[error("No candidate groups for target matching")]
    NoCandidateGroups,

    /// No numeric column can describe a node (all constant or missing).
    #[error("No descriptive columns available for '{node}'")]
    NoDescriptiveColumns { node: String },

    /// A coverage value outside [0, 1].
    #[error("Invalid coverage {coverage} for model '{model}'")]
    InvalidCoverage { model: String, coverage: f64 },

    /// No distance threshold was given for cutting the model dendrogram.
    #[error("No distance threshold configured for metric '{metric}'")]
    MissingThreshold { metric: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PolicyGroupError {
    /// Create an UnknownKey error for any displayable id.
    pub fn unknown_key(key: impl ToString) -> Self {
        Self::UnknownKey {
            key: key.to_string(),
        }
    }

    /// Create a MalformedModelRecord error.
    pub fn malformed_record(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedModelRecord {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Create a MalformedDataset error.
    pub fn malformed_dataset(reason: impl Into<String>) -> Self {
        Self::MalformedDataset {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PolicyGroupError>;
