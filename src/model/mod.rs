//! Fitted Mapper model records as produced by the upstream fitting step.

pub mod graph;
pub mod hyperparameters;
pub mod record;
pub mod types;

pub use graph::MapperGraph;
pub use hyperparameters::{ClustererParams, CoverParams, Hyperparameters, Projector};
pub use record::{ModelRecord, Signature};
pub use types::*;
