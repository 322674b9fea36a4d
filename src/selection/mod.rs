//! Structural equivalence classes of fitted models and their representatives.

pub mod agglomerative;
pub mod batch;
pub mod distance;
pub mod linkage;
pub mod representative;

pub use agglomerative::{cluster_models, Dendrogram, Merge, ModelClustering};
pub use batch::{
    coverage_histogram, run_batch, select_and_persist, BatchConfig, Failure, SelectedModel,
    SelectionArtifact,
};
pub use distance::{DistanceFile, DistanceMatrix, SYMMETRY_TOLERANCE};
pub use linkage::Linkage;
pub use representative::{select_representatives, Representative};
