use serde::{Deserialize, Serialize};
use std::fmt;

/// Projection used to embed the point cloud before covering it.
///
/// Resolved once when the record is deserialized; each variant carries only
/// the parameters that projector understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Projector {
    #[serde(rename = "UMAP")]
    Umap {
        n_neighbors: u32,
        min_dist: f64,
        dimensions: u32,
        seed: u64,
    },
    #[serde(rename = "TSNE")]
    Tsne {
        perplexity: f64,
        dimensions: u32,
        seed: u64,
    },
    #[serde(rename = "PCA")]
    Pca { dimensions: u32, seed: u64 },
}

impl Default for Projector {
    fn default() -> Self {
        Projector::Umap {
            n_neighbors: 4,
            min_dist: 0.1,
            dimensions: 2,
            seed: 42,
        }
    }
}

impl Projector {
    /// Short tag used as the leading part of a model id.
    pub fn tag(&self) -> String {
        match self {
            Projector::Umap {
                n_neighbors,
                min_dist,
                dimensions,
                seed,
            } => format!("umap_nn{}_md{}_d{}_s{}", n_neighbors, min_dist, dimensions, seed),
            Projector::Tsne {
                perplexity,
                dimensions,
                seed,
            } => format!("tsne_p{}_d{}_s{}", perplexity, dimensions, seed),
            Projector::Pca { dimensions, seed } => format!("pca_d{}_s{}", dimensions, seed),
        }
    }
}

impl fmt::Display for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projector::Umap { .. } => write!(f, "UMAP"),
            Projector::Tsne { .. } => write!(f, "TSNE"),
            Projector::Pca { .. } => write!(f, "PCA"),
        }
    }
}

/// Cover of the projected space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverParams {
    pub n_cubes: u32,
    pub perc_overlap: f64,
}

/// Local clusterer run inside each cover element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClustererParams {
    pub min_cluster_size: u32,
}

/// Full hyperparameter set a model was fitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub projector: Projector,
    pub cover: CoverParams,
    pub clusterer: ClustererParams,
    /// Minimum shared items for two nodes to be joined by an edge.
    pub min_intersection: u32,
}

impl Hyperparameters {
    /// Deterministic id derived from every hyperparameter.
    ///
    /// Ids sort lexicographically; representative selection uses that order
    /// to break coverage ties.
    pub fn model_id(&self) -> String {
        format!(
            "{}_nc{}_po{}_mcs{}_mi{}",
            self.projector.tag(),
            self.cover.n_cubes,
            self.cover.perc_overlap,
            self.clusterer.min_cluster_size,
            self.min_intersection
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn umap_params() -> Hyperparameters {
        Hyperparameters {
            projector: Projector::default(),
            cover: CoverParams {
                n_cubes: 10,
                perc_overlap: 0.3,
            },
            clusterer: ClustererParams {
                min_cluster_size: 5,
            },
            min_intersection: 1,
        }
    }

    #[test]
    fn test_model_id_is_derived_from_hyperparameters() {
        assert_eq!(
            umap_params().model_id(),
            "umap_nn4_md0.1_d2_s42_nc10_po0.3_mcs5_mi1"
        );

        let mut pca = umap_params();
        pca.projector = Projector::Pca {
            dimensions: 2,
            seed: 7,
        };
        assert_eq!(pca.model_id(), "pca_d2_s7_nc10_po0.3_mcs5_mi1");
    }

    #[test]
    fn test_projector_tagged_serialization() {
        let json = serde_json::json!({
            "kind": "TSNE",
            "perplexity": 30.0,
            "dimensions": 2,
            "seed": 1
        });
        let projector: Projector = serde_json::from_value(json).unwrap();
        assert_eq!(
            projector,
            Projector::Tsne {
                perplexity: 30.0,
                dimensions: 2,
                seed: 1
            }
        );
        assert_eq!(projector.to_string(), "TSNE");

        let bad = serde_json::json!({ "kind": "ISOMAP", "dimensions": 2 });
        assert!(serde_json::from_value::<Projector>(bad).is_err());
    }
}
