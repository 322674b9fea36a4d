use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::{ClassId, ModelId};
use crate::selection::distance::DistanceMatrix;
use crate::selection::linkage::Linkage;
use crate::TARGET_SELECTION;

/// One step of the agglomeration. Leaves are numbered `0..n`; the cluster
/// created by step `k` is numbered `n + k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

/// Full merge history over a distance matrix.
#[derive(Debug, Clone, Serialize)]
pub struct Dendrogram {
    pub model_ids: Vec<ModelId>,
    pub linkage: Linkage,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    /// Agglomerates every model into one cluster, recording each merge.
    ///
    /// At each step the closest pair of active clusters is merged; ties go
    /// to the pair with the lowest cluster numbers. Distances to the new
    /// cluster follow the Lance-Williams update of `linkage`.
    pub fn build(matrix: &DistanceMatrix, linkage: Linkage) -> Self {
        let n = matrix.len();
        let total = 2 * n - 1;
        let mut dist = vec![vec![f64::INFINITY; total]; total];
        for (i, row) in dist.iter_mut().enumerate().take(n) {
            for (j, cell) in row.iter_mut().enumerate().take(n) {
                *cell = matrix.get(i, j);
            }
        }

        let mut sizes = vec![1usize; n];
        sizes.resize(total, 0);
        let mut active: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        while active.len() > 1 {
            let mut best: Option<(usize, usize, f64)> = None;
            for (pos, &a) in active.iter().enumerate() {
                for &b in &active[pos + 1..] {
                    let d = dist[a][b];
                    if best.map_or(true, |(_, _, current)| d < current) {
                        best = Some((a, b, d));
                    }
                }
            }
            let Some((a, b, distance)) = best else {
                break;
            };

            let merged = n + merges.len();
            sizes[merged] = sizes[a] + sizes[b];
            active.retain(|&c| c != a && c != b);

            for &k in &active {
                let d = linkage.update(dist[a][k], dist[b][k], sizes[a], sizes[b]);
                dist[merged][k] = d;
                dist[k][merged] = d;
            }
            active.push(merged);

            merges.push(Merge {
                left: a,
                right: b,
                distance,
                size: sizes[merged],
            });
        }

        debug!(
            target: TARGET_SELECTION,
            "Built {} dendrogram over {} models",
            linkage,
            n
        );

        Dendrogram {
            model_ids: matrix.model_ids().to_vec(),
            linkage,
            merges,
        }
    }

    /// Flat clustering keeping every merge with distance strictly below
    /// `threshold`.
    pub fn cut(&self, threshold: f64) -> ModelClustering {
        let n = self.model_ids.len();
        let mut parent: Vec<usize> = (0..n).collect();
        // representative leaf of every cluster number
        let mut leaf_of: Vec<usize> = (0..n).collect();

        for merge in &self.merges {
            let (a, b) = (leaf_of[merge.left], leaf_of[merge.right]);
            leaf_of.push(a);
            if merge.distance < threshold {
                let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }

        let mut class_of_root: HashMap<usize, ClassId> = HashMap::new();
        let mut labels = BTreeMap::new();
        for (leaf, id) in self.model_ids.iter().enumerate() {
            let root = find(&mut parent, leaf);
            let next = class_of_root.len();
            let class = *class_of_root.entry(root).or_insert(next);
            labels.insert(id.clone(), class);
        }

        ModelClustering {
            labels,
            n_classes: class_of_root.len(),
            threshold,
            linkage: self.linkage,
        }
    }
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Equivalence classes of models at one distance threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelClustering {
    pub labels: BTreeMap<ModelId, ClassId>,
    pub n_classes: usize,
    /// Threshold the dendrogram was cut at.
    pub threshold: f64,
    pub linkage: Linkage,
}

impl ModelClustering {
    /// Member models of every class, in model id order.
    pub fn classes(&self) -> BTreeMap<ClassId, Vec<ModelId>> {
        let mut classes: BTreeMap<ClassId, Vec<ModelId>> = BTreeMap::new();
        for (model, &class) in &self.labels {
            classes.entry(class).or_default().push(model.clone());
        }
        classes
    }

    pub fn class_of(&self, model: &str) -> Option<ClassId> {
        self.labels.get(model).copied()
    }
}

/// Clusters models into structural equivalence classes.
///
/// # Arguments
/// * `matrix` - Validated pairwise distances between model signatures
/// * `linkage` - Cluster distance rule
/// * `threshold` - Merges at or above this distance are not applied
///
/// # Returns
/// * `Ok(ModelClustering)` - Dense class ids, numbered by each class's first model in matrix order
pub fn cluster_models(
    matrix: &DistanceMatrix,
    linkage: Linkage,
    threshold: f64,
) -> Result<ModelClustering> {
    let clustering = Dendrogram::build(matrix, linkage).cut(threshold);

    info!(
        target: TARGET_SELECTION,
        "{} models fall into {} equivalence classes ({} linkage, threshold {})",
        matrix.len(),
        clustering.n_classes,
        linkage,
        threshold
    );

    Ok(clustering)
}
