//! Batch selection: label every model in parallel, cluster, pick representatives.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, info, warn};

use crate::clustering::ClusterAnalyzer;
use crate::error::{PolicyGroupError, Result};
use crate::model::{ClassId, ModelId, ModelRecord};
use crate::selection::agglomerative::cluster_models;
use crate::selection::distance::DistanceMatrix;
use crate::selection::linkage::Linkage;
use crate::selection::representative::select_representatives;
use crate::store::{self, RunLayout};
use crate::TARGET_SELECTION;

/// What to select and how.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub metric: String,
    pub n_groups: usize,
    pub linkage: Linkage,
    /// Overrides the threshold stored with the distance matrix.
    pub threshold: Option<f64>,
}

/// A model the batch could not use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub model_id: String,
    pub reason: String,
}

/// Representative of one class, with the full record for downstream stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedModel {
    pub model_id: ModelId,
    pub coverage: f64,
    pub class_size: usize,
    pub members: Vec<ModelId>,
    pub record: ModelRecord,
}

/// Output of one selection run, written as a single JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionArtifact {
    pub metric: String,
    pub linkage: Linkage,
    pub distance_threshold: f64,
    pub n_groups: usize,
    pub created_at: String,
    pub representatives: BTreeMap<ClassId, SelectedModel>,
    pub failures: Vec<Failure>,
}

/// A record that loaded and labelled cleanly.
struct Labelled {
    record: ModelRecord,
    coverage: f64,
}

/// Result of labelling one file. A failure names the model once its record
/// parses, and the file otherwise.
type LabelOutcome = std::result::Result<Labelled, Failure>;

fn label_file(path: &Path) -> LabelOutcome {
    let record = store::load_record(path).map_err(|e| {
        let model_id = match &e {
            PolicyGroupError::MalformedModelRecord { model, .. } => model.clone(),
            _ => store::file_label(path),
        };
        Failure {
            model_id,
            reason: e.to_string(),
        }
    })?;

    match ClusterAnalyzer::label(&record) {
        Ok(labeling) => Ok(Labelled {
            coverage: labeling.coverage(),
            record,
        }),
        Err(e) => Err(Failure {
            model_id: record.id(),
            reason: e.to_string(),
        }),
    }
}

async fn label_files(paths: Vec<PathBuf>) -> (BTreeMap<ModelId, Labelled>, Vec<Failure>) {
    label_files_with(paths, label_file).await
}

/// Labels every file on the blocking pool, then collects the results in
/// path order.
///
/// Returns the successfully labelled records by model id and one failure
/// per file that could not be used. When two files hold the same model, the
/// one with the lower path is kept.
async fn label_files_with(
    mut paths: Vec<PathBuf>,
    label: fn(&Path) -> LabelOutcome,
) -> (BTreeMap<ModelId, Labelled>, Vec<Failure>) {
    paths.sort();
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let task_path = path.clone();
            (path, task::spawn_blocking(move || label(&task_path)))
        })
        .collect();

    let mut labelled = BTreeMap::new();
    let mut failures = Vec::new();

    for (path, handle) in handles {
        match handle.await {
            Ok(Ok(model)) => {
                let id = model.record.id();
                if labelled.contains_key(&id) {
                    warn!(
                        target: TARGET_SELECTION,
                        "Duplicate record for {} in {}; keeping the earlier file",
                        id,
                        path.display()
                    );
                    continue;
                }
                labelled.insert(id, model);
            }
            Ok(Err(failure)) => {
                warn!(target: TARGET_SELECTION, "Skipping {}: {}", path.display(), failure.reason);
                failures.push(failure);
            }
            Err(e) => {
                warn!(target: TARGET_SELECTION, "Labelling {} failed: {}", path.display(), e);
                failures.push(Failure {
                    model_id: store::file_label(&path),
                    reason: format!("labelling task failed: {}", e),
                });
            }
        }
    }

    failures.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    (labelled, failures)
}

/// Selects one representative per structural equivalence class.
///
/// Models that fail to load or label are recorded in `failures` and left
/// out of the distance matrix instead of aborting the run. Models listed in
/// the matrix without a record, or only a failed one, are reported once.
///
/// # Arguments
/// * `config` - Metric, linkage and threshold
/// * `matrix` - Distances over every candidate model
/// * `threshold` - Dendrogram cut
/// * `record_paths` - Model record files
///
/// # Returns
/// * `Err(EmptyInputSet)` - Fewer than two usable models remain
pub async fn run_batch(
    config: &BatchConfig,
    matrix: DistanceMatrix,
    threshold: f64,
    record_paths: Vec<PathBuf>,
) -> Result<SelectionArtifact> {
    let (mut labelled, mut failures) = label_files(record_paths).await;

    let mut usable = Vec::new();
    for id in matrix.model_ids() {
        if labelled.contains_key(id) {
            usable.push(id.clone());
        } else if !failures.iter().any(|f| &f.model_id == id) {
            failures.push(Failure {
                model_id: id.clone(),
                reason: "no model record found".to_string(),
            });
        }
    }
    for id in labelled.keys().filter(|id| matrix.index_of(id).is_none()) {
        debug!(target: TARGET_SELECTION, "{} is not in the distance matrix", id);
    }

    if usable.len() < 2 {
        return Err(PolicyGroupError::EmptyInputSet {
            actual: usable.len(),
        });
    }
    let matrix = if usable.len() == matrix.len() {
        matrix
    } else {
        matrix.restrict(&usable)?
    };

    let clustering = cluster_models(&matrix, config.linkage, threshold)?;
    let classes = clustering.classes();
    let coverage: BTreeMap<ModelId, f64> = usable
        .iter()
        .filter_map(|id| labelled.get(id).map(|m| (id.clone(), m.coverage)))
        .collect();
    let selected = select_representatives(&classes, &coverage)?;

    let mut representatives = BTreeMap::new();
    for (class, representative) in selected {
        let record = labelled
            .remove(&representative.model_id)
            .map(|m| m.record)
            .ok_or_else(|| PolicyGroupError::unknown_key(&representative.model_id))?;
        representatives.insert(
            class,
            SelectedModel {
                members: classes.get(&class).cloned().unwrap_or_default(),
                model_id: representative.model_id,
                coverage: representative.coverage,
                class_size: representative.class_size,
                record,
            },
        );
    }

    info!(
        target: TARGET_SELECTION,
        "Selected {} representatives from {} models ({} failed)",
        representatives.len(),
        usable.len(),
        failures.len()
    );

    Ok(SelectionArtifact {
        metric: config.metric.clone(),
        linkage: config.linkage,
        distance_threshold: threshold,
        n_groups: config.n_groups,
        created_at: Utc::now().to_rfc3339(),
        representatives,
        failures,
    })
}

/// Runs a selection over the `<n>_policy_groups` folder of a run and writes
/// the artifact next to the other token-model outputs.
///
/// The threshold comes from `config`, or else from the distance file.
pub async fn select_and_persist(
    layout: &RunLayout,
    config: &BatchConfig,
) -> Result<(PathBuf, SelectionArtifact)> {
    let distance_file = store::load_distance_file(&layout.distances_path(config.n_groups, &config.metric))?;
    let threshold = config
        .threshold
        .or(distance_file.distance_threshold)
        .ok_or_else(|| PolicyGroupError::MissingThreshold {
            metric: config.metric.clone(),
        })?;
    let matrix = DistanceMatrix::try_from(distance_file)?;
    let record_paths = store::list_record_files(&layout.models_dir(config.n_groups))?;

    let artifact = run_batch(config, matrix, threshold, record_paths).await?;
    let path = layout.artifact_path(&config.metric, threshold);
    store::write_json(&path, &artifact)?;

    Ok((path, artifact))
}

/// Number of models per policy-group count whose coverage reaches
/// `coverage_filter`. Records that fail to load are skipped.
pub async fn coverage_histogram(
    models_root: &Path,
    coverage_filter: f64,
) -> Result<BTreeMap<usize, usize>> {
    let mut histogram = BTreeMap::new();

    for (n, folder) in store::policy_group_folders(models_root)? {
        let (labelled, failures) = label_files(store::list_record_files(&folder)?).await;
        let count = labelled
            .values()
            .filter(|m| m.coverage >= coverage_filter)
            .count();
        if !failures.is_empty() {
            warn!(
                target: TARGET_SELECTION,
                "{} unreadable records in {}",
                failures.len(),
                folder.display()
            );
        }
        histogram.insert(n, count);
    }

    Ok(histogram)
}
