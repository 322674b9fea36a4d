//! File layout of a run and scoped reading/writing of its artifacts.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PolicyGroupError, Result};
use crate::model::ModelRecord;
use crate::selection::DistanceFile;
use crate::TARGET_IO;

const POLICY_GROUPS_SUFFIX: &str = "_policy_groups";

/// Paths under `<root>/data/<run_name>/`.
#[derive(Debug, Clone)]
pub struct RunLayout {
    run_dir: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl AsRef<Path>, run_name: &str) -> Self {
        Self {
            run_dir: root.as_ref().join("data").join(run_name),
        }
    }

    /// Parent of every `<n>_policy_groups` model folder.
    pub fn models_root(&self) -> PathBuf {
        self.run_dir.join("models")
    }

    pub fn models_dir(&self, n_groups: usize) -> PathBuf {
        self.models_root().join(policy_groups_folder(n_groups))
    }

    pub fn distances_path(&self, n_groups: usize, metric: &str) -> PathBuf {
        self.run_dir
            .join("model_analysis")
            .join("graph_clustering")
            .join(policy_groups_folder(n_groups))
            .join(format!("{}_distances.json", metric))
    }

    pub fn artifact_path(&self, metric: &str, threshold: f64) -> PathBuf {
        self.run_dir
            .join("model_analysis")
            .join("token_models")
            .join(format!(
                "equivalence_class_candidates_{}_{}DT.json",
                metric, threshold
            ))
    }
}

fn policy_groups_folder(n_groups: usize) -> String {
    format!("{}{}", n_groups, POLICY_GROUPS_SUFFIX)
}

/// Reads and validates a model record.
///
/// Parse failures are reported as `MalformedModelRecord` against the file
/// name, since the model id is unknown until the record parses.
pub fn load_record(path: &Path) -> Result<ModelRecord> {
    let file = File::open(path)?;
    let record: ModelRecord = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PolicyGroupError::malformed_record(file_label(path), e.to_string()))?;
    record.validate()?;
    Ok(record)
}

/// Name used for a file in failure reports.
pub fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// JSON files of a directory, sorted by path.
pub fn list_record_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    debug!(
        target: TARGET_IO,
        "Found {} model records in {}",
        files.len(),
        dir.display()
    );
    Ok(files)
}

/// `(n, folder)` for every `<n>_policy_groups` folder, ordered by `n`.
pub fn policy_group_folders(models_root: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(models_root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let n = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(POLICY_GROUPS_SUFFIX))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(n) = n {
            folders.push((n, path));
        }
    }
    folders.sort();
    Ok(folders)
}

pub fn load_distance_file(path: &Path) -> Result<DistanceFile> {
    let file = File::open(path)?;
    let distances = serde_json::from_reader(BufReader::new(file))?;
    debug!(target: TARGET_IO, "Loaded distance matrix from {}", path.display());
    Ok(distances)
}

/// Serialises `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;

    info!(target: TARGET_IO, "Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::tests::record;

    #[test]
    fn test_layout_paths() {
        let layout = RunLayout::new("/srv/project", "energy");
        assert_eq!(
            layout.models_dir(3),
            PathBuf::from("/srv/project/data/energy/models/3_policy_groups")
        );
        assert_eq!(
            layout.distances_path(3, "landscape"),
            PathBuf::from(
                "/srv/project/data/energy/model_analysis/graph_clustering/3_policy_groups/landscape_distances.json"
            )
        );
        assert_eq!(
            layout.artifact_path("landscape", 0.5),
            PathBuf::from(
                "/srv/project/data/energy/model_analysis/token_models/equivalence_class_candidates_landscape_0.5DT.json"
            )
        );
    }

    #[test]
    fn test_record_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");
        let original = record(5, 4, &[("A", &[0, 1])], &[]);

        write_json(&path, &original).unwrap();
        assert_eq!(load_record(&path).unwrap(), original);
        assert_eq!(list_record_files(path.parent().unwrap()).unwrap(), vec![path]);
    }

    #[test]
    fn test_malformed_record_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{"n_items": 3}"#).unwrap();

        match load_record(&path) {
            Err(PolicyGroupError::MalformedModelRecord { model, .. }) => {
                assert_eq!(model, "broken")
            }
            other => panic!("expected malformed record, got {:?}", other),
        }

        let invalid = dir.path().join("invalid.json");
        write_json(&invalid, &record(4, 1, &[("A", &[3])], &[])).unwrap();
        assert!(matches!(
            load_record(&invalid),
            Err(PolicyGroupError::MalformedModelRecord { .. })
        ));
    }

    #[test]
    fn test_policy_group_folders() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10_policy_groups", "2_policy_groups", "notes", "x_policy_groups"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("3_policy_groups"), "file, not folder").unwrap();

        let folders = policy_group_folders(dir.path()).unwrap();
        let counts: Vec<usize> = folders.iter().map(|(n, _)| *n).collect();
        assert_eq!(counts, vec![2, 10]);
    }
}
