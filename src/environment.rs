use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::selection::Linkage;

/// Project root holding `data/<Run_Name>/`.
pub const ROOT_VAR: &str = "POLICY_GROUPS_ROOT";

/// Path of the run parameter file.
pub const PARAMS_VAR: &str = "POLICY_GROUPS_PARAMS";

/// Retrieves an environment variable as a path, falling back to `default`.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `default`: Path used when the variable is unset or empty.
///
/// # Returns
/// - `PathBuf`
pub fn get_env_var_as_path(var: &str, default: impl AsRef<Path>) -> PathBuf {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default.as_ref().to_path_buf())
}

/// Project root, from `POLICY_GROUPS_ROOT` or the working directory.
pub fn project_root() -> PathBuf {
    get_env_var_as_path(ROOT_VAR, ".")
}

/// Parameter file, from `POLICY_GROUPS_PARAMS` or `<root>/params.json`.
pub fn params_path(root: &Path) -> PathBuf {
    get_env_var_as_path(PARAMS_VAR, root.join("params.json"))
}

/// Run parameters shared by the pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(rename = "Run_Name")]
    pub run_name: String,
    pub dendrogram_metric: String,
    #[serde(default)]
    pub dendrogram_linkage: Linkage,
    /// Distance threshold for cutting the model dendrogram.
    #[serde(default)]
    pub dendrogram_cut: Option<f64>,
    /// Minimum coverage for models counted in the histogram.
    #[serde(default)]
    pub histogram_coverage: f64,
}

impl Params {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_params_defaults() {
        let params: Params =
            serde_json::from_str(r#"{"Run_Name": "energy", "dendrogram_metric": "landscape"}"#)
                .unwrap();
        assert_eq!(params.run_name, "energy");
        assert_eq!(params.dendrogram_linkage, Linkage::Average);
        assert_eq!(params.dendrogram_cut, None);
        assert_eq!(params.histogram_coverage, 0.0);
    }

    #[test]
    fn test_params_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Run_Name": "r", "dendrogram_metric": "curvature", "dendrogram_linkage": "complete", "dendrogram_cut": 0.4, "histogram_coverage": 0.6}}"#
        )
        .unwrap();
        let params = Params::from_path(file.path()).unwrap();
        assert_eq!(params.dendrogram_linkage, Linkage::Complete);
        assert_eq!(params.dendrogram_cut, Some(0.4));
        assert_eq!(params.histogram_coverage, 0.6);

        assert!(Params::from_path(file.path().with_extension("missing")).is_err());
    }

    #[test]
    fn test_path_fallback() {
        let path = get_env_var_as_path("POLICY_GROUPS_TEST_UNSET_VAR", "fallback");
        assert_eq!(path, PathBuf::from("fallback"));
        assert_eq!(
            params_path(Path::new("/tmp/project")).file_name().unwrap(),
            "params.json"
        );
    }
}
