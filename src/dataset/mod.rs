//! Raw and cleaned data sets the models were fitted on.

pub mod stats;
pub mod table;

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{PolicyGroupError, Result};

pub use table::{Column, Table};

/// The original data (`raw`) and the model input derived from it (`clean`).
/// Row `i` of both tables is item `i`.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub raw: Table,
    pub clean: Table,
}

impl Dataset {
    pub fn new(raw: Table, clean: Table) -> Result<Self> {
        if clean.n_rows() == 0 {
            return Err(PolicyGroupError::EmptyUniverse);
        }
        if raw.n_rows() != clean.n_rows() {
            return Err(PolicyGroupError::malformed_dataset(format!(
                "raw has {} rows but clean has {}",
                raw.n_rows(),
                clean.n_rows()
            )));
        }
        Ok(Self { raw, clean })
    }

    pub fn from_csv_paths(raw: impl AsRef<Path>, clean: impl AsRef<Path>) -> Result<Self> {
        Dataset::new(Table::from_csv_path(raw)?, Table::from_csv_path(clean)?)
    }

    /// Size of the item universe.
    pub fn n_items(&self) -> usize {
        self.clean.n_rows()
    }

    /// Numeric raw columns that were also used to fit the model, sorted by name.
    pub fn descriptive_columns(&self) -> Vec<String> {
        let clean: BTreeSet<&str> = self
            .clean
            .numeric_columns()
            .into_iter()
            .collect();

        self.raw
            .numeric_columns()
            .into_iter()
            .filter(|name| clean.contains(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptive_columns_intersect_and_sort() {
        let raw = Table::from_csv_reader(
            "name,zeta,alpha,only_raw\nA,1,2,3\nB,4,5,6\n".as_bytes(),
        )
        .unwrap();
        let clean = Table::from_csv_reader("alpha,zeta,only_clean\n0.1,0.2,0.3\n0.4,0.5,0.6\n".as_bytes())
            .unwrap();
        let dataset = Dataset::new(raw, clean).unwrap();
        assert_eq!(dataset.n_items(), 2);
        assert_eq!(
            dataset.descriptive_columns(),
            vec!["alpha".to_string(), "zeta".to_string()]
        );
    }

    #[test]
    fn test_row_counts_must_agree() {
        let raw = Table::from_csv_reader("a\n1\n2\n".as_bytes()).unwrap();
        let clean = Table::from_csv_reader("a\n1\n".as_bytes()).unwrap();
        assert!(matches!(
            Dataset::new(raw, clean),
            Err(PolicyGroupError::MalformedDataset { .. })
        ));

        let raw = Table::from_csv_reader("a\n".as_bytes()).unwrap();
        let clean = Table::from_csv_reader("a\n".as_bytes()).unwrap();
        assert!(matches!(
            Dataset::new(raw, clean),
            Err(PolicyGroupError::EmptyUniverse)
        ));
    }
}
