use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::error::{PolicyGroupError, Result};
use crate::model::ItemId;

/// A single column of a table. Missing numeric cells are stored as NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(&self, rows: &[ItemId]) -> Column {
        match self {
            Column::Numeric(values) => Column::Numeric(rows.iter().map(|&r| values[r]).collect()),
            Column::Text(values) => Column::Text(rows.iter().map(|&r| values[r].clone()).collect()),
        }
    }
}

/// Column-oriented table with named columns in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Builds a table, checking that names are unique and lengths agree.
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, c)| c.len());
        let mut seen = BTreeSet::new();

        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(PolicyGroupError::malformed_dataset(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
            if column.len() != n_rows {
                return Err(PolicyGroupError::malformed_dataset(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    column.len(),
                    n_rows
                )));
            }
        }

        let (names, columns) = columns.into_iter().unzip();
        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.columns[idx])
    }

    /// Values of a numeric column, or `None` for text or missing columns.
    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Some(values),
            _ => None,
        }
    }

    /// Names of numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| matches!(c, Column::Numeric(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Sub-table holding only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[ItemId]) -> Result<Table> {
        if let Some(&row) = rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(PolicyGroupError::UnknownItem { item: row });
        }

        Ok(Table {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            n_rows: rows.len(),
        })
    }

    /// Reads a CSV with a header row.
    ///
    /// A column is numeric when every non-empty cell parses as a float;
    /// empty cells in numeric columns become NaN.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for record in csv_reader.records() {
            let record = record?;
            for (idx, cell) in record.iter().enumerate().take(headers.len()) {
                cells[idx].push(cell.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| (name, infer_column(values)))
            .collect();

        Table::new(columns)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Table> {
        let file = std::fs::File::open(path)?;
        Table::from_csv_reader(file)
    }
}

fn infer_column(values: Vec<String>) -> Column {
    let numeric = values
        .iter()
        .filter(|v| !v.is_empty())
        .all(|v| v.parse::<f64>().is_ok());

    if numeric {
        Column::Numeric(
            values
                .iter()
                .map(|v| v.parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        )
    } else {
        Column::Text(values)
    }
}
