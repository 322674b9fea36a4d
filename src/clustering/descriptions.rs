use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clustering::index::IndexTables;
use crate::clustering::labels::GroupLabels;
use crate::dataset::{stats, Dataset, Table};
use crate::error::{PolicyGroupError, Result};
use crate::model::{Component, GroupId, ItemId, NodeId, UNCLUSTERED};

/// Spread below this (relative to the mean) counts as a constant column.
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// The most defining column of a node and the node's item count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub label: String,
    pub size: usize,
}

/// Density of node labels within a group, plus the group's item count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub density: BTreeMap<String, f64>,
    pub size: usize,
}

pub(crate) fn is_constant(std: f64, mean: f64) -> bool {
    std <= CONSTANT_TOLERANCE * mean.abs().max(1.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Column on which `rows` are most homogeneous relative to the whole table.
///
/// The score of a column is the population std of its values at `rows`
/// divided by the population std of the full column. Columns that are
/// constant across the table are skipped. Ties keep the earlier column.
pub fn minimal_std_column(table: &Table, rows: &[ItemId], columns: &[String]) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;

    for name in columns {
        let Some(values) = table.numeric(name) else {
            continue;
        };
        let (Some(global_std), Some(global_mean)) =
            (stats::population_std(values), stats::mean(values))
        else {
            continue;
        };
        if is_constant(global_std, global_mean) {
            continue;
        }
        let Some(local_std) = stats::population_std(&stats::values_at(values, rows)) else {
            continue;
        };

        let score = local_std / global_std;
        if best.map_or(true, |(_, current)| score < current) {
            best = Some((name.as_str(), score));
        }
    }

    best.map(|(name, _)| name.to_string())
}

/// Describes every node by its minimal normalised-std column.
pub fn compute_node_descriptions(
    tables: &IndexTables,
    components: &[Component],
    dataset: &Dataset,
) -> Result<BTreeMap<NodeId, NodeDescription>> {
    let columns = dataset.descriptive_columns();
    let mut descriptions = BTreeMap::new();

    for node in components.iter().flat_map(|c| c.nodes.iter()) {
        let items: Vec<ItemId> = tables.items_of_node(node)?.iter().copied().collect();
        let label = minimal_std_column(&dataset.clean, &items, &columns)
            .ok_or_else(|| PolicyGroupError::NoDescriptiveColumns { node: node.clone() })?;

        descriptions.insert(
            node.clone(),
            NodeDescription {
                label,
                size: items.len(),
            },
        );
    }

    Ok(descriptions)
}

/// Aggregates node descriptions into a label density per group.
///
/// Nodes sharing a label add their sizes; densities are relative to the
/// summed node sizes of the group and rounded to two decimals. Unclustered
/// items get a single-label description only when there are any.
pub fn compute_group_descriptions(
    components: &[Component],
    node_descriptions: &BTreeMap<NodeId, NodeDescription>,
    group_labels: &GroupLabels,
    dataset: &Dataset,
) -> Result<BTreeMap<GroupId, GroupDescription>> {
    let mut descriptions = BTreeMap::new();

    for component in components {
        let mut holder: BTreeMap<&str, usize> = BTreeMap::new();
        let mut total = 0usize;

        for node in &component.nodes {
            let description = node_descriptions
                .get(node)
                .ok_or_else(|| PolicyGroupError::unknown_key(node))?;
            total += description.size;
            *holder.entry(description.label.as_str()).or_default() += description.size;
        }

        let density = if total == 0 {
            BTreeMap::new()
        } else {
            holder
                .into_iter()
                .map(|(label, size)| (label.to_string(), round2(size as f64 / total as f64)))
                .collect()
        };

        descriptions.insert(
            component.id,
            GroupDescription {
                density,
                size: group_labels.sizes.get(&component.id).copied().unwrap_or(0),
            },
        );
    }

    let unclustered = group_labels
        .members
        .get(&UNCLUSTERED)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if !unclustered.is_empty() {
        let label = minimal_std_column(
            &dataset.clean,
            unclustered,
            &dataset.descriptive_columns(),
        )
        .ok_or_else(|| PolicyGroupError::NoDescriptiveColumns {
            node: "unclustered".to_string(),
        })?;

        descriptions.insert(
            UNCLUSTERED,
            GroupDescription {
                density: BTreeMap::from([(label, 1.0)]),
                size: unclustered.len(),
            },
        );
    }

    Ok(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_minimal_std_prefers_homogeneous_column() {
        // rows 0 and 1 agree on `age` but differ on `capacity`
        let t = table("age,capacity\n10,100\n10,900\n50,500\n90,300\n");
        let columns = vec!["age".to_string(), "capacity".to_string()];
        assert_eq!(
            minimal_std_column(&t, &[0, 1], &columns),
            Some("age".to_string())
        );
        assert_eq!(
            minimal_std_column(&t, &[2, 3], &columns),
            Some("capacity".to_string())
        );
    }

    #[test]
    fn test_minimal_std_ties_and_constants() {
        let t = table("a,b,flat\n1,1,5\n2,2,5\n3,3,5\n");
        let columns = vec!["a".to_string(), "b".to_string(), "flat".to_string()];
        // single row: every score is zero, first column wins
        assert_eq!(minimal_std_column(&t, &[1], &columns), Some("a".to_string()));
        // constant column alone is never usable
        assert_eq!(minimal_std_column(&t, &[0, 1], &["flat".to_string()]), None);
    }

    #[test]
    fn test_group_density_adds_shared_labels() {
        let components = vec![Component {
            id: 0,
            nodes: vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
        }];
        let nodes = BTreeMap::from([
            ("n1".to_string(), NodeDescription { label: "age".to_string(), size: 2 }),
            ("n2".to_string(), NodeDescription { label: "age".to_string(), size: 1 }),
            ("n3".to_string(), NodeDescription { label: "capacity".to_string(), size: 3 }),
        ]);
        let labels = GroupLabels {
            labels: vec![0; 5],
            members: BTreeMap::from([(0, vec![0, 1, 2, 3, 4]), (UNCLUSTERED, vec![])]),
            sizes: BTreeMap::from([(0, 5), (UNCLUSTERED, 0)]),
        };
        let dataset = Dataset::new(
            table("age,capacity\n1,2\n2,3\n3,4\n4,5\n5,7\n"),
            table("age,capacity\n1,2\n2,3\n3,4\n4,5\n5,7\n"),
        )
        .unwrap();

        let groups = compute_group_descriptions(&components, &nodes, &labels, &dataset).unwrap();
        let density = &groups[&0].density;
        assert_eq!(density["age"], 0.5);
        assert_eq!(density["capacity"], 0.5);
        assert_eq!(groups[&0].size, 5);
        assert!(!groups.contains_key(&UNCLUSTERED));
    }
}
