use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::clustering::index::IndexTables;
use crate::error::{PolicyGroupError, Result};
use crate::model::{Component, GroupId, ItemId, NodeId, UNCLUSTERED};
use crate::TARGET_ANALYSIS;

/// Node membership of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NodeLabel {
    Nodes(Vec<NodeId>),
    Unclustered,
}

/// Per-item node labels plus the items no node covers.
#[derive(Debug, Clone, Default)]
pub struct NodeLabels {
    pub labels: Vec<NodeLabel>,
    pub unclustered: Vec<ItemId>,
}

/// Dense group labels and the resulting group membership.
#[derive(Debug, Clone, Default)]
pub struct GroupLabels {
    /// Group of every item, `-1` for unclustered ones.
    pub labels: Vec<GroupId>,
    /// Items of every group, including `-1`.
    pub members: BTreeMap<GroupId, Vec<ItemId>>,
    pub sizes: BTreeMap<GroupId, usize>,
}

/// Labels every item of a universe of `n_items` with the nodes covering it.
///
/// This is the only place unclustered items are discovered, so it has to
/// run before [`label_items_by_group`].
pub fn label_items_by_node(tables: &IndexTables, n_items: usize) -> Result<NodeLabels> {
    if n_items == 0 {
        return Err(PolicyGroupError::EmptyUniverse);
    }
    if let Some(item) = tables.max_item().filter(|&item| item >= n_items) {
        return Err(PolicyGroupError::UnknownItem { item });
    }

    let mut result = NodeLabels {
        labels: Vec::with_capacity(n_items),
        unclustered: Vec::new(),
    };

    for item in 0..n_items {
        let nodes = tables.nodes_or_empty(item);
        if nodes.is_empty() {
            result.labels.push(NodeLabel::Unclustered);
            result.unclustered.push(item);
        } else {
            result.labels.push(NodeLabel::Nodes(nodes));
        }
    }

    debug!(
        target: TARGET_ANALYSIS,
        "{} of {} items fall into no node",
        result.unclustered.len(),
        n_items
    );

    Ok(result)
}

/// Labels every item with the group (component) its nodes belong to.
///
/// Components are disjoint, so an item claimed by two components means the
/// input is inconsistent: labelling stops with `ConflictingGroupAssignment`
/// instead of letting the later component overwrite the earlier one.
pub fn label_items_by_group(
    tables: &IndexTables,
    components: &[Component],
    node_labels: &NodeLabels,
) -> Result<GroupLabels> {
    let n_items = node_labels.labels.len();
    let mut labels = vec![UNCLUSTERED; n_items];
    let mut members = BTreeMap::new();
    let mut sizes = BTreeMap::new();

    for component in components {
        let items = tables.items_of_group(component.id)?;

        for &item in items {
            let slot = labels
                .get_mut(item)
                .ok_or(PolicyGroupError::UnknownItem { item })?;
            if *slot != UNCLUSTERED && *slot != component.id {
                return Err(PolicyGroupError::ConflictingGroupAssignment {
                    item,
                    first: *slot,
                    second: component.id,
                });
            }
            *slot = component.id;
        }

        sizes.insert(component.id, items.len());
        members.insert(component.id, items.iter().copied().collect());
    }

    sizes.insert(UNCLUSTERED, node_labels.unclustered.len());
    members.insert(UNCLUSTERED, node_labels.unclustered.clone());

    Ok(GroupLabels {
        labels,
        members,
        sizes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(nodes: &[(&str, &[ItemId])], groups: &[&[&str]]) -> (IndexTables, Vec<Component>) {
        let membership: BTreeMap<NodeId, Vec<ItemId>> = nodes
            .iter()
            .map(|(id, items)| (id.to_string(), items.to_vec()))
            .collect();
        let components: Vec<Component> = groups
            .iter()
            .enumerate()
            .map(|(i, nodes)| Component {
                id: i as GroupId,
                nodes: nodes.iter().map(|n| n.to_string()).collect(),
            })
            .collect();
        (IndexTables::build(&membership, &components).unwrap(), components)
    }

    #[test]
    fn test_node_labels_mark_unclustered() {
        let (t, _) = tables(&[("A", &[0, 1, 2]), ("B", &[2, 3]), ("C", &[4])], &[&["A", "B"], &["C"]]);
        let labels = label_items_by_node(&t, 6).unwrap();

        assert_eq!(labels.unclustered, vec![5]);
        assert_eq!(labels.labels[5], NodeLabel::Unclustered);
        assert_eq!(
            labels.labels[2],
            NodeLabel::Nodes(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_node_labels_reject_bad_universe() {
        let (t, _) = tables(&[("A", &[0, 7])], &[&["A"]]);
        assert!(matches!(
            label_items_by_node(&t, 0),
            Err(PolicyGroupError::EmptyUniverse)
        ));
        assert!(matches!(
            label_items_by_node(&t, 1),
            Err(PolicyGroupError::UnknownItem { item: 7 })
        ));
    }

    #[test]
    fn test_group_labels_partition_items() {
        let (t, components) =
            tables(&[("A", &[0, 1, 2]), ("B", &[2, 3]), ("C", &[4])], &[&["A", "B"], &["C"]]);
        let node_labels = label_items_by_node(&t, 6).unwrap();
        let groups = label_items_by_group(&t, &components, &node_labels).unwrap();

        assert_eq!(groups.labels, vec![0, 0, 0, 0, 1, -1]);
        assert_eq!(groups.sizes[&0], 4);
        assert_eq!(groups.sizes[&1], 1);
        assert_eq!(groups.sizes[&-1], 1);
        assert_eq!(groups.sizes.values().sum::<usize>(), 6);
        assert_eq!(groups.members[&-1], vec![5]);
    }

    #[test]
    fn test_conflicting_components_fail_fast() {
        let (t, components) = tables(&[("A", &[0, 1]), ("B", &[1, 2])], &[&["A"], &["B"]]);
        let node_labels = label_items_by_node(&t, 3).unwrap();

        match label_items_by_group(&t, &components, &node_labels) {
            Err(PolicyGroupError::ConflictingGroupAssignment {
                item,
                first,
                second,
            }) => {
                assert_eq!(item, 1);
                assert_eq!(first, 0);
                assert_eq!(second, 1);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
