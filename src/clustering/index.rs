use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::error::{PolicyGroupError, Result};
use crate::model::{Component, GroupId, ItemId, NodeId, UNCLUSTERED};
use crate::TARGET_ANALYSIS;

/// Item, node and group relations of one fitted model.
///
/// Built in one pass over the components. Items that fall into no node are
/// unknown until [`IndexTables::register_unclustered`] adds them as members
/// of the synthetic group -1.
#[derive(Debug, Clone, Default)]
pub struct IndexTables {
    node_of: HashMap<ItemId, BTreeSet<NodeId>>,
    group_of: HashMap<ItemId, BTreeSet<GroupId>>,
    members_of: BTreeMap<GroupId, BTreeMap<NodeId, BTreeSet<ItemId>>>,
    node_items: HashMap<NodeId, BTreeSet<ItemId>>,
    group_items: BTreeMap<GroupId, BTreeSet<ItemId>>,
    unclustered: Option<BTreeSet<ItemId>>,
}

impl IndexTables {
    /// Builds the tables from node membership and the graph's components.
    ///
    /// # Arguments
    /// * `membership` - Items of every node produced by the cover
    /// * `components` - Connected components, each one a policy group
    ///
    /// # Returns
    /// * `Err(UnknownKey)` - A component names a node missing from `membership`
    /// * `Err(OrphanNode)` - A node belongs to no component
    pub fn build(
        membership: &BTreeMap<NodeId, Vec<ItemId>>,
        components: &[Component],
    ) -> Result<Self> {
        let mut tables = IndexTables::default();

        for component in components {
            let group = component.id;
            let members = tables.members_of.entry(group).or_default();
            let group_items = tables.group_items.entry(group).or_default();

            for node in &component.nodes {
                let items = membership
                    .get(node)
                    .ok_or_else(|| PolicyGroupError::unknown_key(node))?;
                let items: BTreeSet<ItemId> = items.iter().copied().collect();

                for &item in &items {
                    tables
                        .node_of
                        .entry(item)
                        .or_default()
                        .insert(node.clone());
                    tables.group_of.entry(item).or_default().insert(group);
                }

                group_items.extend(items.iter().copied());
                tables.node_items.insert(node.clone(), items.clone());
                members.insert(node.clone(), items);
            }
        }

        if let Some(node) = membership
            .keys()
            .find(|node| !tables.node_items.contains_key(*node))
        {
            return Err(PolicyGroupError::OrphanNode { node: node.clone() });
        }

        debug!(
            target: TARGET_ANALYSIS,
            "Indexed {} nodes in {} groups covering {} items",
            tables.node_items.len(),
            tables.members_of.len(),
            tables.node_of.len()
        );

        Ok(tables)
    }

    /// Registers items that fall into no node as group -1.
    ///
    /// Consumes the tables and returns them with the full universe known.
    /// Fails with `ConflictingGroupAssignment` if one of the items already
    /// belongs to a group, naming that group and -1.
    pub fn register_unclustered(mut self, unclustered: &[ItemId]) -> Result<Self> {
        let mut set = BTreeSet::new();

        for &item in unclustered {
            if self.node_of.get(&item).is_some_and(|nodes| !nodes.is_empty()) {
                let first = self
                    .group_of
                    .get(&item)
                    .and_then(|groups| groups.first().copied())
                    .unwrap_or(UNCLUSTERED);
                return Err(PolicyGroupError::ConflictingGroupAssignment {
                    item,
                    first,
                    second: UNCLUSTERED,
                });
            }
            self.node_of.insert(item, BTreeSet::new());
            self.group_of.insert(item, BTreeSet::new());
            set.insert(item);
        }

        self.members_of.insert(UNCLUSTERED, BTreeMap::new());
        self.group_items.insert(UNCLUSTERED, set.clone());
        self.unclustered = Some(set);
        Ok(self)
    }

    /// Groups of an item, excluding the synthetic group -1.
    pub fn groups_of(&self, item: ItemId) -> Result<&BTreeSet<GroupId>> {
        self.group_of
            .get(&item)
            .ok_or(PolicyGroupError::UnknownItem { item })
    }

    pub fn nodes_of(&self, item: ItemId) -> Result<&BTreeSet<NodeId>> {
        self.node_of
            .get(&item)
            .ok_or(PolicyGroupError::UnknownItem { item })
    }

    pub fn items_of_node(&self, node: &str) -> Result<&BTreeSet<ItemId>> {
        self.node_items
            .get(node)
            .ok_or_else(|| PolicyGroupError::unknown_key(node))
    }

    /// Union of the items of the group's nodes.
    pub fn items_of_group(&self, group: GroupId) -> Result<&BTreeSet<ItemId>> {
        self.group_items
            .get(&group)
            .ok_or_else(|| PolicyGroupError::unknown_key(group))
    }

    pub fn nodes_of_group(&self, group: GroupId) -> Result<Vec<&NodeId>> {
        self.members_of
            .get(&group)
            .map(|members| members.keys().collect())
            .ok_or_else(|| PolicyGroupError::unknown_key(group))
    }

    /// Known group ids in ascending order (-1 first once registered).
    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.members_of.keys().copied()
    }

    /// Items registered as unclustered; empty until registration.
    pub fn unclustered(&self) -> Vec<ItemId> {
        self.unclustered
            .as_ref()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of items with an entry in the tables.
    pub fn known_items(&self) -> usize {
        self.node_of.len()
    }

    pub fn max_item(&self) -> Option<ItemId> {
        self.node_of.keys().max().copied()
    }

    /// Nodes of an item without failing on items the cover never saw.
    pub(crate) fn nodes_or_empty(&self, item: ItemId) -> Vec<NodeId> {
        self.node_of
            .get(&item)
            .map(|nodes| nodes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Items recorded against more than one group.
    ///
    /// Components are disjoint, so a non-empty result means the components
    /// handed to [`IndexTables::build`] share nodes' items.
    pub fn items_in_multiple_groups(&self) -> BTreeMap<ItemId, Vec<GroupId>> {
        self.group_of
            .iter()
            .filter(|(_, groups)| groups.len() > 1)
            .map(|(&item, groups)| (item, groups.iter().copied().collect()))
            .collect()
    }

    /// Items covered by more than one node. Expected under an overlapping cover.
    pub fn items_in_multiple_nodes(&self) -> BTreeMap<ItemId, Vec<NodeId>> {
        self.node_of
            .iter()
            .filter(|(_, nodes)| nodes.len() > 1)
            .map(|(&item, nodes)| (item, nodes.iter().cloned().collect()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(nodes: &[(&str, &[ItemId])]) -> BTreeMap<NodeId, Vec<ItemId>> {
        nodes
            .iter()
            .map(|(id, items)| (id.to_string(), items.to_vec()))
            .collect()
    }

    fn component(id: GroupId, nodes: &[&str]) -> Component {
        Component {
            id,
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn scenario() -> IndexTables {
        let m = membership(&[("A", &[0, 1, 2]), ("B", &[2, 3]), ("C", &[4])]);
        let components = vec![component(0, &["A", "B"]), component(1, &["C"])];
        IndexTables::build(&m, &components).unwrap()
    }

    #[test]
    fn test_lookups() {
        let tables = scenario();

        assert_eq!(
            tables.nodes_of(2).unwrap().iter().collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(
            tables.groups_of(2).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(
            tables.items_of_group(0).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(
            tables.items_of_node("B").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(tables.nodes_of_group(1).unwrap(), vec!["C"]);
        assert_eq!(tables.known_items(), 5);
    }

    #[test]
    fn test_unknown_lookups_fail() {
        let tables = scenario();
        assert!(matches!(
            tables.groups_of(5),
            Err(PolicyGroupError::UnknownItem { item: 5 })
        ));
        assert!(matches!(
            tables.items_of_node("Z"),
            Err(PolicyGroupError::UnknownKey { .. })
        ));
        assert!(matches!(
            tables.items_of_group(7),
            Err(PolicyGroupError::UnknownKey { .. })
        ));
        // group -1 only exists after registration
        assert!(tables.items_of_group(UNCLUSTERED).is_err());
    }

    #[test]
    fn test_register_unclustered() {
        let tables = scenario().register_unclustered(&[5]).unwrap();

        assert!(tables.nodes_of(5).unwrap().is_empty());
        assert!(tables.groups_of(5).unwrap().is_empty());
        assert_eq!(
            tables
                .items_of_group(UNCLUSTERED)
                .unwrap()
                .iter()
                .copied()
                .collect::<Vec<_>>(),
            vec![5]
        );
        assert!(tables.nodes_of_group(UNCLUSTERED).unwrap().is_empty());
        assert_eq!(tables.group_ids().collect::<Vec<_>>(), vec![-1, 0, 1]);
        assert_eq!(tables.unclustered(), vec![5]);
    }

    #[test]
    fn test_register_rejects_covered_items() {
        assert!(matches!(
            scenario().register_unclustered(&[2]),
            Err(PolicyGroupError::ConflictingGroupAssignment {
                item: 2,
                first: 0,
                second: UNCLUSTERED
            })
        ));
    }

    #[test]
    fn test_build_preconditions() {
        let m = membership(&[("A", &[0])]);
        assert!(matches!(
            IndexTables::build(&m, &[component(0, &["A", "ghost"])]),
            Err(PolicyGroupError::UnknownKey { .. })
        ));

        let m = membership(&[("A", &[0]), ("B", &[1])]);
        assert!(matches!(
            IndexTables::build(&m, &[component(0, &["A"])]),
            Err(PolicyGroupError::OrphanNode { .. })
        ));
    }

    #[test]
    fn test_overlap_diagnostics() {
        let tables = scenario();
        assert!(tables.items_in_multiple_groups().is_empty());
        let overlaps = tables.items_in_multiple_nodes();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[&2], vec!["A".to_string(), "B".to_string()]);

        // Two components that share a node's items
        let m = membership(&[("A", &[0, 1]), ("B", &[1, 2])]);
        let shared =
            IndexTables::build(&m, &[component(0, &["A"]), component(1, &["B"])]).unwrap();
        let conflicts = shared.items_in_multiple_groups();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[&1], vec![0, 1]);
    }
}
