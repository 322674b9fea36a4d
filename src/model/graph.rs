use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::model::types::{ItemId, NodeId};

/// Node membership and adjacency of a fitted Mapper graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapperGraph {
    pub nodes: BTreeMap<NodeId, Vec<ItemId>>,
    #[serde(default)]
    pub edges: Vec<(NodeId, NodeId)>,
}

impl MapperGraph {
    /// Connected components of the node graph.
    ///
    /// Components are ordered by their smallest node id and list their nodes
    /// in sorted order, so the same graph always yields the same group ids.
    /// Edges naming unknown nodes are ignored; callers validate them first.
    pub fn connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = self
            .nodes
            .keys()
            .map(|node| (node.as_str(), BTreeSet::new()))
            .collect();

        for (a, b) in &self.edges {
            if !self.nodes.contains_key(a) || !self.nodes.contains_key(b) {
                continue;
            }
            adjacency.entry(a.as_str()).or_default().insert(b.as_str());
            adjacency.entry(b.as_str()).or_default().insert(a.as_str());
        }

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.nodes.keys() {
            if seen.contains(start.as_str()) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start.as_str()]);
            seen.insert(start.as_str());

            while let Some(node) = queue.pop_front() {
                component.insert(node);
                if let Some(neighbours) = adjacency.get(node) {
                    for &next in neighbours {
                        if seen.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
            }

            components.push(component.into_iter().map(str::to_string).collect());
        }

        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[(&str, &[ItemId])], edges: &[(&str, &str)]) -> MapperGraph {
        MapperGraph {
            nodes: nodes
                .iter()
                .map(|(id, items)| (id.to_string(), items.to_vec()))
                .collect(),
            edges: edges
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_components_follow_edges() {
        let g = graph(
            &[("A", &[0, 1, 2]), ("B", &[2, 3]), ("C", &[4])],
            &[("A", "B")],
        );
        assert_eq!(
            g.connected_components(),
            vec![vec!["A".to_string(), "B".to_string()], vec!["C".to_string()]]
        );
    }

    #[test]
    fn test_components_are_ordered_by_smallest_node() {
        let g = graph(
            &[("a", &[0]), ("b", &[1]), ("c", &[2]), ("d", &[3])],
            &[("d", "a"), ("c", "b")],
        );
        let components = g.connected_components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], vec!["a".to_string(), "d".to_string()]);
        assert_eq!(components[1], vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_edges_to_unknown_nodes_are_ignored() {
        let g = graph(&[("A", &[0])], &[("A", "ghost")]);
        assert_eq!(g.connected_components(), vec![vec!["A".to_string()]]);
    }
}
