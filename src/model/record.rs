use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{PolicyGroupError, Result};
use crate::model::graph::MapperGraph;
use crate::model::hyperparameters::Hyperparameters;
use crate::model::types::{Component, GroupId, ModelId, NodeId};

/// Topological signature computed upstream; carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Ollivier-Ricci edge curvatures.
    #[serde(default)]
    pub curvature: Vec<f64>,
    /// Persistence diagram per homology dimension, as (birth, death) pairs.
    #[serde(default)]
    pub diagram: Vec<Vec<[f64; 2]>>,
}

/// A fitted Mapper model: hyperparameters, graph and signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub hyperparameters: Hyperparameters,
    /// Size of the item universe the model was fitted on.
    pub n_items: usize,
    #[serde(flatten)]
    pub graph: MapperGraph,
    /// Ordered node lists; derived from the edges when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Vec<NodeId>>>,
    #[serde(default)]
    pub signature: Signature,
}

impl ModelRecord {
    pub fn id(&self) -> ModelId {
        self.hyperparameters.model_id()
    }

    /// Policy groups of this model, numbered by position.
    pub fn components(&self) -> Vec<Component> {
        let node_lists = match &self.components {
            Some(lists) => lists.clone(),
            None => self.graph.connected_components(),
        };

        node_lists
            .into_iter()
            .enumerate()
            .map(|(position, nodes)| Component {
                id: position as GroupId,
                nodes,
            })
            .collect()
    }

    /// Checks the record's internal consistency after loading.
    pub fn validate(&self) -> Result<()> {
        let id = self.id();

        if self.n_items == 0 {
            return Err(PolicyGroupError::malformed_record(id, "n_items is zero"));
        }

        for (node, items) in &self.graph.nodes {
            if let Some(&item) = items.iter().find(|&&item| item >= self.n_items) {
                return Err(PolicyGroupError::malformed_record(
                    id,
                    format!(
                        "node '{}' references item {} outside universe of {}",
                        node, item, self.n_items
                    ),
                ));
            }
        }

        for (a, b) in &self.graph.edges {
            for node in [a, b] {
                if !self.graph.nodes.contains_key(node) {
                    return Err(PolicyGroupError::malformed_record(
                        id,
                        format!("edge references unknown node '{}'", node),
                    ));
                }
            }
        }

        if let Some(lists) = &self.components {
            let mut claimed = BTreeSet::new();
            for node in lists.iter().flatten() {
                if !self.graph.nodes.contains_key(node) {
                    return Err(PolicyGroupError::malformed_record(
                        id,
                        format!("component references unknown node '{}'", node),
                    ));
                }
                if !claimed.insert(node) {
                    return Err(PolicyGroupError::malformed_record(
                        id,
                        format!("node '{}' listed in more than one component", node),
                    ));
                }
            }
        }

        Ok(())
    }
}
