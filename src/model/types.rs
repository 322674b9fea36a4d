use serde::{Deserialize, Serialize};

/// Row index of an item in the original data set.
pub type ItemId = usize;

/// Node identifier assigned by the cover step (e.g. `cube3_cluster0`).
pub type NodeId = String;

/// Policy group id: the position of a connected component.
pub type GroupId = i64;

/// Id derived from a model's hyperparameters.
pub type ModelId = String;

/// Equivalence class id assigned by model-distance clustering.
pub type ClassId = usize;

/// Synthetic group holding items that fall into no node.
pub const UNCLUSTERED: GroupId = -1;

/// A connected component of the node graph, i.e. one policy group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: GroupId,
    pub nodes: Vec<NodeId>,
}
