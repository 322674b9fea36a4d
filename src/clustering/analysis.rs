use std::collections::BTreeMap;
use tracing::info;

use crate::clustering::descriptions::{
    compute_group_descriptions, compute_node_descriptions, GroupDescription, NodeDescription,
};
use crate::clustering::index::IndexTables;
use crate::clustering::labels::{label_items_by_group, label_items_by_node, GroupLabels, NodeLabels};
use crate::clustering::matching::{target_matching, MatchOptions, MatchReport, TargetRecord};
use crate::clustering::zscore::{compute_zscores, group_identifiers, ZScoreTable};
use crate::dataset::{Dataset, Table};
use crate::error::{PolicyGroupError, Result};
use crate::model::{Component, GroupId, ItemId, ModelId, ModelRecord, NodeId, UNCLUSTERED};
use crate::TARGET_ANALYSIS;

/// Index tables and item labels of one model.
///
/// This is everything that can be derived from the record alone, which is
/// all the batch run needs to compute coverage.
#[derive(Debug, Clone)]
pub struct Labeling {
    pub components: Vec<Component>,
    pub tables: IndexTables,
    pub node_labels: NodeLabels,
    pub group_labels: GroupLabels,
}

impl Labeling {
    /// Fraction of items assigned to some group.
    pub fn coverage(&self) -> f64 {
        let n = self.node_labels.labels.len();
        if n == 0 {
            return 0.0;
        }
        1.0 - self.node_labels.unclustered.len() as f64 / n as f64
    }
}

/// Entry point of the per-model analysis.
pub struct ClusterAnalyzer;

impl ClusterAnalyzer {
    /// Validates a record and builds its index tables without labelling.
    ///
    /// Labelling fails on an item claimed by two groups; the tables built
    /// here still hold both claims, so `items_in_multiple_groups` can report
    /// them.
    pub fn index(record: &ModelRecord) -> Result<(Vec<Component>, IndexTables)> {
        record.validate()?;

        let components = record.components();
        let tables = IndexTables::build(&record.graph.nodes, &components)?;
        Ok((components, tables))
    }

    /// Validates a record and labels its items by node and by group.
    pub fn label(record: &ModelRecord) -> Result<Labeling> {
        let (components, tables) = ClusterAnalyzer::index(record)?;
        let node_labels = label_items_by_node(&tables, record.n_items)?;
        let tables = tables.register_unclustered(&node_labels.unclustered)?;
        let group_labels = label_items_by_group(&tables, &components, &node_labels)?;

        Ok(Labeling {
            components,
            tables,
            node_labels,
            group_labels,
        })
    }

    /// Runs the full analysis of a record against the data set it was fitted on.
    ///
    /// # Arguments
    /// * `record` - Fitted model
    /// * `dataset` - Raw and cleaned data; row `i` is item `i`
    ///
    /// # Returns
    /// * `Ok(ClusterAnalysis)` - Labels, descriptions and z-scores, computed once
    /// * `Err(DimensionMismatch)` - The record and the data set disagree on N
    pub fn analyze<'a>(record: &ModelRecord, dataset: &'a Dataset) -> Result<ClusterAnalysis<'a>> {
        if record.n_items != dataset.n_items() {
            return Err(PolicyGroupError::DimensionMismatch {
                expected: dataset.n_items(),
                actual: record.n_items,
            });
        }

        let labeling = ClusterAnalyzer::label(record)?;
        let node_descriptions =
            compute_node_descriptions(&labeling.tables, &labeling.components, dataset)?;
        let group_descriptions = compute_group_descriptions(
            &labeling.components,
            &node_descriptions,
            &labeling.group_labels,
            dataset,
        )?;
        let zscores = compute_zscores(&dataset.raw, &labeling.group_labels);

        let analysis = ClusterAnalysis {
            model_id: record.id(),
            dataset,
            labeling,
            node_descriptions,
            group_descriptions,
            zscores,
        };

        info!(
            target: TARGET_ANALYSIS,
            "Analysed {}: {} groups, coverage {:.3}",
            analysis.model_id,
            analysis.labeling.components.len(),
            analysis.coverage()
        );

        Ok(analysis)
    }
}

/// Immutable result of analysing one model.
#[derive(Debug, Clone)]
pub struct ClusterAnalysis<'a> {
    pub model_id: ModelId,
    dataset: &'a Dataset,
    labeling: Labeling,
    node_descriptions: BTreeMap<NodeId, NodeDescription>,
    group_descriptions: BTreeMap<GroupId, GroupDescription>,
    zscores: ZScoreTable,
}

impl<'a> ClusterAnalysis<'a> {
    pub fn tables(&self) -> &IndexTables {
        &self.labeling.tables
    }

    pub fn components(&self) -> &[Component] {
        &self.labeling.components
    }

    pub fn node_labels(&self) -> &NodeLabels {
        &self.labeling.node_labels
    }

    pub fn group_labels(&self) -> &GroupLabels {
        &self.labeling.group_labels
    }

    pub fn coverage(&self) -> f64 {
        self.labeling.coverage()
    }

    pub fn unclustered_items(&self) -> &[ItemId] {
        &self.labeling.node_labels.unclustered
    }

    /// Item count per group, including -1.
    pub fn group_sizes(&self) -> &BTreeMap<GroupId, usize> {
        &self.labeling.group_labels.sizes
    }

    pub fn group_members(&self) -> &BTreeMap<GroupId, Vec<ItemId>> {
        &self.labeling.group_labels.members
    }

    pub fn node_descriptions(&self) -> &BTreeMap<NodeId, NodeDescription> {
        &self.node_descriptions
    }

    pub fn group_descriptions(&self) -> &BTreeMap<GroupId, GroupDescription> {
        &self.group_descriptions
    }

    pub fn zscores(&self) -> &ZScoreTable {
        &self.zscores
    }

    pub fn group_identifiers(
        &self,
        zscore_threshold: f64,
        std_threshold: f64,
    ) -> BTreeMap<GroupId, Vec<String>> {
        group_identifiers(
            &self.zscores,
            &self.dataset.raw,
            &self.labeling.group_labels,
            zscore_threshold,
            std_threshold,
        )
    }

    pub fn target_matching(
        &self,
        target: &TargetRecord,
        options: &MatchOptions,
    ) -> Result<MatchReport> {
        target_matching(target, &self.dataset.raw, &self.labeling.group_labels, options)
    }

    pub fn items_in_multiple_nodes(&self) -> BTreeMap<ItemId, Vec<NodeId>> {
        self.labeling.tables.items_in_multiple_nodes()
    }

    /// Raw rows of a group's items.
    pub fn group_frame(&self, group: GroupId) -> Result<Table> {
        let members = self
            .labeling
            .group_labels
            .members
            .get(&group)
            .ok_or_else(|| PolicyGroupError::unknown_key(group))?;
        self.dataset.raw.select_rows(members)
    }

    /// Raw rows of a node's items.
    pub fn node_frame(&self, node: &str) -> Result<Table> {
        let items: Vec<ItemId> = self
            .labeling
            .tables
            .items_of_node(node)?
            .iter()
            .copied()
            .collect();
        self.dataset.raw.select_rows(&items)
    }

    /// Raw rows of items no node covers.
    pub fn unclustered_frame(&self) -> Result<Table> {
        self.group_frame(UNCLUSTERED)
    }
}
