use std::collections::BTreeMap;

use crate::clustering::{ClusterAnalyzer, MatchOptions, TargetRecord};
use crate::dataset::{Dataset, Table};
use crate::error::PolicyGroupError;
use crate::model::record::tests::record;
use crate::model::{ModelRecord, UNCLUSTERED};

fn dataset() -> Dataset {
    let raw = Table::from_csv_reader(
        "name,age,capacity\n\
         p0,10,100\n\
         p1,12,500\n\
         p2,11,900\n\
         p3,40,300\n\
         p4,70,50\n\
         p5,30,20\n"
            .as_bytes(),
    )
    .unwrap();
    let clean = Table::from_csv_reader(
        "age,capacity\n\
         0.10,0.100\n\
         0.12,0.500\n\
         0.11,0.900\n\
         0.40,0.300\n\
         0.70,0.050\n\
         0.30,0.020\n"
            .as_bytes(),
    )
    .unwrap();
    Dataset::new(raw, clean).unwrap()
}

/// Nodes A={0,1,2}, B={2,3}, C={4}; A-B connected; item 5 in no node.
fn scenario() -> ModelRecord {
    record(
        4,
        6,
        &[("A", &[0, 1, 2]), ("B", &[2, 3]), ("C", &[4])],
        &[("A", "B")],
    )
}

#[test]
fn test_end_to_end_groups() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();

    assert_eq!(analysis.group_members()[&0], vec![0, 1, 2, 3]);
    assert_eq!(analysis.group_members()[&1], vec![4]);
    assert_eq!(analysis.group_members()[&UNCLUSTERED], vec![5]);
    assert_eq!(
        analysis.group_sizes(),
        &BTreeMap::from([(-1, 1), (0, 4), (1, 1)])
    );
    assert_eq!(analysis.unclustered_items(), &[5]);
    assert!((analysis.coverage() - 5.0 / 6.0).abs() < 1e-12);
}

#[test]
fn test_item_two_overlaps_nodes_not_groups() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();

    let node_overlaps = analysis.items_in_multiple_nodes();
    assert_eq!(node_overlaps.keys().copied().collect::<Vec<_>>(), vec![2]);
    assert!(analysis.tables().items_in_multiple_groups().is_empty());
    assert_eq!(
        analysis.tables().groups_of(2).unwrap().iter().copied().collect::<Vec<_>>(),
        vec![0]
    );
}

#[test]
fn test_partition_invariant() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();
    let tables = analysis.tables();

    let clustered: usize = tables
        .group_ids()
        .filter(|&g| g != UNCLUSTERED)
        .map(|g| tables.items_of_group(g).unwrap().len())
        .sum();
    assert_eq!(clustered + analysis.unclustered_items().len(), 6);

    for item in 0..6 {
        let has_nodes = !tables.nodes_of(item).unwrap().is_empty();
        let has_groups = !tables.groups_of(item).unwrap().is_empty();
        assert_eq!(has_nodes, has_groups, "item {}", item);
        if !has_nodes {
            assert_eq!(analysis.group_labels().labels[item], UNCLUSTERED);
        }
    }
}

#[test]
fn test_descriptions() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();

    // node A is tight on age, spread out on capacity
    assert_eq!(analysis.node_descriptions()["A"].label, "age");
    assert_eq!(analysis.node_descriptions()["A"].size, 3);
    assert_eq!(analysis.node_descriptions().len(), 3);

    for (group, description) in analysis.group_descriptions() {
        let total: f64 = description.density.values().sum();
        assert!((total - 1.0).abs() <= 0.01, "group {} sums to {}", group, total);
    }
    assert!(analysis.group_descriptions().contains_key(&UNCLUSTERED));
    assert_eq!(analysis.group_descriptions()[&0].size, 4);
}

#[test]
fn test_target_at_group_means_matches_group() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();

    let target = TargetRecord::new(BTreeMap::from([
        ("age".to_string(), 18.25),
        ("capacity".to_string(), 450.0),
    ]));
    let report = analysis
        .target_matching(&target, &MatchOptions::default())
        .unwrap();
    assert_eq!(report.best, 0);
    assert_eq!(report.scores[&0], 0.0);
    assert!(report.scores[&1] > 0.0);
}

#[test]
fn test_frames_and_zscores() {
    let dataset = dataset();
    let analysis = ClusterAnalyzer::analyze(&scenario(), &dataset).unwrap();

    assert_eq!(analysis.group_frame(0).unwrap().n_rows(), 4);
    assert_eq!(analysis.node_frame("B").unwrap().n_rows(), 2);
    assert_eq!(analysis.unclustered_frame().unwrap().n_rows(), 1);
    assert!(analysis.group_frame(9).is_err());

    let z = analysis.zscores();
    assert_eq!(z.columns, vec!["age".to_string(), "capacity".to_string()]);
    assert_eq!(z.rows.len(), 3);
    let identifiers = analysis.group_identifiers(0.5, 1.0);
    assert_eq!(identifiers.len(), 3);
}

#[test]
fn test_record_and_dataset_must_agree() {
    let dataset = dataset();
    let bigger = record(4, 7, &[("A", &[0])], &[]);
    assert!(matches!(
        ClusterAnalyzer::analyze(&bigger, &dataset),
        Err(PolicyGroupError::DimensionMismatch {
            expected: 6,
            actual: 7
        })
    ));
}

#[test]
fn test_labeling_needs_no_dataset() {
    let labeling = ClusterAnalyzer::label(&scenario()).unwrap();
    assert_eq!(labeling.components.len(), 2);
    assert!((labeling.coverage() - 5.0 / 6.0).abs() < 1e-12);

    let fully_covered = record(4, 2, &[("A", &[0, 1])], &[]);
    assert_eq!(ClusterAnalyzer::label(&fully_covered).unwrap().coverage(), 1.0);
}

#[test]
fn test_conflicting_groups_are_reported_by_the_index() {
    let dataset = dataset();
    let mut conflicting = record(4, 6, &[("A", &[0, 1]), ("B", &[1, 2])], &[]);
    conflicting.components = Some(vec![vec!["A".to_string()], vec!["B".to_string()]]);

    assert!(matches!(
        ClusterAnalyzer::analyze(&conflicting, &dataset),
        Err(PolicyGroupError::ConflictingGroupAssignment {
            item: 1,
            first: 0,
            second: 1
        })
    ));

    let (components, tables) = ClusterAnalyzer::index(&conflicting).unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(
        tables.items_in_multiple_groups(),
        BTreeMap::from([(1, vec![0, 1])])
    );
    assert_eq!(
        tables.items_in_multiple_nodes().keys().copied().collect::<Vec<_>>(),
        vec![1]
    );
}
