#[macro_use]
extern crate proptest;

use proptest::prelude::{Just, Strategy, prop};
use proptest::prop_oneof;

use callweave::diff::diff_snapshots;
use callweave::model::{
    GraphSnapshot, NodeType, Position, ScenarioMeta, SnapshotConnection, SnapshotNode,
};

// Generators draw node ids from a small pool so snapshots overlap often
// enough to exercise the modified/deleted paths, not just added.

fn node_type_strategy() -> impl Strategy<Value = NodeType> {
    prop_oneof![
        Just(NodeType::Start),
        Just(NodeType::Message),
        Just(NodeType::Branch),
        Just(NodeType::Transfer),
        Just(NodeType::End),
        Just(NodeType::Input),
        Just(NodeType::Condition),
    ]
}

fn nodes_strategy() -> impl Strategy<Value = Vec<SnapshotNode>> {
    prop::collection::btree_map("[a-e]", (node_type_strategy(), "[a-z]{1,6}"), 0..5).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(node_id, (node_type, name))| SnapshotNode {
                    node_id,
                    node_type,
                    name,
                    position: Position::default(),
                    config: serde_json::Value::Null,
                })
                .collect()
        },
    )
}

fn connections_strategy() -> impl Strategy<Value = Vec<SnapshotConnection>> {
    prop::collection::btree_map(("[a-e]", "[a-e]"), prop::option::of("yes|no"), 0..5).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|((source_node_id, target_node_id), handle)| SnapshotConnection {
                    source_node_id,
                    target_node_id,
                    handle,
                    label: None,
                })
                .collect()
        },
    )
}

fn snapshot_strategy() -> impl Strategy<Value = GraphSnapshot> {
    (nodes_strategy(), connections_strategy()).prop_map(|(nodes, connections)| GraphSnapshot {
        scenario: ScenarioMeta {
            name: "prop".into(),
            description: None,
        },
        nodes,
        connections,
    })
}

proptest! {
    #[test]
    fn prop_self_diff_is_empty(snap in snapshot_strategy()) {
        let diff = diff_snapshots(&snap, &snap);
        prop_assert!(diff.is_empty());
        prop_assert!(diff.records.is_empty());
    }

    #[test]
    fn prop_category_symmetry(a in snapshot_strategy(), b in snapshot_strategy()) {
        let forward = diff_snapshots(&a, &b);
        let backward = diff_snapshots(&b, &a);

        prop_assert_eq!(&forward.nodes_added, &backward.nodes_deleted);
        prop_assert_eq!(&forward.nodes_deleted, &backward.nodes_added);
        prop_assert_eq!(&forward.connections_added, &backward.connections_deleted);
        prop_assert_eq!(&forward.connections_deleted, &backward.connections_added);

        // Modified sets agree on identity in both directions.
        let forward_modified: Vec<&str> =
            forward.nodes_modified.iter().map(|m| m.node_id.as_str()).collect();
        let backward_modified: Vec<&str> =
            backward.nodes_modified.iter().map(|m| m.node_id.as_str()).collect();
        prop_assert_eq!(forward_modified, backward_modified);
        prop_assert_eq!(&forward.connections_modified, &backward.connections_modified);
    }

    #[test]
    fn prop_summary_counts_match_lists(a in snapshot_strategy(), b in snapshot_strategy()) {
        let diff = diff_snapshots(&a, &b);
        prop_assert_eq!(diff.summary.nodes_added, diff.nodes_added.len());
        prop_assert_eq!(diff.summary.nodes_deleted, diff.nodes_deleted.len());
        prop_assert_eq!(diff.summary.nodes_modified, diff.nodes_modified.len());
        prop_assert_eq!(diff.summary.connections_added, diff.connections_added.len());
        prop_assert_eq!(diff.summary.connections_deleted, diff.connections_deleted.len());
        prop_assert_eq!(diff.summary.connections_modified, diff.connections_modified.len());

        let total = diff.nodes_added.len()
            + diff.nodes_deleted.len()
            + diff.nodes_modified.len()
            + diff.connections_added.len()
            + diff.connections_deleted.len()
            + diff.connections_modified.len();
        prop_assert_eq!(diff.records.len(), total);
    }

    #[test]
    fn prop_diff_is_reproducible(a in snapshot_strategy(), b in snapshot_strategy()) {
        prop_assert_eq!(diff_snapshots(&a, &b), diff_snapshots(&a, &b));
    }
}
