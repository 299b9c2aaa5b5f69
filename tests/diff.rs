use callweave::diff::diff_snapshots;
use callweave::model::{
    GraphSnapshot, NodeType, Position, ScenarioMeta, SnapshotConnection, SnapshotNode,
};
use serde_json::json;

fn meta() -> ScenarioMeta {
    ScenarioMeta {
        name: "demo".into(),
        description: None,
    }
}

fn snap_node(node_id: &str, node_type: NodeType, name: &str) -> SnapshotNode {
    SnapshotNode {
        node_id: node_id.into(),
        node_type,
        name: name.into(),
        position: Position::default(),
        config: json!({}),
    }
}

fn snap_conn(source: &str, target: &str, handle: Option<&str>) -> SnapshotConnection {
    SnapshotConnection {
        source_node_id: source.into(),
        target_node_id: target.into(),
        handle: handle.map(str::to_string),
        label: None,
    }
}

fn snapshot(nodes: Vec<SnapshotNode>, connections: Vec<SnapshotConnection>) -> GraphSnapshot {
    GraphSnapshot {
        scenario: meta(),
        nodes,
        connections,
    }
}

#[test]
fn diff_of_identical_snapshots_is_empty() {
    let snap = snapshot(
        vec![
            snap_node("a", NodeType::Start, "A"),
            snap_node("b", NodeType::End, "B"),
        ],
        vec![snap_conn("a", "b", None)],
    );
    let diff = diff_snapshots(&snap, &snap);
    assert!(diff.is_empty());
    assert!(diff.records.is_empty());
    assert!(diff.nodes_added.is_empty());
    assert!(diff.nodes_deleted.is_empty());
    assert!(diff.nodes_modified.is_empty());
}

#[test]
fn added_and_deleted_categorization() {
    let from = snapshot(vec![snap_node("a", NodeType::Start, "A")], vec![]);
    let to = snapshot(
        vec![
            snap_node("a", NodeType::Start, "A"),
            snap_node("b", NodeType::Message, "B"),
        ],
        vec![snap_conn("a", "b", None)],
    );
    let diff = diff_snapshots(&from, &to);
    assert_eq!(diff.nodes_added, vec!["b"]);
    assert!(diff.nodes_deleted.is_empty());
    assert!(diff.nodes_modified.is_empty());
    assert_eq!(diff.connections_added, vec![("a".into(), "b".into())]);
    assert_eq!(diff.summary.nodes_added, 1);
    assert_eq!(diff.summary.connections_added, 1);
}

#[test]
fn modified_node_reports_field_level_changes() {
    let from = snapshot(vec![snap_node("m", NodeType::Message, "before")], vec![]);
    let mut changed = snap_node("m", NodeType::Message, "after");
    changed.config = json!({"text": "hello"});
    changed.position = Position { x: 5.0, y: 7.0 };
    let to = snapshot(vec![changed], vec![]);

    let diff = diff_snapshots(&from, &to);
    assert_eq!(diff.summary.nodes_modified, 1);
    let modification = &diff.nodes_modified[0];
    assert_eq!(modification.node_id, "m");

    let fields: Vec<&str> = modification
        .fields
        .iter()
        .map(|f| f.field.as_str())
        .collect();
    assert_eq!(fields, vec!["config", "name", "position"]);

    let name_change = modification
        .fields
        .iter()
        .find(|f| f.field == "name")
        .unwrap();
    assert_eq!(name_change.old, Some(json!("before")));
    assert_eq!(name_change.new, Some(json!("after")));
}

#[test]
fn connection_handle_change_counts_as_modified() {
    let from = snapshot(vec![], vec![snap_conn("c", "e", Some("yes"))]);
    let to = snapshot(vec![], vec![snap_conn("c", "e", Some("no"))]);
    let diff = diff_snapshots(&from, &to);
    assert_eq!(diff.connections_modified, vec![("c".into(), "e".into())]);
    assert_eq!(diff.summary.connections_modified, 1);
    assert_eq!(diff.records, vec!["modified connection 'c -> e'"]);
}

#[test]
fn category_symmetry_between_directions() {
    let from = snapshot(
        vec![
            snap_node("a", NodeType::Start, "A"),
            snap_node("b", NodeType::Message, "B"),
        ],
        vec![snap_conn("a", "b", None)],
    );
    let to = snapshot(
        vec![
            snap_node("a", NodeType::Start, "A"),
            snap_node("c", NodeType::End, "C"),
        ],
        vec![snap_conn("a", "c", None)],
    );

    let forward = diff_snapshots(&from, &to);
    let backward = diff_snapshots(&to, &from);
    assert_eq!(forward.nodes_added, backward.nodes_deleted);
    assert_eq!(forward.nodes_deleted, backward.nodes_added);
    assert_eq!(forward.connections_added, backward.connections_deleted);
    assert_eq!(forward.connections_deleted, backward.connections_added);
}

#[test]
fn records_are_deterministically_ordered() {
    let from = snapshot(
        vec![
            snap_node("keep", NodeType::Message, "old"),
            snap_node("gone", NodeType::Message, "gone"),
        ],
        vec![snap_conn("keep", "gone", None)],
    );
    let to = snapshot(
        vec![
            snap_node("keep", NodeType::Message, "new"),
            snap_node("added_a", NodeType::Message, "A"),
            snap_node("added_b", NodeType::Message, "B"),
        ],
        vec![snap_conn("added_a", "added_b", None)],
    );

    let first = diff_snapshots(&from, &to);
    let second = diff_snapshots(&from, &to);
    assert_eq!(first, second);
    assert_eq!(
        first.records,
        vec![
            "added node 'added_a'",
            "added node 'added_b'",
            "deleted node 'gone'",
            "modified node 'keep' (name)",
            "added connection 'added_a -> added_b'",
            "deleted connection 'keep -> gone'",
        ]
    );
}
