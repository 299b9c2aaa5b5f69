/*!
Structural diff engine for graph snapshots.

Computes the difference between two [`GraphSnapshot`]s as the version store
sees them: nodes are keyed by `node_id`, connections by the composite
`(source_node_id, target_node_id)` key. The result is pure data — this
module performs no I/O and never fails; the same two snapshots always
produce an identical [`VersionDiff`].

Ordering is deterministic by construction: nodes sort before connections in
the flattened record list, added entries before deleted before modified
within each, and keys are compared lexicographically inside each bucket.

Field-level changes for modified nodes are computed over the JSON object
form of each record, so optional fields and free-form config payloads
participate the same way as fixed columns (a field absent on one side is
reported with `None` on that side).
*/

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{GraphSnapshot, SnapshotConnection, SnapshotNode};

/// A single field of a modified node, with its value on each side.
///
/// `old`/`new` are `None` when the field is absent on that side entirely
/// (as opposed to present with a JSON `null`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// A node present in both snapshots whose record differs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeModification {
    pub node_id: String,
    pub fields: Vec<FieldChange>,
}

/// Counts of structural changes between two snapshots.
///
/// This is the compact change summary stored on version records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub nodes_added: usize,
    pub nodes_deleted: usize,
    pub nodes_modified: usize,
    pub connections_added: usize,
    pub connections_deleted: usize,
    pub connections_modified: usize,
}

impl DiffSummary {
    /// Returns `true` when the two snapshots were structurally identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Full structural difference between two graph snapshots.
///
/// Category lists hold entity keys (sorted); `nodes_modified` additionally
/// carries per-field changes. `records` is the flattened human-readable
/// rendition in deterministic order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub nodes_added: Vec<String>,
    pub nodes_deleted: Vec<String>,
    pub nodes_modified: Vec<NodeModification>,
    pub connections_added: Vec<(String, String)>,
    pub connections_deleted: Vec<(String, String)>,
    pub connections_modified: Vec<(String, String)>,
    pub summary: DiffSummary,
    pub records: Vec<String>,
}

impl VersionDiff {
    /// Returns `true` when no change was detected in either entity set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
    }
}

/// Compute the structural difference between `from` and `to`.
///
/// # Examples
///
/// ```rust
/// use callweave::diff::diff_snapshots;
/// use callweave::model::{GraphSnapshot, Scenario};
///
/// let scenario = Scenario::new("demo", None);
/// let empty = GraphSnapshot::empty(&scenario);
/// assert!(diff_snapshots(&empty, &empty).is_empty());
/// ```
#[must_use]
pub fn diff_snapshots(from: &GraphSnapshot, to: &GraphSnapshot) -> VersionDiff {
    let from_nodes: FxHashMap<&str, &SnapshotNode> = from
        .nodes
        .iter()
        .map(|n| (n.node_id.as_str(), n))
        .collect();
    let to_nodes: FxHashMap<&str, &SnapshotNode> =
        to.nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();

    let mut nodes_added: Vec<String> = to_nodes
        .keys()
        .filter(|k| !from_nodes.contains_key(*k))
        .map(|k| (*k).to_string())
        .collect();
    let mut nodes_deleted: Vec<String> = from_nodes
        .keys()
        .filter(|k| !to_nodes.contains_key(*k))
        .map(|k| (*k).to_string())
        .collect();
    let mut nodes_modified: Vec<NodeModification> = from_nodes
        .iter()
        .filter_map(|(k, old)| {
            let new = to_nodes.get(k)?;
            if old == new {
                return None;
            }
            Some(NodeModification {
                node_id: (*k).to_string(),
                fields: field_changes(old, new),
            })
        })
        .collect();
    nodes_added.sort();
    nodes_deleted.sort();
    nodes_modified.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let from_conns: FxHashMap<(&str, &str), &SnapshotConnection> = from
        .connections
        .iter()
        .map(|c| ((c.source_node_id.as_str(), c.target_node_id.as_str()), c))
        .collect();
    let to_conns: FxHashMap<(&str, &str), &SnapshotConnection> = to
        .connections
        .iter()
        .map(|c| ((c.source_node_id.as_str(), c.target_node_id.as_str()), c))
        .collect();

    let owned = |k: &(&str, &str)| (k.0.to_string(), k.1.to_string());
    let mut connections_added: Vec<(String, String)> = to_conns
        .keys()
        .filter(|k| !from_conns.contains_key(*k))
        .map(owned)
        .collect();
    let mut connections_deleted: Vec<(String, String)> = from_conns
        .keys()
        .filter(|k| !to_conns.contains_key(*k))
        .map(owned)
        .collect();
    let mut connections_modified: Vec<(String, String)> = from_conns
        .iter()
        .filter_map(|(k, old)| {
            let new = to_conns.get(k)?;
            (**new != **old).then(|| owned(k))
        })
        .collect();
    connections_added.sort();
    connections_deleted.sort();
    connections_modified.sort();

    let summary = DiffSummary {
        nodes_added: nodes_added.len(),
        nodes_deleted: nodes_deleted.len(),
        nodes_modified: nodes_modified.len(),
        connections_added: connections_added.len(),
        connections_deleted: connections_deleted.len(),
        connections_modified: connections_modified.len(),
    };

    let mut records = Vec::with_capacity(
        summary.nodes_added
            + summary.nodes_deleted
            + summary.nodes_modified
            + summary.connections_added
            + summary.connections_deleted
            + summary.connections_modified,
    );
    for id in &nodes_added {
        records.push(format!("added node '{id}'"));
    }
    for id in &nodes_deleted {
        records.push(format!("deleted node '{id}'"));
    }
    for m in &nodes_modified {
        let fields: Vec<&str> = m.fields.iter().map(|f| f.field.as_str()).collect();
        records.push(format!(
            "modified node '{}' ({})",
            m.node_id,
            fields.join(", ")
        ));
    }
    for (s, t) in &connections_added {
        records.push(format!("added connection '{s} -> {t}'"));
    }
    for (s, t) in &connections_deleted {
        records.push(format!("deleted connection '{s} -> {t}'"));
    }
    for (s, t) in &connections_modified {
        records.push(format!("modified connection '{s} -> {t}'"));
    }

    VersionDiff {
        nodes_added,
        nodes_deleted,
        nodes_modified,
        connections_added,
        connections_deleted,
        connections_modified,
        summary,
        records,
    }
}

/// Field-by-field comparison over the JSON object form of two node records.
fn field_changes(old: &SnapshotNode, new: &SnapshotNode) -> Vec<FieldChange> {
    let old_obj = to_object(old);
    let new_obj = to_object(new);

    let mut fields: Vec<&String> = old_obj.keys().chain(new_obj.keys()).collect();
    fields.sort();
    fields.dedup();

    fields
        .into_iter()
        .filter_map(|field| {
            let old_val = old_obj.get(field);
            let new_val = new_obj.get(field);
            if old_val == new_val {
                return None;
            }
            Some(FieldChange {
                field: field.clone(),
                old: old_val.cloned(),
                new: new_val.cloned(),
            })
        })
        .collect()
}

fn to_object(node: &SnapshotNode) -> serde_json::Map<String, Value> {
    // SnapshotNode serializes to a JSON object; the fallback covers the
    // impossible non-object case without panicking in a pure function.
    match serde_json::to_value(node) {
        Ok(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeType, Position, Scenario};
    use serde_json::json;

    fn node(id: &str, name: &str) -> SnapshotNode {
        SnapshotNode {
            node_id: id.into(),
            node_type: NodeType::Message,
            name: name.into(),
            position: Position::default(),
            config: json!({}),
        }
    }

    #[test]
    fn field_changes_cover_union_of_fields() {
        let old = node("m", "before");
        let mut new = node("m", "after");
        new.config = json!({"text": "hi"});
        let changes = field_changes(&old, &new);
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["config", "name"]);
    }

    #[test]
    fn records_order_nodes_before_connections() {
        let scenario = Scenario::new("demo", None);
        let from = GraphSnapshot {
            scenario: crate::model::ScenarioMeta {
                name: scenario.name.clone(),
                description: None,
            },
            nodes: vec![node("a", "A")],
            connections: vec![],
        };
        let to = GraphSnapshot {
            scenario: crate::model::ScenarioMeta {
                name: scenario.name,
                description: None,
            },
            nodes: vec![node("b", "B")],
            connections: vec![SnapshotConnection {
                source_node_id: "b".into(),
                target_node_id: "c".into(),
                handle: None,
                label: None,
            }],
        };
        let diff = diff_snapshots(&from, &to);
        assert_eq!(
            diff.records,
            vec![
                "added node 'b'",
                "deleted node 'a'",
                "added connection 'b -> c'",
            ]
        );
    }
}
