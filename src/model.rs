//! Core graph model for the callweave scenario engine.
//!
//! This module defines the shared entity types every other subsystem
//! operates on: scenarios, their typed nodes and directed connections, and
//! the point-in-time [`GraphSnapshot`] that the version store persists and
//! the diff engine compares. These types carry no behavior beyond identity,
//! encoding, and snapshot capture.
//!
//! # Key Types
//!
//! - [`NodeType`]: closed set of node behaviors a scenario graph can contain
//! - [`FlowNode`] / [`Connection`]: the live, editable graph rows
//! - [`GraphSnapshot`]: a full serialized copy of a scenario's graph at a
//!   point in time, stored inside a version record
//!
//! # Examples
//!
//! ```rust
//! use callweave::model::NodeType;
//!
//! let start = NodeType::Start;
//! assert!(start.is_start());
//!
//! // Encode for persistence
//! assert_eq!(NodeType::Condition.encode(), "condition");
//! assert_eq!(NodeType::decode("condition"), Some(NodeType::Condition));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifies the behavior of a node within a scenario graph.
///
/// `NodeType` is a closed enum: the simulation engine dispatches on it to
/// derive legal actions and advance semantics, so adding a variant is a
/// compile-time-checked change everywhere it matters.
///
/// # Persistence
///
/// `NodeType` supports serialization through both serde and the
/// [`encode`](Self::encode)/[`decode`](Self::decode) string forms used by
/// database rows.
///
/// # Examples
///
/// ```rust
/// use callweave::model::NodeType;
///
/// let t = NodeType::Input;
/// let encoded = t.encode();
/// assert_eq!(NodeType::decode(&encoded), Some(t));
///
/// // Unknown encodings are rejected rather than guessed at
/// assert_eq!(NodeType::decode("teleport"), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point of a scenario. Exactly one is expected for the scenario
    /// to be simulatable; validated lazily at simulation start.
    Start,
    /// Plays or displays a message, then advances.
    Message,
    /// Branching step with multiple outgoing connections.
    Branch,
    /// Hands the session off to an external destination, then advances.
    Transfer,
    /// Terminal node. Reaching one completes the simulation.
    End,
    /// Collects a value from the caller before advancing.
    Input,
    /// Two-way decision selected by a `yes`/`no` choice.
    Condition,
}

impl NodeType {
    /// Encode a `NodeType` into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::Message => "message",
            NodeType::Branch => "branch",
            NodeType::Transfer => "transfer",
            NodeType::End => "end",
            NodeType::Input => "input",
            NodeType::Condition => "condition",
        }
    }

    /// Decode a persisted string form back into a `NodeType`.
    ///
    /// Returns `None` for unrecognized encodings; the graph editor owns the
    /// vocabulary, and silently coercing an unknown type would change
    /// simulation semantics.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "start" => Some(NodeType::Start),
            "message" => Some(NodeType::Message),
            "branch" => Some(NodeType::Branch),
            "transfer" => Some(NodeType::Transfer),
            "end" => Some(NodeType::End),
            "input" => Some(NodeType::Input),
            "condition" => Some(NodeType::Condition),
            _ => None,
        }
    }

    /// Returns `true` if this is a [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is an [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}

/// 2D canvas position of a node in the scenario editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A named, versioned call-flow definition composed of nodes and connections.
///
/// A scenario has at most one live (editable) graph; versions are read-only
/// copies of that graph at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    /// Create a scenario shell with fresh timestamps and a random id.
    pub fn new(name: impl Into<String>, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            created_by: created_by.clone(),
            created_at: now,
            updated_by: created_by,
            updated_at: now,
        }
    }
}

/// A typed step in a scenario's live graph.
///
/// `node_id` is unique within its scenario, not globally; node identity for
/// diffing and simulation is always `(scenario, node_id)`. The `config`
/// blob is free-form and owned by the graph editor; the engine passes it
/// through so callers can render the current step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub scenario_id: Uuid,
    pub node_id: String,
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: Value,
}

/// A directed edge between two nodes of the same scenario.
///
/// `handle` disambiguates multiple outgoing edges (e.g. `"yes"`/`"no"` on a
/// condition node). Endpoints referencing existing node ids is a soft
/// invariant: the editor is expected to uphold it, the engine does not
/// mechanically enforce it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub scenario_id: Uuid,
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Scenario-level metadata carried inside a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioMeta {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A node record as captured inside a snapshot.
///
/// Snapshot records deliberately omit live-row bookkeeping (the owning
/// scenario id); restoring a snapshot reattaches them to the target
/// scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub node_id: String,
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub config: Value,
}

impl From<&FlowNode> for SnapshotNode {
    fn from(n: &FlowNode) -> Self {
        Self {
            node_id: n.node_id.clone(),
            node_type: n.node_type,
            name: n.name.clone(),
            position: n.position,
            config: n.config.clone(),
        }
    }
}

impl SnapshotNode {
    /// Rebuild a live graph row from this record for `scenario_id`.
    pub fn into_flow_node(self, scenario_id: Uuid) -> FlowNode {
        FlowNode {
            scenario_id,
            node_id: self.node_id,
            node_type: self.node_type,
            name: self.name,
            position: self.position,
            config: self.config,
        }
    }
}

/// A connection record as captured inside a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConnection {
    pub source_node_id: String,
    pub target_node_id: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl From<&Connection> for SnapshotConnection {
    fn from(c: &Connection) -> Self {
        Self {
            source_node_id: c.source_node_id.clone(),
            target_node_id: c.target_node_id.clone(),
            handle: c.handle.clone(),
            label: c.label.clone(),
        }
    }
}

impl SnapshotConnection {
    /// Composite identity of this edge within its scenario.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.source_node_id.clone(), self.target_node_id.clone())
    }

    /// Rebuild a live graph row from this record for `scenario_id`.
    pub fn into_connection(self, scenario_id: Uuid) -> Connection {
        Connection {
            scenario_id,
            source_node_id: self.source_node_id,
            target_node_id: self.target_node_id,
            handle: self.handle,
            label: self.label,
        }
    }
}

/// Full serialized copy of a scenario's graph at a point in time.
///
/// Snapshots are what version records store and what the diff engine
/// compares. Capture and restore must round-trip: restoring a snapshot and
/// capturing again yields a structurally equal snapshot.
///
/// # Examples
///
/// ```rust
/// use callweave::model::{FlowNode, GraphSnapshot, NodeType, Position, Scenario};
/// use serde_json::json;
///
/// let scenario = Scenario::new("after-hours", None);
/// let node = FlowNode {
///     scenario_id: scenario.id,
///     node_id: "greet".into(),
///     node_type: NodeType::Message,
///     name: "Greeting".into(),
///     position: Position { x: 10.0, y: 20.0 },
///     config: json!({"text": "Hello"}),
/// };
///
/// let snap = GraphSnapshot::capture(&scenario, &[node], &[]);
/// assert_eq!(snap.nodes.len(), 1);
/// assert!(snap.connections.is_empty());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub scenario: ScenarioMeta,
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub connections: Vec<SnapshotConnection>,
}

impl GraphSnapshot {
    /// Capture the current live graph of `scenario`.
    #[must_use]
    pub fn capture(scenario: &Scenario, nodes: &[FlowNode], connections: &[Connection]) -> Self {
        Self {
            scenario: ScenarioMeta {
                name: scenario.name.clone(),
                description: scenario.description.clone(),
            },
            nodes: nodes.iter().map(SnapshotNode::from).collect(),
            connections: connections.iter().map(SnapshotConnection::from).collect(),
        }
    }

    /// An empty snapshot for `scenario`, used when a scenario has no graph yet.
    #[must_use]
    pub fn empty(scenario: &Scenario) -> Self {
        Self::capture(scenario, &[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_type_encode_decode_roundtrip() {
        for t in [
            NodeType::Start,
            NodeType::Message,
            NodeType::Branch,
            NodeType::Transfer,
            NodeType::End,
            NodeType::Input,
            NodeType::Condition,
        ] {
            assert_eq!(NodeType::decode(t.encode()), Some(t));
        }
        assert_eq!(NodeType::decode("unknown"), None);
    }

    #[test]
    fn snapshot_capture_strips_scenario_id() {
        let scenario = Scenario::new("demo", Some("alice".into()));
        let node = FlowNode {
            scenario_id: scenario.id,
            node_id: "n1".into(),
            node_type: NodeType::Start,
            name: "Start".into(),
            position: Position::default(),
            config: json!({}),
        };
        let snap = GraphSnapshot::capture(&scenario, std::slice::from_ref(&node), &[]);
        let restored = snap.nodes[0].clone().into_flow_node(scenario.id);
        assert_eq!(restored, node);
    }
}
