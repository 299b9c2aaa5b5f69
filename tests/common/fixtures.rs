use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use callweave::identity::StaticIdentity;
use callweave::model::{Connection, FlowNode, NodeType, Position, Scenario};
use callweave::simulation::SimulationEngine;
use callweave::store::{FlowStore, MemoryStore};
use callweave::versions::VersionStore;

/// Engines wired over a shared in-memory store, plus the seeded scenario.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub versions: VersionStore,
    pub simulations: SimulationEngine,
    pub scenario: Scenario,
}

/// Harness around the demo condition graph, attributed to `tester`.
pub async fn demo_harness() -> Harness {
    harness_with_user("tester").await
}

/// Harness around the demo condition graph for an explicit user.
pub async fn harness_with_user(user: &str) -> Harness {
    let harness = empty_harness(user).await;
    seed_condition_graph(harness.store.as_ref(), harness.scenario.id).await;
    harness
}

/// Harness with a seeded scenario but no graph rows yet.
pub async fn empty_harness(user: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(StaticIdentity::new(user));
    let scenario = Scenario::new("demo-flow", Some(user.into()));
    store.insert_scenario(&scenario).await.unwrap();
    Harness {
        versions: VersionStore::new(store.clone(), identity.clone()),
        simulations: SimulationEngine::new(store.clone(), identity),
        store,
        scenario,
    }
}

/// `S(start) -> M(message) -> C(condition) -> E1(end) / E2(end)`,
/// with the condition edges handled `yes` / `no`.
pub async fn seed_condition_graph(store: &dyn FlowStore, scenario_id: Uuid) {
    for (node_id, node_type) in [
        ("S", NodeType::Start),
        ("M", NodeType::Message),
        ("C", NodeType::Condition),
        ("E1", NodeType::End),
        ("E2", NodeType::End),
    ] {
        store
            .insert_node(&node(scenario_id, node_id, node_type))
            .await
            .unwrap();
    }
    store
        .insert_connection(&connection(scenario_id, "S", "M", None))
        .await
        .unwrap();
    store
        .insert_connection(&connection(scenario_id, "M", "C", None))
        .await
        .unwrap();
    store
        .insert_connection(&connection(scenario_id, "C", "E1", Some("yes")))
        .await
        .unwrap();
    store
        .insert_connection(&connection(scenario_id, "C", "E2", Some("no")))
        .await
        .unwrap();
}

/// `S(start) -> I(input) -> E(end)`.
pub async fn seed_input_graph(store: &dyn FlowStore, scenario_id: Uuid) {
    for (node_id, node_type) in [
        ("S", NodeType::Start),
        ("I", NodeType::Input),
        ("E", NodeType::End),
    ] {
        store
            .insert_node(&node(scenario_id, node_id, node_type))
            .await
            .unwrap();
    }
    store
        .insert_connection(&connection(scenario_id, "S", "I", None))
        .await
        .unwrap();
    store
        .insert_connection(&connection(scenario_id, "I", "E", None))
        .await
        .unwrap();
}

pub fn node(scenario_id: Uuid, node_id: &str, node_type: NodeType) -> FlowNode {
    FlowNode {
        scenario_id,
        node_id: node_id.into(),
        node_type,
        name: format!("{node_id} ({node_type})"),
        position: Position::default(),
        config: json!({"prompt": format!("step {node_id}")}),
    }
}

pub fn connection(
    scenario_id: Uuid,
    source: &str,
    target: &str,
    handle: Option<&str>,
) -> Connection {
    Connection {
        scenario_id,
        source_node_id: source.into(),
        target_node_id: target.into(),
        handle: handle.map(str::to_string),
        label: None,
    }
}
