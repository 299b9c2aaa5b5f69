//! Volatile in-process store for tests and development.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::model::{Connection, FlowNode, Scenario};
use crate::simulation::{Simulation, SimulationStatus};
use crate::versions::Version;

use super::{FlowStore, Result, StoreError};

#[derive(Default)]
struct Inner {
    scenarios: FxHashMap<Uuid, Scenario>,
    /// Live graph rows per scenario, in insertion order.
    nodes: FxHashMap<Uuid, Vec<FlowNode>>,
    connections: FxHashMap<Uuid, Vec<Connection>>,
    /// Version history per scenario, in insertion order.
    versions: FxHashMap<Uuid, Vec<Version>>,
    simulations: FxHashMap<Uuid, Simulation>,
}

/// In-memory [`FlowStore`] holding everything behind one `RwLock`.
///
/// Mutations take the write lock for their whole duration, which makes
/// every operation — including [`replace_graph`](FlowStore::replace_graph)
/// — atomic with respect to readers.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish()
    }
}

#[async_trait]
impl FlowStore for MemoryStore {
    async fn insert_scenario(&self, scenario: &Scenario) -> Result<()> {
        self.inner
            .write()
            .scenarios
            .insert(scenario.id, scenario.clone());
        Ok(())
    }

    async fn get_scenario(&self, scenario_id: Uuid) -> Result<Option<Scenario>> {
        Ok(self.inner.read().scenarios.get(&scenario_id).cloned())
    }

    async fn update_scenario(&self, scenario: &Scenario) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.scenarios.contains_key(&scenario.id) {
            return Err(StoreError::Backend {
                message: format!("update of unknown scenario {}", scenario.id),
            });
        }
        inner.scenarios.insert(scenario.id, scenario.clone());
        Ok(())
    }

    async fn insert_node(&self, node: &FlowNode) -> Result<()> {
        self.inner
            .write()
            .nodes
            .entry(node.scenario_id)
            .or_default()
            .push(node.clone());
        Ok(())
    }

    async fn insert_connection(&self, connection: &Connection) -> Result<()> {
        self.inner
            .write()
            .connections
            .entry(connection.scenario_id)
            .or_default()
            .push(connection.clone());
        Ok(())
    }

    async fn nodes(&self, scenario_id: Uuid) -> Result<Vec<FlowNode>> {
        Ok(self
            .inner
            .read()
            .nodes
            .get(&scenario_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn connections(&self, scenario_id: Uuid) -> Result<Vec<Connection>> {
        Ok(self
            .inner
            .read()
            .connections
            .get(&scenario_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_graph(
        &self,
        scenario_id: Uuid,
        nodes: Vec<FlowNode>,
        connections: Vec<Connection>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner.nodes.insert(scenario_id, nodes);
        inner.connections.insert(scenario_id, connections);
        Ok(())
    }

    async fn insert_version(&self, version: &Version) -> Result<()> {
        let mut inner = self.inner.write();
        let history = inner.versions.entry(version.scenario_id).or_default();
        if history.iter().any(|v| v.version == version.version) {
            return Err(StoreError::DuplicateVersion {
                scenario_id: version.scenario_id,
                version: version.version.clone(),
            });
        }
        history.push(version.clone());
        Ok(())
    }

    async fn get_version(&self, version_id: Uuid) -> Result<Option<Version>> {
        Ok(self
            .inner
            .read()
            .versions
            .values()
            .flatten()
            .find(|v| v.id == version_id)
            .cloned())
    }

    async fn latest_version(&self, scenario_id: Uuid) -> Result<Option<Version>> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&scenario_id)
            .and_then(|history| history.iter().max_by_key(|v| v.created_at))
            .cloned())
    }

    async fn version_by_label(&self, scenario_id: Uuid, version: &str) -> Result<Option<Version>> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&scenario_id)
            .and_then(|history| history.iter().find(|v| v.version == version))
            .cloned())
    }

    async fn versions(&self, scenario_id: Uuid, include_auto: bool) -> Result<Vec<Version>> {
        let inner = self.inner.read();
        let mut history: Vec<Version> = inner
            .versions
            .get(&scenario_id)
            .map(|h| {
                h.iter()
                    .rev()
                    .filter(|v| include_auto || !v.auto_generated)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Reversed insertion order already has creation-time ties newest
        // first; the stable sort only reorders across differing timestamps.
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn insert_simulation(&self, simulation: &Simulation) -> Result<()> {
        self.inner
            .write()
            .simulations
            .insert(simulation.id, simulation.clone());
        Ok(())
    }

    async fn get_simulation(&self, simulation_id: Uuid) -> Result<Option<Simulation>> {
        Ok(self.inner.read().simulations.get(&simulation_id).cloned())
    }

    async fn update_simulation(&self, simulation: &Simulation) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.simulations.contains_key(&simulation.id) {
            return Err(StoreError::Backend {
                message: format!("update of unknown simulation {}", simulation.id),
            });
        }
        inner.simulations.insert(simulation.id, simulation.clone());
        Ok(())
    }

    async fn running_simulations(&self, scenario_id: Uuid, user: &str) -> Result<Vec<Simulation>> {
        Ok(self
            .inner
            .read()
            .simulations
            .values()
            .filter(|s| {
                s.scenario_id == scenario_id
                    && s.started_by == user
                    && s.status == SimulationStatus::Running
            })
            .cloned()
            .collect())
    }
}
