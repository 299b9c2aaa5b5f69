//! Simulation engine: steppable execution sessions over a live graph.
//!
//! A simulation walks a scenario graph as a finite-state machine. Each
//! session tracks its current node and accumulated input; user actions
//! arrive as loosely-typed transport records, decode into the closed
//! [`ActionKind`] set, and drive node-type-specific transitions.
//!
//! Legal actions are never stored: they are derived fresh on every state
//! read from the current node's type (see [`base_actions`]), with
//! `restart` and `stop` always available while the session is running.
//!
//! The engine performs no internal locking; callers serialize actions per
//! simulation id at the transport boundary. All blocking is store I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::identity::IdentityProvider;
use crate::model::{Connection, FlowNode, NodeType};
use crate::store::{FlowStore, StoreError};

/// Execution status of a simulation session.
///
/// `Completed`, `Stopped`, and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    Running,
    Completed,
    Stopped,
    Failed,
}

impl SimulationStatus {
    /// Encode a `SimulationStatus` into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            SimulationStatus::Running => "running",
            SimulationStatus::Completed => "completed",
            SimulationStatus::Stopped => "stopped",
            SimulationStatus::Failed => "failed",
        }
    }

    /// Decode a persisted string form back into a `SimulationStatus`.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SimulationStatus::Running),
            "completed" => Some(SimulationStatus::Completed),
            "stopped" => Some(SimulationStatus::Stopped),
            "failed" => Some(SimulationStatus::Failed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SimulationStatus::Running)
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.encode())
    }
}

/// An ephemeral execution instance of one scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub id: Uuid,
    pub scenario_id: Uuid,
    pub start_node_id: String,
    /// Current position in the graph; cleared when the session fails.
    pub current_node_id: Option<String>,
    /// Collected user input, keyed `input_<node_id>`.
    #[serde(default)]
    pub session_data: FxHashMap<String, Value>,
    pub status: SimulationStatus,
    pub started_by: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The kinds of actions a caller can submit against a running simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Next,
    Input,
    ConditionSelect,
    Restart,
    Stop,
}

impl ActionKind {
    /// Wire form of this action kind.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            ActionKind::Next => "next",
            ActionKind::Input => "input",
            ActionKind::ConditionSelect => "condition_select",
            ActionKind::Restart => "restart",
            ActionKind::Stop => "stop",
        }
    }

    /// Decode a wire form; `None` for unrecognized action types.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "next" => Some(ActionKind::Next),
            "input" => Some(ActionKind::Input),
            "condition_select" => Some(ActionKind::ConditionSelect),
            "restart" => Some(ActionKind::Restart),
            "stop" => Some(ActionKind::Stop),
            _ => None,
        }
    }
}

/// Loosely-typed action record as the transport layer delivers it.
///
/// `action_type` is decoded against [`ActionKind`]; the payload fields are
/// validated per action. Unknown types fail with
/// [`SimulationError::UnknownAction`] rather than being guessed at.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_type: String,
    #[serde(default)]
    pub input_value: Option<String>,
    #[serde(default)]
    pub choice: Option<String>,
}

impl ActionRequest {
    pub fn next() -> Self {
        Self {
            action_type: ActionKind::Next.encode().into(),
            ..Default::default()
        }
    }

    pub fn input(value: impl Into<String>) -> Self {
        Self {
            action_type: ActionKind::Input.encode().into(),
            input_value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn condition_select(choice: impl Into<String>) -> Self {
        Self {
            action_type: ActionKind::ConditionSelect.encode().into(),
            choice: Some(choice.into()),
            ..Default::default()
        }
    }

    pub fn restart() -> Self {
        Self {
            action_type: ActionKind::Restart.encode().into(),
            ..Default::default()
        }
    }

    pub fn stop() -> Self {
        Self {
            action_type: ActionKind::Stop.encode().into(),
            ..Default::default()
        }
    }
}

/// Node-type-specific actions, excluding the always-available session
/// controls.
///
/// This is the single dispatch table from node type to legal actions;
/// advancing semantics dispatch on the same enum in
/// [`SimulationEngine::execute_action`].
#[must_use]
pub fn base_actions(node_type: NodeType) -> &'static [ActionKind] {
    match node_type {
        NodeType::Start | NodeType::Message | NodeType::Branch | NodeType::Transfer => {
            &[ActionKind::Next]
        }
        NodeType::Input => &[ActionKind::Input],
        NodeType::Condition => &[ActionKind::ConditionSelect],
        NodeType::End => &[],
    }
}

/// A simulation's externally visible state at a point in time.
///
/// `current_node` carries the full node record (including its config
/// payload) so a caller can render the step; `available_actions` is derived
/// fresh from the node type and session status on every read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationState {
    pub simulation: Simulation,
    pub current_node: Option<FlowNode>,
    pub available_actions: Vec<ActionKind>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum SimulationError {
    #[error("scenario not found: {scenario_id}")]
    #[diagnostic(code(callweave::simulation::scenario_not_found))]
    ScenarioNotFound { scenario_id: Uuid },

    #[error("simulation not found: {simulation_id}")]
    #[diagnostic(code(callweave::simulation::not_found))]
    SimulationNotFound { simulation_id: Uuid },

    #[error("scenario {scenario_id} has no start node")]
    #[diagnostic(
        code(callweave::simulation::no_start_node),
        help("Add exactly one start-type node to the scenario graph.")
    )]
    NoStartNode { scenario_id: Uuid },

    #[error("scenario {scenario_id} has {count} start nodes")]
    #[diagnostic(
        code(callweave::simulation::ambiguous_start_node),
        help("A simulatable scenario carries exactly one start-type node.")
    )]
    AmbiguousStartNode { scenario_id: Uuid, count: usize },

    #[error("simulation {simulation_id} is not running (status: {status})")]
    #[diagnostic(code(callweave::simulation::invalid_state))]
    InvalidState {
        simulation_id: Uuid,
        status: SimulationStatus,
    },

    #[error("invalid action payload: {message}")]
    #[diagnostic(code(callweave::simulation::validation))]
    Validation { message: String },

    #[error("unknown action type: '{action_type}'")]
    #[diagnostic(code(callweave::simulation::unknown_action))]
    UnknownAction { action_type: String },

    #[error("current node '{node_id}' is missing from the scenario graph")]
    #[diagnostic(
        code(callweave::simulation::dangling_node),
        help("The live graph changed underneath the session; start a new simulation.")
    )]
    DanglingNode { node_id: String },

    #[error(transparent)]
    #[diagnostic(code(callweave::simulation::store))]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Interprets a scenario's live graph as a running finite-state session.
///
/// Constructed with its persistence and identity collaborators passed in.
/// One caller at a time is expected per simulation id; the engine does not
/// lock internally.
pub struct SimulationEngine {
    store: Arc<dyn FlowStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl SimulationEngine {
    pub fn new(store: Arc<dyn FlowStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Start a new simulation at the scenario's unique start node.
    ///
    /// Rejects graphs with zero start nodes ([`SimulationError::NoStartNode`])
    /// or more than one ([`SimulationError::AmbiguousStartNode`]). Any other
    /// running simulation owned by the same user for the same scenario is
    /// stopped first: at most one active simulation per user per scenario.
    #[instrument(skip(self), err)]
    pub async fn start_simulation(&self, scenario_id: Uuid) -> Result<SimulationState> {
        if self.store.get_scenario(scenario_id).await?.is_none() {
            return Err(SimulationError::ScenarioNotFound { scenario_id });
        }
        let nodes = self.store.nodes(scenario_id).await?;
        let start_nodes: Vec<&FlowNode> =
            nodes.iter().filter(|n| n.node_type.is_start()).collect();
        let start = match start_nodes.as_slice() {
            [] => return Err(SimulationError::NoStartNode { scenario_id }),
            [start] => (*start).clone(),
            many => {
                return Err(SimulationError::AmbiguousStartNode {
                    scenario_id,
                    count: many.len(),
                });
            }
        };

        let user = self.identity.current_user();
        for mut running in self.store.running_simulations(scenario_id, &user).await? {
            running.status = SimulationStatus::Stopped;
            running.completed_at = Some(Utc::now());
            self.store.update_simulation(&running).await?;
        }

        let simulation = Simulation {
            id: Uuid::new_v4(),
            scenario_id,
            start_node_id: start.node_id.clone(),
            current_node_id: Some(start.node_id.clone()),
            session_data: FxHashMap::default(),
            status: SimulationStatus::Running,
            started_by: user,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.store.insert_simulation(&simulation).await?;

        Ok(compose_state(simulation, Some(start)))
    }

    /// Apply one user action to a running simulation.
    ///
    /// Fails with [`SimulationError::InvalidState`] unless the session is
    /// running. The returned state reflects the position after the action;
    /// reaching an end node does not complete the session here — that
    /// transition fires on the next state read ([`Self::get_simulation`]).
    #[instrument(skip(self, request), fields(action = %request.action_type), err)]
    pub async fn execute_action(
        &self,
        simulation_id: Uuid,
        request: ActionRequest,
    ) -> Result<SimulationState> {
        let mut simulation = self.require_simulation(simulation_id).await?;
        if simulation.status != SimulationStatus::Running {
            return Err(SimulationError::InvalidState {
                simulation_id,
                status: simulation.status,
            });
        }
        let action =
            ActionKind::decode(&request.action_type).ok_or(SimulationError::UnknownAction {
                action_type: request.action_type.clone(),
            })?;

        let connections = self.store.connections(simulation.scenario_id).await?;
        match action {
            ActionKind::Next => {
                let current = self.require_current(&mut simulation).await?;
                advance(&mut simulation, &current, &connections);
            }
            ActionKind::Input => {
                let value = request
                    .input_value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| SimulationError::Validation {
                        message: "input action requires a non-empty input_value".into(),
                    })?;
                let current = self.require_current(&mut simulation).await?;
                simulation
                    .session_data
                    .insert(format!("input_{current}"), Value::String(value.to_string()));
                advance(&mut simulation, &current, &connections);
            }
            ActionKind::ConditionSelect => {
                let choice = request
                    .choice
                    .as_deref()
                    .filter(|c| matches!(*c, "yes" | "no"))
                    .ok_or_else(|| SimulationError::Validation {
                        message: "condition_select requires choice to be 'yes' or 'no'".into(),
                    })?;
                let current = self.require_current(&mut simulation).await?;
                let outgoing: Vec<&Connection> = connections
                    .iter()
                    .filter(|c| c.source_node_id == current)
                    .collect();
                // When no handle matches the choice, the first outgoing
                // connection in enumeration order wins. Long-standing
                // behavior that existing scenario graphs rely on.
                let selected = outgoing
                    .iter()
                    .find(|c| c.handle.as_deref() == Some(choice))
                    .or_else(|| outgoing.first());
                if let Some(connection) = selected {
                    simulation.current_node_id = Some(connection.target_node_id.clone());
                }
            }
            ActionKind::Restart => {
                simulation.current_node_id = Some(simulation.start_node_id.clone());
                simulation.session_data.clear();
            }
            ActionKind::Stop => {
                simulation.status = SimulationStatus::Stopped;
                simulation.completed_at = Some(Utc::now());
            }
        }

        self.store.update_simulation(&simulation).await?;
        self.state_of(simulation).await
    }

    /// Read a simulation's current state.
    ///
    /// Reading state while the session is parked on an end-type node
    /// auto-transitions it to `completed` — no explicit `stop` required. A
    /// running session whose current node no longer exists in the live
    /// graph transitions to `failed` instead of erroring the read.
    #[instrument(skip(self), err)]
    pub async fn get_simulation(&self, simulation_id: Uuid) -> Result<SimulationState> {
        let mut simulation = self.require_simulation(simulation_id).await?;

        if simulation.status == SimulationStatus::Running
            && let Some(node_id) = simulation.current_node_id.clone()
        {
            match self.lookup_node(simulation.scenario_id, &node_id).await? {
                Some(node) if node.node_type.is_end() => {
                    simulation.status = SimulationStatus::Completed;
                    simulation.completed_at = Some(Utc::now());
                    self.store.update_simulation(&simulation).await?;
                }
                Some(_) => {}
                None => {
                    simulation.status = SimulationStatus::Failed;
                    simulation.current_node_id = None;
                    simulation.completed_at = Some(Utc::now());
                    self.store.update_simulation(&simulation).await?;
                }
            }
        }

        self.state_of(simulation).await
    }

    async fn require_simulation(&self, simulation_id: Uuid) -> Result<Simulation> {
        self.store
            .get_simulation(simulation_id)
            .await?
            .ok_or(SimulationError::SimulationNotFound { simulation_id })
    }

    /// Current node id of a running simulation, verifying the node still
    /// exists. A dangling id fails the session before erroring.
    async fn require_current(&self, simulation: &mut Simulation) -> Result<String> {
        let node_id = simulation
            .current_node_id
            .clone()
            .ok_or_else(|| SimulationError::Validation {
                message: "running simulation has no current node".into(),
            })?;
        if self
            .lookup_node(simulation.scenario_id, &node_id)
            .await?
            .is_none()
        {
            simulation.status = SimulationStatus::Failed;
            simulation.current_node_id = None;
            simulation.completed_at = Some(Utc::now());
            self.store.update_simulation(simulation).await?;
            return Err(SimulationError::DanglingNode { node_id });
        }
        Ok(node_id)
    }

    async fn lookup_node(&self, scenario_id: Uuid, node_id: &str) -> Result<Option<FlowNode>> {
        let nodes = self.store.nodes(scenario_id).await?;
        Ok(nodes.into_iter().find(|n| n.node_id == node_id))
    }

    async fn state_of(&self, simulation: Simulation) -> Result<SimulationState> {
        let current_node = match simulation.current_node_id.as_deref() {
            Some(node_id) => self.lookup_node(simulation.scenario_id, node_id).await?,
            None => None,
        };
        Ok(compose_state(simulation, current_node))
    }
}

/// Follow the first outgoing connection; with none, the node stays current.
fn advance(simulation: &mut Simulation, current: &str, connections: &[Connection]) {
    if let Some(connection) = connections.iter().find(|c| c.source_node_id == current) {
        simulation.current_node_id = Some(connection.target_node_id.clone());
    }
}

fn compose_state(simulation: Simulation, current_node: Option<FlowNode>) -> SimulationState {
    let mut available_actions = Vec::new();
    if simulation.status == SimulationStatus::Running {
        if let Some(node) = &current_node {
            available_actions.extend_from_slice(base_actions(node.node_type));
        }
        available_actions.push(ActionKind::Restart);
        available_actions.push(ActionKind::Stop);
    }
    SimulationState {
        simulation,
        current_node,
        available_actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_kind_decode_rejects_unknown() {
        assert_eq!(ActionKind::decode("next"), Some(ActionKind::Next));
        assert_eq!(ActionKind::decode("condition_select"), Some(ActionKind::ConditionSelect));
        assert_eq!(ActionKind::decode("teleport"), None);
    }

    #[test]
    fn base_actions_cover_every_node_type() {
        assert_eq!(base_actions(NodeType::Start), &[ActionKind::Next]);
        assert_eq!(base_actions(NodeType::Message), &[ActionKind::Next]);
        assert_eq!(base_actions(NodeType::Branch), &[ActionKind::Next]);
        assert_eq!(base_actions(NodeType::Transfer), &[ActionKind::Next]);
        assert_eq!(base_actions(NodeType::Input), &[ActionKind::Input]);
        assert_eq!(base_actions(NodeType::Condition), &[ActionKind::ConditionSelect]);
        assert!(base_actions(NodeType::End).is_empty());
    }
}
