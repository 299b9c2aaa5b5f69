//! Persistence seam for the scenario engine.
//!
//! [`FlowStore`] is the typed CRUD contract both engines are constructed
//! against. Two backends ship with the crate:
//!
//! - [`MemoryStore`] — volatile, for tests and development
//! - [`SqliteStore`] — durable SQLite storage (feature `sqlite`, on by
//!   default)
//!
//! The only multi-entity write in the core is rollback's bulk replace;
//! it is exposed as the atomic [`FlowStore::replace_graph`] so each backend
//! can run it inside its own transaction. Everything else is row-level
//! CRUD plus a small query surface.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Connection, FlowNode, Scenario};
use crate::simulation::Simulation;
use crate::versions::Version;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("backend error: {message}")]
    #[diagnostic(
        code(callweave::store::backend),
        help("Ensure the database URL is valid and the store is reachable.")
    )]
    Backend { message: String },

    #[error("JSON serialization error: {source}")]
    #[diagnostic(
        code(callweave::store::serde),
        help("Check persisted JSON shapes for snapshot/config/session payloads.")
    )]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("corrupt persisted row: {message}")]
    #[diagnostic(code(callweave::store::corrupt))]
    Corrupt { message: String },

    #[error("version '{version}' already exists for scenario {scenario_id}")]
    #[diagnostic(code(callweave::store::duplicate_version))]
    DuplicateVersion { scenario_id: Uuid, version: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Transactional CRUD contract for all scenario-engine entities.
///
/// Ordering guarantees the engines rely on:
///
/// - [`connections`](Self::connections) returns edges in insertion order —
///   this is the "enumeration order" simulation advancing is defined over.
/// - [`versions`](Self::versions) and [`latest_version`](Self::latest_version)
///   order by creation time, newest first, breaking ties toward the most
///   recently inserted row.
/// - [`replace_graph`](Self::replace_graph) is all-or-nothing: on failure
///   the scenario's live graph is unchanged.
#[async_trait]
pub trait FlowStore: Send + Sync {
    // Scenarios
    async fn insert_scenario(&self, scenario: &Scenario) -> Result<()>;
    async fn get_scenario(&self, scenario_id: Uuid) -> Result<Option<Scenario>>;
    async fn update_scenario(&self, scenario: &Scenario) -> Result<()>;

    // Live graph
    async fn insert_node(&self, node: &FlowNode) -> Result<()>;
    async fn insert_connection(&self, connection: &Connection) -> Result<()>;
    async fn nodes(&self, scenario_id: Uuid) -> Result<Vec<FlowNode>>;
    async fn connections(&self, scenario_id: Uuid) -> Result<Vec<Connection>>;

    /// Atomically replace the scenario's entire live graph.
    async fn replace_graph(
        &self,
        scenario_id: Uuid,
        nodes: Vec<FlowNode>,
        connections: Vec<Connection>,
    ) -> Result<()>;

    // Versions (append-only: there is deliberately no update or delete)
    async fn insert_version(&self, version: &Version) -> Result<()>;
    async fn get_version(&self, version_id: Uuid) -> Result<Option<Version>>;
    async fn latest_version(&self, scenario_id: Uuid) -> Result<Option<Version>>;
    async fn version_by_label(&self, scenario_id: Uuid, version: &str) -> Result<Option<Version>>;
    async fn versions(&self, scenario_id: Uuid, include_auto: bool) -> Result<Vec<Version>>;

    // Simulations
    async fn insert_simulation(&self, simulation: &Simulation) -> Result<()>;
    async fn get_simulation(&self, simulation_id: Uuid) -> Result<Option<Simulation>>;
    async fn update_simulation(&self, simulation: &Simulation) -> Result<()>;
    async fn running_simulations(&self, scenario_id: Uuid, user: &str) -> Result<Vec<Simulation>>;
}
