//! # Callweave: Versioned Call-Flow Scenario Engine
//!
//! Callweave manages versioned, node-graph call-flow definitions (IVR
//! scenarios) and executes them as live, steppable sessions. Two tightly
//! coupled subsystems operate on one shared graph model:
//!
//! - **Version control** — the [`versions::VersionStore`] snapshots a
//!   scenario's node/connection graph into immutable, numbered version
//!   records, summarizes changes between snapshots through the pure
//!   [`diff`] engine, and restores a scenario to any prior snapshot by
//!   atomically replacing the live graph. History is append-only: rollback
//!   appends a new version, it never rewrites one.
//! - **Simulation** — the [`simulation::SimulationEngine`] interprets the
//!   live graph as a finite-state machine, advancing a session node by node
//!   in response to typed user actions, with legal actions derived from the
//!   current node's type on every state read.
//!
//! Both engines are constructed with their collaborators passed in: a
//! [`store::FlowStore`] for persistence and an
//! [`identity::IdentityProvider`] for attribution. No global state.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use callweave::identity::StaticIdentity;
//! use callweave::model::{FlowNode, NodeType, Position, Scenario};
//! use callweave::simulation::{ActionRequest, SimulationEngine};
//! use callweave::store::{FlowStore, MemoryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let identity = Arc::new(StaticIdentity::new("demo"));
//!
//! // Seed a two-node graph (normally the graph editor's job).
//! let scenario = Scenario::new("welcome-line", Some("demo".into()));
//! store.insert_scenario(&scenario).await?;
//! for (node_id, node_type) in [("entry", NodeType::Start), ("bye", NodeType::End)] {
//!     store
//!         .insert_node(&FlowNode {
//!             scenario_id: scenario.id,
//!             node_id: node_id.into(),
//!             node_type,
//!             name: node_id.into(),
//!             position: Position::default(),
//!             config: serde_json::Value::Null,
//!         })
//!         .await?;
//! }
//! store
//!     .insert_connection(&callweave::model::Connection {
//!         scenario_id: scenario.id,
//!         source_node_id: "entry".into(),
//!         target_node_id: "bye".into(),
//!         handle: None,
//!         label: None,
//!     })
//!     .await?;
//!
//! // Walk it.
//! let engine = SimulationEngine::new(store, identity);
//! let session = engine.start_simulation(scenario.id).await?;
//! let after = engine
//!     .execute_action(session.simulation.id, ActionRequest::next())
//!     .await?;
//! assert_eq!(after.simulation.current_node_id.as_deref(), Some("bye"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`model`] - Shared graph entities and snapshot capture
//! - [`diff`] - Pure structural diff between two snapshots
//! - [`versions`] - Immutable version records, numbering, and rollback
//! - [`simulation`] - Steppable finite-state sessions over the live graph
//! - [`store`] - Persistence trait and the memory/SQLite backends
//! - [`identity`] - Attribution seam
//! - [`config`] - Runtime configuration resolution
//! - [`telemetry`] - Tracing subscriber bootstrap

pub mod config;
pub mod diff;
pub mod identity;
pub mod model;
pub mod simulation;
pub mod store;
pub mod telemetry;
pub mod versions;
