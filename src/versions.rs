//! Version store: immutable snapshots, derived numbering, and rollback.
//!
//! Versions form the append-only history of a scenario's graph. Every
//! operation here either reads history or appends to it; no operation ever
//! mutates or deletes an existing version record. Rollback restores the
//! live graph from a stored snapshot and records the restoration itself as
//! a new version.
//!
//! The store is constructed with its persistence and identity collaborators
//! passed in; it holds no global state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callweave::identity::StaticIdentity;
//! use callweave::store::MemoryStore;
//! use callweave::versions::VersionStore;
//! use uuid::Uuid;
//!
//! # async fn example(scenario_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let versions = VersionStore::new(store, Arc::new(StaticIdentity::new("editor")));
//!
//! let v = versions.auto_create_version(scenario_id, Some("initial import")).await?;
//! assert_eq!(v.version, "1.0");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::diff::{DiffSummary, VersionDiff, diff_snapshots};
use crate::identity::IdentityProvider;
use crate::model::{GraphSnapshot, Scenario};
use crate::store::{FlowStore, StoreError};

/// Lifecycle status of a version record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Stable,
    Release,
    Deprecated,
}

impl VersionStatus {
    /// Encode a `VersionStatus` into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Stable => "stable",
            VersionStatus::Release => "release",
            VersionStatus::Deprecated => "deprecated",
        }
    }

    /// Decode a persisted string form back into a `VersionStatus`.
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(VersionStatus::Draft),
            "stable" => Some(VersionStatus::Stable),
            "release" => Some(VersionStatus::Release),
            "deprecated" => Some(VersionStatus::Deprecated),
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.encode())
    }
}

/// An immutable, numbered snapshot record of a scenario's graph.
///
/// `parent_version_id` is a plain informational foreign key; ordering for
/// head determination uses `created_at`, never chain traversal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub scenario_id: Uuid,
    /// Dotted `major.minor` label, derived for auto-created versions.
    pub version: String,
    pub status: VersionStatus,
    pub tag: Option<String>,
    pub notes: Option<String>,
    pub snapshot: GraphSnapshot,
    /// Structural change counts relative to the prior version; absent on
    /// the first version of a scenario.
    pub change_summary: Option<DiffSummary>,
    pub auto_generated: bool,
    pub parent_version_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for a manually created version.
#[derive(Clone, Debug)]
pub struct ManualVersionRequest {
    pub version: String,
    pub status: VersionStatus,
    pub tag: Option<String>,
    pub notes: Option<String>,
}

/// Options controlling a rollback operation.
#[derive(Clone, Debug, Default)]
pub struct RollbackOptions {
    /// Snapshot the live graph as an auto-created backup version before
    /// replacing it.
    pub create_backup: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum VersionError {
    #[error("scenario not found: {scenario_id}")]
    #[diagnostic(code(callweave::versions::scenario_not_found))]
    ScenarioNotFound { scenario_id: Uuid },

    #[error("version not found: {version_id}")]
    #[diagnostic(code(callweave::versions::version_not_found))]
    VersionNotFound { version_id: Uuid },

    #[error("version '{version}' already exists for scenario {scenario_id}")]
    #[diagnostic(
        code(callweave::versions::duplicate),
        help("Pick an unused version label, or let auto-versioning derive the next one.")
    )]
    DuplicateVersion { scenario_id: Uuid, version: String },

    #[error(transparent)]
    #[diagnostic(code(callweave::versions::store))]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// Derive the next version label from the most recent one.
///
/// `"X.Y"` with two integer parts bumps the minor; anything else gets
/// `".1"` appended; no prior version starts the scenario at `"1.0"`.
#[must_use]
pub fn next_version_label(prev: Option<&str>) -> String {
    let Some(prev) = prev else {
        return "1.0".to_string();
    };
    let parts: Vec<&str> = prev.split('.').collect();
    if let [major, minor] = parts.as_slice()
        && let (Ok(major), Ok(minor)) = (major.parse::<u64>(), minor.parse::<u64>())
    {
        return format!("{major}.{}", minor + 1);
    }
    format!("{prev}.1")
}

/// Creates, numbers, and retrieves immutable snapshots of scenario graphs,
/// and restores scenarios to prior snapshots.
///
/// History is append-only: rollback appends, never rewrites. The delete-
/// then-recreate step of a rollback runs inside one store transaction via
/// [`FlowStore::replace_graph`]; a partial failure leaves the live graph
/// unchanged.
pub struct VersionStore {
    store: Arc<dyn FlowStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl VersionStore {
    pub fn new(store: Arc<dyn FlowStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Snapshot the current live graph as a new auto-generated draft version.
    ///
    /// The version label is derived from the most recently created version
    /// (see [`next_version_label`]); the change summary is computed against
    /// the prior snapshot and skipped for a scenario's first version.
    #[instrument(skip(self, description), err)]
    pub async fn auto_create_version(
        &self,
        scenario_id: Uuid,
        description: Option<&str>,
    ) -> Result<Version> {
        let scenario = self.require_scenario(scenario_id).await?;
        let snapshot = self.capture_live(&scenario).await?;
        let prior = self.store.latest_version(scenario_id).await?;

        let version = self
            .build_version(
                &scenario,
                snapshot,
                prior.as_ref(),
                next_version_label(prior.as_ref().map(|p| p.version.as_str())),
                VersionStatus::Draft,
                None,
                description.map(str::to_string),
                true,
            )
            .await?;
        Ok(version)
    }

    /// Snapshot the current live graph under a caller-supplied label.
    ///
    /// Fails with [`VersionError::DuplicateVersion`] when that exact label
    /// already exists for the scenario.
    #[instrument(skip(self, request), fields(version = %request.version), err)]
    pub async fn create_manual_version(
        &self,
        scenario_id: Uuid,
        request: ManualVersionRequest,
    ) -> Result<Version> {
        let scenario = self.require_scenario(scenario_id).await?;
        if self
            .store
            .version_by_label(scenario_id, &request.version)
            .await?
            .is_some()
        {
            return Err(VersionError::DuplicateVersion {
                scenario_id,
                version: request.version,
            });
        }
        let snapshot = self.capture_live(&scenario).await?;
        let prior = self.store.latest_version(scenario_id).await?;

        let version = self
            .build_version(
                &scenario,
                snapshot,
                prior.as_ref(),
                request.version,
                request.status,
                request.tag,
                request.notes,
                false,
            )
            .await?;
        Ok(version)
    }

    /// Structural difference between two stored versions.
    ///
    /// The versions need not be adjacent in history.
    #[instrument(skip(self), err)]
    pub async fn compare_versions(
        &self,
        version_from_id: Uuid,
        version_to_id: Uuid,
    ) -> Result<VersionDiff> {
        let from = self.require_version(version_from_id).await?;
        let to = self.require_version(version_to_id).await?;
        Ok(diff_snapshots(&from.snapshot, &to.snapshot))
    }

    /// Replace the live graph with a stored snapshot, appending to history.
    ///
    /// The target must belong to `scenario_id`. With
    /// [`RollbackOptions::create_backup`] set, the pre-rollback live graph
    /// is first captured as its own auto-generated version. The restoration
    /// is recorded as a new stable version tagged
    /// `rollback-<target.version>`; prior version records are never touched.
    #[instrument(skip(self, options), err)]
    pub async fn rollback_to_version(
        &self,
        scenario_id: Uuid,
        target_version_id: Uuid,
        options: RollbackOptions,
    ) -> Result<Version> {
        let target = self.require_version(target_version_id).await?;
        if target.scenario_id != scenario_id {
            return Err(VersionError::VersionNotFound {
                version_id: target_version_id,
            });
        }
        let mut scenario = self.require_scenario(scenario_id).await?;

        if options.create_backup {
            let label = format!("pre-rollback backup before restoring {}", target.version);
            self.auto_create_version(scenario_id, Some(&label)).await?;
        }

        // All-or-nothing: delete every live row and recreate from the
        // snapshot inside one store transaction.
        let nodes: Vec<_> = target
            .snapshot
            .nodes
            .iter()
            .cloned()
            .map(|n| n.into_flow_node(scenario_id))
            .collect();
        let connections: Vec<_> = target
            .snapshot
            .connections
            .iter()
            .cloned()
            .map(|c| c.into_connection(scenario_id))
            .collect();
        self.store
            .replace_graph(scenario_id, nodes, connections)
            .await?;

        let user = self.identity.current_user();
        scenario.updated_by = Some(user);
        scenario.updated_at = Utc::now();
        self.store.update_scenario(&scenario).await?;

        let prior = self.store.latest_version(scenario_id).await?;
        let version = self
            .build_version(
                &scenario,
                target.snapshot.clone(),
                prior.as_ref(),
                next_version_label(prior.as_ref().map(|p| p.version.as_str())),
                VersionStatus::Stable,
                Some(format!("rollback-{}", target.version)),
                options.notes,
                false,
            )
            .await?;
        Ok(version)
    }

    /// Version history for a scenario, newest first.
    #[instrument(skip(self), err)]
    pub async fn get_version_history(
        &self,
        scenario_id: Uuid,
        include_auto: bool,
    ) -> Result<Vec<Version>> {
        self.require_scenario(scenario_id).await?;
        Ok(self.store.versions(scenario_id, include_auto).await?)
    }

    async fn require_scenario(&self, scenario_id: Uuid) -> Result<Scenario> {
        self.store
            .get_scenario(scenario_id)
            .await?
            .ok_or(VersionError::ScenarioNotFound { scenario_id })
    }

    async fn require_version(&self, version_id: Uuid) -> Result<Version> {
        self.store
            .get_version(version_id)
            .await?
            .ok_or(VersionError::VersionNotFound { version_id })
    }

    async fn capture_live(&self, scenario: &Scenario) -> Result<GraphSnapshot> {
        let nodes = self.store.nodes(scenario.id).await?;
        let connections = self.store.connections(scenario.id).await?;
        Ok(GraphSnapshot::capture(scenario, &nodes, &connections))
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_version(
        &self,
        scenario: &Scenario,
        snapshot: GraphSnapshot,
        prior: Option<&Version>,
        label: String,
        status: VersionStatus,
        tag: Option<String>,
        notes: Option<String>,
        auto_generated: bool,
    ) -> Result<Version> {
        let change_summary = prior.map(|p| diff_snapshots(&p.snapshot, &snapshot).summary);
        let version = Version {
            id: Uuid::new_v4(),
            scenario_id: scenario.id,
            version: label,
            status,
            tag,
            notes,
            snapshot,
            change_summary,
            auto_generated,
            parent_version_id: prior.map(|p| p.id),
            created_by: self.identity.current_user(),
            created_at: Utc::now(),
        };
        match self.store.insert_version(&version).await {
            Ok(()) => Ok(version),
            // A concurrent writer deriving the same label loses the race at
            // the store's uniqueness check instead of committing a twin.
            Err(StoreError::DuplicateVersion {
                scenario_id,
                version,
            }) => Err(VersionError::DuplicateVersion {
                scenario_id,
                version,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_derivation_bumps_minor() {
        assert_eq!(next_version_label(None), "1.0");
        assert_eq!(next_version_label(Some("1.0")), "1.1");
        assert_eq!(next_version_label(Some("2.9")), "2.10");
    }

    #[test]
    fn label_derivation_appends_when_unparsable() {
        assert_eq!(next_version_label(Some("alpha")), "alpha.1");
        assert_eq!(next_version_label(Some("1.2.3")), "1.2.3.1");
        assert_eq!(next_version_label(Some("1.x")), "1.x.1");
    }
}
