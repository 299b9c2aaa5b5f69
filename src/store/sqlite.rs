/*!
SQLite-backed store.

Durable [`FlowStore`] implementation over an sqlx `SqlitePool`.

## Behavior

- Entity identifiers are stored as canonical UUID text; timestamps as
  RFC3339 text.
- Structured payloads (node position/config, version snapshots and change
  summaries, simulation session data) are serialized to JSON text columns
  through serde.
- When the `sqlite-migrations` feature is enabled (default), embedded
  migrations (`sqlx::migrate!("./migrations")`) are executed on connect;
  disabling the feature assumes external migration orchestration.
- The `versions` table carries `UNIQUE(scenario_id, version)`; a label
  collision surfaces as [`StoreError::DuplicateVersion`], which is how
  concurrent auto-versioning races resolve.
- [`replace_graph`](FlowStore::replace_graph) runs delete-then-recreate
  inside a single transaction; on any failure the transaction rolls back
  and the live graph is unchanged.
*/

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;
use uuid::Uuid;

use crate::model::{Connection, FlowNode, NodeType, Scenario};
use crate::simulation::{Simulation, SimulationStatus};
use crate::versions::{Version, VersionStatus};

use super::{FlowStore, Result, StoreError};

/// SQLite-backed [`FlowStore`].
pub struct SqliteStore {
    /// Shared connection pool for concurrent store operations.
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

fn backend(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        message: format!("{context}: {e}"),
    }
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt {
        message: format!("{what} is not a UUID: {e}"),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteStore {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: `"sqlite://callweave.db?mode=rwc"`.
    #[must_use = "store must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| backend("connect error", e))?;
        // Run embedded migrations only if the feature is enabled (idempotent).
        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(backend("migration failure", e));
            }
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    fn row_to_scenario(row: &SqliteRow) -> Result<Scenario> {
        let id: String = row.get("id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(Scenario {
            id: parse_uuid(&id, "scenarios.id")?,
            name: row.get("name"),
            description: row.get("description"),
            created_by: row.get("created_by"),
            created_at: parse_timestamp(&created_at),
            updated_by: row.get("updated_by"),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn row_to_node(row: &SqliteRow) -> Result<FlowNode> {
        let scenario_id: String = row.get("scenario_id");
        let node_type: String = row.get("node_type");
        let position_json: String = row.get("position_json");
        let config_json: String = row.get("config_json");
        Ok(FlowNode {
            scenario_id: parse_uuid(&scenario_id, "nodes.scenario_id")?,
            node_id: row.get("node_id"),
            node_type: NodeType::decode(&node_type).ok_or_else(|| StoreError::Corrupt {
                message: format!("unknown node type '{node_type}'"),
            })?,
            name: row.get("name"),
            position: serde_json::from_str(&position_json)?,
            config: serde_json::from_str(&config_json)?,
        })
    }

    fn row_to_connection(row: &SqliteRow) -> Result<Connection> {
        let scenario_id: String = row.get("scenario_id");
        Ok(Connection {
            scenario_id: parse_uuid(&scenario_id, "connections.scenario_id")?,
            source_node_id: row.get("source_node_id"),
            target_node_id: row.get("target_node_id"),
            handle: row.get("handle"),
            label: row.get("label"),
        })
    }

    fn row_to_version(row: &SqliteRow) -> Result<Version> {
        let id: String = row.get("id");
        let scenario_id: String = row.get("scenario_id");
        let status: String = row.get("status");
        let snapshot_json: String = row.get("snapshot_json");
        let change_summary_json: Option<String> = row.get("change_summary_json");
        let auto_generated: i64 = row.get("auto_generated");
        let parent_version_id: Option<String> = row.get("parent_version_id");
        let created_at: String = row.get("created_at");
        Ok(Version {
            id: parse_uuid(&id, "versions.id")?,
            scenario_id: parse_uuid(&scenario_id, "versions.scenario_id")?,
            version: row.get("version"),
            status: VersionStatus::decode(&status).ok_or_else(|| StoreError::Corrupt {
                message: format!("unknown version status '{status}'"),
            })?,
            tag: row.get("tag"),
            notes: row.get("notes"),
            snapshot: serde_json::from_str(&snapshot_json)?,
            change_summary: change_summary_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            auto_generated: auto_generated != 0,
            parent_version_id: parent_version_id
                .as_deref()
                .map(|s| parse_uuid(s, "versions.parent_version_id"))
                .transpose()?,
            created_by: row.get("created_by"),
            created_at: parse_timestamp(&created_at),
        })
    }

    fn row_to_simulation(row: &SqliteRow) -> Result<Simulation> {
        let id: String = row.get("id");
        let scenario_id: String = row.get("scenario_id");
        let session_data_json: String = row.get("session_data_json");
        let status: String = row.get("status");
        let started_at: String = row.get("started_at");
        let completed_at: Option<String> = row.get("completed_at");
        Ok(Simulation {
            id: parse_uuid(&id, "simulations.id")?,
            scenario_id: parse_uuid(&scenario_id, "simulations.scenario_id")?,
            start_node_id: row.get("start_node_id"),
            current_node_id: row.get("current_node_id"),
            session_data: serde_json::from_str(&session_data_json)?,
            status: SimulationStatus::decode(&status).ok_or_else(|| StoreError::Corrupt {
                message: format!("unknown simulation status '{status}'"),
            })?,
            started_by: row.get("started_by"),
            started_at: parse_timestamp(&started_at),
            completed_at: completed_at.as_deref().map(parse_timestamp),
        })
    }
}

#[async_trait]
impl FlowStore for SqliteStore {
    #[instrument(skip(self, scenario), fields(scenario_id = %scenario.id), err)]
    async fn insert_scenario(&self, scenario: &Scenario) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scenarios (id, name, description, created_by, created_at, updated_by, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        )
        .bind(scenario.id.to_string())
        .bind(&scenario.name)
        .bind(&scenario.description)
        .bind(&scenario.created_by)
        .bind(scenario.created_at.to_rfc3339())
        .bind(&scenario.updated_by)
        .bind(scenario.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("insert scenario", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_scenario(&self, scenario_id: Uuid) -> Result<Option<Scenario>> {
        let row = sqlx::query("SELECT * FROM scenarios WHERE id = ?1")
            .bind(scenario_id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("select scenario", e))?;
        row.as_ref().map(Self::row_to_scenario).transpose()
    }

    #[instrument(skip(self, scenario), fields(scenario_id = %scenario.id), err)]
    async fn update_scenario(&self, scenario: &Scenario) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scenarios
            SET name = ?2, description = ?3, updated_by = ?4, updated_at = ?5
            WHERE id = ?1
        "#,
        )
        .bind(scenario.id.to_string())
        .bind(&scenario.name)
        .bind(&scenario.description)
        .bind(&scenario.updated_by)
        .bind(scenario.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("update scenario", e))?;
        if result.rows_affected() == 0 {
            return Err(backend("update scenario", "no such row"));
        }
        Ok(())
    }

    #[instrument(skip(self, node), fields(node_id = %node.node_id), err)]
    async fn insert_node(&self, node: &FlowNode) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nodes (scenario_id, node_id, node_type, name, position_json, config_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        )
        .bind(node.scenario_id.to_string())
        .bind(&node.node_id)
        .bind(node.node_type.encode())
        .bind(&node.name)
        .bind(serde_json::to_string(&node.position)?)
        .bind(serde_json::to_string(&node.config)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("insert node", e))?;
        Ok(())
    }

    #[instrument(skip(self, connection), err)]
    async fn insert_connection(&self, connection: &Connection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connections (scenario_id, source_node_id, target_node_id, handle, label)
            VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        )
        .bind(connection.scenario_id.to_string())
        .bind(&connection.source_node_id)
        .bind(&connection.target_node_id)
        .bind(&connection.handle)
        .bind(&connection.label)
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("insert connection", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn nodes(&self, scenario_id: Uuid) -> Result<Vec<FlowNode>> {
        let rows = sqlx::query("SELECT * FROM nodes WHERE scenario_id = ?1 ORDER BY rowid")
            .bind(scenario_id.to_string())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| backend("select nodes", e))?;
        rows.iter().map(Self::row_to_node).collect()
    }

    #[instrument(skip(self), err)]
    async fn connections(&self, scenario_id: Uuid) -> Result<Vec<Connection>> {
        let rows = sqlx::query("SELECT * FROM connections WHERE scenario_id = ?1 ORDER BY rowid")
            .bind(scenario_id.to_string())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| backend("select connections", e))?;
        rows.iter().map(Self::row_to_connection).collect()
    }

    #[instrument(skip(self, nodes, connections), fields(nodes = nodes.len(), connections = connections.len()), err)]
    async fn replace_graph(
        &self,
        scenario_id: Uuid,
        nodes: Vec<FlowNode>,
        connections: Vec<Connection>,
    ) -> Result<()> {
        let scenario_key = scenario_id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend("tx begin", e))?;

        sqlx::query("DELETE FROM nodes WHERE scenario_id = ?1")
            .bind(&scenario_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| backend("delete nodes", e))?;
        sqlx::query("DELETE FROM connections WHERE scenario_id = ?1")
            .bind(&scenario_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| backend("delete connections", e))?;

        for node in &nodes {
            sqlx::query(
                r#"
                INSERT INTO nodes (scenario_id, node_id, node_type, name, position_json, config_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            )
            .bind(&scenario_key)
            .bind(&node.node_id)
            .bind(node.node_type.encode())
            .bind(&node.name)
            .bind(serde_json::to_string(&node.position)?)
            .bind(serde_json::to_string(&node.config)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| backend("recreate node", e))?;
        }
        for connection in &connections {
            sqlx::query(
                r#"
                INSERT INTO connections (scenario_id, source_node_id, target_node_id, handle, label)
                VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            )
            .bind(&scenario_key)
            .bind(&connection.source_node_id)
            .bind(&connection.target_node_id)
            .bind(&connection.handle)
            .bind(&connection.label)
            .execute(&mut *tx)
            .await
            .map_err(|e| backend("recreate connection", e))?;
        }

        tx.commit().await.map_err(|e| backend("tx commit", e))?;
        Ok(())
    }

    #[instrument(skip(self, version), fields(version = %version.version), err)]
    async fn insert_version(&self, version: &Version) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO versions (
                id,
                scenario_id,
                version,
                status,
                tag,
                notes,
                snapshot_json,
                change_summary_json,
                auto_generated,
                parent_version_id,
                created_by,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        )
        .bind(version.id.to_string())
        .bind(version.scenario_id.to_string())
        .bind(&version.version)
        .bind(version.status.encode())
        .bind(&version.tag)
        .bind(&version.notes)
        .bind(serde_json::to_string(&version.snapshot)?)
        .bind(
            version
                .change_summary
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(i64::from(version.auto_generated))
        .bind(version.parent_version_id.map(|id| id.to_string()))
        .bind(&version.created_by)
        .bind(version.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateVersion {
                    scenario_id: version.scenario_id,
                    version: version.version.clone(),
                })
            }
            Err(e) => Err(backend("insert version", e)),
        }
    }

    #[instrument(skip(self), err)]
    async fn get_version(&self, version_id: Uuid) -> Result<Option<Version>> {
        let row = sqlx::query("SELECT * FROM versions WHERE id = ?1")
            .bind(version_id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("select version", e))?;
        row.as_ref().map(Self::row_to_version).transpose()
    }

    #[instrument(skip(self), err)]
    async fn latest_version(&self, scenario_id: Uuid) -> Result<Option<Version>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM versions
            WHERE scenario_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(scenario_id.to_string())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| backend("select latest version", e))?;
        row.as_ref().map(Self::row_to_version).transpose()
    }

    #[instrument(skip(self), err)]
    async fn version_by_label(&self, scenario_id: Uuid, version: &str) -> Result<Option<Version>> {
        let row = sqlx::query("SELECT * FROM versions WHERE scenario_id = ?1 AND version = ?2")
            .bind(scenario_id.to_string())
            .bind(version)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("select version by label", e))?;
        row.as_ref().map(Self::row_to_version).transpose()
    }

    #[instrument(skip(self), err)]
    async fn versions(&self, scenario_id: Uuid, include_auto: bool) -> Result<Vec<Version>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM versions
            WHERE scenario_id = ?1 AND (?2 OR auto_generated = 0)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(scenario_id.to_string())
        .bind(include_auto)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| backend("select versions", e))?;
        rows.iter().map(Self::row_to_version).collect()
    }

    #[instrument(skip(self, simulation), fields(simulation_id = %simulation.id), err)]
    async fn insert_simulation(&self, simulation: &Simulation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO simulations (
                id,
                scenario_id,
                start_node_id,
                current_node_id,
                session_data_json,
                status,
                started_by,
                started_at,
                completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        )
        .bind(simulation.id.to_string())
        .bind(simulation.scenario_id.to_string())
        .bind(&simulation.start_node_id)
        .bind(&simulation.current_node_id)
        .bind(serde_json::to_string(&simulation.session_data)?)
        .bind(simulation.status.encode())
        .bind(&simulation.started_by)
        .bind(simulation.started_at.to_rfc3339())
        .bind(simulation.completed_at.map(|t| t.to_rfc3339()))
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("insert simulation", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_simulation(&self, simulation_id: Uuid) -> Result<Option<Simulation>> {
        let row = sqlx::query("SELECT * FROM simulations WHERE id = ?1")
            .bind(simulation_id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("select simulation", e))?;
        row.as_ref().map(Self::row_to_simulation).transpose()
    }

    #[instrument(skip(self, simulation), fields(simulation_id = %simulation.id), err)]
    async fn update_simulation(&self, simulation: &Simulation) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE simulations
            SET current_node_id = ?2,
                session_data_json = ?3,
                status = ?4,
                completed_at = ?5
            WHERE id = ?1
        "#,
        )
        .bind(simulation.id.to_string())
        .bind(&simulation.current_node_id)
        .bind(serde_json::to_string(&simulation.session_data)?)
        .bind(simulation.status.encode())
        .bind(simulation.completed_at.map(|t| t.to_rfc3339()))
        .execute(&*self.pool)
        .await
        .map_err(|e| backend("update simulation", e))?;
        if result.rows_affected() == 0 {
            return Err(backend("update simulation", "no such row"));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn running_simulations(&self, scenario_id: Uuid, user: &str) -> Result<Vec<Simulation>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM simulations
            WHERE scenario_id = ?1 AND started_by = ?2 AND status = 'running'
            ORDER BY started_at DESC
            "#,
        )
        .bind(scenario_id.to_string())
        .bind(user)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| backend("select running simulations", e))?;
        rows.iter().map(Self::row_to_simulation).collect()
    }
}
