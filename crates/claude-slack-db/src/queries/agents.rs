//! Agent CRUD (§3 `Agent`).

use crate::error::{DbError, DbResult};
use crate::models::AgentRow;
use crate::timestamps::now_seconds;
use sqlx::{Connection, Sqlite, SqlitePool};

pub struct NewAgent<'a> {
    pub name: &'a str,
    pub project_id: Option<&'a str>,
    pub description: &'a str,
    pub dm_policy: &'a str,
    pub discoverable: &'a str,
}

/// Register or update an agent. Idempotent on `(name, project_id)`
/// (§3: "exactly one record per identity").
pub async fn upsert_agent<'c, E>(executor: E, agent: NewAgent<'_>) -> DbResult<AgentRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    sqlx::query_as::<_, AgentRow>(
        "INSERT INTO agents (name, project_id, description, dm_policy, discoverable, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'active', ?, ?)
         ON CONFLICT(identity_key) DO UPDATE SET
             description = excluded.description,
             dm_policy = excluded.dm_policy,
             discoverable = excluded.discoverable,
             updated_at = excluded.updated_at
         RETURNING *",
    )
    .bind(agent.name)
    .bind(agent.project_id)
    .bind(agent.description)
    .bind(agent.dm_policy)
    .bind(agent.discoverable)
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn get_agent(
    pool: &SqlitePool,
    name: &str,
    project_id: Option<&str>,
) -> DbResult<AgentRow> {
    sqlx::query_as::<_, AgentRow>(
        "SELECT * FROM agents WHERE name = ? AND project_id IS ?",
    )
    .bind(name)
    .bind(project_id)
    .fetch_optional(pool)
    .await
    .map_err(DbError::Sqlx)?
    .ok_or_else(|| DbError::NotFound(format!("agent {name}")))
}

pub async fn list_agents(pool: &SqlitePool, project_id: Option<&str>) -> DbResult<Vec<AgentRow>> {
    sqlx::query_as::<_, AgentRow>("SELECT * FROM agents WHERE project_id IS ? ORDER BY name")
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
}

/// Remove an agent and its channel memberships (§3: delete is not part of
/// the public surface but is used by the admin CLI and tests to reset
/// fixtures).
pub async fn delete_agent(
    conn: &mut sqlx::SqliteConnection,
    name: &str,
    project_id: Option<&str>,
) -> DbResult<()> {
    let mut tx = conn.begin().await.map_err(DbError::Sqlx)?;
    sqlx::query("DELETE FROM channel_members WHERE agent_name = ? AND agent_project_id IS ?")
        .bind(name)
        .bind(project_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Sqlx)?;
    sqlx::query("DELETE FROM agents WHERE name = ? AND project_id IS ?")
        .bind(name)
        .bind(project_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Sqlx)?;
    tx.commit().await.map_err(DbError::Sqlx)?;
    Ok(())
}
