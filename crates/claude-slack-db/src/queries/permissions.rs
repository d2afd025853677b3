//! The three permission primitives (§4.2): every higher-level access
//! decision in the façade composes these, and nothing else touches
//! `dm_permissions`/`project_links` directly.

use crate::error::{DbError, DbResult};
use crate::models::ChannelRow;
use sqlx::SqlitePool;

/// Channels `agent` currently has a non-opted-out membership in.
///
/// "A single query resolves 'channels visible to agent X': X has a
/// non-opted-out membership row." (§4.2)
pub async fn visible_channels_for(
    pool: &SqlitePool,
    agent_name: &str,
    agent_project_id: Option<&str>,
) -> DbResult<Vec<ChannelRow>> {
    sqlx::query_as::<_, ChannelRow>(
        "SELECT c.* FROM channels c
         JOIN channel_members cm ON cm.channel_id = c.id
         WHERE cm.agent_name = ? AND cm.agent_project_id IS ?
           AND cm.opted_out = 0 AND c.is_archived = 0
         ORDER BY c.created_at",
    )
    .bind(agent_name)
    .bind(agent_project_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)
}

async fn allow_exists(
    pool: &SqlitePool,
    from_name: &str,
    from_project: Option<&str>,
    to_name: &str,
    to_project: Option<&str>,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dm_permissions
         WHERE agent_name = ? AND agent_project_id IS ?
           AND other_name = ? AND other_project_id IS ?
           AND permission = 'allow'",
    )
    .bind(from_name)
    .bind(from_project)
    .bind(to_name)
    .bind(to_project)
    .fetch_one(pool)
    .await
    .map_err(DbError::Sqlx)?;
    Ok(count > 0)
}

async fn block_exists(
    pool: &SqlitePool,
    a_name: &str,
    a_project: Option<&str>,
    b_name: &str,
    b_project: Option<&str>,
) -> DbResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM dm_permissions
         WHERE permission = 'block'
           AND ((agent_name = ? AND agent_project_id IS ? AND other_name = ? AND other_project_id IS ?)
             OR (agent_name = ? AND agent_project_id IS ? AND other_name = ? AND other_project_id IS ?))",
    )
    .bind(a_name)
    .bind(a_project)
    .bind(b_name)
    .bind(b_project)
    .bind(b_name)
    .bind(b_project)
    .bind(a_name)
    .bind(a_project)
    .fetch_one(pool)
    .await
    .map_err(DbError::Sqlx)?;
    Ok(count > 0)
}

/// "A second query resolves 'can X DM Y': neither direction has a `block`;
/// neither party's policy is `closed`; if Y is `restricted`, an `allow`
/// from Y to X must exist (likewise if X is `restricted`)." (§4.2)
///
/// Returns `Ok(true)`/`Ok(false)` rather than an error so callers can
/// choose whether the negative case is `PolicyDenied` or a quiet no-op.
pub async fn can_dm(
    pool: &SqlitePool,
    x_name: &str,
    x_project: Option<&str>,
    y_name: &str,
    y_project: Option<&str>,
) -> DbResult<bool> {
    let x_policy = dm_policy_of(pool, x_name, x_project).await?;
    let y_policy = dm_policy_of(pool, y_name, y_project).await?;

    if x_policy == "closed" || y_policy == "closed" {
        return Ok(false);
    }
    if block_exists(pool, x_name, x_project, y_name, y_project).await? {
        return Ok(false);
    }
    if y_policy == "restricted" && !allow_exists(pool, y_name, y_project, x_name, x_project).await? {
        return Ok(false);
    }
    if x_policy == "restricted" && !allow_exists(pool, x_name, x_project, y_name, y_project).await? {
        return Ok(false);
    }
    Ok(true)
}

async fn dm_policy_of(pool: &SqlitePool, name: &str, project_id: Option<&str>) -> DbResult<String> {
    sqlx::query_scalar::<_, String>("SELECT dm_policy FROM agents WHERE name = ? AND project_id IS ?")
        .bind(name)
        .bind(project_id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Sqlx)?
        .ok_or_else(|| DbError::NotFound(format!("agent {name}")))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscoverableAgent {
    pub name: String,
    pub project_id: Option<String>,
    pub discoverable: String,
    pub status: String,
}

/// "A third query, discovery, lists agents X may see: public always;
/// private never; `project` visible iff same project, X is global, or the
/// two projects are linked (per `ProjectLink`, with `bidirectional` meaning
/// both directions and directional types meaning one)." (§4.2)
pub async fn discoverable_agents_for(
    pool: &SqlitePool,
    x_project: Option<&str>,
) -> DbResult<Vec<DiscoverableAgent>> {
    sqlx::query_as::<_, DiscoverableAgent>(
        "SELECT a.name, a.project_id, a.discoverable, a.status
         FROM agents a
         WHERE a.discoverable = 'public'
            OR (a.discoverable = 'project' AND (
                  ? IS NULL
               OR a.project_id IS NULL
               OR a.project_id = ?
               OR EXISTS (
                    SELECT 1 FROM project_links pl
                    WHERE pl.enabled = 1
                      AND (
                           (pl.project_a = ? AND pl.project_b = a.project_id AND pl.link_type IN ('bidirectional','a_to_b'))
                        OR (pl.project_b = ? AND pl.project_a = a.project_id AND pl.link_type IN ('bidirectional','b_to_a'))
                      )
                  )
            ))
         ORDER BY a.name",
    )
    .bind(x_project)
    .bind(x_project)
    .bind(x_project)
    .bind(x_project)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)
}
