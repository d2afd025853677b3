//! Session and tool-call bookkeeping (§3 `Session`, `ToolCall`). Sessions
//! are TTL-bound; expired rows are purged lazily rather than by a
//! background sweep, matching the teacher's session-store convention.

use crate::error::{DbError, DbResult};
use crate::models::{SessionRow, ToolCallRow};
use crate::timestamps::now_seconds;
use sqlx::{Connection, Sqlite, SqlitePool};

pub async fn create_session<'c, E>(
    executor: E,
    id: &str,
    project_id: Option<&str>,
    agent_name: Option<&str>,
    ttl_seconds: f64,
) -> DbResult<SessionRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    sqlx::query_as::<_, SessionRow>(
        "INSERT INTO sessions (id, project_id, agent_name, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(id)
    .bind(project_id)
    .bind(agent_name)
    .bind(now)
    .bind(now + ttl_seconds)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> DbResult<SessionRow> {
    sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Sqlx)?
        .ok_or_else(|| DbError::NotFound(format!("session {id}")))
}

/// Whether a session row both exists and has not passed `expires_at`.
pub async fn session_is_live(pool: &SqlitePool, id: &str) -> DbResult<bool> {
    let now = now_seconds();
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sessions WHERE id = ? AND expires_at > ?",
    )
    .bind(id)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(DbError::Sqlx)?;
    Ok(count > 0)
}

/// Delete sessions (and their tool calls) past `expires_at`. Returns the
/// number of sessions purged. Runs as its own transaction on the writer
/// connection since it spans two tables.
pub async fn purge_expired_sessions(conn: &mut sqlx::SqliteConnection) -> DbResult<u64> {
    let now = now_seconds();
    let mut tx = conn.begin().await.map_err(DbError::Sqlx)?;
    sqlx::query(
        "DELETE FROM tool_calls WHERE session_id IN (SELECT id FROM sessions WHERE expires_at <= ?)",
    )
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(DbError::Sqlx)?;
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Sqlx)?;
    tx.commit().await.map_err(DbError::Sqlx)?;
    Ok(result.rows_affected())
}

pub async fn record_tool_call<'c, E>(executor: E, session_id: &str, tool_name: &str) -> DbResult<ToolCallRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    sqlx::query_as::<_, ToolCallRow>(
        "INSERT INTO tool_calls (session_id, tool_name, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(session_id)
    .bind(tool_name)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn tool_calls_for_session(pool: &SqlitePool, session_id: &str) -> DbResult<Vec<ToolCallRow>> {
    sqlx::query_as::<_, ToolCallRow>("SELECT * FROM tool_calls WHERE session_id = ? ORDER BY created_at")
        .bind(session_id)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
}
