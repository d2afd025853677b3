//! Project CRUD (§3 `Project`).

use crate::error::{DbError, DbResult};
use crate::models::ProjectRow;
use crate::timestamps::now_seconds;
use claude_slack_core::ids::project_id;
use sqlx::{Sqlite, SqlitePool};

/// Ensure a project row exists for `path`, creating it if absent. Keyed on
/// the unique `path` column so repeated calls are idempotent (§4.1:
/// "ensure operations are expressed as upserts, never read-then-write
/// races"). Generic over the executor so callers can pass either the
/// reader pool or the single writer connection.
pub async fn ensure_project<'c, E>(executor: E, path: &str, name: &str) -> DbResult<ProjectRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let id = project_id(path);
    let now = now_seconds();
    sqlx::query_as::<_, ProjectRow>(
        "INSERT INTO projects (id, path, name, metadata, created_at) VALUES (?, ?, ?, '{}', ?)
         ON CONFLICT(path) DO UPDATE SET name = excluded.name
         RETURNING *",
    )
    .bind(id)
    .bind(path)
    .bind(name)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn get_project(pool: &SqlitePool, id: &str) -> DbResult<ProjectRow> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Sqlx)?
        .ok_or_else(|| DbError::NotFound(format!("project {id}")))
}

pub async fn get_project_by_path(pool: &SqlitePool, path: &str) -> DbResult<Option<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE path = ?")
        .bind(path)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Sqlx)
}

pub async fn list_projects(pool: &SqlitePool) -> DbResult<Vec<ProjectRow>> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects ORDER BY created_at")
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
}
