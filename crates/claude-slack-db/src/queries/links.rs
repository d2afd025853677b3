//! Project link CRUD (§3 `ProjectLink`). Backs the `link`/`unlink`/`list`
//! admin CLI surface (§6).

use crate::error::{DbError, DbResult};
use crate::models::ProjectLinkRow;
use crate::timestamps::now_seconds;
use sqlx::{Sqlite, SqlitePool};

/// Canonical `(project_a, project_b)` ordering enforced by the schema's
/// `CHECK (project_a < project_b)`.
fn order_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b { (a, b) } else { (b, a) }
}

pub async fn link_projects<'c, E>(
    executor: E,
    project_a: &str,
    project_b: &str,
    link_type: &str,
) -> DbResult<ProjectLinkRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    if project_a == project_b {
        return Err(DbError::Conflict("cannot link a project to itself".into()));
    }
    let (a, b) = order_pair(project_a, project_b);
    let now = now_seconds();
    sqlx::query_as::<_, ProjectLinkRow>(
        "INSERT INTO project_links (project_a, project_b, link_type, enabled, created_at)
         VALUES (?, ?, ?, 1, ?)
         ON CONFLICT(project_a, project_b) DO UPDATE SET link_type = excluded.link_type, enabled = 1
         RETURNING *",
    )
    .bind(a)
    .bind(b)
    .bind(link_type)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn unlink_projects<'c, E>(executor: E, project_a: &str, project_b: &str) -> DbResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let (a, b) = order_pair(project_a, project_b);
    let rows = sqlx::query("DELETE FROM project_links WHERE project_a = ? AND project_b = ?")
        .bind(a)
        .bind(b)
        .execute(executor)
        .await
        .map_err(DbError::Sqlx)?;
    if rows.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("link between {a} and {b}")));
    }
    Ok(())
}

pub async fn get_link(
    pool: &SqlitePool,
    project_a: &str,
    project_b: &str,
) -> DbResult<Option<ProjectLinkRow>> {
    let (a, b) = order_pair(project_a, project_b);
    sqlx::query_as::<_, ProjectLinkRow>(
        "SELECT * FROM project_links WHERE project_a = ? AND project_b = ?",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn list_links(pool: &SqlitePool) -> DbResult<Vec<ProjectLinkRow>> {
    sqlx::query_as::<_, ProjectLinkRow>("SELECT * FROM project_links ORDER BY created_at")
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
}

pub async fn links_for_project(pool: &SqlitePool, project_id: &str) -> DbResult<Vec<ProjectLinkRow>> {
    sqlx::query_as::<_, ProjectLinkRow>(
        "SELECT * FROM project_links WHERE (project_a = ? OR project_b = ?) AND enabled = 1",
    )
    .bind(project_id)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)
}
