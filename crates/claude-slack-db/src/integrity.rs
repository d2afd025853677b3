//! Integrity checks (§7 `Integrity`). Wraps SQLite's own consistency
//! checkers so a corrupted database surfaces as a typed error at startup
//! rather than as a confusing downstream query failure.

use crate::error::{DbError, DbResult};
use sqlx::SqlitePool;

/// Fast structural check (`PRAGMA quick_check`), suitable for every
/// startup: verifies page structure without the full index cross-check.
pub async fn quick_check(pool: &SqlitePool) -> DbResult<()> {
    let rows: Vec<String> = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)?;
    check_rows(rows)
}

/// Exhaustive check (`PRAGMA integrity_check`), including every index and
/// foreign key; slower, intended for admin-triggered diagnostics rather
/// than every process start.
pub async fn full_check(pool: &SqlitePool) -> DbResult<()> {
    let rows: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)?;
    check_rows(rows)
}

fn check_rows(rows: Vec<String>) -> DbResult<()> {
    if rows.len() == 1 && rows[0] == "ok" {
        return Ok(());
    }
    Err(DbError::Integrity(rows.join("; ")))
}
