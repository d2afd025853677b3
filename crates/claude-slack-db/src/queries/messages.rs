//! Message CRUD (§3 `Message`).

use crate::error::{DbError, DbResult};
use crate::models::MessageRow;
use crate::timestamps::now_seconds;
use sqlx::{Sqlite, SqlitePool};

pub struct NewMessage<'a> {
    pub channel_id: &'a str,
    pub sender_name: &'a str,
    pub sender_project_id: Option<&'a str>,
    pub content: &'a str,
    pub confidence: Option<f64>,
    pub metadata: &'a str,
    pub thread_id: Option<&'a str>,
}

/// Append a message to a channel. Messages are append-only; there is no
/// update path (§4.3: "no edit/delete beyond soft-delete").
pub async fn insert_message<'c, E>(executor: E, msg: NewMessage<'_>) -> DbResult<MessageRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages
            (channel_id, sender_name, sender_project_id, content, timestamp,
             confidence, metadata, thread_id, is_deleted)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
         RETURNING *",
    )
    .bind(msg.channel_id)
    .bind(msg.sender_name)
    .bind(msg.sender_project_id)
    .bind(msg.content)
    .bind(now)
    .bind(msg.confidence)
    .bind(msg.metadata)
    .bind(msg.thread_id)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn get_message(pool: &SqlitePool, id: i64) -> DbResult<MessageRow> {
    sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(DbError::Sqlx)?
        .ok_or_else(|| DbError::NotFound(format!("message {id}")))
}

pub async fn list_messages_by_ids(pool: &SqlitePool, ids: &[i64]) -> DbResult<Vec<MessageRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT * FROM messages WHERE id IN ({placeholders}) AND is_deleted = 0");
    let mut query = sqlx::query_as::<_, MessageRow>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    query.fetch_all(pool).await.map_err(DbError::Sqlx)
}

/// Most recent non-deleted messages in a channel, newest first.
pub async fn list_recent(pool: &SqlitePool, channel_id: &str, limit: i64) -> DbResult<Vec<MessageRow>> {
    sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages
         WHERE channel_id = ? AND is_deleted = 0
         ORDER BY timestamp DESC LIMIT ?",
    )
    .bind(channel_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)
}

/// Soft-delete a message, leaving the row (and its audit trail) in place.
pub async fn soft_delete_message<'c, E>(executor: E, id: i64) -> DbResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query("UPDATE messages SET is_deleted = 1 WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await
        .map_err(DbError::Sqlx)?;
    if rows.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("message {id}")));
    }
    Ok(())
}
