//! Channel and membership CRUD (§3 `Channel`, `ChannelMember`).

use crate::error::{DbError, DbResult};
use crate::models::{ChannelMemberRow, ChannelRow};
use crate::timestamps::now_seconds;
use sqlx::{Sqlite, SqlitePool};

pub struct NewChannel<'a> {
    pub id: &'a str,
    pub channel_type: &'a str,
    pub access_type: &'a str,
    pub scope: &'a str,
    pub project_id: Option<&'a str>,
    pub name: &'a str,
    pub description: &'a str,
    pub is_default: bool,
    pub owner_name: Option<&'a str>,
    pub owner_project_id: Option<&'a str>,
}

/// Create a channel. The id is derived by the caller (`claude_slack_core::ids`)
/// so this is a plain insert; a name collision within the same
/// `(scope, project_id)` surfaces as `Conflict` (§6:
/// `idx_channels_scope_name_active`).
pub async fn create_channel<'c, E>(executor: E, channel: NewChannel<'_>) -> DbResult<ChannelRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    let result = sqlx::query_as::<_, ChannelRow>(
        "INSERT INTO channels
            (id, channel_type, access_type, scope, project_id, name, description,
             is_default, is_archived, owner_name, owner_project_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
         RETURNING *",
    )
    .bind(channel.id)
    .bind(channel.channel_type)
    .bind(channel.access_type)
    .bind(channel.scope)
    .bind(channel.project_id)
    .bind(channel.name)
    .bind(channel.description)
    .bind(channel.is_default)
    .bind(channel.owner_name)
    .bind(channel.owner_project_id)
    .bind(now)
    .fetch_one(executor)
    .await;

    match result {
        Ok(row) => Ok(row),
        Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
            Err(DbError::Conflict(format!("channel {} already exists", channel.name)))
        }
        Err(e) => Err(DbError::Sqlx(e)),
    }
}

/// Generic over the executor so callers that need this read inside the same
/// transaction as a subsequent write (§5: permission view and message write
/// linearised in one transaction) can pass a `Transaction` instead of the
/// reader pool.
pub async fn get_channel<'c, E>(executor: E, id: &str) -> DbResult<ChannelRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(DbError::Sqlx)?
        .ok_or_else(|| DbError::NotFound(format!("channel {id}")))
}

pub async fn find_channel_by_name(
    pool: &SqlitePool,
    scope: &str,
    project_id: Option<&str>,
    name: &str,
) -> DbResult<Option<ChannelRow>> {
    sqlx::query_as::<_, ChannelRow>(
        "SELECT * FROM channels WHERE scope = ? AND project_id IS ? AND name = ? AND is_archived = 0",
    )
    .bind(scope)
    .bind(project_id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn archive_channel<'c, E>(executor: E, id: &str) -> DbResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    let rows = sqlx::query("UPDATE channels SET is_archived = 1, archived_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(executor)
        .await
        .map_err(DbError::Sqlx)?;
    if rows.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("channel {id}")));
    }
    Ok(())
}

pub struct NewMember<'a> {
    pub channel_id: &'a str,
    pub agent_name: &'a str,
    pub agent_project_id: Option<&'a str>,
    pub can_leave: bool,
    pub can_send: bool,
    pub can_invite: bool,
    pub can_manage: bool,
    pub invited_by_name: Option<&'a str>,
    pub invited_by_project_id: Option<&'a str>,
    pub source: &'a str,
    pub is_from_default: bool,
}

/// Add (or reinstate) a channel member. Idempotent on
/// `(channel_id, member_identity_key)`; re-adding an opted-out member clears
/// the opt-out (§4.4 invite/rejoin semantics).
pub async fn add_member<'c, E>(executor: E, member: NewMember<'_>) -> DbResult<ChannelMemberRow>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    sqlx::query_as::<_, ChannelMemberRow>(
        "INSERT INTO channel_members
            (channel_id, agent_name, agent_project_id, can_leave, can_send, can_invite,
             can_manage, invited_by_name, invited_by_project_id, source, is_from_default,
             opted_out, joined_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
         ON CONFLICT(channel_id, member_identity_key) DO UPDATE SET
             opted_out = 0,
             opted_out_at = NULL,
             can_send = excluded.can_send,
             can_invite = excluded.can_invite,
             can_manage = excluded.can_manage
         RETURNING *",
    )
    .bind(member.channel_id)
    .bind(member.agent_name)
    .bind(member.agent_project_id)
    .bind(member.can_leave)
    .bind(member.can_send)
    .bind(member.can_invite)
    .bind(member.can_manage)
    .bind(member.invited_by_name)
    .bind(member.invited_by_project_id)
    .bind(member.source)
    .bind(member.is_from_default)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(DbError::Sqlx)
}

/// Mark a member opted-out rather than deleting the row, preserving history
/// (§4.4: leaving a channel is a soft state, not a delete).
pub async fn remove_member<'c, E>(
    executor: E,
    channel_id: &str,
    agent_name: &str,
    agent_project_id: Option<&str>,
) -> DbResult<()>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let now = now_seconds();
    let rows = sqlx::query(
        "UPDATE channel_members SET opted_out = 1, opted_out_at = ?
         WHERE channel_id = ? AND agent_name = ? AND agent_project_id IS ?",
    )
    .bind(now)
    .bind(channel_id)
    .bind(agent_name)
    .bind(agent_project_id)
    .execute(executor)
    .await
    .map_err(DbError::Sqlx)?;
    if rows.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("membership {agent_name} in {channel_id}")));
    }
    Ok(())
}

pub async fn get_membership<'c, E>(
    executor: E,
    channel_id: &str,
    agent_name: &str,
    agent_project_id: Option<&str>,
) -> DbResult<Option<ChannelMemberRow>>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, ChannelMemberRow>(
        "SELECT * FROM channel_members
         WHERE channel_id = ? AND agent_name = ? AND agent_project_id IS ?",
    )
    .bind(channel_id)
    .bind(agent_name)
    .bind(agent_project_id)
    .fetch_optional(executor)
    .await
    .map_err(DbError::Sqlx)
}

pub async fn list_members(pool: &SqlitePool, channel_id: &str) -> DbResult<Vec<ChannelMemberRow>> {
    sqlx::query_as::<_, ChannelMemberRow>(
        "SELECT * FROM channel_members WHERE channel_id = ? AND opted_out = 0 ORDER BY joined_at",
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await
    .map_err(DbError::Sqlx)
}
