//! Entity models (§3). Field names and types mirror the schema in
//! `schema.rs` one-for-one so `sqlx::FromRow` derives map directly onto
//! `SELECT *`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub path: String,
    pub name: String,
    pub metadata: String,
    pub created_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AgentRow {
    pub name: String,
    pub project_id: Option<String>,
    pub description: String,
    pub dm_policy: String,
    pub discoverable: String,
    pub status: String,
    pub exclude_defaults: String,
    pub never_default: bool,
    pub created_at: f64,
    pub updated_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChannelRow {
    pub id: String,
    pub channel_type: String,
    pub access_type: String,
    pub scope: String,
    pub project_id: Option<String>,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub is_archived: bool,
    pub archived_at: Option<f64>,
    pub owner_name: Option<String>,
    pub owner_project_id: Option<String>,
    pub created_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChannelMemberRow {
    pub channel_id: String,
    pub agent_name: String,
    pub agent_project_id: Option<String>,
    pub can_leave: bool,
    pub can_send: bool,
    pub can_invite: bool,
    pub can_manage: bool,
    pub invited_by_name: Option<String>,
    pub invited_by_project_id: Option<String>,
    pub source: String,
    pub is_from_default: bool,
    pub opted_out: bool,
    pub opted_out_at: Option<f64>,
    pub last_read_at: Option<f64>,
    pub last_read_message_id: Option<i64>,
    pub is_muted: bool,
    pub joined_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub channel_id: String,
    pub sender_name: String,
    pub sender_project_id: Option<String>,
    pub content: String,
    pub timestamp: f64,
    pub confidence: Option<f64>,
    pub metadata: String,
    pub thread_id: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DmPermissionRow {
    pub agent_name: String,
    pub agent_project_id: Option<String>,
    pub other_name: String,
    pub other_project_id: Option<String>,
    pub permission: String,
    pub reason: Option<String>,
    pub created_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectLinkRow {
    pub project_a: String,
    pub project_b: String,
    pub link_type: String,
    pub enabled: bool,
    pub created_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub project_id: Option<String>,
    pub agent_name: Option<String>,
    pub created_at: f64,
    pub expires_at: f64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ToolCallRow {
    pub id: i64,
    pub session_id: String,
    pub tool_name: String,
    pub created_at: f64,
}
