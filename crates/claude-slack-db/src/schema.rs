//! Schema creation and migrations (§6 "Relational schema (normative)").
//!
//! Migrations are applied additively against `PRAGMA user_version`, matching
//! the teacher's `schema.rs`/`migrate.rs` split but collapsed into one file
//! since this crate has a single migration generation so far.

use crate::error::{DbError, DbResult};
use sqlx::{Executor, SqlitePool};

/// One forward-only migration: a target `user_version` and the SQL to reach
/// it from the previous version.
pub struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

/// All migrations in order. Adding a new column/table bumps the version and
/// appends a migration; existing migrations are never edited in place
/// (§6: "existing semantics may not change under a schema version bump").
pub const MIGRATIONS: &[Migration] = &[Migration { version: 1, sql: CREATE_TABLES_SQL }];

pub const CREATE_TABLES_SQL: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    path       TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    metadata   TEXT NOT NULL DEFAULT '{}',
    created_at REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS agents (
    name             TEXT NOT NULL,
    project_id       TEXT REFERENCES projects(id),
    identity_key     TEXT GENERATED ALWAYS AS (name || ':' || coalesce(project_id, '')) STORED,
    description      TEXT NOT NULL DEFAULT '',
    dm_policy        TEXT NOT NULL DEFAULT 'open' CHECK (dm_policy IN ('open','restricted','closed')),
    discoverable     TEXT NOT NULL DEFAULT 'public' CHECK (discoverable IN ('public','project','private')),
    status           TEXT NOT NULL DEFAULT 'active',
    exclude_defaults TEXT NOT NULL DEFAULT '[]',
    never_default    INTEGER NOT NULL DEFAULT 0,
    created_at       REAL NOT NULL,
    updated_at       REAL NOT NULL,
    PRIMARY KEY (name, project_id),
    UNIQUE (identity_key)
);
CREATE INDEX IF NOT EXISTS idx_agents_project ON agents(project_id);

CREATE TABLE IF NOT EXISTS channels (
    id                 TEXT PRIMARY KEY,
    channel_type       TEXT NOT NULL CHECK (channel_type IN ('channel','direct')),
    access_type        TEXT NOT NULL CHECK (access_type IN ('open','members','private')),
    scope              TEXT NOT NULL CHECK (scope IN ('global','project')),
    project_id         TEXT REFERENCES projects(id),
    name               TEXT NOT NULL,
    description        TEXT NOT NULL DEFAULT '',
    is_default         INTEGER NOT NULL DEFAULT 0,
    is_archived        INTEGER NOT NULL DEFAULT 0,
    archived_at        REAL,
    owner_name         TEXT,
    owner_project_id   TEXT,
    created_at         REAL NOT NULL,
    CHECK ((scope = 'project') = (project_id IS NOT NULL)),
    CHECK (channel_type != 'direct' OR access_type = 'private')
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_scope_name_active
    ON channels(scope, project_id, name) WHERE is_archived = 0;
CREATE INDEX IF NOT EXISTS idx_channels_project ON channels(project_id);
CREATE INDEX IF NOT EXISTS idx_channels_owner ON channels(owner_name, owner_project_id);

CREATE TABLE IF NOT EXISTS channel_members (
    channel_id            TEXT NOT NULL REFERENCES channels(id),
    agent_name            TEXT NOT NULL,
    agent_project_id      TEXT,
    member_identity_key    TEXT GENERATED ALWAYS AS (agent_name || ':' || coalesce(agent_project_id, '')) STORED,
    can_leave             INTEGER NOT NULL DEFAULT 1,
    can_send              INTEGER NOT NULL DEFAULT 1,
    can_invite            INTEGER NOT NULL DEFAULT 0,
    can_manage            INTEGER NOT NULL DEFAULT 0,
    invited_by_name       TEXT,
    invited_by_project_id TEXT,
    source                TEXT NOT NULL DEFAULT 'manual' CHECK (source IN ('frontmatter','manual','default','system')),
    is_from_default       INTEGER NOT NULL DEFAULT 0,
    opted_out             INTEGER NOT NULL DEFAULT 0,
    opted_out_at          REAL,
    last_read_at          REAL,
    last_read_message_id  INTEGER,
    is_muted              INTEGER NOT NULL DEFAULT 0,
    joined_at             REAL NOT NULL,
    PRIMARY KEY (channel_id, agent_name, agent_project_id),
    UNIQUE (channel_id, member_identity_key)
);
CREATE INDEX IF NOT EXISTS idx_members_agent ON channel_members(agent_name, agent_project_id);
CREATE INDEX IF NOT EXISTS idx_members_agent_active ON channel_members(agent_name, agent_project_id, opted_out);

CREATE TABLE IF NOT EXISTS messages (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id        TEXT NOT NULL REFERENCES channels(id),
    sender_name       TEXT NOT NULL,
    sender_project_id TEXT,
    content           TEXT NOT NULL,
    timestamp         REAL NOT NULL,
    confidence        REAL CHECK (confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
    metadata          TEXT NOT NULL DEFAULT '{}',
    thread_id         TEXT,
    is_deleted        INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_messages_channel_ts ON messages(channel_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_name, sender_project_id);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);

CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='id'
);
CREATE TRIGGER IF NOT EXISTS messages_fts_insert AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;
CREATE TRIGGER IF NOT EXISTS messages_fts_delete AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content) VALUES ('delete', old.id, old.content);
END;

CREATE TABLE IF NOT EXISTS dm_permissions (
    agent_name        TEXT NOT NULL,
    agent_project_id  TEXT,
    other_name        TEXT NOT NULL,
    other_project_id  TEXT,
    permission        TEXT NOT NULL CHECK (permission IN ('allow','block')),
    reason            TEXT,
    created_at        REAL NOT NULL,
    PRIMARY KEY (agent_name, agent_project_id, other_name, other_project_id)
);

CREATE TABLE IF NOT EXISTS project_links (
    project_a  TEXT NOT NULL REFERENCES projects(id),
    project_b  TEXT NOT NULL REFERENCES projects(id),
    link_type  TEXT NOT NULL CHECK (link_type IN ('bidirectional','a_to_b','b_to_a')),
    enabled    INTEGER NOT NULL DEFAULT 1,
    created_at REAL NOT NULL,
    PRIMARY KEY (project_a, project_b),
    CHECK (project_a < project_b)
);

CREATE TABLE IF NOT EXISTS sessions (
    id         TEXT PRIMARY KEY,
    project_id TEXT REFERENCES projects(id),
    agent_name TEXT,
    created_at REAL NOT NULL,
    expires_at REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

CREATE TABLE IF NOT EXISTS tool_calls (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    tool_name  TEXT NOT NULL,
    created_at REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tool_calls_session ON tool_calls(session_id);

CREATE TABLE IF NOT EXISTS config_sync_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    applied_at    REAL NOT NULL,
    config_hash   TEXT NOT NULL,
    plan_summary  TEXT NOT NULL
);

-- Views (§6). These expose the raw access/visibility facts; the nuanced
-- policy composition (restricted/open/closed, project-link directionality)
-- lives in claude-slack-db::queries::permissions, which is the single
-- source of truth those rules compose from.

CREATE VIEW IF NOT EXISTS agent_channels AS
    SELECT cm.agent_name, cm.agent_project_id, cm.channel_id, c.scope, c.project_id AS channel_project_id
    FROM channel_members cm
    JOIN channels c ON c.id = cm.channel_id
    WHERE cm.opted_out = 0 AND c.is_archived = 0;

CREATE VIEW IF NOT EXISTS dm_access AS
    SELECT a.name AS agent_name, a.project_id AS agent_project_id,
           b.name AS other_name, b.project_id AS other_project_id
    FROM agents a
    CROSS JOIN agents b
    WHERE NOT (a.name = b.name AND coalesce(a.project_id,'') = coalesce(b.project_id,''))
      AND a.dm_policy != 'closed' AND b.dm_policy != 'closed'
      AND NOT EXISTS (
          SELECT 1 FROM dm_permissions p
          WHERE p.permission = 'block'
            AND ((p.agent_name = a.name AND coalesce(p.agent_project_id,'') = coalesce(a.project_id,'')
                  AND p.other_name = b.name AND coalesce(p.other_project_id,'') = coalesce(b.project_id,''))
              OR (p.agent_name = b.name AND coalesce(p.agent_project_id,'') = coalesce(b.project_id,'')
                  AND p.other_name = a.name AND coalesce(p.other_project_id,'') = coalesce(a.project_id,'')))
      );

CREATE VIEW IF NOT EXISTS agent_discovery AS
    SELECT a.name, a.project_id, a.discoverable, a.status
    FROM agents a
    WHERE a.discoverable != 'private';

CREATE VIEW IF NOT EXISTS shared_channels AS
    SELECT c.id AS channel_id, c.project_id AS project_id, pl.project_a, pl.project_b, pl.link_type
    FROM channels c
    JOIN project_links pl ON (pl.project_a = c.project_id OR pl.project_b = c.project_id)
    WHERE c.scope = 'project' AND pl.enabled = 1;
";

/// Apply all migrations newer than the database's current `user_version`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(DbError::Sqlx)?;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let mut conn = pool.acquire().await.map_err(DbError::Sqlx)?;
        conn.execute(migration.sql).await.map_err(DbError::Sqlx)?;
        conn.execute(format!("PRAGMA user_version = {}", migration.version).as_str())
            .await
            .map_err(DbError::Sqlx)?;
        tracing::info!(version = migration.version, "applied schema migration");
    }
    Ok(())
}
