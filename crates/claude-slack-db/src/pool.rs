//! Connection pool configuration and initialization (§4.1, §5).
//!
//! `SQLite` WAL mode allows unlimited concurrent readers but serializes
//! writers, so the pool is split into a bounded reader pool plus one
//! dedicated writer connection guarded by a `tokio::sync::Mutex` — this is
//! the "single serialized writer path" §4.1/§5 call for, mirrored on the
//! teacher's `mcp-agent-mail-db::pool` sizing rationale (readers sized for
//! read-heavy search/list traffic, one writer since SQLite only runs one
//! write transaction at a time regardless of pool size).

use crate::error::{DbError, DbResult};
use crate::schema;
use claude_slack_core::config::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The broker's database handle: a bounded reader pool plus one serialized
/// writer connection.
#[derive(Clone)]
pub struct DbPool {
    readers: SqlitePool,
    writer: Arc<Mutex<SqliteConnection>>,
}

impl DbPool {
    /// Open (creating if necessary) the SQLite database at `config.db_path`,
    /// run pending migrations, and return a ready-to-use pool.
    pub async fn open(config: &Config) -> DbResult<Self> {
        let db_path = config.db_path.to_string_lossy().to_string();

        let reader_opts = connect_options(&db_path)?.read_only(false);
        let readers = SqlitePoolOptions::new()
            .max_connections(config.pool_readers as u32)
            .acquire_timeout(config.pool_acquire_timeout)
            .connect_with(reader_opts)
            .await
            .map_err(DbError::Sqlx)?;

        schema::run_migrations(&readers).await?;

        let writer_opts = connect_options(&db_path)?;
        let writer = writer_opts.connect().await.map_err(DbError::Sqlx)?;

        if config.integrity_check_on_startup {
            let _ = crate::integrity::quick_check(&readers).await;
        }

        Ok(Self { readers, writer: Arc::new(Mutex::new(writer)) })
    }

    /// An in-memory pool for tests: single shared in-memory database so the
    /// reader pool and writer connection see the same data.
    pub async fn open_in_memory() -> DbResult<Self> {
        // A plain `sqlite::memory:` URL gives each connection its own private
        // database; `file::memory:?cache=shared` shares one across the pool.
        let url = "sqlite:file::memory:?cache=shared&uri=true";
        let readers = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(url)
            .await
            .map_err(DbError::Sqlx)?;
        schema::run_migrations(&readers).await?;
        let writer = SqliteConnectOptions::from_str(url)
            .map_err(DbError::Sqlx)?
            .connect()
            .await
            .map_err(DbError::Sqlx)?;
        Ok(Self { readers, writer: Arc::new(Mutex::new(writer)) })
    }

    /// Borrow the reader pool for concurrent, non-mutating queries.
    #[must_use]
    pub fn readers(&self) -> &SqlitePool {
        &self.readers
    }

    /// Acquire the single writer connection. Every public mutation acquires
    /// this, does its work inside one transaction, and releases it —
    /// callers must not hold it across an await on a different subsystem
    /// (§5: "No operation holds a lock across suspension to a different
    /// subsystem").
    pub async fn writer(&self) -> tokio::sync::MutexGuard<'_, SqliteConnection> {
        self.writer.lock().await
    }
}

fn connect_options(db_path: &str) -> DbResult<SqliteConnectOptions> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))
        .map_err(DbError::Sqlx)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
    Ok(opts)
}

/// Auto-detect a reasonable reader pool size from available CPU
/// parallelism, matching the teacher's `auto_pool_size` heuristic.
#[must_use]
pub fn auto_pool_size() -> usize {
    let cpus = std::thread::available_parallelism().map_or(4, std::num::NonZero::get);
    (cpus * 4).clamp(4, 50)
}
