//! Narrow database error type. Converts into `claude_slack_core::Error` at
//! the crate boundary so every layer above `claude-slack-db` only ever deals
//! with the one flat taxonomy (§7).

use claude_slack_core::Error as CoreError;
use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("pool exhausted")]
    PoolExhausted,

    #[error("database locked")]
    Locked,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Returns `true` for `SQLITE_BUSY`/`SQLITE_LOCKED`-shaped errors, which the
/// retry loop treats as transient (§4.1, §7).
#[must_use]
pub fn is_lock_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_ascii_lowercase();
            msg.contains("locked") || msg.contains("busy")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(s) => Self::NotFound(s),
            DbError::Conflict(s) => Self::Conflict(s),
            DbError::Integrity(s) => Self::Integrity(s),
            DbError::PoolExhausted => Self::Unavailable("database pool exhausted".into()),
            DbError::Locked => Self::Unavailable("database locked".into()),
            DbError::Sqlx(e) if is_lock_error(&e) => Self::Unavailable(e.to_string()),
            DbError::Sqlx(sqlx::Error::RowNotFound) => Self::NotFound("row not found".into()),
            DbError::Sqlx(e) => Self::Integrity(e.to_string()),
        }
    }
}
