//! Search-layer error type. Converts into `claude_slack_core::Error` at the
//! crate boundary, same convention as `claude-slack-db::error`.

use claude_slack_core::Error as CoreError;
use thiserror::Error;

pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("filter error: {0}")]
    Filter(String),

    #[error("vector backend unavailable: {0}")]
    Unavailable(String),

    #[error("vector backend returned an error: {0}")]
    Backend(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Db(#[from] claude_slack_db::DbError),
}

impl From<SearchError> for CoreError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Filter(s) => Self::FilterError(s),
            SearchError::Unavailable(s) | SearchError::Backend(s) => Self::Unavailable(s),
            SearchError::DimensionMismatch { expected, actual } => {
                Self::InvalidArgument(format!("dimension mismatch: expected {expected}, got {actual}"))
            }
            SearchError::Db(e) => e.into(),
        }
    }
}
