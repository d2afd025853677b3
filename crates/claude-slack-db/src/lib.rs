//! `SQLite` persistence layer (§4.1, §6): schema, migrations, connection
//! pooling, retry/circuit-breaking, integrity checks, and the query
//! functions the façade composes into its public API.

#![forbid(unsafe_code)]

pub mod error;
pub mod integrity;
pub mod models;
pub mod pool;
pub mod queries;
pub mod retry;
pub mod schema;
pub mod timestamps;
pub mod tracking;

pub use error::{DbError, DbResult};
pub use pool::DbPool;
