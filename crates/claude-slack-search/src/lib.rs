//! Filter compiler, vector index adapter, and hybrid ranking (§4.3–§4.5,
//! §9). Sits on top of `claude-slack-db` and is consumed by the `claude-slack`
//! façade.

#![forbid(unsafe_code)]

pub mod compiler;
pub mod error;
pub mod hybrid;
pub mod sync;
pub mod vector_index;

pub use error::{SearchError, SearchResult};
