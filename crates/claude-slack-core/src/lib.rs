//! Shared types for the Claude-Slack core broker: error taxonomy,
//! configuration, id grammar, the metadata filter AST, and ranking profiles.
//!
//! Every other crate in this workspace depends on this one; it depends on
//! nothing else in the workspace.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod ranking;

pub use config::Config;
pub use error::{Error, Result};
