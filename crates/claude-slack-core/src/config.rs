//! Environment-driven configuration for the broker.
//!
//! Mirrors the teacher's `env`-var-first configuration style: every field
//! has a sane default and can be overridden by an environment variable of
//! the same (upper-snake) name. `.env` files are loaded via `dotenvy` if
//! present, matching `mcp-agent-mail-core::config`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Read an environment variable, falling back to `default` when unset or empty.
pub fn env_value(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Which vector backend to dual-write to and search against (§4.4, §9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorBackendKind {
    /// No vector index configured: search falls back to the filter-only path.
    None,
    /// A local, on-disk flat index (brute-force cosine over an mmapped file).
    Local(PathBuf),
    /// A remote vector service reachable over HTTP (e.g. Qdrant).
    Remote { url: String, api_key: Option<String> },
}

/// Top-level broker configuration, loaded once at `Broker::open`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file (`DB_PATH`). `:memory:` for tests.
    pub db_path: PathBuf,
    /// Vector backend selection, derived from `VECTOR_URL` / `VECTOR_PATH`.
    pub vector_backend: VectorBackendKind,

    /// Reader pool size (§5: bounded, default 10 readers + 1 writer).
    pub pool_readers: usize,
    /// Acquire timeout for a pooled connection.
    pub pool_acquire_timeout: Duration,

    /// Default deadline for query operations (§5: 30s default).
    pub default_query_deadline: Duration,

    /// Default per-subscriber event queue depth (§4.7: default 1024).
    pub event_queue_depth: usize,

    /// Run `PRAGMA quick_check` at startup.
    pub integrity_check_on_startup: bool,
}

impl Config {
    /// Build configuration from the process environment, with `.env`
    /// loaded first if present (errors from a missing `.env` are ignored).
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let db_path = PathBuf::from(env_value("DB_PATH", "./claude-slack.sqlite3"));

        let vector_backend = if let Ok(url) = env::var("VECTOR_URL") {
            if url.is_empty() {
                VectorBackendKind::None
            } else {
                VectorBackendKind::Remote {
                    url,
                    api_key: env::var("VECTOR_API_KEY").ok().filter(|s| !s.is_empty()),
                }
            }
        } else if let Ok(path) = env::var("VECTOR_PATH") {
            if path.is_empty() {
                VectorBackendKind::None
            } else {
                VectorBackendKind::Local(PathBuf::from(path))
            }
        } else {
            VectorBackendKind::None
        };

        Self {
            db_path,
            vector_backend,
            pool_readers: env_usize("DB_POOL_READERS", 10),
            pool_acquire_timeout: Duration::from_millis(env_u64("DB_POOL_TIMEOUT_MS", 30_000)),
            default_query_deadline: Duration::from_secs(env_u64("QUERY_DEADLINE_SECS", 30)),
            event_queue_depth: env_usize("EVENT_QUEUE_DEPTH", 1024),
            integrity_check_on_startup: env_value("INTEGRITY_CHECK_ON_STARTUP", "true") == "true",
        }
    }

    /// An in-memory configuration suitable for tests: private SQLite memory
    /// DB, no vector backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(":memory:"),
            vector_backend: VectorBackendKind::None,
            pool_readers: 4,
            pool_acquire_timeout: Duration::from_secs(5),
            default_query_deadline: Duration::from_secs(30),
            event_queue_depth: 64,
            integrity_check_on_startup: false,
        }
    }
}

/// Declarative default-provisioning configuration, loaded from YAML
/// (§4.8). Maps directly onto the reconciler's desired-state input.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub channels: Vec<DefaultChannelSpec>,
    #[serde(default)]
    pub project_links: Vec<ProjectLinkSpec>,
}

/// One declared default channel (§4.8).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct DefaultChannelSpec {
    pub name: String,
    pub scope: String,
    #[serde(default = "default_access_type")]
    pub access_type: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub description: String,
}

fn default_access_type() -> String {
    "open".to_string()
}

/// One declared project link (§3 `ProjectLink`).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ProjectLinkSpec {
    pub project_a: String,
    pub project_b: String,
    #[serde(default = "default_link_type")]
    pub link_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_link_type() -> String {
    "bidirectional".to_string()
}

fn default_true() -> bool {
    true
}

impl ReconcilerConfig {
    /// Parse from a YAML string (the on-disk declarative config file).
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_has_no_vector_backend() {
        let c = Config::in_memory();
        assert_eq!(c.vector_backend, VectorBackendKind::None);
    }

    #[test]
    fn reconciler_config_parses_minimal_yaml() {
        let yaml = r"
channels:
  - name: general
    scope: global
    access_type: open
    is_default: true
project_links:
  - project_a: /a
    project_b: /b
";
        let cfg = ReconcilerConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].name, "general");
        assert_eq!(cfg.project_links[0].link_type, "bidirectional");
    }
}
