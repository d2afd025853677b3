//! Admin CLI for the Claude-Slack broker. Scoped deliberately narrow (§6):
//! the broker's own message/channel/search surface is for agents, reached
//! through the MCP-facing host process, not this binary. This binary only
//! manages project links, the one piece of state an operator needs to touch
//! by hand — pairing two project directories so their agents become mutually
//! discoverable and DM-able.

#![forbid(unsafe_code)]

pub mod output;

use claude_slack::Broker;
use claude_slack_core::config::Config;
use clap::{Parser, Subcommand};
use output::CliTable;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Broker(#[from] claude_slack_core::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "claude-slack", version, about = "Claude-Slack admin CLI: project link management")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the broker's SQLite database. Overrides DB_PATH.
    #[arg(long, global = true, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Link two projects so their agents can discover and DM each other.
    Link {
        /// Absolute path of the first project.
        project_a: String,
        /// Absolute path of the second project.
        project_b: String,
        /// Link kind: `bidirectional` (default) or `one-way`.
        #[arg(long, default_value = "bidirectional")]
        link_type: String,
    },
    /// Remove a link between two projects.
    Unlink {
        project_a: String,
        project_b: String,
    },
    /// Show the links for a single project.
    Status {
        /// Absolute path of the project.
        project: String,
    },
    /// List every project link known to the broker.
    List,
}

/// Run the CLI to completion and return the process exit code: `0` on
/// success, `1` for a caller error (bad argument, unknown project), `2` for
/// a backend failure (§6: admin surface exit codes).
pub async fn run(cli: Cli) -> i32 {
    let mut config = Config::from_env();
    if let Some(path) = cli.db_path {
        config.db_path = path;
    }

    let broker = match Broker::open(config, None).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(%e, "failed to open broker");
            return 2;
        }
    };

    let result = match cli.command {
        Commands::Link { project_a, project_b, link_type } => link(&broker, &project_a, &project_b, &link_type).await,
        Commands::Unlink { project_a, project_b } => unlink(&broker, &project_a, &project_b).await,
        Commands::Status { project } => status(&broker, &project).await,
        Commands::List => list(&broker).await,
    };

    let code = match result {
        Ok(()) => 0,
        Err(CliError::InvalidArgument(msg)) => {
            eprintln!("error: {msg}");
            1
        }
        Err(CliError::Broker(claude_slack_core::Error::NotFound(msg))) => {
            eprintln!("error: {msg}");
            1
        }
        Err(CliError::Broker(e)) => {
            eprintln!("error: {e}");
            2
        }
    };

    if let Err(e) = broker.close().await {
        tracing::warn!(%e, "error while closing broker");
    }
    code
}

async fn resolve_project(broker: &Broker, path: &str) -> CliResult<String> {
    let name = PathBuf::from(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let project = broker.ensure_project(path, &name).await?;
    Ok(project.id)
}

async fn link(broker: &Broker, project_a: &str, project_b: &str, link_type: &str) -> CliResult<()> {
    if link_type != "bidirectional" && link_type != "one-way" {
        return Err(CliError::InvalidArgument(format!("unknown link type: {link_type}")));
    }
    let a = resolve_project(broker, project_a).await?;
    let b = resolve_project(broker, project_b).await?;
    let link = broker.link_projects(&a, &b, link_type).await?;
    println!("linked {} <-> {} ({})", link.project_a, link.project_b, link.link_type);
    Ok(())
}

async fn unlink(broker: &Broker, project_a: &str, project_b: &str) -> CliResult<()> {
    let a = resolve_project(broker, project_a).await?;
    let b = resolve_project(broker, project_b).await?;
    broker.unlink_projects(&a, &b).await?;
    println!("unlinked {a} <-> {b}");
    Ok(())
}

async fn status(broker: &Broker, project: &str) -> CliResult<()> {
    let id = resolve_project(broker, project).await?;
    let links = broker.link_status(&id).await?;
    let mut table = CliTable::new(vec!["PROJECT_A", "PROJECT_B", "TYPE", "ENABLED"]);
    for link in links {
        table.add_row(vec![link.project_a, link.project_b, link.link_type, link.enabled.to_string()]);
    }
    table.render();
    Ok(())
}

async fn list(broker: &Broker) -> CliResult<()> {
    let links = broker.list_links().await?;
    let mut table = CliTable::new(vec!["PROJECT_A", "PROJECT_B", "TYPE", "ENABLED"]);
    for link in links {
        table.add_row(vec![link.project_a, link.project_b, link.link_type, link.enabled.to_string()]);
    }
    table.render();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_unlink_status_round_trip() {
        let broker = Broker::open_in_memory().await.unwrap();
        link(&broker, "/tmp/proj-a", "/tmp/proj-b", "bidirectional").await.unwrap();
        let a_id = resolve_project(&broker, "/tmp/proj-a").await.unwrap();
        let links = broker.link_status(&a_id).await.unwrap();
        assert_eq!(links.len(), 1);

        unlink(&broker, "/tmp/proj-a", "/tmp/proj-b").await.unwrap();
        let links = broker.link_status(&a_id).await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn link_rejects_unknown_link_type() {
        let broker = Broker::open_in_memory().await.unwrap();
        let err = link(&broker, "/tmp/proj-a", "/tmp/proj-b", "weird").await.unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument(_)));
    }
}
