//! Agent-configuration discovery (§4.8 phase ii): each agent may ship a
//! Markdown file with a YAML front-matter block declaring its registration
//! defaults. The front-matter delimiter handling is grounded on the
//! teacher's message-archive format (`---json\n{..}\n---\n\n{body}`);
//! here the block is YAML rather than JSON, since the declared fields
//! (`dm_policy`, `discoverable`, `exclude`, `never_default`) are meant to be
//! hand-edited.

use claude_slack_core::{Error, Result};
use serde::Deserialize;
use std::path::Path;

const FRONT_MATTER_DELIM: &str = "---\n";
const FRONT_MATTER_END: &str = "\n---\n";

/// The declared defaults an agent's own configuration file carries. Every
/// field but `name` has a default so a minimal file (`name: foo`) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentFrontMatter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_dm_policy")]
    pub dm_policy: String,
    #[serde(default = "default_discoverable")]
    pub discoverable: String,
    /// Default-channel names this agent opts out of regardless of scope
    /// match (§4.8 eligibility: "`exclude` list override").
    #[serde(default)]
    pub exclude: Vec<String>,
    /// When true, no default-channel membership is ever applied to this
    /// agent, even on a later reconcile (§4.8: "`never_default` flag
    /// override").
    #[serde(default)]
    pub never_default: bool,
}

fn default_dm_policy() -> String {
    "open".to_string()
}

fn default_discoverable() -> String {
    "project".to_string()
}

/// Split `---\n{yaml}\n---\n\n{body}` into its front-matter and body halves
/// and deserialize the front-matter. Returns `InvalidArgument` if the file
/// doesn't open with the delimiter or the YAML doesn't parse.
pub fn parse_agent_frontmatter(content: &str) -> Result<(AgentFrontMatter, &str)> {
    let rest = content
        .strip_prefix(FRONT_MATTER_DELIM)
        .ok_or_else(|| Error::InvalidArgument("agent config missing opening --- front matter delimiter".into()))?;
    let end = rest
        .find(FRONT_MATTER_END)
        .ok_or_else(|| Error::InvalidArgument("agent config missing closing --- front matter delimiter".into()))?;
    let (yaml, tail) = rest.split_at(end);
    let body = tail.trim_start_matches(FRONT_MATTER_END);
    let front_matter: AgentFrontMatter =
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidArgument(format!("agent config front matter: {e}")))?;
    Ok((front_matter, body))
}

/// Scan `dir` non-recursively for `*.md` files and parse each as an agent
/// configuration. A file that fails to parse is skipped with a warning
/// rather than aborting the whole scan (§4.8: reconciliation tolerates a
/// malformed individual file).
pub fn discover_agent_configs(dir: &Path) -> Result<Vec<AgentFrontMatter>> {
    let mut configs = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| Error::Unavailable(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::Unavailable(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), %e, "failed to read agent config");
                continue;
            }
        };
        match parse_agent_frontmatter(&content) {
            Ok((front_matter, _body)) => configs.push(front_matter),
            Err(e) => tracing::warn!(path = %path.display(), %e, "failed to parse agent config"),
        }
    }
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_front_matter() {
        let content = "---\nname: alice\n---\n\nAlice helps with backend work.\n";
        let (fm, body) = parse_agent_frontmatter(content).unwrap();
        assert_eq!(fm.name, "alice");
        assert_eq!(fm.dm_policy, "open");
        assert_eq!(fm.discoverable, "project");
        assert!(!fm.never_default);
        assert!(body.contains("Alice helps"));
    }

    #[test]
    fn parses_full_front_matter() {
        let content = "---\nname: bob\ndescription: reviewer\ndm_policy: closed\ndiscoverable: public\nexclude: [general]\nnever_default: true\n---\n\nbody\n";
        let (fm, _) = parse_agent_frontmatter(content).unwrap();
        assert_eq!(fm.dm_policy, "closed");
        assert_eq!(fm.discoverable, "public");
        assert_eq!(fm.exclude, vec!["general".to_string()]);
        assert!(fm.never_default);
    }

    #[test]
    fn rejects_missing_delimiter() {
        let content = "no front matter here";
        assert!(parse_agent_frontmatter(content).is_err());
    }

    #[test]
    fn rejects_invalid_yaml() {
        let content = "---\nname: [unterminated\n---\n\nbody\n";
        assert!(parse_agent_frontmatter(content).is_err());
    }
}
