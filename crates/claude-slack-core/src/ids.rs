//! Deterministic identifier derivation (§3, §6 channel identifier grammar).
//!
//! ```text
//! global_channel  ::= "global:" name
//! project_channel ::= "proj_" project_hash8 ":" name
//! dm_channel      ::= "dm:" a1 ":" p1 ":" a2 ":" p2
//! notes_channel   ::= "notes:" agent ":" scope_tag
//! ```

use sha2::{Digest, Sha256};

/// An agent's scoped identity: a name plus an optional project id.
/// `project_id = None` means a global agent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentIdentity {
    pub name: String,
    pub project_id: Option<String>,
}

impl AgentIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>, project_id: Option<String>) -> Self {
        Self { name: name.into(), project_id }
    }

    fn project_tag(&self) -> &str {
        self.project_id.as_deref().unwrap_or("global")
    }
}

/// Compute a project id: a fixed-length hex hash of the absolute path.
///
/// Deterministic so re-registering the same path always yields the same id
/// (§3: "id (deterministic hash of absolute path, fixed length)").
#[must_use]
pub fn project_id(absolute_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(absolute_path.as_bytes());
    hex::encode(hasher.finalize())
}

/// The 8-character prefix of a project id used in channel ids (§6).
#[must_use]
pub fn project_hash8(full_project_id: &str) -> String {
    full_project_id.chars().take(8).collect()
}

/// Build a global channel id: `global:{name}`.
#[must_use]
pub fn global_channel_id(name: &str) -> String {
    format!("global:{name}")
}

/// Build a project-scoped channel id: `proj_{hash8}:{name}`.
#[must_use]
pub fn project_channel_id(full_project_id: &str, name: &str) -> String {
    format!("proj_{}:{name}", project_hash8(full_project_id))
}

/// Build a notes channel id: `notes:{agent}:{scope_tag}`.
///
/// `scope_tag` is `"global"` for a global agent or the project's hash8 for a
/// project-scoped agent.
#[must_use]
pub fn notes_channel_id(agent: &AgentIdentity, project_hash8_for_scope: Option<&str>) -> String {
    let tag = project_hash8_for_scope.unwrap_or("global");
    format!("notes:{}:{tag}", agent.name)
}

/// Sort two agent identities lexicographically by `(name, project_tag)`
/// and build the canonical DM channel id for the pair:
/// `dm:{n1}:{p1}:{n2}:{p2}` with `(n1,p1) < (n2,p2)`.
///
/// Pure function of the unordered pair (§8 round-trip property): swapping
/// the two inputs yields the identical id.
#[must_use]
pub fn dm_channel_id(a: &AgentIdentity, b: &AgentIdentity) -> String {
    let (first, second) = order_pair(a, b);
    format!(
        "dm:{}:{}:{}:{}",
        first.name,
        first.project_tag(),
        second.name,
        second.project_tag()
    )
}

/// The subscriber-id routing key for an agent identity: `{name}@{project_tag}`.
/// Used by the event bus tap to address "all members of this channel"
/// without a separate session/subscriber registry (§9 open question:
/// sessions are persisted state the core does not interpret, so routing is
/// keyed directly on agent identity rather than on a live session id).
#[must_use]
pub fn identity_key(name: &str, project_id: Option<&str>) -> String {
    format!("{name}@{}", project_id.unwrap_or("global"))
}

/// Order two identities by `(name, project_tag)`, lowest first.
#[must_use]
pub fn order_pair<'a>(
    a: &'a AgentIdentity,
    b: &'a AgentIdentity,
) -> (&'a AgentIdentity, &'a AgentIdentity) {
    let key_a = (a.name.as_str(), a.project_tag());
    let key_b = (b.name.as_str(), b.project_tag());
    if key_a <= key_b { (a, b) } else { (b, a) }
}

/// The kind of channel a channel id grammatically belongs to, as parsed
/// from its id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelIdKind {
    Global,
    Project,
    Dm,
    Notes,
}

/// Classify a channel id string by its grammar prefix (§6). Returns `None`
/// if the id matches none of the four known forms.
#[must_use]
pub fn classify_channel_id(id: &str) -> Option<ChannelIdKind> {
    if id.starts_with("global:") {
        Some(ChannelIdKind::Global)
    } else if id.starts_with("proj_") {
        Some(ChannelIdKind::Project)
    } else if id.starts_with("dm:") {
        Some(ChannelIdKind::Dm)
    } else if id.starts_with("notes:") {
        Some(ChannelIdKind::Notes)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_is_deterministic() {
        assert_eq!(project_id("/home/x/proj"), project_id("/home/x/proj"));
        assert_ne!(project_id("/home/x/proj"), project_id("/home/x/proj2"));
    }

    #[test]
    fn dm_id_is_symmetric() {
        let alice = AgentIdentity::new("alice", Some("p1".into()));
        let bob = AgentIdentity::new("bob", Some("p2".into()));
        assert_eq!(dm_channel_id(&alice, &bob), dm_channel_id(&bob, &alice));
        assert_eq!(dm_channel_id(&alice, &bob), "dm:alice:p1:bob:p2");
    }

    #[test]
    fn dm_id_global_agents_use_global_tag() {
        let a = AgentIdentity::new("a", None);
        let b = AgentIdentity::new("b", None);
        assert_eq!(dm_channel_id(&a, &b), "dm:a:global:b:global");
    }

    #[test]
    fn classify_recognizes_all_forms() {
        assert_eq!(classify_channel_id("global:x"), Some(ChannelIdKind::Global));
        assert_eq!(classify_channel_id("proj_abcd1234:x"), Some(ChannelIdKind::Project));
        assert_eq!(classify_channel_id("dm:a:global:b:global"), Some(ChannelIdKind::Dm));
        assert_eq!(classify_channel_id("notes:a:global"), Some(ChannelIdKind::Notes));
        assert_eq!(classify_channel_id("garbage"), None);
    }

    proptest::proptest! {
        #[test]
        fn dm_id_symmetric_prop(n1 in "[a-zA-Z]{1,10}", n2 in "[a-zA-Z]{1,10}") {
            let a = AgentIdentity::new(n1, None);
            let b = AgentIdentity::new(n2, None);
            proptest::prop_assert_eq!(dm_channel_id(&a, &b), dm_channel_id(&b, &a));
        }
    }
}
