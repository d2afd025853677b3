//! Default provisioning & reconciliation (§4.8): bring the broker's
//! channels, project links, and agent registrations in line with a
//! declarative `ReconcilerConfig` plus a set of discovered agent
//! configuration files, in three phases — infrastructure, agent discovery,
//! default-access — each rolled back independently if it fails partway.
//! Re-running with the same inputs against an already-reconciled broker
//! produces an empty plan (§4.8: "idempotent re-running").

use crate::discovery::AgentFrontMatter;
use crate::facade::{Broker, CreateChannel, RegisterAgent};
use claude_slack_core::config::{DefaultChannelSpec, ProjectLinkSpec, ReconcilerConfig};
use claude_slack_core::ids::AgentIdentity;
use claude_slack_core::{Error, Result};
use claude_slack_db::queries::agents;

/// One discovered agent configuration, paired with the project it was
/// found under (`None` for a global-scope agent).
#[derive(Debug, Clone)]
pub struct DiscoveredAgent {
    pub front_matter: AgentFrontMatter,
    pub project_id: Option<String>,
}

/// What a reconcile pass *would* do, computed without mutating anything.
/// The admin CLI's `status` subcommand surfaces this directly (§6).
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub channels_to_create: Vec<(String, DefaultChannelSpec)>,
    pub links_to_apply: Vec<ProjectLinkSpec>,
    pub links_to_remove: Vec<ProjectLinkSpec>,
    pub agents_to_register: Vec<DiscoveredAgent>,
    pub memberships_to_add: Vec<(String, AgentIdentity)>,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels_to_create.is_empty()
            && self.links_to_apply.is_empty()
            && self.links_to_remove.is_empty()
            && self.agents_to_register.is_empty()
            && self.memberships_to_add.is_empty()
    }
}

/// What a reconcile pass actually did.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub channels_created: usize,
    pub links_applied: usize,
    pub links_removed: usize,
    pub agents_registered: usize,
    pub memberships_added: usize,
}

pub struct Reconciler<'a> {
    broker: &'a Broker,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(broker: &'a Broker) -> Self {
        Self { broker }
    }

    /// Compute the plan without applying it.
    pub async fn plan(&self, config: &ReconcilerConfig, discovered: &[DiscoveredAgent]) -> Result<ReconcilePlan> {
        let mut plan = ReconcilePlan::default();

        let projects = self.broker.list_projects().await?;
        for spec in &config.channels {
            match spec.scope.as_str() {
                "global" => {
                    if self.broker.find_channel_by_name("global", None, &spec.name).await?.is_none() {
                        plan.channels_to_create.push((spec.name.clone(), spec.clone()));
                    }
                }
                "project" => {
                    for project in &projects {
                        if self.broker.find_channel_by_name("project", Some(&project.id), &spec.name).await?.is_none()
                        {
                            plan.channels_to_create.push((project.id.clone(), spec.clone()));
                        }
                    }
                }
                other => {
                    return Err(Error::InvalidArgument(format!("unknown default channel scope: {other}")));
                }
            }
        }

        let existing_links = self.broker.list_links().await?;
        for spec in &config.project_links {
            let already =
                existing_links.iter().any(|l| links_match(l, spec) && l.enabled == spec.enabled);
            if already {
                continue;
            }
            if spec.enabled {
                plan.links_to_apply.push(spec.clone());
            } else {
                plan.links_to_remove.push(spec.clone());
            }
        }

        for candidate in discovered {
            let existing =
                self.broker.get_agent(&candidate.front_matter.name, candidate.project_id.as_deref()).await;
            let needs_registration = match existing {
                Ok(row) => {
                    row.description != candidate.front_matter.description
                        || row.dm_policy != candidate.front_matter.dm_policy
                        || row.discoverable != candidate.front_matter.discoverable
                }
                Err(Error::NotFound(_)) => true,
                Err(e) => return Err(e),
            };
            if needs_registration {
                plan.agents_to_register.push(candidate.clone());
            }
        }

        // Default-access eligibility (§4.8): scope match, `exclude` list,
        // `never_default`, and a prior explicit opt-out all override
        // membership, in that precedence order.
        for spec in &config.channels {
            if !spec.is_default {
                continue;
            }
            for candidate in discovered {
                if candidate.front_matter.never_default {
                    continue;
                }
                if candidate.front_matter.exclude.iter().any(|n| n == &spec.name) {
                    continue;
                }
                let channel_id = match spec.scope.as_str() {
                    "global" => match self.broker.find_channel_by_name("global", None, &spec.name).await? {
                        Some(c) => c.id,
                        None => continue,
                    },
                    "project" => {
                        let Some(project_id) = candidate.project_id.as_deref() else { continue };
                        match self.broker.find_channel_by_name("project", Some(project_id), &spec.name).await? {
                            Some(c) => c.id,
                            None => continue,
                        }
                    }
                    _ => continue,
                };
                let identity = AgentIdentity::new(candidate.front_matter.name.clone(), candidate.project_id.clone());
                let membership = self.broker.membership(&channel_id, &identity).await?;
                match membership {
                    Some(m) if m.opted_out => continue,
                    Some(_) => continue,
                    None => plan.memberships_to_add.push((channel_id, identity)),
                }
            }
        }

        Ok(plan)
    }

    /// Compute and apply the plan in three phases, rolling back a phase's
    /// own effects (not earlier phases, which already committed) if it
    /// fails partway through.
    pub async fn reconcile(
        &self,
        config: &ReconcilerConfig,
        discovered: &[DiscoveredAgent],
    ) -> Result<ReconcileReport> {
        let plan = self.plan(config, discovered).await?;
        let mut report = ReconcileReport::default();

        self.apply_infrastructure(&plan, &mut report).await?;
        self.apply_agent_discovery(&plan, &mut report).await?;
        self.apply_default_access(&plan, &mut report).await?;

        Ok(report)
    }

    async fn apply_infrastructure(&self, plan: &ReconcilePlan, report: &mut ReconcileReport) -> Result<()> {
        let mut created_channels = Vec::new();
        for (scope_key, spec) in &plan.channels_to_create {
            let project_id = if spec.scope == "project" { Some(scope_key.as_str()) } else { None };
            let result = self
                .broker
                .create_channel(CreateChannel {
                    channel_type: "channel",
                    access_type: &spec.access_type,
                    scope: &spec.scope,
                    project_id,
                    name: &spec.name,
                    description: &spec.description,
                    is_default: spec.is_default,
                    owner: None,
                })
                .await;
            match result {
                Ok(channel) => {
                    created_channels.push(channel.id);
                    report.channels_created += 1;
                }
                Err(Error::Conflict(_)) => {} // already provisioned concurrently; idempotent no-op
                Err(e) => {
                    for id in &created_channels {
                        let _ = self.broker.archive_channel(id).await;
                    }
                    return Err(e);
                }
            }
        }

        let mut applied_links = Vec::new();
        for spec in &plan.links_to_apply {
            match self.broker.link_projects(&spec.project_a, &spec.project_b, &spec.link_type).await {
                Ok(_) => {
                    applied_links.push(spec.clone());
                    report.links_applied += 1;
                }
                Err(e) => {
                    for applied in &applied_links {
                        let _ = self.broker.unlink_projects(&applied.project_a, &applied.project_b).await;
                    }
                    for id in &created_channels {
                        let _ = self.broker.archive_channel(id).await;
                    }
                    return Err(e);
                }
            }
        }
        for spec in &plan.links_to_remove {
            match self.broker.unlink_projects(&spec.project_a, &spec.project_b).await {
                Ok(()) | Err(Error::NotFound(_)) => report.links_removed += 1,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn apply_agent_discovery(&self, plan: &ReconcilePlan, report: &mut ReconcileReport) -> Result<()> {
        let mut registered = Vec::new();
        for candidate in &plan.agents_to_register {
            let fm = &candidate.front_matter;
            let result = self
                .broker
                .register_agent(RegisterAgent {
                    name: &fm.name,
                    project_id: candidate.project_id.as_deref(),
                    description: &fm.description,
                    dm_policy: &fm.dm_policy,
                    discoverable: &fm.discoverable,
                })
                .await;
            match result {
                Ok(_) => {
                    self.persist_agent_overrides(candidate).await?;
                    registered.push(candidate.clone());
                    report.agents_registered += 1;
                }
                Err(e) => {
                    for done in &registered {
                        let mut writer = self.broker.pool().writer().await;
                        let _ =
                            agents::delete_agent(&mut writer, &done.front_matter.name, done.project_id.as_deref())
                                .await;
                        drop(writer);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Persist `exclude`/`never_default` onto the agent row. Not part of
    /// `Broker::register_agent`'s public argument set (those fields are
    /// reconciliation-only, never set by a regular `register` call), so
    /// this writes them directly.
    async fn persist_agent_overrides(&self, candidate: &DiscoveredAgent) -> Result<()> {
        let exclude_json = serde_json::to_string(&candidate.front_matter.exclude)
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let mut writer = self.broker.pool().writer().await;
        sqlx::query("UPDATE agents SET exclude_defaults = ?, never_default = ? WHERE name = ? AND project_id IS ?")
            .bind(exclude_json)
            .bind(candidate.front_matter.never_default)
            .bind(&candidate.front_matter.name)
            .bind(candidate.project_id.as_deref())
            .execute(&mut *writer)
            .await
            .map_err(|e| Error::Integrity(e.to_string()))?;
        Ok(())
    }

    async fn apply_default_access(&self, plan: &ReconcilePlan, report: &mut ReconcileReport) -> Result<()> {
        let mut added = Vec::new();
        for (channel_id, identity) in &plan.memberships_to_add {
            let result = self.broker.join_channel(channel_id, identity).await;
            match result {
                Ok(_) => {
                    added.push((channel_id.clone(), identity.clone()));
                    report.memberships_added += 1;
                }
                Err(e) => {
                    for (id, who) in &added {
                        let _ = self.broker.leave_channel(id, who).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

fn links_match(row: &claude_slack_db::models::ProjectLinkRow, spec: &ProjectLinkSpec) -> bool {
    let (a, b) = if spec.project_a <= spec.project_b {
        (spec.project_a.as_str(), spec.project_b.as_str())
    } else {
        (spec.project_b.as_str(), spec.project_a.as_str())
    };
    row.project_a == a && row.project_b == b && row.link_type == spec.link_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::Broker;

    fn yaml_config() -> ReconcilerConfig {
        ReconcilerConfig::from_yaml(
            r"
channels:
  - name: general
    scope: global
    access_type: open
    is_default: true
",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn plan_is_empty_after_reconciling_twice() {
        let broker = Broker::open_in_memory().await.unwrap();
        let config = yaml_config();
        let reconciler = Reconciler::new(&broker);

        let first = reconciler.reconcile(&config, &[]).await.unwrap();
        assert_eq!(first.channels_created, 1);

        let plan = reconciler.plan(&config, &[]).await.unwrap();
        assert!(plan.is_empty(), "second pass should find nothing left to do");
    }

    #[tokio::test]
    async fn never_default_agent_is_excluded_from_membership() {
        let broker = Broker::open_in_memory().await.unwrap();
        let config = yaml_config();
        let reconciler = Reconciler::new(&broker);

        let discovered = vec![DiscoveredAgent {
            front_matter: AgentFrontMatter {
                name: "alice".into(),
                description: String::new(),
                dm_policy: "open".into(),
                discoverable: "public".into(),
                exclude: Vec::new(),
                never_default: true,
            },
            project_id: None,
        }];

        let report = reconciler.reconcile(&config, &discovered).await.unwrap();
        assert_eq!(report.agents_registered, 1);
        assert_eq!(report.memberships_added, 0);
    }
}
