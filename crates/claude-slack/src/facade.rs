//! The unified façade (§4.6): one object orchestrating the relational
//! store, the vector/search layer, and the event bus. Every public method
//! validates its inputs, resolves permission through one of the three
//! primitives in `claude-slack-db::queries::permissions`, delegates to the
//! stores, and — for mutating operations — emits exactly one event after
//! the transaction that performed the mutation commits (§4.7, §9 "ad-hoc
//! event emission at call sites" collapsed here).

use claude_slack_core::ids::{self, AgentIdentity};
use claude_slack_core::ranking::RankingProfile;
use claude_slack_core::{Config, Error, Result};
use claude_slack_db::error::DbError;
use claude_slack_db::models::{
    AgentRow, ChannelMemberRow, ChannelRow, MessageRow, ProjectLinkRow, ProjectRow,
};
use claude_slack_db::queries::permissions::DiscoverableAgent;
use claude_slack_db::queries::{agents, channels, links, messages, permissions, projects};
use claude_slack_db::retry::{retry_on_lock, CircuitBreaker};
use claude_slack_db::timestamps::now_seconds;
use claude_slack_db::DbPool;
use claude_slack_events::{Event, EventBus, EventKind};
use claude_slack_search::hybrid::{hybrid_search, HybridSearchParams, ScoredMessage};
use claude_slack_search::sync::{check_drift, index_message, DriftReport, Embedder};
use claude_slack_search::vector_index::{LocalIndex, RemoteIndex, VectorIndex};
use sqlx::Connection;
use std::sync::Arc;

/// Arguments for `Broker::send`.
pub struct SendMessage<'a> {
    pub channel_id: &'a str,
    pub sender: &'a AgentIdentity,
    pub content: &'a str,
    pub confidence: Option<f64>,
    pub metadata: &'a str,
    pub thread_id: Option<&'a str>,
}

/// Arguments for `Broker::create_channel`. `channel_type` must be `"channel"`
/// or `"direct"`, `access_type` one of `"open"`/`"members"`/`"private"`, and
/// `scope` `"global"` or `"project"` (with `project_id` required exactly
/// when `scope == "project"`) — the schema's own `CHECK` constraints on
/// these columns; `create_channel` validates against them before the insert.
pub struct CreateChannel<'a> {
    pub channel_type: &'a str,
    pub access_type: &'a str,
    pub scope: &'a str,
    pub project_id: Option<&'a str>,
    pub name: &'a str,
    pub description: &'a str,
    pub is_default: bool,
    pub owner: Option<&'a AgentIdentity>,
}

/// Arguments for `Broker::register_agent`.
pub struct RegisterAgent<'a> {
    pub name: &'a str,
    pub project_id: Option<&'a str>,
    pub description: &'a str,
    pub dm_policy: &'a str,
    pub discoverable: &'a str,
}

/// Arguments for `Broker::search`/`Broker::search_for_agent`.
pub struct SearchRequest<'a> {
    pub channel_ids: &'a [String],
    pub query: Option<&'a str>,
    pub filter: Option<&'a serde_json::Value>,
    pub profile: RankingProfile,
    pub limit: usize,
}

/// The broker: owns the database pool, the optional vector backend and
/// embedder, and the event bus, and exposes the public contract of §4.6.
pub struct Broker {
    db: DbPool,
    vector: Option<Arc<dyn VectorIndex>>,
    /// Kept alongside `vector` only so `close` can snapshot it; `None` when
    /// the configured backend is remote or absent. `VectorIndex` itself
    /// exposes no downcast, so this is the only way back to `LocalIndex`.
    local_vector: Option<Arc<LocalIndex>>,
    embedder: Option<Arc<dyn Embedder>>,
    events: EventBus,
    config: Config,
    write_breaker: CircuitBreaker,
}

impl Broker {
    /// Open the broker: run migrations, construct the configured vector
    /// backend (if any), and start a fresh event bus. `embedder` is `None`
    /// when no semantic search is wanted; writes then skip the vector
    /// dual-write and `search` falls back to the filter-only path (§4.5).
    pub async fn open(config: Config, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let db = DbPool::open(&config).await.map_err(Error::from)?;
        let (vector, local_vector) = build_vector_backend(&config)?;
        let events = EventBus::new(config.event_queue_depth);
        tracing::info!(db_path = %config.db_path.display(), "broker opened");
        Ok(Self { db, vector, local_vector, embedder, events, config, write_breaker: CircuitBreaker::new() })
    }

    /// An in-memory broker for tests: private SQLite memory DB, no vector
    /// backend, no embedder.
    pub async fn open_in_memory() -> Result<Self> {
        let config = Config::in_memory();
        let db = DbPool::open_in_memory().await.map_err(Error::from)?;
        let events = EventBus::new(config.event_queue_depth);
        Ok(Self {
            db,
            vector: None,
            local_vector: None,
            embedder: None,
            events,
            config,
            write_breaker: CircuitBreaker::new(),
        })
    }

    /// Release the broker's resources. Present for lifecycle symmetry with
    /// `open` (matching the teacher's every-store-has-a-close convention);
    /// the pool and bus both clean up on drop, so this has nothing left to
    /// do beyond snapshotting the local vector index if one is configured.
    pub async fn close(self) -> Result<()> {
        if let Some(local) = &self.local_vector {
            local.snapshot().map_err(Error::from)?;
        }
        tracing::info!("broker closed");
        Ok(())
    }

    /// Compare the relational message set against the vector index's id
    /// set and report drift (§4.4 resync check). A no-op empty report when
    /// no vector backend is configured.
    pub async fn check_vector_drift(&self, sample_limit: i64) -> Result<DriftReport> {
        let Some(vector) = &self.vector else { return Ok(DriftReport::default()) };
        check_drift(self.db.readers(), vector.as_ref(), sample_limit).await.map_err(Into::into)
    }

    /// A handle to this broker's event bus, for callers wiring up an SSE
    /// endpoint or another out-of-process subscriber.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // -- messaging (§4.4, §4.6) -------------------------------------------

    /// Send a message to a channel. Validates the channel is not archived
    /// and the sender has `can_send` membership, both read inside the same
    /// transaction as the insert so a concurrent `leave_channel` cannot
    /// race it into a half-state (§5 ordering guarantee, §8 scenario 2).
    /// Raises `PermissionDenied` (not a member / channel archived) or
    /// `InvalidArgument` (confidence out of range).
    pub async fn send(&self, req: SendMessage<'_>) -> Result<MessageRow> {
        validate_confidence(req.confidence)?;
        let mut writer = self.db.writer().await;
        let message = retry_on_lock(&self.write_breaker, || async {
            let mut tx = (&mut *writer).begin().await.map_err(DbError::Sqlx)?;
            let channel = channels::get_channel(&mut *tx, req.channel_id).await?;
            if channel.is_archived {
                return Err(DbError::Conflict(format!("channel {} is archived", req.channel_id)));
            }
            let membership =
                channels::get_membership(&mut *tx, req.channel_id, &req.sender.name, req.sender.project_id.as_deref())
                    .await?;
            let can_send = membership.as_ref().is_some_and(|m| m.can_send && !m.opted_out);
            if !can_send {
                return Err(DbError::NotFound(format!(
                    "agent {} is not a member of this channel",
                    req.sender.name
                )));
            }
            let row = messages::insert_message(
                &mut *tx,
                messages::NewMessage {
                    channel_id: req.channel_id,
                    sender_name: &req.sender.name,
                    sender_project_id: req.sender.project_id.as_deref(),
                    content: req.content,
                    confidence: req.confidence,
                    metadata: req.metadata,
                    thread_id: req.thread_id,
                },
            )
            .await?;
            tx.commit().await.map_err(DbError::Sqlx)?;
            Ok(row)
        })
        .await
        .map_err(|e| match e {
            // `get_membership` returning `None`/not-`can_send` surfaces as
            // `NotFound` from the closure above; recast as the rule-naming
            // `PermissionDenied` the caller actually sees (§7).
            DbError::NotFound(msg) if msg.contains("is not a member") => Error::permission_denied(msg),
            DbError::Conflict(msg) if msg.contains("archived") => Error::permission_denied(msg),
            other => other.into(),
        })?;
        drop(writer);

        self.dual_write_vector(&message).await;
        self.tap_message_created(&message).await;
        Ok(message)
    }

    /// Fetch a message without a permission check (administrative path).
    pub async fn get(&self, message_id: i64) -> Result<MessageRow> {
        messages::get_message(self.db.readers(), message_id).await.map_err(Into::into)
    }

    /// Fetch a message only if `agent` can currently see its channel.
    pub async fn get_for_agent(&self, agent: &AgentIdentity, message_id: i64) -> Result<MessageRow> {
        let message = self.get(message_id).await?;
        let visible = permissions::visible_channels_for(self.db.readers(), &agent.name, agent.project_id.as_deref())
            .await
            .map_err(Error::from)?;
        if visible.iter().any(|c| c.id == message.channel_id) {
            Ok(message)
        } else {
            Err(Error::permission_denied(format!("agent {} cannot see channel {}", agent.name, message.channel_id)))
        }
    }

    /// Send a direct message, auto-creating the deterministic DM channel on
    /// first contact (§4.4, §8 scenario 1). Raises `PolicyDenied` when
    /// `can_dm` rejects the pair.
    pub async fn send_dm(
        &self,
        from: &AgentIdentity,
        to: &AgentIdentity,
        content: &str,
        confidence: Option<f64>,
        metadata: &str,
    ) -> Result<MessageRow> {
        validate_confidence(confidence)?;
        let allowed = permissions::can_dm(
            self.db.readers(),
            &from.name,
            from.project_id.as_deref(),
            &to.name,
            to.project_id.as_deref(),
        )
        .await
        .map_err(Error::from)?;
        if !allowed {
            return Err(Error::PolicyDenied(format!("{} cannot DM {}", from.name, to.name)));
        }

        let channel_id = ids::dm_channel_id(from, to);
        let mut writer = self.db.writer().await;
        let (message, created) = retry_on_lock(&self.write_breaker, || async {
            let mut tx = (&mut *writer).begin().await.map_err(DbError::Sqlx)?;
            let existing = channels::get_channel(&mut *tx, &channel_id).await;
            let created = match existing {
                Ok(_) => false,
                Err(DbError::NotFound(_)) => {
                    channels::create_channel(
                        &mut *tx,
                        channels::NewChannel {
                            id: &channel_id,
                            channel_type: "direct",
                            access_type: "private",
                            scope: "global",
                            project_id: None,
                            name: &channel_id,
                            description: "",
                            is_default: false,
                            owner_name: None,
                            owner_project_id: None,
                        },
                    )
                    .await?;
                    for party in [from, to] {
                        channels::add_member(
                            &mut *tx,
                            channels::NewMember {
                                channel_id: &channel_id,
                                agent_name: &party.name,
                                agent_project_id: party.project_id.as_deref(),
                                can_leave: false,
                                can_send: true,
                                can_invite: false,
                                can_manage: false,
                                invited_by_name: None,
                                invited_by_project_id: None,
                                source: "system",
                                is_from_default: false,
                            },
                        )
                        .await?;
                    }
                    true
                }
                Err(other) => return Err(other),
            };
            let row = messages::insert_message(
                &mut *tx,
                messages::NewMessage {
                    channel_id: &channel_id,
                    sender_name: &from.name,
                    sender_project_id: from.project_id.as_deref(),
                    content,
                    confidence,
                    metadata,
                    thread_id: None,
                },
            )
            .await?;
            tx.commit().await.map_err(DbError::Sqlx)?;
            Ok((row, created))
        })
        .await
        .map_err(Error::from)?;
        drop(writer);

        if created {
            let targets = vec![
                ids::identity_key(&from.name, from.project_id.as_deref()),
                ids::identity_key(&to.name, to.project_id.as_deref()),
            ];
            let payload = serde_json::json!({ "channel_id": channel_id });
            self.events.publish(&targets, Event::new(EventKind::DmCreated, now_seconds(), payload)).await;
        }
        self.dual_write_vector(&message).await;
        self.tap_message_created(&message).await;
        Ok(message)
    }

    // -- channels (§4.6) ---------------------------------------------------

    /// Create a channel. Raises `Conflict` on a name collision within the
    /// same `(scope, project_id)`, or `InvalidArgument` if `channel_type`,
    /// `access_type`, or `scope` is not one of the schema's legal values.
    pub async fn create_channel(&self, req: CreateChannel<'_>) -> Result<ChannelRow> {
        validate_channel_shape(req.channel_type, req.access_type)?;
        let id = match req.scope {
            "global" if req.project_id.is_none() => ids::global_channel_id(req.name),
            "global" => return Err(Error::InvalidArgument("global-scoped channel must not have project_id".into())),
            "project" => match req.project_id {
                Some(p) => ids::project_channel_id(p, req.name),
                None => return Err(Error::InvalidArgument("project-scoped channel requires project_id".into())),
            },
            other => return Err(Error::InvalidArgument(format!("unknown channel scope: {other}"))),
        };
        let mut writer = self.db.writer().await;
        let channel = retry_on_lock(&self.write_breaker, || async {
            channels::create_channel(
                &mut *writer,
                channels::NewChannel {
                    id: &id,
                    channel_type: req.channel_type,
                    access_type: req.access_type,
                    scope: req.scope,
                    project_id: req.project_id,
                    name: req.name,
                    description: req.description,
                    is_default: req.is_default,
                    owner_name: req.owner.map(|o| o.name.as_str()),
                    owner_project_id: req.owner.and_then(|o| o.project_id.as_deref()),
                },
            )
            .await
        })
        .await
        .map_err(Error::from)?;
        drop(writer);

        self.events
            .publish_all(Event::new(EventKind::ChannelCreated, now_seconds(), serde_json::json!({
                "channel_id": channel.id,
            })))
            .await;
        Ok(channel)
    }

    /// Join (or rejoin, clearing a prior opt-out) a channel.
    pub async fn join_channel(&self, channel_id: &str, agent: &AgentIdentity) -> Result<ChannelMemberRow> {
        let mut writer = self.db.writer().await;
        let member = retry_on_lock(&self.write_breaker, || async {
            channels::add_member(
                &mut *writer,
                channels::NewMember {
                    channel_id,
                    agent_name: &agent.name,
                    agent_project_id: agent.project_id.as_deref(),
                    can_leave: true,
                    can_send: true,
                    can_invite: false,
                    can_manage: false,
                    invited_by_name: None,
                    invited_by_project_id: None,
                    source: "manual",
                    is_from_default: false,
                },
            )
            .await
        })
        .await
        .map_err(Error::from)?;
        drop(writer);

        self.tap_channel_membership(channel_id, EventKind::ChannelMemberJoined).await;
        Ok(member)
    }

    /// Leave a channel (soft opt-out; membership history is preserved).
    /// Raises `PermissionDenied` when the membership is not `can_leave`
    /// (direct and notes channels forbid leaving — §3 invariants 2, 3).
    pub async fn leave_channel(&self, channel_id: &str, agent: &AgentIdentity) -> Result<()> {
        let mut writer = self.db.writer().await;
        retry_on_lock(&self.write_breaker, || async {
            let membership =
                channels::get_membership(&mut *writer, channel_id, &agent.name, agent.project_id.as_deref()).await?;
            match membership {
                Some(m) if m.can_leave => {
                    channels::remove_member(&mut *writer, channel_id, &agent.name, agent.project_id.as_deref()).await
                }
                Some(_) => Err(DbError::Conflict("membership does not permit leaving this channel".into())),
                None => Err(DbError::NotFound(format!("membership {} in {channel_id}", agent.name))),
            }
        })
        .await
        .map_err(|e| match e {
            DbError::Conflict(msg) => Error::permission_denied(msg),
            other => other.into(),
        })?;
        drop(writer);

        self.tap_channel_membership(channel_id, EventKind::ChannelMemberLeft).await;
        Ok(())
    }

    /// Invite `invitee` into `channel_id` on behalf of `inviter`. Raises
    /// `PermissionDenied` unless `inviter` currently has `can_invite`.
    pub async fn invite(
        &self,
        channel_id: &str,
        inviter: &AgentIdentity,
        invitee: &AgentIdentity,
    ) -> Result<ChannelMemberRow> {
        let mut writer = self.db.writer().await;
        let member = retry_on_lock(&self.write_breaker, || async {
            let inviter_membership =
                channels::get_membership(&mut *writer, channel_id, &inviter.name, inviter.project_id.as_deref())
                    .await?;
            if !inviter_membership.is_some_and(|m| m.can_invite && !m.opted_out) {
                return Err(DbError::NotFound(format!("{} cannot invite into this channel", inviter.name)));
            }
            channels::add_member(
                &mut *writer,
                channels::NewMember {
                    channel_id,
                    agent_name: &invitee.name,
                    agent_project_id: invitee.project_id.as_deref(),
                    can_leave: true,
                    can_send: true,
                    can_invite: false,
                    can_manage: false,
                    invited_by_name: Some(&inviter.name),
                    invited_by_project_id: inviter.project_id.as_deref(),
                    source: "manual",
                    is_from_default: false,
                },
            )
            .await
        })
        .await
        .map_err(|e| match e {
            DbError::NotFound(msg) if msg.contains("cannot invite") => Error::permission_denied(msg),
            other => other.into(),
        })?;
        drop(writer);

        self.tap_channel_membership(channel_id, EventKind::ChannelMemberJoined).await;
        Ok(member)
    }

    /// Channels currently visible to `agent` (§4.2 primitive 1).
    pub async fn list_for_agent(&self, agent: &AgentIdentity) -> Result<Vec<ChannelRow>> {
        permissions::visible_channels_for(self.db.readers(), &agent.name, agent.project_id.as_deref())
            .await
            .map_err(Into::into)
    }

    pub async fn members(&self, channel_id: &str) -> Result<Vec<ChannelMemberRow>> {
        channels::list_members(self.db.readers(), channel_id).await.map_err(Into::into)
    }

    /// The membership row for `agent` in `channel_id`, if any — including
    /// opted-out rows (unlike `members`, which excludes them). Used by the
    /// reconciler to honor a prior explicit opt-out (§4.8 eligibility).
    pub async fn membership(&self, channel_id: &str, agent: &AgentIdentity) -> Result<Option<ChannelMemberRow>> {
        channels::get_membership(self.db.readers(), channel_id, &agent.name, agent.project_id.as_deref())
            .await
            .map_err(Into::into)
    }

    pub async fn find_channel_by_name(
        &self,
        scope: &str,
        project_id: Option<&str>,
        name: &str,
    ) -> Result<Option<ChannelRow>> {
        channels::find_channel_by_name(self.db.readers(), scope, project_id, name).await.map_err(Into::into)
    }

    pub async fn archive_channel(&self, channel_id: &str) -> Result<()> {
        let mut writer = self.db.writer().await;
        retry_on_lock(&self.write_breaker, || async { channels::archive_channel(&mut *writer, channel_id).await })
            .await
            .map_err(Error::from)?;
        drop(writer);

        self.tap_channel_membership(channel_id, EventKind::ChannelArchived).await;
        Ok(())
    }

    // -- agents (§4.6) -------------------------------------------------------

    /// Register or update an agent (idempotent on `(name, project_id)`).
    pub async fn register_agent(&self, req: RegisterAgent<'_>) -> Result<AgentRow> {
        let mut writer = self.db.writer().await;
        let agent = retry_on_lock(&self.write_breaker, || async {
            agents::upsert_agent(
                &mut *writer,
                agents::NewAgent {
                    name: req.name,
                    project_id: req.project_id,
                    description: req.description,
                    dm_policy: req.dm_policy,
                    discoverable: req.discoverable,
                },
            )
            .await
        })
        .await
        .map_err(Error::from)?;
        drop(writer);

        self.events
            .publish_all(Event::new(EventKind::AgentRegistered, now_seconds(), serde_json::json!({
                "name": agent.name,
                "project_id": agent.project_id,
            })))
            .await;
        Ok(agent)
    }

    pub async fn get_agent(&self, name: &str, project_id: Option<&str>) -> Result<AgentRow> {
        agents::get_agent(self.db.readers(), name, project_id).await.map_err(Into::into)
    }

    pub async fn list_agents(&self, project_id: Option<&str>) -> Result<Vec<AgentRow>> {
        agents::list_agents(self.db.readers(), project_id).await.map_err(Into::into)
    }

    /// Agents `agent` is permitted to discover (§4.2 primitive 3).
    pub async fn messagable_for(&self, agent: &AgentIdentity) -> Result<Vec<DiscoverableAgent>> {
        permissions::discoverable_agents_for(self.db.readers(), agent.project_id.as_deref())
            .await
            .map_err(Into::into)
    }

    // -- notes (§4.4 "notes channels are first-class", §4.6) ----------------

    /// Write a note to `owner`'s notes channel, auto-creating it (sole
    /// member, `can_send=true`, `can_leave=false`) on first use.
    pub async fn write_note(
        &self,
        owner: &AgentIdentity,
        content: &str,
        confidence: Option<f64>,
        metadata: &str,
    ) -> Result<MessageRow> {
        validate_confidence(confidence)?;
        let scope_hash8 = owner.project_id.as_deref().map(ids::project_hash8);
        let channel_id = ids::notes_channel_id(owner, scope_hash8.as_deref());

        let mut writer = self.db.writer().await;
        let message = retry_on_lock(&self.write_breaker, || async {
            let mut tx = (&mut *writer).begin().await.map_err(DbError::Sqlx)?;
            if channels::get_channel(&mut *tx, &channel_id).await.is_err() {
                let scope = if owner.project_id.is_some() { "project" } else { "global" };
                channels::create_channel(
                    &mut *tx,
                    channels::NewChannel {
                        id: &channel_id,
                        channel_type: "direct",
                        access_type: "private",
                        scope,
                        project_id: owner.project_id.as_deref(),
                        name: &channel_id,
                        description: "",
                        is_default: false,
                        owner_name: Some(&owner.name),
                        owner_project_id: owner.project_id.as_deref(),
                    },
                )
                .await?;
                channels::add_member(
                    &mut *tx,
                    channels::NewMember {
                        channel_id: &channel_id,
                        agent_name: &owner.name,
                        agent_project_id: owner.project_id.as_deref(),
                        can_leave: false,
                        can_send: true,
                        can_invite: false,
                        can_manage: false,
                        invited_by_name: None,
                        invited_by_project_id: None,
                        source: "system",
                        is_from_default: false,
                    },
                )
                .await?;
            }
            let row = messages::insert_message(
                &mut *tx,
                messages::NewMessage {
                    channel_id: &channel_id,
                    sender_name: &owner.name,
                    sender_project_id: owner.project_id.as_deref(),
                    content,
                    confidence,
                    metadata,
                    thread_id: None,
                },
            )
            .await?;
            tx.commit().await.map_err(DbError::Sqlx)?;
            Ok(row)
        })
        .await
        .map_err(Error::from)?;
        drop(writer);

        self.dual_write_vector(&message).await;
        self.tap_message_created(&message).await;
        Ok(message)
    }

    /// Search within `owner`'s own notes channel.
    pub async fn search_notes(&self, owner: &AgentIdentity, req: SearchRequest<'_>) -> Result<Vec<ScoredMessage>> {
        let scope_hash8 = owner.project_id.as_deref().map(ids::project_hash8);
        let channel_id = ids::notes_channel_id(owner, scope_hash8.as_deref());
        self.search(SearchRequest { channel_ids: std::slice::from_ref(&channel_id), ..req }).await
    }

    /// Most recent notes in `owner`'s own notes channel.
    pub async fn recent_notes(&self, owner: &AgentIdentity, limit: i64) -> Result<Vec<MessageRow>> {
        let scope_hash8 = owner.project_id.as_deref().map(ids::project_hash8);
        let channel_id = ids::notes_channel_id(owner, scope_hash8.as_deref());
        messages::list_recent(self.db.readers(), &channel_id, limit).await.map_err(Into::into)
    }

    /// Read `target`'s notes in read-only form (§8 scenario 5). Raises
    /// `PermissionDenied` unless `viewer` is the owner (notes channels have
    /// exactly one member — §3 invariant 3 — so peeking is the only path a
    /// non-owner has).
    pub async fn peek_notes(
        &self,
        viewer: &AgentIdentity,
        target: &AgentIdentity,
        limit: i64,
    ) -> Result<Vec<MessageRow>> {
        if viewer.name != target.name || viewer.project_id != target.project_id {
            return Err(Error::permission_denied(format!("{} may not peek {}'s notes", viewer.name, target.name)));
        }
        self.recent_notes(target, limit).await
    }

    // -- search (§4.5, §4.6) --------------------------------------------------

    /// Unscoped hybrid search over the given channels (administrative; no
    /// visibility filtering — §6 "a separate unscoped variant ... clearly
    /// named").
    pub async fn search(&self, req: SearchRequest<'_>) -> Result<Vec<ScoredMessage>> {
        let filter = req.filter.map(claude_slack_core::filter::parse).transpose()?;
        let embedding = match req.query {
            Some(q) if !q.is_empty() => self.embed_query(q),
            _ => None,
        };
        hybrid_search(
            self.db.readers(),
            self.vector.as_deref(),
            HybridSearchParams {
                channel_ids: req.channel_ids,
                filter: filter.as_ref(),
                query_embedding: embedding.as_deref(),
                profile: req.profile,
                limit: req.limit,
            },
        )
        .await
        .map_err(Into::into)
    }

    /// Permission-scoped search: intersects the requested channel set with
    /// "channels visible to this agent" (§4.5) before dispatch.
    pub async fn search_for_agent(&self, agent: &AgentIdentity, req: SearchRequest<'_>) -> Result<Vec<ScoredMessage>> {
        let visible = self.list_for_agent(agent).await?;
        let visible_ids: std::collections::HashSet<&str> = visible.iter().map(|c| c.id.as_str()).collect();
        let scoped: Vec<String> =
            req.channel_ids.iter().filter(|id| visible_ids.contains(id.as_str())).cloned().collect();
        self.search(SearchRequest { channel_ids: &scoped, ..req }).await
    }

    // -- projects & links (§4.8, exposed for the admin CLI) ------------------

    pub async fn ensure_project(&self, path: &str, name: &str) -> Result<ProjectRow> {
        let mut writer = self.db.writer().await;
        let project = retry_on_lock(&self.write_breaker, || async {
            projects::ensure_project(&mut *writer, path, name).await
        })
        .await
        .map_err(Error::from)?;
        Ok(project)
    }

    pub async fn link_projects(&self, project_a: &str, project_b: &str, link_type: &str) -> Result<ProjectLinkRow> {
        let mut writer = self.db.writer().await;
        retry_on_lock(&self.write_breaker, || async {
            links::link_projects(&mut *writer, project_a, project_b, link_type).await
        })
        .await
        .map_err(Into::into)
    }

    pub async fn unlink_projects(&self, project_a: &str, project_b: &str) -> Result<()> {
        let mut writer = self.db.writer().await;
        retry_on_lock(&self.write_breaker, || async {
            links::unlink_projects(&mut *writer, project_a, project_b).await
        })
        .await
        .map_err(Into::into)
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        projects::list_projects(self.db.readers()).await.map_err(Into::into)
    }

    pub async fn link_status(&self, project_id: &str) -> Result<Vec<ProjectLinkRow>> {
        links::links_for_project(self.db.readers(), project_id).await.map_err(Into::into)
    }

    pub async fn list_links(&self) -> Result<Vec<ProjectLinkRow>> {
        links::list_links(self.db.readers()).await.map_err(Into::into)
    }

    /// A direct handle to the pool, for the reconciler (same crate) and
    /// admin tooling that needs queries this façade does not wrap 1:1.
    #[must_use]
    pub(crate) fn pool(&self) -> &DbPool {
        &self.db
    }

    #[must_use]
    pub(crate) fn bus(&self) -> &EventBus {
        &self.events
    }

    // -- internal helpers -----------------------------------------------------

    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        self.embedder.as_ref().map(|e| e.embed(query))
    }

    /// Best-effort dual-write to the vector index (§4.4 step 3). A failure
    /// here is logged and left for the next sync check to repair; it never
    /// rolls back the relational write that already committed.
    async fn dual_write_vector(&self, message: &MessageRow) {
        let (Some(vector), Some(embedder)) = (&self.vector, &self.embedder) else { return };
        if let Err(err) = index_message(vector.as_ref(), embedder.as_ref(), message).await {
            tracing::warn!(message_id = message.id, %err, "vector dual-write failed; sync check will repair");
        }
    }

    async fn tap_message_created(&self, message: &MessageRow) {
        let Ok(members) = channels::list_members(self.db.readers(), &message.channel_id).await else { return };
        let targets = member_routing_keys(&members);
        let payload = serde_json::json!({
            "id": message.id,
            "channel_id": message.channel_id,
            "sender_name": message.sender_name,
            "thread_id": message.thread_id,
        });
        self.events.publish(&targets, Event::new(EventKind::MessageCreated, message.timestamp, payload)).await;
    }

    async fn tap_channel_membership(&self, channel_id: &str, kind: EventKind) {
        let Ok(members) = channels::list_members(self.db.readers(), channel_id).await else { return };
        let targets = member_routing_keys(&members);
        let payload = serde_json::json!({ "channel_id": channel_id });
        self.events.publish(&targets, Event::new(kind, now_seconds(), payload)).await;
    }
}

/// Map channel members onto the event bus's subscriber-id space (§4.7:
/// "all members of the channel"). A subscriber registers under
/// `ids::identity_key(agent.name, agent.project_id)`, so routing never
/// needs a separate session table lookup.
fn member_routing_keys(members: &[ChannelMemberRow]) -> Vec<String> {
    members.iter().map(|m| ids::identity_key(&m.agent_name, m.agent_project_id.as_deref())).collect()
}

/// The schema's `CHECK` constraints on `channels.channel_type`/`access_type`
/// (`schema.rs`: `channel_type IN ('channel','direct')`, `access_type IN
/// ('open','members','private')`, and direct channels must be private),
/// enforced here so a bad value surfaces as `InvalidArgument` instead of a
/// raw SQLite constraint failure at the insert.
fn validate_channel_shape(channel_type: &str, access_type: &str) -> Result<()> {
    if channel_type != "channel" && channel_type != "direct" {
        return Err(Error::InvalidArgument(format!("unknown channel_type: {channel_type}")));
    }
    if access_type != "open" && access_type != "members" && access_type != "private" {
        return Err(Error::InvalidArgument(format!("unknown access_type: {access_type}")));
    }
    if channel_type == "direct" && access_type != "private" {
        return Err(Error::InvalidArgument("direct channels must be private".into()));
    }
    Ok(())
}

fn validate_confidence(confidence: Option<f64>) -> Result<()> {
    match confidence {
        Some(c) if !(0.0..=1.0).contains(&c) => {
            Err(Error::InvalidArgument(format!("confidence {c} is outside [0,1]")))
        }
        _ => Ok(()),
    }
}

type VectorBackend = (Option<Arc<dyn VectorIndex>>, Option<Arc<LocalIndex>>);

fn build_vector_backend(config: &Config) -> Result<VectorBackend> {
    use claude_slack_core::config::VectorBackendKind;
    match &config.vector_backend {
        VectorBackendKind::None => Ok((None, None)),
        VectorBackendKind::Local(path) => {
            let index = if path.exists() {
                LocalIndex::load_snapshot(path).map_err(Error::from)?
            } else {
                LocalIndex::new(Some(path.clone()))
            };
            let index = Arc::new(index);
            Ok((Some(index.clone() as Arc<dyn VectorIndex>), Some(index)))
        }
        VectorBackendKind::Remote { url, api_key } => {
            let index = RemoteIndex::connect(url, api_key.as_deref(), "claude_slack_messages").map_err(Error::from)?;
            Ok((Some(Arc::new(index) as Arc<dyn VectorIndex>), None))
        }
    }
}
