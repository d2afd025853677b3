//! End-to-end scenarios against the façade (§8), exercised through
//! `Broker` rather than the lower `claude-slack-db`/`claude-slack-search`
//! query layers those crates' own test suites already cover directly.

use claude_slack::facade::{CreateChannel, RegisterAgent, SearchRequest, SendMessage};
use claude_slack::{AgentIdentity, Broker, Error};
use claude_slack_core::ranking::RankingProfile;

async fn register(broker: &Broker, name: &str, dm_policy: &str) -> AgentIdentity {
    broker
        .register_agent(RegisterAgent {
            name,
            project_id: None,
            description: "",
            dm_policy,
            discoverable: "public",
        })
        .await
        .unwrap();
    AgentIdentity::new(name.to_string(), None)
}

/// §8 scenario 1: two agents with open DM policies can message each other
/// and the deterministic DM channel is created exactly once, symmetrically.
#[tokio::test]
async fn dm_auto_creates_channel_on_first_contact() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let bob = register(&broker, "bob", "open").await;

    let first = broker.send_dm(&alice, &bob, "hi bob", None, "{}").await.unwrap();
    let second = broker.send_dm(&bob, &alice, "hi alice", None, "{}").await.unwrap();

    assert_eq!(first.channel_id, second.channel_id, "dm channel id must be symmetric");

    let recent = broker.get_for_agent(&alice, second.id).await.unwrap();
    assert_eq!(recent.content, "hi alice");
}

#[tokio::test]
async fn closed_policy_rejects_the_dm_as_policy_denied() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let bob = register(&broker, "bob", "closed").await;

    let err = broker.send_dm(&alice, &bob, "hi", None, "{}").await.unwrap_err();
    assert!(matches!(err, Error::PolicyDenied(_)));
}

/// §8 scenario 2: a concurrent `leave_channel` racing a `send` must never
/// let a message land for a sender who has already left — the permission
/// view and the insert share one transaction (§5).
#[tokio::test]
async fn leave_then_send_is_rejected_not_raced() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;

    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();

    broker.leave_channel(&channel.id, &alice).await.unwrap();

    let err = broker
        .send(SendMessage {
            channel_id: &channel.id,
            sender: &alice,
            content: "too late",
            confidence: None,
            metadata: "{}",
            thread_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn sending_to_an_archived_channel_is_rejected() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();
    broker.archive_channel(&channel.id).await.unwrap();

    let err = broker
        .send(SendMessage {
            channel_id: &channel.id,
            sender: &alice,
            content: "hello",
            confidence: None,
            metadata: "{}",
            thread_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

/// §8 scenario 5: a notes channel has exactly one member; peeking someone
/// else's notes is rejected regardless of their other channel memberships.
#[tokio::test]
async fn peeking_another_agents_notes_is_rejected() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let bob = register(&broker, "bob", "open").await;

    broker.write_note(&alice, "private thought", None, "{}").await.unwrap();

    let err = broker.peek_notes(&bob, &alice, 10).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));

    let own = broker.peek_notes(&alice, &alice, 10).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].content, "private thought");
}

/// §4.5 ranking profiles: with no query embedding, `search` falls back to
/// the filter-only path, so message recency alone must determine order
/// under the `RECENT` profile (most-recent first).
#[tokio::test]
async fn search_orders_by_recency_under_recent_profile() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();

    for i in 0..3 {
        broker
            .send(SendMessage {
                channel_id: &channel.id,
                sender: &alice,
                content: &format!("message {i}"),
                confidence: None,
                metadata: "{}",
                thread_id: None,
            })
            .await
            .unwrap();
    }

    let results = broker
        .search(SearchRequest {
            channel_ids: std::slice::from_ref(&channel.id),
            query: None,
            filter: None,
            profile: RankingProfile::RECENT,
            limit: 10,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].message.content, "message 2");
    assert_eq!(results[2].message.content, "message 0");
}

/// A metadata filter narrows the result set to only matching messages.
#[tokio::test]
async fn search_applies_metadata_filter() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "general",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();

    broker
        .send(SendMessage {
            channel_id: &channel.id,
            sender: &alice,
            content: "build broke",
            confidence: None,
            metadata: r#"{"task_id": "T-1"}"#,
            thread_id: None,
        })
        .await
        .unwrap();
    broker
        .send(SendMessage {
            channel_id: &channel.id,
            sender: &alice,
            content: "unrelated",
            confidence: None,
            metadata: r#"{"task_id": "T-2"}"#,
            thread_id: None,
        })
        .await
        .unwrap();

    let filter = serde_json::json!({ "task_id": "T-1" });
    let results = broker
        .search(SearchRequest {
            channel_ids: std::slice::from_ref(&channel.id),
            query: None,
            filter: Some(&filter),
            profile: RankingProfile::RECENT,
            limit: 10,
        })
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].message.content, "build broke");
}

/// `search_for_agent` intersects the requested channels with what the
/// agent can actually see — a channel it never joined yields nothing, even
/// if explicitly requested.
#[tokio::test]
async fn search_for_agent_excludes_channels_not_visible_to_them() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let bob = register(&broker, "bob", "open").await;

    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "private",
            scope: "global",
            project_id: None,
            name: "secret",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();
    broker
        .send(SendMessage {
            channel_id: &channel.id,
            sender: &alice,
            content: "classified",
            confidence: None,
            metadata: "{}",
            thread_id: None,
        })
        .await
        .unwrap();

    let results = broker
        .search_for_agent(
            &bob,
            SearchRequest {
                channel_ids: std::slice::from_ref(&channel.id),
                query: None,
                filter: None,
                profile: RankingProfile::RECENT,
                limit: 10,
            },
        )
        .await
        .unwrap();
    assert!(results.is_empty());
}

/// With no vector backend configured, a drift check is a clean no-op
/// rather than an error (§4.4 resync check degrades gracefully).
#[tokio::test]
async fn vector_drift_check_is_empty_without_a_backend() {
    let broker = Broker::open_in_memory().await.unwrap();
    let report = broker.check_vector_drift(100).await.unwrap();
    assert!(report.is_clean());
}

#[tokio::test]
async fn invite_requires_can_invite_membership() {
    let broker = Broker::open_in_memory().await.unwrap();
    let alice = register(&broker, "alice", "open").await;
    let bob = register(&broker, "bob", "open").await;
    let channel = broker
        .create_channel(CreateChannel {
            channel_type: "channel",
            access_type: "private",
            scope: "global",
            project_id: None,
            name: "team",
            description: "",
            is_default: false,
            owner: None,
        })
        .await
        .unwrap();
    broker.join_channel(&channel.id, &alice).await.unwrap();

    let err = broker.invite(&channel.id, &alice, &bob).await.unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}
