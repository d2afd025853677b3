//! Integration coverage for hybrid search (§4.5): ranking profile choice
//! changes result order over the same candidate set.

use claude_slack_core::filter;
use claude_slack_core::ranking::RankingProfile;
use claude_slack_db::queries::{channels, messages};
use claude_slack_db::DbPool;
use claude_slack_search::hybrid::{hybrid_search, HybridSearchParams};
use serde_json::json;

async fn seeded_pool() -> DbPool {
    let pool = DbPool::open_in_memory().await.unwrap();
    let mut writer = pool.writer().await;
    channels::create_channel(
        &mut *writer,
        channels::NewChannel {
            id: "global:eng",
            channel_type: "channel",
            access_type: "open",
            scope: "global",
            project_id: None,
            name: "eng",
            description: "",
            is_default: false,
            owner_name: None,
            owner_project_id: None,
        },
    )
    .await
    .unwrap();

    messages::insert_message(
        &mut *writer,
        messages::NewMessage {
            channel_id: "global:eng",
            sender_name: "alice",
            sender_project_id: None,
            content: "fresh but low confidence",
            confidence: Some(0.3),
            metadata: "{}",
            thread_id: None,
        },
    )
    .await
    .unwrap();

    messages::insert_message(
        &mut *writer,
        messages::NewMessage {
            channel_id: "global:eng",
            sender_name: "bob",
            sender_project_id: None,
            content: "old but high confidence",
            confidence: Some(0.95),
            metadata: "{}",
            thread_id: None,
        },
    )
    .await
    .unwrap();

    drop(writer);
    pool
}

#[tokio::test]
async fn filter_only_path_scores_on_confidence_and_recency() {
    let pool = seeded_pool().await;
    let channels = vec!["global:eng".to_string()];

    let results = hybrid_search(
        pool.readers(),
        None,
        HybridSearchParams {
            channel_ids: &channels,
            filter: None,
            query_embedding: None,
            profile: RankingProfile::QUALITY,
            limit: 10,
        },
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 2);
    // QUALITY weights confidence heavily (0.5) and recency lightly (0.1);
    // the high-confidence message should outrank the fresh low-confidence one.
    assert_eq!(results[0].message.sender_name, "bob");
}

#[tokio::test]
async fn field_filter_narrows_candidates() {
    let pool = seeded_pool().await;
    let channels = vec!["global:eng".to_string()];
    let node = filter::parse(&json!({ "sender_id": "alice" })).unwrap();

    let results = hybrid_search(
        pool.readers(),
        None,
        HybridSearchParams {
            channel_ids: &channels,
            filter: Some(&node),
            query_embedding: None,
            profile: RankingProfile::BALANCED,
            limit: 10,
        },
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].message.sender_name, "alice");
}

#[tokio::test]
async fn empty_channel_scope_returns_no_results() {
    let pool = seeded_pool().await;
    let channels: Vec<String> = vec![];

    let results = hybrid_search(
        pool.readers(),
        None,
        HybridSearchParams {
            channel_ids: &channels,
            filter: None,
            query_embedding: None,
            profile: RankingProfile::BALANCED,
            limit: 10,
        },
    )
    .await
    .unwrap();

    assert!(results.is_empty());
}
