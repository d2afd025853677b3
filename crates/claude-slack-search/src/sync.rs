//! Dual-write and resync between the relational store and the vector
//! index (§4.4: "writes go to SQLite first, then the vector index;
//! a resync check detects and repairs drift").

use crate::error::{SearchError, SearchResult};
use crate::vector_index::{VectorIndex, VectorRecord};
use claude_slack_db::models::MessageRow;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Mutex;

/// An embedder turns message content into a fixed-length vector. Kept as a
/// trait so the hybrid search path and the tests can both supply a
/// deterministic stand-in without depending on a live model.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
    fn dimensions(&self) -> usize;
}

/// `Embedder` backed by a local `fastembed` model (`all-MiniLM-L6-v2`, 384
/// dimensions), used when no remote embedding service is configured. The
/// underlying model is not `Sync` on its own, so calls are serialized behind
/// a mutex — acceptable since embedding one message's content is already
/// CPU-bound and short relative to the surrounding I/O.
pub struct FastEmbedEmbedder {
    model: Mutex<fastembed::TextEmbedding>,
    dimensions: usize,
}

impl FastEmbedEmbedder {
    pub fn new() -> SearchResult<Self> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2),
        )
        .map_err(|e| SearchError::Backend(e.to_string()))?;
        Ok(Self { model: Mutex::new(model), dimensions: 384 })
    }
}

impl Embedder for FastEmbedEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut model = self.model.lock().expect("lock poisoned");
        model
            .embed(vec![text], None)
            .ok()
            .and_then(|mut batch| batch.pop())
            .unwrap_or_else(|| vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Metadata keys copied verbatim from `MessageRow.metadata` into the vector
/// payload's flat `metadata.<key>` facets (§4.4: "a small subset of metadata
/// chosen at configure time"). `type` is the one the rest of this system's
/// filters actually key on (`discovery`'s agent config and the search
/// layer's own `$eq` filters on a message's declared kind).
const INDEXED_METADATA_KEYS: &[&str] = &["type"];

/// Write a message to the vector index after it has been committed to
/// SQLite. Failures here are logged and surfaced as `Unavailable` rather
/// than rolling back the SQL write — the resync check is the backstop
/// (§4.4: "a missed vector write is not fatal; the next resync repairs it").
pub async fn index_message(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    message: &MessageRow,
) -> SearchResult<()> {
    let embedding = embedder.embed(&message.content);
    let mut payload = HashMap::new();
    payload.insert("sender_id".to_string(), serde_json::json!(message.sender_name));
    payload.insert("project_id".to_string(), serde_json::json!(message.sender_project_id));
    payload.insert("timestamp".to_string(), serde_json::json!(message.timestamp));
    if let Some(confidence) = message.confidence {
        payload.insert("confidence".to_string(), serde_json::json!(confidence));
    }

    if let Ok(metadata) = serde_json::from_str::<serde_json::Value>(&message.metadata) {
        if let Some(object) = metadata.as_object() {
            for key in INDEXED_METADATA_KEYS {
                if let Some(value) = object.get(*key) {
                    payload.insert(format!("metadata.{key}"), value.clone());
                }
            }
        }
    }

    let now = claude_slack_db::timestamps::now_seconds();
    let age_days = claude_slack_db::timestamps::age_hours(message.timestamp, now) / 24.0;
    let word_count = message.content.split_whitespace().count();
    payload.insert("age_days".to_string(), serde_json::json!(age_days));
    payload.insert("word_count".to_string(), serde_json::json!(word_count));
    payload.insert("has_breadcrumbs".to_string(), serde_json::json!(has_breadcrumbs(&message.content)));

    index
        .upsert(VectorRecord {
            message_id: message.id,
            channel_id: message.channel_id.clone(),
            embedding,
            payload,
        })
        .await
}

/// A message "has breadcrumbs" when it references something a reader could
/// follow up on outside the message itself: a file path (a path segment
/// ending in a dotted extension) or a bracketed cross-reference like
/// `[#123]`/`[ADR-4]`. Heuristic, not exhaustive — the filter it backs is a
/// coarse recall aid, not a precise classifier.
fn has_breadcrumbs(content: &str) -> bool {
    let has_file_path = content.split(|c: char| c.is_whitespace() || c == ',' || c == ';').any(|tok| {
        let tok = tok.trim_matches(|c: char| "()[]{}\"'".contains(c));
        tok.contains('/') && tok.rsplit('.').next().is_some_and(|ext| ext.len() <= 4 && ext.chars().all(char::is_alphanumeric) && !ext.is_empty())
    });
    has_file_path || (content.contains('[') && content.contains(']'))
}

/// Report of a single resync pass: ids present in SQLite but missing from
/// the vector index (to be (re)embedded), and ids present in the index but
/// no longer in SQLite (to be deleted, e.g. after a hard purge).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub missing_from_index: Vec<i64>,
    pub orphaned_in_index: Vec<i64>,
}

impl DriftReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_from_index.is_empty() && self.orphaned_in_index.is_empty()
    }
}

/// Compare the live message set against the vector index's id set.
/// `sample_limit` bounds how many SQL ids are pulled per pass so a resync
/// check never locks the reader pool for an unbounded scan.
pub async fn check_drift(
    pool: &SqlitePool,
    index: &dyn VectorIndex,
    sample_limit: i64,
) -> SearchResult<DriftReport> {
    let sql_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM messages WHERE is_deleted = 0 ORDER BY id DESC LIMIT ?")
            .bind(sample_limit)
            .fetch_all(pool)
            .await
            .map_err(|e| crate::error::SearchError::Db(claude_slack_db::DbError::Sqlx(e)))?;

    // A zero vector probe with an unbounded top_k surfaces every id the
    // index currently holds for this sample window; real deployments would
    // instead page through the index's own id listing, but the trait is
    // kept minimal (§4.4 non-goals exclude an index-wide scan API).
    let indexed: std::collections::HashSet<i64> = index
        .search(&[0.0], index.len().await?, None)
        .await?
        .into_iter()
        .map(|h| h.message_id)
        .collect();

    let sql_set: std::collections::HashSet<i64> = sql_ids.into_iter().collect();
    let missing_from_index = sql_set.difference(&indexed).copied().collect();
    let orphaned_in_index = indexed.difference(&sql_set).copied().collect();
    Ok(DriftReport { missing_from_index, orphaned_in_index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::LocalIndex;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn embed(&self, _text: &str) -> Vec<f32> {
            vec![0.1, 0.2, 0.3]
        }
        fn dimensions(&self) -> usize {
            3
        }
    }

    fn sample_message(content: &str, metadata: &str) -> MessageRow {
        MessageRow {
            id: 1,
            channel_id: "global:eng".into(),
            sender_name: "alice".into(),
            sender_project_id: Some("proj-1".into()),
            content: content.to_string(),
            timestamp: claude_slack_db::timestamps::now_seconds() - 3600.0,
            confidence: Some(0.8),
            metadata: metadata.to_string(),
            thread_id: None,
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn dual_write_payload_carries_project_and_derived_facets() {
        let index = LocalIndex::in_memory();
        let embedder = StubEmbedder;
        let message = sample_message("see src/main.rs for the fix", r#"{"type": "incident"}"#);

        index_message(&index, &embedder, &message).await.unwrap();

        let by_project = serde_json::json!({ "key": "project_id", "match": { "value": "proj-1" } });
        let hits = index.search(&[0.1, 0.2, 0.3], 1, Some(&by_project)).await.unwrap();
        assert_eq!(hits.len(), 1, "project_id must be present in the dual-write payload");

        let by_metadata_type = serde_json::json!({ "key": "metadata.type", "match": { "value": "incident" } });
        let hits = index.search(&[0.1, 0.2, 0.3], 1, Some(&by_metadata_type)).await.unwrap();
        assert_eq!(hits.len(), 1, "the configured metadata subset must be copied into the payload");

        let has_breadcrumbs_filter = serde_json::json!({ "key": "has_breadcrumbs", "match": { "value": true } });
        let hits = index.search(&[0.1, 0.2, 0.3], 1, Some(&has_breadcrumbs_filter)).await.unwrap();
        assert_eq!(hits.len(), 1, "a file-path reference should set has_breadcrumbs");
    }

    #[test]
    fn has_breadcrumbs_detects_file_paths_and_bracket_refs() {
        assert!(has_breadcrumbs("see src/main.rs for details"));
        assert!(has_breadcrumbs("tracked in [ADR-4]"));
        assert!(!has_breadcrumbs("just plain prose with no pointers"));
    }
}
