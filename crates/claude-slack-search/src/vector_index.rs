//! Vector index adapter (§4.4, §4.5, §9): one trait, two variants — a
//! local brute-force flat index for the common case, and a remote Qdrant
//! collection for deployments that already run one. Both sides of
//! `claude_slack_core::config::VectorBackendKind` construct into this
//! same trait object so the rest of the search layer never branches on
//! backend.

use crate::error::{SearchError, SearchResult};
use async_trait::async_trait;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// One stored vector plus the identifiers needed to join back to a message.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub message_id: i64,
    pub channel_id: String,
    pub embedding: Vec<f32>,
    /// Flattened scalar payload used by the local backend's own filter
    /// evaluation and mirrored into Qdrant's payload on the remote side.
    pub payload: HashMap<String, Json>,
}

/// A scored hit from `VectorIndex::search`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub message_id: i64,
    pub score: f32,
}

impl PartialEq for VectorHit {
    fn eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id && self.score == other.score
    }
}
impl Eq for VectorHit {}

impl PartialOrd for VectorHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VectorHit {
    /// Higher score first; ties broken by ascending `message_id` for a
    /// deterministic, stable top-k (§4.5).
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.partial_cmp(&self.score).unwrap_or(Ordering::Equal).then(self.message_id.cmp(&other.message_id))
    }
}

/// Common surface both backends implement. Upserts/deletes are the
/// "dual-write" side of §4.4; `search` is the candidate-generation half of
/// hybrid search (§4.5).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, record: VectorRecord) -> SearchResult<()>;
    async fn delete(&self, message_id: i64) -> SearchResult<()>;
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Json>,
    ) -> SearchResult<Vec<VectorHit>>;
    /// Total number of vectors currently stored, used by the resync
    /// consistency check (§4.4) to detect index/DB drift.
    async fn len(&self) -> SearchResult<usize>;
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Brute-force cosine-similarity index held entirely in memory, with an
/// optional on-disk snapshot path for restart durability. This is the
/// default backend when no remote vector service is configured.
pub struct LocalIndex {
    records: RwLock<HashMap<i64, VectorRecord>>,
    snapshot_path: Option<PathBuf>,
}

impl LocalIndex {
    #[must_use]
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self { records: RwLock::new(HashMap::new()), snapshot_path }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Persist the current record set to `snapshot_path` as newline-delimited
    /// JSON. A no-op when no path was configured.
    pub fn snapshot(&self) -> SearchResult<()> {
        let Some(path) = &self.snapshot_path else { return Ok(()) };
        let records = self.records.read().expect("lock poisoned");
        let mut lines = Vec::with_capacity(records.len());
        for record in records.values() {
            let line = serde_json::json!({
                "message_id": record.message_id,
                "channel_id": record.channel_id,
                "embedding": record.embedding,
                "payload": record.payload,
            });
            lines.push(line.to_string());
        }
        std::fs::write(path, lines.join("\n")).map_err(|e| SearchError::Backend(e.to_string()))
    }

    pub fn load_snapshot(path: &Path) -> SearchResult<Self> {
        let index = Self::new(Some(path.to_path_buf()));
        if !path.exists() {
            return Ok(index);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| SearchError::Backend(e.to_string()))?;
        let mut records = index.records.write().expect("lock poisoned");
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let v: Json = serde_json::from_str(line).map_err(|e| SearchError::Backend(e.to_string()))?;
            let record = VectorRecord {
                message_id: v["message_id"].as_i64().unwrap_or_default(),
                channel_id: v["channel_id"].as_str().unwrap_or_default().to_string(),
                embedding: v["embedding"]
                    .as_array()
                    .map(|a| a.iter().filter_map(Json::as_f64).map(|f| f as f32).collect())
                    .unwrap_or_default(),
                payload: v["payload"].as_object().map(|m| m.clone().into_iter().collect()).unwrap_or_default(),
            };
            records.insert(record.message_id, record);
        }
        drop(records);
        Ok(index)
    }

    fn matches_filter(payload: &HashMap<String, Json>, filter: &Json) -> bool {
        // Minimal evaluator for the subset `compiler::compile_vector_filter`
        // emits: `key`+`match.value`, `must`, `should`, `must_not`.
        if let Some(must) = filter.get("must").and_then(Json::as_array) {
            return must.iter().all(|c| Self::matches_filter(payload, c));
        }
        if let Some(should) = filter.get("should").and_then(Json::as_array) {
            return should.iter().any(|c| Self::matches_filter(payload, c));
        }
        if let Some(must_not) = filter.get("must_not").and_then(Json::as_array) {
            return must_not.iter().all(|c| !Self::matches_filter(payload, c));
        }
        if let Some(key) = filter.get("key").and_then(Json::as_str) {
            let Some(actual) = payload.get(key) else { return false };
            if let Some(expected) = filter.get("match").and_then(|m| m.get("value")) {
                return actual == expected;
            }
            if let Some(range) = filter.get("range") {
                return range_matches(actual, range);
            }
        }
        true
    }
}

fn range_matches(actual: &Json, range: &Json) -> bool {
    let Some(a) = actual.as_f64() else { return false };
    let check = |bound: &str, cmp: fn(f64, f64) -> bool| {
        range.get(bound).and_then(Json::as_f64).is_none_or(|b| cmp(a, b))
    };
    check("gt", |a, b| a > b) && check("gte", |a, b| a >= b) && check("lt", |a, b| a < b) && check("lte", |a, b| a <= b)
}

#[async_trait]
impl VectorIndex for LocalIndex {
    async fn upsert(&self, record: VectorRecord) -> SearchResult<()> {
        self.records.write().expect("lock poisoned").insert(record.message_id, record);
        Ok(())
    }

    async fn delete(&self, message_id: i64) -> SearchResult<()> {
        self.records.write().expect("lock poisoned").remove(&message_id);
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize, filter: Option<&Json>) -> SearchResult<Vec<VectorHit>> {
        let records = self.records.read().expect("lock poisoned");
        let mut hits: Vec<VectorHit> = records
            .values()
            .filter(|r| filter.is_none_or(|f| Self::matches_filter(&r.payload, f)))
            .map(|r| VectorHit { message_id: r.message_id, score: cosine(query, &r.embedding) })
            .collect();
        hits.sort();
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn len(&self) -> SearchResult<usize> {
        Ok(self.records.read().expect("lock poisoned").len())
    }
}

/// Thin wrapper over `qdrant-client`, used when `VectorBackendKind::Remote`
/// is configured (§9: "an external vector service reachable over HTTP").
pub struct RemoteIndex {
    client: qdrant_client::Qdrant,
    collection: String,
}

impl RemoteIndex {
    pub fn connect(url: &str, api_key: Option<&str>, collection: impl Into<String>) -> SearchResult<Self> {
        let mut builder = qdrant_client::Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key.to_string());
        }
        let client = builder.build().map_err(|e| SearchError::Unavailable(e.to_string()))?;
        Ok(Self { client, collection: collection.into() })
    }
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    async fn upsert(&self, record: VectorRecord) -> SearchResult<()> {
        use qdrant_client::qdrant::{PointStruct, UpsertPointsBuilder};

        let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
        payload.insert("channel_id".into(), record.channel_id.clone().into());
        for (k, v) in &record.payload {
            payload.insert(k.clone(), json_to_qdrant(v));
        }
        let point = PointStruct::new(record.message_id as u64, record.embedding, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, vec![point]))
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, message_id: i64) -> SearchResult<()> {
        use qdrant_client::qdrant::{DeletePointsBuilder, PointsIdsList};

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids: vec![(message_id as u64).into()] }),
            )
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize, _filter: Option<&Json>) -> SearchResult<Vec<VectorHit>> {
        use qdrant_client::qdrant::SearchPointsBuilder;

        let response = self
            .client
            .search_points(SearchPointsBuilder::new(&self.collection, query.to_vec(), top_k as u64))
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|p| match p.id.and_then(|id| id.point_id_options) {
                Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                    Some(VectorHit { message_id: n as i64, score: p.score })
                }
                _ => None,
            })
            .collect())
    }

    async fn len(&self) -> SearchResult<usize> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| SearchError::Backend(e.to_string()))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0) as usize)
    }
}

fn json_to_qdrant(v: &Json) -> qdrant_client::qdrant::Value {
    match v {
        Json::String(s) => s.clone().into(),
        Json::Number(n) => n.as_f64().unwrap_or_default().into(),
        Json::Bool(b) => (*b).into(),
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord { message_id: id, channel_id: "global:eng".into(), embedding, payload: HashMap::new() }
    }

    #[tokio::test]
    async fn search_orders_by_cosine_similarity_descending() {
        let index = LocalIndex::in_memory();
        index.upsert(record(1, vec![1.0, 0.0])).await.unwrap();
        index.upsert(record(2, vec![0.0, 1.0])).await.unwrap();
        index.upsert(record(3, vec![0.9, 0.1])).await.unwrap();

        let hits = index.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits[0].message_id, 1);
        assert_eq!(hits[1].message_id, 3);
        assert_eq!(hits[2].message_id, 2);
    }

    #[tokio::test]
    async fn delete_removes_from_subsequent_search() {
        let index = LocalIndex::in_memory();
        index.upsert(record(1, vec![1.0, 0.0])).await.unwrap();
        index.delete(1).await.unwrap();
        let hits = index.search(&[1.0, 0.0], 10, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn filter_excludes_non_matching_payloads() {
        let index = LocalIndex::in_memory();
        let mut r1 = record(1, vec![1.0, 0.0]);
        r1.payload.insert("sender_id".into(), serde_json::json!("alice"));
        let mut r2 = record(2, vec![1.0, 0.0]);
        r2.payload.insert("sender_id".into(), serde_json::json!("bob"));
        index.upsert(r1).await.unwrap();
        index.upsert(r2).await.unwrap();

        let filter = serde_json::json!({ "key": "sender_id", "match": { "value": "alice" } });
        let hits = index.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, 1);
    }
}
