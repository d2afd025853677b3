//! Hybrid search (§4.5): unions the SQL filter path and the vector index's
//! candidate set, scores every candidate with
//! `claude_slack_core::ranking::combined_score`, and returns a
//! deterministically ordered page. Candidate generation is two-source
//! (lexical/filter + vector); scoring and ranking are a single shared
//! formula rather than per-source reciprocal-rank fusion, since the
//! scoring dimensions (similarity/confidence/recency) are weighted
//! directly rather than blended by rank.

use crate::compiler::{self, SqlFilter};
use crate::error::{SearchError, SearchResult};
use crate::vector_index::VectorIndex;
use claude_slack_core::filter::FilterNode;
use claude_slack_core::ranking::{combined_score, RankingProfile, ScoreInputs};
use claude_slack_db::models::MessageRow;
use claude_slack_db::timestamps::{age_hours, now_seconds};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub message: MessageRow,
    pub score: f64,
    pub similarity: Option<f64>,
}

impl PartialEq for ScoredMessage {
    fn eq(&self, other: &Self) -> bool {
        self.message.id == other.message.id
    }
}
impl Eq for ScoredMessage {}
impl PartialOrd for ScoredMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then(self.message.id.cmp(&other.message.id))
    }
}

pub struct HybridSearchParams<'a> {
    pub channel_ids: &'a [String],
    pub filter: Option<&'a FilterNode>,
    pub query_embedding: Option<&'a [f32]>,
    pub profile: RankingProfile,
    pub limit: usize,
}

/// Run a hybrid search: SQL candidates (scope + filter) unioned with
/// vector candidates (when an embedding and index are supplied), scored
/// and ranked by `profile`, truncated to `limit`.
pub async fn hybrid_search(
    pool: &SqlitePool,
    vector_index: Option<&dyn VectorIndex>,
    params: HybridSearchParams<'_>,
) -> SearchResult<Vec<ScoredMessage>> {
    if params.channel_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql_filter = match params.filter {
        Some(node) => compiler::compile_sql(node)?,
        None => SqlFilter::default(),
    }
    .or_always_true();

    let sql_candidates = fetch_sql_candidates(pool, params.channel_ids, &sql_filter).await?;

    let mut similarity_by_id: HashMap<i64, f64> = HashMap::new();
    if let (Some(embedding), Some(index)) = (params.query_embedding, vector_index) {
        let vector_filter = params.filter.map(compiler::compile_vector_filter).transpose()?;
        let hits = index.search(embedding, params.limit.max(50), vector_filter.as_ref()).await?;
        for hit in hits {
            similarity_by_id.insert(hit.message_id, f64::from(hit.score));
        }
    }

    let mut by_id: HashMap<i64, MessageRow> = sql_candidates.into_iter().map(|m| (m.id, m)).collect();
    for id in similarity_by_id.keys() {
        if !by_id.contains_key(id) {
            if let Ok(row) = claude_slack_db::queries::messages::get_message(pool, *id).await {
                by_id.insert(*id, row);
            }
        }
    }

    let now = now_seconds();
    let mut scored: Vec<ScoredMessage> = by_id
        .into_values()
        .map(|message| {
            let similarity = similarity_by_id.get(&message.id).copied();
            let inputs = ScoreInputs {
                similarity,
                confidence: message.confidence,
                age_hours: age_hours(message.timestamp, now),
            };
            let score = combined_score(inputs, params.profile);
            ScoredMessage { message, score, similarity }
        })
        .collect();

    scored.sort();
    scored.truncate(params.limit);
    Ok(scored)
}

async fn fetch_sql_candidates(
    pool: &SqlitePool,
    channel_ids: &[String],
    filter: &SqlFilter,
) -> SearchResult<Vec<MessageRow>> {
    let placeholders = channel_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT * FROM messages WHERE channel_id IN ({placeholders}) AND is_deleted = 0 AND ({})",
        filter.where_clause
    );
    let mut query = sqlx::query_as::<_, MessageRow>(&sql);
    for id in channel_ids {
        query = query.bind(id);
    }
    for bound in &filter.params {
        query = bind_one(query, bound);
    }
    query.fetch_all(pool).await.map_err(|e| SearchError::Db(claude_slack_db::DbError::Sqlx(e)))
}

fn bind_one<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, MessageRow, sqlx::sqlite::SqliteArguments<'q>>,
    bound: &'q crate::compiler::Bound,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, MessageRow, sqlx::sqlite::SqliteArguments<'q>> {
    use crate::compiler::Bound as B;
    match bound {
        B::Text(s) => query.bind(s),
        B::Int(i) => query.bind(i),
        B::Real(r) => query.bind(r),
        B::Bool(b) => query.bind(b),
        B::Null => query.bind(Option::<i64>::None),
    }
}
