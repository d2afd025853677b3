//! Filter compiler (§4.3): turns `claude_slack_core::filter::FilterNode`
//! into the two backend-native shapes the search layer needs — a SQL
//! `WHERE` fragment with positional parameters for the SQLite lexical
//! path, and a Qdrant payload filter for the vector path. Every message
//! field outside `claude_slack_core::filter::SYSTEM_FIELDS` is addressed
//! through `json_extract(metadata, '$.<field>')` on the SQL side and a
//! plain payload key on the vector side.

use crate::error::{SearchError, SearchResult};
use claude_slack_core::filter::{is_system_field, FieldOp, FilterNode};
use serde_json::{json, Value as Json};

/// One bound parameter in `SqlFilter::params`, in the order its `?`
/// placeholder appears in `where_clause`.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Null,
}

impl From<&Json> for Bound {
    fn from(v: &Json) -> Self {
        match v {
            Json::String(s) => Self::Text(s.clone()),
            Json::Number(n) if n.is_i64() || n.is_u64() => Self::Int(n.as_i64().unwrap_or_default()),
            Json::Number(n) => Self::Real(n.as_f64().unwrap_or_default()),
            Json::Bool(b) => Self::Bool(*b),
            Json::Null => Self::Null,
            Json::Array(_) | Json::Object(_) => Self::Text(v.to_string()),
        }
    }
}

/// A compiled SQL predicate: a `WHERE`-clause fragment (no leading
/// `WHERE`) plus its positional bind values.
#[derive(Debug, Clone, Default)]
pub struct SqlFilter {
    pub where_clause: String,
    pub params: Vec<Bound>,
}

impl SqlFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty()
    }

    /// `"1=1"` when there is nothing to filter on, so callers can always
    /// splice this into `WHERE {clause} AND ...` without special-casing.
    #[must_use]
    pub fn or_always_true(self) -> Self {
        if self.where_clause.is_empty() {
            Self { where_clause: "1=1".to_string(), params: Vec::new() }
        } else {
            self
        }
    }
}

fn column_for(field: &str) -> String {
    if is_system_field(field) {
        field.to_string()
    } else {
        format!("json_extract(metadata, '$.{field}')")
    }
}

/// Compile a `FilterNode` into a SQL fragment for the `messages` table.
pub fn compile_sql(node: &FilterNode) -> SearchResult<SqlFilter> {
    let mut params = Vec::new();
    let clause = emit_sql(node, &mut params)?;
    Ok(SqlFilter { where_clause: clause, params })
}

fn emit_sql(node: &FilterNode, params: &mut Vec<Bound>) -> SearchResult<String> {
    match node {
        FilterNode::And(children) => join_sql(children, "AND", params),
        FilterNode::Or(children) => join_sql(children, "OR", params),
        FilterNode::Not(inner) => Ok(format!("NOT ({})", emit_sql(inner, params)?)),
        FilterNode::Field { path, op } => emit_field_sql(path, op, params),
    }
}

fn join_sql(children: &[FilterNode], joiner: &str, params: &mut Vec<Bound>) -> SearchResult<String> {
    if children.is_empty() {
        return Err(SearchError::Filter("empty logical clause".into()));
    }
    let parts: Vec<String> =
        children.iter().map(|c| emit_sql(c, params)).collect::<SearchResult<_>>()?;
    Ok(format!("({})", parts.join(&format!(" {joiner} "))))
}

fn emit_field_sql(path: &str, op: &FieldOp, params: &mut Vec<Bound>) -> SearchResult<String> {
    let col = column_for(path);
    let push = |params: &mut Vec<Bound>, v: &Json| params.push(Bound::from(v));

    let sql = match op {
        FieldOp::Eq(v) => {
            push(params, v);
            format!("{col} = ?")
        }
        FieldOp::Ne(v) => {
            push(params, v);
            format!("{col} != ?")
        }
        FieldOp::Gt(v) => {
            push(params, v);
            format!("{col} > ?")
        }
        FieldOp::Gte(v) => {
            push(params, v);
            format!("{col} >= ?")
        }
        FieldOp::Lt(v) => {
            push(params, v);
            format!("{col} < ?")
        }
        FieldOp::Lte(v) => {
            push(params, v);
            format!("{col} <= ?")
        }
        FieldOp::Between(lo, hi) => {
            push(params, lo);
            push(params, hi);
            format!("{col} BETWEEN ? AND ?")
        }
        FieldOp::In(values) => {
            if values.is_empty() {
                return Ok("0".to_string());
            }
            for v in values {
                push(params, v);
            }
            let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            format!("{col} IN ({placeholders})")
        }
        FieldOp::Nin(values) => {
            if values.is_empty() {
                return Ok("1".to_string());
            }
            for v in values {
                push(params, v);
            }
            let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            format!("{col} NOT IN ({placeholders})")
        }
        FieldOp::Contains(v) => {
            params.push(Bound::Text(format!("%{}%", scalar_to_like(v))));
            format!("{col} LIKE ? ESCAPE '\\'")
        }
        FieldOp::NotContains(v) => {
            params.push(Bound::Text(format!("%{}%", scalar_to_like(v))));
            format!("{col} NOT LIKE ? ESCAPE '\\'")
        }
        FieldOp::All(values) => {
            // Every value must appear in the JSON array stored at `path`.
            let clauses = values
                .iter()
                .map(|v| {
                    push(params, v);
                    format!("EXISTS (SELECT 1 FROM json_each({col}) WHERE json_each.value = ?)")
                })
                .collect::<Vec<_>>();
            format!("({})", clauses.join(" AND "))
        }
        FieldOp::Size(n) => {
            params.push(Bound::Int(*n));
            format!("(SELECT COUNT(*) FROM json_each({col})) = ?")
        }
        FieldOp::Exists(expected) => {
            let exists = format!("{col} IS NOT NULL");
            if *expected {
                exists
            } else {
                format!("NOT ({exists})")
            }
        }
        FieldOp::Null(expected) => {
            if *expected {
                format!("{col} IS NULL")
            } else {
                format!("{col} IS NOT NULL")
            }
        }
        FieldOp::Empty(expected) => {
            let empty = format!("({col} IS NULL OR {col} = '' OR {col} = '[]' OR {col} = '{{}}')");
            if *expected {
                empty
            } else {
                format!("NOT {empty}")
            }
        }
        FieldOp::Regex(pattern) => {
            // SQLite has no native REGEXP without an extension; fall back to
            // substring containment, which is the conservative subset every
            // backend can satisfy identically.
            params.push(Bound::Text(format!("%{}%", scalar_to_like(&json!(pattern)))));
            format!("{col} LIKE ? ESCAPE '\\'")
        }
        FieldOp::Text(query) => {
            return Ok(format!(
                "rowid IN (SELECT rowid FROM messages_fts WHERE messages_fts MATCH {})",
                quote_fts(query)
            ));
        }
    };
    Ok(sql)
}

fn scalar_to_like(v: &Json) -> String {
    let s = match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    };
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn quote_fts(query: &str) -> String {
    format!("'{}'", query.replace('\'', "''"))
}

/// Compile a `FilterNode` into a Qdrant-shaped payload filter
/// (`must`/`should`/`must_not` of key-match/range conditions), used by the
/// remote vector backend's pre-filtering.
pub fn compile_vector_filter(node: &FilterNode) -> SearchResult<Json> {
    emit_vector(node)
}

fn emit_vector(node: &FilterNode) -> SearchResult<Json> {
    match node {
        FilterNode::And(children) => {
            let clauses = children.iter().map(emit_vector).collect::<SearchResult<Vec<_>>>()?;
            Ok(json!({ "must": clauses }))
        }
        FilterNode::Or(children) => {
            let clauses = children.iter().map(emit_vector).collect::<SearchResult<Vec<_>>>()?;
            Ok(json!({ "should": clauses }))
        }
        FilterNode::Not(inner) => {
            let clause = emit_vector(inner)?;
            Ok(json!({ "must_not": [clause] }))
        }
        FilterNode::Field { path, op } => emit_vector_field(path, op),
    }
}

fn payload_key_for(path: &str) -> String {
    if is_system_field(path) {
        path.to_string()
    } else {
        format!("metadata.{path}")
    }
}

fn emit_vector_field(path: &str, op: &FieldOp) -> SearchResult<Json> {
    let key = payload_key_for(path);
    Ok(match op {
        FieldOp::Eq(v) => json!({ "key": key, "match": { "value": v } }),
        FieldOp::Ne(v) => json!({ "must_not": [{ "key": key, "match": { "value": v } }] }),
        FieldOp::Gt(v) => json!({ "key": key, "range": { "gt": v } }),
        FieldOp::Gte(v) => json!({ "key": key, "range": { "gte": v } }),
        FieldOp::Lt(v) => json!({ "key": key, "range": { "lt": v } }),
        FieldOp::Lte(v) => json!({ "key": key, "range": { "lte": v } }),
        FieldOp::Between(lo, hi) => json!({ "key": key, "range": { "gte": lo, "lte": hi } }),
        FieldOp::In(values) => json!({ "key": key, "match": { "any": values } }),
        FieldOp::Nin(values) => json!({ "key": key, "match": { "except": values } }),
        FieldOp::Exists(expected) => {
            if *expected {
                json!({ "key": key, "is_empty": { "key": key } })
            } else {
                json!({ "is_null": { "key": key } })
            }
        }
        FieldOp::Null(expected) => {
            if *expected {
                json!({ "is_null": { "key": key } })
            } else {
                json!({ "must_not": [{ "is_null": { "key": key } }] })
            }
        }
        // Contains/NotContains/All/Size/Empty/Regex/Text have no first-class
        // Qdrant payload-filter equivalent; the vector path treats them as
        // always-true and relies on the SQL path (applied post-retrieval in
        // the hybrid merge) to narrow the final result set.
        FieldOp::Contains(_)
        | FieldOp::NotContains(_)
        | FieldOp::All(_)
        | FieldOp::Size(_)
        | FieldOp::Empty(_)
        | FieldOp::Regex(_)
        | FieldOp::Text(_) => json!({ "must": [] }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use claude_slack_core::filter;
    use serde_json::json;

    #[test]
    fn eq_on_system_field_uses_bare_column() {
        let node = filter::parse(&json!({ "sender_id": "alice" })).unwrap();
        let sql = compile_sql(&node).unwrap();
        assert!(sql.where_clause.contains("sender_id = ?"));
        assert_eq!(sql.params, vec![Bound::Text("alice".into())]);
    }

    #[test]
    fn eq_on_metadata_field_uses_json_extract() {
        let node = filter::parse(&json!({ "task_id": "T-1" })).unwrap();
        let sql = compile_sql(&node).unwrap();
        assert!(sql.where_clause.contains("json_extract(metadata, '$.task_id') = ?"));
    }

    #[test]
    fn between_binds_two_params_in_order() {
        let node = filter::parse(&json!({ "confidence": { "$between": [0.2, 0.9] } })).unwrap();
        let sql = compile_sql(&node).unwrap();
        assert_eq!(sql.params, vec![Bound::Real(0.2), Bound::Real(0.9)]);
    }

    #[test]
    fn text_operator_compiles_to_fts_subquery() {
        let node = filter::parse(&json!({ "content": { "$text": "deploy failure" } })).unwrap();
        let sql = compile_sql(&node).unwrap();
        assert!(sql.where_clause.contains("messages_fts MATCH"));
    }

    #[test]
    fn vector_filter_translates_eq_to_match_value() {
        let node = filter::parse(&json!({ "sender_id": "alice" })).unwrap();
        let vf = compile_vector_filter(&node).unwrap();
        assert_eq!(vf["key"], json!("sender_id"));
        assert_eq!(vf["match"]["value"], json!("alice"));
    }

    #[test]
    fn vector_filter_prefixes_non_system_field_with_metadata() {
        let node = filter::parse(&json!({ "task_id": "T-1" })).unwrap();
        let vf = compile_vector_filter(&node).unwrap();
        assert_eq!(vf["key"], json!("metadata.task_id"));
    }

    #[test]
    fn empty_in_list_is_unsatisfiable() {
        let node = FilterNode::Field { path: "tag".into(), op: FieldOp::In(vec![]) };
        let sql = compile_sql(&node).unwrap();
        assert_eq!(sql.where_clause, "0");
    }
}
