//! MongoDB-style metadata filter language (§4.3).
//!
//! Parses a JSON filter tree into a backend-agnostic [`FilterNode`]. Two
//! backend emitters (SQL-with-JSON-extract, and a vector index's native
//! predicate object) live in `claude-slack-search::compiler` and walk this
//! tree; this module only owns parsing and the tree shape itself, so both
//! emitters agree on what a given filter *means*.

use serde_json::Value as Json;
use std::fmt;

/// Fields that bind to first-class columns instead of the JSON `metadata`
/// blob (§4.3: "system fields ... bypass JSON extraction").
pub const SYSTEM_FIELDS: &[&str] =
    &["channel_id", "sender_id", "timestamp", "confidence", "content"];

#[must_use]
pub fn is_system_field(field: &str) -> bool {
    SYSTEM_FIELDS.contains(&field)
}

/// Default maximum nesting depth for a filter tree (§4.3, §8).
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// A parsed filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
    /// `{field: condition}` where `condition` has already been reduced to a
    /// single operator.
    Field { path: String, op: FieldOp },
}

/// A single comparison/set/existence/text operator applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq(Json),
    Ne(Json),
    Gt(Json),
    Gte(Json),
    Lt(Json),
    Lte(Json),
    Between(Json, Json),
    In(Vec<Json>),
    Nin(Vec<Json>),
    Contains(Json),
    NotContains(Json),
    All(Vec<Json>),
    Size(i64),
    Exists(bool),
    Null(bool),
    Empty(bool),
    Regex(String),
    Text(String),
}

/// Error raised while parsing a filter tree (surfaces to the caller as
/// `claude_slack_core::Error::FilterError`).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("filter tree exceeds max depth {0}")]
    DepthExceeded(usize),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("operator {op} expects {expected}, got {got}")]
    ShapeMismatch { op: String, expected: &'static str, got: String },
    #[error("empty logical node: {0}")]
    EmptyLogical(&'static str),
    #[error("filter must be a JSON object")]
    NotAnObject,
}

/// Parse a JSON filter tree with the default depth guard.
pub fn parse(value: &Json) -> Result<FilterNode, FilterParseError> {
    parse_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// Parse a JSON filter tree, rejecting trees deeper than `max_depth` (§8:
/// "Filter depth limit (default 10) rejects the 11th level").
pub fn parse_with_depth(value: &Json, max_depth: usize) -> Result<FilterNode, FilterParseError> {
    parse_node(value, 0, max_depth)
}

fn parse_node(value: &Json, depth: usize, max_depth: usize) -> Result<FilterNode, FilterParseError> {
    if depth > max_depth {
        return Err(FilterParseError::DepthExceeded(max_depth));
    }
    let obj = value.as_object().ok_or(FilterParseError::NotAnObject)?;
    if obj.is_empty() {
        return Ok(FilterNode::And(Vec::new()));
    }

    // A mapping whose first key starts with `$` is a logical/operator node;
    // otherwise it's an implicit AND of `{field: condition}` pairs (§4.3).
    let first_key_is_logical = obj.keys().next().is_some_and(|k| k.starts_with('$'));

    if first_key_is_logical {
        if obj.len() != 1 {
            return Err(FilterParseError::ShapeMismatch {
                op: "logical".into(),
                expected: "exactly one $and/$or/$not key",
                got: format!("{} keys", obj.len()),
            });
        }
        let (key, val) = obj.iter().next().expect("checked non-empty above");
        return parse_logical(key, val, depth, max_depth);
    }

    let mut clauses = Vec::with_capacity(obj.len());
    for (field, condition) in obj {
        clauses.push(parse_field(field, condition, depth, max_depth)?);
    }
    if clauses.len() == 1 {
        Ok(clauses.into_iter().next().expect("len checked"))
    } else {
        Ok(FilterNode::And(clauses))
    }
}

fn parse_logical(
    key: &str,
    val: &Json,
    depth: usize,
    max_depth: usize,
) -> Result<FilterNode, FilterParseError> {
    match key {
        "$and" | "$or" => {
            let arr = val.as_array().ok_or_else(|| FilterParseError::ShapeMismatch {
                op: key.into(),
                expected: "an array of filter trees",
                got: describe(val),
            })?;
            if arr.is_empty() {
                return Err(FilterParseError::EmptyLogical(if key == "$and" { "$and" } else { "$or" }));
            }
            let children = arr
                .iter()
                .map(|v| parse_node(v, depth + 1, max_depth))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if key == "$and" { FilterNode::And(children) } else { FilterNode::Or(children) })
        }
        "$not" => Ok(FilterNode::Not(Box::new(parse_node(val, depth + 1, max_depth)?))),
        other => Err(FilterParseError::UnknownOperator(other.to_string())),
    }
}

fn parse_field(
    field: &str,
    condition: &Json,
    depth: usize,
    max_depth: usize,
) -> Result<FilterNode, FilterParseError> {
    if depth + 1 > max_depth {
        return Err(FilterParseError::DepthExceeded(max_depth));
    }
    let op = match condition {
        // Scalar sugar: `{field: value}` means `$eq`.
        Json::Null | Json::Bool(_) | Json::Number(_) | Json::String(_) => {
            FieldOp::Eq(condition.clone())
        }
        // List sugar: `{field: [..]}` means `$in`.
        Json::Array(items) => FieldOp::In(items.clone()),
        Json::Object(map) => {
            if map.len() != 1 {
                return Err(FilterParseError::ShapeMismatch {
                    op: field.into(),
                    expected: "a single operator key",
                    got: format!("{} keys", map.len()),
                });
            }
            let (opname, opval) = map.iter().next().expect("len==1");
            parse_operator(opname, opval)?
        }
    };
    Ok(FilterNode::Field { path: field.to_string(), op })
}

fn parse_operator(name: &str, val: &Json) -> Result<FieldOp, FilterParseError> {
    let shape_err = |expected: &'static str| FilterParseError::ShapeMismatch {
        op: name.to_string(),
        expected,
        got: describe(val),
    };
    match name {
        "$eq" => Ok(FieldOp::Eq(val.clone())),
        "$ne" => Ok(FieldOp::Ne(val.clone())),
        "$gt" => Ok(FieldOp::Gt(val.clone())),
        "$gte" => Ok(FieldOp::Gte(val.clone())),
        "$lt" => Ok(FieldOp::Lt(val.clone())),
        "$lte" => Ok(FieldOp::Lte(val.clone())),
        "$between" => {
            let arr = val.as_array().ok_or_else(|| shape_err("a two-element array [low, high]"))?;
            if arr.len() != 2 {
                return Err(shape_err("a two-element array [low, high]"));
            }
            Ok(FieldOp::Between(arr[0].clone(), arr[1].clone()))
        }
        "$in" => {
            let arr = val.as_array().ok_or_else(|| shape_err("an array"))?;
            Ok(FieldOp::In(arr.clone()))
        }
        "$nin" => {
            let arr = val.as_array().ok_or_else(|| shape_err("an array"))?;
            Ok(FieldOp::Nin(arr.clone()))
        }
        "$contains" => Ok(FieldOp::Contains(val.clone())),
        "$not_contains" => Ok(FieldOp::NotContains(val.clone())),
        "$all" => {
            let arr = val.as_array().ok_or_else(|| shape_err("an array"))?;
            Ok(FieldOp::All(arr.clone()))
        }
        "$size" => {
            let n = val.as_i64().ok_or_else(|| shape_err("an integer"))?;
            Ok(FieldOp::Size(n))
        }
        "$exists" => Ok(FieldOp::Exists(val.as_bool().ok_or_else(|| shape_err("a boolean"))?)),
        "$null" => Ok(FieldOp::Null(val.as_bool().ok_or_else(|| shape_err("a boolean"))?)),
        "$empty" => Ok(FieldOp::Empty(val.as_bool().ok_or_else(|| shape_err("a boolean"))?)),
        "$regex" => Ok(FieldOp::Regex(val.as_str().ok_or_else(|| shape_err("a string"))?.to_string())),
        "$text" => Ok(FieldOp::Text(val.as_str().ok_or_else(|| shape_err("a string"))?.to_string())),
        other => Err(FilterParseError::UnknownOperator(other.to_string())),
    }
}

fn describe(v: &Json) -> String {
    match v {
        Json::Null => "null".into(),
        Json::Bool(_) => "bool".into(),
        Json::Number(_) => "number".into(),
        Json::String(_) => "string".into(),
        Json::Array(_) => "array".into(),
        Json::Object(_) => "object".into(),
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(children) => write!(f, "and({})", children.len()),
            Self::Or(children) => write!(f, "or({})", children.len()),
            Self::Not(child) => write!(f, "not({child})"),
            Self::Field { path, .. } => write!(f, "field({path})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_and_of_field_conditions() {
        let tree = parse(&json!({"confidence": {"$gte": 0.8}, "metadata.tags": {"$contains": "security"}}))
            .unwrap();
        match tree {
            FilterNode::And(clauses) => assert_eq!(clauses.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn scalar_sugar_is_eq() {
        let tree = parse(&json!({"sender_id": "alice"})).unwrap();
        assert_eq!(tree, FilterNode::Field { path: "sender_id".into(), op: FieldOp::Eq(json!("alice")) });
    }

    #[test]
    fn list_sugar_is_in() {
        let tree = parse(&json!({"tag": ["a", "b"]})).unwrap();
        assert_eq!(
            tree,
            FilterNode::Field { path: "tag".into(), op: FieldOp::In(vec![json!("a"), json!("b")]) }
        );
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = parse(&json!({"field": {"$bogus": 1}})).unwrap_err();
        assert!(matches!(err, FilterParseError::UnknownOperator(ref s) if s == "$bogus"));
    }

    #[test]
    fn depth_guard_rejects_eleventh_level() {
        // Build $and nesting 11 levels deep.
        let mut node = json!({"leaf": 1});
        for _ in 0..11 {
            node = json!({"$and": [node]});
        }
        let err = parse(&node).unwrap_err();
        assert!(matches!(err, FilterParseError::DepthExceeded(10)));
    }

    #[test]
    fn ten_levels_is_allowed() {
        let mut node = json!({"leaf": 1});
        for _ in 0..9 {
            node = json!({"$and": [node]});
        }
        assert!(parse(&node).is_ok());
    }

    #[test]
    fn logical_with_multiple_keys_is_rejected() {
        let err = parse(&json!({"$and": [{"a": 1}], "$or": [{"b": 2}]})).unwrap_err();
        assert!(matches!(err, FilterParseError::ShapeMismatch { .. }));
    }

    #[test]
    fn between_requires_two_elements() {
        let err = parse(&json!({"x": {"$between": [1]}})).unwrap_err();
        assert!(matches!(err, FilterParseError::ShapeMismatch { .. }));
    }
}
