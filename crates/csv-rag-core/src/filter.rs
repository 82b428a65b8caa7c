//! Metadata filters for queries.
//!
//! Filters use the familiar vector-store "where" dialect:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `{"col": v}` | `col == v` |
//! | `{"col": {"$ne": v}}` | also `$eq`, `$gt`, `$gte`, `$lt`, `$lte` |
//! | `{"col": {"$in": [..]}}` | also `$nin` |
//! | `{"$and": [..]}` / `{"$or": [..]}` | logical combination |
//!
//! Several top-level keys are AND-ed together. Numbers compare as `f64`,
//! strings lexicographically. An absent key matches only `$ne` and `$nin`.
//!
//! ```rust
//! use csv_rag_core::filter::Filter;
//! use serde_json::json;
//!
//! let f = Filter::parse(&json!({"score": {"$gte": 4}})).unwrap();
//! let meta = json!({"score": 5}).as_object().unwrap().clone();
//! assert!(f.matches(&meta));
//! ```

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use crate::models::Metadata;

/// Comparison applied to one metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl Op {
    fn from_key(key: &str) -> Option<Op> {
        Some(match key {
            "$eq" => Op::Eq,
            "$ne" => Op::Ne,
            "$gt" => Op::Gt,
            "$gte" => Op::Gte,
            "$lt" => Op::Lt,
            "$lte" => Op::Lte,
            "$in" => Op::In,
            "$nin" => Op::Nin,
            _ => return None,
        })
    }
}

/// A parsed metadata filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Field { key: String, op: Op, value: Value },
}

impl Filter {
    /// Parse a filter from its JSON form.
    pub fn parse(value: &Value) -> Result<Filter> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("filter must be a JSON object, got {}", value))?;
        if obj.is_empty() {
            bail!("filter must not be empty");
        }

        let mut clauses = Vec::with_capacity(obj.len());
        for (key, v) in obj {
            clauses.push(match key.as_str() {
                "$and" => Filter::And(parse_list(key, v)?),
                "$or" => Filter::Or(parse_list(key, v)?),
                k if k.starts_with('$') => bail!("unknown logical operator: {}", k),
                _ => parse_field(key, v)?,
            });
        }

        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Filter::And(clauses)
        })
    }

    /// Parse a filter from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Filter> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| anyhow!("invalid filter JSON: {}", e))?;
        Filter::parse(&value)
    }

    /// Evaluate the filter against a document's metadata.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Filter::And(fs) => fs.iter().all(|f| f.matches(metadata)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(metadata)),
            Filter::Field { key, op, value } => match metadata.get(key) {
                None => matches!(op, Op::Ne | Op::Nin),
                Some(actual) => eval(*op, actual, value),
            },
        }
    }
}

fn parse_list(key: &str, v: &Value) -> Result<Vec<Filter>> {
    let items = v
        .as_array()
        .ok_or_else(|| anyhow!("{} expects an array of filters", key))?;
    if items.is_empty() {
        bail!("{} expects at least one filter", key);
    }
    items.iter().map(Filter::parse).collect()
}

fn parse_field(key: &str, v: &Value) -> Result<Filter> {
    let (op, value) = match v.as_object() {
        Some(ops) if ops.len() == 1 && ops.keys().all(|k| k.starts_with('$')) => {
            let (op_key, operand) = ops
                .iter()
                .next()
                .ok_or_else(|| anyhow!("field {} has no operator", key))?;
            let op = Op::from_key(op_key)
                .ok_or_else(|| anyhow!("unknown operator {} on field {}", op_key, key))?;
            (op, operand.clone())
        }
        Some(_) => bail!("field {} must use exactly one $operator", key),
        None => (Op::Eq, v.clone()),
    };
    if matches!(op, Op::In | Op::Nin) && !value.is_array() {
        bail!("operator on field {} expects an array", key);
    }
    Ok(Filter::Field {
        key: key.to_string(),
        op,
        value,
    })
}

fn eval(op: Op, actual: &Value, expected: &Value) -> bool {
    match op {
        Op::Eq => values_equal(actual, expected),
        Op::Ne => !values_equal(actual, expected),
        Op::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Op::Gte => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Op::Lt => compare(actual, expected) == Some(Ordering::Less),
        Op::Lte => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Op::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|e| values_equal(actual, e))),
        Op::Nin => expected
            .as_array()
            .is_some_and(|items| !items.iter().any(|e| values_equal(actual, e))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: Value) -> Metadata {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_equality_shorthand() {
        let f = Filter::parse(&json!({"category": "books"})).unwrap();
        assert!(f.matches(&meta(json!({"category": "books"}))));
        assert!(!f.matches(&meta(json!({"category": "music"}))));
        assert!(!f.matches(&meta(json!({}))));
    }

    #[test]
    fn test_numeric_ops_mix_int_and_float() {
        let f = Filter::parse(&json!({"score": {"$gt": 4}})).unwrap();
        assert!(f.matches(&meta(json!({"score": 4.5}))));
        assert!(!f.matches(&meta(json!({"score": 4}))));

        let eq = Filter::parse(&json!({"score": 5})).unwrap();
        assert!(eq.matches(&meta(json!({"score": 5.0}))));
    }

    #[test]
    fn test_in_and_nin() {
        let f = Filter::parse(&json!({"id": {"$in": ["1", "2"]}})).unwrap();
        assert!(f.matches(&meta(json!({"id": "2"}))));
        assert!(!f.matches(&meta(json!({"id": "3"}))));

        let nin = Filter::parse(&json!({"id": {"$nin": ["1"]}})).unwrap();
        assert!(nin.matches(&meta(json!({"id": "3"}))));
        assert!(nin.matches(&meta(json!({}))));
    }

    #[test]
    fn test_logical_combinators() {
        let f = Filter::parse(&json!({
            "$or": [{"a": 1}, {"$and": [{"b": "x"}, {"c": {"$ne": null}}]}]
        }))
        .unwrap();
        assert!(f.matches(&meta(json!({"a": 1}))));
        assert!(f.matches(&meta(json!({"b": "x", "c": 2}))));
        assert!(!f.matches(&meta(json!({"b": "x", "c": null}))));
    }

    #[test]
    fn test_multiple_keys_are_anded() {
        let f = Filter::parse(&json!({"a": 1, "b": 2})).unwrap();
        assert!(f.matches(&meta(json!({"a": 1, "b": 2}))));
        assert!(!f.matches(&meta(json!({"a": 1, "b": 3}))));
    }

    #[test]
    fn test_null_matches_null() {
        let f = Filter::parse(&json!({"a": null})).unwrap();
        assert!(f.matches(&meta(json!({"a": null}))));
    }

    #[test]
    fn test_invalid_filters() {
        assert!(Filter::parse(&json!([1, 2])).is_err());
        assert!(Filter::parse(&json!({})).is_err());
        assert!(Filter::parse(&json!({"a": {"$like": "x"}})).is_err());
        assert!(Filter::parse(&json!({"a": {"$in": 3}})).is_err());
        assert!(Filter::parse(&json!({"$not": [{"a": 1}]})).is_err());
        assert!(Filter::from_json_str("{not json").is_err());
    }
}
