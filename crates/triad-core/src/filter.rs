//! Best-effort evaluation of backend-agnostic metadata filters.
//!
//! Supported shapes per key:
//! - scalar: equality (numbers compare numerically, everything else as text);
//!   `category` additionally matches as a facet prefix (`/tools` matches `/tools/fire`)
//! - array: any element equal
//! - object with `from`/`to`/`gte`/`lte`/`gt`/`lt`: inclusive or exclusive range,
//!   numeric when both sides are numbers, lexicographic otherwise (ISO dates)
//!
//! Filters of any other shape are ignored rather than rejected.

use serde_json::Value;
use std::cmp::Ordering;

use crate::types::{Filters, Metadata};

pub fn matches(filters: &Filters, metadata: &Metadata) -> bool {
    filters.iter().all(|(key, expected)| match expected {
        Value::Null => true,
        Value::Object(range) => match_range(range, metadata.get(key)),
        Value::Array(options) => metadata.get(key).is_some_and(|actual| options.iter().any(|o| value_matches(key, o, actual))),
        scalar => metadata.get(key).is_some_and(|actual| value_matches(key, scalar, actual)),
    })
}

/// Convenience for optional filters.
pub fn matches_opt(filters: Option<&Filters>, metadata: &Metadata) -> bool {
    filters.map_or(true, |f| matches(f, metadata))
}

/// Collection hint check for backends without native partitions: records
/// tagged with a different `collection` are skipped, untagged records pass.
pub fn in_collection(collection: Option<&str>, metadata: &Metadata) -> bool {
    match (collection, metadata.get("collection").and_then(Value::as_str)) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

fn value_matches(key: &str, expected: &Value, actual: &Value) -> bool {
    if let Value::Array(items) = actual {
        return items.iter().any(|item| value_matches(key, expected, item));
    }
    if key == "category" {
        if let (Some(prefix), Some(cat)) = (expected.as_str(), actual.as_str()) {
            let prefix = prefix.trim_end_matches('/');
            return cat == prefix || cat.starts_with(&format!("{prefix}/"));
        }
    }
    compare(expected, actual) == Some(Ordering::Equal)
}

fn match_range(range: &serde_json::Map<String, Value>, actual: Option<&Value>) -> bool {
    const BOUNDS: [&str; 6] = ["from", "to", "gte", "lte", "gt", "lt"];
    if !range.keys().any(|k| BOUNDS.contains(&k.as_str())) {
        return true;
    }
    let Some(actual) = actual else { return false };
    range.iter().all(|(op, bound)| {
        let ord = compare(actual, bound);
        match op.as_str() {
            "from" | "gte" => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            "to" | "lte" => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            "gt" => ord == Some(Ordering::Greater),
            "lt" => ord == Some(Ordering::Less),
            _ => true,
        }
    })
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(as_text(a)?.cmp(&as_text(b)?)),
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
