//! Query evaluation over in-memory documents.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use carbonbytes_core::types::{Direction, Document, Filter, FilterOp, Query};

/// Apply filters, ordering and limit to a collection's documents.
///
/// Like the hosted store, documents missing an order-by field are excluded.
pub fn evaluate(mut docs: Vec<Document>, query: &Query) -> Vec<Document> {
    docs.retain(|doc| query.filters.iter().all(|f| matches(doc, f)));
    docs.retain(|doc| query.order_by.iter().all(|o| doc.get(&o.field).is_some()));

    docs.sort_by(|a, b| {
        for key in &query.order_by {
            let ord = compare(a.get(&key.field), b.get(&key.field));
            let ord = match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    });

    if let Some(limit) = query.limit {
        docs.truncate(limit);
    }
    docs
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    let Some(value) = doc.get(&filter.field) else {
        return false;
    };
    let ord = compare(Some(value), Some(&filter.value));
    match filter.op {
        FilterOp::Equal => ord == Ordering::Equal,
        FilterOp::GreaterThan => ord == Ordering::Greater,
        FilterOp::LessThan => ord == Ordering::Less,
    }
}

/// Total order over JSON values: null < bool < number < timestamp < string.
pub fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (timestamp(x), timestamp(y)) {
                (Some(tx), Some(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        _ => Ordering::Equal,
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(s)) if timestamp(s).is_some() => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
