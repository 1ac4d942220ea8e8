//! Encoding of [`Query`] as a Firestore `StructuredQuery`.

use serde_json::{Value, json};

use carbonbytes_core::types::{Direction, FilterOp, Query};

use super::value::encode;

/// Build the `runQuery` request body for a collection query.
pub fn structured_query(collection: &str, query: &Query) -> Value {
    let mut structured = json!({
        "from": [{ "collectionId": collection }],
    });

    let filters: Vec<Value> = query
        .filters
        .iter()
        .map(|f| {
            json!({
                "fieldFilter": {
                    "field": { "fieldPath": f.field },
                    "op": match f.op {
                        FilterOp::Equal => "EQUAL",
                        FilterOp::GreaterThan => "GREATER_THAN",
                        FilterOp::LessThan => "LESS_THAN",
                    },
                    "value": encode(&f.value),
                }
            })
        })
        .collect();

    match filters.len() {
        0 => {}
        1 => structured["where"] = filters.into_iter().next().unwrap_or(Value::Null),
        _ => {
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            })
        }
    }

    if !query.order_by.is_empty() {
        structured["orderBy"] = query
            .order_by
            .iter()
            .map(|o| {
                json!({
                    "field": { "fieldPath": o.field },
                    "direction": match o.direction {
                        Direction::Ascending => "ASCENDING",
                        Direction::Descending => "DESCENDING",
                    },
                })
            })
            .collect();
    }

    if let Some(limit) = query.limit {
        structured["limit"] = json!(limit);
    }

    json!({ "structuredQuery": structured })
}
