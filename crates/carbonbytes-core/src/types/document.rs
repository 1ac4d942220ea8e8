//! Document, write and query value types shared by every store provider.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key within its collection.
    pub id: String,
    /// Stored fields. Timestamps are RFC 3339 strings.
    pub fields: Fields,
}

impl Document {
    /// Create a document from its key and fields.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize the fields into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Serialization,
                format!("Document '{}' has an unexpected shape: {e}", self.id),
                e,
            )
        })
    }
}

/// How a [`Patch`] is applied to the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Overwrite the whole document, creating it if absent.
    Replace,
    /// Merge the patch into the document, creating it if absent.
    Merge,
    /// Merge the patch into an existing document; fails with `NotFound`
    /// if the document does not exist.
    Update,
}

/// A set of field writes plus fields the store fills with its own clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Fields,
    server_timestamps: Vec<String>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.server_timestamps.retain(|f| f != &field);
        self.fields.insert(field, value.into());
        self
    }

    /// Set a field to null.
    pub fn set_null(self, field: impl Into<String>) -> Self {
        self.set(field, Value::Null)
    }

    /// Have the store write its own current time into `field`.
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.fields.remove(&field);
        if !self.server_timestamps.contains(&field) {
            self.server_timestamps.push(field);
        }
        self
    }

    /// Plain field writes.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Fields to be filled with the store's clock.
    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Every field path touched by this patch.
    pub fn field_paths(&self) -> Vec<String> {
        self.fields
            .keys()
            .cloned()
            .chain(self.server_timestamps.iter().cloned())
            .collect()
    }

    /// Whether the patch touches no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.server_timestamps.is_empty()
    }

    /// Resolve server timestamps against `now` and return the concrete fields.
    pub fn resolve(&self, now: DateTime<Utc>) -> Fields {
        let mut fields = self.fields.clone();
        let stamp = Value::String(now.to_rfc3339());
        for field in &self.server_timestamps {
            fields.insert(field.clone(), stamp.clone());
        }
        fields
    }
}

impl From<Fields> for Patch {
    fn from(fields: Fields) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }
}

/// Comparison operator of a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Field equals the value.
    Equal,
    /// Field is greater than the value.
    GreaterThan,
    /// Field is less than the value.
    LessThan,
}

/// A single field filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field path.
    pub field: String,
    /// Operator.
    pub op: FilterOp,
    /// Operand.
    pub value: Value,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field path.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

/// A collection query: conjunctive filters, ordering and a limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// All filters must match.
    pub filters: Vec<Filter>,
    /// Sort keys, applied in order.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl Query {
    /// Create an unfiltered query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Equal,
            value: value.into(),
        });
        self
    }

    /// Add a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Limit the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
