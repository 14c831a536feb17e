//! Record representation for incoming and aggregated messages.
//!
//! Incoming messages are plain `name -> FieldValue` maps; the aggregated
//! output is a `(schema, values)` pair with schema-checked construction,
//! so a record can never be built with missing or mistyped fields. The
//! aggregated record serializes its fields in schema order.

use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::schema::Schema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// A single field value.
///
/// The untagged serde representation maps directly onto JSON scalars, so an
/// incoming `{"time": 1.0, "value": 2}` decodes without any envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl FieldValue {
    /// Numeric view of the value. Integers widen to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// An incoming source-topic message, keyed by field name.
pub type InputRecord = HashMap<String, FieldValue>;

/// One aggregated output message, bound to its schema.
///
/// Immutable after construction; `new` validates that every schema field is
/// present and that numeric fields hold numeric values.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    schema: Arc<Schema>,
    values: HashMap<String, FieldValue>,
}

impl AggregatedRecord {
    pub fn new(
        schema: Arc<Schema>,
        values: HashMap<String, FieldValue>,
    ) -> Result<AggregatedRecord, AggregatorError> {
        for field in schema.fields() {
            match values.get(field.name()) {
                None => {
                    return Err(AggregatorError::configuration(format!(
                        "Aggregated record is missing field '{}'",
                        field.name()
                    )));
                }
                Some(value) if field.is_numeric() && !value.is_numeric() => {
                    return Err(AggregatorError::configuration(format!(
                        "Aggregated record field '{}' must be numeric, got {:?}",
                        field.name(),
                        value
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(AggregatedRecord { schema, values })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Numeric view of a field, for assertions and logging.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(FieldValue::as_f64)
    }

    /// Number of source records aggregated into this record.
    pub fn count(&self) -> i64 {
        match self.values.get("count") {
            Some(FieldValue::Integer(count)) => *count,
            _ => 0,
        }
    }
}

impl Serialize for AggregatedRecord {
    /// Serialize fields in schema order, not map order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.schema.len()))?;
        for field in self.schema.fields() {
            map.serialize_entry(field.name(), &self.values[field.name()])?;
        }
        map.end()
    }
}
