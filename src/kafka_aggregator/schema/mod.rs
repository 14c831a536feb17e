//! Schema handling: ordered field lists, aggregated-schema derivation and
//! the Avro rendering exchanged with the Schema Registry.
//!
//! The aggregated schema is derived once from the source topic schema and a
//! set of configured operations, then registered idempotently. It is never
//! mutated afterwards.

pub mod registry;

use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::fields::{Field, FieldType};
use crate::kafka_aggregator::operations::Operation;
use log::{debug, info};
use serde_json::{json, Value};
use std::collections::HashSet;

/// An ordered sequence of unique-by-name fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema from an ordered field list.
    ///
    /// Field names must be unique; duplicates are a configuration error
    /// because they would collide in the output record.
    pub fn new(fields: Vec<Field>) -> Result<Schema, AggregatorError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name().to_string()) {
                return Err(AggregatorError::configuration(format!(
                    "Duplicate field name '{}' in schema",
                    field.name()
                )));
            }
        }
        Ok(Schema { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// The derived fields of an aggregated schema, in order. Empty for a
    /// source schema.
    pub fn derived_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_derived())
    }

    /// Render the schema as an Avro record schema.
    pub fn to_avro(&self, record_name: &str) -> Value {
        let fields: Vec<Value> = self
            .fields
            .iter()
            .map(|f| json!({ "name": f.name(), "type": f.field_type().as_avro() }))
            .collect();
        json!({
            "type": "record",
            "name": record_name,
            "namespace": "kafkaaggregator",
            "fields": fields,
        })
    }

    /// Parse an Avro record schema into an ordered field list.
    ///
    /// Nullable unions take the first non-null branch. Complex types
    /// (records, arrays, maps) are kept as opaque `bytes` fields so they are
    /// carried through as non-numeric and never aggregated.
    pub fn from_avro(schema: &Value) -> Result<Schema, AggregatorError> {
        let fields = schema
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AggregatorError::configuration("Avro schema has no 'fields' array")
            })?;

        let mut parsed = Vec::with_capacity(fields.len());
        for field in fields {
            let name = field
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| AggregatorError::configuration("Avro field has no name"))?;
            let field_type = avro_field_type(field.get("type"));
            parsed.push(Field::new(name, field_type));
        }
        Schema::new(parsed)
    }
}

fn avro_field_type(avro_type: Option<&Value>) -> FieldType {
    match avro_type {
        Some(Value::String(name)) => FieldType::from_avro(name).unwrap_or(FieldType::Bytes),
        // Union: first non-null branch decides the type.
        Some(Value::Array(branches)) => branches
            .iter()
            .filter_map(Value::as_str)
            .find(|name| *name != "null")
            .and_then(FieldType::from_avro)
            .unwrap_or(FieldType::Bytes),
        other => {
            debug!("Opaque Avro field type {:?}, treating as bytes", other);
            FieldType::Bytes
        }
    }
}

/// Derive the aggregated field list from the source topic fields.
///
/// Prepends the bookkeeping fields `time`, `window_size` and `count`, then
/// expands every numeric, non-excluded source field into one derived field
/// per configured operation, in field-then-operation order. Non-numeric and
/// excluded fields are skipped silently.
pub fn aggregated_fields(
    source_fields: &[Field],
    operations: &[Operation],
    excluded_field_names: &[String],
) -> Vec<Field> {
    let mut fields = vec![
        Field::new("time", FieldType::Float),
        Field::new("window_size", FieldType::Float),
        Field::new("count", FieldType::Integer),
    ];

    for field in source_fields {
        if excluded_field_names.iter().any(|name| name == field.name()) {
            info!("Excluding field {}.", field.name());
            continue;
        }
        // Only numeric fields are aggregated
        if !field.is_numeric() {
            continue;
        }
        for operation in operations {
            fields.push(Field::derived(*operation, field.name()));
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_fields() -> Vec<Field> {
        vec![
            Field::new("time", FieldType::Float),
            Field::new("value0", FieldType::Float),
            Field::new("value1", FieldType::Integer),
            Field::new("label", FieldType::String),
        ]
    }

    #[test]
    fn test_aggregated_fields_shape() {
        let operations = [Operation::Min, Operation::Mean, Operation::Max];
        let fields = aggregated_fields(&source_fields(), &operations, &[]);

        // 3 bookkeeping fields + 3 numeric source fields x 3 operations
        assert_eq!(fields.len(), 3 + 3 * 3);
        assert_eq!(fields[0], Field::new("time", FieldType::Float));
        assert_eq!(fields[1], Field::new("window_size", FieldType::Float));
        assert_eq!(fields[2], Field::new("count", FieldType::Integer));

        // Field-then-operation nested order.
        let names: Vec<&str> = fields[3..].iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "min_time", "mean_time", "max_time",
                "min_value0", "mean_value0", "max_value0",
                "min_value1", "mean_value1", "max_value1",
            ]
        );
    }

    #[test]
    fn test_non_numeric_fields_never_expanded() {
        let fields = aggregated_fields(&source_fields(), &Operation::ALL, &[]);
        assert!(fields
            .iter()
            .all(|f| f.source_field_name() != Some("label")));
    }

    #[test]
    fn test_excluded_fields_never_expanded() {
        let excluded = vec!["time".to_string(), "value0".to_string()];
        let fields = aggregated_fields(&source_fields(), &[Operation::Mean], &excluded);
        assert!(fields.iter().all(|f| f.source_field_name() != Some("time")));
        assert!(fields
            .iter()
            .all(|f| f.source_field_name() != Some("value0")));
        assert!(fields
            .iter()
            .any(|f| f.source_field_name() == Some("value1")));
    }

    #[test]
    fn test_bookkeeping_fields_always_present() {
        let fields = aggregated_fields(&[], &[], &[]);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_schema_rejects_duplicate_names() {
        let fields = vec![
            Field::new("a", FieldType::Float),
            Field::new("a", FieldType::Integer),
        ];
        assert!(Schema::new(fields).is_err());
    }

    #[test]
    fn test_avro_round_trip() {
        let schema = Schema::new(source_fields()).unwrap();
        let avro = schema.to_avro("example0");
        assert_eq!(avro["name"], "example0");
        assert_eq!(avro["fields"][0]["name"], "time");
        assert_eq!(avro["fields"][0]["type"], "double");

        let parsed = Schema::from_avro(&avro).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_avro_nullable_union() {
        let avro = json!({
            "type": "record",
            "name": "t",
            "fields": [
                { "name": "value", "type": ["null", "double"] },
                { "name": "nested", "type": { "type": "record", "name": "n", "fields": [] } },
            ],
        });
        let schema = Schema::from_avro(&avro).unwrap();
        assert_eq!(schema.get("value").unwrap().field_type(), FieldType::Float);
        // Complex types stay opaque and non-numeric.
        assert!(!schema.get("nested").unwrap().is_numeric());
    }
}
