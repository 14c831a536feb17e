//! Field definitions for source and aggregated schemas.
//!
//! A `Field` pairs a name with a closed `FieldType`. Derived fields (the
//! `<operation>_<source>` outputs) additionally carry the source field name
//! and the operation that produces them, which distinguishes them from the
//! raw bookkeeping fields (`time`, `window_size`, `count`).
//!
//! Equality is full structural equality over all four components. Two fields
//! derived differently but sharing a name never compare equal.

use crate::kafka_aggregator::operations::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data types a schema field can take.
///
/// `Float` and `Integer` are the numeric types; only numeric source fields
/// are expanded into derived statistics fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Float,
    Integer,
    String,
    Bytes,
    Boolean,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Float | FieldType::Integer)
    }

    /// The Avro primitive type name for this field type.
    pub fn as_avro(&self) -> &'static str {
        match self {
            FieldType::Float => "double",
            FieldType::Integer => "long",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Boolean => "boolean",
        }
    }

    /// Map an Avro primitive type name to a field type.
    pub fn from_avro(name: &str) -> Option<FieldType> {
        match name {
            "double" | "float" => Some(FieldType::Float),
            "int" | "long" => Some(FieldType::Integer),
            "string" => Some(FieldType::String),
            "bytes" => Some(FieldType::Bytes),
            "boolean" => Some(FieldType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_avro())
    }
}

/// A named, typed schema field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    field_type: FieldType,
    source_field_name: Option<String>,
    operation: Option<Operation>,
}

impl Field {
    /// A raw (non-derived) field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Field {
        Field {
            name: name.into(),
            field_type,
            source_field_name: None,
            operation: None,
        }
    }

    /// A derived field: one operation applied to one numeric source field.
    ///
    /// Derived fields are always `Float` and named `<operation>_<source>`.
    pub fn derived(operation: Operation, source_field_name: impl Into<String>) -> Field {
        let source = source_field_name.into();
        Field {
            name: format!("{}_{}", operation.as_str(), source),
            field_type: FieldType::Float,
            source_field_name: Some(source),
            operation: Some(operation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn source_field_name(&self) -> Option<&str> {
        self.source_field_name.as_deref()
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn is_derived(&self) -> bool {
        self.operation.is_some()
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type.is_numeric()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_derived_field_shape() {
        let field = Field::derived(Operation::Mean, "value");
        assert_eq!(field.name(), "mean_value");
        assert_eq!(field.field_type(), FieldType::Float);
        assert_eq!(field.source_field_name(), Some("value"));
        assert_eq!(field.operation(), Some(Operation::Mean));
        assert!(field.is_derived());
    }

    #[test]
    fn test_raw_field_has_no_metadata() {
        let field = Field::new("count", FieldType::Integer);
        assert!(!field.is_derived());
        assert!(field.source_field_name().is_none());
    }

    #[test]
    fn test_structural_equality_includes_metadata() {
        // Same name and type, different derivation: not equal. The partial
        // (name, type) equality of earlier implementations is deliberately
        // not reproduced.
        let raw = Field::new("mean_value", FieldType::Float);
        let derived = Field::derived(Operation::Mean, "value");
        assert_eq!(raw.name(), derived.name());
        assert_eq!(raw.field_type(), derived.field_type());
        assert_ne!(raw, derived);
    }

    #[test]
    fn test_field_is_hashable() {
        let mut set = HashSet::new();
        set.insert(Field::derived(Operation::Min, "value"));
        set.insert(Field::derived(Operation::Min, "value"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_numeric_types() {
        assert!(FieldType::Float.is_numeric());
        assert!(FieldType::Integer.is_numeric());
        assert!(!FieldType::String.is_numeric());
        assert!(!FieldType::Bytes.is_numeric());
        assert!(!FieldType::Boolean.is_numeric());
    }

    #[test]
    fn test_avro_type_round_trip() {
        for ty in [
            FieldType::Float,
            FieldType::Integer,
            FieldType::String,
            FieldType::Bytes,
            FieldType::Boolean,
        ] {
            assert_eq!(FieldType::from_avro(ty.as_avro()), Some(ty));
        }
        assert_eq!(FieldType::from_avro("record"), None);
    }
}
