//! Record codecs for the Kafka transport.
//!
//! Messages travel as JSON. `JsonCodec` converts between raw bytes and
//! `InputRecord` maps on the consume side, and serializes `AggregatedRecord`
//! values (in schema order) on the produce side.

use crate::kafka_aggregator::records::{AggregatedRecord, InputRecord};

/// Error type for record encode/decode failures.
#[derive(Debug)]
pub struct SerializationError {
    message: String,
    source: Option<serde_json::Error>,
}

impl SerializationError {
    pub fn json_error(message: &str, source: serde_json::Error) -> SerializationError {
        SerializationError {
            message: message.to_string(),
            source: Some(source),
        }
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// JSON codec for source and aggregated records.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> JsonCodec {
        JsonCodec
    }

    /// Decode an incoming message payload into a field map.
    pub fn decode(&self, bytes: &[u8]) -> Result<InputRecord, SerializationError> {
        serde_json::from_slice(bytes)
            .map_err(|e| SerializationError::json_error("Failed to parse JSON record", e))
    }

    /// Encode an aggregated record, preserving schema field order.
    pub fn encode(&self, record: &AggregatedRecord) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(record)
            .map_err(|e| SerializationError::json_error("Failed to serialize JSON record", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka_aggregator::records::FieldValue;

    #[test]
    fn test_decode_record() {
        let codec = JsonCodec::new();
        let record = codec.decode(br#"{"time": 0.5, "value": 1.0}"#).unwrap();
        assert_eq!(record["time"], FieldValue::Float(0.5));
    }

    #[test]
    fn test_decode_error_is_reported() {
        let codec = JsonCodec::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse JSON record"));
    }
}
