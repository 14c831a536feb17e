//! Error types for the aggregation engine.
//!
//! Statistics functions report `StatisticsError`; the aggregator converts
//! those into `AggregatorError::Compute` so the caller can decide whether to
//! skip the window or stop the worker. Configuration and schema-lifecycle
//! errors are fatal at startup.

use crate::kafka_aggregator::serialization::SerializationError;
use rdkafka::error::KafkaError;

/// Errors raised by the statistical operations.
///
/// These are pure-computation errors: they carry the operation name and the
/// sample-size context needed to report a failed window.
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsError {
    /// The operation was applied to an empty sample.
    EmptySample { operation: &'static str },
    /// The sample was too small for the operation (e.g. stdev needs n >= 2).
    InsufficientSample {
        operation: &'static str,
        required: usize,
        actual: usize,
    },
    /// The sample contained a NaN value.
    NonFiniteSample { operation: &'static str },
}

impl std::fmt::Display for StatisticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatisticsError::EmptySample { operation } => {
                write!(f, "Operation '{}' applied to an empty sample", operation)
            }
            StatisticsError::InsufficientSample {
                operation,
                required,
                actual,
            } => write!(
                f,
                "Operation '{}' requires at least {} values, got {}",
                operation, required, actual
            ),
            StatisticsError::NonFiniteSample { operation } => {
                write!(f, "Operation '{}' rejected a NaN sample value", operation)
            }
        }
    }
}

impl std::error::Error for StatisticsError {}

/// Unified error type for the aggregator.
#[derive(Debug)]
pub enum AggregatorError {
    /// Invalid configuration (bad operation name, window size, sample size).
    /// Fatal at startup.
    Configuration { message: String },
    /// The schema registry could not resolve or register a subject.
    SchemaResolution { subject: String, message: String },
    /// `compute` was called before the aggregated schema was derived.
    /// Programming error, always fatal.
    SchemaNotInitialized,
    /// A statistics function failed while computing a window. Aborts the
    /// emission of that single window; the worker keeps running.
    Compute {
        operation: String,
        message: String,
    },
    /// Underlying Kafka client error.
    Kafka(KafkaError),
    /// Record encode/decode error.
    Serialization(SerializationError),
}

impl AggregatorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AggregatorError::Configuration {
            message: message.into(),
        }
    }

    pub fn schema_resolution(subject: impl Into<String>, message: impl Into<String>) -> Self {
        AggregatorError::SchemaResolution {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Wrap a statistics failure with the offending values for the log line.
    pub fn compute(operation: &str, values: &[f64], source: StatisticsError) -> Self {
        AggregatorError::Compute {
            operation: operation.to_string(),
            message: format!("{} (values: {:?})", source, values),
        }
    }
}

impl std::fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatorError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
            AggregatorError::SchemaResolution { subject, message } => {
                write!(f, "Schema resolution error for subject '{}': {}", subject, message)
            }
            AggregatorError::SchemaNotInitialized => {
                write!(f, "Aggregated schema not initialized: compute() called before create_schema()")
            }
            AggregatorError::Compute { operation, message } => {
                write!(f, "Aggregation compute error in operation '{}': {}", operation, message)
            }
            AggregatorError::Kafka(e) => write!(f, "Kafka error: {}", e),
            AggregatorError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for AggregatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregatorError::Kafka(e) => Some(e),
            AggregatorError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KafkaError> for AggregatorError {
    fn from(err: KafkaError) -> Self {
        AggregatorError::Kafka(err)
    }
}

impl From<SerializationError> for AggregatorError {
    fn from(err: SerializationError) -> Self {
        AggregatorError::Serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_statistics_error_display() {
        let err = StatisticsError::InsufficientSample {
            operation: "stdev",
            required: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'stdev' requires at least 2 values, got 1"
        );
    }

    #[test]
    fn test_compute_error_carries_operation_and_values() {
        let err = AggregatorError::compute(
            "stdev",
            &[1.0],
            StatisticsError::InsufficientSample {
                operation: "stdev",
                required: 2,
                actual: 1,
            },
        );
        let text = err.to_string();
        assert!(text.contains("stdev"));
        assert!(text.contains("[1.0]"));
    }

    #[test]
    fn test_error_source() {
        let err = AggregatorError::SchemaNotInitialized;
        assert!(err.source().is_none());
    }
}
