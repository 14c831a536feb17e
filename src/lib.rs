//! # kafka-aggregator
//!
//! A Kafka stream aggregator: consumes timestamped records from source
//! topics, buffers them into fixed-size tumbling windows and emits one
//! summary record per window with configurable statistics (`min`, `q1`,
//! `mean`, `median`, `stdev`, `q3`, `max`) for every numeric field, plus the
//! bookkeeping fields `time`, `window_size` and `count`.
//!
//! ## Quick start
//!
//! ```rust
//! use kafka_aggregator::kafka_aggregator::aggregator::Aggregator;
//! use kafka_aggregator::kafka_aggregator::config::{AggregatedTopicConfig, WindowAggregation};
//! use kafka_aggregator::kafka_aggregator::fields::{Field, FieldType};
//! use kafka_aggregator::kafka_aggregator::operations::Operation;
//! use kafka_aggregator::kafka_aggregator::records::{FieldValue, InputRecord};
//!
//! let config = AggregatedTopicConfig {
//!     name: "aggregated_example0".to_string(),
//!     source_topic: "example0".to_string(),
//!     excluded_field_names: vec!["time".to_string()],
//!     window_aggregation: WindowAggregation {
//!         window_size_seconds: 1.0,
//!         window_expiration_seconds: 0.0,
//!         min_sample_size: 2,
//!         operations: vec![Operation::Mean, Operation::Max],
//!     },
//! };
//!
//! let mut aggregator = Aggregator::new(config).unwrap();
//! aggregator
//!     .derive_from_fields(&[
//!         Field::new("time", FieldType::Float),
//!         Field::new("value", FieldType::Float),
//!     ])
//!     .unwrap();
//!
//! let batch: Vec<InputRecord> = (0..3)
//!     .map(|i| {
//!         InputRecord::from([
//!             ("time".to_string(), FieldValue::Float(i as f64 * 0.1)),
//!             ("value".to_string(), FieldValue::Float(i as f64 + 1.0)),
//!         ])
//!     })
//!     .collect();
//!
//! let record = aggregator.compute(0.5, &batch).unwrap();
//! assert_eq!(record.get_f64("mean_value"), Some(2.0));
//! assert_eq!(record.get_f64("max_value"), Some(3.0));
//! assert_eq!(record.count(), 3);
//! ```

pub mod kafka_aggregator;

// Re-export the main API at the crate root for easy access
pub use kafka_aggregator::aggregator::Aggregator;
pub use kafka_aggregator::config::{
    AggregatedTopicConfig, AggregatorConfig, Configuration, WindowAggregation,
};
pub use kafka_aggregator::error::{AggregatorError, StatisticsError};
pub use kafka_aggregator::fields::{Field, FieldType};
pub use kafka_aggregator::operations::Operation;
pub use kafka_aggregator::records::{AggregatedRecord, FieldValue, InputRecord};
pub use kafka_aggregator::schema::registry::{
    ConfluentSchemaRegistry, InMemorySchemaRegistry, SchemaRegistry,
};
pub use kafka_aggregator::schema::Schema;
pub use kafka_aggregator::windows::{TumblingWindow, WindowKey, WindowedTable};
pub use kafka_aggregator::worker::AggregationWorker;
