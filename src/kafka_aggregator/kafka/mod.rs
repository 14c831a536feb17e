//! Thin Kafka transport adapters.
//!
//! The engine only needs two capabilities from the broker: a stream of
//! decoded source records and a way to emit aggregated records. These
//! wrappers bind rdkafka's `StreamConsumer` and `FutureProducer` to the
//! JSON record codec so the rest of the crate never touches raw payloads.

pub mod consumer;
pub mod producer;

pub use consumer::{ConsumedRecord, RecordConsumer};
pub use producer::RecordProducer;
