//! Aggregated-record producer.

use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::records::AggregatedRecord;
use crate::kafka_aggregator::serialization::JsonCodec;
use log::info;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON record producer over rdkafka's `FutureProducer`.
pub struct RecordProducer {
    producer: FutureProducer,
    codec: JsonCodec,
}

impl RecordProducer {
    pub fn new(brokers: &str) -> Result<RecordProducer, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        info!("Created producer connected to {}", brokers);
        Ok(RecordProducer {
            producer,
            codec: JsonCodec::new(),
        })
    }

    /// Send one aggregated record. The Kafka message timestamp is the
    /// record's window midpoint.
    pub async fn send(
        &self,
        topic: &str,
        record: &AggregatedRecord,
    ) -> Result<(), AggregatorError> {
        let payload = self.codec.encode(record)?;
        let timestamp = record
            .get_f64("time")
            .map(|seconds| (seconds * 1000.0) as i64);

        let mut future_record: FutureRecord<'_, (), Vec<u8>> =
            FutureRecord::to(topic).payload(&payload);
        if let Some(timestamp) = timestamp {
            future_record = future_record.timestamp(timestamp);
        }

        self.producer
            .send(future_record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _message)| AggregatorError::Kafka(err))?;
        Ok(())
    }

    /// Send a raw JSON payload; used by the example producer.
    pub async fn send_raw(&self, topic: &str, payload: &[u8]) -> Result<(), AggregatorError> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(topic).payload(payload);
        self.producer
            .send(record, SEND_TIMEOUT)
            .await
            .map_err(|(err, _message)| AggregatorError::Kafka(err))?;
        Ok(())
    }

    /// Block until in-flight messages are delivered or the timeout passes.
    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(Timeout::After(timeout))
    }
}
