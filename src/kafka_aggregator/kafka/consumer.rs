//! Source-topic consumer.

use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::records::InputRecord;
use crate::kafka_aggregator::serialization::JsonCodec;
use log::info;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message as KafkaMessage;

/// One decoded message from a source topic.
#[derive(Debug)]
pub struct ConsumedRecord {
    pub topic: String,
    /// Broker timestamp in epoch seconds, when the broker provided one.
    pub timestamp: Option<f64>,
    pub record: InputRecord,
}

/// JSON record consumer over rdkafka's `StreamConsumer`.
pub struct RecordConsumer {
    consumer: StreamConsumer,
    codec: JsonCodec,
}

impl RecordConsumer {
    pub fn new(brokers: &str, group_id: &str) -> Result<RecordConsumer, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        info!(
            "Created consumer for group {} connected to {}",
            group_id, brokers
        );
        Ok(RecordConsumer {
            consumer,
            codec: JsonCodec::new(),
        })
    }

    pub fn subscribe(&self, topics: &[&str]) -> Result<(), KafkaError> {
        self.consumer.subscribe(topics)
    }

    /// Receive and decode the next message.
    pub async fn recv(&self) -> Result<ConsumedRecord, AggregatorError> {
        let message = self.consumer.recv().await?;
        let payload = message.payload().unwrap_or_default();
        let record = self.codec.decode(payload)?;
        let timestamp = message
            .timestamp()
            .to_millis()
            .map(|millis| millis as f64 / 1000.0);
        Ok(ConsumedRecord {
            topic: message.topic().to_string(),
            timestamp,
            record,
        })
    }
}
