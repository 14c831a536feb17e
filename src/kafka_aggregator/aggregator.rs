//! The aggregation engine for one aggregated topic.
//!
//! An `Aggregator` walks a fixed lifecycle:
//!
//! ```text
//! Unconfigured -> SchemaDerived -> SchemaRegistered -> running
//! ```
//!
//! The aggregated schema is derived from the source topic schema exactly
//! once, registered idempotently with the (internal) Schema Registry, and is
//! immutable from then on. `compute` turns one closed window batch into one
//! `AggregatedRecord`; calling it before the schema exists is a programming
//! error.
//!
//! `compute` is deterministic over `(batch, midpoint)`, so re-emitting a
//! window after a transport failure reproduces the identical record.

use crate::kafka_aggregator::config::AggregatedTopicConfig;
use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::fields::Field;
use crate::kafka_aggregator::records::{AggregatedRecord, FieldValue, InputRecord};
use crate::kafka_aggregator::schema::registry::{value_subject, SchemaRegistry};
use crate::kafka_aggregator::schema::{aggregated_fields, Schema};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

enum SchemaState {
    Unconfigured,
    Derived(Arc<Schema>),
    Registered { schema: Arc<Schema>, id: u32 },
}

impl SchemaState {
    fn schema(&self) -> Option<&Arc<Schema>> {
        match self {
            SchemaState::Unconfigured => None,
            SchemaState::Derived(schema) => Some(schema),
            SchemaState::Registered { schema, .. } => Some(schema),
        }
    }
}

/// Derives the aggregated schema and computes summary statistics for one
/// aggregated topic.
pub struct Aggregator {
    config: AggregatedTopicConfig,
    state: SchemaState,
}

impl Aggregator {
    /// Create an aggregator in the `Unconfigured` state.
    pub fn new(config: AggregatedTopicConfig) -> Result<Aggregator, AggregatorError> {
        config.window_aggregation.validate()?;
        Ok(Aggregator {
            config,
            state: SchemaState::Unconfigured,
        })
    }

    pub fn config(&self) -> &AggregatedTopicConfig {
        &self.config
    }

    /// The aggregated schema, once derived.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.state.schema()
    }

    /// Registry subject for the aggregated topic's value schema.
    pub fn subject(&self) -> String {
        value_subject(&self.config.name)
    }

    /// Resolve the source topic schema and derive the aggregated schema.
    ///
    /// Registry fetches are retried a bounded number of times before the
    /// error becomes fatal.
    pub async fn derive_schema(
        &mut self,
        source_registry: &dyn SchemaRegistry,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<(), AggregatorError> {
        let subject = value_subject(&self.config.source_topic);
        let mut attempt = 0;
        let schema_text = loop {
            match source_registry.latest_schema(&subject).await {
                Ok(schema) => break schema,
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    warn!(
                        "Schema resolution for subject {} failed (attempt {}/{}): {}",
                        subject, attempt, max_retries, err
                    );
                    tokio::time::sleep(retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        };

        let avro: serde_json::Value = serde_json::from_str(&schema_text).map_err(|e| {
            AggregatorError::schema_resolution(&subject, format!("Invalid Avro JSON: {}", e))
        })?;
        let source_schema = Schema::from_avro(&avro)?;
        self.derive_from_fields(source_schema.fields())
    }

    /// Derive the aggregated schema from an already-resolved field list.
    ///
    /// Transition `Unconfigured -> SchemaDerived`; re-derivation is rejected
    /// because the schema is immutable once built.
    pub fn derive_from_fields(&mut self, source_fields: &[Field]) -> Result<(), AggregatorError> {
        if !matches!(self.state, SchemaState::Unconfigured) {
            return Err(AggregatorError::configuration(format!(
                "Aggregated schema for topic '{}' already derived",
                self.config.name
            )));
        }
        info!(
            "Deriving aggregated schema for topic {} from source topic {}.",
            self.config.name, self.config.source_topic
        );
        let fields = aggregated_fields(
            source_fields,
            &self.config.window_aggregation.operations,
            &self.config.excluded_field_names,
        );
        self.state = SchemaState::Derived(Arc::new(Schema::new(fields)?));
        Ok(())
    }

    /// Register the derived schema with the internal registry.
    ///
    /// Transition `SchemaDerived -> SchemaRegistered`. Registration is
    /// idempotent; a byte-identical schema keeps its existing id.
    pub async fn register_schema(
        &mut self,
        internal_registry: &dyn SchemaRegistry,
    ) -> Result<u32, AggregatorError> {
        let schema = match &self.state {
            SchemaState::Unconfigured => return Err(AggregatorError::SchemaNotInitialized),
            SchemaState::Derived(schema) => Arc::clone(schema),
            SchemaState::Registered { id, .. } => return Ok(*id),
        };

        let subject = self.subject();
        info!("Register schema for subject {}.", subject);
        let avro = schema.to_avro(&avro_record_name(&self.config.name));
        let id = internal_registry.register(&subject, &avro.to_string()).await?;
        self.state = SchemaState::Registered { schema, id };
        Ok(id)
    }

    /// Compute the aggregated record for one closed window.
    ///
    /// `time` is the window midpoint. When the batch holds fewer records
    /// than `min_sample_size`, the first record's raw value stands in for
    /// every statistic; arrival order of the batch is load-bearing there.
    pub fn compute(
        &self,
        time: f64,
        batch: &[InputRecord],
    ) -> Result<AggregatedRecord, AggregatorError> {
        let schema = match self.state.schema() {
            Some(schema) => Arc::clone(schema),
            None => return Err(AggregatorError::SchemaNotInitialized),
        };
        if batch.is_empty() {
            return Err(AggregatorError::Compute {
                operation: "count".to_string(),
                message: "Cannot aggregate an empty window batch".to_string(),
            });
        }

        let aggregation = &self.config.window_aggregation;
        let count = batch.len();

        let mut values: HashMap<String, FieldValue> = HashMap::with_capacity(schema.len());
        values.insert("time".to_string(), FieldValue::Float(time));
        values.insert(
            "window_size".to_string(),
            FieldValue::Float(aggregation.window_size_seconds),
        );
        values.insert("count".to_string(), FieldValue::Integer(count as i64));

        for field in schema.derived_fields() {
            let source = field
                .source_field_name()
                .ok_or(AggregatorError::SchemaNotInitialized)?;
            let operation = field
                .operation()
                .ok_or(AggregatorError::SchemaNotInitialized)?;
            let samples = extract_column(batch, source)?;

            let value = if count >= aggregation.min_sample_size {
                operation
                    .apply(&samples)
                    .map_err(|e| AggregatorError::compute(operation.as_str(), &samples, e))?
            } else {
                // Low-sample degradation: the first record's raw value
                // stands in for the statistic.
                samples[0]
            };
            values.insert(field.name().to_string(), FieldValue::Float(value));
        }

        AggregatedRecord::new(schema, values)
    }
}

fn avro_record_name(topic: &str) -> String {
    // Avro names cannot carry '-' or '.'; topic names often do.
    topic.replace(['-', '.'], "_")
}

fn extract_column(batch: &[InputRecord], source: &str) -> Result<Vec<f64>, AggregatorError> {
    batch
        .iter()
        .map(|record| {
            record
                .get(source)
                .and_then(FieldValue::as_f64)
                .ok_or_else(|| AggregatorError::Compute {
                    operation: "extract".to_string(),
                    message: format!("Record has no numeric field '{}'", source),
                })
        })
        .collect()
}
