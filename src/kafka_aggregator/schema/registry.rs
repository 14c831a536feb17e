//! Schema Registry clients.
//!
//! The engine only needs two registry capabilities: fetch the latest schema
//! for a subject, and register a schema idempotently. `SchemaRegistry`
//! abstracts those so the aggregator can run against a Confluent Schema
//! Registry in production and an in-memory registry in tests.

use crate::kafka_aggregator::error::AggregatorError;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Subject name for a topic's value schema, Confluent naming convention.
pub fn value_subject(topic: &str) -> String {
    format!("{}-value", topic)
}

/// Minimal Schema Registry interface used by the aggregator.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Latest schema registered under `subject`, as Avro JSON text.
    async fn latest_schema(&self, subject: &str) -> Result<String, AggregatorError>;

    /// Register `schema` under `subject` and return its schema id.
    ///
    /// Registration is idempotent: registering a byte-identical schema twice
    /// returns the same id without creating a new version.
    async fn register(&self, subject: &str, schema: &str) -> Result<u32, AggregatorError>;
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    schema: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: u32,
}

/// Confluent Schema Registry client over HTTP.
pub struct ConfluentSchemaRegistry {
    base_url: String,
    http_client: reqwest::Client,
}

impl ConfluentSchemaRegistry {
    pub fn new(base_url: &str) -> Result<ConfluentSchemaRegistry, AggregatorError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AggregatorError::configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(ConfluentSchemaRegistry {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn post_schema(
        &self,
        url: &str,
        subject: &str,
        schema: &str,
    ) -> Result<reqwest::Response, AggregatorError> {
        self.http_client
            .post(url)
            .header("Content-Type", "application/vnd.schemaregistry.v1+json")
            .json(&json!({ "schema": schema }))
            .send()
            .await
            .map_err(|e| AggregatorError::schema_resolution(subject, e.to_string()))
    }
}

#[async_trait]
impl SchemaRegistry for ConfluentSchemaRegistry {
    async fn latest_schema(&self, subject: &str) -> Result<String, AggregatorError> {
        let url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AggregatorError::schema_resolution(subject, e.to_string()))?;

        if !response.status().is_success() {
            return Err(AggregatorError::schema_resolution(
                subject,
                format!("Registry returned HTTP {}", response.status()),
            ));
        }

        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| AggregatorError::schema_resolution(subject, e.to_string()))?;
        Ok(version.schema)
    }

    async fn register(&self, subject: &str, schema: &str) -> Result<u32, AggregatorError> {
        // Schema lookup first: POST /subjects/{subject} answers with the
        // existing id when this exact schema is already registered.
        let lookup_url = format!("{}/subjects/{}", self.base_url, subject);
        let response = self.post_schema(&lookup_url, subject, schema).await?;
        if response.status().is_success() {
            let existing: IdResponse = response
                .json()
                .await
                .map_err(|e| AggregatorError::schema_resolution(subject, e.to_string()))?;
            debug!(
                "Schema already registered for subject {} with id {}",
                subject, existing.id
            );
            return Ok(existing.id);
        }

        let register_url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let response = self.post_schema(&register_url, subject, schema).await?;
        if !response.status().is_success() {
            return Err(AggregatorError::schema_resolution(
                subject,
                format!("Registration failed with HTTP {}", response.status()),
            ));
        }

        let registered: IdResponse = response
            .json()
            .await
            .map_err(|e| AggregatorError::schema_resolution(subject, e.to_string()))?;
        info!(
            "Registered schema for subject {} with id {}",
            subject, registered.id
        );
        Ok(registered.id)
    }
}

#[derive(Default)]
struct RegistryState {
    // subject -> registered versions, in registration order
    versions: HashMap<String, Vec<(u32, String)>>,
    next_id: u32,
}

/// In-memory registry used in tests and local runs without a registry.
#[derive(Default)]
pub struct InMemorySchemaRegistry {
    state: Mutex<RegistryState>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> InMemorySchemaRegistry {
        InMemorySchemaRegistry::default()
    }

    /// Number of versions stored for a subject.
    pub fn version_count(&self, subject: &str) -> usize {
        let state = self.state.lock().expect("registry state lock poisoned");
        state.versions.get(subject).map_or(0, Vec::len)
    }
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn latest_schema(&self, subject: &str) -> Result<String, AggregatorError> {
        let state = self.state.lock().expect("registry state lock poisoned");
        state
            .versions
            .get(subject)
            .and_then(|versions| versions.last())
            .map(|(_, schema)| schema.clone())
            .ok_or_else(|| AggregatorError::schema_resolution(subject, "Subject not found"))
    }

    async fn register(&self, subject: &str, schema: &str) -> Result<u32, AggregatorError> {
        let mut state = self.state.lock().expect("registry state lock poisoned");
        if let Some(versions) = state.versions.get(subject) {
            if let Some((id, _)) = versions.iter().find(|(_, s)| s == schema) {
                return Ok(*id);
            }
        }
        state.next_id += 1;
        let id = state.next_id;
        state
            .versions
            .entry(subject.to_string())
            .or_default()
            .push((id, schema.to_string()));
        Ok(id)
    }
}
