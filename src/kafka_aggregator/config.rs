//! Configuration for the aggregator.
//!
//! Two layers, both explicit structs threaded through constructors:
//!
//! - `Configuration`: process-level settings (broker, registry URLs, schema
//!   retry policy), read from environment variables with defaults.
//! - `AggregatorConfig`: the aggregated-topics description loaded from a
//!   TOML file; each aggregated topic names its source topic, the excluded
//!   fields and its window aggregation parameters.
//!
//! All validation happens up front; invalid settings are fatal at startup.

use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::operations::Operation;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a comma-separated list of operation names.
pub fn parse_operations(s: &str) -> Result<Vec<Operation>, AggregatorError> {
    s.replace(' ', "")
        .split(',')
        .filter(|part| !part.is_empty())
        .map(|part| Operation::from_str(part).map_err(AggregatorError::configuration))
        .collect()
}

/// Parse a comma-separated list of field names.
pub fn parse_field_names(s: &str) -> Vec<String> {
    s.replace(' ', "")
        .split(',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Process-level configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// Kafka bootstrap servers.
    pub broker: String,
    /// Schema Registry holding the source topic schemas.
    pub registry_url: String,
    /// Schema Registry where aggregated schemas are registered. Can point at
    /// a separate registry to keep aggregated schema ids apart.
    pub internal_registry_url: String,
    /// Consumer group id.
    pub consumer_group: String,
    /// Bounded retries for schema resolution at startup.
    pub max_schema_retries: u32,
    /// Delay between schema resolution retries, in seconds.
    pub schema_retry_backoff_seconds: f64,
}

impl Configuration {
    pub fn from_env() -> Configuration {
        Configuration {
            broker: env_or("KAFKA_BROKER_URL", "localhost:9092"),
            registry_url: env_or("SCHEMA_REGISTRY_URL", "http://localhost:8081"),
            internal_registry_url: env_or(
                "INTERNAL_SCHEMA_REGISTRY_URL",
                "http://localhost:8081",
            ),
            consumer_group: env_or("CONSUMER_GROUP", "kafka-aggregator"),
            max_schema_retries: 3,
            schema_retry_backoff_seconds: 1.0,
        }
    }
}

fn default_window_size() -> f64 {
    1.0
}

fn default_min_sample_size() -> usize {
    2
}

fn default_operations() -> Vec<Operation> {
    vec![Operation::Mean]
}

/// Window aggregation parameters for one aggregated topic.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowAggregation {
    /// Size of the tumbling window in seconds.
    #[serde(default = "default_window_size")]
    pub window_size_seconds: f64,

    /// Extra delay after a window's nominal end before it closes, to
    /// tolerate slightly late records. Zero closes at the nominal end.
    #[serde(default)]
    pub window_expiration_seconds: f64,

    /// Minimum buffered-record count required to compute statistics. Below
    /// it, the first record's raw values are substituted. The default of 2
    /// guarantees stdev is computable whenever statistics run.
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,

    /// Operations to compute per numeric field, in configured order.
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,
}

impl Default for WindowAggregation {
    fn default() -> WindowAggregation {
        WindowAggregation {
            window_size_seconds: default_window_size(),
            window_expiration_seconds: 0.0,
            min_sample_size: default_min_sample_size(),
            operations: default_operations(),
        }
    }
}

impl WindowAggregation {
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if !(self.window_size_seconds > 0.0) {
            return Err(AggregatorError::configuration(format!(
                "window_size_seconds must be positive, got {}",
                self.window_size_seconds
            )));
        }
        if self.window_expiration_seconds < 0.0 {
            return Err(AggregatorError::configuration(format!(
                "window_expiration_seconds must not be negative, got {}",
                self.window_expiration_seconds
            )));
        }
        if self.min_sample_size < 1 {
            return Err(AggregatorError::configuration(
                "min_sample_size must be at least 1",
            ));
        }
        if self.operations.is_empty() {
            return Err(AggregatorError::configuration(
                "operations must not be empty",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for operation in &self.operations {
            if !seen.insert(operation) {
                return Err(AggregatorError::configuration(format!(
                    "Duplicate operation '{}' in operations",
                    operation
                )));
            }
        }
        Ok(())
    }
}

/// One aggregated topic: where records come from and how they aggregate.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatedTopicConfig {
    /// Aggregated topic name.
    pub name: String,
    /// Source topic to consume.
    pub source_topic: String,
    /// Source field names excluded from aggregation.
    #[serde(default)]
    pub excluded_field_names: Vec<String>,
    /// Window aggregation parameters.
    #[serde(default)]
    pub window_aggregation: WindowAggregation,
}

/// The aggregated-topics configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub aggregated_topics: Vec<AggregatedTopicConfig>,
}

impl AggregatorConfig {
    pub fn from_file(path: &Path) -> Result<AggregatorConfig, AggregatorError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AggregatorError::configuration(format!(
                "Could not read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        AggregatorConfig::from_str(&text)
    }

    pub fn from_str(text: &str) -> Result<AggregatorConfig, AggregatorError> {
        let config: AggregatorConfig = toml::from_str(text).map_err(|e| {
            AggregatorError::configuration(format!("Could not parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AggregatorError> {
        if self.aggregated_topics.is_empty() {
            return Err(AggregatorError::configuration(
                "Config file declares no aggregated topics",
            ));
        }
        for topic in &self.aggregated_topics {
            topic.window_aggregation.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AggregatedTopicConfig> {
        self.aggregated_topics.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [[aggregated_topics]]
        name = "aggregated_example0"
        source_topic = "example0"
        excluded_field_names = ["label"]

        [aggregated_topics.window_aggregation]
        window_size_seconds = 1.0
        window_expiration_seconds = 0.0
        min_sample_size = 2
        operations = ["min", "q1", "mean", "median", "stdev", "q3", "max"]
    "#;

    #[test]
    fn test_parse_config_file() {
        let config = AggregatorConfig::from_str(EXAMPLE).unwrap();
        let topic = config.get("aggregated_example0").unwrap();
        assert_eq!(topic.source_topic, "example0");
        assert_eq!(topic.excluded_field_names, vec!["label"]);
        assert_eq!(topic.window_aggregation.operations.len(), 7);
        assert_eq!(topic.window_aggregation.operations[0], Operation::Min);
    }

    #[test]
    fn test_defaults_apply() {
        let config = AggregatorConfig::from_str(
            r#"
            [[aggregated_topics]]
            name = "agg"
            source_topic = "src"
            "#,
        )
        .unwrap();
        let agg = &config.aggregated_topics[0].window_aggregation;
        assert_eq!(agg.window_size_seconds, 1.0);
        assert_eq!(agg.min_sample_size, 2);
        assert_eq!(agg.operations, vec![Operation::Mean]);
    }

    #[test]
    fn test_invalid_operation_rejected() {
        let result = AggregatorConfig::from_str(
            r#"
            [[aggregated_topics]]
            name = "agg"
            source_topic = "src"
            [aggregated_topics.window_aggregation]
            operations = ["maximum"]
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_window_aggregation_validation() {
        let mut agg = WindowAggregation::default();
        assert!(agg.validate().is_ok());

        agg.window_size_seconds = 0.0;
        assert!(agg.validate().is_err());

        agg = WindowAggregation::default();
        agg.min_sample_size = 0;
        assert!(agg.validate().is_err());

        agg = WindowAggregation::default();
        agg.operations.clear();
        assert!(agg.validate().is_err());

        agg = WindowAggregation::default();
        agg.operations = vec![Operation::Mean, Operation::Mean];
        assert!(agg.validate().is_err());
    }

    #[test]
    fn test_parse_operations_list() {
        let operations = parse_operations("min, mean, max").unwrap();
        assert_eq!(
            operations,
            vec![Operation::Min, Operation::Mean, Operation::Max]
        );
        assert!(parse_operations("min, total").is_err());
    }

    #[test]
    fn test_parse_field_names() {
        assert_eq!(
            parse_field_names("a, b ,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_field_names("").is_empty());
    }
}
