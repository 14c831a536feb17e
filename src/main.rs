//! Command-line interface for the kafka-aggregator.

use clap::{Parser, Subcommand};
use kafka_aggregator::kafka_aggregator::aggregator::Aggregator;
use kafka_aggregator::kafka_aggregator::config::{AggregatorConfig, Configuration};
use kafka_aggregator::kafka_aggregator::error::AggregatorError;
use kafka_aggregator::kafka_aggregator::fields::{Field, FieldType};
use kafka_aggregator::kafka_aggregator::kafka::{RecordConsumer, RecordProducer};
use kafka_aggregator::kafka_aggregator::schema::registry::{
    value_subject, ConfluentSchemaRegistry, SchemaRegistry,
};
use kafka_aggregator::kafka_aggregator::schema::Schema;
use kafka_aggregator::kafka_aggregator::worker::AggregationWorker;
use log::{error, info};
use rand::Rng;
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "kafka-aggregator", version, about = "Summary statistics over tumbling Kafka windows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run aggregation workers for every configured aggregated topic.
    Run {
        /// Path to the aggregated-topics TOML config file.
        #[arg(long, default_value = "aggregator_config.toml")]
        config: PathBuf,
    },
    /// Produce random example messages for a source topic.
    Produce {
        /// Source topic to produce to.
        #[arg(long, default_value = "example0")]
        topic: String,
        /// Frequency in Hz at which messages are produced.
        #[arg(long, default_value_t = 10.0)]
        frequency: f64,
        /// Maximum number of messages to produce.
        #[arg(long, default_value_t = 600)]
        max_messages: u64,
        /// Number of value fields per message.
        #[arg(long, default_value_t = 10)]
        nfields: usize,
    },
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let configuration = Configuration::from_env();

    let result = match cli.command {
        Command::Run { config } => run(&configuration, &config).await,
        Command::Produce {
            topic,
            frequency,
            max_messages,
            nfields,
        } => produce(&configuration, &topic, frequency, max_messages, nfields).await,
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(configuration: &Configuration, config_path: &PathBuf) -> Result<(), AggregatorError> {
    let aggregator_config = AggregatorConfig::from_file(config_path)?;
    let source_registry = ConfluentSchemaRegistry::new(&configuration.registry_url)?;
    let internal_registry = ConfluentSchemaRegistry::new(&configuration.internal_registry_url)?;
    let retry_backoff = Duration::from_secs_f64(configuration.schema_retry_backoff_seconds);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let mut workers = Vec::new();

    for topic_config in aggregator_config.aggregated_topics {
        let mut aggregator = Aggregator::new(topic_config)?;
        aggregator
            .derive_schema(&source_registry, configuration.max_schema_retries, retry_backoff)
            .await?;
        aggregator.register_schema(&internal_registry).await?;

        let consumer = RecordConsumer::new(&configuration.broker, &configuration.consumer_group)?;
        let producer = RecordProducer::new(&configuration.broker)?;
        let worker = AggregationWorker::new(aggregator, consumer, producer);

        let mut shutdown_rx = shutdown_tx.subscribe();
        workers.push(tokio::spawn(async move {
            worker
                .run(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AggregatorError::configuration(format!("Failed to wait for ctrl-c: {}", e)))?;
    info!("Stopping {} worker(s).", workers.len());
    let _ = shutdown_tx.send(());

    for worker in workers {
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("Worker failed: {}", err),
            Err(err) => error!("Worker panicked: {}", err),
        }
    }
    Ok(())
}

/// Register the example source schema and produce random messages.
async fn produce(
    configuration: &Configuration,
    topic: &str,
    frequency: f64,
    max_messages: u64,
    nfields: usize,
) -> Result<(), AggregatorError> {
    if !(frequency > 0.0) {
        return Err(AggregatorError::configuration("frequency must be positive"));
    }

    let mut fields = vec![Field::new("time", FieldType::Float)];
    for n in 0..nfields {
        fields.push(Field::new(format!("value{}", n), FieldType::Float));
    }
    let schema = Schema::new(fields)?;

    let registry = ConfluentSchemaRegistry::new(&configuration.registry_url)?;
    registry
        .register(&value_subject(topic), &schema.to_avro(topic).to_string())
        .await?;

    let producer = RecordProducer::new(&configuration.broker)?;
    info!(
        "Producing {} message(s) for {} at {} Hz.",
        max_messages, topic, frequency
    );

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / frequency));
    for _ in 0..max_messages {
        interval.tick().await;

        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AggregatorError::configuration(format!("System clock error: {}", e)))?
            .as_secs_f64();
        let mut message = json!({ "time": time });
        {
            let mut rng = rand::thread_rng();
            for n in 0..nfields {
                message[format!("value{}", n)] = json!(rng.gen::<f64>());
            }
        }
        producer.send_raw(topic, message.to_string().as_bytes()).await?;
    }

    producer
        .flush(Duration::from_secs(5))
        .map_err(AggregatorError::Kafka)?;
    info!("{} messages sent.", max_messages);
    Ok(())
}
