//! The aggregation worker: one task per aggregated topic.
//!
//! The worker owns its `WindowedTable` exclusively, so buffer appends and
//! window closes are serialized by construction; concurrency exists only
//! across workers, which share nothing.
//!
//! Window closes are driven by stream time: every ingested record advances
//! the high-water mark, and windows whose nominal end plus expiration delay
//! fall behind it are closed and emitted. An idle stream therefore keeps its
//! last window buffered until the next record or shutdown, at which point
//! all in-flight windows are flushed; a window either emits fully or not at
//! all.

use crate::kafka_aggregator::aggregator::Aggregator;
use crate::kafka_aggregator::error::AggregatorError;
use crate::kafka_aggregator::kafka::{ConsumedRecord, RecordConsumer, RecordProducer};
use crate::kafka_aggregator::windows::{ClosedWindow, TumblingWindow, WindowedTable, WINDOW_RANGE_GAP};
use log::{error, info, warn};
use std::future::Future;
use std::time::Duration;

/// Streaming loop for one aggregated topic.
pub struct AggregationWorker {
    aggregator: Aggregator,
    table: WindowedTable,
    consumer: RecordConsumer,
    producer: RecordProducer,
    stream_time: f64,
    failed_windows: u64,
}

impl AggregationWorker {
    /// Build a worker around an aggregator whose schema lifecycle has
    /// already run (derived and registered).
    pub fn new(
        aggregator: Aggregator,
        consumer: RecordConsumer,
        producer: RecordProducer,
    ) -> AggregationWorker {
        let aggregation = &aggregator.config().window_aggregation;
        let table = WindowedTable::new(
            TumblingWindow::new(aggregation.window_size_seconds),
            aggregation.window_expiration_seconds,
        );
        AggregationWorker {
            aggregator,
            table,
            consumer,
            producer,
            stream_time: f64::NEG_INFINITY,
            failed_windows: 0,
        }
    }

    /// Run until `shutdown` resolves, then flush all in-flight windows.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<(), AggregatorError> {
        let source_topic = self.aggregator.config().source_topic.clone();
        self.consumer.subscribe(&[&source_topic])?;
        info!(
            "Aggregating {} into {} in windows of {}s.",
            source_topic,
            self.aggregator.config().name,
            self.aggregator.config().window_aggregation.window_size_seconds
        );

        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                consumed = self.consumer.recv() => Some(consumed),
                _ = &mut shutdown => None,
            };
            match next {
                Some(Ok(consumed)) => self.handle_record(consumed).await,
                Some(Err(err)) => warn!("Skipping undecodable message: {}", err),
                None => {
                    info!("Shutdown requested, flushing in-flight windows.");
                    break;
                }
            }
        }

        let remaining = self.table.drain_all();
        for window in remaining {
            self.emit(window).await;
        }
        if let Err(err) = self.producer.flush(Duration::from_secs(5)) {
            error!("Failed to flush producer on shutdown: {}", err);
        }
        info!(
            "Worker for {} stopped ({} window(s) failed, {} late record(s) dropped).",
            self.aggregator.config().name,
            self.failed_windows,
            self.table.dropped_late()
        );
        Ok(())
    }

    async fn handle_record(&mut self, consumed: ConsumedRecord) {
        // Event time comes from the record's `time` field; messages without
        // one fall back to the broker timestamp.
        let timestamp = consumed
            .record
            .get("time")
            .and_then(|value| value.as_f64())
            .or(consumed.timestamp);
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => {
                warn!("Skipping record without usable timestamp on {}", consumed.topic);
                return;
            }
        };

        self.table.ingest(&consumed.topic, timestamp, consumed.record);
        if timestamp > self.stream_time {
            self.stream_time = timestamp;
        }

        let closed = self.table.close_expired(self.stream_time);
        for window in closed {
            self.emit(window).await;
        }
    }

    /// Compute and send one closed window.
    ///
    /// A compute failure abandons this window only; the worker keeps going.
    async fn emit(&mut self, window: ClosedWindow) {
        if window.records.is_empty() {
            // Windows are created by arrival, so an empty batch means the
            // window was drained elsewhere; never emit a zero-count record.
            return;
        }

        let record = match self
            .aggregator
            .compute(window.range.midpoint(), &window.records)
        {
            Ok(record) => record,
            Err(err) => {
                self.failed_windows += 1;
                error!(
                    "Abandoning window ({}, {}) of '{}': {}",
                    window.range.start,
                    window.range.end + WINDOW_RANGE_GAP,
                    window.key.partition_key(),
                    err
                );
                return;
            }
        };

        let topic = self.aggregator.config().name.clone();
        match self.producer.send(&topic, &record).await {
            Ok(()) => info!(
                "{:5} messages aggregated on window ({}, {}).",
                record.count(),
                window.range.start,
                window.range.end + WINDOW_RANGE_GAP
            ),
            Err(err) => error!(
                "Failed to send aggregated record for window ({}, {}): {}",
                window.range.start,
                window.range.end + WINDOW_RANGE_GAP,
                err
            ),
        }
    }
}
