//! Tumbling windows and the windowed record buffer.
//!
//! Windows are fixed-size, non-overlapping and aligned to multiples of the
//! window size. A window covering `[start, start + size)` is published with
//! the range `(start, start + size - 0.1)`: the stored end is short of the
//! nominal end by `WINDOW_RANGE_GAP` seconds. Records with timestamps inside
//! the gap still belong to the window; the gap is compensated only when the
//! representative midpoint timestamp is computed.
//!
//! `WindowedTable` owns every open window buffer for one worker. It is
//! single-owner by design: the worker task is the only execution context
//! appending to and draining a table, so append and close can never race for
//! the same window key.

use crate::kafka_aggregator::records::InputRecord;
use log::warn;
use std::collections::HashMap;

/// Gap between a window's stored range end and its nominal end, in seconds.
pub const WINDOW_RANGE_GAP: f64 = 0.1;

/// Tumbling window assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TumblingWindow {
    size_seconds: f64,
}

impl TumblingWindow {
    pub fn new(size_seconds: f64) -> TumblingWindow {
        debug_assert!(size_seconds > 0.0);
        TumblingWindow { size_seconds }
    }

    pub fn size_seconds(&self) -> f64 {
        self.size_seconds
    }

    /// The window range a timestamp falls into.
    pub fn range(&self, timestamp: f64) -> WindowRange {
        let start = (timestamp / self.size_seconds).floor() * self.size_seconds;
        WindowRange {
            start,
            end: start + self.size_seconds - WINDOW_RANGE_GAP,
        }
    }
}

/// One window's time range, `(start, start + size - 0.1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowRange {
    pub start: f64,
    pub end: f64,
}

impl WindowRange {
    /// Representative timestamp for the window's aggregated record.
    ///
    /// The stored end is short by `WINDOW_RANGE_GAP`, so the midpoint adds
    /// it back: `(start + end + 0.1) / 2`, the center of the nominal window.
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end + WINDOW_RANGE_GAP) / 2.0
    }
}

/// Identity of one window buffer: partition key plus window start.
///
/// The start is keyed by its bit pattern; window starts are produced by the
/// same floor arithmetic for every member timestamp, so identical windows
/// yield identical bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    partition_key: String,
    start_bits: u64,
}

impl WindowKey {
    fn new(partition_key: &str, range: WindowRange) -> WindowKey {
        WindowKey {
            partition_key: partition_key.to_string(),
            start_bits: range.start.to_bits(),
        }
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn start(&self) -> f64 {
        f64::from_bits(self.start_bits)
    }
}

/// Outcome of offering a record to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The record was appended to its window buffer.
    Buffered,
    /// The record's window was already closed; the record was dropped.
    DroppedLate,
}

/// A window that reached its expiration and was drained from the table.
#[derive(Debug)]
pub struct ClosedWindow {
    pub key: WindowKey,
    pub range: WindowRange,
    pub records: Vec<InputRecord>,
}

struct WindowBuffer {
    range: WindowRange,
    records: Vec<InputRecord>,
}

/// Per-worker map of open window buffers.
///
/// Records append in arrival order; each window drains exactly once, after
/// its nominal end plus the expiration delay has passed in stream time.
/// Records arriving for a window that already closed are dropped and
/// counted, never re-opening the window.
pub struct WindowedTable {
    window: TumblingWindow,
    expiration_seconds: f64,
    buffers: HashMap<WindowKey, WindowBuffer>,
    // partition key -> start of the most recently closed window
    last_closed: HashMap<String, f64>,
    dropped_late: u64,
}

impl WindowedTable {
    pub fn new(window: TumblingWindow, expiration_seconds: f64) -> WindowedTable {
        debug_assert!(expiration_seconds >= 0.0);
        WindowedTable {
            window,
            expiration_seconds,
            buffers: HashMap::new(),
            last_closed: HashMap::new(),
            dropped_late: 0,
        }
    }

    /// Append a record to the window its timestamp falls into.
    pub fn ingest(
        &mut self,
        partition_key: &str,
        timestamp: f64,
        record: InputRecord,
    ) -> IngestOutcome {
        let range = self.window.range(timestamp);

        if let Some(last_closed) = self.last_closed.get(partition_key) {
            if range.start <= *last_closed {
                self.dropped_late += 1;
                warn!(
                    "Dropping late record for closed window ({}, {}) of '{}' \
                     ({} dropped so far)",
                    range.start,
                    range.end + WINDOW_RANGE_GAP,
                    partition_key,
                    self.dropped_late
                );
                return IngestOutcome::DroppedLate;
            }
        }

        self.buffers
            .entry(WindowKey::new(partition_key, range))
            .or_insert_with(|| WindowBuffer {
                range,
                records: Vec::new(),
            })
            .records
            .push(record);
        IngestOutcome::Buffered
    }

    /// Drain every window whose nominal end plus the expiration delay lies
    /// at or before `now` (stream time, epoch seconds).
    ///
    /// Drained windows are removed from the table, so each window closes
    /// exactly once. Results are ordered by window start so downstream
    /// emission preserves time order per partition.
    pub fn close_expired(&mut self, now: f64) -> Vec<ClosedWindow> {
        let deadline = |range: &WindowRange| range.end + WINDOW_RANGE_GAP + self.expiration_seconds;
        let expired: Vec<WindowKey> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| deadline(&buffer.range) <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut closed = Vec::with_capacity(expired.len());
        for key in expired {
            let buffer = self
                .buffers
                .remove(&key)
                .expect("expired key collected from the buffer map");
            let last = self
                .last_closed
                .entry(key.partition_key().to_string())
                .or_insert(f64::NEG_INFINITY);
            if buffer.range.start > *last {
                *last = buffer.range.start;
            }
            closed.push(ClosedWindow {
                key,
                range: buffer.range,
                records: buffer.records,
            });
        }
        closed.sort_by(|a, b| {
            a.range
                .start
                .partial_cmp(&b.range.start)
                .expect("window starts are finite")
        });
        closed
    }

    /// Drain every remaining window regardless of expiration. Used on
    /// shutdown so no buffered records are silently discarded.
    pub fn drain_all(&mut self) -> Vec<ClosedWindow> {
        self.close_expired(f64::INFINITY)
    }

    /// Number of open window buffers.
    pub fn open_windows(&self) -> usize {
        self.buffers.len()
    }

    /// Records dropped because their window had already closed.
    pub fn dropped_late(&self) -> u64 {
        self.dropped_late
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: f64) -> InputRecord {
        use crate::kafka_aggregator::records::FieldValue;
        InputRecord::from([("value".to_string(), FieldValue::Float(value))])
    }

    #[test]
    fn test_window_ranges() {
        let window = TumblingWindow::new(1.0);
        assert_eq!(window.range(0.0), WindowRange { start: 0.0, end: 0.9 });
        assert_eq!(window.range(0.9), WindowRange { start: 0.0, end: 0.9 });
        assert_eq!(window.range(1.0), WindowRange { start: 1.0, end: 1.9 });
    }

    #[test]
    fn test_timestamp_in_range_gap_belongs_to_window() {
        // A timestamp between (start + size - 0.1) and (start + size) still
        // falls in the current window.
        let window = TumblingWindow::new(1.0);
        assert_eq!(window.range(0.95), WindowRange { start: 0.0, end: 0.9 });
    }

    #[test]
    fn test_midpoint_compensates_range_gap() {
        let window = TumblingWindow::new(1.0);
        assert_eq!(window.range(0.3).midpoint(), 0.5);
        let window = TumblingWindow::new(10.0);
        assert_eq!(window.range(12.0).midpoint(), 15.0);
    }

    #[test]
    fn test_same_window_same_key() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("topic", 0.0, record(1.0));
        table.ingest("topic", 0.9, record(2.0));
        table.ingest("topic", 1.0, record(3.0));
        assert_eq!(table.open_windows(), 2);
    }

    #[test]
    fn test_close_expired_drains_in_arrival_order() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("topic", 0.2, record(1.0));
        table.ingest("topic", 0.5, record(2.0));
        table.ingest("topic", 0.8, record(3.0));

        // Nominal end is 1.0; nothing expires before it.
        assert!(table.close_expired(0.99).is_empty());

        let closed = table.close_expired(1.0);
        assert_eq!(closed.len(), 1);
        let values: Vec<f64> = closed[0]
            .records
            .iter()
            .map(|r| r["value"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(table.open_windows(), 0);
    }

    #[test]
    fn test_expiration_delay_postpones_close() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 1.0);
        table.ingest("topic", 0.5, record(1.0));
        assert!(table.close_expired(1.5).is_empty());
        // A late record inside the delay is still accepted.
        assert_eq!(table.ingest("topic", 0.7, record(2.0)), IngestOutcome::Buffered);
        let closed = table.close_expired(2.0);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].records.len(), 2);
    }

    #[test]
    fn test_window_closes_exactly_once() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("topic", 0.5, record(1.0));
        assert_eq!(table.close_expired(5.0).len(), 1);
        assert!(table.close_expired(5.0).is_empty());
    }

    #[test]
    fn test_late_record_after_close_is_dropped() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("topic", 0.5, record(1.0));
        table.close_expired(5.0);

        assert_eq!(table.ingest("topic", 0.8, record(2.0)), IngestOutcome::DroppedLate);
        assert_eq!(table.dropped_late(), 1);
        assert_eq!(table.open_windows(), 0);

        // A record for a newer window is unaffected.
        assert_eq!(table.ingest("topic", 6.0, record(3.0)), IngestOutcome::Buffered);
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("a", 0.5, record(1.0));
        table.ingest("b", 0.5, record(2.0));
        assert_eq!(table.open_windows(), 2);

        let closed = table.close_expired(2.0);
        assert_eq!(closed.len(), 2);
        assert_eq!(table.dropped_late(), 0);
    }

    #[test]
    fn test_closed_windows_sorted_by_start() {
        let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
        table.ingest("topic", 2.5, record(3.0));
        table.ingest("topic", 0.5, record(1.0));
        table.ingest("topic", 1.5, record(2.0));
        let closed = table.drain_all();
        let starts: Vec<f64> = closed.iter().map(|w| w.range.start).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_drain_all_flushes_everything() {
        let mut table = WindowedTable::new(TumblingWindow::new(60.0), 300.0);
        table.ingest("topic", 1.0, record(1.0));
        table.ingest("topic", 100.0, record(2.0));
        assert_eq!(table.drain_all().len(), 2);
        assert_eq!(table.open_windows(), 0);
    }
}
