//! Concurrency properties of the window buffers.
//!
//! The table is single-owner by design; these tests exercise the two shapes
//! concurrency takes around it: independent tables appended in parallel,
//! and one shared table behind a mutex receiving synchronized appends.

use kafka_aggregator::{FieldValue, InputRecord, TumblingWindow, WindowedTable};
use std::sync::{Arc, Mutex};
use std::thread;

fn record(value: f64) -> InputRecord {
    InputRecord::from([("value".to_string(), FieldValue::Float(value))])
}

#[test]
fn distinct_tables_append_in_parallel() {
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            thread::spawn(move || {
                let mut table = WindowedTable::new(TumblingWindow::new(1.0), 0.0);
                for i in 0..1000 {
                    table.ingest(&format!("topic{}", worker), 0.5, record(i as f64));
                }
                let closed = table.drain_all();
                assert_eq!(closed.len(), 1);
                closed[0].records.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1000);
    }
}

#[test]
fn synchronized_appends_lose_nothing() {
    let table = Arc::new(Mutex::new(WindowedTable::new(TumblingWindow::new(1.0), 0.0)));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..500 {
                    let value = (worker * 500 + i) as f64;
                    table
                        .lock()
                        .unwrap()
                        .ingest("topic", 0.5, record(value));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let closed = table.lock().unwrap().drain_all();
    assert_eq!(closed.len(), 1);

    // No record lost, none duplicated.
    let mut values: Vec<f64> = closed[0]
        .records
        .iter()
        .map(|r| r["value"].as_f64().unwrap())
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(values.len(), 4000);
    for (i, value) in values.iter().enumerate() {
        assert_eq!(*value, i as f64);
    }
}

#[test]
fn window_assignment_follows_spec_examples() {
    let window = TumblingWindow::new(1.0);
    // 0.0 and 0.9 share a window; 1.0 starts the next one.
    assert_eq!(window.range(0.0).start, window.range(0.9).start);
    assert_ne!(window.range(0.9).start, window.range(1.0).start);
    assert_eq!(window.range(1.0).start, 1.0);
}
