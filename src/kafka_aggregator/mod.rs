pub mod aggregator;
pub mod config;
pub mod error;
pub mod fields;
pub mod kafka;
pub mod operations;
pub mod records;
pub mod schema;
pub mod serialization;
pub mod windows;
pub mod worker;
