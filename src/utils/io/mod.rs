//! File IO helpers.

pub mod parquet;

pub use parquet::{TableRecord, read_parquet, read_records, write_records_atomic};
