//! Parquet file operations
//!
//! This module provides utilities for reading Parquet files into typed
//! records and for writing record tables so that readers never observe a
//! half-written file.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rayon::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::error::util::safe_open_file;
use crate::error::{IndicatorError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Helper function to get batch size from environment
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("PARQUET_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
}

/// Read a parquet file into Arrow record batches
pub fn read_parquet(path: &Path, purpose: &str) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path, purpose)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(get_batch_size().unwrap_or(DEFAULT_BATCH_SIZE))
        .build()?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_operation_complete("read", path, batches.len(), Some(start.elapsed()));
    Ok(batches)
}

/// Read a parquet file straight into typed records
///
/// Batches are decoded in parallel; record order follows batch order.
pub fn read_records<T>(path: &Path, purpose: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send,
{
    let batches = read_parquet(path, purpose)?;
    let decoded = batches
        .par_iter()
        .map(|batch| serde_arrow::from_record_batch::<Vec<T>>(batch).map_err(IndicatorError::from))
        .collect::<Result<Vec<Vec<T>>>>()?;
    let records = decoded.into_iter().flatten().collect_vec();
    if records.is_empty() {
        log_warning(&format!("No {purpose} rows found"), Some(path));
    }
    Ok(records)
}

/// Arrow fields for a record type
pub fn record_fields<T>() -> Result<Vec<FieldRef>>
where
    T: DeserializeOwned,
{
    let options = TracingOptions::default()
        .allow_null_fields(true)
        .enums_without_data_as_strings(true);
    Ok(Vec::<FieldRef>::from_type::<T>(options)?)
}

/// A row type stored as one Parquet table
///
/// The Arrow fields are traced from the type. Types holding values that
/// cannot be traced, such as `chrono` dates, declare their fields instead.
pub trait TableRecord: Serialize + DeserializeOwned {
    /// Arrow fields of the table
    fn fields() -> Result<Vec<FieldRef>> {
        record_fields::<Self>()
    }
}

/// Convert records into a single record batch
pub fn records_to_batch<T: TableRecord>(records: &[T]) -> Result<RecordBatch> {
    let fields = T::fields()?;
    Ok(serde_arrow::to_record_batch(&fields, &records)?)
}

/// Staging path used while replacing `path`
#[must_use]
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".staging");
    path.with_file_name(name)
}

/// Write records to `path`, replacing any existing file atomically
///
/// The table is written to a staging file next to the target, synced, then
/// renamed over it.
pub fn write_records_atomic<T: TableRecord>(path: &Path, records: &[T]) -> Result<()> {
    let start = std::time::Instant::now();
    log_operation_start("Writing parquet file", path);

    let batch = records_to_batch(records)?;
    let staging = staging_path(path);
    let file = File::create(&staging).map_err(|e| IndicatorError::io(&staging, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    File::open(&staging)
        .and_then(|f| f.sync_all())
        .map_err(|e| IndicatorError::io(&staging, e))?;
    std::fs::rename(&staging, path).map_err(|e| IndicatorError::io(path, e))?;

    log_operation_complete("wrote", path, records.len(), Some(start.elapsed()));
    Ok(())
}
