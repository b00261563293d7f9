//! Error handling for the indicator pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for indicator computation
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// Small-area code or ward absent from the crosswalk
    #[error("Unmapped geography: {0}")]
    UnmappedGeography(String),

    /// A parameter row matched zero event records
    #[error("No events match indicator {indicator_id} (reference {reference_id:?})")]
    NoMatchingIndicator {
        indicator_id: i64,
        reference_id: Option<i64>,
    },

    /// Age outside the banded domain (negative or missing)
    #[error("Invalid age for banding: {0:?}")]
    InvalidAgeBand(Option<i32>),

    /// One small-area code maps to more than one ward in a release
    #[error("Crosswalk release {release} maps {small_area} to both {first} and {second}")]
    CrosswalkConflict {
        release: String,
        small_area: String,
        first: String,
        second: String,
    },

    /// A label could not be parsed into a typed value
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error opening or reading a file
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error converting between records and Arrow batches
    #[error("Record conversion error: {0}")]
    Conversion(#[from] serde_arrow::Error),

    /// Error reading an external CSV file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error parsing JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IndicatorError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is fatal to the whole run rather than one record or row
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Parquet(_) | Self::Arrow(_) | Self::Conversion(_) | Self::Csv(_)
        )
    }
}

/// Why a single parameter row produced no rates
#[derive(Debug, thiserror::Error)]
pub enum BatchRowError {
    /// The pipeline returned an error for this row
    #[error("indicator {indicator_id} (reference {reference_id:?}) failed: {source}")]
    Failed {
        indicator_id: i64,
        reference_id: Option<i64>,
        #[source]
        source: IndicatorError,
    },

    /// The row exceeded its time budget
    #[error("indicator {indicator_id} (reference {reference_id:?}) timed out after {elapsed:?}")]
    TimedOut {
        indicator_id: i64,
        reference_id: Option<i64>,
        elapsed: Duration,
    },

    /// The worker task panicked or was cancelled
    #[error("indicator {indicator_id} (reference {reference_id:?}) worker aborted: {message}")]
    Aborted {
        indicator_id: i64,
        reference_id: Option<i64>,
        message: String,
    },
}

impl BatchRowError {
    /// Whether the row failed on an error that is fatal to the whole run
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed { source, .. } if source.is_fatal())
    }
}

/// Result type for indicator operations
pub type Result<T> = std::result::Result<T, IndicatorError>;
