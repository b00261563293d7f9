//! Age-standardised public-health indicator rates.
//!
//! Events are aggregated by period, geography, ethnic group and age band,
//! joined with ward population estimates, rolled into 3- and 5-year windows
//! and turned into directly standardised rates with confidence intervals.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod external;
pub mod lookup;
pub mod models;
pub mod source;
pub mod utils;

// Core types
pub use config::PipelineConfig;
pub use error::{BatchRowError, IndicatorError, Result};

// Pipeline entry points
pub use algorithm::{
    BatchSummary, ReferenceData, publish_dimensions, run_batch, run_parameter_row, run_pipeline,
};
pub use external::{ImportSummary, import_directory};

// Data sources and sinks
pub use source::{DataSource, InMemorySink, InMemorySource, ParquetSink, ParquetSource, RateSink};
