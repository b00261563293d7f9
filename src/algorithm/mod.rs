//! Algorithm implementations for indicator computation
//!
//! This module contains the aggregation and standardisation stages of the
//! pipeline, from per-event records through to standardised rates, plus the
//! batch driver that runs them for every parameter row.

pub mod batch;
pub mod denominator;
pub mod dimensions;
pub mod numerator;
pub mod rolling;
pub mod standardisation;

// Re-export commonly used items
pub use batch::{
    BatchOptions, BatchSummary, ReferenceData, RowOutcome, collect_rates, publish_dimensions,
    run_batch, run_parameter_row, run_pipeline,
};
pub use denominator::{DenominatorRequest, DenominatorSet, build_denominator};
pub use dimensions::{LabelFamily, build_catalogue, demographic_label};
pub use numerator::{AggregationReport, NumeratorRequest, NumeratorSet, aggregate_numerator};
pub use rolling::{CountKey, CountTable, PeriodKey, roll_windows, window_start};
pub use standardisation::{Lookups, RowLabels, StandardisationSettings, standardise};
