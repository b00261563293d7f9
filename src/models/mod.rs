//! Domain models for indicator computation
//!
//! Typed dimension values live in `types`; table rows consumed from and
//! written to the data sources live in `records`.

pub mod records;
pub mod types;

// Re-export commonly used types
pub use records::{
    CrosswalkRecord, DimensionRecord, EthnicityRecord, EventRecord, ExternalIndicatorRecord,
    ImdScoreRecord, LocalityRecord, ParameterRow, PopulationRecord, RateRecord,
};
pub use types::{
    AgeBand, FiscalYear, Gender, GeographyLevel, ImdQuintile, Period, QualityFlag,
    Stratification, WindowLength,
};
