//! Reference lookups shared by every stage of the pipeline
//!
//! Crosswalk, ethnicity and deprivation tables are loaded once per run and
//! only read afterwards.

pub mod deprivation;
pub mod ethnicity;
pub mod geography;

pub use deprivation::DeprivationLookup;
pub use ethnicity::EthnicityMapping;
pub use geography::{GeographyCrosswalk, Ward};
