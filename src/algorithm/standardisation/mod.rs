//! Direct age standardisation
//!
//! `dsr` holds the statistics for a single rate; `engine` rolls counts up to
//! every geography and stratum and applies them.

pub mod dsr;
pub mod engine;

pub use dsr::{
    BandObservation, DsrEstimate, EUROPEAN_STANDARD_POPULATION_2013, directly_standardised_rate,
    z_for_confidence,
};
pub use engine::{Lookups, RowLabels, SMALL_NUMBER_THRESHOLD, StandardisationSettings, standardise};
