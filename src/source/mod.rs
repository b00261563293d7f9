//! Data-source and sink handles
//!
//! The pipeline never opens connections on its own. Callers pass a
//! [`DataSource`] to read inputs from and a [`RateSink`] to write results to.

pub mod parquet;

use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::models::{
    CrosswalkRecord, DimensionRecord, EthnicityRecord, EventRecord, ExternalIndicatorRecord,
    ImdScoreRecord, LocalityRecord, ParameterRow, PopulationRecord, RateRecord,
};

pub use self::parquet::{ParquetSink, ParquetSource};

/// Read access to every input table
pub trait DataSource: Send + Sync {
    /// Short description used in log lines
    fn describe(&self) -> String;

    fn events(&self) -> Result<Vec<EventRecord>>;

    fn population(&self) -> Result<Vec<PopulationRecord>>;

    fn crosswalk(&self) -> Result<Vec<CrosswalkRecord>>;

    fn localities(&self) -> Result<Vec<LocalityRecord>>;

    fn ethnicity(&self) -> Result<Vec<EthnicityRecord>>;

    fn imd_scores(&self) -> Result<Vec<ImdScoreRecord>>;

    fn parameters(&self) -> Result<Vec<ParameterRow>>;
}

/// Destination tables
///
/// `replace_*` swap the whole table in one step; readers see either the old
/// rows or the new ones.
pub trait RateSink: Send + Sync {
    fn replace_rates(&self, rates: &[RateRecord]) -> Result<()>;

    fn replace_dimensions(&self, dimensions: &[DimensionRecord]) -> Result<()>;

    /// Add externally computed rows to the staging table
    fn append_external(&self, records: &[ExternalIndicatorRecord]) -> Result<()>;
}

/// Input tables held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    pub events: Vec<EventRecord>,
    pub population: Vec<PopulationRecord>,
    pub crosswalk: Vec<CrosswalkRecord>,
    pub localities: Vec<LocalityRecord>,
    pub ethnicity: Vec<EthnicityRecord>,
    pub imd_scores: Vec<ImdScoreRecord>,
    pub parameters: Vec<ParameterRow>,
}

impl DataSource for InMemorySource {
    fn describe(&self) -> String {
        format!(
            "in-memory source ({} events, {} population rows)",
            self.events.len(),
            self.population.len()
        )
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.events.clone())
    }

    fn population(&self) -> Result<Vec<PopulationRecord>> {
        Ok(self.population.clone())
    }

    fn crosswalk(&self) -> Result<Vec<CrosswalkRecord>> {
        Ok(self.crosswalk.clone())
    }

    fn localities(&self) -> Result<Vec<LocalityRecord>> {
        Ok(self.localities.clone())
    }

    fn ethnicity(&self) -> Result<Vec<EthnicityRecord>> {
        Ok(self.ethnicity.clone())
    }

    fn imd_scores(&self) -> Result<Vec<ImdScoreRecord>> {
        Ok(self.imd_scores.clone())
    }

    fn parameters(&self) -> Result<Vec<ParameterRow>> {
        Ok(self.parameters.clone())
    }
}

/// Sink that keeps the written tables in memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    rates: Mutex<Vec<RateRecord>>,
    dimensions: Mutex<Vec<DimensionRecord>>,
    external: Mutex<Vec<ExternalIndicatorRecord>>,
}

impl InMemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rates(&self) -> Vec<RateRecord> {
        self.rates.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn dimensions(&self) -> Vec<DimensionRecord> {
        self.dimensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn external(&self) -> Vec<ExternalIndicatorRecord> {
        self.external
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RateSink for InMemorySink {
    fn replace_rates(&self, rates: &[RateRecord]) -> Result<()> {
        *self.rates.lock().unwrap_or_else(PoisonError::into_inner) = rates.to_vec();
        Ok(())
    }

    fn replace_dimensions(&self, dimensions: &[DimensionRecord]) -> Result<()> {
        *self.dimensions.lock().unwrap_or_else(PoisonError::into_inner) = dimensions.to_vec();
        Ok(())
    }

    fn append_external(&self, records: &[ExternalIndicatorRecord]) -> Result<()> {
        self.external
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(records);
        Ok(())
    }
}
