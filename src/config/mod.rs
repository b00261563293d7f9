//! Configuration for the indicator pipeline.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::algorithm::standardisation::{
    EUROPEAN_STANDARD_POPULATION_2013, StandardisationSettings, z_for_confidence,
};
use crate::error::{IndicatorError, Result};
use crate::models::types::AGE_BAND_COUNT;

/// Default rate multiplier (per 100,000)
pub const DEFAULT_MULTIPLIER: f64 = 100_000.0;

/// Default per-row time budget
pub const DEFAULT_ROW_TIMEOUT_SECS: u64 = 600;

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rates are expressed per this many people
    pub multiplier: f64,
    /// Confidence level of the interval, e.g. 0.95
    pub confidence_level: f64,
    /// Label used for the whole-population geography
    pub whole_population_label: String,
    /// Local authorities in scope; empty means every authority in the crosswalk
    pub target_la_codes: Vec<String>,
    /// Crosswalk release to resolve small areas with
    pub crosswalk_release: String,
    /// Periods ending on or after this date are dropped; defaults to today
    pub as_of: Option<NaiveDate>,
    /// Parameter rows processed at the same time
    pub max_concurrent_rows: usize,
    /// Time budget for one parameter row
    pub row_timeout_secs: u64,
    /// Reference population per age band; defaults to the 2013 European Standard Population
    pub reference_population: Option<Vec<f64>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            confidence_level: 0.95,
            whole_population_label: "Whole population".to_string(),
            target_la_codes: Vec::new(),
            crosswalk_release: "LSOA21_WD22".to_string(),
            as_of: None,
            max_concurrent_rows: num_cpus::get(),
            row_timeout_secs: DEFAULT_ROW_TIMEOUT_SECS,
            reference_population: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IndicatorError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Apply `INDICATOR_MAX_CONCURRENT_ROWS` and `INDICATOR_ROW_TIMEOUT_SECS`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env_usize("INDICATOR_MAX_CONCURRENT_ROWS") {
            self.max_concurrent_rows = n;
        }
        if let Some(secs) = env_usize("INDICATOR_ROW_TIMEOUT_SECS") {
            self.row_timeout_secs = secs as u64;
        }
        self
    }

    /// Check values that would make the computation meaningless
    pub fn validate(&self) -> Result<()> {
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(IndicatorError::Config(format!(
                "multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(IndicatorError::Config(format!(
                "confidence_level must be between 0 and 1, got {}",
                self.confidence_level
            )));
        }
        if self.max_concurrent_rows == 0 {
            return Err(IndicatorError::Config(
                "max_concurrent_rows must be at least 1".to_string(),
            ));
        }
        self.reference_weights().map(|_| ())
    }

    /// Reference population weights per age band
    pub fn reference_weights(&self) -> Result<[f64; AGE_BAND_COUNT as usize]> {
        match &self.reference_population {
            None => Ok(EUROPEAN_STANDARD_POPULATION_2013),
            Some(values) => {
                let weights: [f64; AGE_BAND_COUNT as usize] =
                    values.as_slice().try_into().map_err(|_| {
                        IndicatorError::Config(format!(
                            "reference_population needs {AGE_BAND_COUNT} values, got {}",
                            values.len()
                        ))
                    })?;
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(IndicatorError::Config(
                        "reference_population weights must be non-negative".to_string(),
                    ));
                }
                Ok(weights)
            }
        }
    }

    /// Settings for the standardisation engine
    pub fn standardisation_settings(&self) -> Result<StandardisationSettings> {
        Ok(StandardisationSettings {
            multiplier: self.multiplier,
            z: z_for_confidence(self.confidence_level),
            whole_population_label: self.whole_population_label.clone(),
            reference_population: self.reference_weights()?,
            target_las: self.target_la_codes.clone(),
        })
    }

    /// Cut-off date for complete periods
    #[must_use]
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    #[must_use]
    pub fn row_timeout(&self) -> Duration {
        Duration::from_secs(self.row_timeout_secs)
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse::<usize>().ok())
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Multiplier: {}", self.multiplier)?;
        writeln!(f, "  Confidence Level: {}", self.confidence_level)?;
        writeln!(f, "  Crosswalk Release: {}", self.crosswalk_release)?;
        if self.target_la_codes.is_empty() {
            writeln!(f, "  Target Authorities: all")?;
        } else {
            writeln!(f, "  Target Authorities: {}", self.target_la_codes.join(", "))?;
        }
        writeln!(f, "  As Of: {}", self.as_of_date())?;
        writeln!(f, "  Max Concurrent Rows: {}", self.max_concurrent_rows)?;
        writeln!(f, "  Row Timeout: {}s", self.row_timeout_secs)?;
        Ok(())
    }
}
