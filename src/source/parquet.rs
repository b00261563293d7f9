//! Data source and sink backed by a directory of Parquet files.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::error::util::{ensure_directory, validate_directory};
use crate::models::{
    CrosswalkRecord, DimensionRecord, EthnicityRecord, EventRecord, ExternalIndicatorRecord,
    ImdScoreRecord, LocalityRecord, ParameterRow, PopulationRecord, RateRecord,
};
use crate::source::{DataSource, RateSink};
use crate::utils::io::{read_records, write_records_atomic};

pub const EVENTS_FILE: &str = "events.parquet";
pub const POPULATION_FILE: &str = "population.parquet";
pub const CROSSWALK_FILE: &str = "crosswalk.parquet";
pub const LOCALITIES_FILE: &str = "localities.parquet";
pub const ETHNICITY_FILE: &str = "ethnicity.parquet";
pub const IMD_FILE: &str = "imd.parquet";
pub const PARAMETERS_FILE: &str = "parameters.parquet";

pub const RATES_FILE: &str = "rates.parquet";
pub const DIMENSIONS_FILE: &str = "dimensions.parquet";
pub const EXTERNAL_FILE: &str = "external_staging.parquet";

/// Input directory holding one Parquet file per table
#[derive(Debug, Clone)]
pub struct ParquetSource {
    dir: PathBuf,
}

impl ParquetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        validate_directory(&dir, "input directory")?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

impl DataSource for ParquetSource {
    fn describe(&self) -> String {
        format!("parquet directory {}", self.dir.display())
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        read_records(&self.path(EVENTS_FILE), "event records")
    }

    fn population(&self) -> Result<Vec<PopulationRecord>> {
        read_records(&self.path(POPULATION_FILE), "population estimates")
    }

    fn crosswalk(&self) -> Result<Vec<CrosswalkRecord>> {
        read_records(&self.path(CROSSWALK_FILE), "geography crosswalk")
    }

    fn localities(&self) -> Result<Vec<LocalityRecord>> {
        read_records(&self.path(LOCALITIES_FILE), "ward localities")
    }

    fn ethnicity(&self) -> Result<Vec<EthnicityRecord>> {
        read_records(&self.path(ETHNICITY_FILE), "ethnicity mapping")
    }

    fn imd_scores(&self) -> Result<Vec<ImdScoreRecord>> {
        read_records(&self.path(IMD_FILE), "ward IMD scores")
    }

    fn parameters(&self) -> Result<Vec<ParameterRow>> {
        read_records(&self.path(PARAMETERS_FILE), "indicator parameters")
    }
}

/// Output directory; each table is one Parquet file replaced atomically
#[derive(Debug, Clone)]
pub struct ParquetSink {
    dir: PathBuf,
}

impl ParquetSink {
    /// Create the sink, making the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_directory(&dir)?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn rates_path(&self) -> PathBuf {
        self.dir.join(RATES_FILE)
    }

    #[must_use]
    pub fn dimensions_path(&self) -> PathBuf {
        self.dir.join(DIMENSIONS_FILE)
    }

    #[must_use]
    pub fn external_path(&self) -> PathBuf {
        self.dir.join(EXTERNAL_FILE)
    }
}

impl RateSink for ParquetSink {
    fn replace_rates(&self, rates: &[RateRecord]) -> Result<()> {
        write_records_atomic(&self.rates_path(), rates)
    }

    fn replace_dimensions(&self, dimensions: &[DimensionRecord]) -> Result<()> {
        write_records_atomic(&self.dimensions_path(), dimensions)
    }

    fn append_external(&self, records: &[ExternalIndicatorRecord]) -> Result<()> {
        let path = self.external_path();
        let mut staged: Vec<ExternalIndicatorRecord> = if path.is_file() {
            read_records(&path, "external staging")?
        } else {
            Vec::new()
        };
        staged.extend_from_slice(records);
        write_records_atomic(&path, &staged)
    }
}
