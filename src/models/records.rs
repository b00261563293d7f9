//! Row types read from and written to the data sources
//!
//! Each struct mirrors one table. Fields use plain scalar types so that
//! `serde_arrow` can map them directly onto Arrow columns.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, FieldRef};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::types::{Gender, QualityFlag};
use crate::utils::io::TableRecord;

/// One qualifying death, admission or register entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub indicator_id: i64,
    pub reference_id: Option<i64>,
    pub small_area_code: String,
    pub ethnicity_code: Option<String>,
    pub age: Option<i32>,
    pub fiscal_year: String,
    /// Number of events the row stands for; absent means one
    #[serde(default)]
    pub count: Option<u64>,
}

impl EventRecord {
    #[must_use]
    pub fn weight(&self) -> u64 {
        self.count.unwrap_or(1)
    }
}

/// Ward-level population estimate for one sex, ethnic group and age band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub ward_code: String,
    pub ethnicity_code: Option<String>,
    pub age_band: u8,
    pub gender: String,
    pub population: f64,
}

/// Small area to ward to local authority mapping for one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkRecord {
    pub release: String,
    pub small_area_code: String,
    pub ward_code: String,
    pub ward_name: String,
    pub la_code: String,
    pub la_name: String,
}

/// Ward to locality assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityRecord {
    pub ward_code: String,
    pub locality: String,
}

/// Source ethnicity code to broad group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthnicityRecord {
    pub source_code: String,
    pub category_code: String,
    pub broad_group: String,
}

/// Ward deprivation score for one scoring vintage; higher is more deprived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImdScoreRecord {
    pub ward_code: String,
    pub imd_score: f64,
}

/// A row of the indicator parameter table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub indicator_id: i64,
    pub reference_id: Option<i64>,
    pub gender: String,
    pub age_group: String,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub needs_standardisation: bool,
    pub predetermined_denominator: bool,
}

impl ParameterRow {
    /// Whether this row feeds the standardisation pipeline
    #[must_use]
    pub fn is_standardised(&self) -> bool {
        self.needs_standardisation && !self.predetermined_denominator
    }

    pub fn gender(&self) -> Result<Gender> {
        self.gender.parse()
    }
}

/// One standardised rate in the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub indicator_id: i64,
    pub reference_id: Option<i64>,
    pub time_period: Option<String>,
    pub window_length: Option<u8>,
    pub aggregation_type: Option<String>,
    pub aggregation_label: Option<String>,
    pub gender: String,
    pub age_group: String,
    pub ethnicity: Option<String>,
    pub imd_quintile: Option<u8>,
    /// Catalogue label of the demographic combination
    pub demographic_label: Option<String>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub indicator_value: Option<f64>,
    pub lower_ci95: Option<f64>,
    pub upper_ci95: Option<f64>,
    pub quality_flag: QualityFlag,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl RateRecord {
    /// All-null row standing in for a parameter row that produced nothing
    #[must_use]
    pub fn placeholder(row: &ParameterRow) -> Self {
        Self {
            indicator_id: row.indicator_id,
            reference_id: row.reference_id,
            time_period: None,
            window_length: None,
            aggregation_type: None,
            aggregation_label: None,
            gender: row.gender.clone(),
            age_group: row.age_group.clone(),
            ethnicity: None,
            imd_quintile: None,
            demographic_label: None,
            numerator: None,
            denominator: None,
            indicator_value: None,
            lower_ci95: None,
            upper_ci95: None,
            quality_flag: QualityFlag::Missing,
            valid_from: None,
            valid_to: None,
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.quality_flag == QualityFlag::Missing
    }
}

impl TableRecord for RateRecord {
    /// Validity dates are stored as `Date32`
    fn fields() -> Result<Vec<FieldRef>> {
        let field = |name: &str, data_type: DataType, nullable: bool| {
            Arc::new(Field::new(name, data_type, nullable))
        };
        Ok(vec![
            field("indicator_id", DataType::Int64, false),
            field("reference_id", DataType::Int64, true),
            field("time_period", DataType::Utf8, true),
            field("window_length", DataType::UInt8, true),
            field("aggregation_type", DataType::Utf8, true),
            field("aggregation_label", DataType::Utf8, true),
            field("gender", DataType::Utf8, false),
            field("age_group", DataType::Utf8, false),
            field("ethnicity", DataType::Utf8, true),
            field("imd_quintile", DataType::UInt8, true),
            field("demographic_label", DataType::Utf8, true),
            field("numerator", DataType::Float64, true),
            field("denominator", DataType::Float64, true),
            field("indicator_value", DataType::Float64, true),
            field("lower_ci95", DataType::Float64, true),
            field("upper_ci95", DataType::Float64, true),
            field("quality_flag", DataType::Utf8, false),
            field("valid_from", DataType::Date32, true),
            field("valid_to", DataType::Date32, true),
        ])
    }
}

/// One entry of the demographic dimension catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRecord {
    pub gender: String,
    pub age_group: String,
    pub ethnicity: Option<String>,
    pub imd_quintile: Option<u8>,
    pub family: String,
    pub label: String,
}

/// A row of an externally computed indicator file, staged as loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIndicatorRecord {
    pub source_file: String,
    pub row_id: Option<String>,
    pub indicator_id: Option<String>,
    pub time_period: Option<String>,
    pub aggregation_type: Option<String>,
    pub aggregation_label: Option<String>,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub ethnicity: Option<String>,
    pub imd_quintile: Option<String>,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub indicator_value: Option<f64>,
    pub lower_ci95: Option<f64>,
    pub upper_ci95: Option<f64>,
}

impl TableRecord for EventRecord {}
impl TableRecord for PopulationRecord {}
impl TableRecord for CrosswalkRecord {}
impl TableRecord for LocalityRecord {}
impl TableRecord for EthnicityRecord {}
impl TableRecord for ImdScoreRecord {}
impl TableRecord for ParameterRow {}
impl TableRecord for DimensionRecord {}
impl TableRecord for ExternalIndicatorRecord {}
