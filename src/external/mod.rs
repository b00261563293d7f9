//! Import of externally computed indicator files
//!
//! Every `.csv` file in a folder is read, its numeric columns are cleaned
//! and the rows are appended to the sink's staging table. Loaded files move
//! to a `loaded/` subfolder. A file that fails to parse is logged and left
//! in place; the remaining files are still imported.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use itertools::Itertools;
use log::{error, info};
use serde::Deserialize;

use crate::error::util::{ensure_directory, validate_directory};
use crate::error::{IndicatorError, Result};
use crate::models::ExternalIndicatorRecord;
use crate::source::RateSink;

/// Subfolder that receives files once they are loaded
pub const LOADED_DIR: &str = "loaded";

/// Text values that stand for a missing number
pub const NULL_TOKENS: [&str; 8] = ["Inf", "-Inf", "NA", "Null", "NULL", "Nan", "NaN", ""];

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default, alias = "", alias = "Unnamed: 0", alias = "ValueID", alias = "ID")]
    row_id: Option<String>,
    #[serde(default, alias = "IndicatorID")]
    indicator_id: Option<String>,
    #[serde(default, alias = "TimePeriod")]
    time_period: Option<String>,
    #[serde(default, alias = "AggregationType")]
    aggregation_type: Option<String>,
    #[serde(default, alias = "AggregationLabel")]
    aggregation_label: Option<String>,
    #[serde(default, alias = "Gender")]
    gender: Option<String>,
    #[serde(default, alias = "AgeGroup")]
    age_group: Option<String>,
    #[serde(default, alias = "Ethnicity")]
    ethnicity: Option<String>,
    #[serde(default, alias = "IMD", alias = "IMDQuintile")]
    imd_quintile: Option<String>,
    #[serde(default, alias = "Numerator")]
    numerator: Option<String>,
    #[serde(default, alias = "Denominator")]
    denominator: Option<String>,
    #[serde(default, rename = "IndicatorValue", alias = "indicator_value")]
    indicator_value: Option<String>,
    #[serde(default, rename = "lowerCI95", alias = "lower_ci95")]
    lower_ci95: Option<String>,
    #[serde(default, rename = "upperCI95", alias = "upper_ci95")]
    upper_ci95: Option<String>,
}

/// Parse a numeric cell, turning the null tokens into `None`
pub fn clean_numeric(value: Option<&str>, column: &str) -> Result<Option<f64>> {
    let Some(text) = value.map(str::trim) else {
        return Ok(None);
    };
    if NULL_TOKENS.contains(&text) {
        return Ok(None);
    }
    let parsed: f64 = text
        .parse()
        .map_err(|_| IndicatorError::Parse(format!("{column}: '{text}' is not a number")))?;
    Ok(parsed.is_finite().then_some(parsed))
}

/// Read one external indicator file
pub fn read_external_file(path: &Path) -> Result<Vec<ExternalIndicatorRecord>> {
    let source_file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<RawRow>().enumerate() {
        let raw = result?;
        let numeric = |value: &Option<String>, column: &str| {
            clean_numeric(value.as_deref(), column)
                .map_err(|e| IndicatorError::Parse(format!("{source_file} row {}: {e}", line + 1)))
        };
        records.push(ExternalIndicatorRecord {
            numerator: numeric(&raw.numerator, "numerator")?,
            denominator: numeric(&raw.denominator, "denominator")?,
            indicator_value: numeric(&raw.indicator_value, "IndicatorValue")?,
            lower_ci95: numeric(&raw.lower_ci95, "lowerCI95")?,
            upper_ci95: numeric(&raw.upper_ci95, "upperCI95")?,
            source_file: source_file.clone(),
            row_id: raw.row_id,
            indicator_id: raw.indicator_id,
            time_period: raw.time_period,
            aggregation_type: raw.aggregation_type,
            aggregation_label: raw.aggregation_label,
            gender: raw.gender,
            age_group: raw.age_group,
            ethnicity: raw.ethnicity,
            imd_quintile: raw.imd_quintile,
        });
    }
    Ok(records)
}

/// Counts from one import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files_loaded: usize,
    pub files_failed: usize,
    pub rows_loaded: usize,
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| IndicatorError::io(dir, e))?;
    Ok(entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .sorted()
        .collect_vec())
}

/// Import every CSV file in `dir` into the sink's staging table
///
/// Sink failures abort the import. Parse failures only skip the file.
pub fn import_directory(dir: &Path, sink: &dyn RateSink) -> Result<ImportSummary> {
    validate_directory(dir, "external indicator folder")?;
    let loaded_dir = dir.join(LOADED_DIR);
    let mut summary = ImportSummary::default();

    for path in csv_files(dir)? {
        let records = match read_external_file(&path) {
            Ok(records) => records,
            Err(e) => {
                error!("Skipping external file {}: {e}", path.display());
                summary.files_failed += 1;
                continue;
            }
        };
        sink.append_external(&records)?;

        ensure_directory(&loaded_dir)?;
        let target = loaded_dir.join(path.file_name().unwrap_or_default());
        fs::rename(&path, &target).map_err(|e| IndicatorError::io(&path, e))?;

        info!("Loaded {} rows from {}", records.len(), path.display());
        summary.files_loaded += 1;
        summary.rows_loaded += records.len();
    }

    info!(
        "External import: {} files loaded, {} failed, {} rows",
        summary.files_loaded, summary.files_failed, summary.rows_loaded
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySink;

    #[test]
    fn test_null_tokens_cleaned() {
        for token in NULL_TOKENS {
            assert_eq!(clean_numeric(Some(token), "numerator").unwrap(), None);
        }
        assert_eq!(clean_numeric(None, "numerator").unwrap(), None);
        assert_eq!(clean_numeric(Some(" 12.5 "), "numerator").unwrap(), Some(12.5));
        assert_eq!(clean_numeric(Some("inf"), "numerator").unwrap(), None);
        assert!(clean_numeric(Some("twelve"), "numerator").is_err());
    }

    #[test]
    fn test_header_aliases_and_cleaning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obesity.csv");
        fs::write(
            &path,
            "ValueID,IndicatorID,numerator,denominator,IndicatorValue,lowerCI95,upperCI95\n\
             7,101,12,400,3000,Inf,NA\n\
             8,101,,NaN,-Inf,1.5,NULL\n",
        )
        .unwrap();

        let records = read_external_file(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_id.as_deref(), Some("7"));
        assert_eq!(records[0].source_file, "obesity.csv");
        assert_eq!(records[0].numerator, Some(12.0));
        assert_eq!(records[0].lower_ci95, None);
        assert_eq!(records[0].upper_ci95, None);
        assert_eq!(records[1].numerator, None);
        assert_eq!(records[1].denominator, None);
        assert_eq!(records[1].indicator_value, None);
        assert_eq!(records[1].lower_ci95, Some(1.5));
    }

    #[test]
    fn test_bad_file_does_not_stop_import() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a_good.csv"),
            "ID,numerator\n1,5\n2,Null\n",
        )
        .unwrap();
        fs::write(dir.path().join("b_bad.csv"), "ID,numerator\n1,lots\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sink = InMemorySink::new();
        let summary = import_directory(dir.path(), &sink).unwrap();

        assert_eq!(summary.files_loaded, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(sink.external().len(), 2);
        assert!(dir.path().join(LOADED_DIR).join("a_good.csv").exists());
        assert!(dir.path().join("b_bad.csv").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
