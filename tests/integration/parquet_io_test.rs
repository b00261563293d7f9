use std::path::Path;

use indicator_rates::models::{DimensionRecord, ExternalIndicatorRecord, RateRecord};
use indicator_rates::source::parquet::{
    CROSSWALK_FILE, ETHNICITY_FILE, EVENTS_FILE, IMD_FILE, LOCALITIES_FILE, PARAMETERS_FILE,
    POPULATION_FILE,
};
use indicator_rates::utils::io::parquet::staging_path;
use indicator_rates::utils::io::{read_records, write_records_atomic};
use indicator_rates::{
    DataSource, InMemorySource, ParquetSink, ParquetSource, RateSink, import_directory,
    publish_dimensions, run_pipeline,
};

use crate::utils::{self, parameter};

fn write_inputs(dir: &Path, source: &InMemorySource) {
    write_records_atomic(&dir.join(EVENTS_FILE), &source.events).unwrap();
    write_records_atomic(&dir.join(POPULATION_FILE), &source.population).unwrap();
    write_records_atomic(&dir.join(CROSSWALK_FILE), &source.crosswalk).unwrap();
    write_records_atomic(&dir.join(LOCALITIES_FILE), &source.localities).unwrap();
    write_records_atomic(&dir.join(ETHNICITY_FILE), &source.ethnicity).unwrap();
    write_records_atomic(&dir.join(IMD_FILE), &source.imd_scores).unwrap();
    write_records_atomic(&dir.join(PARAMETERS_FILE), &source.parameters).unwrap();
}

#[test]
fn test_parquet_source_reads_every_table() {
    let dir = tempfile::tempdir().unwrap();
    let expected = utils::source(utils::events(), vec![parameter(1, "Persons", "All ages")]);
    write_inputs(dir.path(), &expected);

    let source = ParquetSource::new(dir.path()).unwrap();
    assert_eq!(source.events().unwrap(), expected.events);
    assert_eq!(source.population().unwrap(), expected.population);
    assert_eq!(source.crosswalk().unwrap(), expected.crosswalk);
    assert_eq!(source.localities().unwrap(), expected.localities);
    assert_eq!(source.ethnicity().unwrap(), expected.ethnicity);
    assert_eq!(source.imd_scores().unwrap(), expected.imd_scores);
    assert_eq!(source.parameters().unwrap(), expected.parameters);
}

#[test]
fn test_missing_table_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = ParquetSource::new(dir.path()).unwrap();
    let err = source.events().unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_pipeline_over_parquet_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let tables = utils::source(
        utils::events(),
        vec![parameter(1, "Persons", "All ages"), parameter(9, "Persons", "All ages")],
    );
    write_inputs(input.path(), &tables);

    let source = ParquetSource::new(input.path()).unwrap();
    let sink = ParquetSink::new(output.path()).unwrap();
    let config = utils::config();

    let summary = run_pipeline(&source, &sink, &config, false).await.unwrap();
    let rates: Vec<RateRecord> = read_records(&sink.rates_path(), "rates").unwrap();
    assert_eq!(rates.len(), summary.rates_written);
    assert_eq!(rates.iter().filter(|r| r.is_placeholder()).count(), 1);
    assert!(rates.iter().any(|r| {
        r.time_period.as_deref() == Some("2019/22")
            && r.valid_from == chrono::NaiveDate::from_ymd_opt(2019, 4, 1)
            && r.valid_to == chrono::NaiveDate::from_ymd_opt(2022, 3, 31)
    }));
    assert!(!staging_path(&sink.rates_path()).exists());

    // A second run replaces the table instead of adding to it
    run_pipeline(&source, &sink, &config, false).await.unwrap();
    let again: Vec<RateRecord> = read_records(&sink.rates_path(), "rates").unwrap();
    assert_eq!(again, rates);
}

#[test]
fn test_dimensions_written_to_parquet() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(
        input.path(),
        &utils::source(Vec::new(), vec![parameter(1, "Persons", "All ages")]),
    );

    let source = ParquetSource::new(input.path()).unwrap();
    let sink = ParquetSink::new(output.path()).unwrap();
    let written = publish_dimensions(&source, &sink).unwrap();

    let dimensions: Vec<DimensionRecord> =
        read_records(&sink.dimensions_path(), "dimensions").unwrap();
    assert_eq!(dimensions.len(), written);
    assert!(dimensions.iter().any(|d| d.label == "Persons: All ages"));
}

#[test]
fn test_external_import_stages_rows() {
    let folder = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    std::fs::write(
        folder.path().join("breastfeeding.csv"),
        ",IndicatorID,TimePeriod,numerator,denominator,IndicatorValue,lowerCI95,upperCI95\n\
         0,55,2022/23,120,400,30,Inf,-Inf\n\
         1,55,2023/24,NA,400,Null,,NaN\n",
    )
    .unwrap();

    let sink = ParquetSink::new(output.path()).unwrap();
    let summary = import_directory(folder.path(), &sink).unwrap();
    assert_eq!(summary.files_loaded, 1);
    assert_eq!(summary.rows_loaded, 2);

    let staged: Vec<ExternalIndicatorRecord> =
        read_records(&sink.external_path(), "external staging").unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0].row_id.as_deref(), Some("0"));
    assert_eq!(staged[0].indicator_id.as_deref(), Some("55"));
    assert_eq!(staged[0].indicator_value, Some(30.0));
    assert_eq!(staged[0].lower_ci95, None);
    assert_eq!(staged[0].upper_ci95, None);
    assert_eq!(staged[1].numerator, None);
    assert_eq!(staged[1].indicator_value, None);
    assert!(folder.path().join("loaded").join("breastfeeding.csv").exists());

    // Appending leaves earlier rows in place
    sink.append_external(&staged[..1]).unwrap();
    let staged: Vec<ExternalIndicatorRecord> =
        read_records(&sink.external_path(), "external staging").unwrap();
    assert_eq!(staged.len(), 3);
}
