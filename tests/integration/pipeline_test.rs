use chrono::NaiveDate;
use indicator_rates::models::{GeographyLevel, QualityFlag};
use indicator_rates::{InMemorySink, PipelineConfig, publish_dimensions, run_pipeline};

use crate::utils::{self, LA_MAIN, parameter};

#[tokio::test]
async fn test_end_to_end_in_memory() {
    let source = utils::source(utils::events(), vec![parameter(1, "Persons", "All ages")]);
    let sink = InMemorySink::new();
    let summary = run_pipeline(&source, &sink, &utils::config(), false)
        .await
        .unwrap();

    let rates = sink.rates();
    assert_eq!(summary.rates_written, rates.len());
    assert_eq!(summary.rows_succeeded, 1);

    let whole = rates
        .iter()
        .find(|r| {
            r.aggregation_type.as_deref() == Some(GeographyLevel::WholePopulation.as_str())
                && r.time_period.as_deref() == Some("2019/22")
                && r.ethnicity.is_none()
                && r.imd_quintile.is_none()
        })
        .unwrap();
    assert_eq!(whole.aggregation_label.as_deref(), Some("Whole population"));
    assert_eq!(whole.numerator, Some(12.0));
    assert_eq!(whole.quality_flag, QualityFlag::Ok);
    assert_eq!(whole.valid_from, NaiveDate::from_ymd_opt(2019, 4, 1));
    assert_eq!(whole.valid_to, NaiveDate::from_ymd_opt(2022, 3, 31));

    // Every authority, locality and ward shows up
    for label in ["Birmingham", "Solihull", "North", "South", "East", "Ward W1", "Ward W3"] {
        assert!(
            rates.iter().any(|r| r.aggregation_label.as_deref() == Some(label)),
            "missing {label}"
        );
    }
}

#[tokio::test]
async fn test_rerun_replaces_identical_table() {
    let source = utils::source(
        utils::events(),
        vec![parameter(1, "Male", "All ages"), parameter(1, "Persons", "All ages")],
    );
    let sink = InMemorySink::new();
    let config = utils::config();

    run_pipeline(&source, &sink, &config, false).await.unwrap();
    let first = sink.rates();
    run_pipeline(&source, &sink, &config, false).await.unwrap();
    let second = sink.rates();

    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_incomplete_periods_are_dropped() {
    let source = utils::source(utils::events(), vec![parameter(1, "Persons", "All ages")]);
    let sink = InMemorySink::new();
    let config = PipelineConfig {
        // 2021/22 ends 31 March 2022
        as_of: NaiveDate::from_ymd_opt(2022, 3, 31),
        ..utils::config()
    };
    let summary = run_pipeline(&source, &sink, &config, false).await.unwrap();
    let rates = sink.rates();

    assert!(summary.incomplete_dropped > 0);
    let cutoff = NaiveDate::from_ymd_opt(2022, 3, 31).unwrap();
    assert!(rates.iter().all(|r| r.valid_to.is_some_and(|d| d < cutoff)));
    assert!(!rates.iter().any(|r| r.time_period.as_deref() == Some("2021/22")));
    assert!(rates.iter().any(|r| r.time_period.as_deref() == Some("2020/21")));
}

#[tokio::test]
async fn test_target_authorities_limit_geographies() {
    let source = utils::source(utils::events(), vec![parameter(1, "Persons", "All ages")]);
    let sink = InMemorySink::new();
    let config = PipelineConfig {
        target_la_codes: vec![LA_MAIN.to_string()],
        ..utils::config()
    };
    run_pipeline(&source, &sink, &config, false).await.unwrap();
    let rates = sink.rates();

    assert!(!rates.iter().any(|r| r.aggregation_label.as_deref() == Some("Solihull")));
    assert!(!rates.iter().any(|r| r.aggregation_label.as_deref() == Some("Ward W3")));

    let whole = rates
        .iter()
        .find(|r| {
            r.aggregation_type.as_deref() == Some(GeographyLevel::WholePopulation.as_str())
                && r.time_period.as_deref() == Some("2019/22")
                && r.ethnicity.is_none()
                && r.imd_quintile.is_none()
        })
        .unwrap();
    // The Solihull event is not counted
    assert_eq!(whole.numerator, Some(11.0));
}

#[tokio::test]
async fn test_only_standardised_rows_run() {
    let mut crude = parameter(1, "Persons", "All ages");
    crude.needs_standardisation = false;
    let mut preset = parameter(1, "Female", "All ages");
    preset.predetermined_denominator = true;

    let source = utils::source(utils::events(), vec![crude, preset]);
    let sink = InMemorySink::new();
    let summary = run_pipeline(&source, &sink, &utils::config(), false)
        .await
        .unwrap();

    assert_eq!(summary.rows_total, 0);
    assert!(sink.rates().is_empty());
}

#[test]
fn test_dimension_catalogue_published() {
    let source = utils::source(
        Vec::new(),
        vec![
            parameter(1, "Persons", "All ages"),
            parameter(2, "Persons", "65+ years"),
            parameter(3, "Male", "All ages"),
        ],
    );
    let sink = InMemorySink::new();
    let written = publish_dimensions(&source, &sink).unwrap();

    let dimensions = sink.dimensions();
    assert_eq!(written, dimensions.len());
    // 3 genders x 2 age groups x (1 + 3 groups) x (1 + 5 quintiles)
    assert_eq!(dimensions.len(), 3 * 2 * 4 * 6);
    assert!(dimensions.iter().any(|d| d.label == "Female: 65+ years: Asian: IMD Quintile5"));
}
