use indicator_rates::algorithm::{NumeratorRequest, aggregate_numerator, collect_rates, run_batch};
use indicator_rates::algorithm::batch::BatchOptions;
use indicator_rates::lookup::{EthnicityMapping, GeographyCrosswalk};
use indicator_rates::models::{AgeBand, GeographyLevel, QualityFlag, WindowLength};
use indicator_rates::{IndicatorError, InMemorySink, ReferenceData, run_parameter_row, run_pipeline};
use std::sync::Arc;

use crate::utils::{self, RELEASE, event, parameter};

fn lookups() -> (GeographyCrosswalk, EthnicityMapping) {
    let crosswalk =
        GeographyCrosswalk::from_records(RELEASE, &utils::crosswalk(), &utils::localities())
            .unwrap();
    let ethnicity = EthnicityMapping::from_records(&utils::ethnicity());
    (crosswalk, ethnicity)
}

fn request(indicator_id: i64) -> NumeratorRequest {
    NumeratorRequest {
        indicator_id,
        reference_id: Some(1),
        min_age: None,
        max_age: None,
    }
}

/// Ten age-70 events over 2019/20 to 2021/22 in one ward
#[test]
fn test_one_ward_three_year_series() {
    let (crosswalk, ethnicity) = lookups();
    let events: Vec<_> = utils::events()
        .into_iter()
        .filter(|e| e.small_area_code == "A1")
        .collect();
    let set = aggregate_numerator(&events, &request(1), &crosswalk, &ethnicity).unwrap();

    let band_15 = AgeBand::new(15).unwrap();
    let mut one_year: Vec<_> = set
        .window(WindowLength::One)
        .map(|(k, v)| (k.period.start_year, k.ward_code.clone(), k.age_band, v))
        .collect();
    one_year.sort();
    assert_eq!(
        one_year,
        vec![
            (2019, "W1".to_string(), band_15, 4),
            (2020, "W1".to_string(), band_15, 3),
            (2021, "W1".to_string(), band_15, 3),
        ]
    );

    let three_year: Vec<_> = set.window(WindowLength::Three).collect();
    assert_eq!(three_year.len(), 1);
    assert_eq!(three_year[0].0.period.start_year, 2019);
    assert_eq!(three_year[0].0.period.label(), "2019/22");
    assert_eq!(three_year[0].1, 10);
}

/// Population of zero in the event's band yields a low-flagged row, not an error
#[test]
fn test_zero_population_row_is_flagged_low() {
    let mut source = utils::source(vec![event(2, "A3", "A", 70, "2020/21")], Vec::new());
    for row in &mut source.population {
        if row.ward_code == "W2" && row.age_band == 15 {
            row.population = 0.0;
        }
    }
    let config = utils::config();
    let data = ReferenceData::load(&source, &config).unwrap();
    let settings = config.standardisation_settings().unwrap();

    let rates = run_parameter_row(&parameter(2, "Persons", "All ages"), &data, &settings).unwrap();
    let ward = rates
        .iter()
        .find(|r| {
            r.aggregation_type.as_deref() == Some(GeographyLevel::Ward.as_str())
                && r.aggregation_label.as_deref() == Some("Ward W2")
                && r.window_length == Some(1)
                && r.ethnicity.is_none()
                && r.imd_quintile.is_none()
        })
        .unwrap();
    assert_eq!(ward.quality_flag, QualityFlag::Low);
    assert_eq!(ward.numerator, Some(0.0));
    assert_eq!(ward.denominator, Some(1.0));
    assert_eq!(ward.indicator_value, Some(0.0));
}

/// Two raw codes of the same broad group sum into one row
#[test]
fn test_codes_in_same_group_collapse() {
    let (crosswalk, ethnicity) = lookups();
    let events = vec![
        event(3, "A1", "A", 33, "2021/22"),
        event(3, "A2", "B", 34, "2021/22"),
    ];
    let set = aggregate_numerator(&events, &request(3), &crosswalk, &ethnicity).unwrap();

    let rows: Vec<_> = set.window(WindowLength::One).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0.ethnicity.as_deref(), Some("White"));
    assert_eq!(rows[0].1, 2);
}

/// A parameter row without events becomes one placeholder and later rows still run
#[tokio::test]
async fn test_missing_indicator_gives_one_placeholder() {
    let source = utils::source(
        utils::events(),
        vec![parameter(404, "Persons", "All ages"), parameter(1, "Persons", "All ages")],
    );
    let config = utils::config();
    let sink = InMemorySink::new();

    let summary = run_pipeline(&source, &sink, &config, false).await.unwrap();
    let rates = sink.rates();

    let missing: Vec<_> = rates.iter().filter(|r| r.indicator_id == 404).collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].is_placeholder());
    assert_eq!(missing[0].numerator, None);
    assert_eq!(missing[0].indicator_value, None);

    assert!(rates.iter().any(|r| r.indicator_id == 1 && !r.is_placeholder()));
    assert_eq!(summary.rows_total, 2);
    assert_eq!(summary.rows_failed, 1);
    assert_eq!(summary.placeholder_rows, 1);
}

#[test]
fn test_no_matching_indicator_error() {
    let source = utils::source(utils::events(), Vec::new());
    let config = utils::config();
    let data = ReferenceData::load(&source, &config).unwrap();
    let settings = config.standardisation_settings().unwrap();

    let err = run_parameter_row(&parameter(77, "Male", "All ages"), &data, &settings).unwrap_err();
    assert!(matches!(
        err,
        IndicatorError::NoMatchingIndicator {
            indicator_id: 77,
            ..
        }
    ));
}

/// Value is non-negative and inside its interval on every computed row
#[tokio::test]
async fn test_rates_within_confidence_limits() {
    let source = utils::source(
        utils::events(),
        vec![parameter(1, "Persons", "All ages"), parameter(1, "Female", "All ages")],
    );
    let config = utils::config();
    let data = Arc::new(ReferenceData::load(&source, &config).unwrap());
    let settings = Arc::new(config.standardisation_settings().unwrap());
    let options = BatchOptions::from_config(&config, false);

    let outcomes = run_batch(source.parameters.clone(), data, settings, &options).await;
    assert!(outcomes.iter().all(|(_, outcome)| outcome.is_ok()));

    let (rates, _) = collect_rates(outcomes, config.as_of_date());
    let computed: Vec<_> = rates
        .iter()
        .filter(|r| r.quality_flag != QualityFlag::Low && !r.is_placeholder())
        .collect();
    assert!(!computed.is_empty());
    for rate in computed {
        let value = rate.indicator_value.unwrap();
        assert!(value >= 0.0);
        assert!(rate.lower_ci95.unwrap() <= value);
        assert!(value <= rate.upper_ci95.unwrap());
    }
}
