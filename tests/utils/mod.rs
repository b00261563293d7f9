//! Shared fixtures: two local authorities with three wards between them.

use chrono::NaiveDate;
use indicator_rates::models::{
    CrosswalkRecord, EthnicityRecord, EventRecord, ImdScoreRecord, LocalityRecord, ParameterRow,
    PopulationRecord,
};
use indicator_rates::{InMemorySource, PipelineConfig};

pub const RELEASE: &str = "LSOA21_WD22";
pub const LA_MAIN: &str = "E08000025";
pub const LA_OTHER: &str = "E08000029";

fn crosswalk_row(area: &str, ward: &str, la_code: &str, la_name: &str) -> CrosswalkRecord {
    CrosswalkRecord {
        release: RELEASE.to_string(),
        small_area_code: area.to_string(),
        ward_code: ward.to_string(),
        ward_name: format!("Ward {ward}"),
        la_code: la_code.to_string(),
        la_name: la_name.to_string(),
    }
}

#[must_use]
pub fn crosswalk() -> Vec<CrosswalkRecord> {
    vec![
        crosswalk_row("A1", "W1", LA_MAIN, "Birmingham"),
        crosswalk_row("A2", "W1", LA_MAIN, "Birmingham"),
        crosswalk_row("A3", "W2", LA_MAIN, "Birmingham"),
        crosswalk_row("A4", "W3", LA_OTHER, "Solihull"),
        // Another release must never leak in
        CrosswalkRecord {
            release: "LSOA11_WD18".to_string(),
            ..crosswalk_row("A1", "OLD", LA_MAIN, "Birmingham")
        },
    ]
}

#[must_use]
pub fn localities() -> Vec<LocalityRecord> {
    [("W1", "North"), ("W2", "South"), ("W3", "East")]
        .into_iter()
        .map(|(ward, locality)| LocalityRecord {
            ward_code: ward.to_string(),
            locality: locality.to_string(),
        })
        .collect()
}

#[must_use]
pub fn ethnicity() -> Vec<EthnicityRecord> {
    [
        ("A", "A", "White"),
        ("B", "B", "White"),
        ("H", "H", "Asian"),
        ("M", "M", "Black"),
    ]
    .into_iter()
    .map(|(source, category, group)| EthnicityRecord {
        source_code: source.to_string(),
        category_code: category.to_string(),
        broad_group: group.to_string(),
    })
    .collect()
}

#[must_use]
pub fn imd_scores() -> Vec<ImdScoreRecord> {
    [("W1", 45.0), ("W2", 22.5), ("W3", 8.1)]
        .into_iter()
        .map(|(ward, score)| ImdScoreRecord {
            ward_code: ward.to_string(),
            imd_score: score,
        })
        .collect()
}

#[must_use]
pub fn event(
    indicator_id: i64,
    area: &str,
    ethnicity: &str,
    age: i32,
    fiscal_year: &str,
) -> EventRecord {
    EventRecord {
        indicator_id,
        reference_id: Some(1),
        small_area_code: area.to_string(),
        ethnicity_code: Some(ethnicity.to_string()),
        age: Some(age),
        fiscal_year: fiscal_year.to_string(),
        count: None,
    }
}

/// 100 people per ward, census group, band and sex
#[must_use]
pub fn population() -> Vec<PopulationRecord> {
    let mut rows = Vec::new();
    for ward in ["W1", "W2", "W3"] {
        for code in ["A", "H", "M"] {
            for band in 1..=18u8 {
                for gender in ["Male", "Female"] {
                    rows.push(PopulationRecord {
                        ward_code: ward.to_string(),
                        ethnicity_code: Some(code.to_string()),
                        age_band: band,
                        gender: gender.to_string(),
                        population: 100.0,
                    });
                }
            }
        }
    }
    rows
}

#[must_use]
pub fn parameter(indicator_id: i64, gender: &str, age_group: &str) -> ParameterRow {
    ParameterRow {
        indicator_id,
        reference_id: Some(1),
        gender: gender.to_string(),
        age_group: age_group.to_string(),
        min_age: None,
        max_age: None,
        needs_standardisation: true,
        predetermined_denominator: false,
    }
}

/// Indicator 1: ten people aged 70 in W1 over three years, plus one each in W2 and W3
#[must_use]
pub fn events() -> Vec<EventRecord> {
    let mut events = Vec::new();
    for (fiscal_year, n) in [("2019/20", 4), ("2020/21", 3), ("2021/22", 3)] {
        for _ in 0..n {
            events.push(event(1, "A1", "A", 70, fiscal_year));
        }
    }
    events.push(event(1, "A3", "H", 42, "2020/21"));
    events.push(event(1, "A4", "M", 81, "2021/22"));
    events
}

#[must_use]
pub fn source(events: Vec<EventRecord>, parameters: Vec<ParameterRow>) -> InMemorySource {
    InMemorySource {
        events,
        population: population(),
        crosswalk: crosswalk(),
        localities: localities(),
        ethnicity: ethnicity(),
        imd_scores: imd_scores(),
        parameters,
    }
}

/// Configuration with a fixed as-of date so results do not depend on today
#[must_use]
pub fn config() -> PipelineConfig {
    PipelineConfig {
        as_of: NaiveDate::from_ymd_opt(2024, 4, 1),
        max_concurrent_rows: 2,
        crosswalk_release: RELEASE.to_string(),
        ..PipelineConfig::default()
    }
}
