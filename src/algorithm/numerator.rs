//! Numerator aggregation
//!
//! Turns per-event records into counts per (period, geography, broad
//! ethnicity, age band) for 1-, 3- and 5-year windows.

use std::collections::BTreeSet;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::algorithm::rolling::{CountKey, CountTable, roll_windows};
use crate::error::{IndicatorError, Result};
use crate::lookup::{EthnicityMapping, GeographyCrosswalk};
use crate::models::{AgeBand, EventRecord, FiscalYear, Period, WindowLength};

/// Which events feed one indicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumeratorRequest {
    pub indicator_id: i64,
    pub reference_id: Option<i64>,
    /// Inclusive lower age bound
    pub min_age: Option<i32>,
    /// Inclusive upper age bound
    pub max_age: Option<i32>,
}

impl NumeratorRequest {
    fn matches(&self, event: &EventRecord) -> bool {
        event.indicator_id == self.indicator_id
            && (self.reference_id.is_none() || event.reference_id == self.reference_id)
    }

    /// Known ages outside the bounds are excluded; unknown ages fall through to banding
    fn in_age_range(&self, event: &EventRecord) -> bool {
        match event.age {
            Some(age) => {
                self.min_age.is_none_or(|min| age >= min) && self.max_age.is_none_or(|max| age <= max)
            }
            None => true,
        }
    }
}

/// Record-level outcomes of one aggregation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub matched_events: usize,
    pub outside_age_range: usize,
    pub invalid_ages: usize,
    pub invalid_periods: usize,
    pub unmapped_geographies: usize,
    pub unmapped_ethnicities: usize,
}

/// Aggregated numerator for one indicator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumeratorSet {
    /// Counts for every window length
    pub counts: CountTable<CountKey, u64>,
    /// Earliest fiscal year in the data; anchors the rolling windows
    pub min_start: i32,
    pub report: AggregationReport,
}

impl NumeratorSet {
    /// Age bands with at least one event
    #[must_use]
    pub fn age_bands(&self) -> BTreeSet<AgeBand> {
        self.counts.keys().map(|k| k.age_band).collect()
    }

    /// Fiscal years of the 1-year rows
    #[must_use]
    pub fn fiscal_years(&self) -> BTreeSet<i32> {
        self.counts
            .keys()
            .filter(|k| k.period.window == WindowLength::One)
            .map(|k| k.period.start_year)
            .collect()
    }

    /// Rows for one window length
    pub fn window(&self, window: WindowLength) -> impl Iterator<Item = (&CountKey, u64)> {
        self.counts
            .iter()
            .filter(move |(k, _)| k.period.window == window)
            .map(|(k, v)| (k, *v))
    }

    /// Total events across the 1-year rows
    #[must_use]
    pub fn total(&self) -> u64 {
        self.window(WindowLength::One).map(|(_, v)| v).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Aggregate events for one indicator
///
/// Fails with `NoMatchingIndicator` when no event carries the indicator and
/// reference ids. Records with invalid ages, unparseable fiscal years or
/// unmapped geographies are dropped and counted in the report.
///
/// # Arguments
/// * `events` - Every event record of the run
/// * `request` - Indicator and reference ids plus the optional age bounds
/// * `crosswalk` - Small area to ward resolver for the configured release
/// * `ethnicity` - Raw code to broad group mapping
///
/// # Returns
/// * `Result<NumeratorSet>` - Counts for 1-, 3- and 5-year windows with the drop report
pub fn aggregate_numerator(
    events: &[EventRecord],
    request: &NumeratorRequest,
    crosswalk: &GeographyCrosswalk,
    ethnicity: &EthnicityMapping,
) -> Result<NumeratorSet> {
    let mut report = AggregationReport::default();

    // Sum at the raw key first: (fiscal year, raw ethnicity, small area, band)
    let mut raw: FxHashMap<(FiscalYear, Option<&str>, &str, AgeBand), u64> = FxHashMap::default();
    for event in events.iter().filter(|e| request.matches(e)) {
        report.matched_events += 1;
        if !request.in_age_range(event) {
            report.outside_age_range += 1;
            continue;
        }
        let band = match AgeBand::from_age(event.age) {
            Ok(band) => band,
            Err(e) => {
                debug!("Dropping event in {}: {e}", event.small_area_code);
                report.invalid_ages += 1;
                continue;
            }
        };
        let Ok(year) = event.fiscal_year.parse::<FiscalYear>() else {
            report.invalid_periods += 1;
            continue;
        };
        *raw.entry((
            year,
            event.ethnicity_code.as_deref(),
            event.small_area_code.as_str(),
            band,
        ))
        .or_default() += event.weight();
    }

    if report.matched_events == 0 {
        return Err(IndicatorError::NoMatchingIndicator {
            indicator_id: request.indicator_id,
            reference_id: request.reference_id,
        });
    }

    // Join to broad ethnicity, ward and locality, then re-sum: distinct raw
    // keys can land on the same output key
    let mut counts: CountTable<CountKey, u64> = FxHashMap::default();
    for ((year, raw_ethnicity, small_area, band), count) in raw {
        let ward = match crosswalk.resolve(small_area) {
            Ok(ward) => ward,
            Err(e) => {
                debug!("Dropping {count} events: {e}");
                report.unmapped_geographies += 1;
                continue;
            }
        };
        let locality = match crosswalk.locality(&ward.code) {
            Ok(locality) => locality,
            Err(e) => {
                debug!("Dropping {count} events: {e}");
                report.unmapped_geographies += 1;
                continue;
            }
        };
        let broad = ethnicity.broad_group(raw_ethnicity);
        if broad.is_none() {
            report.unmapped_ethnicities += 1;
        }
        let key = CountKey {
            period: Period::new(year.start_year(), WindowLength::One),
            la_code: ward.la_code.clone(),
            ward_code: ward.code.clone(),
            locality: locality.to_string(),
            ethnicity: broad.map(str::to_string),
            age_band: band,
        };
        *counts.entry(key).or_default() += count;
    }

    if report.invalid_ages > 0 || report.invalid_periods > 0 || report.unmapped_geographies > 0 {
        warn!(
            "Indicator {} (reference {:?}): dropped {} events with invalid ages, {} with invalid fiscal years and {} keys with unmapped geography",
            request.indicator_id,
            request.reference_id,
            report.invalid_ages,
            report.invalid_periods,
            report.unmapped_geographies
        );
    }

    let min_start = counts
        .keys()
        .map(|k| k.period.start_year)
        .min()
        .unwrap_or_default();
    let counts = roll_windows(counts, min_start);

    Ok(NumeratorSet {
        counts,
        min_start,
        report,
    })
}
