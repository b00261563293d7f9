//! Denominator construction
//!
//! Builds population totals keyed exactly like the numerator so the two can
//! be joined. Population estimates do not vary by year here, so each total
//! is repeated for every fiscal year the numerator covers.

use std::collections::BTreeSet;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::algorithm::rolling::{CountKey, CountTable, roll_windows};
use crate::error::Result;
use crate::lookup::{DeprivationLookup, EthnicityMapping, GeographyCrosswalk};
use crate::models::{AgeBand, Gender, Period, PopulationRecord, WindowLength};

/// What the denominator must cover; derived from a numerator set
#[derive(Debug, Clone)]
pub struct DenominatorRequest<'a> {
    pub age_bands: &'a BTreeSet<AgeBand>,
    pub fiscal_years: &'a BTreeSet<i32>,
    pub min_start: i32,
    pub gender: Gender,
    /// Local authorities in scope; empty means every authority in the crosswalk
    pub target_las: &'a [String],
}

/// Population totals for every window length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenominatorSet {
    pub counts: CountTable<CountKey, f64>,
}

impl DenominatorSet {
    pub fn window(&self, window: WindowLength) -> impl Iterator<Item = (&CountKey, f64)> {
        self.counts
            .iter()
            .filter(move |(k, _)| k.period.window == window)
            .map(|(k, v)| (k, *v))
    }
}

/// Build the denominator for one numerator
///
/// Population rows outside the requested bands, gender or target wards are
/// skipped, as are rows whose ethnicity has no broad group.
///
/// # Arguments
/// * `population` - Population estimates by ward, ethnicity, band and sex
/// * `request` - Bands, fiscal years and scope taken from the numerator
/// * `crosswalk` - Ward, authority and locality lookup
/// * `ethnicity` - Raw code to broad group mapping
/// * `deprivation` - Ward quintiles, used to report wards without a score
///
/// # Returns
/// * `Result<DenominatorSet>` - Population totals keyed like the numerator, for every window
pub fn build_denominator(
    population: &[PopulationRecord],
    request: &DenominatorRequest<'_>,
    crosswalk: &GeographyCrosswalk,
    ethnicity: &EthnicityMapping,
    deprivation: &DeprivationLookup,
) -> Result<DenominatorSet> {
    let target_wards = crosswalk.wards_in(request.target_las);

    let mut skipped_rows = 0usize;
    let mut unmapped_ethnicity = 0usize;
    let mut by_ward: FxHashMap<(&str, &str, AgeBand), f64> = FxHashMap::default();
    for row in population {
        let Ok(band) = AgeBand::new(row.age_band) else {
            skipped_rows += 1;
            continue;
        };
        if !request.age_bands.contains(&band) {
            continue;
        }
        match row.gender.parse::<Gender>() {
            Ok(gender) if request.gender.includes(gender) => {}
            Ok(_) => continue,
            Err(_) => {
                skipped_rows += 1;
                continue;
            }
        }
        if !target_wards.contains(row.ward_code.as_str()) {
            continue;
        }
        let Some(group) = ethnicity.broad_group(row.ethnicity_code.as_deref()) else {
            unmapped_ethnicity += 1;
            continue;
        };
        *by_ward.entry((row.ward_code.as_str(), group, band)).or_default() += row.population;
    }

    if skipped_rows > 0 {
        warn!("Skipped {skipped_rows} population rows with unreadable band or gender");
    }
    if unmapped_ethnicity > 0 {
        debug!("Dropped {unmapped_ethnicity} population rows with no broad ethnic group");
    }

    let mut missing_quintile = BTreeSet::new();
    let mut counts: CountTable<CountKey, f64> = FxHashMap::default();
    for ((ward_code, group, band), total) in by_ward {
        let Some(ward) = crosswalk.ward(ward_code) else {
            continue;
        };
        let Ok(locality) = crosswalk.locality(ward_code) else {
            debug!("Ward {ward_code} has no locality; population excluded");
            continue;
        };
        if deprivation.quintile(ward_code).is_none() {
            missing_quintile.insert(ward_code);
        }
        for &year in request.fiscal_years {
            let key = CountKey {
                period: Period::new(year, WindowLength::One),
                la_code: ward.la_code.clone(),
                ward_code: ward.code.clone(),
                locality: locality.to_string(),
                ethnicity: Some(group.to_string()),
                age_band: band,
            };
            *counts.entry(key).or_default() += total;
        }
    }

    if !missing_quintile.is_empty() {
        warn!(
            "{} wards have no deprivation score and are left out of deprivation strata",
            missing_quintile.len()
        );
    }

    Ok(DenominatorSet {
        counts: roll_windows(counts, request.min_start),
    })
}
