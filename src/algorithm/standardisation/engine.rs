//! Age-standardisation across geographies and strata
//!
//! Numerator and denominator counts are rolled up to every geographic level
//! and stratification, joined per age band, and turned into directly
//! standardised rates. Every expected combination of geography, ethnic group
//! and deprivation quintile gets a row, including ones with no population.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::algorithm::denominator::DenominatorSet;
use crate::algorithm::dimensions::demographic_label;
use crate::algorithm::numerator::NumeratorSet;
use crate::algorithm::rolling::CountKey;
use crate::algorithm::standardisation::dsr::{BandObservation, directly_standardised_rate};
use crate::lookup::{DeprivationLookup, EthnicityMapping, GeographyCrosswalk};
use crate::models::types::AGE_BAND_COUNT;
use crate::models::{
    AgeBand, Gender, GeographyLevel, ImdQuintile, Period, QualityFlag, RateRecord,
    Stratification, WindowLength,
};

/// Counts below this are flagged as small numbers
pub const SMALL_NUMBER_THRESHOLD: f64 = 10.0;

/// Fixed inputs of the standardisation step
#[derive(Debug, Clone)]
pub struct StandardisationSettings {
    pub multiplier: f64,
    pub z: f64,
    pub whole_population_label: String,
    /// Reference population weight per age band, band 1 first
    pub reference_population: [f64; AGE_BAND_COUNT as usize],
    pub target_las: Vec<String>,
}

/// Labels copied onto every output row of one parameter row
#[derive(Debug, Clone)]
pub struct RowLabels {
    pub indicator_id: i64,
    pub reference_id: Option<i64>,
    pub gender: Gender,
    pub age_group: String,
}

/// Shared lookups the engine needs
#[derive(Debug, Clone, Copy)]
pub struct Lookups<'a> {
    pub crosswalk: &'a GeographyCrosswalk,
    pub ethnicity: &'a EthnicityMapping,
    pub deprivation: &'a DeprivationLookup,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct StratumKey {
    period: Period,
    level: GeographyLevel,
    geography: String,
    stratification: Stratification,
    ethnicity: Option<String>,
    quintile: Option<ImdQuintile>,
}

#[derive(Debug, Clone, Copy, Default)]
struct BandCounts {
    numerator: f64,
    denominator: f64,
    has_denominator: bool,
}

type BandTable = [BandCounts; AGE_BAND_COUNT as usize];

/// One geography at one level, with the quintiles of its wards
#[derive(Debug, Clone, Default)]
struct GeographyEntry {
    name: String,
    quintiles: BTreeSet<ImdQuintile>,
}

/// Geographies in scope, per level
fn expected_geographies(
    settings: &StandardisationSettings,
    lookups: &Lookups<'_>,
) -> BTreeMap<(GeographyLevel, String), GeographyEntry> {
    let targets = lookups.crosswalk.wards_in(&settings.target_las);
    let mut geographies: BTreeMap<(GeographyLevel, String), GeographyEntry> = BTreeMap::new();

    for ward in lookups.crosswalk.wards().filter(|w| targets.contains(w.code.as_str())) {
        let Ok(locality) = lookups.crosswalk.locality(&ward.code) else {
            continue;
        };
        let quintile = lookups.deprivation.quintile(&ward.code);
        let members = [
            (
                GeographyLevel::WholePopulation,
                settings.whole_population_label.clone(),
                settings.whole_population_label.clone(),
            ),
            (GeographyLevel::LocalAuthority, ward.la_code.clone(), ward.la_name.clone()),
            (GeographyLevel::Locality, locality.to_string(), locality.to_string()),
            (GeographyLevel::Ward, ward.code.clone(), ward.name.clone()),
        ];
        for (level, code, name) in members {
            let entry = geographies.entry((level, code)).or_default();
            entry.name = name;
            entry.quintiles.extend(quintile);
        }
    }
    geographies
}

/// Geography code of a count key at a level
fn geography_code<'k>(key: &'k CountKey, level: GeographyLevel, whole: &'k str) -> &'k str {
    match level {
        GeographyLevel::WholePopulation => whole,
        GeographyLevel::LocalAuthority => &key.la_code,
        GeographyLevel::Locality => &key.locality,
        GeographyLevel::Ward => &key.ward_code,
    }
}

/// Add one count row to every stratum it belongs to
fn accumulate(
    strata: &mut FxHashMap<StratumKey, BandTable>,
    key: &CountKey,
    quintile: Option<ImdQuintile>,
    whole: &str,
    mut add: impl FnMut(&mut BandCounts),
) {
    let band_idx = usize::from(key.age_band.number() - 1);
    for level in GeographyLevel::ALL {
        let geography = geography_code(key, level, whole);
        for stratification in Stratification::ALL {
            let ethnicity = if stratification.by_ethnicity() {
                match &key.ethnicity {
                    Some(group) => Some(group.clone()),
                    None => continue,
                }
            } else {
                None
            };
            let quintile = if stratification.by_deprivation() {
                match quintile {
                    Some(q) => Some(q),
                    None => continue,
                }
            } else {
                None
            };
            let stratum = StratumKey {
                period: key.period,
                level,
                geography: geography.to_string(),
                stratification,
                ethnicity,
                quintile,
            };
            let bands = strata
                .entry(stratum)
                .or_insert_with(|| [BandCounts::default(); AGE_BAND_COUNT as usize]);
            add(&mut bands[band_idx]);
        }
    }
}

/// Compute standardised rates for every window, level and stratification
///
/// # Arguments
/// * `numerator` - Event counts of one parameter row
/// * `denominator` - Population counts built for that numerator
/// * `lookups` - Geography, ethnicity and deprivation lookups
/// * `settings` - Multiplier, z value, reference population and target authorities
/// * `labels` - Indicator, gender and age-group labels copied onto each row
///
/// # Returns
/// * `Vec<RateRecord>` - One row per expected stratum, with zero-population strata flagged low
#[must_use]
pub fn standardise(
    numerator: &NumeratorSet,
    denominator: &DenominatorSet,
    lookups: Lookups<'_>,
    settings: &StandardisationSettings,
    labels: &RowLabels,
) -> Vec<RateRecord> {
    let age_bands: Vec<AgeBand> = numerator.age_bands().into_iter().collect();
    let geographies = expected_geographies(settings, &lookups);
    let ethnic_groups = lookups.ethnicity.broad_groups();
    let whole = settings.whole_population_label.as_str();

    let mut strata: FxHashMap<StratumKey, BandTable> = FxHashMap::default();
    let mut periods: BTreeSet<Period> = BTreeSet::new();
    let targets = lookups.crosswalk.wards_in(&settings.target_las);
    let mut out_of_area = 0u64;

    for window in WindowLength::ALL {
        for (key, population) in denominator.window(window) {
            periods.insert(key.period);
            let quintile = lookups.deprivation.quintile(&key.ward_code);
            accumulate(&mut strata, key, quintile, whole, |b| {
                b.denominator += population;
                b.has_denominator = true;
            });
        }
        for (key, count) in numerator.window(window) {
            periods.insert(key.period);
            if !targets.contains(key.ward_code.as_str()) {
                out_of_area += count;
                continue;
            }
            let quintile = lookups.deprivation.quintile(&key.ward_code);
            accumulate(&mut strata, key, quintile, whole, |b| {
                b.numerator += count as f64;
            });
        }
    }

    // Make sure every expected combination is present, even with no data
    for &period in &periods {
        for ((level, code), entry) in &geographies {
            for stratification in Stratification::ALL {
                let ethnicities: Vec<Option<String>> = if stratification.by_ethnicity() {
                    ethnic_groups.iter().cloned().map(Some).collect()
                } else {
                    vec![None]
                };
                let quintiles: Vec<Option<ImdQuintile>> = if stratification.by_deprivation() {
                    entry.quintiles.iter().copied().map(Some).collect()
                } else {
                    vec![None]
                };
                for ethnicity in &ethnicities {
                    for quintile in &quintiles {
                        strata
                            .entry(StratumKey {
                                period,
                                level: *level,
                                geography: code.clone(),
                                stratification,
                                ethnicity: ethnicity.clone(),
                                quintile: *quintile,
                            })
                            .or_insert_with(|| [BandCounts::default(); AGE_BAND_COUNT as usize]);
                    }
                }
            }
        }
    }

    if out_of_area > 0 {
        debug!(
            "Indicator {}: {out_of_area} events outside the target authorities were left out",
            labels.indicator_id
        );
    }

    let mut rows: Vec<(StratumKey, BandTable)> = strata.into_iter().collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let unmatched: f64 = rows
        .iter()
        .filter(|(k, _)| k.stratification == Stratification::Overall && k.level == GeographyLevel::Ward)
        .flat_map(|(_, bands)| bands.iter())
        .filter(|b| !b.has_denominator || b.denominator <= 0.0)
        .map(|b| b.numerator)
        .sum();
    if unmatched > 0.0 {
        debug!(
            "Indicator {}: {unmatched} ward-level events had no matching population and were not counted",
            labels.indicator_id
        );
    }

    let records: Vec<RateRecord> = rows
        .into_par_iter()
        .map(|(stratum, bands)| {
            let name = geographies
                .get(&(stratum.level, stratum.geography.clone()))
                .map_or_else(|| stratum.geography.clone(), |g| g.name.clone());
            rate_record(&stratum, &bands, &age_bands, &name, settings, labels)
        })
        .collect();

    info!(
        "Indicator {} ({}, {}): {} rates across {} periods",
        labels.indicator_id,
        labels.gender,
        labels.age_group,
        records.len(),
        periods.len()
    );
    records
}

fn rate_record(
    stratum: &StratumKey,
    bands: &BandTable,
    age_bands: &[AgeBand],
    geography_name: &str,
    settings: &StandardisationSettings,
    labels: &RowLabels,
) -> RateRecord {
    let observations: Vec<BandObservation> = age_bands
        .iter()
        .map(|band| {
            let idx = usize::from(band.number() - 1);
            let counts = bands[idx];
            BandObservation {
                numerator: if counts.has_denominator { counts.numerator } else { 0.0 },
                denominator: counts.denominator,
                weight: settings.reference_population[idx],
            }
        })
        .collect();

    let (numerator, denominator, value, lower, upper, flag) =
        match directly_standardised_rate(&observations, settings.multiplier, settings.z) {
            Some(est) => {
                let flag = if est.numerator < SMALL_NUMBER_THRESHOLD {
                    QualityFlag::Small
                } else {
                    QualityFlag::Ok
                };
                (est.numerator, est.denominator, est.value, est.lower, est.upper, flag)
            }
            // Zero population: keep the row, forced to 0 over 1
            None => (0.0, 1.0, 0.0, 0.0, 0.0, QualityFlag::Low),
        };

    RateRecord {
        indicator_id: labels.indicator_id,
        reference_id: labels.reference_id,
        time_period: Some(stratum.period.label()),
        window_length: Some(stratum.period.window.into()),
        aggregation_type: Some(stratum.level.as_str().to_string()),
        aggregation_label: Some(geography_name.to_string()),
        gender: labels.gender.to_string(),
        age_group: labels.age_group.clone(),
        ethnicity: stratum.ethnicity.clone(),
        imd_quintile: stratum.quintile.map(ImdQuintile::value),
        demographic_label: Some(demographic_label(
            labels.gender,
            &labels.age_group,
            stratum.ethnicity.as_deref(),
            stratum.quintile,
        )),
        numerator: Some(numerator),
        denominator: Some(denominator),
        indicator_value: Some(value),
        lower_ci95: Some(lower),
        upper_ci95: Some(upper),
        quality_flag: flag,
        valid_from: stratum.period.valid_from(),
        valid_to: stratum.period.valid_to(),
    }
}
