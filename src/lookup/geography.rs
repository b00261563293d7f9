//! Geographic crosswalk resolution
//!
//! Maps small-area codes to wards and local authorities for a single
//! crosswalk release, and wards to localities.

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{IndicatorError, Result};
use crate::models::{CrosswalkRecord, LocalityRecord};

/// Ward with its parent local authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ward {
    pub code: String,
    pub name: String,
    pub la_code: String,
    pub la_name: String,
}

/// Read-only small area → ward → local authority → locality lookup
#[derive(Debug, Clone, Default)]
pub struct GeographyCrosswalk {
    release: String,
    small_areas: FxHashMap<String, String>,
    wards: FxHashMap<String, Ward>,
    localities: FxHashMap<String, String>,
}

impl GeographyCrosswalk {
    /// Build the lookup from crosswalk rows, keeping only `release`
    ///
    /// Rows from other releases are ignored so that two vintages are never
    /// mixed. A small area mapped to two different wards within the release
    /// is rejected.
    pub fn from_records(
        release: &str,
        crosswalk: &[CrosswalkRecord],
        localities: &[LocalityRecord],
    ) -> Result<Self> {
        let mut small_areas: FxHashMap<String, String> = FxHashMap::default();
        let mut wards: FxHashMap<String, Ward> = FxHashMap::default();
        let mut skipped = 0usize;

        for record in crosswalk {
            if record.release != release {
                skipped += 1;
                continue;
            }
            if let Some(existing) = small_areas.get(&record.small_area_code) {
                if existing != &record.ward_code {
                    return Err(IndicatorError::CrosswalkConflict {
                        release: release.to_string(),
                        small_area: record.small_area_code.clone(),
                        first: existing.clone(),
                        second: record.ward_code.clone(),
                    });
                }
                continue;
            }
            small_areas.insert(record.small_area_code.clone(), record.ward_code.clone());
            wards
                .entry(record.ward_code.clone())
                .or_insert_with(|| Ward {
                    code: record.ward_code.clone(),
                    name: record.ward_name.clone(),
                    la_code: record.la_code.clone(),
                    la_name: record.la_name.clone(),
                });
        }

        if skipped > 0 {
            debug!("Ignored {skipped} crosswalk rows from releases other than {release}");
        }
        if small_areas.is_empty() {
            warn!("Crosswalk release {release} has no rows");
        }

        let localities = localities
            .iter()
            .map(|l| (l.ward_code.clone(), l.locality.clone()))
            .collect();

        Ok(Self {
            release: release.to_string(),
            small_areas,
            wards,
            localities,
        })
    }

    /// Release this lookup was built for
    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Resolve a small-area code to its ward
    pub fn resolve(&self, small_area_code: &str) -> Result<&Ward> {
        self.small_areas
            .get(small_area_code)
            .and_then(|ward_code| self.wards.get(ward_code))
            .ok_or_else(|| IndicatorError::UnmappedGeography(small_area_code.to_string()))
    }

    /// Locality a ward belongs to
    pub fn locality(&self, ward_code: &str) -> Result<&str> {
        self.localities
            .get(ward_code)
            .map(String::as_str)
            .ok_or_else(|| IndicatorError::UnmappedGeography(ward_code.to_string()))
    }

    /// Ward by its code
    #[must_use]
    pub fn ward(&self, ward_code: &str) -> Option<&Ward> {
        self.wards.get(ward_code)
    }

    /// Wards in the given local authorities; an empty list means all of them
    #[must_use]
    pub fn wards_in(&self, la_codes: &[String]) -> FxHashSet<&str> {
        self.wards
            .values()
            .filter(|w| la_codes.is_empty() || la_codes.contains(&w.la_code))
            .map(|w| w.code.as_str())
            .collect()
    }

    /// Iterate over all wards in the release
    pub fn wards(&self) -> impl Iterator<Item = &Ward> {
        self.wards.values()
    }

    /// Number of small areas in the release
    #[must_use]
    pub fn len(&self) -> usize {
        self.small_areas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.small_areas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(release: &str, lsoa: &str, ward: &str, la: &str) -> CrosswalkRecord {
        CrosswalkRecord {
            release: release.to_string(),
            small_area_code: lsoa.to_string(),
            ward_code: ward.to_string(),
            ward_name: format!("{ward} name"),
            la_code: la.to_string(),
            la_name: format!("{la} name"),
        }
    }

    fn locality(ward: &str, name: &str) -> LocalityRecord {
        LocalityRecord {
            ward_code: ward.to_string(),
            locality: name.to_string(),
        }
    }

    #[test]
    fn test_resolve_and_locality() {
        let cw = GeographyCrosswalk::from_records(
            "2022",
            &[row("2022", "A1", "W1", "LA1"), row("2022", "A2", "W2", "LA2")],
            &[locality("W1", "North")],
        )
        .unwrap();

        let ward = cw.resolve("A1").unwrap();
        assert_eq!(ward.code, "W1");
        assert_eq!(ward.la_code, "LA1");
        assert_eq!(cw.locality("W1").unwrap(), "North");
        assert!(matches!(
            cw.locality("W2"),
            Err(IndicatorError::UnmappedGeography(_))
        ));
        assert!(matches!(
            cw.resolve("A9"),
            Err(IndicatorError::UnmappedGeography(_))
        ));
    }

    #[test]
    fn test_other_releases_ignored() {
        let cw = GeographyCrosswalk::from_records(
            "2022",
            &[row("2022", "A1", "W1", "LA1"), row("2018", "A1", "W9", "LA1")],
            &[],
        )
        .unwrap();
        assert_eq!(cw.len(), 1);
        assert_eq!(cw.resolve("A1").unwrap().code, "W1");
    }

    #[test]
    fn test_conflicting_release_rejected() {
        let result = GeographyCrosswalk::from_records(
            "2022",
            &[row("2022", "A1", "W1", "LA1"), row("2022", "A1", "W2", "LA1")],
            &[],
        );
        assert!(matches!(result, Err(IndicatorError::CrosswalkConflict { .. })));
    }

    #[test]
    fn test_wards_in_target_authorities() {
        let cw = GeographyCrosswalk::from_records(
            "2022",
            &[row("2022", "A1", "W1", "LA1"), row("2022", "A2", "W2", "LA2")],
            &[],
        )
        .unwrap();
        let only_la1 = cw.wards_in(&["LA1".to_string()]);
        assert!(only_la1.contains("W1"));
        assert!(!only_la1.contains("W2"));
        assert_eq!(cw.wards_in(&[]).len(), 2);
    }
}
