//! Demographic dimension catalogue
//!
//! Enumerates every gender × age group combination, on its own and crossed
//! with ethnic group, deprivation quintile, or both.

use std::fmt;

use itertools::iproduct;

use crate::models::{DimensionRecord, Gender, ImdQuintile};

/// Separator between label components
pub const LABEL_SEPARATOR: &str = ": ";

/// Which optional dimensions a catalogue entry carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelFamily {
    Baseline,
    Ethnicity,
    Imd,
    EthnicityImd,
}

impl LabelFamily {
    pub const ALL: [Self; 4] = [Self::Baseline, Self::Ethnicity, Self::Imd, Self::EthnicityImd];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "Baseline",
            Self::Ethnicity => "Ethnicity",
            Self::Imd => "IMD",
            Self::EthnicityImd => "Ethnicity and IMD",
        }
    }
}

impl fmt::Display for LabelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display label for a demographic combination
///
/// e.g. "Female: 18+ years: Asian: IMD Quintile1"
#[must_use]
pub fn demographic_label(
    gender: Gender,
    age_group: &str,
    ethnicity: Option<&str>,
    quintile: Option<ImdQuintile>,
) -> String {
    let mut parts = vec![gender.as_str().to_string(), age_group.to_string()];
    parts.extend(ethnicity.map(str::to_string));
    parts.extend(quintile.map(ImdQuintile::label));
    parts.join(LABEL_SEPARATOR)
}

/// Build the full catalogue for the given age groups and broad ethnic groups
#[must_use]
pub fn build_catalogue(age_groups: &[String], ethnic_groups: &[String]) -> Vec<DimensionRecord> {
    let ethnicities: Vec<Option<&str>> = ethnic_groups.iter().map(|e| Some(e.as_str())).collect();
    let quintiles: Vec<Option<ImdQuintile>> = ImdQuintile::all().map(Some).collect();
    let mut records = Vec::new();

    for family in LabelFamily::ALL {
        let family_ethnicities: &[Option<&str>] = match family {
            LabelFamily::Ethnicity | LabelFamily::EthnicityImd => &ethnicities,
            LabelFamily::Baseline | LabelFamily::Imd => &[None],
        };
        let family_quintiles: &[Option<ImdQuintile>] = match family {
            LabelFamily::Imd | LabelFamily::EthnicityImd => &quintiles,
            LabelFamily::Baseline | LabelFamily::Ethnicity => &[None],
        };

        for (gender, age_group, ethnicity, quintile) in iproduct!(
            Gender::ALL,
            age_groups,
            family_ethnicities,
            family_quintiles
        ) {
            records.push(DimensionRecord {
                gender: gender.to_string(),
                age_group: age_group.clone(),
                ethnicity: ethnicity.map(str::to_string),
                imd_quintile: quintile.map(ImdQuintile::value),
                family: family.to_string(),
                label: demographic_label(gender, age_group, *ethnicity, *quintile),
            });
        }
    }

    records
}
