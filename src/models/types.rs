//! Common type definitions for indicator data
//!
//! Typed values for the dimensions the pipeline aggregates over: age bands,
//! fiscal years and rolling windows, gender, deprivation quintiles and the
//! labels attached to output rows.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{IndicatorError, Result};

/// Number of five-year age bands, the last one open-ended
pub const AGE_BAND_COUNT: u8 = 18;

/// Five-year age band, numbered 1..=18
///
/// Band `n` covers ages `[5(n-1), 5n)`; band 18 covers 85 and over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AgeBand(u8);

impl AgeBand {
    /// Assign the band for an age, rejecting negative or missing ages
    pub fn from_age(age: Option<i32>) -> Result<Self> {
        match age {
            Some(a) if a >= 0 => {
                let band = (a / 5).min(i32::from(AGE_BAND_COUNT) - 1) + 1;
                Ok(Self(band as u8))
            }
            other => Err(IndicatorError::InvalidAgeBand(other)),
        }
    }

    /// Build a band from its 1-based number
    pub fn new(number: u8) -> Result<Self> {
        if (1..=AGE_BAND_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(IndicatorError::Parse(format!("Age band out of range: {number}")))
        }
    }

    /// 1-based band number
    #[must_use]
    pub fn number(self) -> u8 {
        self.0
    }

    /// Lowest age in the band
    #[must_use]
    pub fn lower_age(self) -> u32 {
        u32::from(self.0 - 1) * 5
    }

    /// Highest age in the band, `None` for the open 85+ band
    #[must_use]
    pub fn upper_age(self) -> Option<u32> {
        (self.0 < AGE_BAND_COUNT).then(|| self.lower_age() + 4)
    }

    /// All bands in order
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=AGE_BAND_COUNT).map(Self)
    }
}

impl TryFrom<u8> for AgeBand {
    type Error = IndicatorError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AgeBand> for u8 {
    fn from(band: AgeBand) -> Self {
        band.0
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper_age() {
            Some(upper) => write!(f, "{}-{upper}", self.lower_age()),
            None => write!(f, "{}+", self.lower_age()),
        }
    }
}

/// Fiscal year identified by the calendar year it starts in (April to March)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiscalYear(i32);

impl FiscalYear {
    #[must_use]
    pub fn new(start_year: i32) -> Self {
        Self(start_year)
    }

    /// Calendar year the fiscal year starts in
    #[must_use]
    pub fn start_year(self) -> i32 {
        self.0
    }

    /// Label in the usual "2019/20" form
    #[must_use]
    pub fn label(self) -> String {
        Period::new(self.0, WindowLength::One).label()
    }
}

impl FromStr for FiscalYear {
    type Err = IndicatorError;

    /// Parse a fiscal-year label
    ///
    /// Supported formats:
    /// - "2019/20" or "2019-20"
    /// - "2019/2020"
    /// - "201920"
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || IndicatorError::Parse(format!("Invalid fiscal year label: {s}"));
        if !s.is_ascii() {
            return Err(invalid());
        }
        let (start, end) = match s.find(['/', '-']) {
            Some(idx) => (&s[..idx], &s[idx + 1..]),
            None if s.len() == 6 => s.split_at(4),
            None => return Err(invalid()),
        };
        if start.len() != 4 {
            return Err(invalid());
        }
        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let end_num: i32 = end.parse().map_err(|_| invalid())?;
        let consistent = match end.len() {
            2 => end_num == (start_year + 1) % 100,
            4 => end_num == start_year + 1,
            _ => false,
        };
        if !consistent {
            return Err(invalid());
        }
        Ok(Self(start_year))
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Length of a reporting window in fiscal years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WindowLength {
    One,
    Three,
    Five,
}

impl WindowLength {
    pub const ALL: [Self; 3] = [Self::One, Self::Three, Self::Five];

    #[must_use]
    pub fn years(self) -> i32 {
        match self {
            Self::One => 1,
            Self::Three => 3,
            Self::Five => 5,
        }
    }
}

impl TryFrom<u8> for WindowLength {
    type Error = IndicatorError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            other => Err(IndicatorError::Parse(format!("Unsupported window length: {other}"))),
        }
    }
}

impl From<WindowLength> for u8 {
    fn from(window: WindowLength) -> Self {
        window.years() as u8
    }
}

/// A reporting period: a start fiscal year plus a window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub start_year: i32,
    pub window: WindowLength,
}

impl Period {
    #[must_use]
    pub fn new(start_year: i32, window: WindowLength) -> Self {
        Self { start_year, window }
    }

    /// Label "{start}/{end:02}" where end is the two-digit year the window closes in
    ///
    /// Multi-year windows use the same form as single fiscal years, so the
    /// three years from 2019/20 are "2019/22" rather than "2019/2022".
    #[must_use]
    pub fn label(&self) -> String {
        let end = (self.start_year + self.window.years()).rem_euclid(100);
        format!("{}/{end:02}", self.start_year)
    }

    /// First day of the period (1 April of the start year)
    #[must_use]
    pub fn valid_from(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year, 4, 1)
    }

    /// Last day of the period (31 March of the closing year)
    #[must_use]
    pub fn valid_to(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year + self.window.years(), 3, 31)
    }

    /// Whether the period has fully elapsed before `as_of`
    #[must_use]
    pub fn is_complete(&self, as_of: NaiveDate) -> bool {
        self.valid_to().is_some_and(|end| end < as_of)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Gender breakdown of a parameter row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Persons,
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Self; 3] = [Self::Persons, Self::Male, Self::Female];

    /// Whether a population row of `other` sex counts towards this gender
    #[must_use]
    pub fn includes(self, other: Self) -> bool {
        self == Self::Persons || self == other
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persons => "Persons",
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persons" | "person" | "all" | "p" => Ok(Self::Persons),
            "male" | "males" | "m" | "1" => Ok(Self::Male),
            "female" | "females" | "f" | "2" => Ok(Self::Female),
            _ => Err(IndicatorError::Parse(format!("Unknown gender label: {s}"))),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deprivation quintile; quintile 1 is the most deprived fifth of wards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ImdQuintile(u8);

impl ImdQuintile {
    pub fn new(value: u8) -> Result<Self> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(IndicatorError::Parse(format!("IMD quintile out of range: {value}")))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (1..=5).map(Self)
    }

    /// Display label, e.g. "IMD Quintile1"
    #[must_use]
    pub fn label(self) -> String {
        format!("IMD Quintile{}", self.0)
    }
}

impl TryFrom<u8> for ImdQuintile {
    type Error = IndicatorError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ImdQuintile> for u8 {
    fn from(q: ImdQuintile) -> Self {
        q.0
    }
}

/// Geographic level a rate is reported at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeographyLevel {
    WholePopulation,
    LocalAuthority,
    Locality,
    Ward,
}

impl GeographyLevel {
    pub const ALL: [Self; 4] = [
        Self::WholePopulation,
        Self::LocalAuthority,
        Self::Locality,
        Self::Ward,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WholePopulation => "Whole population",
            Self::LocalAuthority => "Local authority",
            Self::Locality => "Locality",
            Self::Ward => "Ward",
        }
    }
}

/// How a geography's rates are stratified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stratification {
    Overall,
    Ethnicity,
    Deprivation,
    EthnicityDeprivation,
}

impl Stratification {
    pub const ALL: [Self; 4] = [
        Self::Overall,
        Self::Ethnicity,
        Self::Deprivation,
        Self::EthnicityDeprivation,
    ];

    #[must_use]
    pub fn by_ethnicity(self) -> bool {
        matches!(self, Self::Ethnicity | Self::EthnicityDeprivation)
    }

    #[must_use]
    pub fn by_deprivation(self) -> bool {
        matches!(self, Self::Deprivation | Self::EthnicityDeprivation)
    }
}

/// Data-quality flag attached to each rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityFlag {
    Ok,
    /// Numerator below the small-number threshold; value still computed
    Small,
    /// Zero denominator; numerator and denominator forced to 0 and 1
    Low,
    /// Placeholder row for a failed parameter row
    Missing,
}
