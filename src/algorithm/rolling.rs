//! Rolling-window aggregation
//!
//! Re-expresses single-year counts as overlapping 3-year and 5-year windows.
//! Window boundaries are anchored at the earliest fiscal year of the
//! indicator, so they stay put across reruns as long as that year does.

use std::hash::Hash;
use std::ops::AddAssign;

use rustc_hash::FxHashMap;

use crate::models::{AgeBand, Period, WindowLength};

/// Keyed counts; one entry per distinct key
pub type CountTable<K, V> = FxHashMap<K, V>;

/// A count key that carries a reporting period
pub trait PeriodKey: Clone + Eq + Hash {
    fn period(&self) -> Period;

    /// Same key with the period replaced
    #[must_use]
    fn with_period(&self, period: Period) -> Self;
}

/// Key shared by the numerator and denominator tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountKey {
    pub period: Period,
    pub la_code: String,
    pub ward_code: String,
    pub locality: String,
    /// Broad ethnic group; `None` when the source code did not map
    pub ethnicity: Option<String>,
    pub age_band: AgeBand,
}

impl PeriodKey for CountKey {
    fn period(&self) -> Period {
        self.period
    }

    fn with_period(&self, period: Period) -> Self {
        Self {
            period,
            ..self.clone()
        }
    }
}

/// First fiscal year of the window of length `window` that contains `start_year`
#[must_use]
pub fn window_start(start_year: i32, min_start: i32, window: WindowLength) -> i32 {
    let offset = start_year - min_start;
    match window {
        WindowLength::One => start_year,
        WindowLength::Three => start_year - offset.rem_euclid(3),
        WindowLength::Five => min_start + 5 * offset.div_euclid(5),
    }
}

/// Add 3-year and 5-year rows to a table of 1-year rows
///
/// Existing 1-year rows are kept unchanged. Rows already tagged with a longer
/// window are ignored as inputs, so applying this twice gives the same table.
#[must_use]
pub fn roll_windows<K, V>(table: CountTable<K, V>, min_start: i32) -> CountTable<K, V>
where
    K: PeriodKey,
    V: Copy + Default + AddAssign,
{
    let mut rolled: CountTable<K, V> = FxHashMap::default();

    for (key, value) in &table {
        let period = key.period();
        if period.window != WindowLength::One {
            continue;
        }
        for window in [WindowLength::Three, WindowLength::Five] {
            let start = window_start(period.start_year, min_start, window);
            let windowed = key.with_period(Period::new(start, window));
            *rolled.entry(windowed).or_default() += *value;
        }
    }

    let mut result: CountTable<K, V> = table
        .into_iter()
        .filter(|(key, _)| key.period().window == WindowLength::One)
        .collect();
    result.extend(rolled);
    result
}
