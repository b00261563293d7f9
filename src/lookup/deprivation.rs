//! Ward deprivation quintiles
//!
//! Quintile 1 is the most deprived fifth of wards and quintile 5 the least
//! deprived. Wards are ranked by descending IMD score and split into five
//! groups of equal size, with the first groups taking any remainder.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{ImdQuintile, ImdScoreRecord};

/// Per-ward deprivation quintile for one scoring vintage
#[derive(Debug, Clone, Default)]
pub struct DeprivationLookup {
    quintiles: FxHashMap<String, ImdQuintile>,
}

impl DeprivationLookup {
    #[must_use]
    pub fn from_scores(scores: &[ImdScoreRecord]) -> Self {
        let mut ranked: Vec<&ImdScoreRecord> = scores
            .iter()
            .filter(|s| s.imd_score.is_finite())
            .collect();
        ranked.sort_by(|a, b| {
            b.imd_score
                .total_cmp(&a.imd_score)
                .then_with(|| a.ward_code.cmp(&b.ward_code))
        });
        // First (highest) score per ward wins
        let mut seen = FxHashSet::default();
        ranked.retain(|s| seen.insert(s.ward_code.clone()));

        let n = ranked.len();
        let base = n / 5;
        let remainder = n % 5;
        let mut quintiles = FxHashMap::default();
        let mut iter = ranked.into_iter();
        for (group, quintile) in ImdQuintile::all().enumerate() {
            let size = base + usize::from(group < remainder);
            for score in iter.by_ref().take(size) {
                quintiles.insert(score.ward_code.clone(), quintile);
            }
        }

        Self { quintiles }
    }

    /// Quintile for a ward, `None` when the ward has no score
    #[must_use]
    pub fn quintile(&self, ward_code: &str) -> Option<ImdQuintile> {
        self.quintiles.get(ward_code).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.quintiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quintiles.is_empty()
    }
}
