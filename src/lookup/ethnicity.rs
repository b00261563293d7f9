//! Ethnicity code to broad ethnic group mapping

use rustc_hash::FxHashMap;

use crate::models::EthnicityRecord;

/// Lookup from source or census ethnicity codes to broad (ONS) groups
#[derive(Debug, Clone, Default)]
pub struct EthnicityMapping {
    by_code: FxHashMap<String, (String, String)>,
}

impl EthnicityMapping {
    #[must_use]
    pub fn from_records(records: &[EthnicityRecord]) -> Self {
        let by_code = records
            .iter()
            .map(|r| {
                (
                    r.source_code.trim().to_string(),
                    (r.category_code.clone(), r.broad_group.clone()),
                )
            })
            .collect();
        Self { by_code }
    }

    /// Broad group for a raw code; missing or unknown codes map to `None`
    #[must_use]
    pub fn broad_group(&self, code: Option<&str>) -> Option<&str> {
        code.and_then(|c| self.by_code.get(c.trim()))
            .map(|(_, group)| group.as_str())
    }

    /// Standard category code for a raw code
    #[must_use]
    pub fn category(&self, code: &str) -> Option<&str> {
        self.by_code.get(code.trim()).map(|(cat, _)| cat.as_str())
    }

    /// Distinct broad groups, sorted
    #[must_use]
    pub fn broad_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.by_code.values().map(|(_, g)| g.clone()).collect();
        groups.sort();
        groups.dedup();
        groups
    }
}
