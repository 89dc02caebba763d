//! Active selection shared by the map, the list and the chart.
//!
//! [`FilterModel::matches`] is the only place a record is tested against the
//! selection, so the three views always agree on the active set.

use aqmon_common::{QualityLevel, StationRecord};
use serde::{Deserialize, Serialize};

use super::classifier::classify;

/// Sentinel accepted from callers to mean "no restriction".
pub const ALL: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// `None` selects every region.
    pub region: Option<String>,
    /// `None` selects every quality level.
    pub quality: Option<QualityLevel>,
    /// Case-sensitive substring of the station id; empty matches everything.
    pub id_substring: String,
}

#[derive(Debug, Default)]
pub struct FilterModel {
    state: FilterState,
}

impl FilterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn set_region(&mut self, region: Option<String>) {
        self.state.region = region;
    }

    pub fn set_quality(&mut self, quality: Option<QualityLevel>) {
        self.state.quality = quality;
    }

    pub fn set_id_substring(&mut self, id_substring: impl Into<String>) {
        self.state.id_substring = id_substring.into();
    }

    /// Conjunction of the region, quality and id predicates.
    pub fn matches(&self, record: &StationRecord) -> bool {
        self.matches_with_level(record, classify(record.value))
    }

    /// Same predicate as [`matches`](Self::matches) for callers that already
    /// classified the record.
    pub fn matches_with_level(&self, record: &StationRecord, level: QualityLevel) -> bool {
        let region_ok = self
            .state
            .region
            .as_deref()
            .is_none_or(|r| record.region == r);
        let quality_ok = self.state.quality.is_none_or(|q| level == q);
        let id_ok = record.id.contains(self.state.id_substring.as_str());

        region_ok && quality_ok && id_ok
    }
}

/// Parse a region selector value; `"all"` (any case) and blank mean no
/// restriction.
pub fn parse_region(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a quality selector value; `"all"` and blank mean no restriction.
pub fn parse_quality(raw: &str) -> Result<Option<QualityLevel>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
        Ok(None)
    } else {
        trimmed.parse().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, region: &str, value: Option<f64>) -> StationRecord {
        StationRecord {
            id: id.to_string(),
            name: id.to_string(),
            region: region.to_string(),
            position: None,
            value,
            observed_at: None,
        }
    }

    #[test]
    fn test_default_filter_matches_everything() {
        let model = FilterModel::new();
        assert!(model.matches(&record("x", "Taipei", Some(10.0))));
        assert!(model.matches(&record("y", "unknown", None)));
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let target = record("TW-001", "Taipei", Some(10.0));
        let wrong_region = record("TW-002", "Tainan", Some(10.0));
        let wrong_level = record("TW-003", "Taipei", Some(100.0));
        let wrong_id = record("JP-004", "Taipei", Some(10.0));

        let mut model = FilterModel::new();
        model.set_region(Some("Taipei".into()));
        model.set_quality(Some(QualityLevel::Good));
        model.set_id_substring("TW");

        assert!(model.matches(&target));
        assert!(!model.matches(&wrong_region));
        assert!(!model.matches(&wrong_level));
        assert!(!model.matches(&wrong_id));
    }

    #[test]
    fn test_resetting_one_filter_leaves_the_others() {
        let mut model = FilterModel::new();
        model.set_region(Some("Taipei".into()));
        model.set_quality(Some(QualityLevel::Good));

        model.set_quality(None);
        assert!(model.matches(&record("a", "Taipei", Some(300.0))));
        assert!(!model.matches(&record("b", "Tainan", Some(10.0))));

        model.set_region(None);
        model.set_id_substring("zz");
        assert!(!model.matches(&record("a", "Taipei", Some(10.0))));
        model.set_id_substring("");
        assert!(model.matches(&record("a", "Taipei", Some(10.0))));
    }

    #[test]
    fn test_id_substring_is_case_sensitive() {
        let mut model = FilterModel::new();
        model.set_id_substring("abc");
        assert!(model.matches(&record("xxabcxx", "r", None)));
        assert!(!model.matches(&record("xxABCxx", "r", None)));
    }

    #[test]
    fn test_quality_filter_on_invalid_selects_missing_readings() {
        let mut model = FilterModel::new();
        model.set_quality(Some(QualityLevel::Invalid));
        assert!(model.matches(&record("a", "r", None)));
        assert!(model.matches(&record("b", "r", Some(-1.0))));
        assert!(!model.matches(&record("c", "r", Some(0.0))));
    }

    #[test]
    fn test_parse_selectors() {
        assert_eq!(parse_region("all"), None);
        assert_eq!(parse_region(" ALL "), None);
        assert_eq!(parse_region("Taipei"), Some("Taipei".to_string()));
        assert_eq!(parse_quality("all"), Ok(None));
        assert_eq!(parse_quality("hazardous"), Ok(Some(QualityLevel::Hazardous)));
        assert!(parse_quality("awful").is_err());
    }
}
