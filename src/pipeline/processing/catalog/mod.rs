//! Entity resolution: turn raw inspection records into deduplicated
//! reference entities plus the per-record drafts the loader links to them.

pub mod keys;

use crate::domain::{Establishment, InspectionResult, Risk, Violation};
use crate::pipeline::processing::normalize::address::{self, AddressComponents};
use crate::pipeline::processing::normalize::{
    clean_coordinate, clean_text, normalize_result, risk_tier, split_violations, truncate_date,
};
use crate::types::InspectionRecord;
use chrono::NaiveDate;
use keys::{EstablishmentKey, ResultKey, RiskKey, ViolationKey};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// Insertion-ordered set of entities keyed by their dedup key. The first
/// value seen for a key wins.
#[derive(Debug)]
pub struct KeyedAccumulator<K, V> {
    index: HashMap<K, usize>,
    items: Vec<V>,
}

impl<K: Eq + Hash, V> Default for KeyedAccumulator<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, V> KeyedAccumulator<K, V> {
    /// Returns true when the key was new.
    pub fn insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.items.len());
        self.items.push(make());
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<V> {
        self.items
    }
}

/// Deduplicated reference entities ready to be written.
#[derive(Debug, Default, Clone)]
pub struct ReferenceSets {
    pub risks: Vec<Risk>,
    pub results: Vec<InspectionResult>,
    pub violations: Vec<Violation>,
    pub establishments: Vec<Establishment>,
}

/// An inspection before its foreign keys are looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectionDraft {
    pub inspection_id: i64,
    pub establishment: EstablishmentKey,
    pub risk: Option<RiskKey>,
    pub result: Option<ResultKey>,
    pub inspection_date: Option<NaiveDate>,
    pub inspection_type: Option<String>,
}

/// One violation observed on one inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationLink {
    pub inspection_id: i64,
    pub violation: ViolationKey,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub records: usize,
    pub address_fallbacks: usize,
    pub unparsed_dates: usize,
    /// Violations repeated within one inspection; only the first is linked
    pub duplicate_links: usize,
}

/// Everything the loader needs from one batch.
#[derive(Debug, Default, Clone)]
pub struct Resolution {
    pub references: ReferenceSets,
    pub inspections: Vec<InspectionDraft>,
    pub links: Vec<ViolationLink>,
    pub stats: ResolutionStats,
}

#[derive(Debug, Default)]
pub struct EntityResolver {
    risks: KeyedAccumulator<RiskKey, Risk>,
    results: KeyedAccumulator<ResultKey, InspectionResult>,
    violations: KeyedAccumulator<ViolationKey, Violation>,
    establishments: KeyedAccumulator<EstablishmentKey, Establishment>,
    inspections: Vec<InspectionDraft>,
    links: Vec<ViolationLink>,
    stats: ResolutionStats,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a whole batch in one call.
    pub fn resolve(records: &[InspectionRecord]) -> Resolution {
        let mut resolver = Self::new();
        for record in records {
            resolver.observe(record);
        }
        resolver.finish()
    }

    pub fn observe(&mut self, record: &InspectionRecord) {
        self.stats.records += 1;

        let risk = record
            .risk
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| RiskKey { risk: r.to_string() });
        if let Some(key) = &risk {
            self.risks.insert_with(key.clone(), || Risk {
                risk_id: risk_tier(&key.risk),
                risk: key.risk.clone(),
            });
        }

        let result = record
            .results
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(normalize_result);
        if let Some(key) = &result {
            self.results.insert_with(key.clone(), || InspectionResult {
                result_id: None,
                result: key.result.clone(),
                condition_flag: key.condition_flag,
            });
        }

        if let Some(blob) = record.violations.as_deref() {
            let mut linked = HashSet::new();
            for entry in split_violations(blob) {
                let key = ViolationKey { violation: entry.text };
                self.violations.insert_with(key.clone(), || Violation {
                    violation_id: None,
                    violation: key.violation.clone(),
                });
                if !linked.insert(key.clone()) {
                    self.stats.duplicate_links += 1;
                    debug!(
                        inspection_id = record.inspection_id,
                        violation = %key.violation,
                        "repeated violation dropped"
                    );
                    continue;
                }
                self.links.push(ViolationLink {
                    inspection_id: record.inspection_id,
                    violation: key,
                    comment: entry.comment,
                });
            }
        }

        let establishment = EstablishmentKey {
            dba_name: clean_text(record.dba_name.as_deref()),
            aka_name: clean_text(record.aka_name.as_deref()),
            latitude: clean_coordinate(record.latitude),
            longitude: clean_coordinate(record.longitude),
        };
        if !self.establishments.index.contains_key(&establishment) {
            let components = self.address_for(record);
            self.establishments.insert_with(establishment.clone(), || Establishment {
                establishment_id: None,
                dba_name: establishment.dba_name.clone(),
                aka_name: establishment.aka_name.clone(),
                address: components,
                latitude: establishment.latitude,
                longitude: establishment.longitude,
                facility_type: clean_text(record.facility_type.as_deref()),
            });
        }

        let inspection_date = record.inspection_date.as_deref().and_then(|raw| {
            let date = truncate_date(raw);
            if date.is_none() {
                self.stats.unparsed_dates += 1;
                debug!(inspection_id = record.inspection_id, raw, "unparseable inspection date");
            }
            date
        });

        self.inspections.push(InspectionDraft {
            inspection_id: record.inspection_id,
            establishment,
            risk,
            result,
            inspection_date,
            inspection_type: record
                .inspection_type
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        });
    }

    fn address_for(&mut self, record: &InspectionRecord) -> AddressComponents {
        let line = address::full_address_line(
            record.address.as_deref(),
            record.city.as_deref(),
            record.state.as_deref(),
            record.zip.as_deref(),
        );
        match address::parse(&line) {
            Ok(parsed) => parsed.components(),
            Err(e) => {
                self.stats.address_fallbacks += 1;
                debug!(inspection_id = record.inspection_id, error = %e, "address fell back to blank");
                AddressComponents::blank()
            }
        }
    }

    pub fn finish(self) -> Resolution {
        debug!(
            risks = self.risks.len(),
            results = self.results.len(),
            violations = self.violations.len(),
            establishments = self.establishments.len(),
            links = self.links.len(),
            "resolved reference entities"
        );
        Resolution {
            references: ReferenceSets {
                risks: self.risks.into_items(),
                results: self.results.into_items(),
                violations: self.violations.into_items(),
                establishments: self.establishments.into_items(),
            },
            inspections: self.inspections,
            links: self.links,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str, risk: &str, result: &str, violations: Option<&str>) -> InspectionRecord {
        InspectionRecord {
            dba_name: Some(name.into()),
            aka_name: Some(name.into()),
            license: Some("1234".into()),
            facility_type: Some("Restaurant".into()),
            risk: Some(risk.into()),
            address: Some("1600 W GRAND AVE".into()),
            city: Some("CHICAGO".into()),
            state: Some("IL".into()),
            zip: Some("60622".into()),
            inspection_date: Some("2023-07-11T00:00:00.000".into()),
            inspection_type: Some("Canvass".into()),
            results: Some(result.into()),
            violations: violations.map(str::to_string),
            latitude: Some(41.89),
            longitude: Some(-87.66),
            ..InspectionRecord::new(id)
        }
    }

    #[test]
    fn test_references_are_deduplicated() {
        let records = vec![
            record(1, "CAFE", "Risk 1 (High)", "Pass", Some("1. A - Comments: x | 2. B")),
            record(2, "CAFE", "Risk 1 (High)", "Pass w/ Conditions", Some("2. B - Comments: y")),
            record(3, "DELI", "Risk 2 (Medium)", "Fail", None),
        ];

        let resolution = EntityResolver::resolve(&records);
        let refs = &resolution.references;

        assert_eq!(refs.risks.len(), 2);
        assert_eq!(refs.risks[0], Risk { risk_id: 1, risk: "Risk 1 (High)".into() });
        assert_eq!(refs.risks[1].risk_id, 2);
        assert_eq!(refs.results.len(), 3);
        assert!(refs.results.iter().any(|r| r.result == "Pass" && r.condition_flag));
        assert_eq!(
            refs.violations.iter().map(|v| v.violation.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(refs.establishments.len(), 2);
        assert_eq!(resolution.inspections.len(), 3);
        assert_eq!(resolution.links.len(), 3);
        assert_eq!(resolution.links[2].comment.as_deref(), Some("y"));
    }

    #[test]
    fn test_first_establishment_wins() {
        let mut second = record(2, "CAFE", "Risk 1 (High)", "Pass", None);
        second.facility_type = Some("Bakery".into());
        let records = vec![record(1, "CAFE", "Risk 1 (High)", "Pass", None), second];

        let resolution = EntityResolver::resolve(&records);

        assert_eq!(resolution.references.establishments.len(), 1);
        assert_eq!(resolution.references.establishments[0].facility_type, "Restaurant");
        assert_eq!(
            resolution.inspections[0].establishment,
            resolution.inspections[1].establishment
        );
    }

    #[test]
    fn test_zero_coordinates_share_an_establishment_with_missing_ones() {
        let mut a = record(1, "CART", "Risk 3 (Low)", "Pass", None);
        a.latitude = Some(0.0);
        a.longitude = Some(0.0);
        let mut b = record(2, "CART", "Risk 3 (Low)", "Pass", None);
        b.latitude = None;
        b.longitude = None;

        let resolution = EntityResolver::resolve(&[a, b]);

        assert_eq!(resolution.references.establishments.len(), 1);
        assert_eq!(resolution.references.establishments[0].latitude, None);
    }

    #[test]
    fn test_missing_fields_leave_drafts_unlinked() {
        let mut bare = InspectionRecord::new(9);
        bare.inspection_date = Some("not a date".into());

        let resolution = EntityResolver::resolve(&[bare]);
        let draft = &resolution.inspections[0];

        assert!(draft.risk.is_none());
        assert!(draft.result.is_none());
        assert!(draft.inspection_date.is_none());
        assert!(resolution.references.risks.is_empty());
        assert_eq!(resolution.stats.unparsed_dates, 1);
        assert_eq!(resolution.stats.address_fallbacks, 1);
    }

    #[test]
    fn test_repeated_violation_keeps_first_comment() {
        let records = vec![record(
            1,
            "CAFE",
            "Risk 1 (High)",
            "Fail",
            Some("1. A - Comments: first | 1. A - Comments: second | 2. B"),
        )];

        let resolution = EntityResolver::resolve(&records);

        assert_eq!(resolution.links.len(), 2);
        assert_eq!(resolution.links[0].comment.as_deref(), Some("first"));
        assert_eq!(resolution.stats.duplicate_links, 1);
        assert_eq!(resolution.references.violations.len(), 2);
    }

    #[test]
    fn test_address_components_come_from_parser() {
        let resolution = EntityResolver::resolve(&[record(1, "CAFE", "Risk 1 (High)", "Pass", None)]);
        let address = &resolution.references.establishments[0].address;

        assert_eq!(address.number, "1600");
        assert_eq!(address.direction, "W");
        assert_eq!(address.zip, "60622");
    }
}
