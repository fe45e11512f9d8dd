//! Relational load: reference tables first, then inspections and their
//! violation links with surrogate keys resolved from what was persisted.

use crate::domain::{Inspection, InspectionViolation};
use crate::error::{PipelineError, Result};
use crate::metrics::LoadMetrics;
use crate::pipeline::processing::catalog::{ReferenceSets, Resolution};
use crate::pipeline::storage::Storage;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Rows actually inserted per reference table (ignored duplicates excluded).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceWriteReport {
    pub risks: usize,
    pub results: usize,
    pub violations: usize,
    pub establishments: usize,
}

/// Foreign keys that could not be resolved, by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub establishment: usize,
    pub risk: usize,
    pub result: usize,
    pub violation: usize,
}

impl ResolutionReport {
    pub fn total(&self) -> usize {
        self.establishment + self.risk + self.result + self.violation
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FactWriteReport {
    pub inspections: usize,
    pub inspection_violations: usize,
    pub misses: ResolutionReport,
}

pub struct RelationalLoader<'a> {
    storage: &'a dyn Storage,
}

async fn timed_write<F>(table: &'static str, write: F) -> Result<usize>
where
    F: Future<Output = Result<usize>>,
{
    let start = Instant::now();
    match write.await {
        Ok(n) => {
            LoadMetrics::record_write(table, n, start.elapsed().as_secs_f64());
            Ok(n)
        }
        Err(e) => {
            LoadMetrics::record_write_failure(table);
            error!(table, error = %e, "table write rolled back");
            Err(e)
        }
    }
}

impl<'a> RelationalLoader<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Insert-or-ignore every reference set, one transaction per table.
    ///
    /// All four tables are attempted even when one fails; any failure is
    /// returned as [`PipelineError::ReferenceWrites`] and facts must not be
    /// written afterwards.
    #[instrument(skip_all, fields(
        risks = refs.risks.len(),
        results = refs.results.len(),
        violations = refs.violations.len(),
        establishments = refs.establishments.len()
    ))]
    pub async fn persist_references(&self, refs: &ReferenceSets) -> Result<ReferenceWriteReport> {
        let mut failures = Vec::new();
        let mut report = ReferenceWriteReport::default();

        match timed_write("risk", self.storage.insert_risks(refs.risks.clone())).await {
            Ok(n) => report.risks = n,
            Err(e) => failures.push(e),
        }
        match timed_write("result", self.storage.insert_results(refs.results.clone())).await {
            Ok(n) => report.results = n,
            Err(e) => failures.push(e),
        }
        match timed_write("violation", self.storage.insert_violations(refs.violations.clone())).await {
            Ok(n) => report.violations = n,
            Err(e) => failures.push(e),
        }
        match timed_write(
            "establishment",
            self.storage.insert_establishments(refs.establishments.clone()),
        )
        .await
        {
            Ok(n) => report.establishments = n,
            Err(e) => failures.push(e),
        }

        if !failures.is_empty() {
            return Err(PipelineError::ReferenceWrites(failures));
        }
        info!(
            "Reference tables written: {} risks, {} results, {} violations, {} establishments",
            report.risks, report.results, report.violations, report.establishments
        );
        Ok(report)
    }

    /// Resolve and insert inspections, then their violation links.
    ///
    /// Unresolved establishment, risk or result keys are stored as NULL.
    /// Links whose violation text is not in the store are skipped. Both are
    /// counted in the returned [`ResolutionReport`].
    #[instrument(skip_all, fields(inspections = resolution.inspections.len(), links = resolution.links.len()))]
    pub async fn persist_facts(&self, resolution: &Resolution) -> Result<FactWriteReport> {
        let lookup = self.storage.reference_lookup().await?;
        let mut misses = ResolutionReport::default();

        let inspections: Vec<Inspection> = resolution
            .inspections
            .iter()
            .map(|draft| {
                let establishment_id = lookup.establishments.get(&draft.establishment).copied();
                if establishment_id.is_none() {
                    misses.establishment += 1;
                }
                let risk_id = draft.risk.as_ref().and_then(|key| {
                    let id = lookup.risks.get(&key.risk).copied();
                    if id.is_none() {
                        misses.risk += 1;
                    }
                    id
                });
                let result_id = draft.result.as_ref().and_then(|key| {
                    let id = lookup.results.get(key).copied();
                    if id.is_none() {
                        misses.result += 1;
                    }
                    id
                });
                Inspection {
                    inspection_id: draft.inspection_id,
                    establishment_id,
                    risk_id,
                    inspection_date: draft.inspection_date,
                    inspection_type: draft.inspection_type.clone(),
                    result_id,
                }
            })
            .collect();

        let links: Vec<InspectionViolation> = resolution
            .links
            .iter()
            .filter_map(|link| match lookup.violations.get(&link.violation.violation) {
                Some(&violation_id) => Some(InspectionViolation {
                    inspection_id: link.inspection_id,
                    violation_id,
                    comment: link.comment.clone(),
                }),
                None => {
                    misses.violation += 1;
                    None
                }
            })
            .collect();

        if misses.total() > 0 {
            warn!(
                establishment = misses.establishment,
                risk = misses.risk,
                result = misses.result,
                violation = misses.violation,
                "unresolved foreign keys"
            );
        }
        for (kind, count) in [
            ("establishment", misses.establishment),
            ("risk", misses.risk),
            ("result", misses.result),
            ("violation", misses.violation),
        ] {
            if count > 0 {
                LoadMetrics::record_resolution_miss(kind, count);
            }
        }

        let inspections = timed_write("inspection", self.storage.insert_inspections(inspections)).await?;
        let inspection_violations = timed_write(
            "inspection_violation",
            self.storage.insert_inspection_violations(links),
        )
        .await?;

        info!(
            "Fact tables written: {} inspections, {} inspection violations",
            inspections, inspection_violations
        );
        Ok(FactWriteReport {
            inspections,
            inspection_violations,
            misses,
        })
    }
}
