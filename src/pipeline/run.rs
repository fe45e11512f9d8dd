//! Per-run state: the accumulated raw batch and the counters every stage
//! reports into.

use crate::app::ports::DateFilter;
use crate::pipeline::export::ExportReport;
use crate::pipeline::ingestion::paginator::PageStats;
use crate::pipeline::loader::{FactWriteReport, ReferenceWriteReport, ResolutionReport};
use crate::pipeline::processing::catalog::ResolutionStats;
use crate::pipeline::warehouse::WarehouseReport;
use crate::types::{InspectionRecord, RejectedRecord, SourcePage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub requests: u32,
    pub pages: u32,
    pub retries: u32,
    pub records_fetched: usize,
    pub rejected_records: usize,
    pub duplicates: usize,
    pub records: usize,
    pub coordinate_fallbacks: usize,
    pub address_fallbacks: usize,
    pub date_fallbacks: usize,
    pub duplicate_links: usize,
    pub misses: ResolutionReport,
    pub references: ReferenceWriteReport,
    pub inspections_written: usize,
    pub inspection_violations_written: usize,
    pub warehouse: WarehouseReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub filter: Option<String>,
    pub counters: RunCounters,
    /// Rows left out of this run, by position and raw id, for reprocessing
    pub rejected: Vec<RejectedRecord>,
    pub export: Option<ExportReport>,
}

pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub filter: Option<DateFilter>,
    pub counters: RunCounters,
    clock: Instant,
    seen: HashSet<i64>,
    records: Vec<InspectionRecord>,
    rejected: Vec<RejectedRecord>,
}

impl PipelineRun {
    pub fn new(filter: Option<DateFilter>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            filter,
            counters: RunCounters::default(),
            clock: Instant::now(),
            seen: HashSet::new(),
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Append a page, dropping records whose `inspection_id` was already
    /// seen in this run and setting aside rows that failed to decode.
    /// Returns how many records were kept.
    pub fn add_page(&mut self, page: SourcePage) -> usize {
        let before = self.records.len();
        self.counters.records_fetched += page.len();
        self.counters.coordinate_fallbacks += page.coordinate_fallbacks;
        for rejected in page.rejected {
            warn!(
                offset = rejected.offset,
                raw_id = ?rejected.raw_id,
                "record rejected: {}",
                rejected.reason
            );
            self.counters.rejected_records += 1;
            self.rejected.push(rejected);
        }
        for record in page.records {
            if self.seen.insert(record.inspection_id) {
                self.records.push(record);
            } else {
                self.counters.duplicates += 1;
                debug!(inspection_id = record.inspection_id, "duplicate record dropped");
            }
        }
        self.counters.records = self.records.len();
        self.records.len() - before
    }

    pub fn records(&self) -> &[InspectionRecord] {
        &self.records
    }

    pub fn record_page_stats(&mut self, stats: PageStats) {
        self.counters.requests = stats.requests;
        self.counters.pages = stats.pages;
        self.counters.retries = stats.retries;
    }

    pub fn record_resolution(&mut self, stats: &ResolutionStats) {
        self.counters.address_fallbacks = stats.address_fallbacks;
        self.counters.date_fallbacks = stats.unparsed_dates;
        self.counters.duplicate_links = stats.duplicate_links;
    }

    pub fn record_facts(&mut self, report: FactWriteReport) {
        self.counters.inspections_written = report.inspections;
        self.counters.inspection_violations_written = report.inspection_violations;
        self.counters.misses = report.misses;
    }

    pub fn finish(self, export: Option<ExportReport>) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed_secs: self.clock.elapsed().as_secs_f64(),
            filter: self.filter.map(|f| f.to_soql()),
            counters: self.counters,
            rejected: self.rejected,
            export,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicates_across_pages_are_dropped() {
        let mut run = PipelineRun::new(None);

        let kept = run.add_page(vec![InspectionRecord::new(1), InspectionRecord::new(2)].into());
        assert_eq!(kept, 2);
        let kept = run.add_page(vec![InspectionRecord::new(2), InspectionRecord::new(3)].into());
        assert_eq!(kept, 1);

        assert_eq!(run.records().len(), 3);
        assert_eq!(run.counters.records_fetched, 4);
        assert_eq!(run.counters.duplicates, 1);
    }

    #[test]
    fn test_summary_serializes() {
        let mut run = PipelineRun::new(None);
        run.add_page(vec![InspectionRecord::new(1)].into());

        let summary = run.finish(None);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["counters"]["records"], 1);
        assert!(json["export"].is_null());
    }

    #[test]
    fn test_rejected_rows_are_kept_for_reprocessing() {
        let mut run = PipelineRun::new(None);
        let page = SourcePage::decode(
            vec![
                json!({ "inspection_id": "1", "latitude": "N/A" }),
                json!({ "inspection_id": "two" }),
            ],
            40,
        );

        let kept = run.add_page(page);
        let summary = run.finish(None);

        assert_eq!(kept, 1);
        assert_eq!(summary.counters.records_fetched, 2);
        assert_eq!(summary.counters.rejected_records, 1);
        assert_eq!(summary.counters.coordinate_fallbacks, 1);
        assert_eq!(summary.rejected[0].offset, 41);
        assert_eq!(summary.rejected[0].raw_id.as_deref(), Some("two"));
    }
}
