//! OLAP derivation: dimension copies and the flagged fact table.

use crate::domain::{FactInspection, FactSource};
use crate::error::Result;
use crate::metrics::LoadMetrics;
use crate::pipeline::storage::Storage;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskFlags {
    pub high: bool,
    pub medium: bool,
    pub low: bool,
    pub all: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultFlags {
    pub pass: bool,
    pub fail: bool,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Indicator flags for a risk label. A missing risk sets none.
pub fn risk_flags(risk: Option<&str>) -> RiskFlags {
    let Some(risk) = risk else {
        return RiskFlags::default();
    };
    RiskFlags {
        high: contains_ignore_case(risk, "High"),
        medium: contains_ignore_case(risk, "Medium"),
        low: contains_ignore_case(risk, "Low"),
        all: contains_ignore_case(risk, "All"),
    }
}

pub fn result_flags(result: Option<&str>) -> ResultFlags {
    let Some(result) = result else {
        return ResultFlags::default();
    };
    ResultFlags {
        pass: contains_ignore_case(result, "Pass"),
        fail: contains_ignore_case(result, "Fail"),
    }
}

pub fn build_fact(source: FactSource) -> FactInspection {
    let risk = risk_flags(source.risk.as_deref());
    let result = result_flags(source.result.as_deref());
    FactInspection {
        inspection_id: source.inspection_id,
        establishment_id: source.establishment_id,
        inspection_date: source.inspection_date,
        inspection_type: source.inspection_type,
        violation: source.violation,
        comment: source.comment,
        risk_id: source.risk_id,
        high_risk: risk.high,
        medium_risk: risk.medium,
        low_risk: risk.low,
        all_risk: risk.all,
        result_id: source.result_id,
        pass: result.pass,
        fail: result.fail,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WarehouseReport {
    pub dimension_rows: usize,
    pub fact_candidates: usize,
    pub fact_rows: usize,
}

pub struct AnalyticalTransformer<'a> {
    storage: &'a dyn Storage,
}

impl<'a> AnalyticalTransformer<'a> {
    pub fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// Copy dimensions, then derive and insert facts. Each step commits on
    /// its own.
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<WarehouseReport> {
        let start = Instant::now();
        let dimension_rows = self.storage.copy_dimensions().await.inspect_err(|_| {
            LoadMetrics::record_write_failure("dimensions");
        })?;
        LoadMetrics::record_write("dimensions", dimension_rows, start.elapsed().as_secs_f64());

        let sources = self.storage.fact_sources().await?;
        let fact_candidates = sources.len();
        let facts: Vec<FactInspection> = sources.into_iter().map(build_fact).collect();

        let start = Instant::now();
        let fact_rows = self.storage.insert_facts(facts).await.inspect_err(|_| {
            LoadMetrics::record_write_failure("fact_inspection");
        })?;
        LoadMetrics::record_write("fact_inspection", fact_rows, start.elapsed().as_secs_f64());

        info!(
            "Warehouse refreshed: {} dimension rows, {} of {} facts inserted",
            dimension_rows, fact_rows, fact_candidates
        );
        Ok(WarehouseReport {
            dimension_rows,
            fact_candidates,
            fact_rows,
        })
    }
}
