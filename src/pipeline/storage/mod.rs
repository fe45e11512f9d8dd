pub mod schema;
pub mod sqlite;

use crate::domain::{
    Establishment, FactInspection, FactSource, Inspection, InspectionResult, InspectionViolation,
    Risk, Violation,
};
use crate::error::Result;
use crate::pipeline::processing::catalog::keys::{EstablishmentKey, ResultKey};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;

pub use sqlite::SqliteStorage;

/// Persisted surrogate ids keyed by each reference entity's dedup key.
#[derive(Debug, Default, Clone)]
pub struct ReferenceLookup {
    pub establishments: HashMap<EstablishmentKey, i64>,
    pub risks: HashMap<String, i64>,
    pub results: HashMap<ResultKey, i64>,
    pub violations: HashMap<String, i64>,
}

/// A flattened view ready for export: header plus stringified rows.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TabularView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportView {
    Oltp,
    Olap,
}

/// Row counts for every table in both schemas.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub risk: u64,
    pub result: u64,
    pub violation: u64,
    pub establishment: u64,
    pub inspection: u64,
    pub inspection_violation: u64,
    pub dim_risk: u64,
    pub dim_result: u64,
    pub dim_establishment: u64,
    pub fact_inspection: u64,
}

/// The relational engine behind the pipeline.
///
/// Every write method is one transaction with insert-or-ignore semantics and
/// returns the number of rows actually inserted.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn insert_risks(&self, rows: Vec<Risk>) -> Result<usize>;
    async fn insert_results(&self, rows: Vec<InspectionResult>) -> Result<usize>;
    async fn insert_violations(&self, rows: Vec<Violation>) -> Result<usize>;
    async fn insert_establishments(&self, rows: Vec<Establishment>) -> Result<usize>;

    async fn reference_lookup(&self) -> Result<ReferenceLookup>;

    async fn insert_inspections(&self, rows: Vec<Inspection>) -> Result<usize>;
    async fn insert_inspection_violations(&self, rows: Vec<InspectionViolation>) -> Result<usize>;

    /// Copy the OLTP reference tables into the warehouse dimensions.
    async fn copy_dimensions(&self) -> Result<usize>;
    async fn fact_sources(&self) -> Result<Vec<FactSource>>;
    async fn insert_facts(&self, rows: Vec<FactInspection>) -> Result<usize>;

    async fn export_view(&self, view: ExportView) -> Result<TabularView>;
    async fn table_counts(&self) -> Result<TableCounts>;
}
