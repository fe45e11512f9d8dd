use anyhow::Result;
use async_trait::async_trait;
use food_inspections::app::ports::{InspectionSource, PageQuery, SourceError};
use food_inspections::pipeline::ingestion::paginator::RetryPolicy;
use food_inspections::pipeline::storage::{ExportView, SqliteStorage, Storage};
use food_inspections::pipeline::{Pipeline, RunOptions};
use food_inspections::types::{InspectionRecord, SourcePage};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Serves a fixed dataset by offset and limit, like the open-data API.
struct FixtureSource {
    records: Vec<InspectionRecord>,
    calls: AtomicUsize,
}

impl FixtureSource {
    fn new(records: Vec<InspectionRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InspectionSource for FixtureSource {
    async fn fetch_page(&self, query: &PageQuery) -> std::result::Result<SourcePage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect::<Vec<_>>()
            .into())
    }
}

/// Serves raw API rows and decodes them the way the HTTP client does.
struct JsonSource {
    rows: Vec<Value>,
}

#[async_trait]
impl InspectionSource for JsonSource {
    async fn fetch_page(&self, query: &PageQuery) -> std::result::Result<SourcePage, SourceError> {
        let rows = self
            .rows
            .iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(SourcePage::decode(rows, query.offset))
    }
}

fn inspection(
    id: i64,
    name: &str,
    risk: &str,
    result: &str,
    violations: Option<&str>,
    coords: Option<(f64, f64)>,
) -> InspectionRecord {
    InspectionRecord {
        dba_name: Some(name.into()),
        aka_name: Some(name.into()),
        license: Some(format!("{}", 1000 + id)),
        facility_type: Some("Restaurant".into()),
        risk: Some(risk.into()),
        address: Some("3301 N CLARK ST".into()),
        city: Some("CHICAGO".into()),
        state: Some("IL".into()),
        zip: Some("60657".into()),
        inspection_date: Some("2024-03-05T00:00:00.000".into()),
        inspection_type: Some("Canvass".into()),
        results: Some(result.into()),
        violations: violations.map(str::to_string),
        latitude: coords.map(|c| c.0),
        longitude: coords.map(|c| c.1),
        ..InspectionRecord::new(id)
    }
}

fn fixture() -> Vec<InspectionRecord> {
    let cafe = Some((41.94, -87.65));
    let mut cart = inspection(4, "CART", "Risk 3 (Low)", "Out of Business", Some("3. C"), None);
    cart.address = None;
    cart.city = None;
    cart.state = None;
    cart.zip = None;
    vec![
        inspection(1, "CAFE", "Risk 1 (High)", "Pass", Some("1. A - Comments: x | 2. B - Comments: y"), cafe),
        inspection(2, "CAFE", "Risk 1 (High)", "Fail", Some("2. B - Comments: z"), cafe),
        inspection(3, "DELI", "Risk 2 (Medium)", "Pass w/ Conditions", None, Some((0.0, 0.0))),
        cart,
        // the API may repeat a record across pages
        inspection(1, "CAFE", "Risk 1 (High)", "Pass", Some("1. A - Comments: x"), cafe),
    ]
}

fn options(output_dir: &std::path::Path) -> RunOptions {
    RunOptions {
        filter: None,
        page_size: 2,
        output_dir: output_dir.to_path_buf(),
        skip_export: false,
    }
}

#[tokio::test]
async fn test_full_run_populates_both_schemas() -> Result<()> {
    let dir = tempdir()?;
    let source = Arc::new(FixtureSource::new(fixture()));
    let storage = Arc::new(SqliteStorage::open_in_memory().await?);
    let pipeline = Pipeline::new(source.clone(), storage.clone(), RetryPolicy::immediate(0));

    let summary = pipeline.run(&options(dir.path())).await?;

    // pages of 2, 2, 1: the short page ends the walk
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.counters.records_fetched, 5);
    assert_eq!(summary.counters.duplicates, 1);
    assert_eq!(summary.counters.records, 4);
    assert_eq!(summary.counters.address_fallbacks, 1);
    assert_eq!(summary.counters.misses.total(), 0);

    let counts = storage.table_counts().await?;
    assert_eq!(counts.risk, 3);
    assert_eq!(counts.result, 4);
    assert_eq!(counts.violation, 3);
    assert_eq!(counts.establishment, 3);
    assert_eq!(counts.inspection, 4);
    assert_eq!(counts.inspection_violation, 4);
    assert_eq!(counts.dim_risk, 3);
    assert_eq!(counts.dim_result, 4);
    assert_eq!(counts.dim_establishment, 3);
    // inspection 3 has no violations and so no fact rows
    assert_eq!(counts.fact_inspection, 4);
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let storage = Arc::new(SqliteStorage::open_in_memory().await?);

    let first = Pipeline::new(
        Arc::new(FixtureSource::new(fixture())),
        storage.clone(),
        RetryPolicy::immediate(0),
    );
    first.run(&options(dir.path())).await?;
    let before = storage.table_counts().await?;

    let second = Pipeline::new(
        Arc::new(FixtureSource::new(fixture())),
        storage.clone(),
        RetryPolicy::immediate(0),
    );
    let summary = second.run(&options(dir.path())).await?;

    assert_eq!(storage.table_counts().await?, before);
    assert_eq!(summary.counters.references.risks, 0);
    assert_eq!(summary.counters.references.establishments, 0);
    assert_eq!(summary.counters.inspections_written, 0);
    assert_eq!(summary.counters.inspection_violations_written, 0);
    assert_eq!(summary.counters.warehouse.fact_rows, 0);
    Ok(())
}

#[tokio::test]
async fn test_fact_flags_follow_risk_and_result() -> Result<()> {
    let dir = tempdir()?;
    let storage = Arc::new(SqliteStorage::open_in_memory().await?);
    let pipeline = Pipeline::new(
        Arc::new(FixtureSource::new(fixture())),
        storage.clone(),
        RetryPolicy::immediate(0),
    );
    pipeline.run(&options(dir.path())).await?;

    let view = storage.export_view(ExportView::Olap).await?;
    let col = |name: &str| view.columns.iter().position(|c| c == name).unwrap();
    let (id, violation, high, low, pass, fail) = (
        col("inspection_id"),
        col("violation"),
        col("high_risk"),
        col("low_risk"),
        col("pass"),
        col("fail"),
    );

    let row = |inspection: &str, v: &str| {
        view.rows
            .iter()
            .find(|r| r[id] == inspection && r[violation] == v)
            .cloned()
            .unwrap()
    };

    let first = row("1", "A");
    assert_eq!((first[high].as_str(), first[pass].as_str(), first[fail].as_str()), ("1", "1", "0"));
    let second = row("2", "B");
    assert_eq!((second[high].as_str(), second[fail].as_str()), ("1", "1"));
    let cart = row("4", "C");
    assert_eq!((cart[low].as_str(), cart[pass].as_str(), cart[fail].as_str()), ("1", "0", "0"));
    assert!(view.rows.iter().all(|r| r[id] != "3"));
    Ok(())
}

#[tokio::test]
async fn test_export_writes_both_views() -> Result<()> {
    let dir = tempdir()?;
    let storage = Arc::new(SqliteStorage::open_in_memory().await?);
    let pipeline = Pipeline::new(
        Arc::new(FixtureSource::new(fixture())),
        storage.clone(),
        RetryPolicy::immediate(0),
    );

    let summary = pipeline.run(&options(dir.path())).await?;
    let export = summary.export.expect("export ran");

    assert_eq!(export.oltp_rows, 4);
    assert_eq!(export.olap_rows, 4);

    let mut reader = csv::Reader::from_path(&export.oltp_file)?;
    let headers = reader.headers()?.clone();
    assert!(headers.iter().any(|h| h == "dba_name"));
    assert!(headers.iter().any(|h| h == "comment"));
    assert_eq!(reader.records().count(), 4);

    let mut reader = csv::Reader::from_path(&export.olap_file)?;
    assert!(reader.headers()?.iter().any(|h| h == "inspection_violation_id"));
    assert_eq!(reader.records().count(), 4);
    Ok(())
}

#[tokio::test]
async fn test_on_disk_store_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    let oltp = dir.path().join("foodinspection.db");
    let olap = dir.path().join("foodinspectionDW.db");

    {
        let storage = Arc::new(SqliteStorage::open(&oltp, &olap).await?);
        let pipeline = Pipeline::new(
            Arc::new(FixtureSource::new(fixture())),
            storage,
            RetryPolicy::immediate(0),
        );
        let mut opts = options(dir.path());
        opts.skip_export = true;
        let summary = pipeline.run(&opts).await?;
        assert!(summary.export.is_none());
    }

    let reopened = SqliteStorage::open(&oltp, &olap).await?;
    let counts = reopened.table_counts().await?;
    assert_eq!(counts.inspection, 4);
    assert_eq!(counts.fact_inspection, 4);
    Ok(())
}

#[tokio::test]
async fn test_malformed_rows_are_skipped_not_fatal() -> Result<()> {
    let dir = tempdir()?;
    let storage = Arc::new(SqliteStorage::open_in_memory().await?);
    let row = |id: Value, latitude: &str| {
        json!({
            "inspection_id": id,
            "dba_name": "CAFE",
            "risk": "Risk 1 (High)",
            "address": "3301 N CLARK ST",
            "city": "CHICAGO",
            "state": "IL",
            "zip": "60657",
            "inspection_date": "2024-03-05T00:00:00.000",
            "results": "Pass",
            "violations": "1. A - Comments: x",
            "latitude": latitude,
            "longitude": "-87.65"
        })
    };
    let source = JsonSource {
        rows: vec![
            row(json!("1"), "41.94"),
            row(json!("2"), "N/A"),
            row(json!("not-a-number"), "41.94"),
            json!({ "dba_name": "NO ID" }),
        ],
    };
    let pipeline = Pipeline::new(Arc::new(source), storage.clone(), RetryPolicy::immediate(0));

    let summary = pipeline.run(&options(dir.path())).await?;

    assert_eq!(summary.counters.records_fetched, 4);
    assert_eq!(summary.counters.records, 2);
    assert_eq!(summary.counters.rejected_records, 2);
    assert_eq!(summary.counters.coordinate_fallbacks, 1);
    let rejected: Vec<_> = summary
        .rejected
        .iter()
        .map(|r| (r.offset, r.raw_id.as_deref()))
        .collect();
    assert_eq!(rejected, vec![(2, Some("not-a-number")), (3, None)]);

    let counts = storage.table_counts().await?;
    assert_eq!(counts.inspection, 2);
    assert_eq!(counts.inspection_violation, 2);
    Ok(())
}
