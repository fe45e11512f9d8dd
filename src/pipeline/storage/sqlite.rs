//! [`SqliteStorage`]: both schemas in one SQLite connection, the warehouse
//! database ATTACHed as `foodinspectionDW`.

use super::schema::{
    FACT_SOURCE_QUERY, OLAP_EXPORT_QUERY, OLAP_SCHEMA, OLTP_EXPORT_QUERY, OLTP_SCHEMA,
};
use super::{ExportView, ReferenceLookup, Storage, TableCounts, TabularView};
use crate::constants;
use crate::domain::{
    Establishment, FactInspection, FactSource, Inspection, InspectionResult, InspectionViolation,
    Risk, Violation,
};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::catalog::keys::{EstablishmentKey, ResultKey};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Statement};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Cloning is cheap; clones share the connection.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the OLTP database at `oltp_path` and attach the
    /// warehouse at `olap_path`, creating both schemas if needed.
    pub async fn open(oltp_path: impl AsRef<Path>, olap_path: impl AsRef<Path>) -> Result<Self> {
        let oltp_path = oltp_path.as_ref().to_path_buf();
        let olap_path = olap_path.as_ref().to_path_buf();
        ensure_parent(&oltp_path)?;
        ensure_parent(&olap_path)?;

        let (oltp, olap) = (oltp_path.clone(), olap_path.clone());
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&oltp)?;
            attach_and_init(&conn, &olap.to_string_lossy())?;
            Ok(conn)
        })
        .await??;

        info!(
            oltp = %oltp_path.display(),
            olap = %olap_path.display(),
            "opened inspection store"
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Both schemas in memory, for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection> {
            let conn = Connection::open_in_memory()?;
            attach_and_init(&conn, ":memory:")?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            f(&mut *guard)
        })
        .await?
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

fn attach_and_init(conn: &Connection, olap: &str) -> Result<()> {
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS {}", constants::OLAP_SCHEMA),
        params![olap],
    )?;
    conn.execute_batch(OLTP_SCHEMA)?;
    conn.execute_batch(OLAP_SCHEMA)?;
    Ok(())
}

/// Insert every row in one transaction. A failing row rolls back the whole
/// table and is reported with its key.
fn insert_all<T>(
    conn: &mut Connection,
    table: &'static str,
    sql: &str,
    rows: &[T],
    key: impl Fn(&T) -> String,
    bind: impl Fn(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
) -> Result<usize> {
    let tx = conn
        .transaction()
        .map_err(|e| PipelineError::persistence(table, "<begin>", e))?;
    let mut inserted = 0;
    {
        let mut stmt = tx
            .prepare(sql)
            .map_err(|e| PipelineError::persistence(table, "<prepare>", e))?;
        for row in rows {
            inserted += bind(&mut stmt, row).map_err(|e| PipelineError::persistence(table, key(row), e))?;
        }
    }
    tx.commit()
        .map_err(|e| PipelineError::persistence(table, "<commit>", e))?;
    debug!(table, attempted = rows.len(), inserted, "table write committed");
    Ok(inserted)
}

fn date_text(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn insert_risks(&self, rows: Vec<Risk>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "risk",
                "INSERT OR IGNORE INTO risk (risk_id, risk) VALUES (?1, ?2)",
                &rows,
                |r| r.risk.clone(),
                |stmt, r| stmt.execute(params![r.risk_id, r.risk]),
            )
        })
        .await
    }

    async fn insert_results(&self, rows: Vec<InspectionResult>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "result",
                "INSERT OR IGNORE INTO result (result, condition_flag) VALUES (?1, ?2)",
                &rows,
                |r| format!("{} (conditions: {})", r.result, r.condition_flag),
                |stmt, r| stmt.execute(params![r.result, r.condition_flag]),
            )
        })
        .await
    }

    async fn insert_violations(&self, rows: Vec<Violation>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "violation",
                "INSERT OR IGNORE INTO violation (violation) VALUES (?1)",
                &rows,
                |v| v.violation.clone(),
                |stmt, v| stmt.execute(params![v.violation]),
            )
        })
        .await
    }

    async fn insert_establishments(&self, rows: Vec<Establishment>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "establishment",
                "INSERT OR IGNORE INTO establishment (dba_name, aka_name, address_num,
                    address_direction, street, city, state, zip, latitude, longitude, facility_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                &rows,
                |e| format!("{} / {} @ {:?},{:?}", e.dba_name, e.aka_name, e.latitude, e.longitude),
                |stmt, e| {
                    stmt.execute(params![
                        e.dba_name,
                        e.aka_name,
                        e.address.number,
                        e.address.direction,
                        e.address.street,
                        e.address.city,
                        e.address.state,
                        e.address.zip,
                        e.latitude,
                        e.longitude,
                        e.facility_type,
                    ])
                },
            )
        })
        .await
    }

    async fn reference_lookup(&self) -> Result<ReferenceLookup> {
        self.with_conn(|conn| {
            let mut lookup = ReferenceLookup::default();

            let mut stmt = conn.prepare(
                "SELECT establishment_id, dba_name, aka_name, latitude, longitude FROM establishment",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    EstablishmentKey {
                        dba_name: row.get(1)?,
                        aka_name: row.get(2)?,
                        latitude: row.get(3)?,
                        longitude: row.get(4)?,
                    },
                    row.get::<_, i64>(0)?,
                ))
            })?;
            for row in rows {
                let (key, id) = row?;
                lookup.establishments.entry(key).or_insert(id);
            }

            let mut stmt = conn.prepare("SELECT risk_id, risk FROM risk")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))?;
            for row in rows {
                let (risk, id) = row?;
                lookup.risks.insert(risk, id);
            }

            let mut stmt = conn.prepare("SELECT result_id, result, condition_flag FROM result")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    ResultKey {
                        result: row.get(1)?,
                        condition_flag: row.get(2)?,
                    },
                    row.get::<_, i64>(0)?,
                ))
            })?;
            for row in rows {
                let (key, id) = row?;
                lookup.results.insert(key, id);
            }

            let mut stmt = conn.prepare("SELECT violation_id, violation FROM violation")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))?;
            for row in rows {
                let (violation, id) = row?;
                lookup.violations.insert(violation, id);
            }

            Ok(lookup)
        })
        .await
    }

    async fn insert_inspections(&self, rows: Vec<Inspection>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "inspection",
                "INSERT OR IGNORE INTO inspection (inspection_id, establishment_id, risk_id,
                    inspection_date, inspection_type, result_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                &rows,
                |i| i.inspection_id.to_string(),
                |stmt, i| {
                    stmt.execute(params![
                        i.inspection_id,
                        i.establishment_id,
                        i.risk_id,
                        date_text(i.inspection_date),
                        i.inspection_type,
                        i.result_id,
                    ])
                },
            )
        })
        .await
    }

    async fn insert_inspection_violations(&self, rows: Vec<InspectionViolation>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "inspection_violation",
                "INSERT OR IGNORE INTO inspection_violation (inspection_id, violation_id, comment)
                 VALUES (?1, ?2, ?3)",
                &rows,
                |iv| format!("{}/{}", iv.inspection_id, iv.violation_id),
                |stmt, iv| stmt.execute(params![iv.inspection_id, iv.violation_id, iv.comment]),
            )
        })
        .await
    }

    async fn copy_dimensions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| PipelineError::persistence("dim_*", "<begin>", e))?;
            let copies: [(&'static str, &str); 3] = [
                (
                    "dim_risk",
                    "INSERT OR IGNORE INTO foodinspectionDW.dim_risk (risk_id, risk)
                     SELECT risk_id, risk FROM main.risk",
                ),
                (
                    "dim_result",
                    "INSERT OR IGNORE INTO foodinspectionDW.dim_result (result_id, result, condition_flag)
                     SELECT result_id, result, condition_flag FROM main.result",
                ),
                (
                    "dim_establishment",
                    "INSERT OR IGNORE INTO foodinspectionDW.dim_establishment (establishment_id,
                        dba_name, aka_name, address_num, address_direction, street, city, state,
                        zip, latitude, longitude, facility_type)
                     SELECT establishment_id, dba_name, aka_name, address_num, address_direction,
                        street, city, state, zip, latitude, longitude, facility_type
                     FROM main.establishment",
                ),
            ];
            let mut inserted = 0;
            for (table, sql) in copies {
                inserted += tx
                    .execute(sql, [])
                    .map_err(|e| PipelineError::persistence(table, "<copy>", e))?;
            }
            tx.commit()
                .map_err(|e| PipelineError::persistence("dim_*", "<commit>", e))?;
            Ok(inserted)
        })
        .await
    }

    async fn fact_sources(&self) -> Result<Vec<FactSource>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(FACT_SOURCE_QUERY)?;
            let rows = stmt.query_map([], |row| {
                Ok(FactSource {
                    inspection_id: row.get(0)?,
                    establishment_id: row.get(1)?,
                    inspection_date: row.get(2)?,
                    inspection_type: row.get(3)?,
                    violation: row.get(4)?,
                    comment: row.get(5)?,
                    risk_id: row.get(6)?,
                    risk: row.get(7)?,
                    result_id: row.get(8)?,
                    result: row.get(9)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn insert_facts(&self, rows: Vec<FactInspection>) -> Result<usize> {
        self.with_conn(move |conn| {
            insert_all(
                conn,
                "fact_inspection",
                "INSERT OR IGNORE INTO foodinspectionDW.fact_inspection (inspection_id,
                    establishment_id, inspection_date, inspection_type, violation, comment,
                    risk_id, high_risk, medium_risk, low_risk, all_risk, result_id, pass, fail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                &rows,
                |f| format!("{}/{}", f.inspection_id, f.violation),
                |stmt, f| {
                    stmt.execute(params![
                        f.inspection_id,
                        f.establishment_id,
                        f.inspection_date,
                        f.inspection_type,
                        f.violation,
                        f.comment,
                        f.risk_id,
                        f.high_risk,
                        f.medium_risk,
                        f.low_risk,
                        f.all_risk,
                        f.result_id,
                        f.pass,
                        f.fail,
                    ])
                },
            )
        })
        .await
    }

    async fn export_view(&self, view: ExportView) -> Result<TabularView> {
        self.with_conn(move |conn| {
            let sql = match view {
                ExportView::Oltp => OLTP_EXPORT_QUERY,
                ExportView::Olap => OLAP_EXPORT_QUERY,
            };
            let mut stmt = conn.prepare(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
            let width = columns.len();
            let rows = stmt.query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(value_text))
                    .collect::<rusqlite::Result<Vec<String>>>()
            })?;
            Ok(TabularView {
                columns,
                rows: rows.collect::<rusqlite::Result<Vec<_>>>()?,
            })
        })
        .await
    }

    async fn table_counts(&self) -> Result<TableCounts> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
                Ok(n as u64)
            };
            Ok(TableCounts {
                risk: count("risk")?,
                result: count("result")?,
                violation: count("violation")?,
                establishment: count("establishment")?,
                inspection: count("inspection")?,
                inspection_violation: count("inspection_violation")?,
                dim_risk: count("foodinspectionDW.dim_risk")?,
                dim_result: count("foodinspectionDW.dim_result")?,
                dim_establishment: count("foodinspectionDW.dim_establishment")?,
                fact_inspection: count("foodinspectionDW.fact_inspection")?,
            })
        })
        .await
    }
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage").finish_non_exhaustive()
    }
}
