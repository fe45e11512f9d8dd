//! SQL for the `foodinspection` (main database) and `foodinspectionDW`
//! (attached database) schemas. Every statement is idempotent.

pub const OLTP_SCHEMA: &str = "
PRAGMA foreign_keys = ON;

-- risk_id is the tier (1-4) derived from the risk text
CREATE TABLE IF NOT EXISTS risk (
    risk_id INTEGER PRIMARY KEY,
    risk    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS result (
    result_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    result         TEXT NOT NULL,
    condition_flag INTEGER NOT NULL DEFAULT 0,
    UNIQUE (result, condition_flag)
);

CREATE TABLE IF NOT EXISTS violation (
    violation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    violation    TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS establishment (
    establishment_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    dba_name          TEXT NOT NULL,
    aka_name          TEXT NOT NULL,
    address_num       TEXT NOT NULL,
    address_direction TEXT NOT NULL,
    street            TEXT NOT NULL,
    city              TEXT NOT NULL,
    state             TEXT NOT NULL,
    zip               TEXT NOT NULL,
    latitude          REAL,
    longitude         REAL,
    facility_type     TEXT NOT NULL
);

-- NULL coordinates must collide with each other for insert-or-ignore
CREATE UNIQUE INDEX IF NOT EXISTS establishment_key_idx ON establishment (
    dba_name, aka_name, IFNULL(latitude, ''), IFNULL(longitude, '')
);

CREATE TABLE IF NOT EXISTS inspection (
    inspection_id    INTEGER PRIMARY KEY,
    establishment_id INTEGER REFERENCES establishment(establishment_id),
    risk_id          INTEGER REFERENCES risk(risk_id),
    inspection_date  TEXT,             -- YYYY-MM-DD
    inspection_type  TEXT,
    result_id        INTEGER REFERENCES result(result_id)
);

CREATE TABLE IF NOT EXISTS inspection_violation (
    inspection_id INTEGER NOT NULL REFERENCES inspection(inspection_id),
    violation_id  INTEGER NOT NULL REFERENCES violation(violation_id),
    comment       TEXT,
    UNIQUE (inspection_id, violation_id)
);

CREATE INDEX IF NOT EXISTS inspection_establishment_idx ON inspection(establishment_id);
CREATE INDEX IF NOT EXISTS inspection_violation_violation_idx ON inspection_violation(violation_id);
";

pub const OLAP_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS foodinspectionDW.dim_risk (
    risk_id INTEGER PRIMARY KEY,
    risk    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS foodinspectionDW.dim_result (
    result_id      INTEGER PRIMARY KEY,
    result         TEXT NOT NULL,
    condition_flag INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS foodinspectionDW.dim_establishment (
    establishment_id  INTEGER PRIMARY KEY,
    dba_name          TEXT NOT NULL,
    aka_name          TEXT NOT NULL,
    address_num       TEXT NOT NULL,
    address_direction TEXT NOT NULL,
    street            TEXT NOT NULL,
    city              TEXT NOT NULL,
    state             TEXT NOT NULL,
    zip               TEXT NOT NULL,
    latitude          REAL,
    longitude         REAL,
    facility_type     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS foodinspectionDW.fact_inspection (
    inspection_violation_id INTEGER PRIMARY KEY AUTOINCREMENT,
    inspection_id    INTEGER NOT NULL,
    establishment_id INTEGER,
    inspection_date  TEXT,
    inspection_type  TEXT,
    violation        TEXT NOT NULL,
    comment          TEXT,
    risk_id          INTEGER,
    high_risk        INTEGER NOT NULL,
    medium_risk      INTEGER NOT NULL,
    low_risk         INTEGER NOT NULL,
    all_risk         INTEGER NOT NULL,
    result_id        INTEGER,
    pass             INTEGER NOT NULL,
    fail             INTEGER NOT NULL,
    UNIQUE (inspection_id, violation)
);
";

/// Inspection × violation pairs with the descriptive columns of the fact
/// table. Inspections without a violation drop out at the inner join.
pub const FACT_SOURCE_QUERY: &str = "
SELECT i.inspection_id, i.establishment_id, i.inspection_date, i.inspection_type,
       v.violation, iv.comment, ri.risk_id, ri.risk, re.result_id, re.result
FROM inspection i
    LEFT JOIN establishment e ON i.establishment_id = e.establishment_id
    LEFT JOIN risk ri ON i.risk_id = ri.risk_id
    LEFT JOIN result re ON i.result_id = re.result_id
    INNER JOIN inspection_violation iv ON i.inspection_id = iv.inspection_id
    INNER JOIN violation v ON iv.violation_id = v.violation_id
ORDER BY i.inspection_id, v.violation_id
";

pub const OLTP_EXPORT_QUERY: &str = "
SELECT i.inspection_id,
       e.establishment_id, e.dba_name, e.aka_name, e.address_num, e.address_direction,
       e.street, e.city, e.state, e.zip, e.latitude, e.longitude, e.facility_type,
       ri.risk_id, ri.risk,
       i.inspection_date, i.inspection_type,
       re.result_id, re.result, re.condition_flag,
       v.violation_id, v.violation,
       iv.comment
FROM inspection i
    LEFT JOIN establishment e ON i.establishment_id = e.establishment_id
    LEFT JOIN risk ri ON i.risk_id = ri.risk_id
    LEFT JOIN result re ON i.result_id = re.result_id
    INNER JOIN inspection_violation iv ON i.inspection_id = iv.inspection_id
    INNER JOIN violation v ON iv.violation_id = v.violation_id
ORDER BY i.inspection_id, v.violation_id
";

pub const OLAP_EXPORT_QUERY: &str = "
SELECT fi.inspection_violation_id, fi.inspection_id,
       de.establishment_id, de.dba_name, de.aka_name, de.address_num, de.address_direction,
       de.street, de.city, de.state, de.zip, de.latitude, de.longitude, de.facility_type,
       fi.inspection_date, fi.inspection_type, fi.violation, fi.comment,
       dri.risk_id, dri.risk,
       fi.high_risk, fi.medium_risk, fi.low_risk, fi.all_risk,
       dre.result_id, dre.result, dre.condition_flag,
       fi.pass, fi.fail
FROM foodinspectionDW.fact_inspection fi
    INNER JOIN foodinspectionDW.dim_establishment de ON fi.establishment_id = de.establishment_id
    INNER JOIN foodinspectionDW.dim_risk dri ON fi.risk_id = dri.risk_id
    INNER JOIN foodinspectionDW.dim_result dre ON fi.result_id = dre.result_id
ORDER BY fi.inspection_violation_id
";
