//! Row shapes of the OLTP and OLAP schemas.

use crate::pipeline::processing::normalize::address::AddressComponents;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `risk(risk_id, risk)`; the id is the tier derived from the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_id: i64,
    pub risk: String,
}

/// `result(result_id, result, condition_flag)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionResult {
    pub result_id: Option<i64>,
    pub result: String,
    pub condition_flag: bool,
}

/// `violation(violation_id, violation)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_id: Option<i64>,
    pub violation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Establishment {
    pub establishment_id: Option<i64>,
    pub dba_name: String,
    pub aka_name: String,
    pub address: AddressComponents,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub facility_type: String,
}

/// `inspection(...)` with foreign keys already resolved (NULL on a miss).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspection {
    pub inspection_id: i64,
    pub establishment_id: Option<i64>,
    pub risk_id: Option<i64>,
    pub inspection_date: Option<NaiveDate>,
    pub inspection_type: Option<String>,
    pub result_id: Option<i64>,
}

/// `inspection_violation(inspection_id, violation_id, comment)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionViolation {
    pub inspection_id: i64,
    pub violation_id: i64,
    pub comment: Option<String>,
}

/// One inspection × violation pair read from the OLTP schema, with the
/// descriptive columns the fact table needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSource {
    pub inspection_id: i64,
    pub establishment_id: Option<i64>,
    pub inspection_date: Option<String>,
    pub inspection_type: Option<String>,
    pub violation: String,
    pub comment: Option<String>,
    pub risk_id: Option<i64>,
    pub risk: Option<String>,
    pub result_id: Option<i64>,
    pub result: Option<String>,
}

/// `fact_inspection(...)` row of the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactInspection {
    pub inspection_id: i64,
    pub establishment_id: Option<i64>,
    pub inspection_date: Option<String>,
    pub inspection_type: Option<String>,
    pub violation: String,
    pub comment: Option<String>,
    pub risk_id: Option<i64>,
    pub high_risk: bool,
    pub medium_risk: bool,
    pub low_risk: bool,
    pub all_risk: bool,
    pub result_id: Option<i64>,
    pub pass: bool,
    pub fail: bool,
}
