use crate::constants;
use crate::types::SourcePage;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Comparison applied between `inspection_date` and the run's start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Eq => "=",
        }
    }
}

impl Default for ComparisonOp {
    fn default() -> Self {
        ComparisonOp::Ge
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparisonOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(ComparisonOp::Gt),
            ">=" | "ge" => Ok(ComparisonOp::Ge),
            "<" | "lt" => Ok(ComparisonOp::Lt),
            "<=" | "le" => Ok(ComparisonOp::Le),
            "=" | "eq" => Ok(ComparisonOp::Eq),
            other => Err(format!("unknown comparison operator '{other}'")),
        }
    }
}

/// Lower (or upper) bound on `inspection_date` for incremental pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFilter {
    pub start_date: NaiveDate,
    pub op: ComparisonOp,
}

impl DateFilter {
    /// SoQL `$where` clause, e.g. `inspection_date >= '2024-01-01T00:00:00'`.
    pub fn to_soql(&self) -> String {
        format!(
            "{} {} '{}T00:00:00'",
            constants::DATE_FIELD,
            self.op,
            self.start_date.format("%Y-%m-%d")
        )
    }
}

/// One bounded page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: u64,
    pub offset: u64,
    pub filter: Option<DateFilter>,
}

/// Failure of a single page request, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Worth retrying at the same offset (timeouts, 429, 5xx, dropped connections)
    Transient(String),
    /// Retrying will not help (4xx, undecodable body)
    Fatal(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transient(msg) => write!(f, "transient: {msg}"),
            SourceError::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

/// Read-only paginated access to the inspections dataset.
#[async_trait]
pub trait InspectionSource: Send + Sync {
    /// Fetch one page. Rows that fail to decode come back in
    /// [`SourcePage::rejected`]; only a failure of the whole request is an error.
    async fn fetch_page(&self, query: &PageQuery) -> Result<SourcePage, SourceError>;
}
