//! Field-level normalization rules applied to raw inspection records.
//!
//! Everything here is a pure function of its input so the rules can be tested
//! without a source or a store.

pub mod address;

use crate::constants::{COMMENTS_MARKER, CONDITIONS_MARKER, ORDINAL_SEPARATOR, PASS_TEXT, VIOLATION_SEPARATOR};
use crate::pipeline::processing::catalog::keys::ResultKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tier for a risk category: the first of "1", "2", "3" found in the text,
/// otherwise 4 (the catch-all "All" bucket).
pub fn risk_tier(risk: &str) -> i64 {
    if risk.contains('1') {
        1
    } else if risk.contains('2') {
        2
    } else if risk.contains('3') {
        3
    } else {
        4
    }
}

/// Split the conditional-pass marker out of a raw result.
///
/// `"Pass w/ Conditions"` → `("Pass", true)`; anything else containing
/// "Pass" collapses to `"Pass"`; other results are kept verbatim.
pub fn normalize_result(raw: &str) -> ResultKey {
    let condition_flag = raw.contains(CONDITIONS_MARKER);
    let result = if raw.contains(PASS_TEXT) {
        PASS_TEXT.to_string()
    } else {
        raw.to_string()
    };
    ResultKey {
        result,
        condition_flag,
    }
}

/// One entry of a raw violations blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEntry {
    pub text: String,
    pub comment: Option<String>,
}

/// Split a `|`-delimited violations blob into entries.
///
/// Each piece loses its leading ordinal (`"18. "`) and is split on the first
/// `"- Comments:"`. Pieces with no violation text left are dropped.
pub fn split_violations(blob: &str) -> Vec<ViolationEntry> {
    blob.split(VIOLATION_SEPARATOR)
        .filter_map(|piece| {
            let piece = piece.trim();
            let body = match piece.split_once(ORDINAL_SEPARATOR) {
                Some((_ordinal, rest)) => rest,
                None => piece,
            };
            let (text, comment) = match body.split_once(COMMENTS_MARKER) {
                Some((text, comment)) => (text.trim(), Some(comment.trim())),
                None => (body.trim(), None),
            };
            if text.is_empty() {
                return None;
            }
            Some(ViolationEntry {
                text: text.to_string(),
                comment: comment.filter(|c| !c.is_empty()).map(str::to_string),
            })
        })
        .collect()
}

/// Exact-zero (and non-finite) coordinates mean "unknown".
pub fn clean_coordinate(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// Calendar date from the first ten characters of an ISO-like timestamp.
pub fn truncate_date(timestamp: &str) -> Option<NaiveDate> {
    let day = timestamp.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Missing text becomes the empty string for columns stored as NOT NULL text.
pub fn clean_text(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}
