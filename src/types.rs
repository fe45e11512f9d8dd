use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// One inspection as returned by the open-data API.
///
/// Socrata encodes every scalar as a JSON string, so numeric fields accept
/// either representation. Blank strings are treated as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    #[serde(deserialize_with = "de_id")]
    pub inspection_id: i64,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub dba_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub aka_name: Option<String>,
    #[serde(default, rename = "license_", deserialize_with = "de_opt_string")]
    pub license: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub facility_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub risk: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub inspection_date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub inspection_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub results: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub violations: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub longitude: Option<f64>,
}

impl InspectionRecord {
    /// A record carrying only its natural key; handy as a builder base.
    pub fn new(inspection_id: i64) -> Self {
        Self {
            inspection_id,
            dba_name: None,
            aka_name: None,
            license: None,
            facility_type: None,
            risk: None,
            address: None,
            city: None,
            state: None,
            zip: None,
            inspection_date: None,
            inspection_type: None,
            results: None,
            violations: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Decode one raw row found at `offset` in the ordered result set.
    ///
    /// An unreadable latitude or longitude is dropped rather than rejecting
    /// the row; the returned flag reports that it happened. A row without a
    /// usable `inspection_id` is rejected.
    pub fn from_row(row: Value, offset: u64) -> Result<(Self, bool), RejectedRecord> {
        let mut fields = match row {
            Value::Object(fields) => fields,
            other => {
                return Err(RejectedRecord {
                    offset,
                    raw_id: None,
                    reason: format!("expected a JSON object, got {other}"),
                })
            }
        };
        let raw_id = fields.get("inspection_id").cloned().and_then(scalar_to_string);

        let mut dropped = false;
        let latitude = take_coordinate(&mut fields, "latitude", offset, &mut dropped);
        let longitude = take_coordinate(&mut fields, "longitude", offset, &mut dropped);

        let mut record: InspectionRecord =
            serde_json::from_value(Value::Object(fields)).map_err(|e| RejectedRecord {
                offset,
                raw_id,
                reason: e.to_string(),
            })?;
        record.latitude = latitude;
        record.longitude = longitude;
        Ok((record, dropped))
    }
}

/// A source row that could not become an [`InspectionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// Position of the row in the ordered result set
    pub offset: u64,
    /// Raw `inspection_id`, when the row carried one
    pub raw_id: Option<String>,
    pub reason: String,
}

/// One page from the source. Rows that fail to decode are set aside here
/// instead of failing the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub records: Vec<InspectionRecord>,
    pub rejected: Vec<RejectedRecord>,
    /// Records that kept their row but lost an unreadable coordinate
    pub coordinate_fallbacks: usize,
}

impl SourcePage {
    /// Decode raw rows that start at `offset` in the result set.
    pub fn decode(rows: Vec<Value>, offset: u64) -> Self {
        let mut page = Self::default();
        for (i, row) in rows.into_iter().enumerate() {
            match InspectionRecord::from_row(row, offset + i as u64) {
                Ok((record, dropped)) => {
                    if dropped {
                        page.coordinate_fallbacks += 1;
                    }
                    page.records.push(record);
                }
                Err(rejected) => page.rejected.push(rejected),
            }
        }
        page
    }

    /// Rows received, decoded or not.
    pub fn len(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, other: SourcePage) {
        self.records.extend(other.records);
        self.rejected.extend(other.rejected);
        self.coordinate_fallbacks += other.coordinate_fallbacks;
    }
}

impl From<Vec<InspectionRecord>> for SourcePage {
    fn from(records: Vec<InspectionRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }
}

fn take_coordinate(fields: &mut Map<String, Value>, name: &str, offset: u64, dropped: &mut bool) -> Option<f64> {
    let value = fields.remove(name)?;
    match parse_coordinate(value) {
        Ok(parsed) => parsed,
        Err(reason) => {
            *dropped = true;
            debug!(offset, field = name, "{}; coordinate dropped", reason);
            None
        }
    }
}

fn parse_coordinate(value: Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(format!("invalid coordinate: {n}")),
        },
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Some(f)),
            Ok(_) => Err(format!("invalid coordinate '{s}'")),
            Err(e) => Err(format!("invalid coordinate '{s}': {e}")),
        },
        other => Err(format!("invalid coordinate: {other}")),
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        // Whole floats (e.g. a zip of 60614.0) render without the fraction
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(value))
}

fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    parse_coordinate(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

fn de_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid inspection_id: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid inspection_id '{s}': {e}"))),
        other => Err(serde::de::Error::custom(format!("invalid inspection_id: {other}"))),
    }
}
