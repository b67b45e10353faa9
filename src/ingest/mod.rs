//! Incident ingestion -- the record shapes the engine consumes and the
//! source boundary collaborators implement to feed it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{self, Pool};

/// A single citizen/sensor incident report. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub id: String,
    pub incident_type: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// A current data point for anomaly analysis: a type/location tag plus an
/// open set of fields, one of which should be numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Keys tried first, in order, when extracting the scalar reading.
const VALUE_KEYS: [&str; 4] = ["value", "count", "level", "index"];

impl Sample {
    pub fn new(kind: &str, location: &str, value: f64) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("value".to_string(), value.into());
        Self {
            kind: kind.to_string(),
            location: location.to_string(),
            fields,
        }
    }

    /// Extract the scalar reading: priority keys first, then the first
    /// field that coerces to a number.
    pub fn numeric_value(&self) -> Option<f64> {
        extract_numeric(&self.fields)
    }
}

/// Numeric extraction from a loose JSON object, shared with historical
/// records. Priority order: `value`, `count`, `level`, `index`, then the
/// first remaining field that coerces.
pub fn extract_numeric(fields: &serde_json::Map<String, serde_json::Value>) -> Option<f64> {
    for key in VALUE_KEYS {
        if let Some(n) = fields.get(key).and_then(coerce_number) {
            return Some(n);
        }
    }
    fields.values().find_map(coerce_number)
}

fn coerce_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Boundary for report feeds. The daemon uses the SQLite-backed source;
/// hosts can plug any other feed behind the same contract.
#[async_trait::async_trait]
pub trait ReportSource: Send + Sync {
    /// Fetch all reports with timestamps inside the trailing window.
    async fn fetch_window(
        &self,
        window_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>>;
}

/// Reports previously persisted through the ingest API.
pub struct SqliteReportSource {
    pool: Pool,
}

impl SqliteReportSource {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportSource for SqliteReportSource {
    async fn fetch_window(
        &self,
        window_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<IncidentRecord>> {
        storage::recent_reports(&self.pool, window_minutes, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_with(fields: serde_json::Value) -> Sample {
        let mut s = Sample::new("environmental", "HSR Layout", 0.0);
        s.fields = fields.as_object().unwrap().clone();
        s
    }

    #[test]
    fn test_priority_key_order() {
        let s = sample_with(json!({"index": 9.0, "count": 4, "value": 1.5}));
        assert_eq!(s.numeric_value(), Some(1.5));

        let s = sample_with(json!({"index": 9.0, "level": 2}));
        assert_eq!(s.numeric_value(), Some(2.0));
    }

    #[test]
    fn test_fallback_to_first_numeric_field() {
        let s = sample_with(json!({"station": "st-4", "aqi": 112.0, "note": "ok"}));
        assert_eq!(s.numeric_value(), Some(112.0));
    }

    #[test]
    fn test_numeric_strings_coerce() {
        let s = sample_with(json!({"value": "42.5"}));
        assert_eq!(s.numeric_value(), Some(42.5));
    }

    #[test]
    fn test_no_numeric_field() {
        let s = sample_with(json!({"station": "st-4", "note": "ok"}));
        assert_eq!(s.numeric_value(), None);
    }
}
