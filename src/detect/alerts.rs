//! Alert persistence -- engine verdicts recorded with their JSON evidence
//! for the notification-composition collaborator to consume.

use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

use crate::detect::Severity;
use crate::storage::Pool;

/// A recorded alert with verdict and evidence.
#[derive(Debug, serde::Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: String,
    pub severity: Severity,
    pub summary: String,
    pub evidence: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct AlertLog {
    pool: Pool,
}

impl AlertLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn record(
        &self,
        kind: &str,
        severity: Severity,
        summary: &str,
        evidence: serde_json::Value,
    ) -> Result<Uuid> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        let evidence_json = serde_json::to_string(&evidence)?;

        conn.execute(
            "INSERT INTO alerts (id, kind, severity, summary, evidence_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
            params![
                id.to_string(),
                kind,
                severity.as_str(),
                summary,
                evidence_json
            ],
        )?;

        Ok(id)
    }

    pub fn list_recent(&self, limit: usize) -> Result<Vec<Alert>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, severity, summary, evidence_json, created_at FROM alerts
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id_str: String = row.get(0)?;
            let severity_str: String = row.get(2)?;
            let evidence_str: String = row.get(4)?;
            let created_str: String = row.get(5)?;

            Ok(Alert {
                id: Uuid::parse_str(&id_str).unwrap_or_default(),
                kind: row.get(1)?,
                severity: severity_str.parse().unwrap_or(Severity::Low),
                summary: row.get(3)?,
                evidence: serde_json::from_str(&evidence_str).unwrap_or_default(),
                created_at: parse_sqlite_datetime(&created_str),
            })
        })?;

        let mut alerts = Vec::new();
        for r in rows {
            alerts.push(r?);
        }
        Ok(alerts)
    }
}

/// SQLite's datetime('now') yields "YYYY-MM-DD HH:MM:SS" (UTC, no offset).
fn parse_sqlite_datetime(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&chrono::Utc))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::open_memory_pool;

    #[test]
    fn test_record_and_list() -> Result<()> {
        let pool = open_memory_pool()?;
        let log = AlertLog::new(pool);

        log.record(
            "cluster",
            Severity::High,
            "2 flooding incidents in HSR Layout",
            serde_json::json!({ "count": 2, "location": "HSR Layout" }),
        )?;
        log.record(
            "anomaly",
            Severity::Critical,
            "spike in air quality index",
            serde_json::json!({ "z_score": 9.9 }),
        )?;

        let alerts = log.list_recent(5)?;
        assert_eq!(alerts.len(), 2);
        let kinds: Vec<&str> = alerts.iter().map(|a| a.kind.as_str()).collect();
        assert!(kinds.contains(&"cluster"));
        assert!(kinds.contains(&"anomaly"));

        let cluster = alerts.iter().find(|a| a.kind == "cluster").unwrap();
        assert_eq!(cluster.severity, Severity::High);
        assert_eq!(cluster.evidence["count"], 2);
        Ok(())
    }

    #[test]
    fn test_limit_applies() -> Result<()> {
        let pool = open_memory_pool()?;
        let log = AlertLog::new(pool);
        for i in 0..5 {
            log.record(
                "risk",
                Severity::Medium,
                &format!("alert {i}"),
                serde_json::json!({}),
            )?;
        }
        assert_eq!(log.list_recent(3)?.len(), 3);
        Ok(())
    }
}
