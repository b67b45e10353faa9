//! The pattern engine -- ties the detectors to storage and the alert log.
//!
//! All three detectors stay pure; the engine is the only place that touches
//! the database, so hosts embedding the detectors directly get side-effect
//! free computation.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::DetectConfig;
use crate::detect::alerts::AlertLog;
use crate::detect::anomaly::AnomalyDetector;
use crate::detect::cluster::ClusterDetector;
use crate::detect::risk::RiskPredictor;
use crate::detect::{AnomalyVerdict, EventCluster, RiskLevel, RiskVerdict};
use crate::ingest::{IncidentRecord, Sample};
use crate::storage::{self, Pool};

#[derive(Clone)]
pub struct PatternEngine {
    pool: Pool,
    cfg: DetectConfig,
    clusters: ClusterDetector,
    anomalies: AnomalyDetector,
    risks: RiskPredictor,
    alerts: AlertLog,
}

impl PatternEngine {
    pub fn new(pool: Pool, cfg: DetectConfig) -> Self {
        let clusters = ClusterDetector::new(cfg.cluster.clone());
        let anomalies = AnomalyDetector::new(cfg.anomaly.clone());
        let risks = RiskPredictor::new(cfg.risk.clone());
        let alerts = AlertLog::new(pool.clone());
        Self {
            pool,
            cfg,
            clusters,
            anomalies,
            risks,
            alerts,
        }
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    /// Analyze an already-fetched window of reports: criticality-aware
    /// cluster detection first, the fixed count threshold second. A detected
    /// cluster is recorded as an alert; history is pruned to the retention
    /// horizon as part of the same tick.
    pub fn analyze(
        &self,
        records: &[IncidentRecord],
        window_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<EventCluster>> {
        let cluster = self
            .clusters
            .detect(records, window_minutes)
            .or_else(|| self.clusters.detect_fallback(records, window_minutes));

        if let Some(ref c) = cluster {
            warn!(
                location = %c.location,
                event_type = %c.event_type,
                count = c.count,
                severity = %c.severity,
                "Cluster detected"
            );
            self.alerts.record(
                "cluster",
                c.severity,
                &c.reasoning,
                serde_json::to_value(c)?,
            )?;
        }

        let horizon = now - Duration::days(self.cfg.retention_days);
        let removed = storage::prune_history(&self.pool, horizon)?;
        if removed > 0 {
            info!(removed, "Pruned incident history");
        }

        Ok(cluster)
    }

    /// Fetch the trailing report window from storage and analyze it.
    pub fn run_scan(&self, window_minutes: u32, now: DateTime<Utc>) -> Result<Option<EventCluster>> {
        let records = storage::recent_reports(&self.pool, window_minutes, now)?;
        info!(reports = records.len(), window_minutes, "Running pattern scan");
        self.analyze(&records, window_minutes, now)
    }

    /// Append one incident occurrence to the history log. Collaborators
    /// call this whenever a new incident is persisted.
    pub fn record_incident(
        &self,
        location: &str,
        incident_type: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        storage::record_history(&self.pool, location, incident_type, timestamp)
    }

    /// Predict future risk for a (location, type) pair from its recorded
    /// history. High-confidence HIGH/CRITICAL verdicts are recorded as
    /// alerts.
    pub fn predict_risk(
        &self,
        location: &str,
        incident_type: &str,
        now: DateTime<Utc>,
    ) -> Result<RiskVerdict> {
        let history = storage::history_for(&self.pool, location, incident_type)?;
        let verdict = self.risks.predict(location, incident_type, &history, now);

        if matches!(verdict.risk_level, RiskLevel::High | RiskLevel::Critical)
            && verdict.confidence > 0.7
        {
            self.alerts.record(
                "risk",
                crate::detect::Severity::High,
                &format!(
                    "{} risk of {incident_type} in {location} ({})",
                    verdict.risk_level,
                    verdict.predicted_timeframe.as_deref().unwrap_or("timing unclear")
                ),
                serde_json::to_value(&verdict)?,
            )?;
        }

        Ok(verdict)
    }

    /// Check a sample against its historical window, recording an alert
    /// when the verdict says to. `DetectError` values (missing numeric
    /// field) propagate to the caller.
    pub fn check_anomaly(
        &self,
        sample: &Sample,
        historical: &[serde_json::Value],
    ) -> Result<AnomalyVerdict> {
        let verdict = self.anomalies.detect(sample, historical)?;

        if verdict.should_alert {
            self.alerts.record(
                "anomaly",
                verdict.severity,
                &format!("{} anomaly at {}: {}", sample.kind, sample.location, verdict.reasoning),
                serde_json::to_value(&verdict)?,
            )?;
        }

        Ok(verdict)
    }
}
