//! Pattern detection core -- cluster detection over incident reports,
//! statistical anomaly detection, and composite risk prediction.

pub mod alerts;
pub mod anomaly;
pub mod cluster;
pub mod engine;
pub mod risk;
pub mod severity;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller contract violations. Too little history is never an error (it
/// degrades to a low-confidence verdict); a record with no usable number is.
#[derive(Debug, Error)]
pub enum DetectError {
    /// A record fed to the anomaly extractor carried no coercible numeric
    /// field. This always propagates; defaulting it to zero would corrupt
    /// the statistical baseline.
    #[error("no numeric field in {context} (tried value, count, level, index)")]
    MissingNumericField { context: String },
}

/// Ordinal severity for clusters, anomalies, and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// One step up the scale; HIGH and CRITICAL are unchanged.
    pub fn bumped(self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            other => other,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Predicted likelihood/urgency classification for a (location, type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Unknown => "UNKNOWN",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape classification of a detected anomaly, evaluated as an ordered
/// decision list (first match wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Spike,
    Drop,
    HighDeviation,
    LowDeviation,
    PatternBreak,
}

/// A concerning group of same-type reports in one location. Derived and
/// ephemeral; recomputed per analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCluster {
    pub event_type: String,
    pub location: String,
    pub count: u32,
    pub severity: Severity,
    pub time_window: String,
    pub affected_radius_km: f64,
    pub reasoning: String,
}

/// Verdict on a single data point against its historical window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub confidence: f64,
    pub anomaly_type: Option<AnomalyType>,
    pub severity: Severity,
    pub z_score: f64,
    pub should_alert: bool,
    pub reasoning: String,
}

impl AnomalyVerdict {
    /// The well-formed "not enough signal yet" verdict. Callers treat this
    /// as a normal state, not a fault.
    pub fn insufficient(have: usize, needed: usize) -> Self {
        Self {
            is_anomaly: false,
            confidence: 0.0,
            anomaly_type: None,
            severity: Severity::Low,
            z_score: 0.0,
            should_alert: false,
            reasoning: format!("insufficient historical data: {have} of {needed} required points"),
        }
    }
}

/// Verdict on future incident risk for a (location, type) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub predicted_timeframe: Option<String>,
    pub risk_score: f64,
    pub contributing_factors: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub reasoning: String,
}

impl RiskVerdict {
    pub fn unknown(have: usize, needed: usize) -> Self {
        Self {
            risk_level: RiskLevel::Unknown,
            confidence: 0.0,
            predicted_timeframe: None,
            risk_score: 0.0,
            contributing_factors: vec!["Limited data availability".to_string()],
            recommended_actions: vec!["Collect more incident data".to_string()],
            reasoning: format!(
                "insufficient historical data: {have} of {needed} required incidents"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_bump_saturates() {
        assert_eq!(Severity::Low.bumped(), Severity::Medium);
        assert_eq!(Severity::Medium.bumped(), Severity::High);
        assert_eq!(Severity::High.bumped(), Severity::High);
        assert_eq!(Severity::Critical.bumped(), Severity::Critical);
    }

    #[test]
    fn test_severity_round_trip() {
        for s in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            assert_eq!(s.as_str().parse::<Severity>().unwrap(), s);
        }
    }

    #[test]
    fn test_anomaly_type_serializes_snake_case() {
        let json = serde_json::to_string(&AnomalyType::HighDeviation).unwrap();
        assert_eq!(json, "\"high_deviation\"");
    }
}
