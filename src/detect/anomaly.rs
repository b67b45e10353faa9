//! Statistical anomaly detection over a numeric series.
//!
//! A current reading is compared against the population statistics of its
//! historical window. The alerting threshold adapts to the data type and
//! location; the anomaly shape is classified with an ordered decision list.

use crate::config::{contains_location, contains_type, AnomalyConfig};
use crate::detect::{AnomalyType, AnomalyVerdict, DetectError, Severity};
use crate::ingest::{self, Sample};

/// A simple time series for statistical analysis.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance (the baseline is the whole window, not a sample).
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq_diff: f64 = self.values.iter().map(|&x| (x - mean).powi(2)).sum();
        sum_sq_diff / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    cfg: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(cfg: AnomalyConfig) -> Self {
        Self { cfg }
    }

    /// Analyze a sample against a window of historical records (loose JSON
    /// objects, as delivered by the metrics collaborator).
    ///
    /// A record with no coercible numeric field is a contract violation and
    /// returns `DetectError::MissingNumericField`; too little history is a
    /// normal low-confidence verdict, not an error.
    pub fn detect(
        &self,
        current: &Sample,
        historical: &[serde_json::Value],
    ) -> Result<AnomalyVerdict, DetectError> {
        let current_value =
            current
                .numeric_value()
                .ok_or_else(|| DetectError::MissingNumericField {
                    context: format!("current sample ({})", current.kind),
                })?;

        let mut values = Vec::with_capacity(historical.len());
        for (i, record) in historical.iter().enumerate() {
            let value = match record {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::Object(map) => ingest::extract_numeric(map),
                _ => None,
            };
            values.push(value.ok_or_else(|| DetectError::MissingNumericField {
                context: format!("historical record {i}"),
            })?);
        }

        Ok(self.detect_values(&current.kind, &current.location, current_value, &values))
    }

    /// Core detection over already-extracted scalars.
    pub fn detect_values(
        &self,
        kind: &str,
        location: &str,
        current: f64,
        historical: &[f64],
    ) -> AnomalyVerdict {
        if historical.len() < self.cfg.min_history {
            return AnomalyVerdict::insufficient(historical.len(), self.cfg.min_history);
        }

        let series = TimeSeries::new(historical.to_vec());
        let mean = series.mean();
        let std = series.std_dev();

        let (is_anomaly, confidence, z_score) = if std == 0.0 {
            // Constant baseline: any difference is maximally anomalous
            let differs = (current - mean).abs() > f64::EPSILON;
            (differs, if differs { 1.0 } else { 0.0 }, 0.0)
        } else {
            let z = ((current - mean) / std).abs();
            let threshold = self.threshold_for(kind, location);
            (z > threshold, (z / 3.0).min(0.95), z)
        };

        let anomaly_type = classify(current, &series);
        let severity = severity_for(z_score, anomaly_type);
        let should_alert = is_anomaly && confidence > 0.7;

        AnomalyVerdict {
            is_anomaly,
            confidence,
            anomaly_type: Some(anomaly_type),
            severity,
            z_score,
            should_alert,
            reasoning: format!(
                "{} pattern at {:.2} against baseline mean {:.2} (z-score {:.2}, confidence {:.0}%)",
                if is_anomaly { "anomalous" } else { "normal" },
                current,
                mean,
                z_score,
                confidence * 100.0
            ),
        }
    }

    /// Threshold in sigmas, adapted to data type and location noise.
    fn threshold_for(&self, kind: &str, location: &str) -> f64 {
        let mut threshold = if contains_type(&self.cfg.sensitive_types, kind) {
            self.cfg.sensitive_threshold
        } else if contains_type(&self.cfg.standard_types, kind) {
            self.cfg.standard_threshold
        } else {
            self.cfg.relaxed_threshold
        };

        if contains_location(&self.cfg.high_variance_locations, location) {
            threshold += self.cfg.high_variance_penalty;
        }

        threshold
    }
}

/// Ordered decision list; first match wins.
fn classify(current: f64, series: &TimeSeries) -> AnomalyType {
    if current > series.max() * 1.2 {
        AnomalyType::Spike
    } else if current < series.min() * 0.8 {
        AnomalyType::Drop
    } else if current > series.mean() * 1.5 {
        AnomalyType::HighDeviation
    } else if current < series.mean() * 0.5 {
        AnomalyType::LowDeviation
    } else {
        AnomalyType::PatternBreak
    }
}

/// Severity from z-score, bumped one level for hard spikes/drops.
fn severity_for(z_score: f64, anomaly_type: AnomalyType) -> Severity {
    let base = if z_score > 4.0 {
        Severity::Critical
    } else if z_score > 3.0 {
        Severity::High
    } else if z_score > 2.0 {
        Severity::Medium
    } else {
        Severity::Low
    };

    match anomaly_type {
        AnomalyType::Spike | AnomalyType::Drop => base.bumped(),
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(AnomalyConfig::default())
    }

    #[test]
    fn test_series_stats() {
        let ts = TimeSeries::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ts.mean(), 3.0);
        assert_eq!(ts.variance(), 2.0);
        assert_eq!(ts.min(), 1.0);
        assert_eq!(ts.max(), 5.0);
    }

    #[test]
    fn test_large_spike_is_critical_and_alerts() {
        // mean ~11.14, std ~1.4 => z ~9.9
        let historical = [10.0, 12.0, 11.0, 9.0, 13.0, 10.5, 12.5];
        let verdict = detector().detect_values("environmental", "HSR Layout", 25.0, &historical);
        assert!(verdict.is_anomaly);
        assert!(verdict.z_score > 9.0);
        assert_eq!(verdict.severity, Severity::Critical);
        assert!(verdict.should_alert);
        assert_eq!(verdict.anomaly_type, Some(AnomalyType::Spike));
        assert_eq!(verdict.confidence, 0.95);
    }

    #[test]
    fn test_insufficient_history_is_soft() {
        let verdict = detector().detect_values("traffic", "Downtown", 10.0, &[1.0, 2.0]);
        assert!(!verdict.is_anomaly);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.anomaly_type.is_none());
        assert!(verdict.reasoning.contains("insufficient"));
    }

    #[test]
    fn test_zero_variance_exact_confidence() {
        let constant = [7.0, 7.0, 7.0, 7.0];
        let same = detector().detect_values("traffic", "Downtown", 7.0, &constant);
        assert!(!same.is_anomaly);
        assert_eq!(same.confidence, 0.0);
        assert_eq!(same.z_score, 0.0);

        let different = detector().detect_values("traffic", "Downtown", 7.5, &constant);
        assert!(different.is_anomaly);
        assert_eq!(different.confidence, 1.0);
        assert_eq!(different.z_score, 0.0);
    }

    #[test]
    fn test_adaptive_thresholds() {
        let d = detector();
        // emergency is the sensitive tier
        assert_eq!(d.threshold_for("emergency", "HSR Layout"), 1.5);
        // traffic is standard
        assert_eq!(d.threshold_for("traffic", "HSR Layout"), 2.0);
        // unknown types are relaxed
        assert_eq!(d.threshold_for("footfall", "HSR Layout"), 2.5);
        // high-variance locations add the penalty
        assert_eq!(d.threshold_for("traffic", "Electronic City"), 2.5);
    }

    #[test]
    fn test_sensitive_type_flags_milder_deviation() {
        // z between 1.5 and 2.5: flagged for emergency, not for routine data
        let historical = [10.0, 11.0, 9.0, 10.0, 11.0, 9.0];
        let series = TimeSeries::new(historical.to_vec());
        let current = series.mean() + series.std_dev() * 2.0;

        let d = detector();
        assert!(d.detect_values("emergency", "HSR Layout", current, &historical).is_anomaly);
        assert!(!d.detect_values("footfall", "HSR Layout", current, &historical).is_anomaly);
    }

    #[test]
    fn test_drop_classification_and_bump() {
        let historical = [10.0, 10.5, 9.5, 10.2, 9.8];
        let verdict = detector().detect_values("environmental", "HSR Layout", 2.0, &historical);
        assert_eq!(verdict.anomaly_type, Some(AnomalyType::Drop));
        // z is huge here so the bump is a no-op at CRITICAL; check the
        // bump itself on a borderline z instead
        assert!(verdict.severity >= Severity::High);
        assert_eq!(severity_for(1.0, AnomalyType::Drop), Severity::Medium);
        assert_eq!(severity_for(2.5, AnomalyType::Spike), Severity::High);
        assert_eq!(severity_for(2.5, AnomalyType::PatternBreak), Severity::Medium);
    }

    #[test]
    fn test_missing_numeric_field_is_an_error() {
        let d = detector();
        let mut sample = Sample::new("environmental", "HSR Layout", 1.0);
        sample.fields.clear();
        sample
            .fields
            .insert("note".to_string(), json!("no reading"));

        let err = d.detect(&sample, &[json!({"value": 1.0})]).unwrap_err();
        assert!(matches!(err, DetectError::MissingNumericField { .. }));

        let sample = Sample::new("environmental", "HSR Layout", 1.0);
        let err = d
            .detect(&sample, &[json!({"note": "broken sensor"})])
            .unwrap_err();
        assert!(matches!(err, DetectError::MissingNumericField { .. }));
    }

    #[test]
    fn test_detect_extracts_from_objects_and_numbers() {
        let d = detector();
        let sample = Sample::new("environmental", "HSR Layout", 25.0);
        let historical = vec![
            json!({"value": 10.0}),
            json!({"count": 12}),
            json!(11.0),
            json!({"level": 9.0}),
        ];
        let verdict = d.detect(&sample, &historical).unwrap();
        assert!(verdict.is_anomaly);
    }

    #[test]
    fn test_confidence_bounds() {
        let d = detector();
        for current in [0.0, 5.0, 10.0, 50.0, 500.0] {
            let v = d.detect_values("traffic", "Downtown", current, &[9.0, 10.0, 11.0, 10.0]);
            assert!((0.0..=1.0).contains(&v.confidence));
            assert!(v.z_score >= 0.0);
        }
    }
}
