//! Composite risk prediction from per-(location, type) incident history.
//!
//! Five factors (recent frequency, trend, location vulnerability, type
//! criticality, season) are combined into a weighted score, then mapped to a
//! risk level with thresholds that tighten for critical incident types.

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::config::{contains_location, contains_type, RiskConfig};
use crate::detect::{RiskLevel, RiskVerdict};

/// Categorical factor tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    High,
    Medium,
    Low,
}

const WEIGHT_FREQUENCY: f64 = 0.30;
const WEIGHT_TREND: f64 = 0.25;
const WEIGHT_LOCATION: f64 = 0.20;
const WEIGHT_CRITICALITY: f64 = 0.15;
const WEIGHT_SEASONAL: f64 = 0.10;

#[derive(Debug, Clone)]
pub struct RiskPredictor {
    cfg: RiskConfig,
}

impl RiskPredictor {
    pub fn new(cfg: RiskConfig) -> Self {
        Self { cfg }
    }

    /// Predict future incident risk for a (location, type) pair from its
    /// historical timestamps. `now` anchors the recent window and the
    /// seasonal factor.
    pub fn predict(
        &self,
        location: &str,
        incident_type: &str,
        history: &[DateTime<Utc>],
        now: DateTime<Utc>,
    ) -> RiskVerdict {
        if history.len() < self.cfg.min_history {
            return RiskVerdict::unknown(history.len(), self.cfg.min_history);
        }

        let cutoff = now - Duration::days(self.cfg.recent_window_days);
        let recent_count = history.iter().filter(|t| **t > cutoff).count();

        let frequency_score = recent_count as f64 / self.cfg.recent_window_days as f64;
        let trend = trend_score(history);
        let vulnerability = self.location_vulnerability(location);
        let criticality = self.event_criticality(incident_type);
        let seasonal = self.seasonal_factor(incident_type, now);

        let vulnerability_score = if vulnerability == Tier::High { 0.8 } else { 0.4 };
        let criticality_score = if criticality == Tier::High { 0.9 } else { 0.5 };

        let risk_score = (frequency_score * WEIGHT_FREQUENCY
            + trend * WEIGHT_TREND
            + vulnerability_score * WEIGHT_LOCATION
            + criticality_score * WEIGHT_CRITICALITY
            + seasonal * WEIGHT_SEASONAL)
            .clamp(0.0, 1.0);

        let (risk_level, confidence) = determine_level(risk_score, criticality);

        let predicted_timeframe = Some(
            match risk_level {
                RiskLevel::High if recent_count >= 2 => "next 2-4 hours",
                RiskLevel::High => "next 6-12 hours",
                RiskLevel::Medium => "next 12-24 hours",
                _ => "next 2-7 days",
            }
            .to_string(),
        );

        let mut contributing_factors = Vec::new();
        if frequency_score > 0.5 {
            contributing_factors.push("High recent incident frequency".to_string());
        }
        if trend > 0.7 {
            contributing_factors.push("Increasing incident trend".to_string());
        }
        if vulnerability == Tier::High {
            contributing_factors.push(format!("High vulnerability area: {location}"));
        }
        if criticality == Tier::High {
            contributing_factors.push(format!("Critical incident type: {incident_type}"));
        }

        RiskVerdict {
            risk_level,
            confidence,
            predicted_timeframe,
            risk_score,
            contributing_factors,
            recommended_actions: self.recommended_actions(risk_level, incident_type, location),
            reasoning: format!(
                "analysis of {} historical incidents and {} recent events in {location}",
                history.len(),
                recent_count
            ),
        }
    }

    fn location_vulnerability(&self, location: &str) -> Tier {
        if contains_location(&self.cfg.high_risk_locations, location) {
            Tier::High
        } else if contains_location(&self.cfg.medium_risk_locations, location) {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    fn event_criticality(&self, incident_type: &str) -> Tier {
        if contains_type(&self.cfg.high_risk_types, incident_type) {
            Tier::High
        } else if contains_type(&self.cfg.medium_risk_types, incident_type) {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    fn seasonal_factor(&self, incident_type: &str, now: DateTime<Utc>) -> f64 {
        let month = now.month();
        if contains_type(&self.cfg.flood_season_types, incident_type) && (6..=9).contains(&month) {
            0.3
        } else if contains_type(&self.cfg.grid_strain_types, incident_type)
            && (3..=5).contains(&month)
        {
            0.2
        } else {
            0.1
        }
    }

    fn recommended_actions(
        &self,
        level: RiskLevel,
        incident_type: &str,
        location: &str,
    ) -> Vec<String> {
        let mut actions = Vec::new();

        if matches!(level, RiskLevel::High | RiskLevel::Critical) {
            actions.push("Deploy preventive measures immediately".to_string());
            actions.push("Increase monitoring in affected area".to_string());
            actions.push("Prepare emergency response teams".to_string());
        }

        let ty = incident_type.to_ascii_lowercase();
        if ty == "infrastructure" || ty == "power" {
            actions.push("Check power grid stability".to_string());
            actions.push("Verify backup systems".to_string());
        }
        if ty == "flooding" || ty == "emergency" {
            actions.push("Monitor weather conditions".to_string());
            actions.push("Prepare evacuation routes".to_string());
        }

        actions.push(format!("Focus attention on {location}"));
        actions
    }
}

/// Half-over-half rate comparison. Needs at least six points to mean
/// anything; below that it reports the neutral 0.5.
fn trend_score(history: &[DateTime<Utc>]) -> f64 {
    if history.len() < 6 {
        return 0.5;
    }

    let mid = history.len() / 2;
    let (older, recent) = history.split_at(mid);
    let older_avg = older.len() as f64 / mid as f64;
    let recent_avg = recent.len() as f64 / (history.len() - mid) as f64;

    if older_avg == 0.0 {
        if recent_avg > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        ((recent_avg / older_avg) / 2.0).min(1.0)
    }
}

/// Level and confidence from the composite score; thresholds tighten for
/// critical incident types.
fn determine_level(risk_score: f64, criticality: Tier) -> (RiskLevel, f64) {
    if criticality == Tier::High {
        if risk_score > 0.4 {
            return (RiskLevel::High, (0.6 + risk_score * 0.4).min(0.9));
        }
        if risk_score > 0.25 {
            return (RiskLevel::Medium, (0.5 + risk_score * 0.3).min(0.8));
        }
    } else {
        if risk_score > 0.6 {
            return (RiskLevel::High, (0.6 + risk_score * 0.3).min(0.9));
        }
        if risk_score > 0.35 {
            return (RiskLevel::Medium, (0.4 + risk_score * 0.4).min(0.8));
        }
    }
    (RiskLevel::Low, (0.6 - risk_score * 0.2).max(0.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn predictor() -> RiskPredictor {
        RiskPredictor::new(RiskConfig::default())
    }

    fn at(now: DateTime<Utc>, hours_ago: i64) -> DateTime<Utc> {
        now - Duration::hours(hours_ago)
    }

    fn fixed_now() -> DateTime<Utc> {
        // January: no seasonal weighting in play
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sparse_history_is_unknown() {
        let now = fixed_now();
        let verdict = predictor().predict("HSR Layout", "flooding", &[], now);
        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.predicted_timeframe.is_none());

        let two = [at(now, 5), at(now, 3)];
        let verdict = predictor().predict("HSR Layout", "flooding", &two, now);
        assert_eq!(verdict.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_busy_critical_pair_is_high_risk_soon() {
        let now = fixed_now();
        // 7 incidents inside the last week: frequency 1.0
        let history: Vec<_> = (1..=7).map(|d| at(now, d * 20)).collect();
        let verdict = predictor().predict("HSR Layout", "flooding", &history, now);
        assert_eq!(verdict.risk_level, RiskLevel::High);
        assert_eq!(verdict.predicted_timeframe.as_deref(), Some("next 2-4 hours"));
        assert!(verdict.confidence <= 0.9);
        assert!(verdict
            .contributing_factors
            .iter()
            .any(|f| f.contains("frequency")));
        assert!(verdict
            .contributing_factors
            .iter()
            .any(|f| f.contains("HSR Layout")));
        assert!(verdict
            .recommended_actions
            .iter()
            .any(|a| a.contains("evacuation")));
    }

    #[test]
    fn test_stale_routine_pair_is_low_risk() {
        let now = fixed_now();
        // All incidents far outside the recent window
        let history: Vec<_> = (30..33).map(|d| at(now, d * 24)).collect();
        let verdict = predictor().predict("Jayanagar", "noise complaint", &history, now);
        assert_eq!(verdict.risk_level, RiskLevel::Low);
        assert_eq!(verdict.predicted_timeframe.as_deref(), Some("next 2-7 days"));
        // score = 0*0.3 + 0.5*0.25 + 0.4*0.2 + 0.5*0.15 + 0.1*0.1 = 0.29
        assert!((verdict.risk_score - 0.29).abs() < 1e-9);
        // confidence = max(0.3, 0.6 - 0.29*0.2)
        assert!((verdict.confidence - 0.542).abs() < 1e-9);
    }

    #[test]
    fn test_critical_type_threshold_is_tighter() {
        // Same score lands MEDIUM for a critical type but LOW for routine.
        let (level, _) = determine_level(0.3, Tier::High);
        assert_eq!(level, RiskLevel::Medium);
        let (level, _) = determine_level(0.3, Tier::Low);
        assert_eq!(level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_score_clamped() {
        let now = fixed_now();
        // Absurd recent frequency; score must still clamp to 1.0
        let history: Vec<_> = (0..60).map(|h| at(now, h)).collect();
        let verdict = predictor().predict("HSR Layout", "emergency", &history, now);
        assert!(verdict.risk_score <= 1.0);
        assert!(verdict.confidence <= 1.0);
        assert_eq!(verdict.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_trend_score_neutral_below_six_points() {
        let now = fixed_now();
        let short: Vec<_> = (1..=5).map(|d| at(now, d * 24)).collect();
        assert_eq!(trend_score(&short), 0.5);
        let six: Vec<_> = (1..=6).map(|d| at(now, d * 24)).collect();
        assert_eq!(trend_score(&six), 0.5);
    }

    #[test]
    fn test_seasonal_factor_by_month() {
        let p = predictor();
        let monsoon = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();

        assert_eq!(p.seasonal_factor("flooding", monsoon), 0.3);
        assert_eq!(p.seasonal_factor("waterlogging", monsoon), 0.3);
        assert_eq!(p.seasonal_factor("flooding", winter), 0.1);
        assert_eq!(p.seasonal_factor("power", summer), 0.2);
        assert_eq!(p.seasonal_factor("traffic", summer), 0.1);
    }

    #[test]
    fn test_medium_risk_timeframe() {
        let now = fixed_now();
        // Routine type, medium-vulnerability location, a little recent
        // activity: lands in the MEDIUM band.
        let history = vec![at(now, 24), at(now, 48), at(now, 72), at(now, 96)];
        let verdict = predictor().predict("Koramangala", "noise complaint", &history, now);
        // score = (4/7)*0.3 + 0.5*0.25 + 0.4*0.2 + 0.5*0.15 + 0.1*0.1
        //       ~ 0.1714 + 0.125 + 0.08 + 0.075 + 0.01 = 0.4614
        assert_eq!(verdict.risk_level, RiskLevel::Medium);
        assert_eq!(
            verdict.predicted_timeframe.as_deref(),
            Some("next 12-24 hours")
        );
    }
}
