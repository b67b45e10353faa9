//! Weighted severity scoring and affected-radius estimation for clusters.
//!
//! Severity is an integer point total over four factors (type weight,
//! frequency intensity, location impact, description keywords) bucketed into
//! the ordinal scale. The radius formula layers a severity multiplier, a
//! per-report widening, and a density multiplier over a per-type base, then
//! clamps.

use crate::config::{contains_location, contains_type, ClusterConfig};
use crate::detect::Severity;
use crate::ingest::IncidentRecord;

#[derive(Debug, Clone)]
pub struct SeverityScorer {
    cfg: ClusterConfig,
}

impl SeverityScorer {
    pub fn new(cfg: ClusterConfig) -> Self {
        Self { cfg }
    }

    /// Score a (type, count, location) cluster against its member records.
    pub fn score(
        &self,
        incident_type: &str,
        count: usize,
        location: &str,
        records: &[&IncidentRecord],
    ) -> Severity {
        let mut points: u32 = 0;

        // Factor 1: type weight
        points += if contains_type(&self.cfg.severe_weight_types, incident_type) {
            3
        } else if contains_type(&self.cfg.moderate_weight_types, incident_type) {
            2
        } else {
            1
        };

        // Factor 2: frequency intensity, steeper tier for severe types
        points += if contains_type(&self.cfg.severe_weight_types, incident_type) {
            match count {
                c if c >= 4 => 3,
                c if c >= 2 => 2,
                _ => 1,
            }
        } else {
            match count {
                c if c >= 6 => 3,
                c if c >= 4 => 2,
                c if c >= 2 => 1,
                _ => 0,
            }
        };

        // Factor 3: location impact
        if contains_location(&self.cfg.high_impact_locations, location) {
            points += 1;
        }

        // Factor 4: description keywords, capped
        points += self.description_points(records);

        match points {
            p if p >= 8 => Severity::Critical,
            p if p >= 6 => Severity::High,
            p if p >= 4 => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// Keyword scan over free-text descriptions. High words are worth 2,
    /// medium words 1, first hit per record per tier, total capped at 3.
    fn description_points(&self, records: &[&IncidentRecord]) -> u32 {
        let mut points: u32 = 0;
        for record in records {
            let description = record.description.to_lowercase();
            if self
                .cfg
                .high_severity_words
                .iter()
                .any(|w| description.contains(w.as_str()))
            {
                points += 2;
            }
            if self
                .cfg
                .medium_severity_words
                .iter()
                .any(|w| description.contains(w.as_str()))
            {
                points += 1;
            }
        }
        points.min(3)
    }

    /// Affected radius in km, clamped to the configured cap.
    pub fn affected_radius_km(
        &self,
        incident_type: &str,
        count: usize,
        location: &str,
        severity: Severity,
    ) -> f64 {
        let base = self
            .cfg
            .base_radius_km
            .get(&incident_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.cfg.default_radius_km);

        let mut radius = base
            * match severity {
                Severity::Critical => 1.5,
                Severity::High => 1.3,
                Severity::Medium => 1.1,
                Severity::Low => 1.0,
            };

        radius += count.saturating_sub(1) as f64 * 0.5;

        if contains_location(&self.cfg.high_density_locations, location) {
            radius *= 1.2;
        }

        radius.clamp(0.0, self.cfg.max_radius_km)
    }
}
