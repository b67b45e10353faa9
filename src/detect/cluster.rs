//! Cluster detection over incident reports.
//!
//! Reports are grouped by location, then by incident type, preserving data
//! order; the first (location, type) pair to cross its criticality-aware
//! threshold wins. A separate fixed count threshold ("fallback policy") is
//! available for hosts that want the blunt rule.

use std::collections::HashMap;

use crate::config::{contains_location, contains_type, ClusterConfig};
use crate::detect::severity::SeverityScorer;
use crate::detect::{EventCluster, Severity};
use crate::ingest::IncidentRecord;

/// How aggressively a type of incident clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criticality {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct ClusterDetector {
    cfg: ClusterConfig,
    scorer: SeverityScorer,
}

impl ClusterDetector {
    pub fn new(cfg: ClusterConfig) -> Self {
        let scorer = SeverityScorer::new(cfg.clone());
        Self { cfg, scorer }
    }

    /// Criticality-aware detection. The caller pre-filters records to the
    /// analysis window; `window_minutes` is carried through as a label only.
    pub fn detect(
        &self,
        records: &[IncidentRecord],
        window_minutes: u32,
    ) -> Option<EventCluster> {
        if records.is_empty() {
            return None;
        }

        for (location, type_groups) in group_by_location_then_type(records) {
            for (incident_type, group) in type_groups {
                let count = group.len();
                let qualifies = match self.criticality_of(incident_type) {
                    Criticality::High => count >= 2,
                    Criticality::Medium => {
                        count >= 3
                            && contains_location(
                                &self.cfg.high_vulnerability_locations,
                                location,
                            )
                    }
                    Criticality::Low => count >= 4,
                };

                if qualifies {
                    let severity = self.scorer.score(incident_type, count, location, &group);
                    let radius = self
                        .scorer
                        .affected_radius_km(incident_type, count, location, severity);
                    return Some(EventCluster {
                        event_type: incident_type.to_string(),
                        location: location.to_string(),
                        count: count as u32,
                        severity,
                        time_window: format!("{window_minutes} minutes"),
                        affected_radius_km: radius,
                        reasoning: format!(
                            "{count} {} incidents in {location} within {window_minutes} minutes; \
                             pattern analysis indicates {severity} priority",
                            incident_type.to_lowercase()
                        ),
                    });
                }
            }
        }

        None
    }

    /// Fixed-threshold detection: any (location, type) pair with three or
    /// more reports clusters, with its own simpler severity and radius
    /// formulas.
    pub fn detect_fallback(
        &self,
        records: &[IncidentRecord],
        window_minutes: u32,
    ) -> Option<EventCluster> {
        if records.is_empty() {
            return None;
        }

        for (location, type_groups) in group_by_location_then_type(records) {
            for (incident_type, group) in type_groups {
                let count = group.len();
                if count >= 3 {
                    let severity = fallback_severity(incident_type, count);
                    return Some(EventCluster {
                        event_type: incident_type.to_string(),
                        location: location.to_string(),
                        count: count as u32,
                        severity,
                        time_window: format!("{window_minutes} minutes"),
                        affected_radius_km: self.fallback_radius(incident_type, count),
                        reasoning: format!(
                            "count threshold crossed: {count} {} incidents in {location} \
                             within {window_minutes} minutes",
                            incident_type.to_lowercase()
                        ),
                    });
                }
            }
        }

        None
    }

    fn criticality_of(&self, incident_type: &str) -> Criticality {
        if contains_type(&self.cfg.critical_types, incident_type) {
            Criticality::High
        } else if contains_type(&self.cfg.elevated_types, incident_type) {
            Criticality::Medium
        } else {
            Criticality::Low
        }
    }

    fn fallback_radius(&self, incident_type: &str, count: usize) -> f64 {
        let base = self
            .cfg
            .fallback_base_radius_km
            .get(&incident_type.to_ascii_lowercase())
            .copied()
            .unwrap_or(self.cfg.fallback_default_radius_km);
        (base * (1.0 + count as f64 * 0.2)).clamp(0.0, self.cfg.max_radius_km)
    }
}

fn fallback_severity(incident_type: &str, count: usize) -> Severity {
    let ty = incident_type.to_ascii_lowercase();
    if ty == "emergency" || ty == "flooding" {
        if count >= 5 {
            return Severity::Critical;
        }
        if count >= 3 {
            return Severity::High;
        }
    } else if ty == "infrastructure" || ty == "maintenance" {
        if count >= 8 {
            return Severity::High;
        }
        if count >= 5 {
            return Severity::Medium;
        }
    }
    Severity::Low
}

/// Group by location then incident type, preserving first-seen order at both
/// levels so ties are broken by data order.
fn group_by_location_then_type(
    records: &[IncidentRecord],
) -> Vec<(&str, Vec<(&str, Vec<&IncidentRecord>)>)> {
    let mut location_order: Vec<&str> = Vec::new();
    let mut by_location: HashMap<&str, Vec<&IncidentRecord>> = HashMap::new();
    for record in records {
        let entry = by_location.entry(record.location.as_str()).or_default();
        if entry.is_empty() {
            location_order.push(record.location.as_str());
        }
        entry.push(record);
    }

    location_order
        .into_iter()
        .map(|location| {
            let group = &by_location[location];
            let mut type_order: Vec<&str> = Vec::new();
            let mut by_type: HashMap<&str, Vec<&IncidentRecord>> = HashMap::new();
            for &record in group {
                let entry = by_type.entry(record.incident_type.as_str()).or_default();
                if entry.is_empty() {
                    type_order.push(record.incident_type.as_str());
                }
                entry.push(record);
            }
            let typed = type_order
                .into_iter()
                .map(|ty| {
                    let members = by_type.remove(ty).unwrap_or_default();
                    (ty, members)
                })
                .collect();
            (location, typed)
        })
        .collect()
}
