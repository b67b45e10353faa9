//! Detection configuration -- every categorical table the detectors consult
//! (location sets, keyword lists, radius tables, thresholds) lives here so it
//! can be overridden from a TOML file without touching code.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;
use tracing::{info, warn};

/// Top-level detection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub cluster: ClusterConfig,
    pub anomaly: AnomalyConfig,
    pub risk: RiskConfig,

    /// History retention horizon in days. Rows older than this are pruned
    /// on every scan tick.
    pub retention_days: i64,

    /// Analysis window fed to cluster detection by the daemon loop.
    pub scan_window_minutes: u32,

    /// Seconds between daemon scan ticks.
    pub scan_interval_secs: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterConfig::default(),
            anomaly: AnomalyConfig::default(),
            risk: RiskConfig::default(),
            retention_days: 90,
            scan_window_minutes: 20,
            scan_interval_secs: 300,
        }
    }
}

impl DetectConfig {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file is missing or malformed.
    pub fn load(path: &str) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match toml::from_str(&content) {
                Ok(cfg) => {
                    info!("Loaded detection config from {}", path);
                    return cfg;
                }
                Err(e) => {
                    warn!("Failed to parse config at {}: {}. Using defaults.", path, e);
                }
            }
        } else {
            warn!("Config file not found at {}. Using defaults.", path);
        }

        Self::default()
    }
}

/// Tables consulted by cluster detection and severity scoring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Incident types where even two reports form a concerning cluster.
    pub critical_types: Vec<String>,
    /// Incident types that cluster at three reports, but only in a
    /// high-vulnerability location.
    pub elevated_types: Vec<String>,

    /// Locations where elevated-type clusters are taken seriously.
    pub high_vulnerability_locations: Vec<String>,
    /// Locations that add a point to the severity total.
    pub high_impact_locations: Vec<String>,
    /// Locations where the affected radius is widened.
    pub high_density_locations: Vec<String>,

    /// Types weighted +3 in severity scoring (and on the steeper
    /// frequency-intensity tier).
    pub severe_weight_types: Vec<String>,
    /// Types weighted +2 in severity scoring.
    pub moderate_weight_types: Vec<String>,

    /// Description keywords worth +2 (first hit per record).
    pub high_severity_words: Vec<String>,
    /// Description keywords worth +1 (first hit per record).
    pub medium_severity_words: Vec<String>,

    /// Base affected radius per incident type (km), criticality policy.
    pub base_radius_km: HashMap<String, f64>,
    pub default_radius_km: f64,

    /// Base affected radius per incident type (km), fallback policy.
    pub fallback_base_radius_km: HashMap<String, f64>,
    pub fallback_default_radius_km: f64,

    /// Hard cap on any computed radius.
    pub max_radius_km: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            critical_types: strings(&["emergency", "flooding", "fire", "gas leak"]),
            elevated_types: strings(&["infrastructure", "power outage", "water outage"]),
            high_vulnerability_locations: strings(&[
                "HSR Layout",
                "Whitefield",
                "Electronic City",
                "Marathahalli",
            ]),
            high_impact_locations: strings(&[
                "HSR Layout",
                "Whitefield",
                "Koramangala",
                "Indiranagar",
            ]),
            high_density_locations: strings(&["HSR Layout", "Koramangala", "BTM Layout"]),
            severe_weight_types: strings(&["emergency", "flooding"]),
            moderate_weight_types: strings(&["infrastructure"]),
            high_severity_words: strings(&[
                "urgent",
                "critical",
                "severe",
                "major",
                "widespread",
                "complete",
            ]),
            medium_severity_words: strings(&["multiple", "ongoing", "affecting", "reported"]),
            base_radius_km: radii(&[
                ("flooding", 6.0),
                ("infrastructure", 4.0),
                ("emergency", 8.0),
                ("maintenance", 3.0),
            ]),
            default_radius_km: 4.0,
            fallback_base_radius_km: radii(&[
                ("flooding", 5.0),
                ("infrastructure", 3.0),
                ("emergency", 7.0),
                ("maintenance", 2.0),
            ]),
            fallback_default_radius_km: 3.0,
            max_radius_km: 15.0,
        }
    }
}

/// Tables and thresholds for statistical anomaly detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Data types checked against the tight threshold.
    pub sensitive_types: Vec<String>,
    /// Data types checked against the standard threshold. Anything not
    /// listed in either table gets the relaxed threshold.
    pub standard_types: Vec<String>,

    pub sensitive_threshold: f64,
    pub standard_threshold: f64,
    pub relaxed_threshold: f64,

    /// Locations with noisy baselines; the threshold is raised there.
    pub high_variance_locations: Vec<String>,
    pub high_variance_penalty: f64,

    /// Minimum historical points for a confident verdict.
    pub min_history: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            sensitive_types: strings(&["emergency", "critical_infrastructure"]),
            standard_types: strings(&["environmental", "traffic"]),
            sensitive_threshold: 1.5,
            standard_threshold: 2.0,
            relaxed_threshold: 2.5,
            high_variance_locations: strings(&["Downtown", "Electronic City"]),
            high_variance_penalty: 0.5,
            min_history: 3,
        }
    }
}

/// Tables consulted by risk prediction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub high_risk_locations: Vec<String>,
    pub medium_risk_locations: Vec<String>,

    pub high_risk_types: Vec<String>,
    pub medium_risk_types: Vec<String>,

    /// Types that carry extra seasonal weight during monsoon months (Jun-Sep).
    pub flood_season_types: Vec<String>,
    /// Types that carry extra seasonal weight during summer months (Mar-May).
    pub grid_strain_types: Vec<String>,

    /// Minimum historical timestamps for a prediction.
    pub min_history: usize,

    /// Width of the "recent" window used for frequency scoring, in days.
    pub recent_window_days: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_risk_locations: strings(&[
                "HSR Layout",
                "Electronic City",
                "Whitefield",
                "Outer Ring Road",
            ]),
            medium_risk_locations: strings(&["Koramangala", "Indiranagar", "BTM Layout"]),
            high_risk_types: strings(&["emergency", "flooding", "fire", "infrastructure"]),
            medium_risk_types: strings(&["maintenance", "traffic", "utilities"]),
            flood_season_types: strings(&["flooding", "waterlogging"]),
            grid_strain_types: strings(&["infrastructure", "power"]),
            min_history: 3,
            recent_window_days: 7,
        }
    }
}

/// Case-insensitive membership test for incident/data type tables.
pub fn contains_type(table: &[String], value: &str) -> bool {
    table.iter().any(|t| t.eq_ignore_ascii_case(value))
}

/// Exact membership test for location tables.
pub fn contains_location(table: &[String], value: &str) -> bool {
    table.iter().any(|l| l == value)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn radii(items: &[(&str, f64)]) -> HashMap<String, f64> {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_tables() {
        let cfg = DetectConfig::default();
        assert!(contains_type(&cfg.cluster.critical_types, "Flooding"));
        assert!(contains_type(&cfg.cluster.critical_types, "gas leak"));
        assert!(contains_location(
            &cfg.cluster.high_vulnerability_locations,
            "Marathahalli"
        ));
        assert_eq!(cfg.cluster.base_radius_km.get("emergency"), Some(&8.0));
        assert_eq!(cfg.cluster.max_radius_km, 15.0);
        assert_eq!(cfg.anomaly.min_history, 3);
        assert_eq!(cfg.retention_days, 90);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let cfg = DetectConfig::load("does_not_exist.toml");
        assert_eq!(cfg.scan_window_minutes, 20);
    }

    #[test]
    fn test_partial_toml_override() {
        let cfg: DetectConfig = toml::from_str(
            r#"
            retention_days = 30

            [anomaly]
            relaxed_threshold = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.anomaly.relaxed_threshold, 3.0);
        // Untouched sections keep their defaults
        assert_eq!(cfg.anomaly.sensitive_threshold, 1.5);
        assert!(!cfg.cluster.critical_types.is_empty());
    }
}
