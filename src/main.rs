use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::Rng;

use citypulse::config::DetectConfig;
use citypulse::detect::engine::PatternEngine;
use citypulse::ingest::IncidentRecord;
use citypulse::storage;

#[derive(Parser)]
#[command(
    name = "citypulse",
    about = "City incident pattern detection and risk scoring",
    version,
    long_about = None
)]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, default_value = "data/citypulse.db")]
    db: String,

    /// Detection config file (TOML); defaults apply if missing
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + periodic pattern scans)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
    },

    /// Run a one-shot pattern scan over the trailing report window
    Scan {
        /// Analysis window in minutes
        #[arg(long, default_value = "20")]
        window: u32,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Predict future incident risk for a location/type pair
    Risk {
        /// Location name (e.g. "HSR Layout")
        #[arg(long)]
        location: String,

        /// Incident type (e.g. "flooding")
        #[arg(long)]
        incident_type: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Seed synthetic incident reports for demos
    Seed {
        /// Number of reports to generate
        #[arg(long, default_value = "12")]
        count: u32,
    },

    /// Delete incident history older than the retention horizon
    Prune {
        /// Retention horizon in days
        #[arg(long, default_value = "90")]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = match cli.config.as_deref() {
        Some(path) => DetectConfig::load(path),
        None => DetectConfig::default(),
    };

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!(%bind, "Starting citypulse daemon");
            ensure_parent_dir(&cli.db)?;
            citypulse::serve(&bind, &cli.db, cfg).await?;
        }
        Commands::Scan { window, json } => {
            ensure_parent_dir(&cli.db)?;
            let pool = storage::open_pool(&cli.db)?;
            let engine = PatternEngine::new(pool, cfg);
            let cluster = engine.run_scan(window, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cluster)?);
            } else {
                match cluster {
                    Some(c) => {
                        println!("\n=== citypulse Pattern Scan ===");
                        println!("Cluster:   {} @ {}", c.event_type, c.location);
                        println!("Count:     {} in {}", c.count, c.time_window);
                        println!("Severity:  {}", c.severity);
                        println!("Radius:    {:.1} km", c.affected_radius_km);
                        println!("Reasoning: {}", c.reasoning);
                        println!("==============================\n");
                    }
                    None => println!("No concerning pattern in the last {window} minutes."),
                }
            }
        }
        Commands::Risk {
            location,
            incident_type,
            json,
        } => {
            ensure_parent_dir(&cli.db)?;
            let pool = storage::open_pool(&cli.db)?;
            let engine = PatternEngine::new(pool, cfg);
            let verdict = engine.predict_risk(&location, &incident_type, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!("\n=== citypulse Risk Outlook ===");
                println!("Pair:       {incident_type} @ {location}");
                println!("Level:      {}", verdict.risk_level);
                println!("Score:      {:.2}", verdict.risk_score);
                println!("Confidence: {:.0}%", verdict.confidence * 100.0);
                if let Some(window) = &verdict.predicted_timeframe {
                    println!("Timeframe:  {window}");
                }
                if !verdict.contributing_factors.is_empty() {
                    println!("\nContributing factors:");
                    for factor in &verdict.contributing_factors {
                        println!(" - {factor}");
                    }
                }
                if !verdict.recommended_actions.is_empty() {
                    println!("\nRecommended actions:");
                    for action in &verdict.recommended_actions {
                        println!(" - {action}");
                    }
                }
                println!("==============================\n");
            }
        }
        Commands::Seed { count } => {
            ensure_parent_dir(&cli.db)?;
            let pool = storage::open_pool(&cli.db)?;
            let engine = PatternEngine::new(pool.clone(), cfg);
            let seeded = seed_reports(&pool, &engine, count)?;
            println!("Seeded {seeded} synthetic reports into {}.", cli.db);
        }
        Commands::Prune { days } => {
            ensure_parent_dir(&cli.db)?;
            let pool = storage::open_pool(&cli.db)?;
            let removed = storage::prune_history(&pool, Utc::now() - Duration::days(days))?;
            println!("Pruned {removed} history rows older than {days} days.");
        }
    }

    Ok(())
}

fn ensure_parent_dir(db_path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

const SEED_LOCATIONS: [&str; 6] = [
    "HSR Layout",
    "Whitefield",
    "Koramangala",
    "Electronic City",
    "Indiranagar",
    "Jayanagar",
];

const SEED_TYPES: [&str; 5] = ["Flooding", "Infrastructure", "Emergency", "Maintenance", "Traffic"];

const SEED_DESCRIPTIONS: [&str; 6] = [
    "multiple residents reporting the issue",
    "urgent response requested by locals",
    "ongoing since early morning",
    "severe disruption on the main road",
    "crew dispatched, work in progress",
    "reported by a passing commuter",
];

/// Generate a burst of plausible reports in the trailing 20 minutes, and
/// mirror each into the incident history for risk demos.
fn seed_reports(pool: &storage::Pool, engine: &PatternEngine, count: u32) -> Result<u32> {
    let mut rng = rand::thread_rng();
    let now = Utc::now();

    for _ in 0..count {
        let location = SEED_LOCATIONS.choose(&mut rng).unwrap_or(&"HSR Layout");
        let incident_type = SEED_TYPES.choose(&mut rng).unwrap_or(&"Maintenance");
        let description = SEED_DESCRIPTIONS.choose(&mut rng).unwrap_or(&"");
        let timestamp = now - Duration::minutes(rng.gen_range(0..20));

        let record = IncidentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            incident_type: incident_type.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            timestamp,
        };
        storage::save_report(pool, &record)?;
        engine.record_incident(location, incident_type, timestamp)?;
    }

    Ok(count)
}
