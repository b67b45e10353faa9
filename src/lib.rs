//! citypulse -- city incident pattern detection and risk scoring.
//!
//! This crate provides the core library for incident cluster detection,
//! statistical anomaly detection, composite risk prediction, alert
//! recording, and the daemon that runs them on a schedule.

pub mod api;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use crate::config::DetectConfig;
use crate::detect::engine::PatternEngine;
use crate::ingest::{ReportSource, SqliteReportSource};

/// Start the citypulse daemon: API server plus the periodic scan loop.
pub async fn serve(bind: &str, db_path: &str, cfg: DetectConfig) -> Result<()> {
    // 1. Initialize Storage
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    // 2. Build the engine and its report source
    let engine = PatternEngine::new(pool.clone(), cfg.clone());
    let source: Arc<dyn ReportSource> = Arc::new(SqliteReportSource::new(pool.clone()));

    // 3. Start scan loop (background task)
    let scan_engine = engine.clone();
    let window = cfg.scan_window_minutes;
    let interval = cfg.scan_interval_secs;
    tokio::spawn(async move {
        run_scan_loop(scan_engine, source, window, interval).await;
    });

    // 4. Start API Server
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(api::state::AppState { pool, engine });

    tracing::info!(%addr, "citypulse listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Fetch the trailing report window and analyze it, forever. Scan failures
/// are logged and the loop keeps going; nothing here may take the daemon
/// down.
async fn run_scan_loop(
    engine: PatternEngine,
    source: Arc<dyn ReportSource>,
    window_minutes: u32,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let now = chrono::Utc::now();

        let records = match source.fetch_window(window_minutes, now).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "Report fetch failed; skipping tick");
                continue;
            }
        };

        let tick_engine = engine.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            tick_engine.analyze(&records, window_minutes, now)
        })
        .await;

        match outcome {
            Ok(Ok(Some(cluster))) => {
                tracing::info!(
                    location = %cluster.location,
                    severity = %cluster.severity,
                    "Scan tick produced a cluster alert"
                );
            }
            Ok(Ok(None)) => tracing::debug!("Scan tick clean"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Scan tick failed"),
            Err(e) => tracing::warn!(error = %e, "Scan task panicked"),
        }
    }
}
