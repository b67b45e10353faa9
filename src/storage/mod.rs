//! SQLite storage layer -- connection pool, report and history queries.
//!
//! The history table is the engine's only shared mutable state: an
//! append-only (location, incident_type, occurred_at) log consulted by risk
//! prediction and pruned to the retention horizon.

pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::ingest::IncidentRecord;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// An in-memory pool for tests and throwaway analysis runs.
pub fn open_memory_pool() -> Result<Pool> {
    let manager = SqliteConnectionManager::memory();
    let pool = R2D2Pool::builder().max_size(1).build(manager)?;
    let conn = pool.get()?;
    schema::migrate(&conn)?;
    Ok(pool)
}

/// Persist an ingested incident report.
pub fn save_report(pool: &Pool, record: &IncidentRecord) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO reports (id, incident_type, location, description, reported_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id,
            record.incident_type,
            record.location,
            record.description,
            record.timestamp.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Reports whose own timestamps fall inside the trailing window, oldest
/// first so grouping preserves arrival order.
pub fn recent_reports(
    pool: &Pool,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> Result<Vec<IncidentRecord>> {
    let cutoff = now - Duration::minutes(i64::from(window_minutes));
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, incident_type, location, description, reported_at FROM reports
         WHERE datetime(reported_at) > datetime(?1)
         ORDER BY reported_at ASC",
    )?;

    let rows = stmt.query_map([cutoff.to_rfc3339()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut reports = Vec::new();
    for r in rows {
        let (id, incident_type, location, description, reported_at) = r?;
        let timestamp = DateTime::parse_from_rfc3339(&reported_at)
            .with_context(|| format!("bad reported_at on report {id}"))?
            .with_timezone(&Utc);
        reports.push(IncidentRecord {
            id,
            incident_type,
            location,
            description,
            timestamp,
        });
    }
    Ok(reports)
}

/// Append one occurrence to the per-(location, type) history log.
pub fn record_history(
    pool: &Pool,
    location: &str,
    incident_type: &str,
    occurred_at: DateTime<Utc>,
) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO incident_history (location, incident_type, occurred_at)
         VALUES (?1, ?2, ?3)",
        params![location, incident_type, occurred_at.to_rfc3339()],
    )?;
    Ok(())
}

/// Full history for a (location, type) pair, oldest first.
pub fn history_for(
    pool: &Pool,
    location: &str,
    incident_type: &str,
) -> Result<Vec<DateTime<Utc>>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT occurred_at FROM incident_history
         WHERE location = ?1 AND incident_type = ?2
         ORDER BY occurred_at ASC",
    )?;

    let rows = stmt.query_map(params![location, incident_type], |row| {
        row.get::<_, String>(0)
    })?;

    let mut timestamps = Vec::new();
    for r in rows {
        let raw = r?;
        timestamps.push(
            DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("bad occurred_at in history: {raw}"))?
                .with_timezone(&Utc),
        );
    }
    Ok(timestamps)
}

/// Drop history rows older than the cutoff. Returns the number removed.
pub fn prune_history(pool: &Pool, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM incident_history WHERE datetime(occurred_at) < datetime(?1)",
        [cutoff.to_rfc3339()],
    )?;
    Ok(removed)
}
