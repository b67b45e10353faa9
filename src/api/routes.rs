//! API route definitions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::state::AppState;
use crate::ingest::IncidentRecord;
use crate::storage;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/alerts", get(list_alerts))
        .route("/risk", get(risk_query))
        .route("/reports", post(submit_report))
}

type ApiError = (StatusCode, String);

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "API handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

#[derive(Deserialize)]
struct AlertParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertParams>,
) -> Result<Json<Value>, ApiError> {
    let alerts = state
        .engine
        .alerts()
        .list_recent(params.limit)
        .map_err(internal)?;
    let total = alerts.len();
    Ok(Json(json!({
        "data": alerts,
        "meta": { "total": total }
    })))
}

#[derive(Deserialize)]
struct RiskParams {
    location: String,
    incident_type: String,
}

async fn risk_query(
    State(state): State<AppState>,
    Query(params): Query<RiskParams>,
) -> Result<Json<Value>, ApiError> {
    let verdict = state
        .engine
        .predict_risk(&params.location, &params.incident_type, Utc::now())
        .map_err(internal)?;
    Ok(Json(json!({
        "data": verdict,
        "meta": {
            "location": params.location,
            "incident_type": params.incident_type
        }
    })))
}

#[derive(Deserialize)]
struct ReportSubmission {
    incident_type: String,
    location: String,
    #[serde(default)]
    description: String,
    timestamp: Option<chrono::DateTime<Utc>>,
}

/// Ingest a report and append it to the incident history in one step.
async fn submit_report(
    State(state): State<AppState>,
    Json(submission): Json<ReportSubmission>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = IncidentRecord {
        id: uuid::Uuid::new_v4().to_string(),
        incident_type: submission.incident_type,
        location: submission.location,
        description: submission.description,
        timestamp: submission.timestamp.unwrap_or_else(Utc::now),
    };

    storage::save_report(&state.pool, &record).map_err(internal)?;
    state
        .engine
        .record_incident(&record.location, &record.incident_type, record.timestamp)
        .map_err(internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": { "id": record.id } })),
    ))
}
