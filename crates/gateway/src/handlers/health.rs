//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;
use docforge_common::db::Repository;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness: the process is up
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: docforge_common::VERSION,
    })
}

/// Readiness: the database answers
pub async fn ready(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let repo = Repository::new(state.db.clone());
    match repo.ping().await {
        Ok(()) => Ok(Json(HealthResponse {
            status: "ready",
            version: docforge_common::VERSION,
        })),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}
