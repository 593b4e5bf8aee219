//! Job status handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use docforge_common::{
    auth::AuthContext,
    db::Repository,
    errors::{AppError, Result},
};

/// Job status response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_id: Uuid,
    pub version_id: Uuid,
    pub status: String,
    pub stage: String,
    pub attempts: i32,
    pub max_attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub created_at: String,
}

/// Get job status
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobResponse>> {
    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let job = repo
        .find_job_by_id(job_id)
        .await?
        .ok_or_else(|| AppError::JobNotFound {
            id: job_id.to_string(),
        })?;

    // Verify tenant access
    if job.business_id != auth.tenant_id {
        return Err(AppError::TenantMismatch);
    }

    Ok(Json(JobResponse {
        job_id: job.id,
        version_id: job.version_id,
        status: job.status.clone(),
        stage: job.stage.clone(),
        attempts: job.attempts,
        max_attempts: job.max_attempts,
        error_code: job.error_code,
        last_error: job.last_error,
        metrics: job.metrics,
        next_retry_at: job.next_retry_at.map(|dt| dt.to_rfc3339()),
        started_at: job.started_at.map(|dt| dt.to_rfc3339()),
        completed_at: job.completed_at.map(|dt| dt.to_rfc3339()),
        created_at: job.created_at.to_rfc3339(),
    }))
}
