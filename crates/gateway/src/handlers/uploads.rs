//! Upload protocol handlers
//!
//! Init reserves an object key, document version, and ingestion job, and
//! hands back a presigned PUT URL. Complete materializes the version,
//! advances the job, and enqueues the ingestion event in one transaction,
//! so a crash never leaves a queued job without its event.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docforge_common::{
    auth::AuthContext,
    db::models::{JobStage, JobStatus},
    db::Repository,
    errors::{AppError, Result},
    jobs::{self, JobEvent, JobSnapshot},
    outbox::{EventEnvelope, IngestionRequested, OUTBOX_MAX_ATTEMPTS},
};

/// Request to start an upload
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(min = 1, max = 500))]
    pub filename: String,

    #[validate(length(min = 1, max = 255))]
    pub content_type: String,

    /// When present, the upload becomes the next version of this document
    pub document_id: Option<Uuid>,
}

/// Response carrying the presigned upload slot
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub document_id: Uuid,
    pub version_id: Uuid,
    pub job_id: Uuid,
    pub object_key: String,
    pub upload_url: String,
    pub expires_in: u64,
}

/// Init Upload: reserve key + version + job, return a presigned PUT URL.
pub async fn init_upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<InitUploadRequest>,
) -> Result<(StatusCode, Json<InitUploadResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
    })?;

    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let source_type = required_source_type(&request.filename)?;

    let reservation = match request.document_id {
        Some(document_id) => {
            let document = repo
                .find_document_by_id(document_id)
                .await?
                .ok_or_else(|| AppError::DocumentNotFound {
                    id: document_id.to_string(),
                })?;
            if document.business_id != auth.tenant_id {
                return Err(AppError::TenantMismatch);
            }
            if !document.is_active() {
                return Err(AppError::Conflict {
                    message: "document is deleted".to_string(),
                });
            }
            repo.create_next_version(
                &document,
                request.content_type.clone(),
                source_type,
                state.config.worker.max_attempts,
            )
            .await?
        }
        None => {
            repo.create_document_with_upload(
                auth.tenant_id,
                request.title.clone(),
                request.filename.clone(),
                request.content_type.clone(),
                source_type,
                auth.user_id,
                state.config.worker.max_attempts,
            )
            .await?
        }
    };

    let ttl = state.config.object_store.upload_ttl_secs;
    let upload_url = state
        .storage
        .upload_url(&reservation.version.object_key, &request.content_type, ttl)
        .await
        .map_err(|e| AppError::Storage {
            message: e.to_string(),
            retryable: e.is_retryable(),
        })?;

    tracing::info!(
        document_id = %reservation.document.id,
        version_id = %reservation.version.id,
        job_id = %reservation.job.id,
        tenant_id = %auth.tenant_id,
        "Upload initialized"
    );

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            document_id: reservation.document.id,
            version_id: reservation.version.id,
            job_id: reservation.job.id,
            object_key: reservation.version.object_key.clone(),
            upload_url,
            expires_in: ttl,
        }),
    ))
}

/// Request to finish an upload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub file_size: u64,
}

#[derive(Serialize)]
pub struct CompleteUploadResponse {
    pub status: &'static str,
}

/// Complete Upload: record size, queue the job, enqueue the event.
pub async fn complete_upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(version_id): Path<Uuid>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>> {
    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let limit = state.config.limits.max_file_size_bytes;
    if request.file_size > limit {
        return Err(AppError::PayloadTooLarge {
            size: request.file_size,
            limit,
        });
    }

    let version = repo
        .find_version_by_id(version_id)
        .await?
        .ok_or_else(|| AppError::VersionNotFound {
            id: version_id.to_string(),
        })?;

    let document = repo
        .find_document_by_id(version.document_id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound {
            id: version.document_id.to_string(),
        })?;
    if document.business_id != auth.tenant_id {
        return Err(AppError::TenantMismatch);
    }
    if !document.is_active() {
        return Err(AppError::Conflict {
            message: "document is deleted".to_string(),
        });
    }

    let job = repo
        .find_latest_job_for_version(version_id)
        .await?
        .ok_or_else(|| AppError::JobNotFound {
            id: version_id.to_string(),
        })?;

    // Idempotent completion: a second call finds the job already advanced.
    if !(job.job_status() == JobStatus::Queued && job.job_stage() == JobStage::PendingUpload) {
        return Ok(Json(CompleteUploadResponse { status: "queued" }));
    }

    let snapshot = JobSnapshot {
        status: job.job_status(),
        stage: job.job_stage(),
        attempts: job.attempts,
        max_attempts: job.max_attempts,
    };
    let transition = jobs::apply(&snapshot, &JobEvent::UploadCompleted)
        .map_err(|e| AppError::Conflict { message: e.to_string() })?;

    let envelope = EventEnvelope::ingestion_requested(&IngestionRequested {
        version_id: version.id,
        job_id: job.id,
        tenant_id: auth.tenant_id,
    })?;

    repo.complete_upload(
        &version,
        &job,
        request.file_size as i64,
        &transition,
        &envelope,
        auth.tenant_id,
        OUTBOX_MAX_ATTEMPTS,
    )
    .await?;

    tracing::info!(
        version_id = %version.id,
        job_id = %job.id,
        file_size = request.file_size,
        "Upload completed, ingestion queued"
    );

    Ok(Json(CompleteUploadResponse { status: "queued" }))
}

/// Infer the job's source type from the uploaded filename.
fn required_source_type(filename: &str) -> Result<docforge_common::db::models::SourceType> {
    docforge_common::db::models::SourceType::from_filename(filename).ok_or_else(|| {
        AppError::Validation {
            message: format!("unsupported file type: {}", filename),
        }
    })
}
