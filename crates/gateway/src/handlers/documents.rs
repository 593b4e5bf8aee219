//! Document management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use docforge_common::{
    auth::AuthContext,
    db::models::{Document, DocumentVersion},
    db::Repository,
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    20
}

/// Response for a single document
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub file_name: String,
    pub status: String,
    pub labels: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionResponse>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub id: Uuid,
    pub version_number: i32,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: u64,
}

fn to_response(document: Document, versions: Option<Vec<DocumentVersion>>) -> DocumentResponse {
    DocumentResponse {
        id: document.id,
        title: document.title,
        file_name: document.file_name,
        status: document.status,
        labels: document.labels,
        created_at: document.created_at.to_rfc3339(),
        updated_at: document.updated_at.to_rfc3339(),
        versions: versions.map(|versions| {
            versions
                .into_iter()
                .map(|v| VersionResponse {
                    id: v.id,
                    version_number: v.version_number,
                    mime_type: v.mime_type,
                    file_size: v.file_size,
                    content_hash: v.content_hash,
                    created_at: v.created_at.to_rfc3339(),
                })
                .collect()
        }),
    }
}

/// Load a document and verify tenant access
async fn load_owned(repo: &Repository, auth: &AuthContext, id: Uuid) -> Result<Document> {
    let document = repo
        .find_document_by_id(id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

    if document.business_id != auth.tenant_id {
        return Err(AppError::TenantMismatch);
    }
    Ok(document)
}

/// List documents for the tenant
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<DocumentListResponse>> {
    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let limit = query.limit.clamp(1, 100);
    let (documents, total) = repo.list_documents(auth.tenant_id, query.offset, limit).await?;

    Ok(Json(DocumentListResponse {
        documents: documents.into_iter().map(|d| to_response(d, None)).collect(),
        total,
    }))
}

/// Get a document with its versions
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let document = load_owned(&repo, &auth, id).await?;
    let versions = repo.list_versions(id).await?;

    Ok(Json(to_response(document, Some(versions))))
}

/// Request to update document metadata
#[derive(Debug, Deserialize, Validate)]
pub struct PatchDocumentRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: Option<String>,

    pub labels: Option<Vec<String>>,
}

/// Update mutable document metadata
pub async fn patch_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<PatchDocumentRequest>,
) -> Result<Json<DocumentResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
    })?;

    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let document = load_owned(&repo, &auth, id).await?;
    let updated = repo
        .update_document(&document, request.title, request.labels)
        .await?;

    Ok(Json(to_response(updated, None)))
}

/// Soft-delete a document; non-terminal jobs are cancelled and in-flight
/// jobs observe the deletion at their next stage boundary.
pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    auth.ensure_member(&repo).await?;

    let document = load_owned(&repo, &auth, id).await?;
    if !document.is_active() {
        return Ok(StatusCode::NO_CONTENT);
    }

    repo.soft_delete_document(&document).await?;

    tracing::info!(
        document_id = %id,
        tenant_id = %auth.tenant_id,
        "Document marked for deletion"
    );

    Ok(StatusCode::NO_CONTENT)
}
