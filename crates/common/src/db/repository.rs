//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling and transaction support. Stage-local writes (pages,
//! chunks, embeddings) are delete-then-insert inside a single transaction
//! so dispatcher re-deliveries after partial failure are safe.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::jobs::{with_jitter, Transition};
use crate::storage::generate_key;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

/// A page row to persist, as produced by the parser layer.
#[derive(Debug, Clone)]
pub struct NewPage {
    pub page_number: i32,
    pub content: String,
    pub char_count: i32,
}

/// A chunk row to persist, as produced by the chunker.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: i32,
    pub content: String,
    pub page_start: i32,
    pub page_end: i32,
    pub sentences: Vec<String>,
}

/// Everything Init Upload creates in one transaction.
#[derive(Debug, Clone)]
pub struct UploadReservation {
    pub document: Document,
    pub version: DocumentVersion,
    pub job: IngestionJob,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Business Member Operations (auth collaborator)
    // ========================================================================

    /// Find a member row; the gateway's tenant access check
    pub async fn find_member(
        &self,
        business_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<BusinessMember>> {
        BusinessMemberEntity::find()
            .filter(BusinessMemberColumn::BusinessId.eq(business_id))
            .filter(BusinessMemberColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Init Upload: create document, version 1, and the pending-upload job
    /// in one transaction.
    pub async fn create_document_with_upload(
        &self,
        business_id: Uuid,
        title: String,
        file_name: String,
        mime_type: String,
        source_type: SourceType,
        uploaded_by: Uuid,
        max_attempts: i32,
    ) -> Result<UploadReservation> {
        let txn = self.write_conn().begin().await?;
        let now = chrono::Utc::now();
        let document_id = Uuid::new_v4();

        let document = DocumentActiveModel {
            id: Set(document_id),
            business_id: Set(business_id),
            title: Set(title),
            file_name: Set(file_name),
            status: Set(String::from(DocumentStatus::Active)),
            uploaded_by: Set(uploaded_by),
            labels: Set(serde_json::json!([])),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let (version, job) = Self::reserve_version(
            &txn,
            &document,
            1,
            mime_type,
            source_type,
            max_attempts,
        )
        .await?;

        txn.commit().await?;

        Ok(UploadReservation {
            document,
            version,
            job,
        })
    }

    /// Init Upload onto an existing document: reserve the next contiguous
    /// version number and pair it with a fresh job.
    pub async fn create_next_version(
        &self,
        document: &Document,
        mime_type: String,
        source_type: SourceType,
        max_attempts: i32,
    ) -> Result<UploadReservation> {
        let txn = self.write_conn().begin().await?;

        let latest = DocumentVersionEntity::find()
            .filter(DocumentVersionColumn::DocumentId.eq(document.id))
            .order_by_desc(DocumentVersionColumn::VersionNumber)
            .one(&txn)
            .await?;
        let next_number = latest.map(|v| v.version_number + 1).unwrap_or(1);

        let (version, job) = Self::reserve_version(
            &txn,
            document,
            next_number,
            mime_type,
            source_type,
            max_attempts,
        )
        .await?;

        txn.commit().await?;

        Ok(UploadReservation {
            document: document.clone(),
            version,
            job,
        })
    }

    async fn reserve_version(
        txn: &sea_orm::DatabaseTransaction,
        document: &Document,
        version_number: i32,
        mime_type: String,
        source_type: SourceType,
        max_attempts: i32,
    ) -> Result<(DocumentVersion, IngestionJob)> {
        let now = chrono::Utc::now();
        let version_id = Uuid::new_v4();
        let object_key = generate_key(document.business_id, document.id, version_number);

        let version = DocumentVersionActiveModel {
            id: Set(version_id),
            document_id: Set(document.id),
            version_number: Set(version_number),
            object_key: Set(object_key),
            mime_type: Set(mime_type),
            file_size: Set(None),
            content_hash: Set(None),
            created_at: Set(now.into()),
        }
        .insert(txn)
        .await?;

        let job = IngestionJobActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(document.business_id),
            version_id: Set(version_id),
            source_type: Set(source_type.as_str().to_string()),
            status: Set(String::from(JobStatus::Queued)),
            stage: Set(String::from(JobStage::PendingUpload)),
            attempts: Set(0),
            max_attempts: Set(max_attempts),
            last_error: Set(None),
            error_code: Set(None),
            metrics: Set(None),
            next_retry_at: Set(None),
            created_at: Set(now.into()),
            started_at: Set(None),
            completed_at: Set(None),
        }
        .insert(txn)
        .await?;

        Ok((version, job))
    }

    /// Find document by ID
    pub async fn find_document_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List documents for a tenant with pagination
    pub async fn list_documents(
        &self,
        business_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Document>, u64)> {
        let paginator = DocumentEntity::find()
            .filter(DocumentColumn::BusinessId.eq(business_id))
            .filter(DocumentColumn::Status.ne(String::from(DocumentStatus::Deleted)))
            .order_by_desc(DocumentColumn::CreatedAt)
            .paginate(self.read_conn(), limit.max(1));

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(offset / limit.max(1)).await?;

        Ok((documents, total))
    }

    /// Update mutable document metadata. Deleted documents are frozen.
    pub async fn update_document(
        &self,
        document: &Document,
        title: Option<String>,
        labels: Option<Vec<String>>,
    ) -> Result<Document> {
        if document.document_status() != DocumentStatus::Active {
            return Err(AppError::Conflict {
                message: "document is deleted; metadata is frozen".to_string(),
            });
        }

        let mut model: DocumentActiveModel = document.clone().into();
        if let Some(title) = title {
            model.title = Set(title);
        }
        if let Some(labels) = labels {
            model.labels = Set(serde_json::json!(labels));
        }
        model.updated_at = Set(chrono::Utc::now().into());

        model.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Soft-delete a document and cancel its non-terminal jobs.
    ///
    /// Jobs already leased (processing) are left to the coordinator, which
    /// observes the status flip at the next stage boundary.
    pub async fn soft_delete_document(&self, document: &Document) -> Result<Document> {
        let txn = self.write_conn().begin().await?;
        let now = chrono::Utc::now();

        let mut model: DocumentActiveModel = document.clone().into();
        model.status = Set(String::from(DocumentStatus::DeletedPending));
        model.deleted_at = Set(Some(now.into()));
        model.updated_at = Set(now.into());
        let updated = model.update(&txn).await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE ingestion_jobs j
            SET status = 'cancelled', completed_at = $1
            FROM document_versions v
            WHERE j.version_id = v.id
              AND v.document_id = $2
              AND j.status IN ('queued', 'retry_ready')
            "#,
            vec![now.into(), document.id.into()],
        );
        txn.execute(stmt).await?;

        txn.commit().await?;
        Ok(updated)
    }

    // ========================================================================
    // Version Operations
    // ========================================================================

    /// Find version by ID
    pub async fn find_version_by_id(&self, id: Uuid) -> Result<Option<DocumentVersion>> {
        DocumentVersionEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List versions for a document, oldest first
    pub async fn list_versions(&self, document_id: Uuid) -> Result<Vec<DocumentVersion>> {
        DocumentVersionEntity::find()
            .filter(DocumentVersionColumn::DocumentId.eq(document_id))
            .order_by_asc(DocumentVersionColumn::VersionNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Complete Upload: materialize the version, advance the job, and
    /// enqueue the outbox event in one transaction.
    pub async fn complete_upload(
        &self,
        version: &DocumentVersion,
        job: &IngestionJob,
        file_size: i64,
        transition: &Transition,
        envelope: &crate::outbox::EventEnvelope,
        business_id: Uuid,
        outbox_max_attempts: i32,
    ) -> Result<()> {
        let txn = self.write_conn().begin().await?;
        let now = chrono::Utc::now();

        let mut version_model: DocumentVersionActiveModel = version.clone().into();
        version_model.file_size = Set(Some(file_size));
        version_model.update(&txn).await?;

        let mut job_model: IngestionJobActiveModel = job.clone().into();
        job_model.status = Set(String::from(transition.status));
        job_model.stage = Set(String::from(transition.stage));
        job_model.update(&txn).await?;

        EventOutboxActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(business_id),
            event_type: Set(envelope.event_type.clone()),
            payload: Set(serde_json::to_value(envelope)?),
            attempts: Set(0),
            max_attempts: Set(outbox_max_attempts),
            last_error: Set(None),
            next_retry_at: Set(None),
            locked_at: Set(None),
            lease_expires_at: Set(None),
            created_at: Set(now.into()),
            processed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Record the SHA-256 of the downloaded bytes (set once at parse time)
    pub async fn record_content_hash(&self, version_id: Uuid, hash: &str) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE document_versions SET content_hash = $1 WHERE id = $2 AND content_hash IS NULL",
            vec![hash.into(), version_id.into()],
        );
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Job Operations
    // ========================================================================

    /// Find job by ID
    pub async fn find_job_by_id(&self, id: Uuid) -> Result<Option<IngestionJob>> {
        IngestionJobEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find the most recent job for a version
    pub async fn find_latest_job_for_version(
        &self,
        version_id: Uuid,
    ) -> Result<Option<IngestionJob>> {
        IngestionJobEntity::find()
            .filter(IngestionJobColumn::VersionId.eq(version_id))
            .order_by_desc(IngestionJobColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Persist a state-machine transition onto the job row.
    pub async fn apply_transition(
        &self,
        job: &IngestionJob,
        transition: &Transition,
    ) -> Result<IngestionJob> {
        let now = chrono::Utc::now();
        let mut model: IngestionJobActiveModel = job.clone().into();

        model.status = Set(String::from(transition.status));
        model.stage = Set(String::from(transition.stage));
        model.attempts = Set(transition.attempts);

        if let Some(code) = transition.error_code {
            model.error_code = Set(Some(code.as_str().to_string()));
        }
        if let Some(ref message) = transition.last_error {
            model.last_error = Set(Some(message.clone()));
        }

        match transition.retry_delay {
            Some(delay) => {
                let delay = with_jitter(delay);
                let delay =
                    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                model.next_retry_at = Set(Some((now + delay).into()));
            }
            None => model.next_retry_at = Set(None),
        }

        if transition.sets_started_at && job.started_at.is_none() {
            model.started_at = Set(Some(now.into()));
        }
        if transition.sets_completed_at {
            model.completed_at = Set(Some(now.into()));
        }

        model.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Record final job metrics (pageCount, chunkCount, totalWords,
    /// parserUsed)
    pub async fn record_job_metrics(
        &self,
        job_id: Uuid,
        metrics: serde_json::Value,
    ) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE ingestion_jobs SET metrics = $1 WHERE id = $2",
            vec![metrics.into(), job_id.into()],
        );
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Page / Chunk / Embedding Operations (stage-local idempotence)
    // ========================================================================

    /// Replace all pages for a version atomically.
    pub async fn replace_pages(&self, version_id: Uuid, pages: &[NewPage]) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        DocumentPageEntity::delete_many()
            .filter(DocumentPageColumn::VersionId.eq(version_id))
            .exec(&txn)
            .await?;

        if !pages.is_empty() {
            let models: Vec<DocumentPageActiveModel> = pages
                .iter()
                .map(|page| DocumentPageActiveModel {
                    id: Set(Uuid::new_v4()),
                    version_id: Set(version_id),
                    page_number: Set(page.page_number),
                    content: Set(page.content.clone()),
                    char_count: Set(page.char_count),
                })
                .collect();
            DocumentPageEntity::insert_many(models).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Replace all chunks for a version atomically. Returns the inserted
    /// rows in index order so embeddings can be paired by position.
    pub async fn replace_chunks(
        &self,
        version_id: Uuid,
        chunks: &[NewChunk],
    ) -> Result<Vec<DocumentChunk>> {
        let txn = self.write_conn().begin().await?;
        let now = chrono::Utc::now();

        // Embeddings reference chunks; clear them first so the FK holds.
        ChunkEmbeddingEntity::delete_many()
            .filter(ChunkEmbeddingColumn::VersionId.eq(version_id))
            .exec(&txn)
            .await?;

        DocumentChunkEntity::delete_many()
            .filter(DocumentChunkColumn::VersionId.eq(version_id))
            .exec(&txn)
            .await?;

        let mut inserted = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let model = DocumentChunkActiveModel {
                id: Set(Uuid::new_v4()),
                version_id: Set(version_id),
                chunk_index: Set(chunk.chunk_index),
                content: Set(chunk.content.clone()),
                page_start: Set(chunk.page_start),
                page_end: Set(chunk.page_end),
                sentences: Set(serde_json::json!(chunk.sentences)),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            inserted.push(model);
        }

        txn.commit().await?;
        Ok(inserted)
    }

    /// Replace all embeddings for a version atomically, in chunk order.
    pub async fn replace_embeddings(
        &self,
        version_id: Uuid,
        items: &[(Uuid, Vec<f32>)],
        model: &str,
    ) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        ChunkEmbeddingEntity::delete_many()
            .filter(ChunkEmbeddingColumn::VersionId.eq(version_id))
            .exec(&txn)
            .await?;

        for (chunk_id, embedding) in items {
            // Convert Vec<f32> to pgvector text format "[1.0,2.0,...]"
            let embedding_str = format!(
                "[{}]",
                embedding
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            );

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO chunk_embeddings (
                    id, chunk_id, version_id, embedding, model, created_at
                )
                VALUES ($1, $2, $3, $4::vector, $5, NOW())
                "#,
                vec![
                    Uuid::new_v4().into(),
                    (*chunk_id).into(),
                    version_id.into(),
                    embedding_str.into(),
                    model.into(),
                ],
            );
            txn.execute(stmt).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Get pages for a version, in page order
    pub async fn get_pages_by_version(&self, version_id: Uuid) -> Result<Vec<DocumentPage>> {
        DocumentPageEntity::find()
            .filter(DocumentPageColumn::VersionId.eq(version_id))
            .order_by_asc(DocumentPageColumn::PageNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Get chunks for a version, in index order
    pub async fn get_chunks_by_version(&self, version_id: Uuid) -> Result<Vec<DocumentChunk>> {
        DocumentChunkEntity::find()
            .filter(DocumentChunkColumn::VersionId.eq(version_id))
            .order_by_asc(DocumentChunkColumn::ChunkIndex)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Count embeddings for a version
    pub async fn count_embeddings_by_version(&self, version_id: Uuid) -> Result<u64> {
        ChunkEmbeddingEntity::find()
            .filter(ChunkEmbeddingColumn::VersionId.eq(version_id))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Outbox Operations
    // ========================================================================

    /// Claim due outbox rows with an atomic compare-and-set lease.
    ///
    /// `FOR UPDATE SKIP LOCKED` keeps concurrent pollers from fighting over
    /// the same rows; the written lease expiry hides claimed rows from other
    /// workers until it elapses (visibility timeout).
    pub async fn claim_due_events(
        &self,
        batch_size: u64,
        lease_secs: i64,
    ) -> Result<Vec<EventOutbox>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE event_outbox o
            SET locked_at = NOW(),
                lease_expires_at = NOW() + make_interval(secs => $1),
                attempts = o.attempts + 1
            WHERE o.id IN (
                SELECT id FROM event_outbox
                WHERE processed_at IS NULL
                  AND attempts < max_attempts
                  AND (next_retry_at IS NULL OR next_retry_at <= NOW())
                  AND (locked_at IS NULL OR lease_expires_at <= NOW())
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING o.*
            "#,
            vec![(lease_secs as f64).into(), (batch_size as i64).into()],
        );

        EventOutboxEntity::find()
            .from_raw_sql(stmt)
            .all(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Commit an outbox row: it becomes permanently invisible but is
    /// retained for audit.
    pub async fn mark_event_processed(&self, event_id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE event_outbox
            SET processed_at = NOW(), locked_at = NULL, lease_expires_at = NULL
            WHERE id = $1 AND processed_at IS NULL
            "#,
            vec![event_id.into()],
        );
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Release a failed delivery for a later retry cycle.
    pub async fn record_event_failure(
        &self,
        event_id: Uuid,
        error: &str,
        retry_delay_secs: i64,
    ) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE event_outbox
            SET locked_at = NULL,
                lease_expires_at = NULL,
                last_error = $1,
                next_retry_at = NOW() + make_interval(secs => $2)
            WHERE id = $3
            "#,
            vec![error.into(), (retry_delay_secs as f64).into(), event_id.into()],
        );
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    /// Count rows still owed (for the dispatcher depth gauge)
    pub async fn count_pending_events(&self) -> Result<u64> {
        EventOutboxEntity::find()
            .filter(EventOutboxColumn::ProcessedAt.is_null())
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

