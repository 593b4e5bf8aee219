//! Ingestion coordinator
//!
//! Drives one leased job through download -> parse -> gate -> chunk ->
//! embed -> persist. Each stage re-checks document liveness, runs under its
//! deadline, and persists through delete-then-insert repository operations
//! so redeliveries after partial failure are safe.

use crate::chunker::{chunk_pages, ChunkerConfig};
use crate::errors::IngestionError;
use crate::parse::{self, ParsedDocument, ParsedPage};
use crate::quality::{self, GateOutcome};
use docforge_common::config::AppConfig;
use docforge_common::db::models::{Document, DocumentVersion, IngestionJob, JobStage, SourceType};
use docforge_common::db::repository::{NewChunk, NewPage};
use docforge_common::db::Repository;
use docforge_common::embeddings::Embedder;
use docforge_common::errors::ErrorCode;
use docforge_common::jobs::{self, JobEvent, JobSnapshot};
use docforge_common::metrics;
use docforge_common::outbox::IngestionRequested;
use docforge_common::storage::ObjectStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// What the dispatcher should do with the delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Job reached `done`; commit the event
    Completed,

    /// Job ended terminally (failed/cancelled) or the event is moot;
    /// commit the event
    Terminal,

    /// Retryable failure; redeliver after the given delay
    RetryScheduled(Duration),

    /// The job's retry window has not opened yet; redeliver later
    NotDue(Duration),
}

/// Ingestion coordinator
pub struct IngestionProcessor {
    repository: Repository,
    storage: ObjectStore,
    embedder: Arc<dyn Embedder>,
    config: Arc<AppConfig>,
    chunker_config: ChunkerConfig,
}

impl IngestionProcessor {
    pub fn new(
        repository: Repository,
        storage: ObjectStore,
        embedder: Arc<dyn Embedder>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repository,
            storage,
            embedder,
            config,
            chunker_config: ChunkerConfig::default(),
        }
    }

    /// Process one delivered ingestion event.
    #[instrument(skip(self, request), fields(job_id = %request.job_id, version_id = %request.version_id))]
    pub async fn process(&self, request: &IngestionRequested) -> ProcessOutcome {
        match self.try_process(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Delivery failed before the job could be leased");
                ProcessOutcome::RetryScheduled(self.config.poll_interval())
            }
        }
    }

    async fn try_process(&self, request: &IngestionRequested) -> Result<ProcessOutcome, IngestionError> {
        let Some(job) = self
            .repository
            .find_job_by_id(request.job_id)
            .await
            .map_err(db_err)?
        else {
            warn!("Job row missing for delivered event");
            return Ok(ProcessOutcome::Terminal);
        };

        // Replays of committed work are no-ops.
        if job.is_terminal() {
            return Ok(ProcessOutcome::Terminal);
        }

        let Some(version) = self
            .repository
            .find_version_by_id(job.version_id)
            .await
            .map_err(db_err)?
        else {
            warn!("Version row missing for delivered event");
            return Ok(ProcessOutcome::Terminal);
        };

        let Some(document) = self
            .repository
            .find_document_by_id(version.document_id)
            .await
            .map_err(db_err)?
        else {
            warn!("Document row missing for delivered event");
            return Ok(ProcessOutcome::Terminal);
        };

        if !document.is_active() {
            self.transition(&job, &JobEvent::DocumentDeleted).await?;
            return Ok(ProcessOutcome::Terminal);
        }

        // Honor the backoff window scheduled by a previous failure.
        if let Some(next_retry_at) = job.next_retry_at {
            let now = chrono::Utc::now();
            if next_retry_at > now {
                let wait = (next_retry_at.to_utc() - now)
                    .to_std()
                    .unwrap_or_else(|_| Duration::from_secs(1));
                return Ok(ProcessOutcome::NotDue(wait));
            }
        }

        let job = self.transition(&job, &JobEvent::Leased).await?;
        let attempt_started = Instant::now();

        match self.run_stages(job.clone(), &document, &version).await {
            Ok(summary) => {
                metrics::record_job("done", &summary.parser, attempt_started.elapsed().as_secs_f64());
                Ok(ProcessOutcome::Completed)
            }
            Err(e) => self.handle_failure(&job, e, attempt_started).await,
        }
    }

    /// Run the pipeline from the job's recorded stage to completion.
    async fn run_stages(
        &self,
        mut job: IngestionJob,
        document: &Document,
        version: &DocumentVersion,
    ) -> Result<StageSummary, IngestionError> {
        let mut summary = StageSummary::default();

        loop {
            // Deletion is observed at every stage boundary.
            self.ensure_document_active(document.id).await?;

            match job.job_stage() {
                JobStage::Parsing => {
                    let started = Instant::now();
                    let parsed = tokio::time::timeout(
                        Duration::from_secs(self.config.worker.parse_deadline_secs),
                        self.parse_stage(&job, version),
                    )
                    .await
                    .map_err(|_| IngestionError::StageTimeout(self.config.worker.parse_deadline_secs))??;
                    metrics::record_stage("parsing", started.elapsed().as_secs_f64());

                    summary.parser = parsed.parser.to_string();
                    summary.page_count = parsed.page_count;
                    summary.total_words = parsed.word_count;

                    job = self
                        .transition(&job, &JobEvent::StageAdvanced(JobStage::Chunking))
                        .await?;
                }

                JobStage::Chunking => {
                    let started = Instant::now();
                    let chunk_count = tokio::time::timeout(
                        Duration::from_secs(self.config.worker.chunk_deadline_secs),
                        self.chunk_stage(version, &mut summary),
                    )
                    .await
                    .map_err(|_| IngestionError::StageTimeout(self.config.worker.chunk_deadline_secs))??;
                    metrics::record_stage("chunking", started.elapsed().as_secs_f64());

                    summary.chunk_count = chunk_count;

                    job = self
                        .transition(&job, &JobEvent::StageAdvanced(JobStage::Embedding))
                        .await?;
                }

                JobStage::Embedding => {
                    let started = Instant::now();
                    tokio::time::timeout(
                        Duration::from_secs(self.config.worker.embed_deadline_secs),
                        self.embed_stage(version, &mut summary),
                    )
                    .await
                    .map_err(|_| IngestionError::StageTimeout(self.config.worker.embed_deadline_secs))??;
                    metrics::record_stage("embedding", started.elapsed().as_secs_f64());

                    let job = self.transition(&job, &JobEvent::Completed).await?;
                    self.record_final_metrics(&job, &summary).await;

                    info!(
                        pages = summary.page_count,
                        chunks = summary.chunk_count,
                        parser = %summary.parser,
                        "Ingestion complete"
                    );
                    return Ok(summary);
                }

                stage => {
                    return Err(IngestionError::DatabaseError(format!(
                        "job leased in unexpected stage {:?}",
                        stage
                    )))
                }
            }
        }
    }

    /// Download, parse, gate, and persist pages.
    async fn parse_stage(
        &self,
        job: &IngestionJob,
        version: &DocumentVersion,
    ) -> Result<ParsedDocument, IngestionError> {
        let bytes = self
            .storage
            .download(&version.object_key)
            .await
            .map_err(|e| match e.kind {
                docforge_common::storage::StorageErrorKind::NotFound => {
                    IngestionError::ObjectNotFound(version.object_key.clone())
                }
                _ => IngestionError::StorageError(e.to_string()),
            })?;

        let limit = self.config.limits.max_file_size_bytes;
        if bytes.len() as u64 > limit {
            return Err(IngestionError::FileTooLarge {
                size: bytes.len() as u64,
                limit,
            });
        }

        let hash = hex::encode(Sha256::digest(&bytes));
        self.repository
            .record_content_hash(version.id, &hash)
            .await
            .map_err(db_err)?;

        let source_type = SourceType::parse(&job.source_type)
            .ok_or_else(|| IngestionError::UnsupportedFormat(job.source_type.clone()))?;
        let parser = parse::route(&version.mime_type, source_type)
            .ok_or_else(|| IngestionError::UnsupportedFormat(version.mime_type.clone()))?;

        // Parsers are CPU-bound; keep them off the async workers.
        let parsed = tokio::task::spawn_blocking(move || parser(&bytes))
            .await
            .map_err(|e| IngestionError::ParseError(format!("parser task failed: {}", e)))??;

        match quality::evaluate(&parsed.pages) {
            GateOutcome::Pass { warnings } => {
                for warning in warnings {
                    warn!(warning = %warning, "Quality gate warning");
                }
            }
            GateOutcome::Fail { code, message } => {
                return Err(IngestionError::QualityGate { code, message });
            }
        }

        let pages: Vec<NewPage> = parsed
            .pages
            .iter()
            .map(|p| NewPage {
                page_number: p.page_number,
                content: p.content.clone(),
                char_count: p.content.chars().count() as i32,
            })
            .collect();
        self.repository
            .replace_pages(version.id, &pages)
            .await
            .map_err(db_err)?;

        metrics::record_extraction(parsed.page_count, 0);
        Ok(parsed)
    }

    /// Chunk persisted pages and persist the chunks.
    async fn chunk_stage(
        &self,
        version: &DocumentVersion,
        summary: &mut StageSummary,
    ) -> Result<usize, IngestionError> {
        let page_rows = self
            .repository
            .get_pages_by_version(version.id)
            .await
            .map_err(db_err)?;

        // A retry may resume here without having parsed in this attempt.
        if summary.page_count == 0 {
            summary.page_count = page_rows.len();
            summary.total_words = page_rows
                .iter()
                .map(|p| p.content.split_whitespace().count())
                .sum();
        }

        let pages: Vec<ParsedPage> = page_rows
            .into_iter()
            .map(|p| ParsedPage {
                page_number: p.page_number,
                content: p.content,
            })
            .collect();

        let chunks = chunk_pages(&pages, &self.chunker_config);
        let new_chunks: Vec<NewChunk> = chunks
            .iter()
            .map(|c| NewChunk {
                chunk_index: c.index,
                content: c.content.clone(),
                page_start: c.page_start,
                page_end: c.page_end,
                sentences: c.sentences.clone(),
            })
            .collect();

        self.repository
            .replace_chunks(version.id, &new_chunks)
            .await
            .map_err(db_err)?;

        metrics::record_extraction(0, chunks.len());
        Ok(chunks.len())
    }

    /// Embed persisted chunks and persist the vectors in chunk order.
    async fn embed_stage(
        &self,
        version: &DocumentVersion,
        summary: &mut StageSummary,
    ) -> Result<(), IngestionError> {
        let chunks = self
            .repository
            .get_chunks_by_version(version.id)
            .await
            .map_err(db_err)?;
        summary.chunk_count = chunks.len();

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let started = Instant::now();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| IngestionError::EmbeddingError(e.to_string()))?;
        metrics::record_embedding(
            started.elapsed().as_secs_f64(),
            self.embedder.model_name(),
            true,
        );

        let expected_dim = self.embedder.dimension();
        for vector in &vectors {
            if vector.len() != expected_dim {
                return Err(IngestionError::EmbeddingError(format!(
                    "provider returned {}-dim vector, expected {}",
                    vector.len(),
                    expected_dim
                )));
            }
        }

        let items: Vec<(uuid::Uuid, Vec<f32>)> = chunks
            .iter()
            .map(|c| c.id)
            .zip(vectors.into_iter())
            .collect();

        self.repository
            .replace_embeddings(version.id, &items, self.embedder.model_name())
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn ensure_document_active(&self, document_id: uuid::Uuid) -> Result<(), IngestionError> {
        let document = self
            .repository
            .find_document_by_id(document_id)
            .await
            .map_err(db_err)?
            .ok_or(IngestionError::DocumentDeleted)?;

        if !document.is_active() {
            return Err(IngestionError::DocumentDeleted);
        }
        Ok(())
    }

    /// Route a stage failure through the state machine.
    async fn handle_failure(
        &self,
        job: &IngestionJob,
        error: IngestionError,
        attempt_started: Instant,
    ) -> Result<ProcessOutcome, IngestionError> {
        // The leased row is the authoritative snapshot now.
        let job = self
            .repository
            .find_job_by_id(job.id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| IngestionError::DatabaseError("job row vanished".to_string()))?;

        let code = error.error_code();
        let event = if code == ErrorCode::DocumentDeleted {
            JobEvent::DocumentDeleted
        } else {
            JobEvent::Errored {
                code,
                message: error.to_string(),
            }
        };

        let updated = self.transition(&job, &event).await?;
        metrics::record_job(
            updated.status.as_str(),
            &job.source_type,
            attempt_started.elapsed().as_secs_f64(),
        );

        if updated.job_status() == docforge_common::db::models::JobStatus::RetryReady {
            let delay = updated
                .next_retry_at
                .map(|at| {
                    (at.to_utc() - chrono::Utc::now())
                        .to_std()
                        .unwrap_or_else(|_| Duration::from_secs(1))
                })
                .unwrap_or_else(|| Duration::from_secs(30));
            warn!(error = %error, code = %code, attempts = updated.attempts, "Stage failed, retry scheduled");
            Ok(ProcessOutcome::RetryScheduled(delay))
        } else {
            warn!(error = %error, code = %code, "Stage failed terminally");
            Ok(ProcessOutcome::Terminal)
        }
    }

    async fn transition(
        &self,
        job: &IngestionJob,
        event: &JobEvent,
    ) -> Result<IngestionJob, IngestionError> {
        let snapshot = JobSnapshot {
            status: job.job_status(),
            stage: job.job_stage(),
            attempts: job.attempts,
            max_attempts: job.max_attempts,
        };
        let transition = jobs::apply(&snapshot, event)
            .map_err(|e| IngestionError::DatabaseError(e.to_string()))?;
        self.repository
            .apply_transition(job, &transition)
            .await
            .map_err(db_err)
    }

    async fn record_final_metrics(&self, job: &IngestionJob, summary: &StageSummary) {
        let metrics_bag = serde_json::json!({
            "pageCount": summary.page_count,
            "chunkCount": summary.chunk_count,
            "totalWords": summary.total_words,
            "parserUsed": summary.parser,
        });
        if let Err(e) = self.repository.record_job_metrics(job.id, metrics_bag).await {
            warn!(error = %e, "Failed to record job metrics");
        }
    }
}

#[derive(Debug, Default, Clone)]
struct StageSummary {
    parser: String,
    page_count: usize,
    total_words: usize,
    chunk_count: usize,
}

fn db_err(e: docforge_common::errors::AppError) -> IngestionError {
    IngestionError::DatabaseError(e.to_string())
}
