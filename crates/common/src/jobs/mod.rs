//! Job state machine
//!
//! Pure transition logic for ingestion jobs. `apply` maps (snapshot, event)
//! to a transition describing the next row state; persistence is the
//! repository's concern. Keeping the machine pure makes every row of the
//! transition table directly testable.

use crate::db::models::{JobStage, JobStatus};
use crate::errors::ErrorCode;
use std::time::Duration;
use thiserror::Error;

/// Base retry interval
pub const BACKOFF_BASE: Duration = Duration::from_secs(30);

/// Retry interval cap
pub const BACKOFF_MAX: Duration = Duration::from_secs(30 * 60);

/// The fields of a job row the machine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub stage: JobStage,
    pub attempts: i32,
    pub max_attempts: i32,
}

/// Events that advance a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Complete Upload ran for the version
    UploadCompleted,

    /// The dispatcher leased the job (first delivery or retry redelivery)
    Leased,

    /// A processing stage finished and the next one begins
    StageAdvanced(JobStage),

    /// Embeddings committed; the job is done
    Completed,

    /// A stage failed with a classified code
    Errored { code: ErrorCode, message: String },

    /// Document deleted, observed at a stage boundary while in flight
    DocumentDeleted,

    /// Document deleted before the job was leased
    Cancelled,
}

/// The next row state plus side-effect intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: JobStatus,
    pub stage: JobStage,
    pub attempts: i32,
    pub error_code: Option<ErrorCode>,
    pub last_error: Option<String>,

    /// Unjittered delay until the next retry; persistence applies jitter
    /// and computes the absolute timestamp
    pub retry_delay: Option<Duration>,

    /// Set `started_at = now` if still null
    pub sets_started_at: bool,

    /// Set `completed_at = now`
    pub sets_completed_at: bool,
}

impl Transition {
    fn new(snapshot: &JobSnapshot, status: JobStatus, stage: JobStage) -> Self {
        Self {
            status,
            stage,
            attempts: snapshot.attempts,
            error_code: None,
            last_error: None,
            retry_delay: None,
            sets_started_at: false,
            sets_completed_at: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid transition: {status:?}/{stage:?} does not accept {event}")]
pub struct InvalidTransition {
    pub status: JobStatus,
    pub stage: JobStage,
    pub event: String,
}

/// Apply an event to a job snapshot.
pub fn apply(snapshot: &JobSnapshot, event: &JobEvent) -> Result<Transition, InvalidTransition> {
    use JobStage::*;
    use JobStatus::*;

    let invalid = || InvalidTransition {
        status: snapshot.status,
        stage: snapshot.stage,
        event: format!("{:?}", event),
    };

    match event {
        JobEvent::UploadCompleted => match (snapshot.status, snapshot.stage) {
            (Queued, PendingUpload) => Ok(Transition::new(snapshot, Queued, Uploaded)),
            _ => Err(invalid()),
        },

        JobEvent::Leased => match (snapshot.status, snapshot.stage) {
            // First delivery enters the pipeline at parsing; redeliveries
            // resume at the recorded stage.
            (Queued, Uploaded) => {
                let mut t = Transition::new(snapshot, Processing, Parsing);
                t.attempts += 1;
                t.sets_started_at = true;
                Ok(t)
            }
            (RetryReady, stage @ (Parsing | Chunking | Embedding)) => {
                let mut t = Transition::new(snapshot, Processing, stage);
                t.attempts += 1;
                Ok(t)
            }
            _ => Err(invalid()),
        },

        JobEvent::StageAdvanced(next) => match (snapshot.status, snapshot.stage, next) {
            (Processing, Parsing, Chunking) | (Processing, Chunking, Embedding) => {
                Ok(Transition::new(snapshot, Processing, *next))
            }
            _ => Err(invalid()),
        },

        JobEvent::Completed => match (snapshot.status, snapshot.stage) {
            (Processing, Embedding) => {
                let mut t = Transition::new(snapshot, Done, Embedding);
                t.sets_completed_at = true;
                Ok(t)
            }
            _ => Err(invalid()),
        },

        JobEvent::Errored { code, message } => {
            if snapshot.status != Processing {
                return Err(invalid());
            }
            let retryable = code.is_retryable() && snapshot.attempts < snapshot.max_attempts;
            let mut t = if retryable {
                let mut t = Transition::new(snapshot, RetryReady, snapshot.stage);
                t.retry_delay = Some(retry_backoff(snapshot.attempts));
                t
            } else {
                let mut t = Transition::new(snapshot, Failed, snapshot.stage);
                t.sets_completed_at = true;
                t
            };
            t.error_code = Some(*code);
            t.last_error = Some(message.clone());
            Ok(t)
        }

        JobEvent::DocumentDeleted => {
            if snapshot.status.is_terminal() {
                return Err(invalid());
            }
            let mut t = Transition::new(snapshot, Failed, snapshot.stage);
            t.error_code = Some(ErrorCode::DocumentDeleted);
            t.last_error = Some("document deleted".to_string());
            t.sets_completed_at = true;
            Ok(t)
        }

        JobEvent::Cancelled => match snapshot.status {
            // Only jobs that are not in flight can be cancelled outright;
            // in-flight jobs observe the deletion at the next stage boundary.
            Queued | RetryReady => {
                let mut t = Transition::new(snapshot, JobStatus::Cancelled, snapshot.stage);
                t.sets_completed_at = true;
                Ok(t)
            }
            _ => Err(invalid()),
        },
    }
}

/// Unjittered backoff for the given attempt count (1-based: the delay
/// scheduled *after* attempt N uses `2^(N-1)`).
pub fn retry_backoff(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 10) as u32;
    let delay = BACKOFF_BASE.saturating_mul(2u32.saturating_pow(exponent));
    delay.min(BACKOFF_MAX)
}

/// Apply up to 10% random jitter so recovering providers are not hit by
/// every retry-ready job at once.
pub fn with_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let jitter_ms = (delay.as_millis() as u64) / 10;
    if jitter_ms == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: JobStatus, stage: JobStage, attempts: i32) -> JobSnapshot {
        JobSnapshot {
            status,
            stage,
            attempts,
            max_attempts: 3,
        }
    }

    #[test]
    fn test_upload_complete_path() {
        let s = snapshot(JobStatus::Queued, JobStage::PendingUpload, 0);
        let t = apply(&s, &JobEvent::UploadCompleted).unwrap();
        assert_eq!(t.status, JobStatus::Queued);
        assert_eq!(t.stage, JobStage::Uploaded);
    }

    #[test]
    fn test_first_lease_enters_parsing() {
        let s = snapshot(JobStatus::Queued, JobStage::Uploaded, 0);
        let t = apply(&s, &JobEvent::Leased).unwrap();
        assert_eq!(t.status, JobStatus::Processing);
        assert_eq!(t.stage, JobStage::Parsing);
        assert_eq!(t.attempts, 1);
        assert!(t.sets_started_at);
    }

    #[test]
    fn test_lease_before_upload_rejected() {
        let s = snapshot(JobStatus::Queued, JobStage::PendingUpload, 0);
        assert!(apply(&s, &JobEvent::Leased).is_err());
    }

    #[test]
    fn test_stage_advances_in_order() {
        let s = snapshot(JobStatus::Processing, JobStage::Parsing, 1);
        let t = apply(&s, &JobEvent::StageAdvanced(JobStage::Chunking)).unwrap();
        assert_eq!(t.stage, JobStage::Chunking);

        let s = snapshot(JobStatus::Processing, JobStage::Chunking, 1);
        let t = apply(&s, &JobEvent::StageAdvanced(JobStage::Embedding)).unwrap();
        assert_eq!(t.stage, JobStage::Embedding);

        // Skipping a stage is not allowed
        let s = snapshot(JobStatus::Processing, JobStage::Parsing, 1);
        assert!(apply(&s, &JobEvent::StageAdvanced(JobStage::Embedding)).is_err());
    }

    #[test]
    fn test_completion_from_embedding_only() {
        let s = snapshot(JobStatus::Processing, JobStage::Embedding, 1);
        let t = apply(&s, &JobEvent::Completed).unwrap();
        assert_eq!(t.status, JobStatus::Done);
        assert!(t.sets_completed_at);

        let s = snapshot(JobStatus::Processing, JobStage::Chunking, 1);
        assert!(apply(&s, &JobEvent::Completed).is_err());
    }

    #[test]
    fn test_retryable_error_with_budget_schedules_retry() {
        let s = snapshot(JobStatus::Processing, JobStage::Embedding, 1);
        let t = apply(
            &s,
            &JobEvent::Errored {
                code: ErrorCode::ProviderRateLimited,
                message: "429 too many requests".into(),
            },
        )
        .unwrap();
        assert_eq!(t.status, JobStatus::RetryReady);
        assert_eq!(t.stage, JobStage::Embedding);
        assert_eq!(t.error_code, Some(ErrorCode::ProviderRateLimited));
        assert_eq!(t.retry_delay, Some(Duration::from_secs(30)));
        assert!(!t.sets_completed_at);
    }

    #[test]
    fn test_retryable_error_exhausted_fails() {
        let s = snapshot(JobStatus::Processing, JobStage::Parsing, 3);
        let t = apply(
            &s,
            &JobEvent::Errored {
                code: ErrorCode::Timeout,
                message: "deadline exceeded".into(),
            },
        )
        .unwrap();
        assert_eq!(t.status, JobStatus::Failed);
        assert!(t.sets_completed_at);
        assert_eq!(t.error_code, Some(ErrorCode::Timeout));
    }

    #[test]
    fn test_terminal_error_fails_immediately() {
        let s = snapshot(JobStatus::Processing, JobStage::Parsing, 1);
        let t = apply(
            &s,
            &JobEvent::Errored {
                code: ErrorCode::NeedsOcr,
                message: "only 3 of 5 pages carry text".into(),
            },
        )
        .unwrap();
        assert_eq!(t.status, JobStatus::Failed);
        assert!(t.retry_delay.is_none());
    }

    #[test]
    fn test_retry_redelivery_resumes_stage() {
        let s = snapshot(JobStatus::RetryReady, JobStage::Embedding, 1);
        let t = apply(&s, &JobEvent::Leased).unwrap();
        assert_eq!(t.status, JobStatus::Processing);
        assert_eq!(t.stage, JobStage::Embedding);
        assert_eq!(t.attempts, 2);
        assert!(!t.sets_started_at);
    }

    #[test]
    fn test_document_deleted_fails_nonterminal() {
        let s = snapshot(JobStatus::Processing, JobStage::Chunking, 1);
        let t = apply(&s, &JobEvent::DocumentDeleted).unwrap();
        assert_eq!(t.status, JobStatus::Failed);
        assert_eq!(t.error_code, Some(ErrorCode::DocumentDeleted));

        let s = snapshot(JobStatus::Done, JobStage::Embedding, 1);
        assert!(apply(&s, &JobEvent::DocumentDeleted).is_err());
    }

    #[test]
    fn test_cancel_only_when_not_in_flight() {
        let s = snapshot(JobStatus::Queued, JobStage::Uploaded, 0);
        let t = apply(&s, &JobEvent::Cancelled).unwrap();
        assert_eq!(t.status, JobStatus::Cancelled);

        let s = snapshot(JobStatus::Processing, JobStage::Parsing, 1);
        assert!(apply(&s, &JobEvent::Cancelled).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(1), Duration::from_secs(30));
        assert_eq!(retry_backoff(2), Duration::from_secs(60));
        assert_eq!(retry_backoff(3), Duration::from_secs(120));
        // Deep attempt counts hit the 30 minute cap
        assert_eq!(retry_backoff(9), BACKOFF_MAX);
        assert_eq!(retry_backoff(100), BACKOFF_MAX);
    }

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_secs(30);
        for _ in 0..50 {
            let jittered = with_jitter(base);
            assert!(jittered >= base);
            assert!(jittered <= base + Duration::from_secs(3));
        }
    }
}
