//! Ingestion job entity: the unit advanced by the job state machine

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Job status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    RetryReady,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "retry_ready" => JobStatus::RetryReady,
            "done" => JobStatus::Done,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Queued,
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => "queued".to_string(),
            JobStatus::Processing => "processing".to_string(),
            JobStatus::RetryReady => "retry_ready".to_string(),
            JobStatus::Done => "done".to_string(),
            JobStatus::Failed => "failed".to_string(),
            JobStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

/// Processing stage, meaningful while the job is non-terminal. Retries
/// resume at the recorded stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    PendingUpload,
    Uploaded,
    Parsing,
    Chunking,
    Embedding,
}

impl From<String> for JobStage {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending_upload" => JobStage::PendingUpload,
            "uploaded" => JobStage::Uploaded,
            "parsing" => JobStage::Parsing,
            "chunking" => JobStage::Chunking,
            "embedding" => JobStage::Embedding,
            _ => JobStage::PendingUpload,
        }
    }
}

impl From<JobStage> for String {
    fn from(stage: JobStage) -> Self {
        match stage {
            JobStage::PendingUpload => "pending_upload".to_string(),
            JobStage::Uploaded => "uploaded".to_string(),
            JobStage::Parsing => "parsing".to_string(),
            JobStage::Chunking => "chunking".to_string(),
            JobStage::Embedding => "embedding".to_string(),
        }
    }
}

/// Source format of the uploaded bytes, inferred from the filename at
/// upload init
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Pdf,
    Docx,
    Txt,
    Csv,
    Xlsx,
    Html,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Pdf => "pdf",
            SourceType::Docx => "docx",
            SourceType::Txt => "txt",
            SourceType::Csv => "csv",
            SourceType::Xlsx => "xlsx",
            SourceType::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(SourceType::Pdf),
            "docx" => Some(SourceType::Docx),
            "txt" => Some(SourceType::Txt),
            "csv" => Some(SourceType::Csv),
            "xlsx" => Some(SourceType::Xlsx),
            "html" => Some(SourceType::Html),
            _ => None,
        }
    }

    /// Infer the source type from a filename extension. Part of the upload
    /// path; the parser router dispatches on MIME.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = filename.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(SourceType::Pdf),
            "docx" | "doc" => Some(SourceType::Docx),
            "txt" | "text" | "md" => Some(SourceType::Txt),
            "csv" => Some(SourceType::Csv),
            "xlsx" | "xls" => Some(SourceType::Xlsx),
            "html" | "htm" => Some(SourceType::Html),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_filename() {
        assert_eq!(SourceType::from_filename("report.pdf"), Some(SourceType::Pdf));
        assert_eq!(SourceType::from_filename("Notes.DOCX"), Some(SourceType::Docx));
        assert_eq!(SourceType::from_filename("legacy.doc"), Some(SourceType::Docx));
        assert_eq!(SourceType::from_filename("data.xls"), Some(SourceType::Xlsx));
        assert_eq!(SourceType::from_filename("page.htm"), Some(SourceType::Html));
        assert_eq!(SourceType::from_filename("archive.zip"), None);
        assert_eq!(SourceType::from_filename("no_extension"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::RetryReady,
            JobStatus::Done,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::from(String::from(status)), status);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingestion_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub business_id: Uuid,

    pub version_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub source_type: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text")]
    pub stage: String,

    pub attempts: i32,

    pub max_attempts: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_code: Option<String>,

    /// Final metrics bag (pageCount, chunkCount, totalWords, parserUsed)
    pub metrics: Option<Json>,

    pub next_retry_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub started_at: Option<DateTimeWithTimeZone>,

    pub completed_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn job_status(&self) -> JobStatus {
        JobStatus::from(self.status.clone())
    }

    pub fn job_stage(&self) -> JobStage {
        JobStage::from(self.stage.clone())
    }

    pub fn is_terminal(&self) -> bool {
        self.job_status().is_terminal()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document_version::Entity",
        from = "Column::VersionId",
        to = "super::document_version::Column::Id"
    )]
    Version,
}

impl Related<super::document_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Version.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
