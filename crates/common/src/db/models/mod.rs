//! SeaORM entity models
//!
//! Database entities for the ingestion pipeline

mod business_member;
mod chunk_embedding;
mod document;
mod document_chunk;
mod document_page;
mod document_version;
mod event_outbox;
mod ingestion_job;

pub use document::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, DocumentStatus,
    Entity as DocumentEntity, Model as Document,
};

pub use document_version::{
    ActiveModel as DocumentVersionActiveModel, Column as DocumentVersionColumn,
    Entity as DocumentVersionEntity, Model as DocumentVersion,
};

pub use document_page::{
    ActiveModel as DocumentPageActiveModel, Column as DocumentPageColumn,
    Entity as DocumentPageEntity, Model as DocumentPage,
};

pub use document_chunk::{
    ActiveModel as DocumentChunkActiveModel, Column as DocumentChunkColumn,
    Entity as DocumentChunkEntity, Model as DocumentChunk,
};

pub use chunk_embedding::{
    ActiveModel as ChunkEmbeddingActiveModel, Column as ChunkEmbeddingColumn,
    Entity as ChunkEmbeddingEntity, Model as ChunkEmbedding,
};

pub use ingestion_job::{
    ActiveModel as IngestionJobActiveModel, Column as IngestionJobColumn,
    Entity as IngestionJobEntity, JobStage, JobStatus, Model as IngestionJob, SourceType,
};

pub use event_outbox::{
    ActiveModel as EventOutboxActiveModel, Column as EventOutboxColumn,
    Entity as EventOutboxEntity, Model as EventOutbox,
};

pub use business_member::{
    ActiveModel as BusinessMemberActiveModel, Column as BusinessMemberColumn,
    Entity as BusinessMemberEntity, Model as BusinessMember,
};
