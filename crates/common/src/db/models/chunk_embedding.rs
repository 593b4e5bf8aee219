//! Chunk embedding entity
//!
//! The pgvector column is mapped as text for SeaORM compatibility; vector
//! inserts and similarity queries go through raw SQL with `::vector` casts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chunk_embeddings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub chunk_id: Uuid,

    /// Denormalized for stage-scoped delete-then-insert
    pub version_id: Uuid,

    /// pgvector embedding stored as text ("[1.0,2.0,...]")
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding: Option<String>,

    /// Embedding model identifier for versioning
    #[sea_orm(column_type = "Text")]
    pub model: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parse embedding from stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        self.embedding.as_ref().and_then(|s| {
            let inner = s.trim_start_matches('[').trim_end_matches(']');
            inner
                .split(',')
                .map(|v| v.trim().parse::<f32>().ok())
                .collect()
        })
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document_chunk::Entity",
        from = "Column::ChunkId",
        to = "super::document_chunk::Column::Id",
        on_delete = "Cascade"
    )]
    Chunk,
}

impl Related<super::document_chunk::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chunk.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
