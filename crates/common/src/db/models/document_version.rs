//! Document version entity: immutable snapshot of one upload
//!
//! A version is created in a reserved state (no bytes yet) and becomes
//! materialized when Complete Upload records byte length and hash.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    /// 1-based, contiguous per document
    pub version_number: i32,

    /// Deterministic object-store key
    #[sea_orm(column_type = "Text")]
    pub object_key: String,

    #[sea_orm(column_type = "Text")]
    pub mime_type: String,

    /// Declared byte length; null while the version is only reserved
    pub file_size: Option<i64>,

    /// SHA-256 of the stored bytes, hex encoded; set post-upload
    #[sea_orm(column_type = "Text", nullable)]
    pub content_hash: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether Complete Upload has run for this version.
    pub fn is_materialized(&self) -> bool {
        self.file_size.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
