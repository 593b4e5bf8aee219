//! Document chunk entity with page provenance

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "document_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub version_id: Uuid,

    /// 0-based, contiguous within a version
    pub chunk_index: i32,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// First page contributing to this chunk (1-based, inclusive)
    pub page_start: i32,

    /// Last page contributing to this chunk (inclusive); >= page_start
    pub page_end: i32,

    /// The chunk's sentences, stored as a JSON array of strings
    pub sentences: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document_version::Entity",
        from = "Column::VersionId",
        to = "super::document_version::Column::Id",
        on_delete = "Cascade"
    )]
    Version,
}

impl Related<super::document_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Version.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
