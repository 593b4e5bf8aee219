//! Document entity: the business-scoped logical file

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Document lifecycle status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Active,
    DeletedPending,
    Deleted,
}

impl From<String> for DocumentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => DocumentStatus::Active,
            "deleted_pending" => DocumentStatus::DeletedPending,
            "deleted" => DocumentStatus::Deleted,
            _ => DocumentStatus::Active,
        }
    }
}

impl From<DocumentStatus> for String {
    fn from(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Active => "active".to_string(),
            DocumentStatus::DeletedPending => "deleted_pending".to_string(),
            DocumentStatus::Deleted => "deleted".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant partition key
    pub business_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub uploaded_by: Uuid,

    /// Optional label set, stored as a JSON array of strings
    pub labels: Json,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    pub deleted_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn document_status(&self) -> DocumentStatus {
        DocumentStatus::from(self.status.clone())
    }

    /// Active documents accept uploads and mutations; anything else is
    /// frozen.
    pub fn is_active(&self) -> bool {
        self.document_status() == DocumentStatus::Active
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::document_version::Entity")]
    Versions,
}

impl Related<super::document_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
