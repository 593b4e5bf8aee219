//! Event outbox entity: the durable work queue
//!
//! A row with `processed_at IS NULL` is still owed; processed rows are
//! retained for audit. A non-null `locked_at` with `lease_expires_at` in the
//! future hides the row from other pollers (visibility timeout).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub business_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub event_type: String,

    pub payload: Json,

    pub attempts: i32,

    pub max_attempts: i32,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub next_retry_at: Option<DateTimeWithTimeZone>,

    /// In-flight marker; set by the leasing CAS
    pub locked_at: Option<DateTimeWithTimeZone>,

    /// Lease expiry; a crashed worker's row becomes visible again past this
    pub lease_expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub processed_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Poison rows stay unprocessed for inspection but are never polled.
    pub fn is_poison(&self) -> bool {
        self.processed_at.is_none() && self.attempts >= self.max_attempts
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
