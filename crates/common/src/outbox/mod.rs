//! Outbox event envelope
//!
//! Events are stored in the `event_outbox` table as versioned JSON
//! envelopes. The envelope wire format is part of the external contract:
//!
//! ```json
//! {"version":1,"type":"document.ingestion_requested",
//!  "payload":{"versionId":"...","jobId":"...","tenantId":"..."}}
//! ```

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current envelope version
pub const ENVELOPE_VERSION: u32 = 1;

/// Event type emitted when Complete Upload queues a version for ingestion
pub const EVENT_INGESTION_REQUESTED: &str = "document.ingestion_requested";

/// Delivery attempt budget for outbox rows. Deliberately larger than the
/// job attempt budget: a delivery that merely finds the job's retry window
/// still closed consumes an outbox attempt without consuming a job attempt.
pub const OUTBOX_MAX_ATTEMPTS: i32 = 10;

/// Versioned event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub version: u32,

    #[serde(rename = "type")]
    pub event_type: String,

    pub payload: serde_json::Value,
}

/// Payload of `document.ingestion_requested`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionRequested {
    pub version_id: Uuid,
    pub job_id: Uuid,
    pub tenant_id: Uuid,
}

impl EventEnvelope {
    /// Build the ingestion-requested envelope for one version/job pair.
    pub fn ingestion_requested(payload: &IngestionRequested) -> Result<Self> {
        Ok(Self {
            version: ENVELOPE_VERSION,
            event_type: EVENT_INGESTION_REQUESTED.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decode the payload of an ingestion-requested envelope.
    pub fn decode_ingestion_requested(&self) -> Result<IngestionRequested> {
        if self.event_type != EVENT_INGESTION_REQUESTED {
            return Err(AppError::Internal {
                message: format!("unexpected event type: {}", self.event_type),
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let payload = IngestionRequested {
            version_id: Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap(),
            job_id: Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap(),
            tenant_id: Uuid::parse_str("33333333-3333-3333-3333-333333333333").unwrap(),
        };
        let envelope = EventEnvelope::ingestion_requested(&payload).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["type"], "document.ingestion_requested");
        assert_eq!(
            json["payload"]["versionId"],
            "11111111-1111-1111-1111-111111111111"
        );
        assert_eq!(
            json["payload"]["jobId"],
            "22222222-2222-2222-2222-222222222222"
        );
        assert_eq!(
            json["payload"]["tenantId"],
            "33333333-3333-3333-3333-333333333333"
        );
    }

    #[test]
    fn test_envelope_round_trip() {
        let payload = IngestionRequested {
            version_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
        };
        let envelope = EventEnvelope::ingestion_requested(&payload).unwrap();
        let decoded = envelope.decode_ingestion_requested().unwrap();
        assert_eq!(decoded.version_id, payload.version_id);
        assert_eq!(decoded.job_id, payload.job_id);
        assert_eq!(decoded.tenant_id, payload.tenant_id);
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let envelope = EventEnvelope {
            version: 1,
            event_type: "document.deleted".to_string(),
            payload: serde_json::json!({}),
        };
        assert!(envelope.decode_ingestion_requested().is_err());
    }
}
