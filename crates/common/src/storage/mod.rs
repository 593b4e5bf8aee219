//! Object store gateway
//!
//! Presigned upload/download URL issuance and raw byte download against an
//! S3-compatible store (MinIO in development). Keys are deterministic per
//! (tenant, document, version) so re-issuing a URL never creates a second
//! object.

use crate::config::ObjectStoreConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Failure kinds the coordinator dispatches on. Only `NotFound` is terminal;
/// the rest are retried through the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    NotFound,
    Auth,
    Transient,
}

#[derive(Error, Debug)]
#[error("Object store error ({kind:?}): {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        self.kind != StorageErrorKind::NotFound
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Deterministic object key for one document version.
///
/// Pure function: the same inputs always yield
/// `tenants/{tenant}/docs/{document}/v{version}/original`.
pub fn generate_key(tenant_id: Uuid, document_id: Uuid, version_number: i32) -> String {
    format!(
        "tenants/{}/docs/{}/v{}/original",
        tenant_id, document_id, version_number
    )
}

/// Object store client wrapper
#[derive(Clone)]
pub struct ObjectStore {
    client: Client,
    bucket: String,
}

impl ObjectStore {
    /// Build a client for the configured S3-compatible endpoint.
    pub fn new(config: &ObjectStoreConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret.clone(),
            None,
            None,
            "docforge-config",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            // MinIO and most S3-compatible stores require path-style access
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Presigned PUT URL bound to the exact content type.
    #[instrument(skip(self))]
    pub async fn upload_url(
        &self,
        key: &str,
        content_type: &str,
        ttl_secs: u64,
    ) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
            .map_err(|e| StorageError {
                kind: StorageErrorKind::Transient,
                message: format!("invalid presigning config: {}", e),
            })?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError {
                kind: StorageErrorKind::Transient,
                message: format!("failed to presign upload: {}", e),
            })?;

        debug!(key, ttl_secs, "Presigned upload URL issued");
        Ok(presigned.uri().to_string())
    }

    /// Presigned GET URL.
    #[instrument(skip(self))]
    pub async fn download_url(&self, key: &str, ttl_secs: u64) -> StorageResult<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(ttl_secs))
            .map_err(|e| StorageError {
                kind: StorageErrorKind::Transient,
                message: format!("invalid presigning config: {}", e),
            })?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError {
                kind: StorageErrorKind::Transient,
                message: format!("failed to presign download: {}", e),
            })?;

        Ok(presigned.uri().to_string())
    }

    /// Download an object's bytes.
    #[instrument(skip(self))]
    pub async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, key))?;

        let bytes = response.body.collect().await.map_err(|e| StorageError {
            kind: StorageErrorKind::Transient,
            message: format!("failed to read object body: {}", e),
        })?;

        let data = bytes.into_bytes().to_vec();
        debug!(key, size = data.len(), "Object downloaded");
        Ok(data)
    }
}

fn classify_sdk_error<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>, key: &str) -> StorageError
where
    E: std::error::Error + aws_sdk_s3::error::ProvideErrorMetadata,
{
    use aws_sdk_s3::error::SdkError;

    match err {
        SdkError::ServiceError(service_err) => {
            let meta = aws_sdk_s3::error::ProvideErrorMetadata::meta(service_err.err());
            match meta.code() {
                Some("NoSuchKey") | Some("NotFound") => StorageError {
                    kind: StorageErrorKind::NotFound,
                    message: format!("object not found: {}", key),
                },
                Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
                    StorageError {
                        kind: StorageErrorKind::Auth,
                        message: format!("access denied for {}: {}", key, err),
                    }
                }
                _ => StorageError {
                    kind: StorageErrorKind::Transient,
                    message: format!("object store error for {}: {}", key, err),
                },
            }
        }
        _ => StorageError {
            kind: StorageErrorKind::Transient,
            message: format!("object store transport error for {}: {}", key, err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_is_deterministic() {
        let tenant = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let document = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();

        let a = generate_key(tenant, document, 1);
        let b = generate_key(tenant, document, 1);
        assert_eq!(a, b);
        assert_eq!(
            a,
            "tenants/11111111-1111-1111-1111-111111111111/docs/22222222-2222-2222-2222-222222222222/v1/original"
        );
    }

    #[test]
    fn test_generate_key_varies_by_version() {
        let tenant = Uuid::new_v4();
        let document = Uuid::new_v4();
        assert_ne!(
            generate_key(tenant, document, 1),
            generate_key(tenant, document, 2)
        );
    }

    #[test]
    fn test_not_found_is_terminal() {
        let err = StorageError {
            kind: StorageErrorKind::NotFound,
            message: "gone".into(),
        };
        assert!(!err.is_retryable());

        let err = StorageError {
            kind: StorageErrorKind::Auth,
            message: "denied".into(),
        };
        assert!(err.is_retryable());
    }
}
