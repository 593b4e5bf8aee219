//! Configuration management for DocForge services
//!
//! Supports loading configuration from:
//! - Environment variables (flat names, e.g. DATABASE_URL)
//! - An optional configuration file (config/default.toml)
//! - Default values
//!
//! Any missing required option aborts startup with a configuration error.

use crate::errors::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration (gateway)
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Object store configuration
    pub object_store: ObjectStoreConfig,

    /// Credential encryption configuration
    pub encryption: EncryptionConfig,

    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Worker / dispatcher configuration
    pub worker: WorkerConfig,

    /// Request limits
    pub limits: LimitsConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    /// S3-compatible endpoint URL
    pub endpoint: String,

    pub access_key: String,
    pub secret: String,
    pub bucket: String,

    /// Region label; S3-compatible stores accept any value here
    pub region: String,

    /// Presigned PUT URL lifetime
    pub upload_ttl_secs: u64,

    /// Presigned GET URL lifetime
    pub download_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncryptionConfig {
    /// 32-byte key, base64 encoded
    pub key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub api_key: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Vector dimension; chunk_embeddings.embedding is sized to this
    pub dimension: usize,

    /// Texts per provider request
    pub batch_size: usize,

    /// Pause between consecutive provider requests
    pub batch_delay_ms: u64,

    pub timeout_secs: u64,

    /// Optional override for the provider base URL
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Concurrent jobs processed by one worker process
    pub concurrency: usize,

    /// Outbox poll cycle
    pub poll_interval_secs: u64,

    /// Lease duration before a claimed row becomes visible again
    pub visibility_timeout_secs: u64,

    /// Attempt budget per job and per outbox row
    pub max_attempts: i32,

    /// Per-stage deadlines
    pub parse_deadline_secs: u64,
    pub chunk_deadline_secs: u64,
    pub embed_deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_file_size_bytes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logging: bool,

    /// Prometheus scrape port (0 to disable)
    pub metrics_port: u16,

    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_upload_ttl() -> u64 {
    900
}
fn default_download_ttl() -> u64 {
    900
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_batch_size() -> usize {
    50
}
fn default_batch_delay_ms() -> u64 {
    100
}
fn default_embedding_timeout() -> u64 {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_poll_interval() -> u64 {
    5
}
fn default_visibility_timeout() -> u64 {
    300
}
fn default_max_attempts() -> i32 {
    3
}
fn default_parse_deadline() -> u64 {
    300
}
fn default_chunk_deadline() -> u64 {
    300
}
fn default_embed_deadline() -> u64 {
    600
}
fn default_max_file_size() -> u64 {
    52_428_800
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_service_name() -> String {
    "docforge".to_string()
}

impl AppConfig {
    /// Load configuration from the environment (plus an optional
    /// `config/default.toml` base layer).
    ///
    /// Recognized variables: `DATABASE_URL`, `OBJECT_STORE_ENDPOINT`,
    /// `OBJECT_STORE_ACCESS_KEY`, `OBJECT_STORE_SECRET`,
    /// `OBJECT_STORE_BUCKET`, `ENCRYPTION_KEY`, `EMBEDDINGS_API_KEY`,
    /// `EMBEDDINGS_MODEL`, `WORKER_CONCURRENCY`, `MAX_FILE_SIZE_BYTES`.
    pub fn load() -> Result<Self> {
        let raw = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::default())
            .build()
            .map_err(|e| AppError::Configuration {
                message: e.to_string(),
            })?;

        Self::from_raw(&raw)
    }

    fn from_raw(raw: &Config) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            raw.get_string(key).map_err(|_| AppError::Configuration {
                message: format!("missing required configuration: {}", key.to_uppercase()),
            })
        };
        let optional = |key: &str| -> Option<String> { raw.get_string(key).ok() };
        let optional_u64 = |key: &str, default: u64| -> u64 {
            raw.get_string(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        Ok(Self {
            server: ServerConfig {
                host: optional("server_host").unwrap_or_else(default_host),
                port: optional_u64("server_port", default_port() as u64) as u16,
            },
            database: DatabaseConfig {
                url: required("database_url")?,
                read_url: optional("database_read_url"),
                max_connections: optional_u64("database_max_connections", default_max_connections() as u64)
                    as u32,
                min_connections: optional_u64("database_min_connections", default_min_connections() as u64)
                    as u32,
                connect_timeout_secs: optional_u64("database_connect_timeout_secs", default_connect_timeout()),
                idle_timeout_secs: optional_u64("database_idle_timeout_secs", default_idle_timeout()),
            },
            object_store: ObjectStoreConfig {
                endpoint: required("object_store_endpoint")?,
                access_key: required("object_store_access_key")?,
                secret: required("object_store_secret")?,
                bucket: required("object_store_bucket")?,
                region: optional("object_store_region").unwrap_or_else(default_region),
                upload_ttl_secs: optional_u64("object_store_upload_ttl_secs", default_upload_ttl()),
                download_ttl_secs: optional_u64("object_store_download_ttl_secs", default_download_ttl()),
            },
            encryption: EncryptionConfig {
                key: required("encryption_key")?,
            },
            embedding: EmbeddingConfig {
                api_key: required("embeddings_api_key")?,
                model: optional("embeddings_model").unwrap_or_else(default_embedding_model),
                dimension: optional_u64("embeddings_dimension", default_embedding_dimension() as u64)
                    as usize,
                batch_size: optional_u64("embeddings_batch_size", default_batch_size() as u64) as usize,
                batch_delay_ms: optional_u64("embeddings_batch_delay_ms", default_batch_delay_ms()),
                timeout_secs: optional_u64("embeddings_timeout_secs", default_embedding_timeout()),
                api_base: optional("embeddings_api_base"),
            },
            worker: WorkerConfig {
                concurrency: optional_u64("worker_concurrency", default_concurrency() as u64) as usize,
                poll_interval_secs: optional_u64("worker_poll_interval_secs", default_poll_interval()),
                visibility_timeout_secs: optional_u64(
                    "worker_visibility_timeout_secs",
                    default_visibility_timeout(),
                ),
                max_attempts: optional_u64("worker_max_attempts", default_max_attempts() as u64) as i32,
                parse_deadline_secs: optional_u64("worker_parse_deadline_secs", default_parse_deadline()),
                chunk_deadline_secs: optional_u64("worker_chunk_deadline_secs", default_chunk_deadline()),
                embed_deadline_secs: optional_u64("worker_embed_deadline_secs", default_embed_deadline()),
            },
            limits: LimitsConfig {
                max_file_size_bytes: optional_u64("max_file_size_bytes", default_max_file_size()),
            },
            observability: ObservabilityConfig {
                log_level: optional("log_level").unwrap_or_else(default_log_level),
                json_logging: optional("json_logging")
                    .map(|v| v != "false")
                    .unwrap_or(true),
                metrics_port: optional_u64("metrics_port", 9090) as u16,
                service_name: optional("service_name").unwrap_or_else(default_service_name),
            },
        })
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// Outbox poll cycle as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker.poll_interval_secs)
    }

    /// Lease duration as a Duration
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.worker.visibility_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/docforge".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            object_store: ObjectStoreConfig {
                endpoint: "http://localhost:9000".to_string(),
                access_key: String::new(),
                secret: String::new(),
                bucket: "docforge".to_string(),
                region: default_region(),
                upload_ttl_secs: default_upload_ttl(),
                download_ttl_secs: default_download_ttl(),
            },
            encryption: EncryptionConfig { key: String::new() },
            embedding: EmbeddingConfig {
                api_key: String::new(),
                model: default_embedding_model(),
                dimension: default_embedding_dimension(),
                batch_size: default_batch_size(),
                batch_delay_ms: default_batch_delay_ms(),
                timeout_secs: default_embedding_timeout(),
                api_base: None,
            },
            worker: WorkerConfig {
                concurrency: default_concurrency(),
                poll_interval_secs: default_poll_interval(),
                visibility_timeout_secs: default_visibility_timeout(),
                max_attempts: default_max_attempts(),
                parse_deadline_secs: default_parse_deadline(),
                chunk_deadline_secs: default_chunk_deadline(),
                embed_deadline_secs: default_embed_deadline(),
            },
            limits: LimitsConfig {
                max_file_size_bytes: default_max_file_size(),
            },
            observability: ObservabilityConfig {
                log_level: default_log_level(),
                json_logging: true,
                metrics_port: 9090,
                service_name: default_service_name(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.worker.max_attempts, 3);
        assert_eq!(config.limits.max_file_size_bytes, 52_428_800);
        assert_eq!(config.object_store.upload_ttl_secs, 900);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/docforge");
    }

    #[test]
    fn test_missing_required_aborts() {
        // An empty raw config must refuse to produce an AppConfig.
        let raw = Config::builder().build().unwrap();
        let result = AppConfig::from_raw(&raw);
        assert!(result.is_err());
        let message = result.err().unwrap().to_string();
        assert!(message.contains("DATABASE_URL"));
    }
}
