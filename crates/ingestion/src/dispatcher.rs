//! Outbox dispatcher
//!
//! Polls the event_outbox table in short cycles, leases due rows with an
//! atomic compare-and-set (visibility timeout), and hands each event to the
//! coordinator. Delivery is at-least-once; the coordinator's
//! delete-then-insert persistence makes duplicates harmless. Poison rows
//! (attempts >= max) stay in the table unprocessed for inspection.

use crate::processor::{IngestionProcessor, ProcessOutcome};
use docforge_common::config::AppConfig;
use docforge_common::db::models::EventOutbox;
use docforge_common::db::Repository;
use docforge_common::metrics;
use docforge_common::outbox::EventEnvelope;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Consecutive poll failures before the breaker pauses the loop
const MAX_POLL_FAILURES: u32 = 5;

const CIRCUIT_BREAK_PAUSE: std::time::Duration = std::time::Duration::from_secs(30);

pub struct Dispatcher {
    repository: Repository,
    processor: Arc<IngestionProcessor>,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    pub fn new(
        repository: Repository,
        processor: Arc<IngestionProcessor>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            repository,
            processor,
            config,
        }
    }

    /// Poll until shutdown.
    pub async fn run(&self) {
        info!(
            concurrency = self.config.worker.concurrency,
            poll_interval_secs = self.config.worker.poll_interval_secs,
            "Dispatcher started"
        );

        let mut consecutive_failures = 0u32;

        loop {
            if consecutive_failures >= MAX_POLL_FAILURES {
                warn!(
                    failures = consecutive_failures,
                    "Circuit breaker open, pausing..."
                );
                tokio::time::sleep(CIRCUIT_BREAK_PAUSE).await;
                consecutive_failures = 0;
                info!("Circuit breaker reset, resuming...");
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = self.poll_once() => {
                    match result {
                        Ok(delivered) => {
                            consecutive_failures = 0;
                            if delivered == 0 {
                                tokio::time::sleep(self.config.poll_interval()).await;
                            }
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            error!(error = %e, failures = consecutive_failures, "Poll cycle failed");
                            tokio::time::sleep(self.config.poll_interval()).await;
                        }
                    }
                }
            }
        }

        info!("Dispatcher stopped");
    }

    /// Claim one batch and deliver every event concurrently.
    pub async fn poll_once(&self) -> docforge_common::Result<usize> {
        if let Ok(depth) = self.repository.count_pending_events().await {
            metrics::record_outbox(depth);
        }

        let events = self
            .repository
            .claim_due_events(
                self.config.worker.concurrency as u64,
                self.config.worker.visibility_timeout_secs as i64,
            )
            .await?;

        if events.is_empty() {
            return Ok(0);
        }

        let count = events.len();
        join_all(events.into_iter().map(|event| self.deliver(event))).await;
        Ok(count)
    }

    async fn deliver(&self, event: EventOutbox) {
        let event_id = event.id;

        let outcome = match self.decode(&event) {
            Ok(request) => self.processor.process(&request).await,
            Err(message) => {
                // Undecodable payloads can never succeed; commit them so
                // they stop cycling, and keep the error on the row.
                error!(event_id = %event_id, error = %message, "Dropping undecodable outbox event");
                if let Err(e) = self
                    .repository
                    .record_event_failure(event_id, &message, 0)
                    .await
                {
                    error!(error = %e, "Failed to record event failure");
                }
                ProcessOutcome::Terminal
            }
        };

        let result = match outcome {
            ProcessOutcome::Completed | ProcessOutcome::Terminal => {
                metrics::record_delivery("processed");
                self.repository.mark_event_processed(event_id).await
            }
            ProcessOutcome::RetryScheduled(delay) => {
                metrics::record_delivery("retry");
                self.repository
                    .record_event_failure(event_id, "stage failed, retry scheduled", delay.as_secs() as i64)
                    .await
            }
            ProcessOutcome::NotDue(delay) => {
                metrics::record_delivery("not_due");
                self.repository
                    .record_event_failure(event_id, "retry window not reached", delay.as_secs() as i64)
                    .await
            }
        };

        if let Err(e) = result {
            error!(event_id = %event_id, error = %e, "Failed to settle outbox row");
        }
    }

    fn decode(
        &self,
        event: &EventOutbox,
    ) -> std::result::Result<docforge_common::outbox::IngestionRequested, String> {
        let envelope: EventEnvelope =
            serde_json::from_value(event.payload.clone()).map_err(|e| e.to_string())?;
        envelope
            .decode_ingestion_requested()
            .map_err(|e| e.to_string())
    }
}
