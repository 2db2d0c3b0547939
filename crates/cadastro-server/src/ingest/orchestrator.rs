//! Per-file ingestion pipeline
//!
//! One file moves through `read -> parse -> publish` and ends as a
//! [`ProcessingOutcome`]. Nothing here returns an error to the caller: every
//! failure is logged and folded into a failed outcome carrying the counts
//! gathered up to that point.

use cadastro_common::{IngestError, OutcomeCounts, ProcessingOutcome, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::config::{IngestConfig, PublishFailurePolicy};
use super::parser::RecordParser;
use crate::publisher::Publisher;
use crate::storage::ObjectStore;

/// Outcomes of one discovery pass, in processing order
#[derive(Debug, Default)]
pub struct PassSummary {
    pub outcomes: Vec<ProcessingOutcome>,
    /// Set when the bucket could not be listed; no file was processed then
    pub listing_error: Option<String>,
}

impl PassSummary {
    fn listing_failed(error: impl Into<String>) -> Self {
        Self {
            outcomes: Vec::new(),
            listing_error: Some(error.into()),
        }
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }

    /// No listing error and every processed file succeeded
    pub fn is_clean(&self) -> bool {
        self.listing_error.is_none() && self.failed() == 0
    }
}

pub struct IngestOrchestrator {
    store: Arc<dyn ObjectStore>,
    parser: RecordParser,
    publisher: Publisher,
    config: IngestConfig,
    shutdown: CancellationToken,
}

impl IngestOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        publisher: Publisher,
        config: IngestConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            parser: RecordParser::new(config.delimiter),
            publisher,
            config,
            shutdown,
        }
    }

    /// Read, parse and publish one file
    #[instrument(skip(self))]
    pub async fn process_file(&self, file_id: &str) -> ProcessingOutcome {
        let started = Instant::now();
        let mut counts = OutcomeCounts::default();
        let acked = AtomicUsize::new(0);
        let file_timeout = self.config.file_timeout();

        info!("Processing file");

        let timed =
            tokio::time::timeout(file_timeout, self.ingest(file_id, &mut counts, &acked)).await;
        let result = match timed {
            Ok(result) => result,
            Err(_) => {
                // sends still in flight when the deadline hit count as failed
                counts.published = acked.load(Ordering::SeqCst);
                counts.failed_sends = counts.record_count.saturating_sub(counts.published);
                Err(IngestError::DeadlineExceeded {
                    operation: "process_file",
                    timeout: file_timeout,
                })
            },
        };

        let elapsed = started.elapsed();
        match result {
            Ok(()) => {
                info!(
                    records = counts.record_count,
                    rejected_rows = counts.rejected_rows,
                    published = counts.published,
                    failed_sends = counts.failed_sends,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "File processed"
                );
                ProcessingOutcome::succeeded(file_id, counts, elapsed)
            },
            Err(e) => {
                error!(
                    error = %e,
                    records = counts.record_count,
                    published = counts.published,
                    failed_sends = counts.failed_sends,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "File processing failed"
                );
                ProcessingOutcome::failed(file_id, counts, elapsed, e.to_string())
            },
        }
    }

    async fn ingest(
        &self,
        file_id: &str,
        counts: &mut OutcomeCounts,
        acked: &AtomicUsize,
    ) -> Result<()> {
        let text = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(IngestError::Cancelled),
            text = self.store.read_object(file_id) => text?,
        };

        let parsed = self.parser.parse(&text, file_id)?;
        counts.record_count = parsed.records.len();
        counts.rejected_rows = parsed.rejected.len();

        let batch = self
            .publisher
            .send_batch_tracked(&parsed.records, &self.shutdown, acked)
            .await;
        counts.published = batch.success_count();
        counts.failed_sends = batch.failure_count();

        if batch.failure_count() == 0 {
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        match self.config.publish_failure_policy {
            PublishFailurePolicy::Fail => Err(IngestError::PartialDelivery {
                failed: batch.failure_count(),
                total: batch.len(),
            }),
            PublishFailurePolicy::Tolerate => {
                warn!(
                    failed = batch.failure_count(),
                    total = batch.len(),
                    "Some records were not published; file still counted as processed"
                );
                Ok(())
            },
        }
    }

    /// List the bucket and process every file whose key carries the configured suffix
    ///
    /// Files are processed one after another in listing order. Stops early,
    /// without starting another file, once shutdown was requested.
    #[instrument(skip(self), fields(suffix = %self.config.file_suffix))]
    pub async fn run_pass(&self) -> PassSummary {
        let file_timeout = self.config.file_timeout();
        let listing = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(IngestError::Cancelled),
            listing = tokio::time::timeout(file_timeout, self.store.list_objects()) => {
                listing.unwrap_or(Err(IngestError::DeadlineExceeded {
                    operation: "list_objects",
                    timeout: file_timeout,
                }))
            },
        };

        let keys = match listing {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to list input files");
                return PassSummary::listing_failed(e.to_string());
            },
        };

        let candidates: Vec<String> = keys
            .into_iter()
            .filter(|key| self.config.is_candidate(key))
            .collect();

        info!(files = candidates.len(), "Starting ingestion pass");

        let mut summary = PassSummary::default();
        for key in candidates {
            if self.shutdown.is_cancelled() {
                warn!(remaining_from = %key, "Shutdown requested, ending pass early");
                break;
            }
            summary.outcomes.push(self.process_file(&key).await);
        }

        info!(
            processed = summary.processed(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Ingestion pass finished"
        );
        summary
    }
}
