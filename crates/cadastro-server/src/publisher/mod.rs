//! Record publisher
//!
//! [`Publisher`] turns [`PersonRecord`]s into keyed JSON messages and hands
//! them to a [`MessageBroker`]. Delivery guarantees (acks, retries,
//! idempotence) belong to the broker client; the publisher only bounds how
//! long it waits and reports what happened to each message.
//!
//! # Batches
//!
//! [`Publisher::send_batch`] submits every record in input order, then waits
//! for all of them. It never stops early on a failure: the returned
//! [`BatchSendResult`] holds one [`SendOutcome`] per record, and callers
//! decide what a partial failure means for them.

use async_trait::async_trait;
use cadastro_common::{IngestError, PersonRecord, Result};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

pub mod config;
pub mod kafka;
pub mod memory;

pub use kafka::KafkaBroker;
pub use memory::InMemoryBroker;

/// Where the broker stored an acknowledged message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryMetadata {
    pub partition: i32,
    pub offset: i64,
}

/// Keyed message transport
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish `payload` under `key`, resolving once the broker acknowledged it
    ///
    /// Messages sharing a key must be delivered in the order `send` was first
    /// polled for them.
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryMetadata>;

    /// Wait up to `timeout` for messages still queued in the client
    async fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// What happened to one record of a batch
#[derive(Debug)]
pub struct SendOutcome {
    pub message_id: String,
    pub key: String,
    pub result: Result<DeliveryMetadata>,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-record outcomes of [`Publisher::send_batch`], in submission order
#[derive(Debug, Default)]
pub struct BatchSendResult {
    pub outcomes: Vec<SendOutcome>,
}

impl BatchSendResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SendOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[derive(Clone)]
pub struct Publisher {
    broker: Arc<dyn MessageBroker>,
    topic: String,
    send_timeout: Duration,
}

impl Publisher {
    pub fn new(broker: Arc<dyn MessageBroker>, topic: impl Into<String>, send_timeout: Duration) -> Self {
        Self {
            broker,
            topic: topic.into(),
            send_timeout,
        }
    }

    /// Publish one record keyed by its name
    #[instrument(skip(self, record), fields(message_id = %record.message_id, key = %record.key()))]
    pub async fn send(&self, record: &PersonRecord) -> Result<DeliveryMetadata> {
        let payload = serde_json::to_vec(record)?;

        let metadata = tokio::time::timeout(
            self.send_timeout,
            self.broker.send(&self.topic, record.key(), &payload),
        )
        .await
        .map_err(|_| IngestError::DeadlineExceeded {
            operation: "send",
            timeout: self.send_timeout,
        })??;

        debug!(
            partition = metadata.partition,
            offset = metadata.offset,
            "Record published"
        );
        Ok(metadata)
    }

    /// Publish every record and wait until each send has settled
    ///
    /// Sends still pending when `cancel` fires settle as
    /// [`IngestError::Cancelled`]. Success and failure counts always add up to
    /// `records.len()`.
    pub async fn send_batch(
        &self,
        records: &[PersonRecord],
        cancel: &CancellationToken,
    ) -> BatchSendResult {
        self.send_batch_tracked(records, cancel, &AtomicUsize::new(0)).await
    }

    /// [`Self::send_batch`], bumping `acked` as each send is acknowledged
    ///
    /// `acked` stays readable when the caller abandons the batch midway, so a
    /// caller enforcing its own deadline still knows how many records landed.
    pub async fn send_batch_tracked(
        &self,
        records: &[PersonRecord],
        cancel: &CancellationToken,
        acked: &AtomicUsize,
    ) -> BatchSendResult {
        let sends = records.iter().map(|record| async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(IngestError::Cancelled),
                result = self.send(record) => result,
            };

            match result {
                Ok(_) => {
                    acked.fetch_add(1, Ordering::SeqCst);
                },
                Err(ref e) => error!(
                    topic = %self.topic,
                    message_id = %record.message_id,
                    key = %record.key(),
                    error = %e,
                    "Failed to publish record"
                ),
            }

            SendOutcome {
                message_id: record.message_id.clone(),
                key: record.key().to_string(),
                result,
            }
        });

        let batch = BatchSendResult {
            outcomes: join_all(sends).await,
        };

        info!(
            topic = %self.topic,
            total = batch.len(),
            succeeded = batch.success_count(),
            failed = batch.failure_count(),
            "Batch publish finished"
        );
        batch
    }

    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        self.broker.flush(timeout).await
    }
}
