use async_trait::async_trait;
use cadastro_common::{IngestError, Result};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, info};

use super::config::KafkaConfig;
use super::{DeliveryMetadata, MessageBroker};

/// [`MessageBroker`] backed by a librdkafka producer
///
/// Retries and duplicate suppression happen inside librdkafka according to
/// [`KafkaConfig`]; a send resolves once the broker acknowledged the message
/// or librdkafka gave up on it.
#[derive(Clone)]
pub struct KafkaBroker {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaBroker {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| IngestError::Config(e.to_string()))?;

        let producer: FutureProducer = config.client_config().create().map_err(|e| {
            IngestError::Config(format!(
                "failed to create Kafka producer for {}: {}",
                config.bootstrap_servers.join(","),
                e
            ))
        })?;

        info!(
            servers = %config.bootstrap_servers.join(","),
            topic = %config.topic,
            acks = config.acks.as_str(),
            compression = config.compression.as_str(),
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            queue_timeout: config.message_timeout(),
        })
    }
}

#[async_trait]
impl MessageBroker for KafkaBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryMetadata> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
            .map_err(|(err, _message)| IngestError::PublishFailure(err.to_string()))?;

        debug!(topic, key, partition, offset, "Message delivered");
        Ok(DeliveryMetadata { partition, offset })
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        // librdkafka's flush blocks the calling thread
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| IngestError::PublishFailure(format!("flush task failed: {}", e)))?
            .map_err(|e| IngestError::PublishFailure(format!("flush failed: {}", e)))
    }
}
