use async_trait::async_trait;
use cadastro_common::{IngestError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{DeliveryMetadata, MessageBroker};

/// A message accepted by [`InMemoryBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub offset: i64,
}

impl PublishedMessage {
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

#[derive(Default)]
struct BrokerState {
    messages: Vec<PublishedMessage>,
    next_offset: HashMap<String, i64>,
    fail_keys: HashSet<String>,
    delay: Option<Duration>,
    key_delays: HashMap<String, Duration>,
}

/// Single-partition broker kept in process, for tests and dry runs
///
/// Offsets increase monotonically per topic. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent send whose key is `key`
    pub async fn fail_key(&self, key: impl Into<String>) {
        self.state.lock().await.fail_keys.insert(key.into());
    }

    /// Hold every subsequent send for `delay` before acknowledging it
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().await.delay = delay;
    }

    /// Hold subsequent sends keyed `key` for `delay`, overriding [`Self::set_delay`]
    pub async fn delay_key(&self, key: impl Into<String>, delay: Duration) {
        self.state.lock().await.key_delays.insert(key.into(), delay);
    }

    /// Every accepted message, in acknowledgement order
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn messages_for(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<DeliveryMetadata> {
        let delay = {
            let state = self.state.lock().await;
            state.key_delays.get(key).copied().or(state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.fail_keys.contains(key) {
            return Err(IngestError::PublishFailure(format!(
                "broker rejected message with key '{}'",
                key
            )));
        }

        let next = state.next_offset.entry(topic.to_string()).or_insert(0);
        let offset = *next;
        *next += 1;

        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
            offset,
        });

        Ok(DeliveryMetadata {
            partition: 0,
            offset,
        })
    }
}
