//! Test helpers for cadastro server integration tests
//!
//! Builds a pipeline wired to the in-memory store and broker so tests can
//! seed input files and inspect what reached the topic.

#![allow(dead_code)]

use cadastro_server::{
    ingest::{IngestConfig, IngestOrchestrator},
    publisher::{memory::PublishedMessage, InMemoryBroker, Publisher},
    storage::InMemoryStore,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const TOPIC: &str = "csv-data";

/// Header and rows of the reference input file, one row with a bad age
pub const PESSOAS_CSV: &str = "nome,idade,cidade\nAna,30,SP\nBruno,abc,RJ\nCarla,25,MG\n";

pub struct TestPipeline {
    pub store: InMemoryStore,
    pub broker: InMemoryBroker,
    pub shutdown: CancellationToken,
    pub orchestrator: Arc<IngestOrchestrator>,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with_config(IngestConfig::default())
    }

    pub fn with_config(config: IngestConfig) -> Self {
        let store = InMemoryStore::new();
        let broker = InMemoryBroker::new();
        let shutdown = CancellationToken::new();

        let publisher = Publisher::new(Arc::new(broker.clone()), TOPIC, config.send_timeout());
        let orchestrator = Arc::new(IngestOrchestrator::new(
            Arc::new(store.clone()),
            publisher,
            config,
            shutdown.clone(),
        ));

        Self {
            store,
            broker,
            shutdown,
            orchestrator,
        }
    }

    pub async fn seed(&self, key: &str, content: &str) -> &Self {
        self.store.put(key, content).await;
        self
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.broker.messages_for(TOPIC).await
    }

    pub async fn published_keys(&self) -> Vec<String> {
        self.published().await.into_iter().map(|m| m.key).collect()
    }
}
