//! Kafka producer configuration

use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Replica acknowledgement required before a send counts as delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Acks {
    #[default]
    All,
    Leader,
    None,
}

impl Acks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acks::All => "all",
            Acks::Leader => "1",
            Acks::None => "0",
        }
    }
}

impl std::str::FromStr for Acks {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "-1" => Ok(Acks::All),
            "1" | "leader" => Ok(Acks::Leader),
            "0" | "none" => Ok(Acks::None),
            _ => anyhow::bail!("Invalid acks mode: {}. Must be one of: all, 1, 0", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    #[default]
    Snappy,
    Lz4,
    Zstd,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Snappy => "snappy",
            Compression::Lz4 => "lz4",
            Compression::Zstd => "zstd",
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            "snappy" => Ok(Compression::Snappy),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            _ => anyhow::bail!(
                "Invalid compression: {}. Must be one of: none, gzip, snappy, lz4, zstd",
                s
            ),
        }
    }
}

/// Producer settings for the topic records are published to
///
/// Defaults give at-least-once delivery with producer-side duplicate
/// suppression: every in-sync replica acknowledges, the client retries a
/// bounded number of times, and idempotence is on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub acks: Acks,
    pub retries: u32,
    pub enable_idempotence: bool,
    /// Maximum batch size in bytes
    pub batch_size: u32,
    pub linger_ms: u64,
    pub compression: Compression,
    /// Upper bound librdkafka spends delivering one message, retries included
    pub message_timeout_ms: u64,
    pub client_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            topic: "csv-data".to_string(),
            acks: Acks::All,
            retries: 3,
            enable_idempotence: true,
            batch_size: 16_384,
            linger_ms: 10,
            compression: Compression::Snappy,
            message_timeout_ms: 30_000,
            client_id: "cadastro-server".to_string(),
        }
    }
}

impl KafkaConfig {
    /// Load producer configuration from `KAFKA_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let acks = match env::var("KAFKA_ACKS") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.acks,
        };
        let compression = match env::var("KAFKA_COMPRESSION") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.compression,
        };

        let config = Self {
            bootstrap_servers: env::var("KAFKA_BOOTSTRAP_SERVERS")
                .map(|s| {
                    s.split(',')
                        .map(|server| server.trim().to_string())
                        .filter(|server| !server.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.bootstrap_servers),
            topic: env::var("KAFKA_TOPIC").unwrap_or(defaults.topic),
            acks,
            retries: env::var("KAFKA_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retries),
            enable_idempotence: env::var("KAFKA_ENABLE_IDEMPOTENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.enable_idempotence),
            batch_size: env::var("KAFKA_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_size),
            linger_ms: env::var("KAFKA_LINGER_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.linger_ms),
            compression,
            message_timeout_ms: env::var("KAFKA_MESSAGE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.message_timeout_ms),
            client_id: env::var("KAFKA_CLIENT_ID").unwrap_or(defaults.client_id),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bootstrap_servers.is_empty() {
            anyhow::bail!("KAFKA_BOOTSTRAP_SERVERS must name at least one broker");
        }
        if self.topic.trim().is_empty() {
            anyhow::bail!("KAFKA_TOPIC cannot be empty");
        }
        // librdkafka refuses idempotence with acks weaker than all or without retries
        if self.enable_idempotence && self.acks != Acks::All {
            anyhow::bail!(
                "KAFKA_ENABLE_IDEMPOTENCE requires KAFKA_ACKS=all (got {})",
                self.acks.as_str()
            );
        }
        if self.enable_idempotence && self.retries == 0 {
            anyhow::bail!("KAFKA_ENABLE_IDEMPOTENCE requires KAFKA_RETRIES greater than 0");
        }
        if self.message_timeout_ms == 0 {
            anyhow::bail!("KAFKA_MESSAGE_TIMEOUT_MS must be greater than 0");
        }
        Ok(())
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    /// librdkafka client properties for a producer
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", self.bootstrap_servers.join(","))
            .set("client.id", &self.client_id)
            .set("acks", self.acks.as_str())
            .set("retries", self.retries.to_string())
            .set("enable.idempotence", self.enable_idempotence.to_string())
            .set("batch.size", self.batch_size.to_string())
            .set("linger.ms", self.linger_ms.to_string())
            .set("compression.type", self.compression.as_str())
            .set("message.timeout.ms", self.message_timeout_ms.to_string());
        client_config
    }
}
