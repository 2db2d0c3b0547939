//! Configuration management

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::ingest::IngestConfig;
use crate::publisher::config::KafkaConfig;
use crate::storage::config::StorageConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Name reported by the liveness probe.
pub const DEFAULT_SERVICE_NAME: &str = "cadastro-service";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub kafka: KafkaConfig,
    pub ingest: IngestConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on draining in-flight work after a shutdown signal
    pub shutdown_timeout_secs: u64,
    pub service_name: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("CADASTRO_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            port: std::env::var("CADASTRO_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            shutdown_timeout_secs: std::env::var("CADASTRO_SHUTDOWN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            service_name: std::env::var("CADASTRO_SERVICE_NAME")
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", self.host, self.port, e))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Config {
            server: ServerConfig::from_env(),
            storage: StorageConfig::from_env()?,
            kafka: KafkaConfig::from_env()?,
            ingest: IngestConfig::from_env()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }
        if self.server.service_name.trim().is_empty() {
            anyhow::bail!("CADASTRO_SERVICE_NAME cannot be empty");
        }

        self.storage.validate()?;
        self.kafka.validate()?;
        self.ingest.validate()?;

        if !self.ingest.enabled {
            tracing::warn!("Periodic ingestion disabled - files are only processed on request");
        }

        Ok(())
    }
}
