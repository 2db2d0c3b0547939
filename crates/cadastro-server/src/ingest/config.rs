//! Ingestion configuration
//!
//! Controls which files a pass picks up, how often passes run, and the
//! deadlines that keep a slow store or broker from stalling a pass.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default key suffix a file must end with to be ingested.
pub const DEFAULT_FILE_SUFFIX: &str = "pessoas.csv";

/// Default pause between passes in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// Default deadline for processing a whole file in seconds.
pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 300;

/// Default deadline for a single message send in seconds.
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// What a file's outcome should be when some of its messages failed to publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishFailurePolicy {
    /// Any failed send fails the file
    Fail,
    /// The file succeeds once every send was attempted; failures only show in the counts
    #[default]
    Tolerate,
}

impl std::str::FromStr for PublishFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(PublishFailurePolicy::Fail),
            "tolerate" => Ok(PublishFailurePolicy::Tolerate),
            _ => anyhow::bail!(
                "Invalid publish failure policy: {}. Must be 'fail' or 'tolerate'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Whether the periodic trigger runs
    pub enabled: bool,
    pub interval_ms: u64,
    pub file_suffix: String,
    /// Field delimiter of the input files
    pub delimiter: u8,
    pub file_timeout_secs: u64,
    pub send_timeout_secs: u64,
    pub publish_failure_policy: PublishFailurePolicy,
}

impl IngestConfig {
    /// Load ingestion configuration from `INGEST_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let delimiter = match std::env::var("INGEST_DELIMITER") {
            Ok(value) => parse_delimiter(&value)?,
            Err(_) => b',',
        };

        let publish_failure_policy = match std::env::var("INGEST_PUBLISH_FAILURE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => PublishFailurePolicy::default(),
        };

        let config = Self {
            enabled: std::env::var("INGEST_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            interval_ms: std::env::var("INGEST_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_INTERVAL_MS),
            file_suffix: std::env::var("INGEST_FILE_SUFFIX")
                .unwrap_or_else(|_| DEFAULT_FILE_SUFFIX.to_string()),
            delimiter,
            file_timeout_secs: std::env::var("INGEST_FILE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FILE_TIMEOUT_SECS),
            send_timeout_secs: std::env::var("INGEST_SEND_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SEND_TIMEOUT_SECS),
            publish_failure_policy,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.file_suffix.is_empty() {
            anyhow::bail!("INGEST_FILE_SUFFIX cannot be empty");
        }
        if self.interval_ms == 0 {
            anyhow::bail!("INGEST_INTERVAL_MS must be greater than 0");
        }
        if self.file_timeout_secs == 0 {
            anyhow::bail!("INGEST_FILE_TIMEOUT_SECS must be greater than 0");
        }
        if self.send_timeout_secs == 0 {
            anyhow::bail!("INGEST_SEND_TIMEOUT_SECS must be greater than 0");
        }
        if self.send_timeout_secs > self.file_timeout_secs {
            anyhow::bail!(
                "INGEST_SEND_TIMEOUT_SECS ({}) cannot exceed INGEST_FILE_TIMEOUT_SECS ({})",
                self.send_timeout_secs,
                self.file_timeout_secs
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Whether `key` names a file this service ingests
    pub fn is_candidate(&self, key: &str) -> bool {
        key.ends_with(&self.file_suffix)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_INTERVAL_MS,
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            delimiter: b',',
            file_timeout_secs: DEFAULT_FILE_TIMEOUT_SECS,
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            publish_failure_policy: PublishFailurePolicy::default(),
        }
    }
}

fn parse_delimiter(value: &str) -> anyhow::Result<u8> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ if value.len() == 1 && value.is_ascii() => Ok(value.as_bytes()[0]),
        _ => anyhow::bail!("INGEST_DELIMITER must be a single ASCII character, got '{}'", value),
    }
}
