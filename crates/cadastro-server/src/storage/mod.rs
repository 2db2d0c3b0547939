//! Object store gateway
//!
//! [`ObjectStore`] is the seam the orchestrator reads input files through.
//! [`Storage`] talks to S3 (or anything S3-compatible); [`InMemoryStore`]
//! keeps objects in process for tests and local runs.
//!
//! Neither implementation retries or caches: each call is one round trip and
//! failures surface immediately as [`IngestError`].

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{retry::RetryConfig, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    Client,
};
use cadastro_common::{IngestError, Result};
use tracing::{debug, info, instrument};

pub mod config;
pub mod memory;

pub use memory::InMemoryStore;

/// Read-only view of the bucket holding input files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Snapshot of every key currently in the bucket, in no particular order
    async fn list_objects(&self) -> Result<Vec<String>>;

    /// Full content of `key`, decoded as UTF-8
    async fn read_object(&self, key: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> anyhow::Result<Self> {
        config.validate()?;
        debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            region = %config.region,
            "Initializing storage"
        );

        let mut s3_config_builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "cadastro-storage");
                aws_sdk_s3::Config::builder()
                    .credentials_provider(credentials)
                    .region(Region::new(config.region.clone()))
            },
            _ => {
                let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        // one round trip per call; the next discovery pass is the retry
        s3_config_builder = s3_config_builder
            .retry_config(RetryConfig::disabled())
            .force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!(bucket = %config.bucket, "Storage client initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }
}

#[async_trait]
impl ObjectStore for Storage {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_objects(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_prefix(self.prefix.clone())
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| unavailable("Failed to list objects", e))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                },
                _ => break,
            }
        }

        info!(count = keys.len(), "Listed objects");
        Ok(keys)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn read_object(&self, key: &str) -> Result<String> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e.as_service_error().is_some_and(|se| se.is_no_such_key())
                    || e.raw_response().is_some_and(|r| r.status().as_u16() == 404);
                if missing {
                    IngestError::ObjectNotFound(format!("s3://{}/{}", self.bucket, key))
                } else {
                    unavailable(&format!("Failed to read {}", key), e)
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| {
                IngestError::StoreUnavailable(format!("Failed to read body of {}: {}", key, e))
            })?
            .into_bytes();

        let content = String::from_utf8(bytes.to_vec()).map_err(|e| {
            IngestError::MalformedInput(format!("{} is not valid UTF-8: {}", key, e))
        })?;

        debug!(bytes = content.len(), "Read object");
        Ok(content)
    }
}

fn unavailable<E, R>(context: &str, err: SdkError<E, R>) -> IngestError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    IngestError::StoreUnavailable(format!("{}: {}", context, DisplayErrorContext(&err)))
}
