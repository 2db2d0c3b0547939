use serde::{Deserialize, Serialize};
use std::env;

/// Connection settings for the bucket holding the input files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom endpoint (MinIO, LocalStack); `None` means AWS
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Only keys under this prefix are listed
    pub prefix: Option<String>,
    /// Static credentials; when absent the default AWS credential chain is used
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "cadastro".to_string()),
            prefix: env::var("S3_PREFIX").ok().filter(|p| !p.is_empty()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            bucket: bucket.into(),
            prefix: None,
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bucket.is_empty() {
            anyhow::bail!("S3_BUCKET cannot be empty");
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            anyhow::bail!("S3 access key and secret key must be set together");
        }
        Ok(())
    }

    /// Whether static credentials were configured
    pub fn has_static_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }
}
