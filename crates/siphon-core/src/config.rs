//! Service configuration, loaded from the environment.
//!
//! Both services share the database/AWS settings; the uploader
//! additionally consumes the storage notification queue. Queue names are
//! resolved to URLs by the bus crate.

use std::env;

use anyhow::{Context, Result};

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// Settings shared by both pipeline services.
#[derive(Clone, Debug)]
pub struct SharedConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub aws_region: String,
    /// Custom endpoint for S3/SQS-compatible providers (MinIO,
    /// LocalStack). `None` for real AWS.
    pub aws_endpoint: Option<String>,
    pub raw_data_bucket: String,
    pub success_queue_url: String,
    pub error_queue_url: String,
}

impl SharedConfig {
    pub fn from_env() -> Result<Self> {
        Ok(SharedConfig {
            database_url: required("DATABASE_URL")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
            aws_region: required("AWS_REGION")?,
            aws_endpoint: env::var("AWS_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            raw_data_bucket: required("RAW_DATA_BUCKET")?,
            success_queue_url: required("INGEST_SUCCESS_QUEUE_URL")?,
            error_queue_url: required("INGEST_ERROR_QUEUE_URL")?,
        })
    }
}

/// Upload-completion service configuration.
#[derive(Clone, Debug)]
pub struct UploaderConfig {
    pub shared: SharedConfig,
    /// Queue receiving S3 "object created" notifications.
    pub notification_queue_url: String,
}

impl UploaderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(UploaderConfig {
            shared: SharedConfig::from_env()?,
            notification_queue_url: required("UPLOAD_NOTIFICATION_QUEUE_URL")?,
        })
    }
}

/// File-processing service configuration.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    pub shared: SharedConfig,
}

impl ParserConfig {
    pub fn from_env() -> Result<Self> {
        Ok(ParserConfig {
            shared: SharedConfig::from_env()?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

fn optional<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.is_empty() => {
            let value = raw
                .parse()
                .with_context(|| format!("{name} is not a valid value"))?;
            Ok(Some(value))
        }
        _ => Ok(None),
    }
}
