//! Store configuration module
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`SHARDSTORE_CONFIG`, default `shardstore.toml`), then
//! `SHARDSTORE_*` environment variables. `.env` is loaded first.

use crate::backend::RetryPolicy;
use crate::error::StoreError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// A named shard endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShardEndpoint {
    pub name: String,
    pub url: String,
}

/// shardstore configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// URL of the plain (single-shard) document store
    pub url: String,

    /// Tenant database sessions open against
    pub database: String,

    /// Shards from the config file
    pub shards: Vec<ShardEndpoint>,

    /// Shards from the environment: `Africa=http://host:8092,Europe=http://...`
    pub shard_list: Option<String>,

    /// Document node HTTP port
    pub http_port: u16,

    /// Name reported by the document node
    pub node_name: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub request_timeout_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8092".to_string(),
            database: "tenant".to_string(),
            shards: Vec::new(),
            shard_list: None,
            http_port: 8092,
            node_name: "shardstore".to_string(),
            log_level: "info".to_string(),
            request_timeout_ms: 5_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 50,
            retry_max_delay_ms: 2_000,
        }
    }
}

impl StoreConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();

        let path = env::var("SHARDSTORE_CONFIG").unwrap_or_else(|_| "shardstore.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("SHARDSTORE").try_parsing(true))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to read configuration: {e}")))?;

        let config: StoreConfig = settings
            .try_deserialize()
            .map_err(|e| StoreError::Config(format!("invalid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database.trim().is_empty() {
            return Err(StoreError::Config("database must not be empty".to_string()));
        }
        if self.retry_max_attempts == 0 {
            return Err(StoreError::Config(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        self.shard_endpoints().map(|_| ())
    }

    /// File shards followed by environment shards; names must be unique
    pub fn shard_endpoints(&self) -> Result<Vec<ShardEndpoint>, StoreError> {
        let mut endpoints = self.shards.clone();
        if let Some(list) = &self.shard_list {
            endpoints.extend(parse_shard_list(list)?);
        }

        let mut seen = HashSet::new();
        for endpoint in &endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(StoreError::DuplicateShard {
                    name: endpoint.name.clone(),
                });
            }
        }

        Ok(endpoints)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Parse `Name=url,Name=url`
pub fn parse_shard_list(list: &str) -> Result<Vec<ShardEndpoint>, StoreError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                StoreError::Config(format!("shard entry '{entry}' must look like Name=url"))
            })?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                return Err(StoreError::Config(format!(
                    "shard entry '{entry}' needs both a name and a url"
                )));
            }
            Ok(ShardEndpoint {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}
