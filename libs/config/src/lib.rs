//! Layered configuration for the aggregation service.
//!
//! Configuration loads from an optional TOML file, then is overridden by
//! `AGGREGATOR_`-prefixed environment variables (e.g.
//! `AGGREGATOR_SERVER_PORT=9000`, `AGGREGATOR_REDIS_TTL_SECONDS=120`). This
//! mirrors the layered file-then-env approach used elsewhere in the
//! workspace for service configuration.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Root configuration object, deserialized from TOML + environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub ankr: AnkrConfig,
    #[serde(default)]
    pub blockscout: Vec<BlockscoutConfig>,
    #[serde(default)]
    pub blockscan: Vec<BlockscanConfig>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    /// Uppercase chain name → chain id.
    #[serde(default)]
    pub chain_names: HashMap<String, i64>,
    /// Chain id (as a decimal string key) → native token symbol.
    #[serde(default)]
    pub native_tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedisConfig {
    /// More than one address selects cluster mode.
    pub addrs: Vec<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_ttl_seconds() -> u64 {
    300
}

impl RedisConfig {
    pub fn is_cluster(&self) -> bool {
        self.addrs.len() > 1
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Uppercase chain name → adapter key (`"ankr"`, `"blockscout"`, `"blockscan"`).
    #[serde(default)]
    pub chain_providers: HashMap<String, String>,
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnkrConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub url: String,
    /// Uppercase chain name → chain id, restricted to chains Ankr serves.
    #[serde(default)]
    pub chain_ids: HashMap<String, i64>,
    #[serde(default = "default_page_size")]
    pub request_page_size: u32,
    #[serde(default = "default_true")]
    pub include_logs: bool,
    #[serde(default = "default_true")]
    pub desc_order: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockscoutConfig {
    pub url: String,
    pub chain_name: String,
    #[serde(default = "default_page_size")]
    pub request_page_size: u32,
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default = "default_request_timeout")]
    pub rpc_request_timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockscanConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    pub chain_name: String,
    #[serde(default = "default_page_size")]
    pub request_page_size: u32,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default)]
    pub startblock: u64,
    #[serde(default = "default_endblock")]
    pub endblock: u64,
}

fn default_page_size() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_sort() -> String {
    "desc".to_string()
}

fn default_page() -> u32 {
    1
}

fn default_endblock() -> u64 {
    99_999_999
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_true")]
    pub console_format: bool,
    #[serde(default)]
    pub file_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            path: String::new(),
            console_format: true,
            file_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseConfig {
    #[serde(default = "default_response_max")]
    pub max: usize,
    #[serde(default)]
    pub ascending: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max: default_response_max(),
            ascending: false,
        }
    }
}

fn default_response_max() -> usize {
    100
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then layer
    /// `AGGREGATOR_`-prefixed environment variables on top. `config_path`
    /// is optional: a missing default file is not an error, since every
    /// field has a sane default.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
            info!("loading configuration from {:?}", path);
        } else {
            let default_path = Path::new("config/aggregator.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path).required(false));
            } else {
                warn!("no configuration file found at config/aggregator.toml, using defaults");
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("AGGREGATOR")
                .separator("_")
                .try_parsing(true),
        );

        let built = builder.build().context("failed to build configuration")?;
        built
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_with_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aggregator.toml");
        fs::write(&path, "").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.redis.ttl_seconds, 300);
        assert_eq!(config.response.max, 100);
        assert!(!config.response.ascending);
    }

    #[test]
    fn loads_provider_and_chain_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aggregator.toml");
        fs::write(
            &path,
            r#"
[server]
port = 9000

[redis]
addrs = ["127.0.0.1:6379"]
ttl_seconds = 60

[chain_names]
ETH = 1
BSC = 56

[native_tokens]
"1" = "ETH"
"56" = "BNB"

[[blockscout]]
url = "https://eth.blockscout.com/api/v2"
chain_name = "ETH"
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.redis.is_cluster());
        assert_eq!(config.chain_names["ETH"], 1);
        assert_eq!(config.native_tokens["56"], "BNB");
        assert_eq!(config.blockscout.len(), 1);
        assert_eq!(config.blockscout[0].chain_name, "ETH");
    }

    #[test]
    fn env_override_beats_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aggregator.toml");
        fs::write(&path, "[server]\nport = 9000\n").unwrap();

        std::env::set_var("AGGREGATOR_SERVER_PORT", "7000");
        let config = AppConfig::load(Some(&path)).unwrap();
        std::env::remove_var("AGGREGATOR_SERVER_PORT");

        assert_eq!(config.server.port, 7000);
    }
}
