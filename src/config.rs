// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the block-check service.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `BLOCKCHECK__`-prefixed environment variables (`__` separates sections,
//! e.g. `BLOCKCHECK__RATE_LIMIT__MAX_DOMAINS=500`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "BLOCKCHECK_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "blockcheck.toml";

/// Error raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// Configuration for the block-check service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Header carrying the connecting client's IP (default: cf-connecting-ip)
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Block-check API configuration
    #[serde(default)]
    pub checker: CheckerConfig,

    /// Persistent store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Per-client domain quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum domains a client may check per window (default: 1000)
    #[serde(default = "default_max_domains")]
    pub max_domains: u32,

    /// Window length in minutes (default: 10)
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    /// Interval of the background sweep of expired entries (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// External block-check API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Lookup endpoint, queried as `<endpoint>?domains=a,b&json=true`
    #[serde(default = "default_checker_endpoint")]
    pub endpoint: String,

    /// Domains per outbound request (default: 30)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum domains accepted in a single `/check` request (default: 100)
    #[serde(default = "default_max_domains_per_request")]
    pub max_domains_per_request: usize,

    /// Optional per-request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// SurrealDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection endpoint: `mem://`, `rocksdb://<path>` or `ws://<host:port>`
    #[serde(default = "default_store_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_database")]
    pub database: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_client_ip_header() -> String {
    "cf-connecting-ip".to_string()
}

fn default_max_domains() -> u32 {
    1000
}

fn default_window_minutes() -> u32 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_checker_endpoint() -> String {
    "http://127.0.0.1:8081/api/check".to_string()
}

fn default_batch_size() -> usize {
    30
}

fn default_max_domains_per_request() -> usize {
    100
}

fn default_store_endpoint() -> String {
    "mem://".to_string()
}

fn default_namespace() -> String {
    "blockcheck".to_string()
}

fn default_database() -> String {
    "stats".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            client_ip_header: default_client_ip_header(),
            rate_limit: RateLimitConfig::default(),
            checker: CheckerConfig::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_domains: default_max_domains(),
            window_minutes: default_window_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_checker_endpoint(),
            batch_size: default_batch_size(),
            max_domains_per_request: default_max_domains_per_request(),
            timeout_secs: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_store_endpoint(),
            namespace: default_namespace(),
            database: default_database(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = ::config::Config::builder()
            .add_source(::config::File::with_name(&path).required(false))
            .add_source(
                ::config::Environment::with_prefix("BLOCKCHECK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

impl RateLimitConfig {
    /// Get the window length
    pub fn window_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.window_minutes))
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl CheckerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
