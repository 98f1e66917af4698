//! Configuration management module for the events exporter.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod apiserver;
mod filter;
mod logging;
mod retry;
mod server;
pub use apiserver::*;
pub use filter::*;
pub use logging::*;
pub use retry::*;
pub use server::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of environment variable overrides, e.g. `KEE__SERVER__PORT=9090`
pub const ENV_PREFIX: &str = "KEE";

/// Allow-list keys that accept comma separated values from the environment
const LIST_KEYS: [&str; 4] = [
    "filter.event_types",
    "filter.involved_object_api_groups",
    "filter.involved_object_namespaces",
    "filter.reporting_controllers",
];

/// Main configuration container for the exporter
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExporterConfig {
    /// Which events are counted and how subscriptions are partitioned
    #[serde(default)]
    pub filter: FilterConfig,
    /// Listen addresses of the events and self-metrics endpoints
    #[serde(default)]
    pub server: ServerConfig,
    /// Orchestration API endpoint and credentials
    #[serde(default)]
    pub apiserver: ApiServerConfig,
    /// Resubscribe backoff of the watch loop
    #[serde(default)]
    pub retry: BackoffPolicy,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExporterConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `KEE__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/exporter.toml");
    /// std::env::set_var("KEE__FILTER__EVENT_TYPES", "Warning");
    /// let cfg = ExporterConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns the first validation error found in any subsystem:
    /// - Allow-list values that cannot be expressed as field selectors
    /// - Zero or conflicting listen ports
    /// - Zero API timeouts or a malformed API server URL
    /// - Inverted backoff bounds
    pub fn validate(self) -> Result<Self> {
        self.filter.validate()?;
        self.server.validate()?;
        self.apiserver.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    let env = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .ignore_empty(true)
        .try_parsing(true);

    LIST_KEYS.iter().fold(env, |env, key| env.with_list_parse_key(key))
}
