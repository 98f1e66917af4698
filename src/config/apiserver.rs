use std::env;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::SERVICE_ACCOUNT_CA;
use crate::constants::SERVICE_ACCOUNT_TOKEN;
use crate::constants::SERVICE_HOST_ENV;
use crate::constants::SERVICE_PORT_ENV;
use crate::Error;
use crate::Result;

/// Orchestration API access. Defaults target the in-cluster service account.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiServerConfig {
    /// Base URL, e.g. `https://10.0.0.1:443`. Derived from
    /// `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT` when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token file, re-read on every request
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,

    /// PEM bundle used to verify the API server certificate
    #[serde(default = "default_ca_file")]
    pub ca_file: PathBuf,

    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Timeout of list requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Server-side duration of a single watch before it is re-opened
    #[serde(default = "default_watch_timeout_secs")]
    pub watch_timeout_secs: u64,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            token_file: default_token_file(),
            ca_file: default_ca_file(),
            insecure_skip_tls_verify: false,
            request_timeout_secs: default_request_timeout_secs(),
            watch_timeout_secs: default_watch_timeout_secs(),
        }
    }
}

impl ApiServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(invalid("apiserver.request_timeout_secs cannot be 0".into()));
        }
        if self.watch_timeout_secs == 0 {
            return Err(invalid("apiserver.watch_timeout_secs cannot be 0".into()));
        }
        if let Some(url) = &self.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(format!(
                    "apiserver.url {url:?} must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }

    /// Resolves the API base URL, falling back to the in-cluster service env
    pub fn resolve_url(&self) -> Result<String> {
        if let Some(url) = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let host = env::var(SERVICE_HOST_ENV).map_err(|_| {
            invalid(format!(
                "apiserver.url is unset and {SERVICE_HOST_ENV} is not defined"
            ))
        })?;
        let port = env::var(SERVICE_PORT_ENV).unwrap_or_else(|_| "443".to_string());

        // IPv6 service hosts need brackets
        if host.contains(':') {
            Ok(format!("https://[{host}]:{port}"))
        } else {
            Ok(format!("https://{host}:{port}"))
        }
    }
}

fn invalid(msg: String) -> Error {
    Error::Config(ConfigError::Message(msg))
}

fn default_token_file() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_TOKEN)
}

fn default_ca_file() -> PathBuf {
    PathBuf::from(SERVICE_ACCOUNT_CA)
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_watch_timeout_secs() -> u64 {
    300
}
