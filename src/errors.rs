//! Exporter Error Hierarchy
//!
//! Errors are grouped by the layer that produces them. Filter rejections are
//! not errors: a dropped event is a normal outcome of the pipeline.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// List/watch failures against the orchestration API
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Process-level failures (metrics registry, IO, task plumbing)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, TLS or body read failures
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx answer from the API server
    #[error("API server returned {code}: {message}")]
    Status { code: u16, message: String },

    /// Malformed list body or watch line
    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested resourceVersion is no longer available (HTTP 410)
    #[error("Watch expired: {0}")]
    WatchExpired(String),

    /// Watch closed without delivering anything before it could be trusted
    #[error("Watch closed after {0:?} without any event")]
    ShortWatch(std::time::Duration),

    /// Malformed API server endpoint
    #[error("Invalid API server URL: {0}")]
    InvalidUrl(String),

    /// Service account token or CA bundle could not be read
    #[error("Failed to read credentials at {path}")]
    Credentials {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TransportError {
    /// Whether the failure means the caller must relist instead of re-watching
    pub fn is_expired(&self) -> bool {
        match self {
            TransportError::WatchExpired(_) => true,
            TransportError::Status { code, .. } => *code == 410,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Metric registration or encoding failures
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Log file and socket failures
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Metrics server could not listen on its address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: warp::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSenderClosed(String),
}

// ============== Conversion Implementations ============== //
impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::System(SystemError::Metrics(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(TransportError::Request(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Transport(TransportError::Decode(e))
    }
}
