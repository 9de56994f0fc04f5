use std::io;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend runtime `{executable}` was not found")]
    ExecutableNotFound {
        executable: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn backend process with command {command:?}: {source}")]
    Spawn {
        command: Vec<String>,
        #[source]
        source: io::Error,
    },
    #[error("backend directory does not exist: {0}")]
    BackendDirMissing(String),
    #[error("invalid {env}: {value}")]
    InvalidCommand { env: &'static str, value: String },
    #[error("a backend start is already in progress")]
    StartInProgress,
    #[error("backend shutdown has begun")]
    ShuttingDown,
    #[error("backend process is not running")]
    NotRunning,
    #[error("backend process exited before becoming reachable: {0}")]
    ExitedBeforeReady(String),
    #[error("timed out after {0}ms waiting for backend startup")]
    ReadinessTimeout(u128),
    #[error("backend readiness wait was cancelled")]
    Cancelled,
    #[error("failed to poll backend process status: {0}")]
    Poll(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error: {status}")]
    Status { status: StatusCode },
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("malformed stream event: {0}")]
    Event(#[source] serde_json::Error),
    #[error("invalid request url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("relative API base {0} requires a page origin")]
    MissingOrigin(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Errors raised before any response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_send(error: reqwest::Error) -> Self {
        if error.is_builder() {
            ApiError::Client(error)
        } else {
            ApiError::Transport(error)
        }
    }
}
