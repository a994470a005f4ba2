// Error types for scavenger.
// Separates upstream failures (not found, server, network) from cache lifecycle errors.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScavengerError {
    #[error("{0}")]
    NotFound(String),

    #[error("Unexpected server error ({status}). Message was:\n{body}")]
    Server { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by callers that render failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Server,
    Network,
    Unavailable,
    Internal,
}

impl ScavengerError {
    /// Build a server error from an unexpected upstream response.
    pub fn server(status: u16, body: &Value) -> Self {
        let body = match body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        ScavengerError::Server { status, body }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScavengerError::NotFound(_) => ErrorKind::NotFound,
            ScavengerError::Server { .. } => ErrorKind::Server,
            ScavengerError::Network(_) => ErrorKind::Network,
            ScavengerError::Unavailable(_) => ErrorKind::Unavailable,
            ScavengerError::Json(_)
            | ScavengerError::Io(_)
            | ScavengerError::Url(_)
            | ScavengerError::Config(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status a route layer should answer with.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScavengerError>;
