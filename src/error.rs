use std::time::Duration;

use thiserror::Error;

/// Failure of a snapshot request, as surfaced to the dashboard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// HTTP 429, or an error body naming "Too Many Requests".
    #[error("{message}")]
    RateLimited {
        message: String,
        /// Seconds the server asked us to wait.
        retry_after: Option<u64>,
    },

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Failed to fetch: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RateLimited { .. } => Some(429),
            FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// A payload that does not match the expected shape will not get better by asking again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Decode(_))
    }
}

/// Failure inside the live insights stream. Never escapes the stream client;
/// it is logged and folded into the connection state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Stream endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Stream transport error: {0}")]
    Transport(String),

    #[error("Malformed insights payload: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },

    #[error("Failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

pub type FetchResult<T> = Result<T, FetchError>;
