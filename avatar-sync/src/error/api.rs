//! Assistant backend error types

use std::time::Duration;

/// Errors that can occur during calls to the assistant backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP error response from the backend.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The call exceeded its deadline.
    #[error("La petición a {resource} excedió el tiempo límite de {} segundos.", .timeout.as_secs())]
    Timeout {
        /// Path of the endpoint that timed out.
        resource: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse the backend response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },
}

impl ApiError {
    /// Creates a new HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Maps a transport error, separating deadline expiry from other
    /// network failures.
    pub fn from_transport(err: reqwest::Error, resource: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                resource: resource.to_string(),
                timeout,
            }
        } else if err.is_decode() {
            Self::parse(err.to_string())
        } else {
            Self::Network(err)
        }
    }

    /// Returns the HTTP status code if this is an HTTP error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the call ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
