//! External model service errors
//!
//! This module defines BackendError, shared by the zero-shot classifier and the
//! generative override client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Errors that can occur while talking to an external model service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Authentication failed or credentials are invalid
    AuthenticationError { message: String },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Rate limit exceeded, retry after the specified duration (in seconds)
    RateLimitError { retry_after: Option<u64> },

    /// Response body did not have a recognizable shape
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Configuration error (missing credentials, invalid endpoint, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    /// Maps a transport error from reqwest onto the taxonomy.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::TimeoutError {
                seconds: timeout.as_secs(),
            }
        } else if err.is_connect() {
            BackendError::NetworkError {
                message: format!("Connection failed: {}", err),
            }
        } else if err.is_decode() {
            BackendError::InvalidResponse {
                message: format!("Body decode failed: {}", err),
                raw_response: None,
            }
        } else {
            BackendError::NetworkError {
                message: format!("Request failed: {}", err),
            }
        }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let snippet: String = body.chars().take(200).collect();
        match status {
            401 | 403 => BackendError::AuthenticationError {
                message: format!("HTTP {}: {}", status, snippet),
            },
            429 => BackendError::RateLimitError { retry_after },
            _ => BackendError::ApiError {
                message: format!("HTTP {}: {}", status, snippet),
                status_code: Some(status),
            },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::TimeoutError { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::AuthenticationError { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::RateLimitError { retry_after } => {
                if let Some(seconds) = retry_after {
                    write!(f, "Rate limit exceeded, retry after {} seconds", seconds)
                } else {
                    write!(f, "Rate limit exceeded")
                }
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from service: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}
