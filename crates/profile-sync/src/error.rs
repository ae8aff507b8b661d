//! Error types for the profile sync crate.

use thiserror::Error;

/// Result type alias for profile sync operations.
pub type Result<T> = std::result::Result<T, ProfileSyncError>;

/// Errors that can occur while syncing a user profile.
///
/// The error is `Clone` because a single flush result is delivered to every
/// caller holding the same pending outcome.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProfileSyncError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// API error response from the profile service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The task driving a flush was dropped before it produced a result
    #[error("Update interrupted: {0}")]
    Interrupted(String),
}

impl ProfileSyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an interrupted error
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted(message.into())
    }
}

impl From<reqwest::Error> for ProfileSyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ProfileSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
