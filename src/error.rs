//! Common error types for drivelink.

use thiserror::Error;

/// Top-level error type for drivelink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A Drive operation was attempted without a cached access token.
    #[error("Not authenticated: no access token (call sign_in first)")]
    AuthenticationRequired,

    /// The OAuth provider or authorization flow reported a failure.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A Drive REST call returned a non-2xx status.
    ///
    /// `body` is the response body text, falling back to the status text
    /// when the body cannot be read.
    #[error("{status} {status_text}: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Transport-level failure before an HTTP response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// HTTP status code, if this is an [`Error::Http`].
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
