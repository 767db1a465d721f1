//! Cloud Build adapter errors.

use pipeline::DispatchError;
use thiserror::Error;

/// Failures talking to Cloud Build or the token endpoint.
#[derive(Debug, Error)]
pub enum CloudBuildError {
    /// No access token could be obtained.
    #[error("Could not obtain access token: {0}")]
    Token(String),

    /// The request did not complete (DNS, TLS, connection, timeout).
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Endpoint that was called.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{url} returned {status}: {body}")]
    Rejected {
        /// Endpoint that was called.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the service.
        body: String,
    },

    /// A success response could not be understood.
    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse {
        /// Endpoint that was called.
        url: String,
        /// Parse error text.
        message: String,
    },
}

impl From<CloudBuildError> for DispatchError {
    fn from(err: CloudBuildError) -> Self {
        DispatchError::Submission {
            message: err.to_string(),
        }
    }
}
