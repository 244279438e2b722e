//! # Distribution Errors

use thiserror::Error;

/// Failure of one delivery attempt to one sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The request never completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("Endpoint responded with status {status}")]
    Status { status: u16 },

    /// The batch could not be turned into a request.
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => SinkError::Status {
                status: status.as_u16(),
            },
            None => SinkError::Transport(e.to_string()),
        }
    }
}
