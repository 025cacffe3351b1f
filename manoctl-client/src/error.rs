//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced an HTTP response (connection refused,
    /// TLS failure, invalid URL, ...).
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The server answered with a status code outside the accepted set.
    /// Carries the raw response body, unmodified.
    #[error("{0}")]
    Server(String),

    /// The response decoded but does not have the shape the operation requires.
    #[error("unexpected response from server - {0}")]
    UnexpectedResponse(String),

    /// The response body could not be decoded at all.
    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("operation timeout, waited for {0} seconds")]
    Timeout(u64),

    /// Uniform wrap applied once at the boundary of a wait session.
    #[error("Operation failed for {entity}:\nerror:\n{message}")]
    OperationFailed { entity: String, message: String },

    /// Resource-operation failure wrapping a lower-level error, with the
    /// composed message of the triggering command.
    #[error("{0}")]
    Operation(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClientError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
