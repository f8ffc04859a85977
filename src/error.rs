//! Error taxonomy for Workshop API operations.

/// Error types for Workshop client operations.
///
/// Variants are `Clone` so a terminal resolution failure can be handed to
/// every waiter of a lazy handle; network errors are captured as strings
/// for the same reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A login-gated request was issued without a session token
    #[error("not logged in")]
    AuthRequired,

    /// Login was rejected by the server
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login succeeded but the response carried no token
    #[error("login response missing token")]
    TokenMissing,

    /// Response status differed from the expected one
    #[error("unexpected status {actual} (expected {expected})")]
    UnexpectedStatus { expected: u16, actual: u16 },

    /// A required response body was missing or unparseable
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
