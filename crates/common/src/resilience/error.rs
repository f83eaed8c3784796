// Error types for retry policy construction and configuration loading
use thiserror::Error;

use crate::error::{CommonError, ErrorCategory};

/// Errors raised while building or loading a [`RetryPolicy`](super::RetryPolicy)
///
/// The executor itself never produces this type: the error returned from
/// `execute_sync`/`execute_async` is always the wrapped operation's own error.
#[derive(Debug, Error)]
pub enum RetryError {
    // TOML syntax (Serialization) and file access (Persistence)
    #[error(transparent)]
    Common(#[from] CommonError),

    /// The policy parameters violate an invariant
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A textual setting could not be parsed
    #[error("Unable to parse {what}: '{value}'")]
    Parse { what: &'static str, value: String },
}

impl RetryError {
    pub(crate) fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }
}

impl From<toml::de::Error> for RetryError {
    fn from(err: toml::de::Error) -> Self {
        Self::Common(err.into())
    }
}

impl ErrorCategory for RetryError {
    fn category(&self) -> &'static str {
        match self {
            Self::Common(e) => e.category(),
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::Parse { .. } => "parse",
        }
    }
}

/// Result type for retry configuration operations
pub type RetryResult<T> = Result<T, RetryError>;
