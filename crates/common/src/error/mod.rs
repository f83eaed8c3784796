//! Common error types shared by the retry engine and the lifecycle manager
//!
//! The error handling system is built on two pieces:
//!
//! 1. **`CommonError`**: the shared vocabulary of failures raised while
//!    loading configuration and maintaining the component registry.
//! 2. **`ErrorCategory`**: a stable, string-valued category used by
//!    [`RetryPolicy`](crate::resilience::RetryPolicy) allow-lists.
//!
//! ## Error categories
//!
//! A retry policy can be restricted to a set of error categories. Any error
//! type can take part by implementing [`ErrorCategory`]:
//!
//! ```rust
//! use foundation_common::error::ErrorCategory;
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Disconnected,
//!     BadRequest,
//! }
//!
//! impl ErrorCategory for FetchError {
//!     fn category(&self) -> &'static str {
//!         match self {
//!             Self::Disconnected => "disconnected",
//!             Self::BadRequest => "bad_request",
//!         }
//!     }
//! }
//!
//! assert_eq!(FetchError::Disconnected.category(), "disconnected");
//! ```
//!
//! | Pattern | CommonError Variant | Category |
//! |---------|--------------------|----------|
//! | **Validation** | `Validation` | `validation` |
//! | **Timeouts** | `Timeout` | `timeout` |
//! | **Serialization** | `Serialization` | `serialization` |
//! | **Persistence** | `Persistence` | `persistence` |

use std::fmt;
use std::io;
use std::time::Duration;

/// Boxed, thread-safe error used by factories, cleanups and observers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across modules
#[derive(Debug, Clone, PartialEq)]
pub enum CommonError {
    /// Validation errors
    Validation { field: String, message: String, value: Option<String> },

    /// Timeout errors, for operations run under a retry policy
    Timeout { operation: String, duration: Duration },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// File I/O errors
    Persistence { message: String, operation: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, message, value } => {
                if let Some(value) = value {
                    write!(
                        f,
                        "Validation error for field '{}' (value: '{}'): {}",
                        field, value, message
                    )
                } else {
                    write!(f, "Validation error for field '{}': {}", field, message)
                }
            }
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{}' timed out after {:?}", operation, duration)
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorCategory for CommonError {
    fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Timeout { .. } => "timeout",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
        }
    }
}

impl CommonError {
    /// Create a validation error with the invalid value
    pub fn validation_with_value<F: Into<String>, M: Into<String>, V: Into<String>>(
        field: F,
        message: M,
        value: V,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }
}

/// Stable category name of an error
///
/// Categories are matched against [`RetryPolicy`](crate::resilience::RetryPolicy)
/// allow-lists, so they should be short, lowercase and never change once
/// published.
pub trait ErrorCategory {
    /// Category name of this error
    fn category(&self) -> &'static str;
}

impl<T: ErrorCategory + ?Sized> ErrorCategory for &T {
    fn category(&self) -> &'static str {
        (**self).category()
    }
}

impl<T: ErrorCategory + ?Sized> ErrorCategory for Box<T> {
    fn category(&self) -> &'static str {
        (**self).category()
    }
}

impl ErrorCategory for io::Error {
    fn category(&self) -> &'static str {
        match self.kind() {
            io::ErrorKind::NotFound => "io::not_found",
            io::ErrorKind::PermissionDenied => "io::permission_denied",
            io::ErrorKind::ConnectionRefused => "io::connection_refused",
            io::ErrorKind::ConnectionReset => "io::connection_reset",
            io::ErrorKind::ConnectionAborted => "io::connection_aborted",
            io::ErrorKind::NotConnected => "io::not_connected",
            io::ErrorKind::BrokenPipe => "io::broken_pipe",
            io::ErrorKind::WouldBlock => "io::would_block",
            io::ErrorKind::InvalidInput => "io::invalid_input",
            io::ErrorKind::InvalidData => "io::invalid_data",
            io::ErrorKind::TimedOut => "io::timed_out",
            io::ErrorKind::Interrupted => "io::interrupted",
            io::ErrorKind::UnexpectedEof => "io::unexpected_eof",
            _ => "io",
        }
    }
}

impl From<io::Error> for CommonError {
    fn from(err: io::Error) -> Self {
        Self::Persistence { message: err.to_string(), operation: None }
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error handling functionality
    //!
    //! Tests cover display formatting, conversions and category names.

    use super::*;

    #[test]
    fn test_error_validation_display() {
        let err = CommonError::Validation {
            field: "component".to_string(),
            message: "name must not be empty".to_string(),
            value: None,
        };
        assert_eq!(
            err.to_string(),
            "Validation error for field 'component': name must not be empty"
        );

        let err = CommonError::validation_with_value("component", "already registered", "db/pg");
        assert_eq!(
            err.to_string(),
            "Validation error for field 'component' (value: 'db/pg'): already registered"
        );
    }

    #[test]
    fn test_error_timeout() {
        let err = CommonError::timeout("connect", Duration::from_secs(5));
        assert_eq!(err.to_string(), "Operation 'connect' timed out after 5s");
        assert_eq!(err.category(), "timeout");
    }

    #[test]
    fn test_error_serialization_and_persistence_display() {
        let err = CommonError::serialization_format("TOML", "expected a table");
        assert_eq!(err.to_string(), "Serialization error (TOML): expected a table");

        let err = CommonError::persistence_op("read", "permission denied");
        assert_eq!(err.to_string(), "Persistence error during 'read': permission denied");
    }

    #[test]
    fn test_common_error_categories() {
        assert_eq!(CommonError::validation_with_value("f", "m", "v").category(), "validation");
        assert_eq!(CommonError::serialization_format("TOML", "m").category(), "serialization");
        assert_eq!(CommonError::persistence_op("read", "m").category(), "persistence");
        assert_eq!(Box::new(CommonError::timeout("x", Duration::ZERO)).category(), "timeout");
    }

    #[test]
    fn test_io_error_categories() {
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let other = io::Error::other("boom");
        assert_eq!(timed_out.category(), "io::timed_out");
        assert_eq!(other.category(), "io");
        assert_eq!((&timed_out).category(), "io::timed_out");
    }

    #[test]
    fn test_io_error_conversion() {
        let err: CommonError = io::Error::new(io::ErrorKind::NotFound, "missing.toml").into();
        assert!(matches!(err, CommonError::Persistence { .. }));
    }

    #[test]
    fn test_toml_error_conversion() {
        let err: CommonError = toml::from_str::<toml::Table>("= broken").unwrap_err().into();
        assert!(matches!(
            err,
            CommonError::Serialization { format: Some(ref f), .. } if f == "TOML"
        ));
    }
}
