//! Error types for the chaincode client.
//!
//! [`ChaincodeError`] is what callers receive. It wraps the
//! [`LedgerError`] of the failing attempt and adds the failures that
//! originate in the client itself: argument validation, attempt
//! timeouts, and a stopped operation queue.

use std::time::Duration;

use chaincode_ledger::LedgerError;
use thiserror::Error;

/// Result type alias for chaincode client operations.
pub type Result<T> = std::result::Result<T, ChaincodeError>;

/// Errors surfaced to chaincode client callers.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ChaincodeError {
    /// The ledger connection reported a failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The argument list is shorter than the operation's arity.
    #[error("{operation} expects at least {expected} argument(s), got {actual}")]
    InvalidArguments {
        /// The chaincode function name.
        operation: &'static str,
        /// Number of positional arguments the function reads.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },

    /// A single attempt exceeded the configured attempt timeout.
    #[error("attempt timed out after {}ms", elapsed.as_millis())]
    Timeout {
        /// The configured limit that was exceeded.
        elapsed: Duration,
    },

    /// The operation queue worker has stopped.
    #[error("operation queue is closed")]
    QueueClosed,

    /// The client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl ChaincodeError {
    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns `true` if the retry wrapper should spend its extra attempt on
    /// this failure.
    ///
    /// Ledger transaction failures and attempt timeouts are retried. Member
    /// resolution failures, argument errors, and client-side failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_retryable(),
            Self::Timeout { .. } => true,
            Self::InvalidArguments { .. }
            | Self::QueueClosed
            | Self::Config(_)
            | Self::Internal { .. } => false,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// The offending field.
        field: &'static str,
    },

    /// A field exceeded its maximum.
    #[error("{field} must be at most {max}, got {value}")]
    AboveMaximum {
        /// The offending field.
        field: &'static str,
        /// The maximum allowed value.
        max: String,
        /// The supplied value.
        value: String,
    },

    /// A duration field was zero.
    #[error("{field} must be positive, got {value}")]
    MustBePositive {
        /// The offending field.
        field: &'static str,
        /// The supplied value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChaincodeError::InvalidArguments { operation: "CallOut", expected: 2, actual: 1 };
        assert_eq!(err.to_string(), "CallOut expects at least 2 argument(s), got 1");

        assert_eq!(
            ChaincodeError::timeout(Duration::from_millis(1500)).to_string(),
            "attempt timed out after 1500ms"
        );
        assert_eq!(ChaincodeError::QueueClosed.to_string(), "operation queue is closed");
    }

    #[test]
    fn test_ledger_error_is_transparent() {
        let err = ChaincodeError::from(LedgerError::rejected("endorsement failed"));
        assert_eq!(err.to_string(), "transaction failed: endorsement failed");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChaincodeError::from(LedgerError::rejected("r")).is_retryable());
        assert!(ChaincodeError::from(LedgerError::HandleClosed).is_retryable());
        assert!(ChaincodeError::timeout(Duration::from_secs(1)).is_retryable());

        assert!(!ChaincodeError::from(LedgerError::member_resolution("u", "m")).is_retryable());
        assert!(
            !ChaincodeError::InvalidArguments { operation: "x", expected: 1, actual: 0 }
                .is_retryable()
        );
        assert!(!ChaincodeError::QueueClosed.is_retryable());
        assert!(!ChaincodeError::internal("bug").is_retryable());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::AboveMaximum { field: "max_retries", max: "1".into(), value: "3".into() };
        assert_eq!(err.to_string(), "max_retries must be at most 1, got 3");

        let err = ChaincodeError::from(ConfigError::Empty { field: "chaincode_id" });
        assert_eq!(err.to_string(), "configuration error: chaincode_id must not be empty");
    }
}
