//! Ledger error types and result alias.
//!
//! Ledger connections map their transport and SDK failures to these
//! variants so the client can decide which failures are worth a retry.
//!
//! # Error Types
//!
//! - [`LedgerError::MemberResolution`] - The enrollment ID could not be resolved to an identity
//! - [`LedgerError::Rejected`] - The ledger rejected or failed the transaction
//! - [`LedgerError::Transport`] - The request never reached a ledger peer
//! - [`LedgerError::HandleClosed`] - The transaction handle ended without a terminal event
//!
//! # Example
//!
//! ```
//! use chaincode_ledger::{LedgerError, LedgerResult};
//!
//! fn lookup(enrollment_id: &str) -> LedgerResult<()> {
//!     Err(LedgerError::member_resolution(enrollment_id, "not registered"))
//! }
//!
//! assert!(!lookup("ghost").unwrap_err().is_retryable());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A shared error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while talking to the ledger.
///
/// Errors preserve their source chain via the `#[source]` attribute. The
/// source is reference-counted so errors can be cloned into scripted
/// responses and test assertions.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// The enrollment ID could not be resolved to a member identity.
    ///
    /// Resolving the same ID again yields the same answer, so this error
    /// is never retried.
    #[error("failed to get member {enrollment_id}: {message}")]
    MemberResolution {
        /// The enrollment ID that failed to resolve.
        enrollment_id: String,
        /// Description of the failure.
        message: String,
    },

    /// The ledger rejected or failed the transaction.
    #[error("transaction failed: {message}")]
    Rejected {
        /// Description of the failure reported by the ledger.
        message: String,
        /// The underlying error reported by the connection.
        #[source]
        source: Option<BoxError>,
    },

    /// The request could not be delivered to the ledger.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying error reported by the connection.
        #[source]
        source: Option<BoxError>,
    },

    /// The transaction handle was dropped by the connection before it
    /// delivered a terminal event.
    #[error("transaction handle closed before a terminal event")]
    HandleClosed,
}

impl LedgerError {
    /// Creates a new `MemberResolution` error.
    #[must_use]
    pub fn member_resolution(enrollment_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MemberResolution { enrollment_id: enrollment_id.into(), message: message.into() }
    }

    /// Creates a new `Rejected` error with the given message.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected { message: message.into(), source: None }
    }

    /// Creates a new `Rejected` error with a message and source error.
    #[must_use]
    pub fn rejected_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Rejected { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Transport` error with the given message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Creates a new `Transport` error with a message and source error.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if a fresh attempt with the same request could succeed.
    ///
    /// Member resolution failures are deterministic for a given enrollment
    /// ID. Every transaction-level failure is considered retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MemberResolution { .. })
    }
}
