//! Ledger connection traits.
//!
//! This module defines the inbound interface the chaincode client consumes:
//! a [`LedgerConnection`] resolves enrollment IDs to member [`Identity`]
//! values, and an identity submits requests and hands back
//! [`TransactionHandle`]s.
//!
//! Consensus, endorsement, signing, and transport live behind these traits.
//! The client treats the connection as an opaque, shared, read-only handle.
//!
//! # Implementing a Connection
//!
//! 1. Implement [`LedgerConnection::resolve_identity`], mapping lookup failures to
//!    [`LedgerError::MemberResolution`](crate::LedgerError::MemberResolution)
//! 2. Implement [`Identity`] for the resolved member type
//! 3. Emit exactly one terminal event per handle through its
//!    [`TransactionEmitter`](crate::TransactionEmitter)
//!
//! See [`MemoryLedger`](crate::MemoryLedger) for a reference implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::LedgerResult,
    event::TransactionHandle,
    types::{EnrollmentId, RequestDescriptor},
};

/// Connection to a ledger network.
///
/// Connections must be `Send + Sync`; one connection is shared by every
/// operation of a client and is never mutated through this trait.
///
/// # Example
///
/// ```
/// use chaincode_ledger::{EnrollmentId, LedgerConnection, MemoryLedger};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let ledger = MemoryLedger::new();
/// ledger.register_member("admin");
///
/// let identity = ledger.resolve_identity(&EnrollmentId::from("admin")).await.unwrap();
/// assert_eq!(identity.enrollment_id().as_str(), "admin");
/// # });
/// ```
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    /// Resolves an enrollment ID to a member identity.
    ///
    /// The returned identity is borrowed for one attempt; callers must not
    /// cache it across operations.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MemberResolution`](crate::LedgerError::MemberResolution)
    /// if the member is unknown or its credentials cannot be loaded.
    async fn resolve_identity(&self, enrollment_id: &EnrollmentId)
    -> LedgerResult<Arc<dyn Identity>>;
}

/// A resolved member credential able to submit requests.
pub trait Identity: Send + Sync {
    /// Returns the enrollment ID this identity was resolved from.
    fn enrollment_id(&self) -> &EnrollmentId;

    /// Submits a state-changing request.
    ///
    /// The handle delivers `completed`, `submitted`, or `error`.
    fn invoke(&self, request: &RequestDescriptor) -> TransactionHandle;

    /// Submits a read-only request.
    ///
    /// The handle delivers `complete` or `error`.
    fn query(&self, request: &RequestDescriptor) -> TransactionHandle;
}
