//! Single-attempt transaction protocol.
//!
//! [`TransactionProtocol`] drives one call through the ledger connection:
//! it resolves the caller's identity, submits the request, and waits for the
//! first event that ends the attempt. Each attempt walks a small state
//! machine:
//!
//! ```text
//! Idle ──▶ IdentityResolved ──▶ Submitted ──┬──▶ Completed
//!   │                                       ├──▶ SubmittedAck   (invoke only)
//!   └──────────────▶ Errored ◀──────────────┘
//! ```
//!
//! The first terminal event wins. Events that cannot end an attempt of the
//! given kind, such as `submitted` on a query, are logged and skipped. Once
//! the attempt ends the handle is dropped, so later events are discarded.
//!
//! Retrying is not this module's concern; see [`with_retry`](crate::retry).

use std::{fmt, sync::Arc};

use chaincode_ledger::{
    CallKind, EnrollmentId, LedgerConnection, LedgerError, RequestDescriptor, TransactionEvent,
};
use fail::fail_point;

use crate::{
    error::{ChaincodeError, Result},
    metrics::ClientMetrics,
};

/// Lifecycle of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    /// Not started.
    Idle,
    /// The caller's identity was resolved.
    IdentityResolved,
    /// The request was handed to the ledger and events are awaited.
    Submitted,
    /// The ledger finalized the call.
    Completed,
    /// The ledger accepted an invoke without finalizing it.
    SubmittedAck,
    /// The attempt failed.
    Errored,
}

impl AttemptState {
    /// Returns `true` if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::SubmittedAck | Self::Errored)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::IdentityResolved => "identity_resolved",
            Self::Submitted => "submitted",
            Self::Completed => "completed",
            Self::SubmittedAck => "submitted_ack",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine for one attempt.
#[derive(Debug)]
pub(crate) struct Attempt {
    kind: CallKind,
    state: AttemptState,
}

impl Attempt {
    pub(crate) fn new(kind: CallKind) -> Self {
        Self { kind, state: AttemptState::Idle }
    }

    pub(crate) fn state(&self) -> AttemptState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: AttemptState) {
        tracing::trace!(from = %self.state, to = %next, "attempt state transition");
        self.state = next;
    }

    /// Feeds one event into the attempt.
    ///
    /// Returns the outcome if the event ends the attempt, or `None` if the
    /// attempt is still waiting. Events after a terminal state are ignored.
    pub(crate) fn accept(
        &mut self,
        event: TransactionEvent,
    ) -> Option<std::result::Result<String, LedgerError>> {
        if self.state.is_terminal() {
            tracing::trace!(event = event.name(), state = %self.state, "event after terminal state");
            return None;
        }

        match (self.kind, event) {
            (CallKind::Invoke, TransactionEvent::Completed(payload))
            | (CallKind::Query, TransactionEvent::Complete(payload)) => {
                self.transition(AttemptState::Completed);
                Some(Ok(payload.to_string()))
            },
            (CallKind::Invoke, TransactionEvent::Submitted(ack)) => {
                self.transition(AttemptState::SubmittedAck);
                Some(Ok(ack.to_string()))
            },
            (_, TransactionEvent::Error(err)) => {
                self.transition(AttemptState::Errored);
                Some(Err(err))
            },
            (kind, event) => {
                tracing::warn!(
                    kind = %kind,
                    event = event.name(),
                    "ignoring event that cannot end this call",
                );
                None
            },
        }
    }
}

/// Drives single attempts against a shared ledger connection.
///
/// Cloning is cheap; clones share the connection and metrics.
#[derive(Clone)]
pub struct TransactionProtocol {
    connection: Arc<dyn LedgerConnection>,
    verbose: bool,
    metrics: ClientMetrics,
}

impl fmt::Debug for TransactionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionProtocol").field("verbose", &self.verbose).finish_non_exhaustive()
    }
}

impl TransactionProtocol {
    /// Creates a protocol adapter over `connection`.
    #[must_use]
    pub fn new(connection: Arc<dyn LedgerConnection>, verbose: bool, metrics: ClientMetrics) -> Self {
        Self { connection, verbose, metrics }
    }

    /// Runs one state-changing attempt.
    ///
    /// Succeeds with the `completed` payload, or with the acknowledgment
    /// payload if `submitted` arrives first.
    ///
    /// # Errors
    ///
    /// Returns the ledger's error, or [`LedgerError::HandleClosed`] if the
    /// handle closes without a terminal event.
    pub async fn submit(
        &self,
        enrollment_id: &EnrollmentId,
        request: &RequestDescriptor,
    ) -> Result<String> {
        self.attempt(CallKind::Invoke, enrollment_id, request).await
    }

    /// Runs one read-only attempt.
    ///
    /// # Errors
    ///
    /// Returns the ledger's error, or [`LedgerError::HandleClosed`] if the
    /// handle closes without a terminal event.
    pub async fn read(
        &self,
        enrollment_id: &EnrollmentId,
        request: &RequestDescriptor,
    ) -> Result<String> {
        self.attempt(CallKind::Query, enrollment_id, request).await
    }

    /// Runs one attempt of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MemberResolution`] if the caller cannot be
    /// resolved, otherwise the error the attempt ended with.
    #[tracing::instrument(
        name = "chaincode_attempt",
        skip(self, request),
        fields(function = request.function(), enrollment_id = %enrollment_id, kind = %kind),
    )]
    pub async fn attempt(
        &self,
        kind: CallKind,
        enrollment_id: &EnrollmentId,
        request: &RequestDescriptor,
    ) -> Result<String> {
        let mut attempt = Attempt::new(kind);

        fail_point!("protocol-before-submit", |_| {
            Err(ChaincodeError::from(LedgerError::transport("injected failure before submit")))
        });

        let identity = match self.connection.resolve_identity(enrollment_id).await {
            Ok(identity) => identity,
            Err(err) => {
                attempt.transition(AttemptState::Errored);
                return Err(err.into());
            },
        };
        attempt.transition(AttemptState::IdentityResolved);

        let mut handle = match kind {
            CallKind::Invoke => identity.invoke(request),
            CallKind::Query => identity.query(request),
        };
        attempt.transition(AttemptState::Submitted);
        if self.verbose {
            tracing::debug!(args = ?request.args(), "request submitted");
        }

        while let Some(event) = handle.next_event().await {
            if let Some(outcome) = attempt.accept(event) {
                if attempt.state() == AttemptState::SubmittedAck {
                    self.metrics.record_submitted_ack();
                }
                if self.verbose {
                    tracing::debug!(state = %attempt.state(), "attempt finished");
                }
                return outcome.map_err(ChaincodeError::from);
            }
        }

        attempt.transition(AttemptState::Errored);
        Err(LedgerError::HandleClosed.into())
    }
}
