//! Transaction handles and the events they deliver.
//!
//! Submitting a [`RequestDescriptor`](crate::RequestDescriptor) through an
//! [`Identity`](crate::Identity) returns a [`TransactionHandle`]. The
//! connection reports progress by emitting [`TransactionEvent`]s through the
//! paired [`TransactionEmitter`]; the consumer reads them in order with
//! [`TransactionHandle::next_event`].
//!
//! ```text
//! connection ──emit──▶ TransactionEmitter ══ unbounded channel ══▶ TransactionHandle ──▶ client
//! ```
//!
//! Dropping the handle discards any events that arrive later. Dropping every
//! emitter without a terminal event closes the handle, which the consumer
//! observes as `None` from [`next_event`](TransactionHandle::next_event).

use tokio::sync::mpsc;

use crate::{error::LedgerError, types::Payload};

/// An asynchronous notification about a submitted transaction.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    /// An invoke was finalized by the network.
    Completed(Payload),
    /// An invoke was accepted by the network but is not yet finalized.
    Submitted(Payload),
    /// A query returned a value.
    Complete(Payload),
    /// The transaction failed.
    Error(LedgerError),
}

impl TransactionEvent {
    /// Returns the event name as reported by ledger connections.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Submitted(_) => "submitted",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }
}

/// Consumer side of a submitted transaction.
pub struct TransactionHandle {
    events: mpsc::UnboundedReceiver<TransactionEvent>,
}

impl std::fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionHandle").finish_non_exhaustive()
    }
}

impl TransactionHandle {
    /// Creates a connected emitter and handle pair.
    #[must_use]
    pub fn channel() -> (TransactionEmitter, TransactionHandle) {
        let (sender, events) = mpsc::unbounded_channel();
        (TransactionEmitter { events: sender }, TransactionHandle { events })
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once every emitter has been dropped and all buffered
    /// events have been read.
    pub async fn next_event(&mut self) -> Option<TransactionEvent> {
        self.events.recv().await
    }
}

/// Producer side of a submitted transaction, held by the ledger connection.
#[derive(Debug, Clone)]
pub struct TransactionEmitter {
    events: mpsc::UnboundedSender<TransactionEvent>,
}

impl TransactionEmitter {
    /// Emits an event to the handle.
    ///
    /// Returns `false` if the handle has already been dropped. Emission is
    /// best-effort: a consumer that stopped listening after its first
    /// terminal event is not an error.
    pub fn emit(&self, event: TransactionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Emits [`TransactionEvent::Completed`].
    pub fn completed(&self, payload: impl Into<Payload>) -> bool {
        self.emit(TransactionEvent::Completed(payload.into()))
    }

    /// Emits [`TransactionEvent::Submitted`].
    pub fn submitted(&self, payload: impl Into<Payload>) -> bool {
        self.emit(TransactionEvent::Submitted(payload.into()))
    }

    /// Emits [`TransactionEvent::Complete`].
    pub fn complete(&self, payload: impl Into<Payload>) -> bool {
        self.emit(TransactionEvent::Complete(payload.into()))
    }

    /// Emits [`TransactionEvent::Error`].
    pub fn error(&self, error: LedgerError) -> bool {
        self.emit(TransactionEvent::Error(error))
    }

    /// Returns `true` if the handle has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let (emitter, mut handle) = TransactionHandle::channel();
        assert!(emitter.submitted("tx-1"));
        assert!(emitter.completed("done"));

        assert_eq!(handle.next_event().await.unwrap().name(), "submitted");
        assert_eq!(handle.next_event().await.unwrap().name(), "completed");
    }

    #[tokio::test]
    async fn test_dropping_emitter_closes_handle() {
        let (emitter, mut handle) = TransactionHandle::channel();
        emitter.complete("value");
        drop(emitter);

        match handle.next_event().await {
            Some(TransactionEvent::Complete(payload)) => assert_eq!(payload.to_string(), "value"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(handle.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_emit_after_handle_dropped_reports_false() {
        let (emitter, handle) = TransactionHandle::channel();
        drop(handle);

        assert!(emitter.is_closed());
        assert!(!emitter.error(LedgerError::rejected("late")));
    }
}
