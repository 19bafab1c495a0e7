//! In-memory ledger connection.
//!
//! This module provides [`MemoryLedger`], a scriptable implementation of
//! [`LedgerConnection`] suitable for testing and development.
//!
//! # Features
//!
//! - **Member registry**: only registered enrollment IDs resolve
//! - **Scripted outcomes**: per-function queues of [`Behavior`]s, consumed one per call
//! - **Call log**: every submitted request is recorded with its caller and kind
//! - **Concurrency probe**: tracks how many transactions are in flight and the high-water mark
//! - **Latency**: optional delay before identity resolution and before each event
//!
//! # Example
//!
//! ```
//! use chaincode_ledger::{Behavior, EnrollmentId, LedgerConnection, MemoryLedger, RequestDescriptor};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let ledger = MemoryLedger::new();
//! ledger.register_member("admin");
//! ledger.script("queryMSISDN", [Behavior::complete("14691234567")]);
//!
//! let identity = ledger.resolve_identity(&EnrollmentId::from("admin")).await.unwrap();
//! let mut handle = identity.query(&RequestDescriptor::new("cc", "queryMSISDN", ["rs1"]));
//!
//! let event = handle.next_event().await.unwrap();
//! assert_eq!(event.name(), "complete");
//! assert_eq!(ledger.call_count("queryMSISDN"), 1);
//! # });
//! ```
//!
//! # Limitations
//!
//! - No ledger state: results come from scripts, or echo the request by default
//! - Events are emitted from spawned tasks, so a Tokio runtime must be running

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::{
    connection::{Identity, LedgerConnection},
    error::{LedgerError, LedgerResult},
    event::{TransactionEmitter, TransactionHandle},
    types::{CallKind, EnrollmentId, Payload, RequestDescriptor},
};

/// How the in-memory ledger answers one submitted transaction.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Emit `completed` for an invoke or `complete` for a query.
    Complete(Payload),
    /// Emit `submitted` only; the transaction is never finalized.
    Submitted(Payload),
    /// Emit `submitted` followed by `completed`.
    SubmittedThenCompleted {
        /// Acknowledgment payload sent with `submitted`.
        ack: Payload,
        /// Final payload sent with `completed`.
        result: Payload,
    },
    /// Emit `error`.
    Fail(LedgerError),
    /// Never emit anything. The emitter is parked until
    /// [`MemoryLedger::release_parked`] is called.
    Hang,
    /// Drop the emitter without emitting.
    Close,
}

impl Behavior {
    /// Succeeds with the given payload.
    pub fn complete(payload: impl Into<Payload>) -> Self {
        Self::Complete(payload.into())
    }

    /// Acknowledges submission with the given payload.
    pub fn submitted(payload: impl Into<Payload>) -> Self {
        Self::Submitted(payload.into())
    }

    /// Fails with [`LedgerError::Rejected`].
    pub fn reject(message: impl Into<String>) -> Self {
        Self::Fail(LedgerError::rejected(message))
    }
}

/// One request observed by the in-memory ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The member the request was submitted as.
    pub enrollment_id: EnrollmentId,
    /// Invoke or query.
    pub kind: CallKind,
    /// The submitted request.
    pub request: RequestDescriptor,
}

#[derive(Debug, Default)]
struct State {
    members: HashSet<EnrollmentId>,
    scripts: HashMap<String, VecDeque<Behavior>>,
    default_behavior: Option<Behavior>,
    calls: Vec<RecordedCall>,
    resolutions: u64,
    in_flight: usize,
    max_in_flight: usize,
    parked: Vec<(CallKind, TransactionEmitter)>,
}

impl State {
    fn next_behavior(&mut self, request: &RequestDescriptor) -> Behavior {
        if let Some(behavior) = self.scripts.get_mut(request.function()).and_then(VecDeque::pop_front)
        {
            return behavior;
        }

        self.default_behavior.clone().unwrap_or_else(|| {
            Behavior::Complete(Payload::Json(json!({
                "function": request.function(),
                "args": request.args(),
            })))
        })
    }

    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Scriptable in-memory [`LedgerConnection`].
///
/// # Cloning
///
/// `MemoryLedger` is cheaply cloneable via [`Arc`]. All clones share the
/// same members, scripts, and call log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl MemoryLedger {
    /// Creates an empty ledger with no members and no latency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the same ledger that delays identity resolution
    /// and every event by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Registers a member so its enrollment ID resolves.
    pub fn register_member(&self, enrollment_id: impl Into<EnrollmentId>) {
        self.state.lock().members.insert(enrollment_id.into());
    }

    /// Appends behaviors for the next calls to `function`.
    ///
    /// Each call consumes one behavior. Once the script is exhausted, calls
    /// fall back to the default behavior.
    pub fn script(&self, function: &str, behaviors: impl IntoIterator<Item = Behavior>) {
        self.state.lock().scripts.entry(function.to_owned()).or_default().extend(behaviors);
    }

    /// Sets the behavior used when no script entry is pending.
    ///
    /// Without a default, calls complete with a JSON echo of the request.
    pub fn set_default(&self, behavior: Behavior) {
        self.state.lock().default_behavior = Some(behavior);
    }

    /// Returns every recorded call in submission order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the number of recorded calls to `function`.
    #[must_use]
    pub fn call_count(&self, function: &str) -> usize {
        self.state.lock().calls.iter().filter(|call| call.request.function() == function).count()
    }

    /// Returns the number of identity resolutions attempted.
    #[must_use]
    pub fn resolution_count(&self) -> u64 {
        self.state.lock().resolutions
    }

    /// Returns the number of transactions submitted but not yet answered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Returns the largest number of transactions ever in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// Completes every transaction parked by [`Behavior::Hang`] with `payload`.
    ///
    /// Returns the number of transactions released.
    pub fn release_parked(&self, payload: impl Into<Payload>) -> usize {
        let payload = payload.into();
        let parked = {
            let mut state = self.state.lock();
            let parked = std::mem::take(&mut state.parked);
            state.in_flight = state.in_flight.saturating_sub(parked.len());
            parked
        };

        for (kind, emitter) in &parked {
            emit_success(*kind, emitter, payload.clone());
        }
        parked.len()
    }
}

#[async_trait]
impl LedgerConnection for MemoryLedger {
    #[tracing::instrument(skip(self), fields(enrollment_id = %enrollment_id))]
    async fn resolve_identity(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> LedgerResult<Arc<dyn Identity>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock();
        state.resolutions += 1;
        if !state.members.contains(enrollment_id) {
            return Err(LedgerError::member_resolution(
                enrollment_id.as_str(),
                "member is not registered",
            ));
        }

        Ok(Arc::new(MemoryIdentity {
            enrollment_id: enrollment_id.clone(),
            state: Arc::clone(&self.state),
            latency: self.latency,
        }))
    }
}

/// Identity handed out by [`MemoryLedger`].
struct MemoryIdentity {
    enrollment_id: EnrollmentId,
    state: Arc<Mutex<State>>,
    latency: Duration,
}

impl MemoryIdentity {
    fn dispatch(&self, kind: CallKind, request: &RequestDescriptor) -> TransactionHandle {
        let (emitter, handle) = TransactionHandle::channel();
        let behavior = {
            let mut state = self.state.lock();
            state.calls.push(RecordedCall {
                enrollment_id: self.enrollment_id.clone(),
                kind,
                request: request.clone(),
            });
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.next_behavior(request)
        };
        tracing::trace!(
            function = request.function(),
            kind = %kind,
            behavior = ?behavior,
            "memory ledger dispatch",
        );

        let state = Arc::clone(&self.state);
        let latency = self.latency;
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            play(&state, kind, behavior, emitter);
        });

        handle
    }
}

impl Identity for MemoryIdentity {
    fn enrollment_id(&self) -> &EnrollmentId {
        &self.enrollment_id
    }

    fn invoke(&self, request: &RequestDescriptor) -> TransactionHandle {
        self.dispatch(CallKind::Invoke, request)
    }

    fn query(&self, request: &RequestDescriptor) -> TransactionHandle {
        self.dispatch(CallKind::Query, request)
    }
}

/// Plays one behavior against an emitter.
///
/// The in-flight count is released before the terminal event is emitted so
/// that a consumer reacting to the event never observes its own transaction
/// as still in flight.
fn play(state: &Mutex<State>, kind: CallKind, behavior: Behavior, emitter: TransactionEmitter) {
    match behavior {
        Behavior::Hang => {
            state.lock().parked.push((kind, emitter));
        },
        Behavior::Close => {
            state.lock().finish();
            drop(emitter);
        },
        Behavior::Complete(payload) => {
            state.lock().finish();
            emit_success(kind, &emitter, payload);
        },
        Behavior::Submitted(ack) => {
            state.lock().finish();
            emitter.submitted(ack);
        },
        Behavior::SubmittedThenCompleted { ack, result } => {
            state.lock().finish();
            emitter.submitted(ack);
            emitter.completed(result);
        },
        Behavior::Fail(error) => {
            state.lock().finish();
            emitter.error(error);
        },
    }
}

fn emit_success(kind: CallKind, emitter: &TransactionEmitter, payload: Payload) {
    match kind {
        CallKind::Invoke => emitter.completed(payload),
        CallKind::Query => emitter.complete(payload),
    };
}
