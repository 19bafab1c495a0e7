//! Single-concurrency FIFO operation queue.
//!
//! Every [`ChaincodeClient`](crate::ChaincodeClient) owns one
//! [`OperationQueue`]. A dedicated worker task drains the queue and awaits
//! each task to completion before it receives the next, so at most one
//! operation runs against the ledger connection at a time and operations
//! finish in the order they were enqueued.
//!
//! ```text
//! enqueue ──▶ unbounded channel ──▶ worker ──▶ task().await ──▶ next task
//! ```
//!
//! There is no cancellation and no deadline at this level. A task that never
//! completes stalls every later task; bound attempts with
//! [`ClientConfig::attempt_timeout`](crate::ClientConfig::attempt_timeout)
//! instead. A task that panics releases its slot like one that returns, and
//! the tasks queued behind it still run.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use tokio::sync::{mpsc, oneshot};

use crate::error::{ChaincodeError, Result};

/// A unit of work held by the queue until the worker runs it.
///
/// The returned future completing is the completion signal.
pub type QueuedTask = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

#[derive(Debug, Default)]
struct QueueGauges {
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    completed: AtomicU64,
}

/// Handle to a running operation queue.
///
/// Cloning is cheap; clones feed the same worker. The worker exits once
/// every handle is dropped and the remaining tasks have run.
#[derive(Clone)]
pub struct OperationQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    gauges: Arc<QueueGauges>,
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field("pending", &self.pending())
            .field("in_flight", &self.in_flight())
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}

impl OperationQueue {
    /// Starts a queue worker on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Internal`] when called outside a Tokio
    /// runtime.
    pub fn start() -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| ChaincodeError::internal(format!("no tokio runtime: {err}")))?;

        let (sender, tasks) = mpsc::unbounded_channel();
        let gauges = Arc::new(QueueGauges::default());
        runtime.spawn(run_worker(tasks, Arc::clone(&gauges)));

        Ok(Self { sender, gauges })
    }

    /// Appends a task and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::QueueClosed`] if the worker has stopped.
    pub fn enqueue<F, Fut>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task: QueuedTask = Box::new(move || Box::pin(task()));

        self.gauges.pending.fetch_add(1, Ordering::Relaxed);
        if self.sender.send(task).is_err() {
            self.gauges.pending.fetch_sub(1, Ordering::Relaxed);
            return Err(ChaincodeError::QueueClosed);
        }
        Ok(())
    }

    /// Appends a task whose output is delivered through the returned receiver.
    ///
    /// Dropping the receiver does not cancel the task; its output is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::QueueClosed`] if the worker has stopped.
    pub fn submit<F, Fut, T>(&self, task: F) -> Result<oneshot::Receiver<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        self.enqueue(move || async move {
            let _ = reply.send(task().await);
        })?;
        Ok(receiver)
    }

    /// Returns the number of tasks waiting behind the running one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.gauges.pending.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks currently running (0 or 1).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.gauges.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks that have run to completion.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.gauges.completed.load(Ordering::Relaxed)
    }

    /// Returns `true` if the worker has stopped accepting tasks.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn run_worker(mut tasks: mpsc::UnboundedReceiver<QueuedTask>, gauges: Arc<QueueGauges>) {
    tracing::debug!("operation queue worker started");
    while let Some(task) = tasks.recv().await {
        gauges.pending.fetch_sub(1, Ordering::Relaxed);
        gauges.in_flight.fetch_add(1, Ordering::Relaxed);

        // Each task runs on its own Tokio task so a panic stays contained.
        if let Err(err) = tokio::spawn(task()).await {
            tracing::error!(error = %err, "queued task panicked");
        }

        gauges.in_flight.fetch_sub(1, Ordering::Relaxed);
        gauges.completed.fetch_add(1, Ordering::Relaxed);
    }
    tracing::debug!("operation queue worker exiting");
}
