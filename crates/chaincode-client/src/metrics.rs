//! Client metrics collection.
//!
//! [`ClientMetrics`] counts operations and their outcomes for one
//! [`ChaincodeClient`](crate::ChaincodeClient). The retry wrapper records
//! retries and exhausted budgets; the protocol adapter records submitted-only
//! acknowledgments; the client records operation outcomes and latency.
//!
//! All counters are independent and use `Ordering::Relaxed`. A snapshot may
//! observe counters slightly out of step with one another.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use chaincode_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new();
//! metrics.record_success(Duration::from_millis(4));
//! metrics.record_retry();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.operations, 1);
//! assert_eq!(snapshot.retries, 1);
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Operations that finished, successfully or not.
    pub operations: u64,
    /// Operations that returned a result.
    pub successes: u64,
    /// Operations that returned an error.
    pub failures: u64,
    /// Extra attempts made after a failed first attempt.
    pub retries: u64,
    /// Operations whose retry budget was spent without success.
    pub retries_exhausted: u64,
    /// Invokes that succeeded on a submission acknowledgment rather than
    /// finalization.
    pub submitted_acks: u64,
    /// Attempts cut short by the attempt timeout.
    pub timeouts: u64,
    /// Cumulative operation latency in microseconds, queue wait excluded.
    pub operation_latency_us: u64,
}

impl MetricsSnapshot {
    /// Returns the fraction of finished operations that failed.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.failures as f64 / self.operations as f64
        }
    }

    /// Returns the mean operation latency in microseconds.
    #[must_use]
    pub fn avg_operation_latency_us(&self) -> f64 {
        if self.operations == 0 {
            0.0
        } else {
            self.operation_latency_us as f64 / self.operations as f64
        }
    }
}

/// Shared operation counters for a client.
///
/// Cloning is cheap; clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct ClientMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    operations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    retries_exhausted: AtomicU64,
    submitted_acks: AtomicU64,
    timeouts: AtomicU64,
    operation_latency_us: AtomicU64,
}

impl ClientMetrics {
    /// Creates a new metrics collector with every counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an operation that returned a result.
    pub fn record_success(&self, duration: Duration) {
        self.record_operation(duration);
        self.inner.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an operation that returned an error.
    pub fn record_failure(&self, duration: Duration) {
        self.record_operation(duration);
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_operation(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.inner.operations.fetch_add(1, Ordering::Relaxed);
        self.inner.operation_latency_us.fetch_add(us, Ordering::Relaxed);
    }

    /// Records a retry attempt.
    pub fn record_retry(&self) {
        self.inner.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a retry budget spent without success.
    pub fn record_retry_exhausted(&self) {
        self.inner.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an invoke completed by a submission acknowledgment.
    pub fn record_submitted_ack(&self) {
        self.inner.submitted_acks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an attempt that hit the attempt timeout.
    pub fn record_timeout(&self) {
        self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.inner.operations.load(Ordering::Relaxed),
            successes: self.inner.successes.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            retries: self.inner.retries.load(Ordering::Relaxed),
            retries_exhausted: self.inner.retries_exhausted.load(Ordering::Relaxed),
            submitted_acks: self.inner.submitted_acks.load(Ordering::Relaxed),
            timeouts: self.inner.timeouts.load(Ordering::Relaxed),
            operation_latency_us: self.inner.operation_latency_us.load(Ordering::Relaxed),
        }
    }
}
