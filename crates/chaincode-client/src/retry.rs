//! Retry-once wrapper for chaincode attempts.
//!
//! [`with_retry`] runs an attempt and, when it fails with a retryable error,
//! runs it again with the same request and caller. The retry is immediate;
//! there is no backoff. If every attempt fails, the error from the last
//! attempt is returned and earlier errors are logged and dropped.
//!
//! # Retry Eligibility
//!
//! Only errors where [`ChaincodeError::is_retryable`] returns `true` are
//! retried: ledger rejections, transport failures, closed handles, and
//! attempt timeouts. Member resolution failures are returned immediately.
//!
//! # Invokes
//!
//! Invokes are not idempotent. A failed invoke may still have been applied by
//! the ledger, so re-submitting it can apply it twice. This is logged at
//! `warn` on every invoke retry and can be switched off with
//! [`RetryConfig::retry_invokes`].

use std::{future::Future, time::Duration};

use chaincode_ledger::CallKind;
use fail::fail_point;

use crate::{
    config::RetryConfig,
    error::{ChaincodeError, Result},
    metrics::ClientMetrics,
};

/// Executes `operation` with the retry budget for `kind`.
///
/// Each attempt is bounded by `attempt_timeout` when one is set; a timed-out
/// attempt counts as a retryable [`ChaincodeError::Timeout`].
///
/// # Metrics
///
/// When `metrics` is provided, each retry increments the retry counter,
/// timeouts increment the timeout counter, and a budget spent without
/// success increments the exhausted counter.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the retry
/// budget is spent.
#[tracing::instrument(
    skip(config, metrics, operation),
    fields(max_retries = config.retries_for(kind), kind = %kind),
)]
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    attempt_timeout: Option<Duration>,
    metrics: Option<&ClientMetrics>,
    operation_name: &str,
    kind: CallKind,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = config.retries_for(kind);
    let mut last_error: Option<ChaincodeError> = None;

    for attempt in 0..=max_retries {
        let result = match attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    if let Some(m) = metrics {
                        m.record_timeout();
                    }
                    Err(ChaincodeError::timeout(limit))
                },
            },
            None => operation().await,
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "operation succeeded after retry",
                    );
                }
                return Ok(value);
            },
            Err(err) if err.is_retryable() && attempt < max_retries => {
                if let Some(m) = metrics {
                    m.record_retry();
                }
                match kind {
                    CallKind::Invoke => tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        error = %err,
                        "invoke failed, re-submitting; the ledger may apply it twice",
                    ),
                    CallKind::Query => tracing::warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        error = %err,
                        "query failed, retrying",
                    ),
                }
                fail_point!("chaincode-before-retry", |_| {
                    Err(ChaincodeError::internal("injected failure before retry"))
                });
                last_error = Some(err);
            },
            Err(err) => {
                // Non-retryable error on any attempt, or retryable on the last one
                if attempt > 0
                    && err.is_retryable()
                    && let Some(m) = metrics
                {
                    m.record_retry_exhausted();
                }
                return Err(err);
            },
        }
    }

    if let Some(m) = metrics {
        m.record_retry_exhausted();
    }
    Err(last_error
        .unwrap_or_else(|| ChaincodeError::internal("retry loop completed without result or error")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chaincode_ledger::LedgerError;

    use super::*;

    fn rejected() -> ChaincodeError {
        ChaincodeError::from(LedgerError::rejected("endorsement failed"))
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let config = RetryConfig::default();
        let call_count = AtomicU32::new(0);

        let result = with_retry(&config, None, None, "queryMSISDN", CallKind::Query, || {
            call_count.fetch_add(1, Ordering::Relaxed);
            async { Ok::<_, ChaincodeError>(42) }
        })
        .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(call_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failure() {
        let config = RetryConfig::default();
        let call_count = AtomicU32::new(0);

        let result = with_retry(&config, None, None, "CallOut", CallKind::Invoke, || {
            let attempt = call_count.fetch_add(1, Ordering::Relaxed);
            async move { if attempt == 0 { Err(rejected()) } else { Ok("second") } }
        })
        .await;

        assert_eq!(result.ok(), Some("second"));
        assert_eq!(call_count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausted_returns_second_error() {
        let config = RetryConfig::default();
        let call_count = AtomicU32::new(0);

        let result: Result<()> =
            with_retry(&config, None, None, "queryMSISDN", CallKind::Query, || {
                let attempt = call_count.fetch_add(1, Ordering::Relaxed);
                async move {
                    if attempt == 0 {
                        Err(ChaincodeError::from(LedgerError::transport("first")))
                    } else {
                        Err(ChaincodeError::from(LedgerError::transport("second")))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "transport error: second");
        assert_eq!(call_count.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_member_resolution_not_retried() {
        let config = RetryConfig::default();
        let call_count = AtomicU32::new(0);

        let result: Result<()> =
            with_retry(&config, None, None, "authentication", CallKind::Invoke, || {
                call_count.fetch_add(1, Ordering::Relaxed);
                async { Err(LedgerError::member_resolution("ghost", "unknown").into()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ChaincodeError::Ledger(LedgerError::MemberResolution { .. }))
        ));
        assert_eq!(call_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_invokes_not_retried_when_disabled() {
        let config = RetryConfig::builder().retry_invokes(false).build().unwrap();
        let call_count = AtomicU32::new(0);

        let result: Result<()> =
            with_retry(&config, None, None, "CallPay", CallKind::Invoke, || {
                call_count.fetch_add(1, Ordering::Relaxed);
                async { Err(rejected()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled_with_zero_max_retries() {
        let config = RetryConfig::builder().max_retries(0).build().unwrap();
        let call_count = AtomicU32::new(0);

        let result: Result<()> =
            with_retry(&config, None, None, "queryMSISDN", CallKind::Query, || {
                call_count.fetch_add(1, Ordering::Relaxed);
                async { Err(rejected()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retried() {
        let config = RetryConfig::default();
        let metrics = ClientMetrics::new();
        let call_count = AtomicU32::new(0);

        let result = with_retry(
            &config,
            Some(Duration::from_secs(5)),
            Some(&metrics),
            "getBlockchainRecord",
            CallKind::Query,
            || {
                let attempt = call_count.fetch_add(1, Ordering::Relaxed);
                async move {
                    if attempt == 0 {
                        std::future::pending::<()>().await;
                    }
                    Ok::<_, ChaincodeError>("record")
                }
            },
        )
        .await;

        assert_eq!(result.ok(), Some("record"));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.retries_exhausted, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_exhausted() {
        let config = RetryConfig::default();
        let metrics = ClientMetrics::new();

        let result: Result<()> = with_retry(
            &config,
            Some(Duration::from_millis(250)),
            Some(&metrics),
            "CallEnd",
            CallKind::Invoke,
            || std::future::pending(),
        )
        .await;

        assert!(matches!(
            result,
            Err(ChaincodeError::Timeout { elapsed }) if elapsed == Duration::from_millis(250)
        ));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.timeouts, 2);
        assert_eq!(snapshot.retries_exhausted, 1);
    }

    #[tokio::test]
    async fn test_retry_records_metrics() {
        let config = RetryConfig::default();
        let metrics = ClientMetrics::new();

        let _: Result<()> =
            with_retry(&config, None, Some(&metrics), "Overage", CallKind::Invoke, || async {
                Err(rejected())
            })
            .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.retries_exhausted, 1);
    }

    #[tokio::test]
    async fn test_non_retryable_after_retry_not_counted_as_exhausted() {
        let config = RetryConfig::default();
        let metrics = ClientMetrics::new();
        let call_count = AtomicU32::new(0);

        let result: Result<()> =
            with_retry(&config, None, Some(&metrics), "CallOut", CallKind::Invoke, || {
                let attempt = call_count.fetch_add(1, Ordering::Relaxed);
                async move {
                    if attempt == 0 {
                        Err(rejected())
                    } else {
                        Err(LedgerError::member_resolution("user", "revoked").into())
                    }
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(ChaincodeError::Ledger(LedgerError::MemberResolution { .. }))
        ));
        assert_eq!(metrics.snapshot().retries_exhausted, 0);
    }
}
