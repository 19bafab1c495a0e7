//! The chaincode client facade.
//!
//! [`ChaincodeClient`] ties the pieces together. A call is validated against
//! the [`ContractOperation`] table, queued on the client's
//! [`OperationQueue`], and run through [`with_retry`] around a single
//! [`TransactionProtocol`] attempt once every earlier call has finished.
//!
//! ```text
//! call ──▶ validate ──▶ OperationQueue ──▶ with_retry ──▶ TransactionProtocol ──▶ ledger
//!                                              ▲                   │
//!                                              └──── retry once ◀──┘
//! ```

use std::{sync::Arc, time::Instant};

use chaincode_ledger::{CallKind, EnrollmentId, LedgerConnection, RequestDescriptor};
use parking_lot::Mutex;

use crate::{
    config::ClientConfig,
    error::{ChaincodeError, Result},
    metrics::ClientMetrics,
    operations::ContractOperation,
    protocol::TransactionProtocol,
    queue::OperationQueue,
    retry::with_retry,
};

/// Serialized, retrying client for one chaincode.
///
/// Every call made through a client instance runs to completion before the
/// next one starts, in the order the calls were made. Distinct client
/// instances are independent, even over the same connection.
///
/// Cloning is cheap; clones share the queue, so calls made through any clone
/// are serialized together.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use chaincode_client::{ChaincodeClient, ClientConfig};
/// use chaincode_ledger::{Behavior, MemoryLedger};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = MemoryLedger::new();
/// ledger.register_member("user_type1_0");
/// ledger.script("queryMSISDN", [Behavior::complete("14691234567")]);
///
/// let config = ClientConfig::builder().chaincode_id("roaming-cc").build()?;
/// let client = ChaincodeClient::new(Arc::new(ledger), config)?;
///
/// let msisdn = client.query_msisdn("user_type1_0", ["rs1"]).await?;
/// assert_eq!(msisdn, "14691234567");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChaincodeClient {
    runner: OperationRunner,
    queue: OperationQueue,
}

/// Everything a queued operation needs, detached from the client handle.
#[derive(Debug, Clone)]
struct OperationRunner {
    config: Arc<ClientConfig>,
    protocol: TransactionProtocol,
    metrics: ClientMetrics,
}

impl OperationRunner {
    async fn run(
        self,
        kind: CallKind,
        caller: EnrollmentId,
        request: RequestDescriptor,
    ) -> Result<String> {
        let verbose = self.config.verbose();
        let started = Instant::now();
        if verbose {
            tracing::debug!(
                function = request.function(),
                enrollment_id = %caller,
                kind = %kind,
                "operation started",
            );
        }

        let result = with_retry(
            self.config.retry(),
            self.config.attempt_timeout(),
            Some(&self.metrics),
            request.function(),
            kind,
            || self.protocol.attempt(kind, &caller, &request),
        )
        .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                self.metrics.record_success(elapsed);
                if verbose {
                    tracing::debug!(
                        function = request.function(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "operation succeeded",
                    );
                }
            },
            Err(err) => {
                self.metrics.record_failure(elapsed);
                tracing::error!(
                    function = request.function(),
                    enrollment_id = %caller,
                    error = %err,
                    "chaincode operation failed",
                );
            },
        }
        result
    }
}

impl ChaincodeClient {
    /// Creates a client over `connection` and starts its queue worker.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::Config`] if `config` is invalid, or
    /// [`ChaincodeError::Internal`] if no Tokio runtime is running.
    pub fn new(connection: Arc<dyn LedgerConnection>, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let metrics = ClientMetrics::new();
        let protocol = TransactionProtocol::new(connection, config.verbose(), metrics.clone());
        let queue = OperationQueue::start()?;

        tracing::debug!(
            chaincode_id = %config.chaincode_id(),
            max_retries = config.retry().max_retries(),
            "chaincode client started",
        );

        Ok(Self { runner: OperationRunner { config: Arc::new(config), protocol, metrics }, queue })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.runner.config
    }

    /// Returns the client's metrics.
    #[must_use]
    pub fn metrics(&self) -> &ClientMetrics {
        &self.runner.metrics
    }

    /// Returns the number of calls waiting behind the running one.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Returns the number of calls currently running (0 or 1).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// Queues an arbitrary request and waits for its result.
    ///
    /// Use this for chaincode functions outside the [`ContractOperation`]
    /// table. No arity check is made.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt,
    /// [`ChaincodeError::QueueClosed`] if the queue worker has stopped, or
    /// [`ChaincodeError::Internal`] if the queued call panicked.
    #[tracing::instrument(
        skip(self, caller, request),
        fields(function = request.function(), enrollment_id = %caller, kind = %kind),
    )]
    pub async fn execute(
        &self,
        kind: CallKind,
        caller: EnrollmentId,
        request: RequestDescriptor,
    ) -> Result<String> {
        let runner = self.runner.clone();
        let receiver = self.queue.submit(move || runner.run(kind, caller, request))?;
        receiver.await.map_err(|_| ChaincodeError::internal("queued operation panicked"))?
    }

    /// Queues a named operation and waits for its result.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArguments`] without queueing if
    /// fewer arguments are given than the operation reads, otherwise as
    /// [`execute`](Self::execute).
    pub async fn call(
        &self,
        operation: ContractOperation,
        caller: impl Into<EnrollmentId>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<String> {
        let request = operation.request(self.config().chaincode_id(), args)?;
        self.execute(operation.kind(), caller.into(), request).await
    }

    /// Queues a named operation and returns immediately.
    ///
    /// `callback` is invoked exactly once with the result. For a queued call
    /// it runs inside the call's queue slot, so callbacks fire in call order
    /// and the next call waits for the callback to return. A panicking
    /// callback ends only its own slot; later calls still run. Argument
    /// errors and a closed queue invoke `callback` before this method
    /// returns.
    pub fn call_with_callback<F>(
        &self,
        operation: ContractOperation,
        caller: impl Into<EnrollmentId>,
        args: impl IntoIterator<Item = impl Into<String>>,
        callback: F,
    ) where
        F: FnOnce(Result<String>) + Send + 'static,
    {
        let request = match operation.request(self.config().chaincode_id(), args) {
            Ok(request) => request,
            Err(err) => return callback(Err(err)),
        };
        let caller = caller.into();
        let kind = operation.kind();

        let callback = Arc::new(Mutex::new(Some(callback)));
        let slot = Arc::clone(&callback);
        let runner = self.runner.clone();
        let enqueued = self.queue.enqueue(move || async move {
            let result = runner.run(kind, caller, request).await;
            if let Some(callback) = slot.lock().take() {
                callback(result);
            }
        });

        if let Err(err) = enqueued
            && let Some(callback) = callback.lock().take()
        {
            callback(Err(err));
        }
    }
}

macro_rules! named_operations {
    ($($(#[$meta:meta])* $method:ident => $variant:ident;)*) => {
        /// Named chaincode operations. Each one behaves as [`ChaincodeClient::call`].
        impl ChaincodeClient {
            $(
                $(#[$meta])*
                #[doc = ""]
                #[doc = concat!("Calls `", stringify!($variant), "`; see [`ContractOperation::", stringify!($variant), "`].")]
                pub async fn $method(
                    &self,
                    caller: impl Into<EnrollmentId>,
                    args: impl IntoIterator<Item = impl Into<String>>,
                ) -> Result<String> {
                    self.call(ContractOperation::$variant, caller, args).await
                }
            )*
        }
    };
}

named_operations! {
    /// Records a discovered roaming partner.
    discover_rp => DiscoverRp;
    /// Registers a subscriber record.
    enter_data => EnterData;
    /// Authenticates a roaming subscriber.
    authentication => Authentication;
    /// Applies roaming rates to a subscriber.
    update_rates => UpdateRates;
    /// Starts an outgoing call.
    call_out => CallOut;
    /// Ends the current call.
    call_end => CallEnd;
    /// Settles payment for the last call.
    call_pay => CallPay;
    /// Flags a subscriber over its allowance.
    overage => Overage;
    /// Restores the subscriber inventory.
    reset_inventory => ResetInventory;
    /// Reads a subscriber record.
    query_msisdn => QueryMsisdn;
    /// Reads a raw ledger record.
    get_blockchain_record => GetBlockchainRecord;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use chaincode_ledger::{Behavior, LedgerError, MemoryLedger, testutil::ledger_with_members};
    use tokio::sync::oneshot;

    use super::*;

    fn client(ledger: &MemoryLedger) -> ChaincodeClient {
        let config = ClientConfig::builder().chaincode_id("roaming-cc").build().unwrap();
        ChaincodeClient::new(Arc::new(ledger.clone()), config).unwrap()
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config: ClientConfig = serde_json::from_str(r#"{ "chaincode_id": "" }"#).unwrap();

        let result = ChaincodeClient::new(Arc::new(MemoryLedger::new()), config);

        assert!(matches!(result, Err(ChaincodeError::Config(_))));
    }

    #[tokio::test]
    async fn test_named_operation_sends_table_request() {
        let ledger = ledger_with_members(&["user_type1_0"]);
        let client = client(&ledger);

        client.call_out("user_type1_0", ["rs1", "14691234567"]).await.unwrap();

        let calls = ledger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].kind, CallKind::Invoke);
        assert_eq!(calls[0].request.chaincode_id().as_str(), "roaming-cc");
        assert_eq!(calls[0].request.function(), "CallOut");
        assert_eq!(calls[0].request.args(), ["rs1", "14691234567"]);
    }

    #[tokio::test]
    async fn test_query_operation_uses_query_kind() {
        let ledger = ledger_with_members(&["admin"]);
        let client = client(&ledger);

        client.get_blockchain_record("admin", ["rs4"]).await.unwrap();

        assert_eq!(ledger.calls()[0].kind, CallKind::Query);
    }

    #[tokio::test]
    async fn test_invalid_arity_never_reaches_queue() {
        let ledger = ledger_with_members(&["admin"]);
        let client = client(&ledger);

        let result = client.enter_data("admin", ["rs1"]).await;

        assert!(matches!(
            result,
            Err(ChaincodeError::InvalidArguments { operation: "enterData", expected: 7, actual: 1 })
        ));
        assert!(ledger.calls().is_empty());
        assert_eq!(client.metrics().snapshot().operations, 0);
    }

    #[tokio::test]
    async fn test_execute_accepts_functions_outside_table() {
        let ledger = ledger_with_members(&["admin"]);
        ledger.script("CallIn", [Behavior::complete("ringing")]);
        let client = client(&ledger);

        let request = RequestDescriptor::new("roaming-cc", "CallIn", ["rs1", "14691234567"]);
        let result = client.execute(CallKind::Invoke, "admin".into(), request).await;

        assert_eq!(result.unwrap(), "ringing");
    }

    #[tokio::test]
    async fn test_callback_receives_result() {
        let ledger = ledger_with_members(&["admin"]);
        ledger.script("resetInventory", [Behavior::complete("reset")]);
        let client = client(&ledger);
        let (tx, rx) = oneshot::channel();

        client.call_with_callback(
            ContractOperation::ResetInventory,
            "admin",
            Vec::<String>::new(),
            move |result| {
                let _ = tx.send(result);
            },
        );

        assert_eq!(rx.await.unwrap().unwrap(), "reset");
    }

    #[tokio::test]
    async fn test_callback_invoked_immediately_on_invalid_arguments() {
        let ledger = ledger_with_members(&["admin"]);
        let client = client(&ledger);
        let received = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&received);
        client.call_with_callback(ContractOperation::CallOut, "admin", ["rs1"], move |result| {
            *slot.lock() = Some(result);
        });

        let result = received.lock().take().expect("callback should run before returning");
        assert!(matches!(result, Err(ChaincodeError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_starve_later_callbacks() {
        let ledger = ledger_with_members(&["admin"]);
        let client = client(&ledger);
        let (tx, rx) = oneshot::channel();

        client.call_with_callback(ContractOperation::CallEnd, "admin", ["rs1"], |_| {
            panic!("callback failure");
        });
        client.call_with_callback(ContractOperation::CallPay, "admin", ["rs1"], move |result| {
            let _ = tx.send(result);
        });

        assert!(rx.await.unwrap().is_ok());
        assert_eq!(ledger.call_count("CallEnd"), 1);
        assert_eq!(ledger.call_count("CallPay"), 1);
        assert!(client.query_msisdn("admin", ["rs1"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_metrics_record_outcomes() {
        let ledger = ledger_with_members(&["admin"]);
        ledger.script("Overage", [Behavior::reject("a"), Behavior::reject("b")]);
        ledger.script("CallPay", [Behavior::submitted("tx-7")]);
        let client = client(&ledger);

        assert!(client.overage("admin", ["rs1"]).await.is_err());
        assert_eq!(client.call_pay("admin", ["rs1"]).await.unwrap(), "tx-7");

        let snapshot = client.metrics().snapshot();
        assert_eq!(snapshot.operations, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.retries_exhausted, 1);
        assert_eq!(snapshot.submitted_acks, 1);
    }

    #[tokio::test]
    async fn test_clones_share_one_queue() {
        let ledger = ledger_with_members(&["admin"]).with_latency(Duration::from_millis(2));
        let client = client(&ledger);
        let other = client.clone();

        let (first, second) = tokio::join!(
            client.query_msisdn("admin", ["rs1"]),
            other.query_msisdn("admin", ["rs2"]),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(ledger.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_member_resolution_failure_surfaces() {
        let ledger = ledger_with_members(&["admin"]);
        let client = client(&ledger);

        let result = client.authentication("ghost", ["rs1"]).await;

        assert!(matches!(
            result,
            Err(ChaincodeError::Ledger(LedgerError::MemberResolution { .. }))
        ));
        assert_eq!(ledger.resolution_count(), 1);
    }
}
