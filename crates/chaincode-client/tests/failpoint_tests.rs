#![allow(clippy::expect_used, clippy::panic)]
//! Integration tests for fail-point injection.
//!
//! These tests require the `failpoints` feature:
//! ```bash
//! cargo test -p chaincode-client --features failpoints --test failpoint_tests
//! ```

use std::sync::Arc;

use chaincode_client::{ChaincodeClient, ChaincodeError, ClientConfig};
use chaincode_ledger::{LedgerError, MemoryLedger, testutil::ledger_with_members};

fn create_client(ledger: &MemoryLedger) -> ChaincodeClient {
    let config = ClientConfig::builder().chaincode_id("roaming-cc").build().expect("valid config");
    ChaincodeClient::new(Arc::new(ledger.clone()), config).expect("client creation should succeed")
}

#[tokio::test]
async fn submit_failpoint_fails_every_attempt() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("protocol-before-submit", "return").expect("failed to configure fail point");

    let ledger = ledger_with_members(&["admin"]);
    let client = create_client(&ledger);
    let result = client.query_msisdn("admin", ["rs1"]).await;

    assert!(
        matches!(result, Err(ChaincodeError::Ledger(LedgerError::Transport { .. }))),
        "query should fail when fail point is active, got: {result:?}"
    );
    assert!(ledger.calls().is_empty(), "no request should reach the ledger");
    assert_eq!(client.metrics().snapshot().retries, 1);

    scenario.teardown();
}

#[tokio::test]
async fn submit_failpoint_once_is_recovered_by_retry() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("protocol-before-submit", "1*return").expect("failed to configure fail point");

    let ledger = ledger_with_members(&["admin"]);
    let client = create_client(&ledger);
    let result = client.call_end("admin", ["rs1"]).await;

    assert!(result.is_ok(), "retry should succeed after one injected failure: {result:?}");
    assert_eq!(ledger.call_count("CallEnd"), 1);

    scenario.teardown();
}

#[tokio::test]
async fn retry_failpoint_aborts_before_second_attempt() {
    let scenario = fail::FailScenario::setup();
    fail::cfg("protocol-before-submit", "1*return").expect("failed to configure fail point");
    fail::cfg("chaincode-before-retry", "return").expect("failed to configure fail point");

    let ledger = ledger_with_members(&["admin"]);
    let client = create_client(&ledger);
    let result = client.authentication("admin", ["rs1"]).await;

    assert!(
        matches!(result, Err(ChaincodeError::Internal { .. })),
        "retry fail point should surface an internal error, got: {result:?}"
    );
    assert!(ledger.calls().is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn calls_succeed_without_failpoints() {
    let scenario = fail::FailScenario::setup();
    // No fail point configured, so calls should succeed normally

    let ledger = ledger_with_members(&["admin"]);
    let client = create_client(&ledger);
    let result = client.get_blockchain_record("admin", ["rs1"]).await;

    assert!(result.is_ok(), "query should succeed without fail point");

    scenario.teardown();
}
