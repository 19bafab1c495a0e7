//! Shared test utilities for ledger and client testing.
//!
//! This module provides helpers for building requests, preparing an
//! in-memory ledger with registered members, and asserting on
//! [`LedgerResult`](crate::LedgerResult) values. It is feature-gated behind `testutil` to
//! prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! chaincode-ledger = { path = "../ledger", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use chaincode_ledger::testutil::{ledger_with_members, make_args, make_request};
//! ```

use crate::{memory::MemoryLedger, types::RequestDescriptor};

/// Chaincode ID used by test requests.
pub const TEST_CHAINCODE_ID: &str = "test-chaincode";

/// Create a request for `function` on [`TEST_CHAINCODE_ID`].
#[must_use]
pub fn make_request(function: &str, args: &[&str]) -> RequestDescriptor {
    RequestDescriptor::new(TEST_CHAINCODE_ID, function, args.iter().copied())
}

/// Create `count` positional arguments named `"arg0"`, `"arg1"`, ...
#[must_use]
pub fn make_args(count: usize) -> Vec<String> {
    (0..count).map(|idx| format!("arg{idx}")).collect()
}

/// Create a [`MemoryLedger`] with the given members registered.
#[must_use]
pub fn ledger_with_members(members: &[&str]) -> MemoryLedger {
    let ledger = MemoryLedger::new();
    for member in members {
        ledger.register_member(*member);
    }
    ledger
}

/// Assert that a [`LedgerResult`](crate::LedgerResult) is a
/// [`LedgerError::MemberResolution`](crate::LedgerError::MemberResolution).
#[macro_export]
macro_rules! assert_member_resolution {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::LedgerError::MemberResolution { .. })),
            "expected LedgerError::MemberResolution, got: {:?}",
            $result,
        );
    };
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{EnrollmentId, LedgerConnection};

    #[test]
    fn test_make_request_uses_test_chaincode() {
        let request = make_request("queryMSISDN", &["rs1"]);
        assert_eq!(request.chaincode_id().as_str(), TEST_CHAINCODE_ID);
        assert_eq!(request.args(), ["rs1"]);
    }

    #[test]
    fn test_make_args() {
        assert!(make_args(0).is_empty());
        assert_eq!(make_args(3), ["arg0", "arg1", "arg2"]);
    }

    #[tokio::test]
    async fn test_ledger_with_members_resolves_registered_only() {
        let ledger = ledger_with_members(&["admin", "user_type1_0"]);

        assert!(ledger.resolve_identity(&EnrollmentId::from("admin")).await.is_ok());
        let result = ledger.resolve_identity(&EnrollmentId::from("ghost")).await.map(|_| ());
        assert_member_resolution!(result);
    }
}
