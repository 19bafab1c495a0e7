//! Ledger connection abstraction for the chaincode client.
//!
//! This crate provides the [`LedgerConnection`] and [`Identity`] traits and
//! the types that flow across them. The chaincode client drives every call
//! through this interface; a production connection wraps a ledger SDK,
//! while [`MemoryLedger`] serves tests and local development.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application                              │
//! │          (roaming, billing, inventory handlers)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 chaincode-client                            │
//! │   ContractOperation table │ OperationQueue │ retry-once     │
//! │             TransactionProtocol (per attempt)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 chaincode-ledger                            │
//! │     LedgerConnection → Identity → TransactionHandle         │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryLedger │          SDK-backed connection               │
//! │   (testing)  │              (production)                    │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use chaincode_ledger::{
//!     Behavior, EnrollmentId, LedgerConnection, MemoryLedger, RequestDescriptor,
//!     TransactionEvent,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new();
//!     ledger.register_member("user_type1_0");
//!     ledger.script("discoverRP", [Behavior::submitted("tx-42")]);
//!
//!     let identity = ledger.resolve_identity(&EnrollmentId::from("user_type1_0")).await?;
//!     let request =
//!         RequestDescriptor::new("roaming-cc", "discoverRP", ["rs1", "XYZ", "BARCELONA", "41.38", "2.17"]);
//!     let mut handle = identity.invoke(&request);
//!
//!     match handle.next_event().await {
//!         Some(TransactionEvent::Submitted(ack)) => assert_eq!(ack.to_string(), "tx-42"),
//!         other => panic!("unexpected event: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Connections map their failures to [`LedgerError`]. Only
//! [`LedgerError::MemberResolution`] is considered permanent; see
//! [`LedgerError::is_retryable`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with request builders, a pre-populated
//!   [`MemoryLedger`] factory, and an assertion macro.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod event;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use connection::{Identity, LedgerConnection};
pub use error::{BoxError, LedgerError, LedgerResult};
pub use event::{TransactionEmitter, TransactionEvent, TransactionHandle};
pub use memory::{Behavior, MemoryLedger, RecordedCall};
pub use types::{CallKind, ChaincodeId, EnrollmentId, Payload, RequestDescriptor};
