//! Serialized, retrying transaction client for ledger chaincode.
//!
//! This crate lets application code invoke and query the functions of a
//! deployed chaincode without handling session concurrency, identity
//! resolution, or transient failures itself. Calls made through one
//! [`ChaincodeClient`] run one at a time in call order, and each call is
//! retried once on a retryable failure.
//!
//! # Components
//!
//! - [`OperationQueue`]: FIFO gate that runs at most one call at a time
//! - [`TransactionProtocol`]: resolves the caller and drives one attempt to its first terminal
//!   event
//! - [`with_retry`]: runs an attempt and, on a retryable failure, runs it exactly once more
//! - [`ContractOperation`]: the chaincode's function table with arity checks
//! - [`ChaincodeClient`]: the facade tying them together
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use chaincode_client::{ChaincodeClient, ClientConfig, ContractOperation};
//! use chaincode_ledger::{Behavior, MemoryLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = MemoryLedger::new();
//!     ledger.register_member("user_type1_0");
//!     ledger.script("discoverRP", [Behavior::reject("endorser busy"), Behavior::submitted("tx-1")]);
//!
//!     let config = ClientConfig::builder().chaincode_id("roaming-cc").build()?;
//!     let client = ChaincodeClient::new(Arc::new(ledger.clone()), config)?;
//!
//!     // The first attempt is rejected; the retry is acknowledged.
//!     let ack = client
//!         .discover_rp("user_type1_0", ["rs1", "XYZ", "BARCELONA", "41.38", "2.17"])
//!         .await?;
//!     assert_eq!(ack, "tx-1");
//!     assert_eq!(ledger.call_count(ContractOperation::DiscoverRp.function_name()), 2);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Every call returns [`Result<String>`](Result). Member resolution failures
//! and argument errors are returned without a retry; ledger failures and
//! attempt timeouts are retried once. See [`ChaincodeError::is_retryable`].
//!
//! # Feature Flags
//!
//! - **`failpoints`**: Enables fail-point injection (`protocol-before-submit`,
//!   `chaincode-before-retry`) through the `fail` crate for fault testing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod operations;
pub mod protocol;
pub mod queue;
pub mod retry;

// Re-export primary types at crate root for convenience
pub use client::ChaincodeClient;
pub use config::{ClientConfig, DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT, RetryConfig};
pub use error::{ChaincodeError, ConfigError, Result};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use operations::ContractOperation;
pub use protocol::{AttemptState, TransactionProtocol};
pub use queue::{OperationQueue, QueuedTask};
pub use retry::with_retry;
