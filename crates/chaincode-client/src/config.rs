//! Configuration for the chaincode client.
//!
//! [`ClientConfig`] names the target chaincode and controls logging
//! verbosity, the retry budget, and the optional per-attempt timeout. It can
//! be built in code with the validating builder or deserialized from any
//! serde format; deserialized values are checked again by
//! [`ClientConfig::validate`] when a client is constructed.

use std::time::Duration;

use chaincode_ledger::{CallKind, ChaincodeId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of extra attempts after a failed first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Upper bound for [`RetryConfig::max_retries`].
///
/// Operations are retried at most once. A second retry of a blindly
/// re-submitted invoke multiplies duplicate side effects on the ledger.
pub const MAX_RETRIES_LIMIT: u32 = 1;

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_invokes() -> bool {
    true
}

/// Retry budget for a single client operation.
///
/// # Example
///
/// ```
/// use chaincode_client::RetryConfig;
///
/// let config = RetryConfig::builder().retry_invokes(false).build()?;
/// assert_eq!(config.max_retries(), 1);
/// assert!(!config.retry_invokes());
/// # Ok::<(), chaincode_client::ConfigError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    #[serde(default = "default_retry_invokes")]
    retry_invokes: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES, retry_invokes: true }
    }
}

#[bon::bon]
impl RetryConfig {
    /// Creates a retry configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AboveMaximum`] if `max_retries` exceeds
    /// [`MAX_RETRIES_LIMIT`].
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_RETRIES)] max_retries: u32,
        #[builder(default = true)] retry_invokes: bool,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_retries, retry_invokes };
        config.validate()?;
        Ok(config)
    }

    /// Returns a configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self { max_retries: 0, retry_invokes: false }
    }

    /// Returns the number of extra attempts after a failed first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns whether state-changing calls are re-submitted after a failure.
    #[must_use]
    pub fn retry_invokes(&self) -> bool {
        self.retry_invokes
    }

    /// Returns the retry budget that applies to a call of the given kind.
    #[must_use]
    pub fn retries_for(&self, kind: CallKind) -> u32 {
        match kind {
            CallKind::Invoke if !self.retry_invokes => 0,
            CallKind::Invoke | CallKind::Query => self.max_retries,
        }
    }

    /// Checks the retry budget against [`MAX_RETRIES_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AboveMaximum`] if the budget is too large.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::AboveMaximum {
                field: "max_retries",
                max: MAX_RETRIES_LIMIT.to_string(),
                value: self.max_retries.to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a [`ChaincodeClient`](crate::ChaincodeClient).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use chaincode_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .chaincode_id("roaming-cc")
///     .verbose(true)
///     .attempt_timeout(Duration::from_secs(30))
///     .build()?;
///
/// assert_eq!(config.chaincode_id().as_str(), "roaming-cc");
/// assert_eq!(config.retry().max_retries(), 1);
/// # Ok::<(), chaincode_client::ConfigError>(())
/// ```
///
/// Deserializing uses human-readable durations:
///
/// ```
/// use chaincode_client::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(
///     r#"{ "chaincode_id": "roaming-cc", "attempt_timeout": "45s" }"#,
/// )?;
/// assert_eq!(config.attempt_timeout(), Some(std::time::Duration::from_secs(45)));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Target chaincode.
    chaincode_id: ChaincodeId,

    /// Log the lifecycle of every attempt at `debug`.
    #[serde(default)]
    verbose: bool,

    /// Retry budget.
    #[serde(default)]
    retry: RetryConfig,

    /// Upper bound on a single attempt. `None` waits indefinitely.
    #[serde(default, with = "humantime_serde")]
    attempt_timeout: Option<Duration>,
}

#[bon::bon]
impl ClientConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `verbose` - Per-attempt debug logging (default: false).
    /// * `retry` - Retry budget (default: one retry, invokes included).
    /// * `attempt_timeout` - Per-attempt bound (default: none).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `chaincode_id` is empty
    /// - `attempt_timeout` is zero
    /// - `retry` exceeds the retry limit
    #[builder]
    pub fn new(
        #[builder(into)] chaincode_id: ChaincodeId,
        #[builder(default)] verbose: bool,
        #[builder(default)] retry: RetryConfig,
        attempt_timeout: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        let config = Self { chaincode_id, verbose, retry, attempt_timeout };
        config.validate()?;
        Ok(config)
    }

    /// Returns the target chaincode.
    #[must_use]
    pub fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    /// Returns whether per-attempt debug logging is enabled.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns the retry budget.
    #[must_use]
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Returns the per-attempt timeout, if any.
    #[must_use]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// Checks every field.
    ///
    /// Builder-constructed values are always valid. Deserialized values are
    /// not checked until this is called.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chaincode_id.is_empty() {
            return Err(ConfigError::Empty { field: "chaincode_id" });
        }
        if let Some(timeout) = self.attempt_timeout
            && timeout.is_zero()
        {
            return Err(ConfigError::MustBePositive {
                field: "attempt_timeout",
                value: format!("{timeout:?}"),
            });
        }
        self.retry.validate()
    }
}
