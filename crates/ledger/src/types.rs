//! Common types used across ledger calls.
//!
//! This module defines the identifiers, call descriptors, and result
//! payloads shared by ledger connections and their consumers.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Macro to define a newtype wrapper around `String` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `String`
/// - Derives `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<&str>` and `From<String>`
/// - Implements `Display` that outputs the inner value
macro_rules! define_string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&$name> for $name {
            fn from(value: &$name) -> Self {
                value.clone()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_string_id!(
    /// Identifier of a deployed chaincode.
    ///
    /// This is the ID returned by the deploy request for the contract. Every
    /// [`RequestDescriptor`] is addressed to exactly one chaincode.
    ///
    /// # Examples
    ///
    /// ```
    /// use chaincode_ledger::ChaincodeId;
    ///
    /// let id = ChaincodeId::from("roaming-cc");
    /// assert_eq!(id.to_string(), "roaming-cc");
    /// ```
    ChaincodeId
);

define_string_id!(
    /// Enrollment ID used to resolve a caller's [`Identity`](crate::Identity).
    ///
    /// # Examples
    ///
    /// ```
    /// use chaincode_ledger::EnrollmentId;
    ///
    /// let user = EnrollmentId::from("user_type1_0");
    /// assert_eq!(user.as_str(), "user_type1_0");
    /// ```
    EnrollmentId
);

/// Whether a call changes ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// A state-changing call that produces a ledger transaction.
    Invoke,
    /// A read-only call against current ledger state.
    Query,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invoke => f.write_str("invoke"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// A call against one function of a deployed chaincode.
///
/// Descriptors are immutable once built. Retrying a call clones the
/// descriptor so every attempt submits an identical request.
///
/// # Examples
///
/// ```
/// use chaincode_ledger::RequestDescriptor;
///
/// let request = RequestDescriptor::new("roaming-cc", "queryMSISDN", ["rs1"]);
/// assert_eq!(request.function(), "queryMSISDN");
/// assert_eq!(request.args(), ["rs1"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(rename = "chaincodeID")]
    chaincode_id: ChaincodeId,
    #[serde(rename = "fcn")]
    function: String,
    args: Vec<String>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `function` on `chaincode_id` with positional arguments.
    pub fn new(
        chaincode_id: impl Into<ChaincodeId>,
        function: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            chaincode_id: chaincode_id.into(),
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the target chaincode.
    #[must_use]
    pub fn chaincode_id(&self) -> &ChaincodeId {
        &self.chaincode_id
    }

    /// Returns the chaincode function name.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Returns the positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

/// Result payload carried by a terminal transaction event.
///
/// Ledger connections hand back whatever their transport produced. The
/// client normalizes every payload to a string through [`Display`](fmt::Display):
///
/// - [`Payload::Text`] is returned as-is
/// - [`Payload::Bytes`] is decoded as UTF-8, replacing invalid sequences
/// - [`Payload::Json`] strings are unquoted, other values use compact JSON
///
/// # Examples
///
/// ```
/// use chaincode_ledger::Payload;
///
/// assert_eq!(Payload::from(serde_json::json!(42)).to_string(), "42");
/// assert_eq!(Payload::from(b"rs1".to_vec()).to_string(), "rs1");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A UTF-8 string result.
    Text(String),
    /// Raw bytes as stored in ledger state.
    Bytes(Bytes),
    /// A structured result.
    Json(serde_json::Value),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Self::Json(serde_json::Value::String(text)) => f.write_str(text),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_text_is_returned_verbatim() {
        assert_eq!(Payload::from("ack").to_string(), "ack");
    }

    #[test]
    fn test_payload_invalid_utf8_is_replaced() {
        let payload = Payload::from(vec![b'o', b'k', 0xFF]);
        assert_eq!(payload.to_string(), "ok\u{FFFD}");
    }

    #[test]
    fn test_payload_json_number() {
        assert_eq!(Payload::from(json!(42)).to_string(), "42");
    }

    #[test]
    fn test_payload_json_string_is_unquoted() {
        assert_eq!(Payload::from(json!("14691234567")).to_string(), "14691234567");
    }

    #[test]
    fn test_payload_json_object_is_compact() {
        let payload = Payload::from(json!({"msisdn": "14691234567", "roaming": "FALSE"}));
        assert_eq!(payload.to_string(), r#"{"msisdn":"14691234567","roaming":"FALSE"}"#);
    }

    #[test]
    fn test_request_descriptor_json_body() {
        let request = RequestDescriptor::new("cc-1", "CallOut", ["rs1", "14691234568"]);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"chaincodeID":"cc-1","fcn":"CallOut","args":["rs1","14691234568"]}"#
        );
    }

    #[test]
    fn test_request_descriptor_without_args() {
        let request = RequestDescriptor::new("cc-1", "resetInventory", Vec::<String>::new());
        assert!(request.args().is_empty());
        assert_eq!(request.chaincode_id().as_str(), "cc-1");
    }

    #[test]
    fn test_call_kind_display() {
        assert_eq!(CallKind::Invoke.to_string(), "invoke");
        assert_eq!(CallKind::Query.to_string(), "query");
    }

    #[test]
    fn test_string_id_conversions() {
        let id = EnrollmentId::new("admin");
        assert_eq!(EnrollmentId::from(&id), id);
        assert!(!id.is_empty());
        assert!(ChaincodeId::from("").is_empty());
    }
}
