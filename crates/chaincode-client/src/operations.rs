//! The roaming chaincode's operation table.
//!
//! Each [`ContractOperation`] names one chaincode function, whether it is an
//! invoke or a query, and the positional parameters the chaincode reads. The
//! chaincode indexes its arguments without bounds checks, so requests with
//! too few arguments are rejected before they are queued. Trailing arguments
//! are forwarded unchanged; the chaincode ignores them.

use std::fmt;

use chaincode_ledger::{CallKind, ChaincodeId, RequestDescriptor};

use crate::error::{ChaincodeError, Result};

macro_rules! contract_operations {
    ($(
        $(#[$meta:meta])*
        $variant:ident => $function:literal, $kind:ident, [$($param:literal),* $(,)?];
    )*) => {
        /// A named function of the roaming chaincode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ContractOperation {
            $(
                $(#[$meta])*
                $variant,
            )*
        }

        impl ContractOperation {
            /// Every operation in the table.
            pub const ALL: &'static [ContractOperation] = &[$(Self::$variant),*];

            /// Returns the chaincode function name.
            #[must_use]
            pub fn function_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $function,)*
                }
            }

            /// Returns whether the function is an invoke or a query.
            #[must_use]
            pub fn kind(self) -> CallKind {
                match self {
                    $(Self::$variant => CallKind::$kind,)*
                }
            }

            /// Returns the names of the positional parameters, in order.
            #[must_use]
            pub fn parameters(self) -> &'static [&'static str] {
                match self {
                    $(Self::$variant => &[$($param),*],)*
                }
            }
        }
    };
}

contract_operations! {
    /// Records a roaming subscriber's discovery of a roaming partner.
    DiscoverRp => "discoverRP", Invoke, ["key", "service_provider", "location", "latitude", "longitude"];
    /// Registers a subscriber record.
    EnterData => "enterData", Invoke, ["key", "msisdn", "name", "address", "home_operator", "latitude", "longitude"];
    /// Authenticates a roaming subscriber with its home operator.
    Authentication => "authentication", Invoke, ["key"];
    /// Applies the roaming partner's rates to a subscriber.
    UpdateRates => "updateRates", Invoke, ["key"];
    /// Starts an outgoing call.
    CallOut => "CallOut", Invoke, ["key", "destination_msisdn"];
    /// Ends the current call.
    CallEnd => "CallEnd", Invoke, ["key"];
    /// Settles payment for the last call.
    CallPay => "CallPay", Invoke, ["key"];
    /// Flags a subscriber whose usage exceeded its allowance.
    Overage => "Overage", Invoke, ["key"];
    /// Restores the demo subscriber inventory.
    ResetInventory => "resetInventory", Invoke, [];
    /// Reads a subscriber record.
    QueryMsisdn => "queryMSISDN", Query, ["key"];
    /// Reads a raw ledger record.
    GetBlockchainRecord => "getBlockchainRecord", Query, ["key"];
}

impl ContractOperation {
    /// Returns the minimum number of arguments the function reads.
    #[must_use]
    pub fn arity(self) -> usize {
        self.parameters().len()
    }

    /// Looks up an operation by its chaincode function name.
    #[must_use]
    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.function_name() == name)
    }

    /// Builds the request for this operation after checking its arity.
    ///
    /// # Errors
    ///
    /// Returns [`ChaincodeError::InvalidArguments`] if `args` has fewer than
    /// [`arity`](Self::arity) elements.
    pub fn request<I, S>(self, chaincode_id: &ChaincodeId, args: I) -> Result<RequestDescriptor>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if args.len() < self.arity() {
            return Err(ChaincodeError::InvalidArguments {
                operation: self.function_name(),
                expected: self.arity(),
                actual: args.len(),
            });
        }
        Ok(RequestDescriptor::new(chaincode_id, self.function_name(), args))
    }
}

impl fmt::Display for ContractOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}
