//! Read and write call descriptors.

use carbonfi_types::AccountAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AbiValue;

/// A view-function call: `(contract, function, args)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadCall {
    pub contract: AccountAddress,
    pub function: String,
    pub args: Vec<AbiValue>,
}

impl ReadCall {
    pub fn new(contract: AccountAddress, function: impl Into<String>, args: Vec<AbiValue>) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
        }
    }
}

/// A state-changing call. The gateway signs and submits it on behalf of
/// `from`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteCall {
    pub contract: AccountAddress,
    pub function: String,
    pub args: Vec<AbiValue>,
    pub from: AccountAddress,
}

impl WriteCall {
    pub fn new(
        contract: AccountAddress,
        function: impl Into<String>,
        args: Vec<AbiValue>,
        from: AccountAddress,
    ) -> Self {
        Self {
            contract,
            function: function.into(),
            args,
            from,
        }
    }
}

/// Opaque handle (transaction hash) for a dispatched write.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(String);

impl TxHandle {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
