//! Decoded contract call values.

use carbonfi_types::amount::decimal_string;
use carbonfi_types::AccountAddress;
use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// A decoded ABI value as returned by a read call or passed as an argument.
///
/// `uint256` values are carried as `u128`; a relay must report a per-call
/// error for anything larger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiValue {
    Uint(#[serde(with = "decimal_string")] u128),
    Bool(bool),
    Address(AccountAddress),
    /// Arrays and multi-value returns (tuples).
    List(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_uint(&self) -> Result<u128, GatewayError> {
        match self {
            Self::Uint(v) => Ok(*v),
            other => Err(unexpected("uint", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, GatewayError> {
        match self {
            Self::Bool(v) => Ok(*v),
            other => Err(unexpected("bool", other)),
        }
    }

    pub fn as_address(&self) -> Result<AccountAddress, GatewayError> {
        match self {
            Self::Address(v) => Ok(*v),
            other => Err(unexpected("address", other)),
        }
    }

    pub fn as_list(&self) -> Result<&[AbiValue], GatewayError> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(unexpected("list", other)),
        }
    }

    /// A list of exactly `N` values, for fixed-arity tuple returns.
    pub fn as_tuple<const N: usize>(&self) -> Result<&[AbiValue; N], GatewayError> {
        let items = self.as_list()?;
        items.try_into().map_err(|_| {
            GatewayError::Decode(format!("expected {N}-tuple, got {} values", items.len()))
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::List(_) => "list",
        }
    }
}

fn unexpected(expected: &str, got: &AbiValue) -> GatewayError {
    GatewayError::Decode(format!("expected {expected}, got {}", got.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_check_variant() {
        assert_eq!(AbiValue::Uint(7).as_uint(), Ok(7));
        assert!(AbiValue::Bool(true).as_uint().is_err());
        assert_eq!(AbiValue::Bool(false).as_bool(), Ok(false));
    }

    #[test]
    fn tuple_arity_is_enforced() {
        let v = AbiValue::List(vec![AbiValue::Uint(1), AbiValue::Uint(2), AbiValue::Bool(true)]);
        let [a, b, c] = v.as_tuple::<3>().unwrap();
        assert_eq!(a.as_uint(), Ok(1));
        assert_eq!(b.as_uint(), Ok(2));
        assert_eq!(c.as_bool(), Ok(true));
        assert!(v.as_tuple::<4>().is_err());
    }

    #[test]
    fn json_shape_is_tagged_with_string_uints() {
        let v = AbiValue::List(vec![AbiValue::Uint(u128::MAX), AbiValue::Bool(true)]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "list": [
                { "uint": "340282366920938463463374607431768211455" },
                { "bool": true }
            ]})
        );
        let back: AbiValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }
}
