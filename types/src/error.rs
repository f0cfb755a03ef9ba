//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("invalid token amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("staking period duration must be greater than zero")]
    ZeroDuration,

    #[error("value out of range: {0}")]
    OutOfRange(String),
}
