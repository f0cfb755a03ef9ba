use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("call {function} failed: {reason}")]
    Call { function: String, reason: String },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("malformed gateway response: {0}")]
    Decode(String),

    #[error("event subscription closed")]
    SubscriptionClosed,

    #[error("gateway configuration error: {0}")]
    Config(String),
}
