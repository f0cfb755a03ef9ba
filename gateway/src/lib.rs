//! The boundary between the staking engine and the chain.
//!
//! The engine never talks to a node directly. Everything it needs goes
//! through [`ChainGateway`]:
//! - batched read calls, one result (or error) per call, positionally
//! - fire-and-forget writes returning a transaction handle
//! - identity-scoped event subscriptions that unsubscribe when dropped
//!
//! [`HttpGateway`] speaks JSON-RPC to a gateway relay that owns signing,
//! retry and backoff.

pub mod call;
pub mod error;
pub mod event;
pub mod gateway;
pub mod http;
pub mod subscription;
pub mod value;

pub use call::{ReadCall, TxHandle, WriteCall};
pub use error::GatewayError;
pub use event::{ChainEvent, EventFilter, EventKind};
pub use gateway::{ChainGateway, ReadResult};
pub use http::{GatewayConfig, HttpGateway};
pub use subscription::EventSubscription;
pub use value::AbiValue;
