//! The [`ChainGateway`] trait.

use async_trait::async_trait;

use crate::{AbiValue, EventFilter, EventSubscription, GatewayError, ReadCall, TxHandle, WriteCall};

/// Outcome of one call inside a batch.
pub type ReadResult = Result<AbiValue, GatewayError>;

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Execute every call in one round-trip.
    ///
    /// The outer error means the round-trip itself failed. Otherwise the
    /// returned vector has exactly one entry per call, in call order.
    async fn read_batch(&self, calls: Vec<ReadCall>) -> Result<Vec<ReadResult>, GatewayError>;

    /// Dispatch a write. Returns once the gateway has accepted it, not when
    /// it is mined.
    async fn write(&self, call: WriteCall) -> Result<TxHandle, GatewayError>;

    /// Open a subscription. Events stop flowing when the returned value is dropped.
    async fn subscribe(&self, filter: EventFilter) -> Result<EventSubscription, GatewayError>;

    /// Single read, as a batch of one.
    async fn read(&self, call: ReadCall) -> ReadResult {
        let function = call.function.clone();
        self.read_batch(vec![call])
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                Err(GatewayError::Decode(format!(
                    "empty batch response for {function}"
                )))
            })
    }
}
