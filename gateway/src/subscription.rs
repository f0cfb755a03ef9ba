//! Scoped event subscriptions.
//!
//! An [`EventSubscription`] is the only handle to a live subscription.
//! Dropping it closes the channel and stops any producer task, so tearing
//! down a session cannot leak listeners.

use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{ChainEvent, EventFilter};

pub struct EventSubscription {
    filter: EventFilter,
    rx: mpsc::Receiver<ChainEvent>,
    producer: Option<JoinHandle<()>>,
}

impl EventSubscription {
    /// Subscription fed by someone else holding the sender half.
    pub fn new(filter: EventFilter, rx: mpsc::Receiver<ChainEvent>) -> Self {
        Self {
            filter,
            rx,
            producer: None,
        }
    }

    /// Subscription fed by a dedicated task, aborted when the subscription drops.
    pub fn with_producer(
        filter: EventFilter,
        rx: mpsc::Receiver<ChainEvent>,
        producer: JoinHandle<()>,
    ) -> Self {
        Self {
            filter,
            rx,
            producer: Some(producer),
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Wait for the next event. `None` once the producer has gone away.
    pub async fn next_event(&mut self) -> Option<ChainEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventSubscription {
    type Item = ChainEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        tracing::debug!(
            event = %self.filter.kind,
            contract = %self.filter.contract,
            "event subscription dropped"
        );
    }
}
