//! Whole-value snapshot publication with last-call-wins refreshes.
//!
//! A [`SnapshotCell`] holds the current snapshot as an `Arc<T>` inside a
//! `watch` channel. Readers clone the `Arc` and never see a half-built value.
//! Every refresh takes a [`RefreshTicket`]; a ticket publishes only if no
//! newer ticket was issued in the meantime.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub struct SnapshotCell<T> {
    tx: watch::Sender<Arc<T>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

impl<T> SnapshotCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self {
            tx,
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.tx.borrow())
    }

    /// A receiver notified every time a new snapshot is published.
    pub fn watch(&self) -> watch::Receiver<Arc<T>> {
        self.tx.subscribe()
    }

    /// Start a refresh, superseding any refresh still in flight.
    pub fn begin(&self) -> RefreshTicket<'_, T> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        RefreshTicket {
            cell: self,
            generation,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }
}

/// Right to publish the result of one refresh.
///
/// Dropping a ticket without publishing (e.g. a cancelled refresh future)
/// simply gives up that result.
pub struct RefreshTicket<'a, T> {
    cell: &'a SnapshotCell<T>,
    generation: u64,
}

impl<T> RefreshTicket<'_, T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a newer refresh has started since this ticket was issued.
    pub fn is_superseded(&self) -> bool {
        self.cell.generation.load(Ordering::SeqCst) != self.generation
    }

    /// Replace the snapshot with `build(previous)` unless superseded.
    ///
    /// The supersession check and the swap happen under the channel's write
    /// lock, so a stale result can never overwrite a newer one. Returns the
    /// published snapshot, or `None` if the result was discarded.
    pub fn publish(self, build: impl FnOnce(&T) -> T) -> Option<Arc<T>> {
        let mut published = None;
        self.cell.tx.send_if_modified(|current| {
            if self.is_superseded() {
                return false;
            }
            let next = Arc::new(build(current));
            published = Some(Arc::clone(&next));
            *current = next;
            true
        });
        published
    }
}

impl<T> Drop for RefreshTicket<'_, T> {
    fn drop(&mut self) {
        self.cell.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_whole_value() {
        let cell = SnapshotCell::new(vec![1]);
        let ticket = cell.begin();
        assert!(cell.is_refreshing());
        let published = ticket.publish(|prev| prev.iter().map(|v| v * 10).collect());
        assert_eq!(published.as_deref(), Some(&vec![10]));
        assert_eq!(*cell.current(), vec![10]);
        assert!(!cell.is_refreshing());
    }

    #[test]
    fn superseded_ticket_does_not_publish() {
        let cell = SnapshotCell::new(0);
        let older = cell.begin();
        let newer = cell.begin();
        assert!(older.is_superseded());
        assert_eq!(newer.publish(|_| 2).as_deref(), Some(&2));
        assert_eq!(older.publish(|_| 1), None);
        assert_eq!(*cell.current(), 2);
    }

    #[test]
    fn older_ticket_is_discarded_even_if_it_finishes_first() {
        let cell = SnapshotCell::new(0);
        let older = cell.begin();
        let newer = cell.begin();
        assert_eq!(older.publish(|_| 1), None);
        assert_eq!(*cell.current(), 0);
        assert!(cell.is_refreshing());
        newer.publish(|_| 2);
        assert_eq!(*cell.current(), 2);
    }

    #[test]
    fn dropped_ticket_clears_in_flight() {
        let cell = SnapshotCell::new(());
        drop(cell.begin());
        assert!(!cell.is_refreshing());
    }

    #[tokio::test]
    async fn watchers_see_published_snapshots() {
        let cell = SnapshotCell::new(0);
        let mut rx = cell.watch();
        cell.begin().publish(|_| 7);
        rx.changed().await.unwrap();
        assert_eq!(**rx.borrow(), 7);
    }
}
