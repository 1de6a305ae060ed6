//! Fan-out of transfer snapshots to subscribers.
//!
//! The bus is owned by the manager's coordinator task, which is the only
//! publisher; per-transfer ordering therefore follows the order the coordinator
//! applied the changes. Each subscriber has its own unbounded channel so a slow
//! observer never blocks the coordinator.

use tokio::sync::mpsc;

use crate::record::TransferId;

use super::coalesce::Coalescer;
use super::snapshot::{ProgressEvent, TransferSnapshot};

/// Subscriber identifier, unique per bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

/// Receiving end of a bus subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event; `None` once the manager has shut down.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }
}

pub struct ProgressBus {
    coalescer: Coalescer,
    subscribers: Vec<(SubscriberId, mpsc::UnboundedSender<ProgressEvent>)>,
    next_id: u64,
}

impl ProgressBus {
    pub fn new(progress_threshold: f64) -> Self {
        Self {
            coalescer: Coalescer::new(progress_threshold),
            subscribers: Vec::new(),
            next_id: 1,
        }
    }

    /// Adds a subscriber. `current` is delivered first so the observer starts
    /// from the present state; earlier history is not replayed.
    pub fn subscribe<I>(&mut self, current: I) -> Subscription
    where
        I: IntoIterator<Item = TransferSnapshot>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        for snapshot in current {
            let _ = tx.send(ProgressEvent::Snapshot(snapshot));
        }
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, tx));
        tracing::debug!(subscriber = id.0, "progress subscriber added");
        Subscription { id, rx }
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Publishes `snapshot` unless it is a progress-only change below the
    /// coalescing threshold. Returns whether it was sent.
    pub fn publish(&mut self, snapshot: TransferSnapshot) -> bool {
        if !self.coalescer.should_publish(&snapshot) {
            return false;
        }
        self.broadcast(ProgressEvent::Snapshot(snapshot));
        true
    }

    /// Announces that `id` left the live set.
    pub fn publish_removed(&mut self, id: TransferId) {
        self.coalescer.forget(id);
        self.broadcast(ProgressEvent::Removed { id });
    }

    fn broadcast(&mut self, event: ProgressEvent) {
        self.subscribers.retain(|(sid, tx)| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                tracing::debug!(subscriber = sid.0, "progress subscriber dropped");
            }
            alive
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TransferStatus;

    fn snap(id: u64, status: TransferStatus, fraction: f64) -> TransferSnapshot {
        TransferSnapshot {
            id: TransferId(id),
            display_name: format!("{id}.bin"),
            status,
            progress_fraction: fraction,
            bytes_written: 0,
            bytes_expected: 0,
            resumable: false,
            error: None,
        }
    }

    fn drain(sub: &mut Subscription) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[test]
    fn subscribe_delivers_current_state_only() {
        let mut bus = ProgressBus::new(0.01);
        bus.publish(snap(1, TransferStatus::Queued, 0.0));
        bus.publish(snap(1, TransferStatus::Running, 0.0));

        let mut sub = bus.subscribe(vec![snap(1, TransferStatus::Running, 0.2)]);
        let events = drain(&mut sub);
        assert_eq!(
            events,
            vec![ProgressEvent::Snapshot(snap(1, TransferStatus::Running, 0.2))]
        );
    }

    #[test]
    fn every_subscriber_sees_each_publish_in_order() {
        let mut bus = ProgressBus::new(0.01);
        let mut a = bus.subscribe(Vec::new());
        let mut b = bus.subscribe(Vec::new());
        bus.publish(snap(1, TransferStatus::Queued, 0.0));
        bus.publish(snap(1, TransferStatus::Running, 0.0));
        bus.publish(snap(1, TransferStatus::Running, 0.005));
        bus.publish_removed(TransferId(1));

        for sub in [&mut a, &mut b] {
            let events = drain(sub);
            assert_eq!(events.len(), 3);
            assert!(matches!(events[2], ProgressEvent::Removed { id } if id == TransferId(1)));
        }
    }

    #[test]
    fn dropped_subscription_is_pruned() {
        let mut bus = ProgressBus::new(0.01);
        let sub = bus.subscribe(Vec::new());
        let _keep = bus.subscribe(Vec::new());
        assert_eq!(bus.subscriber_count(), 2);
        drop(sub);
        bus.publish(snap(1, TransferStatus::Queued, 0.0));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn explicit_unsubscribe() {
        let mut bus = ProgressBus::new(0.01);
        let sub = bus.subscribe(Vec::new());
        bus.unsubscribe(sub.id());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
