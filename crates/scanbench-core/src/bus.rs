//! Event bus for scan event distribution.
//!
//! Synchronous handlers run on the publishing thread, in subscription
//! order. A tokio broadcast channel mirrors every published event for
//! async observers.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::events::{ScanEvent, ScanEventKind};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only specific event kinds
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these kinds.
    Kinds(Vec<ScanEventKind>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kinds(kinds) => kinds.contains(&event.kind()),
        }
    }
}

/// Type alias for event handler functions
type EventHandler = Arc<dyn Fn(ScanEvent) + Send + Sync>;

/// Broadcast channel capacity for the async mirror.
const CHANNEL_CAPACITY: usize = 1024;

/// Central event bus for scan event distribution
///
/// Dispatch iterates a snapshot of the subscription list taken at publish
/// time, so a handler may subscribe or unsubscribe during dispatch without
/// deadlocking; such changes take effect from the next publish.
pub struct EventBus {
    /// Broadcast channel sender for async observers
    sender: broadcast::Sender<ScanEvent>,
    /// Registered synchronous handlers, in subscription order
    handlers: RwLock<Vec<(SubscriptionId, EventFilter, EventHandler)>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Publish an event to all matching subscribers
    ///
    /// Handlers run on the calling thread, in subscription order. A handler
    /// panic propagates to the publisher. Returns the number of synchronous
    /// handlers invoked.
    pub fn publish(&self, event: ScanEvent) -> usize {
        let snapshot: Vec<(EventFilter, EventHandler)> = {
            let handlers = self.handlers.read();
            handlers
                .iter()
                .map(|(_, filter, handler)| (filter.clone(), Arc::clone(handler)))
                .collect()
        };

        let mut invoked = 0;
        for (filter, handler) in &snapshot {
            if filter.matches(&event) {
                handler(event.clone());
                invoked += 1;
            }
        }

        // Mirror for async receivers; a send error just means none exist.
        let _ = self.sender.send(event);
        invoked
    }

    /// Subscribe to events of specific kinds with a synchronous handler
    ///
    /// The handler is called on the publishing thread, so it should return
    /// quickly to avoid blocking dispatch.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(ScanEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let mut handlers = self.handlers.write();
        handlers.push((id, filter, Arc::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Get a receiver for async event consumption in a tokio task
    pub fn receiver(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed; unsubscribing
    /// twice is harmless.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sub_id, _, _)| *sub_id != id);
        let removed = handlers.len() < before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard that unsubscribes its subscriptions on drop
///
/// Ties handler lifetime to scope so a forgotten unsubscribe cannot leak
/// handlers across scans.
pub struct ScopedSubscription {
    bus: Arc<EventBus>,
    ids: Vec<SubscriptionId>,
}

impl ScopedSubscription {
    /// Create an empty guard bound to a bus
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            ids: Vec::new(),
        }
    }

    /// Subscribe and register the id with this guard
    pub fn subscribe<F>(&mut self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(ScanEvent) + Send + Sync + 'static,
    {
        let id = self.bus.subscribe(filter, handler);
        self.ids.push(id);
        id
    }

    /// Number of subscriptions held by this guard
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether this guard holds no subscriptions
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for ScopedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSubscription")
            .field("ids", &self.ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanId;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cancelled() -> ScanEvent {
        ScanEvent::ScanCancelled {
            scan_id: ScanId::new(),
        }
    }

    fn completed() -> ScanEvent {
        ScanEvent::ScanCompleted {
            scan_id: ScanId::new(),
            total_points: 1,
        }
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);

        // Double unsubscribe should return false
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn event_delivery_counts_handlers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        bus.subscribe(EventFilter::All, move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(cancelled()), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_filtering() {
        let bus = EventBus::new();
        let cancelled_count = Arc::new(AtomicUsize::new(0));
        let completed_count = Arc::new(AtomicUsize::new(0));

        let cc = cancelled_count.clone();
        bus.subscribe(
            EventFilter::Kinds(vec![ScanEventKind::Cancelled]),
            move |_| {
                cc.fetch_add(1, Ordering::SeqCst);
            },
        );

        let pc = completed_count.clone();
        bus.subscribe(
            EventFilter::Kinds(vec![ScanEventKind::Completed]),
            move |_| {
                pc.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(cancelled());
        bus.publish(completed());

        assert_eq!(cancelled_count.load(Ordering::SeqCst), 1);
        assert_eq!(completed_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn kind_list_filter_matches_every_event() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        bus.subscribe(
            EventFilter::Kinds(ScanEventKind::all().to_vec()),
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );

        bus.publish(cancelled());
        bus.publish(completed());

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..4 {
            let order = order.clone();
            bus.subscribe(EventFilter::All, move |_| {
                order.lock().push(tag);
            });
        }

        bus.publish(cancelled());
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn handler_may_unsubscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let bus_clone = bus.clone();
        let slot_clone = slot.clone();
        let hits_clone = hits.clone();
        let id = bus.subscribe(EventFilter::All, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot_clone.lock() {
                bus_clone.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        // First publish runs the handler once and removes it.
        bus.publish(cancelled());
        bus.publish(cancelled());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_subscription_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let mut guard = ScopedSubscription::new(bus.clone());
            let c = counter.clone();
            guard.subscribe(EventFilter::All, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(bus.subscriber_count(), 1);
            bus.publish(cancelled());
        }

        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(cancelled());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_receiver_mirrors_events() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        bus.publish(completed());

        match receiver.try_recv() {
            Ok(ScanEvent::ScanCompleted { total_points, .. }) => assert_eq!(total_points, 1),
            other => panic!("wrong event received: {other:?}"),
        }
    }
}
