//! Typed notifications raised by the stepper.
//!
//! Every event kind has its own [`Channel`] with a statically typed payload.
//! Subscribing hands back a [`Subscription`] handle plus a receiver; listeners
//! drain their receiver whenever convenient. A subscription can be cancelled on
//! its own, or together with every other subscription registered under the same
//! [`ListenerId`].

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use execgraph_core::{MemorySnapshot, SourceLocation};
use tracing::trace;

use crate::export::ExportedGraph;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Identity of a listener owning one or more subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    owner: ListenerId,
}

impl Subscription {
    pub fn owner(&self) -> ListenerId {
        self.owner
    }
}

/// Fan-out channel for one event kind.
#[derive(Debug)]
pub struct Channel<T> {
    name: &'static str,
    senders: Vec<(Subscription, Sender<T>)>,
}

impl<T: Clone> Channel<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            senders: Vec::new(),
        }
    }

    /// Register a listener. Events emitted from now on are queued on the receiver.
    pub fn subscribe(&mut self, owner: ListenerId) -> (Subscription, Receiver<T>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = Subscription {
            id: NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed),
            owner,
        };
        self.senders.push((handle, tx));
        (handle, rx)
    }

    /// Cancel one subscription. Returns whether it was registered here.
    pub fn unsubscribe(&mut self, handle: Subscription) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(s, _)| *s != handle);
        before != self.senders.len()
    }

    fn unsubscribe_owner(&mut self, owner: ListenerId) {
        self.senders.retain(|(s, _)| s.owner != owner);
    }

    /// Deliver `payload` to every live listener. Dropped receivers are pruned.
    pub fn emit(&mut self, payload: T) {
        trace!(event = self.name, listeners = self.senders.len(), "event_emit");
        self.senders.retain(|(_, tx)| match tx.try_send(payload.clone()) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) => false,
            Err(TrySendError::Full(_)) => true,
        });
    }

    pub fn listener_count(&self) -> usize {
        self.senders.len()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// All channels raised around a stepping session.
///
/// Every channel except `mark` is raised by the stepper.
#[derive(Debug)]
pub struct EventBus {
    /// Session data changed outside the stepper (e.g. reset).
    pub dirty: Channel<()>,
    /// Clear any source highlight.
    pub clear: Channel<()>,
    /// Highlight a source range outside interactive stepping. Raised by
    /// collaborators such as a source view; the stepper never emits it.
    pub mark: Channel<SourceLocation>,
    /// Highlight the source range of the active interactive state.
    pub mark_interactive: Channel<SourceLocation>,
    /// A new memory snapshot is current.
    pub update_memory: Channel<MemorySnapshot>,
    /// The exported graph was regenerated.
    pub update_interactive: Channel<ExportedGraph>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            dirty: Channel::new("dirty"),
            clear: Channel::new("clear"),
            mark: Channel::new("mark"),
            mark_interactive: Channel::new("markInteractive"),
            update_memory: Channel::new("updateMemory"),
            update_interactive: Channel::new("updateInteractive"),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every subscription registered by `owner`, on every channel.
    pub fn unsubscribe_owner(&mut self, owner: ListenerId) {
        self.dirty.unsubscribe_owner(owner);
        self.clear.unsubscribe_owner(owner);
        self.mark.unsubscribe_owner(owner);
        self.mark_interactive.unsubscribe_owner(owner);
        self.update_memory.unsubscribe_owner(owner);
        self.update_interactive.unsubscribe_owner(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::location;

    #[test]
    fn test_emit_reaches_every_listener() {
        let mut bus = EventBus::new();
        let (_, a) = bus.mark_interactive.subscribe(ListenerId(1));
        let (_, b) = bus.mark_interactive.subscribe(ListenerId(2));

        bus.mark_interactive.emit(location(7));

        assert_eq!(a.try_recv().unwrap().line(), 7);
        assert_eq!(b.try_recv().unwrap().line(), 7);
        assert!(a.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_single_handle() {
        let mut bus = EventBus::new();
        let (handle, rx) = bus.clear.subscribe(ListenerId(1));
        let (_, other) = bus.clear.subscribe(ListenerId(1));

        assert!(bus.clear.unsubscribe(handle));
        assert!(!bus.clear.unsubscribe(handle));
        bus.clear.emit(());

        assert!(rx.try_recv().is_err());
        assert!(other.try_recv().is_ok());
    }

    #[test]
    fn test_unsubscribe_owner_across_channels() {
        let mut bus = EventBus::new();
        let tab = ListenerId(9);
        let (_, clear_rx) = bus.clear.subscribe(tab);
        let (_, dirty_rx) = bus.dirty.subscribe(tab);
        let (_, kept) = bus.dirty.subscribe(ListenerId(10));

        bus.unsubscribe_owner(tab);
        bus.clear.emit(());
        bus.dirty.emit(());

        assert!(clear_rx.try_recv().is_err());
        assert!(dirty_rx.try_recv().is_err());
        assert!(kept.try_recv().is_ok());
        assert_eq!(bus.clear.listener_count(), 0);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let mut bus = EventBus::new();
        let (_, rx) = bus.dirty.subscribe(ListenerId(1));
        drop(rx);
        assert_eq!(bus.dirty.listener_count(), 1);
        bus.dirty.emit(());
        assert_eq!(bus.dirty.listener_count(), 0);
    }
}
