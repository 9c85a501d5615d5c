//! Listener abstraction shared by durable handlers and subscriptions.
//!
//! Both styles are `EventSink`s. A sink reports whether it is still open, so dispatch
//! can prune dead subscriptions without a separate bookkeeping path.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::Sender;

use crate::bridge::EventKind;
use crate::shortcuts::Name;

/// A shortcut event delivered to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortcutEvent {
    pub name: Name,
    pub kind: EventKind,
}

/// Identifies one listener registration across all names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Hands out listener ids. Shared with the service handle so ids can be assigned
/// before the registration reaches the owner thread.
#[derive(Clone, Debug, Default)]
pub struct ListenerIds(Arc<AtomicU64>);

impl ListenerIds {
    pub fn next(&self) -> ListenerId {
        ListenerId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Durable callback. Runs on the registry's owner thread.
pub type Handler = Arc<dyn Fn() + Send + Sync>;

pub trait EventSink: Send {
    /// Deliver an event. Returns false once the sink is closed and should be pruned.
    fn notify(&self, event: &ShortcutEvent) -> bool;
}

/// Callback for one event kind, kept until explicitly removed.
pub struct DurableHandler {
    kind: EventKind,
    handler: Handler,
}

impl DurableHandler {
    pub fn new(kind: EventKind, handler: Handler) -> Self {
        Self { kind, handler }
    }
}

impl EventSink for DurableHandler {
    fn notify(&self, event: &ShortcutEvent) -> bool {
        if event.kind == self.kind {
            (self.handler)();
        }
        true
    }
}

/// Channel-backed listener, closed when its receiver goes away.
pub struct SubscriptionSink {
    filter: Option<EventKind>,
    tx: Sender<ShortcutEvent>,
}

impl SubscriptionSink {
    pub fn new(filter: Option<EventKind>, tx: Sender<ShortcutEvent>) -> Self {
        Self { filter, tx }
    }
}

impl EventSink for SubscriptionSink {
    fn notify(&self, event: &ShortcutEvent) -> bool {
        if self.filter.is_some_and(|kind| kind != event.kind) {
            return !self.tx.is_closed();
        }
        self.tx.try_send(event.clone()).is_ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListenerStyle {
    Durable,
    Subscription,
}

pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) style: ListenerStyle,
    pub(crate) sink: Box<dyn EventSink>,
}

/// All listeners of one name, in registration order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: Vec<Listener>,
}

impl ListenerSet {
    pub(crate) fn push(&mut self, listener: Listener) {
        self.entries.push(listener);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|listener| listener.id != id);
        self.entries.len() != before
    }

    /// Remove every listener of a style. Returns how many were removed.
    pub(crate) fn remove_style(&mut self, style: ListenerStyle) -> usize {
        let before = self.entries.len();
        self.entries.retain(|listener| listener.style != style);
        before - self.entries.len()
    }

    /// Notify durable listeners, then subscriptions. Returns the ids of closed sinks.
    pub(crate) fn notify(&self, event: &ShortcutEvent) -> Vec<ListenerId> {
        let mut closed = Vec::new();
        for style in [ListenerStyle::Durable, ListenerStyle::Subscription] {
            for listener in self.entries.iter().filter(|l| l.style == style) {
                if !listener.sink.notify(event) {
                    closed.push(listener.id);
                }
            }
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(kind: EventKind) -> ShortcutEvent {
        ShortcutEvent {
            name: Name::new("toggle"),
            kind,
        }
    }

    #[test]
    fn listener_ids_are_unique_across_clones() {
        let ids = ListenerIds::default();
        let shared = ids.clone();
        assert_eq!(ids.next(), ListenerId(1));
        assert_eq!(shared.next(), ListenerId(2));
    }

    #[test]
    fn durable_handler_fires_only_for_its_kind() {
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let sink = DurableHandler::new(EventKind::KeyUp, Arc::new(move || *counter.lock() += 1));

        assert!(sink.notify(&event(EventKind::KeyDown)));
        assert!(sink.notify(&event(EventKind::KeyUp)));
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn subscription_reports_closed_receiver() {
        let (tx, rx) = async_channel::unbounded();
        let sink = SubscriptionSink::new(Some(EventKind::KeyDown), tx);

        assert!(sink.notify(&event(EventKind::KeyDown)));
        assert!(sink.notify(&event(EventKind::KeyUp)));
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::KeyDown);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!sink.notify(&event(EventKind::KeyDown)));
        assert!(!sink.notify(&event(EventKind::KeyUp)));
    }

    #[test]
    fn durable_listeners_run_before_subscriptions() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = async_channel::unbounded();

        let mut set = ListenerSet::default();
        set.push(Listener {
            id: ListenerId(1),
            style: ListenerStyle::Subscription,
            sink: Box::new(SubscriptionSink::new(None, tx)),
        });
        for n in [2, 3] {
            let order = order.clone();
            set.push(Listener {
                id: ListenerId(n),
                style: ListenerStyle::Durable,
                sink: Box::new(DurableHandler::new(
                    EventKind::KeyDown,
                    Arc::new(move || order.lock().push(n)),
                )),
            });
        }

        assert!(set.notify(&event(EventKind::KeyDown)).is_empty());
        assert_eq!(*order.lock(), vec![2, 3]);
        assert_eq!(rx.len(), 1);

        drop(rx);
        assert_eq!(set.notify(&event(EventKind::KeyDown)), vec![ListenerId(1)]);
        assert_eq!(set.remove_style(ListenerStyle::Durable), 2);
        assert!(set.remove(ListenerId(1)));
        assert!(set.is_empty());
    }
}
