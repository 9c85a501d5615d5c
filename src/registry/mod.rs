//! The shortcut registry: maps names to persisted shortcuts, keeps OS registrations in
//! step with listeners, and dispatches OS events.
//!
//! `ShortcutRegistry` is single-owned and synchronous. Everything that can happen to it
//! from outside (store changes, OS events, cancelled subscriptions) arrives as an
//! explicit method call on the owner, which is what `service` arranges.
//!
//! # Registration rule
//!
//! A shortcut is registered with the OS while at least one name with listeners resolves
//! to it. `reconcile` is the only place that applies this rule; every operation that can
//! change a name's shortcut or listeners ends by reconciling that name. `enable` and
//! `disable` deliberately bypass it.

mod listener;


use std::collections::HashMap;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use crate::bridge::{EventKind, HotkeyBridge, OsEvent, OsEventSink};
use crate::error::{Result, ResultExt, ShortcutError};
use crate::shortcuts::{Name, Shortcut};
use crate::store::{
    read_value, write_value, ChangeObservers, ChangeSink, KeyFormat, SettingsStore, StoredValue,
};

pub use listener::{
    DurableHandler, EventSink, Handler, ListenerId, ListenerIds, ShortcutEvent,
    SubscriptionSink,
};

use listener::{Listener, ListenerSet, ListenerStyle};

pub struct ShortcutRegistry {
    store: Arc<dyn SettingsStore>,
    keys: KeyFormat,
    bridge: HotkeyBridge,
    observers: ChangeObservers,
    listeners: HashMap<Name, ListenerSet>,
    /// Every name seen, keeping the instance that carries a default.
    declared: HashMap<String, Name>,
    /// Shortcut each listened-to name currently holds an OS registration for.
    active: HashMap<Name, Shortcut>,
    /// Last decoded store value per name, to tell real changes from echoes.
    seen: HashMap<Name, StoredValue>,
    change_subscribers: Vec<Sender<Name>>,
    enabled: bool,
    paused: bool,
    ids: ListenerIds,
}

impl ShortcutRegistry {
    /// `change_sink` is handed to store observers. It must only enqueue; the owner then
    /// calls `handle_store_change`.
    pub fn new(
        store: Arc<dyn SettingsStore>,
        bridge: HotkeyBridge,
        keys: KeyFormat,
        change_sink: ChangeSink,
    ) -> Self {
        Self {
            store,
            observers: ChangeObservers::new(keys.clone(), change_sink),
            keys,
            bridge,
            listeners: HashMap::new(),
            declared: HashMap::new(),
            active: HashMap::new(),
            seen: HashMap::new(),
            change_subscribers: Vec::new(),
            enabled: true,
            paused: false,
            ids: ListenerIds::default(),
        }
    }

    /// Start the OS backend's event delivery.
    pub fn start_backend(&mut self, sink: OsEventSink) -> Result<()> {
        self.bridge.start(sink)
    }

    // --- Names & configuration ---

    /// Make a name known. A default is persisted if the name has no stored entry yet.
    ///
    /// Names carrying a default are also picked up the first time any operation sees
    /// them, so declaring is only needed to persist defaults ahead of use.
    pub fn declare(&mut self, name: &Name) {
        self.remember(name);
        if let Some(default) = name.default_shortcut() {
            self.persist_default(name, default);
        }
    }

    pub fn get_shortcut(&self, name: &Name) -> Option<Shortcut> {
        self.stored(name).shortcut().cloned()
    }

    pub fn stored(&self, name: &Name) -> StoredValue {
        read_value(self.store.as_ref(), &self.keys, name)
    }

    /// Assign or clear a name's shortcut.
    ///
    /// Clearing a name that has a default stores `Disabled` so the default is not
    /// restored on next launch; otherwise the entry is removed.
    pub fn set_shortcut(&mut self, shortcut: Option<Shortcut>, name: &Name) {
        if let Err(e) = self.try_set_shortcut(shortcut, name) {
            warn!(name = %name, error = %e, "Failed to persist shortcut");
        }
    }

    pub fn try_set_shortcut(&mut self, shortcut: Option<Shortcut>, name: &Name) -> Result<()> {
        self.remember(name);
        let value = match shortcut {
            Some(shortcut) => StoredValue::Assigned(shortcut),
            None if self.default_for(name).is_some() => StoredValue::Disabled,
            None => StoredValue::Unset,
        };
        debug!(name = %name, value = ?value, "Setting shortcut");
        let written = write_value(self.store.as_ref(), &self.keys, name, &value);
        self.reconcile(name);
        self.notify_changed(name);
        written
    }

    /// Set each name back to its default, or clear it when it has none.
    pub fn reset(&mut self, names: &[Name]) {
        for name in names {
            let default = self.default_for(name);
            self.set_shortcut(default, name);
        }
    }

    /// Reset every name that currently has a persisted entry.
    pub fn reset_all(&mut self) {
        let names: Vec<Name> = self
            .store
            .keys()
            .iter()
            .filter_map(|key| self.keys.name_of(key))
            .map(|raw| self.name_for_raw(raw))
            .collect();
        info!(count = names.len(), "Resetting all shortcuts");
        self.reset(&names);
    }

    /// Swap the backing store. Observations move over; data is not migrated.
    pub fn set_store(&mut self, store: Arc<dyn SettingsStore>) {
        let old = std::mem::replace(&mut self.store, store);
        self.observers.repoint(old.as_ref(), self.store.as_ref());
        info!(observed = self.observers.len(), "Shortcut store replaced");

        let names: Vec<Name> = self.declared.values().cloned().collect();
        for name in names {
            if self.reconcile(&name) {
                self.notify_changed(&name);
            }
        }
    }

    /// An observed store key changed. Reconciles and notifies if the value really moved.
    pub fn handle_store_change(&mut self, raw: &str) {
        let name = self.name_for_raw(raw);
        if self.reconcile(&name) {
            debug!(name = %name, "Persisted shortcut changed");
            self.notify_changed(&name);
        }
    }

    /// Receive every name whose persisted configuration changes.
    pub fn subscribe_changes(&mut self) -> Receiver<Name> {
        let (tx, rx) = async_channel::unbounded();
        self.add_change_subscriber(tx);
        rx
    }

    pub fn add_change_subscriber(&mut self, tx: Sender<Name>) {
        self.change_subscribers.push(tx);
    }

    // --- Enable / pause ---

    /// Register each name's current shortcut, regardless of listeners.
    pub fn enable(&mut self, names: &[Name]) {
        for name in names {
            if let Some(shortcut) = self.get_shortcut(name) {
                self.bridge.register(&shortcut).warn_on_err();
            }
        }
    }

    /// Unregister each name's current shortcut, leaving listeners and configuration.
    /// A shortcut that another listened-to name also holds stays registered.
    pub fn disable(&mut self, names: &[Name]) {
        for name in names {
            let Some(shortcut) = self.get_shortcut(name) else {
                continue;
            };
            let shared = self
                .active
                .iter()
                .any(|(other, held)| other != name && held == &shortcut);
            if shared {
                debug!(name = %name, shortcut = %shortcut, "Shortcut held by another name, kept");
                continue;
            }
            self.bridge.unregister(&shortcut);
        }
    }

    /// Like `enable` for a single name, but reports why it could not be enabled.
    pub fn try_enable(&mut self, name: &Name) -> Result<Shortcut> {
        let shortcut = self
            .get_shortcut(name)
            .ok_or_else(|| ShortcutError::NotConfigured {
                name: name.raw().to_string(),
            })?;
        self.bridge.register(&shortcut)?;
        Ok(shortcut)
    }

    pub fn is_enabled(&self, name: &Name) -> bool {
        self.enabled
            && self
                .get_shortcut(name)
                .is_some_and(|shortcut| self.bridge.is_registered(&shortcut))
    }

    /// Global switch. Re-enabling re-applies the current configuration.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        info!(enabled, "Keyboard shortcuts globally toggled");
        if enabled {
            self.reconcile_all();
        }
    }

    pub fn is_globally_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        debug!(paused, "Shortcut delivery pause changed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // --- Listeners ---

    /// Allocator for ids passed to the `attach_*` methods.
    pub fn listener_ids(&self) -> ListenerIds {
        self.ids.clone()
    }

    pub fn on_key_down(&mut self, name: &Name, handler: Handler) -> ListenerId {
        let id = self.ids.next();
        self.attach_durable(id, name, EventKind::KeyDown, handler);
        id
    }

    pub fn on_key_up(&mut self, name: &Name, handler: Handler) -> ListenerId {
        let id = self.ids.next();
        self.attach_durable(id, name, EventKind::KeyUp, handler);
        id
    }

    /// Channel subscription to a name's events, optionally of one kind only.
    ///
    /// The OS hotkey is registered immediately. Cancel with `remove_listener`; a dropped
    /// receiver is also pruned on the next dispatch.
    pub fn subscribe(
        &mut self,
        name: &Name,
        filter: Option<EventKind>,
    ) -> (ListenerId, Receiver<ShortcutEvent>) {
        let (tx, rx) = async_channel::unbounded();
        let id = self.ids.next();
        self.attach_subscription(id, name, filter, tx);
        (id, rx)
    }

    pub fn attach_durable(
        &mut self,
        id: ListenerId,
        name: &Name,
        kind: EventKind,
        handler: Handler,
    ) {
        self.add_listener(
            id,
            name,
            ListenerStyle::Durable,
            Box::new(DurableHandler::new(kind, handler)),
        );
    }

    pub fn attach_subscription(
        &mut self,
        id: ListenerId,
        name: &Name,
        filter: Option<EventKind>,
        tx: Sender<ShortcutEvent>,
    ) {
        self.add_listener(
            id,
            name,
            ListenerStyle::Subscription,
            Box::new(SubscriptionSink::new(filter, tx)),
        );
    }

    /// Remove one listener of either style.
    pub fn remove_listener(&mut self, id: ListenerId) {
        let owner = self
            .listeners
            .iter_mut()
            .find_map(|(name, set)| set.remove(id).then(|| name.clone()));
        match owner {
            Some(name) => {
                debug!(name = %name, listener = %id, "Listener removed");
                self.after_listeners_changed(&name);
            }
            None => debug!(listener = %id, "Listener already gone"),
        }
    }

    /// Remove a name's durable handlers. Subscriptions are left alone.
    pub fn remove_handler(&mut self, name: &Name) {
        let removed = self
            .listeners
            .get_mut(name)
            .map_or(0, |set| set.remove_style(ListenerStyle::Durable));
        debug!(name = %name, removed, "Removed durable handlers");
        self.after_listeners_changed(name);
    }

    pub fn remove_all_handlers(&mut self) {
        let names: Vec<Name> = self.listeners.keys().cloned().collect();
        for name in &names {
            self.remove_handler(name);
        }
    }

    pub fn listener_count(&self, name: &Name) -> usize {
        self.listeners.get(name).map_or(0, ListenerSet::len)
    }

    // --- OS side ---

    pub fn set_menu_open(&mut self, open: bool) {
        self.bridge.set_menu_open(open);
    }

    pub fn registered_shortcuts(&self) -> Vec<Shortcut> {
        self.bridge.registered()
    }

    /// Drop every OS registration. Configuration and listeners are kept.
    pub fn unregister_all(&mut self) {
        self.bridge.unregister_all();
        self.active.clear();
    }

    /// Deliver an OS event to every name currently resolving to its shortcut.
    pub fn dispatch(&mut self, event: &OsEvent) {
        let Some(kind) = self.bridge.accept(event) else {
            return;
        };
        if !self.enabled || self.paused {
            debug!(shortcut = %event.shortcut, "Shortcut delivery suspended");
            return;
        }

        let targets: Vec<Name> = self
            .listeners
            .keys()
            .filter(|name| self.get_shortcut(name).as_ref() == Some(&event.shortcut))
            .cloned()
            .collect();

        let mut closed: Vec<ListenerId> = Vec::new();
        for name in targets {
            let Some(set) = self.listeners.get(&name) else {
                continue;
            };
            debug!(name = %name, kind = ?kind, "Dispatching shortcut event");
            closed.extend(set.notify(&ShortcutEvent { name, kind }));
        }
        for id in closed {
            self.remove_listener(id);
        }
    }

    /// Stop observing the store and release every OS registration.
    pub fn shutdown(&mut self) {
        self.observers.stop_all(self.store.as_ref());
        self.listeners.clear();
        self.unregister_all();
        self.change_subscribers.clear();
        info!("Shortcut registry shut down");
    }

    // --- Internals ---

    fn add_listener(
        &mut self,
        id: ListenerId,
        name: &Name,
        style: ListenerStyle,
        sink: Box<dyn EventSink>,
    ) {
        self.remember(name);
        self.listeners
            .entry(name.clone())
            .or_default()
            .push(Listener { id, style, sink });
        self.observers.observe(self.store.as_ref(), name);
        self.reconcile(name);
        debug!(name = %name, listener = %id, style = ?style, "Listener added");
    }

    fn after_listeners_changed(&mut self, name: &Name) {
        if self.listeners.get(name).is_some_and(ListenerSet::is_empty) {
            self.listeners.remove(name);
            self.observers.stop(self.store.as_ref(), name);
        }
        self.reconcile(name);
    }

    fn has_listeners(&self, name: &Name) -> bool {
        self.listeners.get(name).is_some_and(|set| !set.is_empty())
    }

    /// Track a name, keeping the instance that carries a default. The first time a
    /// name's default is seen, it is persisted unless the store already has an entry.
    fn remember(&mut self, name: &Name) {
        let Some(default) = name.default_shortcut() else {
            self.declared
                .entry(name.raw().to_string())
                .or_insert_with(|| name.clone());
            return;
        };
        let had_default = self
            .declared
            .insert(name.raw().to_string(), name.clone())
            .is_some_and(|known| known.default_shortcut().is_some());
        if !had_default {
            self.persist_default(name, default);
        }
    }

    fn persist_default(&self, name: &Name, default: &Shortcut) {
        if self.store.get(&self.keys.key_for(name)).is_some() {
            return;
        }
        match write_value(
            self.store.as_ref(),
            &self.keys,
            name,
            &StoredValue::Assigned(default.clone()),
        ) {
            Ok(()) => info!(name = %name, shortcut = %default, "Persisted default shortcut"),
            Err(e) => warn!(name = %name, error = %e, "Failed to persist default shortcut"),
        }
    }

    fn default_for(&self, name: &Name) -> Option<Shortcut> {
        name.default_shortcut()
            .or_else(|| {
                self.declared
                    .get(name.raw())
                    .and_then(Name::default_shortcut)
            })
            .cloned()
    }

    fn name_for_raw(&self, raw: &str) -> Name {
        self.declared
            .get(raw)
            .cloned()
            .unwrap_or_else(|| Name::new(raw))
    }

    fn reconcile_all(&mut self) {
        let names: Vec<Name> = self.listeners.keys().cloned().collect();
        for name in names {
            self.reconcile(&name);
        }
    }

    /// Bring the name's OS registration in line with its stored value and listeners.
    /// Returns whether the stored value differs from the last one seen.
    fn reconcile(&mut self, name: &Name) -> bool {
        let stored = self.stored(name);
        let wanted = if self.has_listeners(name) {
            stored.shortcut().cloned()
        } else {
            None
        };
        let changed = self.seen.get(name) != Some(&stored);
        self.seen.insert(name.clone(), stored);

        let previous = self.active.get(name).cloned();
        if previous == wanted {
            return changed;
        }
        if let Some(previous) = previous {
            self.active.remove(name);
            self.release(&previous);
        }
        if let Some(shortcut) = wanted {
            match self.bridge.register(&shortcut) {
                Ok(()) => {
                    self.active.insert(name.clone(), shortcut);
                }
                Err(e) => {
                    warn!(name = %name, shortcut = %shortcut, error = %e, "Shortcut left inactive");
                }
            }
        }
        changed
    }

    /// Unregister a shortcut unless another listened-to name still holds it.
    fn release(&mut self, shortcut: &Shortcut) {
        if self.active.values().any(|held| held == shortcut) {
            debug!(shortcut = %shortcut, "Shortcut still held by another name");
            return;
        }
        self.bridge.unregister(shortcut);
    }

    fn notify_changed(&mut self, name: &Name) {
        self.change_subscribers
            .retain(|tx| tx.try_send(name.clone()).is_ok());
    }
}
