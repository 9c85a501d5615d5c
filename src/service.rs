//! Shortcut service: runs a `ShortcutRegistry` on its own owner thread.
//!
//! `KeyboardShortcuts` is a cheap, cloneable handle. Every operation is a `Command` sent
//! over one unbounded channel; OS events, store changes, menu transitions and
//! subscription cancellations travel through the same channel, so the registry sees
//! one ordered stream of work and never needs a lock.
//!
//! Durable handlers run on the owner thread. From inside a handler, mutations are fine
//! (they are queued), but blocking queries such as `get_shortcut` are refused with
//! `ShortcutError::ReentrantQuery` instead of deadlocking.
//!
//! ```ignore
//! let shortcuts = KeyboardShortcuts::from_config(&load_config())?;
//! let toggle = Name::with_default("toggleUnicornMode", Shortcut::parse("cmd+shift+u")?);
//! shortcuts.declare(&toggle);
//! shortcuts.on_key_down(&toggle, || println!("🦄"));
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::bridge::{
    EventKind, GlobalHotkeyBackend, HeadlessBackend, HotkeyBackend, HotkeyBridge, OsEvent,
    OsEventSink,
};
use crate::config::ShortcutsConfig;
use crate::error::{Result, ResultExt, ShortcutError};
use crate::menu::MenuTracker;
use crate::registry::{Handler, ListenerId, ListenerIds, ShortcutEvent, ShortcutRegistry};
use crate::shortcuts::{Name, Shortcut};
use crate::store::{ChangeSink, JsonFileStore, KeyFormat, SettingsStore, StoreFileWatcher};

type QueryFn = Box<dyn FnOnce(&mut ShortcutRegistry) + Send>;

/// Work item for the owner thread.
pub(crate) enum Command {
    Declare(Name),
    SetShortcut(Option<Shortcut>, Name),
    Reset(Vec<Name>),
    ResetAll,
    Enable(Vec<Name>),
    Disable(Vec<Name>),
    SetEnabled(bool),
    SetPaused(bool),
    AddHandler {
        id: ListenerId,
        name: Name,
        kind: EventKind,
        handler: Handler,
    },
    Subscribe {
        id: ListenerId,
        name: Name,
        filter: Option<EventKind>,
        events: Sender<ShortcutEvent>,
    },
    RemoveListener(ListenerId),
    RemoveHandler(Name),
    RemoveAllHandlers,
    WatchChanges(Sender<Name>),
    SetStore(Arc<dyn SettingsStore>),
    UnregisterAll,
    SetMenuOpen(bool),
    OsEvent(OsEvent),
    StoreChanged(String),
    Query(QueryFn),
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Command::Declare(_) => "Declare",
            Command::SetShortcut(..) => "SetShortcut",
            Command::Reset(_) => "Reset",
            Command::ResetAll => "ResetAll",
            Command::Enable(_) => "Enable",
            Command::Disable(_) => "Disable",
            Command::SetEnabled(_) => "SetEnabled",
            Command::SetPaused(_) => "SetPaused",
            Command::AddHandler { .. } => "AddHandler",
            Command::Subscribe { .. } => "Subscribe",
            Command::RemoveListener(_) => "RemoveListener",
            Command::RemoveHandler(_) => "RemoveHandler",
            Command::RemoveAllHandlers => "RemoveAllHandlers",
            Command::WatchChanges(_) => "WatchChanges",
            Command::SetStore(_) => "SetStore",
            Command::UnregisterAll => "UnregisterAll",
            Command::SetMenuOpen(_) => "SetMenuOpen",
            Command::OsEvent(_) => "OsEvent",
            Command::StoreChanged(_) => "StoreChanged",
            Command::Query(_) => "Query",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(label)
    }
}

/// Builder for `KeyboardShortcuts`.
pub struct ServiceBuilder {
    store: Arc<dyn SettingsStore>,
    backend: Box<dyn HotkeyBackend>,
    keys: KeyFormat,
    enabled: bool,
    watcher: Option<StoreFileWatcher>,
}

impl ServiceBuilder {
    pub fn new(store: Arc<dyn SettingsStore>, backend: Box<dyn HotkeyBackend>) -> Self {
        Self {
            store,
            backend,
            keys: KeyFormat::default(),
            enabled: true,
            watcher: None,
        }
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = KeyFormat::new(prefix);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Keep a store watcher alive for as long as the service runs.
    pub fn watcher(mut self, watcher: StoreFileWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn spawn(self) -> Result<KeyboardShortcuts> {
        let (tx, rx) = async_channel::unbounded::<Command>();

        let change_tx = tx.clone();
        let change_sink: ChangeSink = Arc::new(move |raw: &str| {
            let _ = change_tx.try_send(Command::StoreChanged(raw.to_string()));
        });
        let os_sink = os_event_sink(&tx);

        let mut registry = ShortcutRegistry::new(
            self.store,
            HotkeyBridge::new(self.backend),
            self.keys,
            change_sink,
        );
        registry.set_enabled(self.enabled);
        registry.start_backend(os_sink)?;
        let ids = registry.listener_ids();

        let thread = thread::Builder::new()
            .name("keyboard-shortcuts".to_string())
            .spawn(move || run_owner_loop(registry, rx))
            .map_err(|e| ShortcutError::Backend(e.to_string()))?;
        let owner = thread.thread().id();
        info!(?owner, "Keyboard shortcut service started");

        Ok(KeyboardShortcuts {
            inner: Arc::new(Inner {
                tx,
                ids,
                owner,
                thread: Mutex::new(Some(thread)),
                _watcher: self.watcher,
            }),
        })
    }
}

fn os_event_sink(tx: &Sender<Command>) -> OsEventSink {
    let tx = tx.clone();
    OsEventSink::new(move |event| tx.try_send(Command::OsEvent(event)).is_ok())
}

fn run_owner_loop(mut registry: ShortcutRegistry, rx: Receiver<Command>) {
    while let Ok(command) = rx.recv_blocking() {
        match command {
            Command::Declare(name) => registry.declare(&name),
            Command::SetShortcut(shortcut, name) => registry.set_shortcut(shortcut, &name),
            Command::Reset(names) => registry.reset(&names),
            Command::ResetAll => registry.reset_all(),
            Command::Enable(names) => registry.enable(&names),
            Command::Disable(names) => registry.disable(&names),
            Command::SetEnabled(enabled) => registry.set_enabled(enabled),
            Command::SetPaused(paused) => registry.set_paused(paused),
            Command::AddHandler {
                id,
                name,
                kind,
                handler,
            } => registry.attach_durable(id, &name, kind, handler),
            Command::Subscribe {
                id,
                name,
                filter,
                events,
            } => registry.attach_subscription(id, &name, filter, events),
            Command::RemoveListener(id) => registry.remove_listener(id),
            Command::RemoveHandler(name) => registry.remove_handler(&name),
            Command::RemoveAllHandlers => registry.remove_all_handlers(),
            Command::WatchChanges(tx) => registry.add_change_subscriber(tx),
            Command::SetStore(store) => registry.set_store(store),
            Command::UnregisterAll => registry.unregister_all(),
            Command::SetMenuOpen(open) => registry.set_menu_open(open),
            Command::OsEvent(event) => registry.dispatch(&event),
            Command::StoreChanged(raw) => registry.handle_store_change(&raw),
            Command::Query(query) => query(&mut registry),
            Command::Shutdown => break,
        }
    }
    registry.shutdown();
    info!("Keyboard shortcut service stopped");
}

struct Inner {
    tx: Sender<Command>,
    ids: ListenerIds,
    owner: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
    _watcher: Option<StoreFileWatcher>,
}

impl Inner {
    fn stop(&self) {
        let _ = self.tx.try_send(Command::Shutdown);
        if thread::current().id() == self.owner {
            // Dropped from inside a handler; the loop exits after this command
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("Keyboard shortcut owner thread panicked");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle to the shortcut service. Clones share one registry.
///
/// Handlers that capture a clone of the handle keep the service alive; call `shutdown`
/// to stop it explicitly.
#[derive(Clone)]
pub struct KeyboardShortcuts {
    inner: Arc<Inner>,
}

impl KeyboardShortcuts {
    pub fn builder(
        store: Arc<dyn SettingsStore>,
        backend: Box<dyn HotkeyBackend>,
    ) -> ServiceBuilder {
        ServiceBuilder::new(store, backend)
    }

    /// Start a service with the JSON file store and backend described by `config`.
    ///
    /// With `useSystemHotkeys` the OS backend is created on the calling thread, which
    /// must be the main thread on macOS.
    pub fn from_config(config: &ShortcutsConfig) -> Result<Self> {
        let store = Arc::new(JsonFileStore::open(config.resolved_store_path())?);
        let backend: Box<dyn HotkeyBackend> = if config.use_system_hotkeys {
            Box::new(GlobalHotkeyBackend::new()?)
        } else {
            Box::new(HeadlessBackend)
        };

        let mut builder = ServiceBuilder::new(store.clone(), backend)
            .key_prefix(config.key_prefix.clone())
            .enabled(config.enabled);
        if config.watch_store {
            // A missing watcher only costs live reloads
            if let Some(watcher) = StoreFileWatcher::start(store).warn_on_err() {
                builder = builder.watcher(watcher);
            }
        }
        builder.spawn()
    }

    fn send(&self, command: Command) {
        debug!(command = ?command, "Queueing shortcut command");
        if self.inner.tx.try_send(command).is_err() {
            warn!("Keyboard shortcut service stopped, command dropped");
        }
    }

    fn query<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut ShortcutRegistry) -> T + Send + 'static,
    ) -> Result<T> {
        if thread::current().id() == self.inner.owner {
            error!("Blocking shortcut query issued from the owner thread");
            return Err(ShortcutError::ReentrantQuery);
        }
        let (reply_tx, reply_rx) = async_channel::bounded(1);
        self.inner
            .tx
            .try_send(Command::Query(Box::new(move |registry: &mut ShortcutRegistry| {
                let _ = reply_tx.try_send(f(registry));
            })))
            .map_err(|_| ShortcutError::ServiceStopped)?;
        reply_rx
            .recv_blocking()
            .map_err(|_| ShortcutError::ServiceStopped)
    }

    // --- Configuration ---

    pub fn declare(&self, name: &Name) {
        self.send(Command::Declare(name.clone()));
    }

    pub fn set_shortcut(&self, shortcut: Option<Shortcut>, name: &Name) {
        self.send(Command::SetShortcut(shortcut, name.clone()));
    }

    /// Current shortcut of a name. None when unset, disabled, malformed, or on error.
    pub fn get_shortcut(&self, name: &Name) -> Option<Shortcut> {
        let name = name.clone();
        self.query(move |registry| registry.get_shortcut(&name))
            .log_err()
            .flatten()
    }

    pub fn reset(&self, names: &[Name]) {
        self.send(Command::Reset(names.to_vec()));
    }

    pub fn reset_all(&self) {
        self.send(Command::ResetAll);
    }

    /// Swap the backing store. Existing data is not migrated.
    pub fn set_store(&self, store: Arc<dyn SettingsStore>) {
        self.send(Command::SetStore(store));
    }

    /// Names whose persisted configuration changed, from any writer.
    pub fn subscribe_changes(&self) -> Receiver<Name> {
        let (tx, rx) = async_channel::unbounded();
        self.send(Command::WatchChanges(tx));
        rx
    }

    // --- Enable / pause ---

    pub fn enable(&self, names: &[Name]) {
        self.send(Command::Enable(names.to_vec()));
    }

    pub fn disable(&self, names: &[Name]) {
        self.send(Command::Disable(names.to_vec()));
    }

    pub fn try_enable(&self, name: &Name) -> Result<Shortcut> {
        let name = name.clone();
        self.query(move |registry| registry.try_enable(&name))?
    }

    pub fn is_enabled(&self, name: &Name) -> bool {
        let name = name.clone();
        self.query(move |registry| registry.is_enabled(&name))
            .log_err()
            .unwrap_or(false)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.send(Command::SetEnabled(enabled));
    }

    pub fn is_globally_enabled(&self) -> bool {
        self.query(|registry| registry.is_globally_enabled())
            .log_err()
            .unwrap_or(false)
    }

    pub fn set_paused(&self, paused: bool) {
        self.send(Command::SetPaused(paused));
    }

    pub fn is_paused(&self) -> bool {
        self.query(|registry| registry.is_paused())
            .log_err()
            .unwrap_or(false)
    }

    // --- Listeners ---

    pub fn on_key_down(
        &self,
        name: &Name,
        handler: impl Fn() + Send + Sync + 'static,
    ) -> ListenerId {
        self.add_handler(name, EventKind::KeyDown, Arc::new(handler))
    }

    pub fn on_key_up(&self, name: &Name, handler: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.add_handler(name, EventKind::KeyUp, Arc::new(handler))
    }

    fn add_handler(&self, name: &Name, kind: EventKind, handler: Handler) -> ListenerId {
        let id = self.inner.ids.next();
        self.send(Command::AddHandler {
            id,
            name: name.clone(),
            kind,
            handler,
        });
        id
    }

    /// Every key-down and key-up of a name until the subscription is dropped.
    pub fn events(&self, name: &Name) -> EventSubscription {
        self.subscribe(name, None)
    }

    /// Events of one kind only.
    pub fn events_filtered(&self, name: &Name, kind: EventKind) -> EventSubscription {
        self.subscribe(name, Some(kind))
    }

    fn subscribe(&self, name: &Name, filter: Option<EventKind>) -> EventSubscription {
        let id = self.inner.ids.next();
        let (tx, rx) = async_channel::unbounded();
        self.send(Command::Subscribe {
            id,
            name: name.clone(),
            filter,
            events: tx,
        });
        EventSubscription {
            id,
            events: rx,
            commands: self.inner.tx.clone(),
        }
    }

    /// Remove one listener by id, durable or subscription.
    pub fn remove_listener(&self, id: ListenerId) {
        self.send(Command::RemoveListener(id));
    }

    /// Remove a name's durable handlers. Subscriptions are unaffected.
    pub fn remove_handler(&self, name: &Name) {
        self.send(Command::RemoveHandler(name.clone()));
    }

    pub fn remove_all_handlers(&self) {
        self.send(Command::RemoveAllHandlers);
    }

    // --- OS side ---

    pub fn set_menu_open(&self, open: bool) {
        self.send(Command::SetMenuOpen(open));
    }

    /// Adapter for the host's menu-tracking notifications.
    pub fn menu_tracker(&self) -> MenuTracker {
        MenuTracker::new(self.clone())
    }

    /// Feed key events from a host-side monitor, e.g. one that stays live while a menu
    /// is tracking. Events pass the same delivery-mode filter as the backend's.
    pub fn event_sink(&self) -> OsEventSink {
        os_event_sink(&self.inner.tx)
    }

    pub fn registered_shortcuts(&self) -> Vec<Shortcut> {
        self.query(|registry| registry.registered_shortcuts())
            .log_err()
            .unwrap_or_default()
    }

    pub fn unregister_all(&self) {
        self.send(Command::UnregisterAll);
    }

    /// Stop the owner thread and release every OS registration.
    pub fn shutdown(&self) {
        self.inner.stop();
    }
}

/// A cancellable stream of one name's events.
///
/// Dropping the subscription (or calling `cancel`) removes the listener on the owner
/// thread, unregistering the OS hotkey if nothing else listens for it.
pub struct EventSubscription {
    id: ListenerId,
    events: Receiver<ShortcutEvent>,
    commands: Sender<Command>,
}

impl EventSubscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event. None once the service has stopped.
    pub async fn recv(&self) -> Option<ShortcutEvent> {
        self.events.recv().await.ok()
    }

    pub fn recv_blocking(&self) -> Option<ShortcutEvent> {
        self.events.recv_blocking().ok()
    }

    pub fn try_recv(&self) -> Option<ShortcutEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        debug!(listener = %self.id, "Cancelling event subscription");
        let _ = self.commands.try_send(Command::RemoveListener(self.id));
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
