use super::*;
use crate::bridge::{DeliveryMode, EventRelay, EventSource};
use crate::shortcuts::to_hotkey;
use crate::store::MemoryStore;
use global_hotkey::{GlobalHotKeyEvent, HotKeyState};
use std::collections::HashSet;
use std::sync::mpsc;
use std::time::Duration;

/// Backend that records registrations and hands its event sink to the test.
#[derive(Clone, Default)]
struct InjectingBackend {
    registered: Arc<Mutex<HashSet<Shortcut>>>,
    sink: Arc<Mutex<Option<OsEventSink>>>,
}

impl HotkeyBackend for InjectingBackend {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        self.registered.lock().insert(shortcut.clone());
        Ok(())
    }

    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
        self.registered.lock().remove(shortcut);
        Ok(())
    }

    fn start(&mut self, sink: OsEventSink) -> Result<()> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }
}

impl InjectingBackend {
    fn fire(&self, source: EventSource, shortcut: &Shortcut, kind: EventKind) {
        let sink = self.sink.lock().clone().expect("backend started");
        assert!(sink.deliver(OsEvent {
            source,
            shortcut: shortcut.clone(),
            kind,
        }));
    }

    fn press(&self, shortcut: &Shortcut) {
        self.fire(EventSource::Standard, shortcut, EventKind::KeyDown);
    }

    fn release(&self, shortcut: &Shortcut) {
        self.fire(EventSource::Standard, shortcut, EventKind::KeyUp);
    }

    fn has(&self, shortcut: &Shortcut) -> bool {
        self.registered.lock().contains(shortcut)
    }
}

/// Backend with one event stream, translated the way `GlobalHotkeyBackend` does it.
#[derive(Clone, Default)]
struct SingleStreamBackend {
    relay: EventRelay,
    sink: Arc<Mutex<Option<OsEventSink>>>,
}

impl HotkeyBackend for SingleStreamBackend {
    fn register(&mut self, shortcut: &Shortcut) -> Result<()> {
        let hotkey = to_hotkey(shortcut).expect("mappable shortcut");
        self.relay.insert(hotkey.id(), shortcut.clone());
        Ok(())
    }

    fn unregister(&mut self, shortcut: &Shortcut) -> Result<()> {
        let hotkey = to_hotkey(shortcut).expect("mappable shortcut");
        self.relay.remove(hotkey.id());
        Ok(())
    }

    fn start(&mut self, sink: OsEventSink) -> Result<()> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn delivery_mode_changed(&mut self, mode: DeliveryMode) {
        self.relay.set_mode(mode);
    }
}

impl SingleStreamBackend {
    fn fire(&self, shortcut: &Shortcut, state: HotKeyState) {
        let id = to_hotkey(shortcut).expect("mappable shortcut").id();
        let Some(event) = self.relay.translate(GlobalHotKeyEvent { id, state }) else {
            return;
        };
        let sink = self.sink.lock().clone().expect("backend started");
        assert!(sink.deliver(event));
    }
}

fn spawn() -> (KeyboardShortcuts, InjectingBackend, Arc<MemoryStore>) {
    let backend = InjectingBackend::default();
    let store = Arc::new(MemoryStore::new());
    let service = KeyboardShortcuts::builder(store.clone(), Box::new(backend.clone()))
        .spawn()
        .unwrap();
    (service, backend, store)
}

/// Round-trips through the owner thread so every queued command has run.
fn settle(service: &KeyboardShortcuts) {
    service.registered_shortcuts();
}

fn sc(s: &str) -> Shortcut {
    Shortcut::parse(s).unwrap()
}

fn toggle() -> Name {
    Name::with_default("toggle", sc("cmd+u"))
}

#[test]
fn toggle_scenario_through_service() {
    let (service, os, _) = spawn();
    let (tx, rx) = mpsc::channel();
    service.declare(&toggle());
    service.on_key_down(&toggle(), move || {
        let _ = tx.send(());
    });
    settle(&service);
    assert!(os.has(&sc("cmd+u")));

    os.press(&sc("cmd+u"));
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    service.set_shortcut(None, &toggle());
    settle(&service);
    assert!(!os.has(&sc("cmd+u")));
    os.press(&sc("cmd+u"));
    settle(&service);
    assert!(rx.try_recv().is_err());

    service.shutdown();
}

#[test]
fn subscription_receives_until_dropped() {
    let (service, os, _) = spawn();
    service.declare(&toggle());
    let subscription = service.events(&toggle());
    let (tx, rx) = mpsc::channel();
    service.on_key_up(&toggle(), move || {
        let _ = tx.send(());
    });
    settle(&service);

    os.release(&sc("cmd+u"));
    let event = subscription.recv_blocking().unwrap();
    assert_eq!(event.kind, EventKind::KeyUp);
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    subscription.cancel();
    settle(&service);
    os.release(&sc("cmd+u"));
    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(os.has(&sc("cmd+u")));

    service.remove_handler(&toggle());
    settle(&service);
    assert!(!os.has(&sc("cmd+u")));
}

#[test]
fn filtered_subscription_through_service() {
    let (service, os, _) = spawn();
    service.declare(&toggle());
    let downs = service.events_filtered(&toggle(), EventKind::KeyDown);
    settle(&service);

    os.release(&sc("cmd+u"));
    os.press(&sc("cmd+u"));
    settle(&service);

    assert_eq!(downs.try_recv().unwrap().kind, EventKind::KeyDown);
    assert!(downs.try_recv().is_none());
}

#[test]
fn queries_reflect_state() {
    let (service, _, store) = spawn();
    let name = Name::new("search");
    assert_eq!(service.get_shortcut(&name), None);

    service.set_shortcut(Some(sc("ctrl+space")), &name);
    assert_eq!(service.get_shortcut(&name), Some(sc("ctrl+space")));
    assert!(store.get("KeyboardShortcuts_search").is_some());

    assert!(service.is_globally_enabled());
    service.set_enabled(false);
    assert!(!service.is_globally_enabled());
    service.set_paused(true);
    assert!(service.is_paused());

    assert!(matches!(
        service.try_enable(&Name::new("unset")),
        Err(ShortcutError::NotConfigured { .. })
    ));
}

#[test]
fn external_store_change_reregisters() {
    let (service, os, store) = spawn();
    let changes = service.subscribe_changes();
    service.declare(&toggle());
    service.on_key_down(&toggle(), || {});
    settle(&service);

    store
        .set("KeyboardShortcuts_toggle", &sc("alt+f2").to_json().unwrap())
        .unwrap();
    settle(&service);

    assert!(os.has(&sc("alt+f2")));
    assert!(!os.has(&sc("cmd+u")));
    assert_eq!(changes.recv_blocking().unwrap(), toggle());
}

#[test]
fn menu_tracker_switches_delivery() {
    let (service, os, _) = spawn();
    let (tx, rx) = mpsc::channel();
    service.declare(&toggle());
    service.on_key_down(&toggle(), move || {
        let _ = tx.send(());
    });
    let tracker = service.menu_tracker();

    tracker.menu_did_open();
    tracker.menu_did_open();
    assert!(tracker.is_open());
    settle(&service);

    os.press(&sc("cmd+u"));
    settle(&service);
    assert!(rx.try_recv().is_err());

    os.fire(EventSource::MenuTracking, &sc("cmd+u"), EventKind::KeyDown);
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    tracker.menu_did_close();
    assert!(!tracker.is_open());
}

#[test]
fn blocking_query_from_handler_is_refused() {
    let (service, os, _) = spawn();
    let (tx, rx) = mpsc::channel();
    let inner = service.clone();
    service.declare(&toggle());
    service.on_key_down(&toggle(), move || {
        let _ = tx.send(inner.try_enable(&toggle()));
    });
    settle(&service);

    os.press(&sc("cmd+u"));
    let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(matches!(result, Err(ShortcutError::ReentrantQuery)));

    service.shutdown();
}

#[test]
fn shutdown_releases_registrations() {
    let (service, os, _) = spawn();
    service.declare(&toggle());
    service.on_key_down(&toggle(), || {});
    settle(&service);
    assert!(os.has(&sc("cmd+u")));

    service.shutdown();
    assert!(!os.has(&sc("cmd+u")));
    assert_eq!(service.get_shortcut(&toggle()), None);
    assert!(matches!(
        service.try_enable(&toggle()),
        Err(ShortcutError::ServiceStopped)
    ));
}

#[test]
fn shortcuts_keep_firing_while_menu_is_open() {
    let backend = SingleStreamBackend::default();
    let service =
        KeyboardShortcuts::builder(Arc::new(MemoryStore::new()), Box::new(backend.clone()))
            .spawn()
            .unwrap();
    let (tx, rx) = mpsc::channel();
    service.declare(&toggle());
    let events = service.events(&toggle());
    service.on_key_down(&toggle(), move || {
        let _ = tx.send(());
    });
    let tracker = service.menu_tracker();
    settle(&service);

    // Held when the menu opens, released while it is open
    backend.fire(&sc("cmd+u"), HotKeyState::Pressed);
    tracker.menu_did_open();
    settle(&service);
    backend.fire(&sc("cmd+u"), HotKeyState::Released);

    backend.fire(&sc("cmd+u"), HotKeyState::Pressed);
    backend.fire(&sc("cmd+u"), HotKeyState::Released);
    tracker.menu_did_close();
    settle(&service);
    backend.fire(&sc("cmd+u"), HotKeyState::Pressed);
    settle(&service);

    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }
    let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv())
        .map(|event| event.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::KeyDown,
            EventKind::KeyUp,
            EventKind::KeyDown,
            EventKind::KeyUp,
            EventKind::KeyDown,
        ]
    );
    service.shutdown();
}

#[test]
fn host_monitor_feeds_menu_tracking_events() {
    let service =
        KeyboardShortcuts::builder(Arc::new(MemoryStore::new()), Box::new(HeadlessBackend))
            .spawn()
            .unwrap();
    let (tx, rx) = mpsc::channel();
    service.declare(&toggle());
    service.on_key_down(&toggle(), move || {
        let _ = tx.send(());
    });
    service.menu_tracker().menu_did_open();
    settle(&service);

    let monitor = service.event_sink();
    assert!(monitor.deliver(OsEvent {
        source: EventSource::MenuTracking,
        shortcut: sc("cmd+u"),
        kind: EventKind::KeyDown,
    }));
    rx.recv_timeout(Duration::from_secs(2)).unwrap();

    // The standard mechanism is ignored while the menu is tracking
    assert!(monitor.deliver(OsEvent {
        source: EventSource::Standard,
        shortcut: sc("cmd+u"),
        kind: EventKind::KeyDown,
    }));
    settle(&service);
    assert!(rx.try_recv().is_err());
    service.shutdown();
}
