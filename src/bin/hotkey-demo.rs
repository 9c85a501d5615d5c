//! Demo: listen for one global shortcut and print every press.
//!
//! Run with: cargo run --bin hotkey-demo -- --shortcut "cmd+shift+u" --presses 3
//!
//! The shortcut is persisted under the name `demoToggle`, so a value set by a previous
//! run (or by editing ~/.keyboard-shortcuts/shortcuts.json while the demo runs) wins
//! over `--shortcut` unless `--reset` is given.
//!
//! Note: macOS and Windows only deliver hotkey events while the main thread runs a
//! platform event loop; this demo blocks the main thread, so it is most useful on X11.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use keyboard_shortcuts::config::load_config;
use keyboard_shortcuts::{logging, EventKind, KeyboardShortcuts, Name, Shortcut};

#[derive(Parser, Debug)]
#[command(name = "hotkey-demo", about = "Print presses of a global keyboard shortcut")]
struct Args {
    /// Default shortcut for the demo name, e.g. "cmd+shift+u"
    #[arg(long, default_value = "cmd+shift+u")]
    shortcut: String,

    /// Exit after this many presses
    #[arg(long, default_value_t = 5)]
    presses: u32,

    /// Restore the default before listening
    #[arg(long)]
    reset: bool,

    /// Don't register with the OS (events never arrive; useful to inspect config)
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let _guard = logging::init();
    let args = Args::parse();

    let default = Shortcut::parse(&args.shortcut)
        .with_context(|| format!("invalid shortcut '{}'", args.shortcut))?;
    let name = Name::with_default("demoToggle", default);

    let mut config = load_config();
    if args.headless {
        config.use_system_hotkeys = false;
    }
    let shortcuts =
        KeyboardShortcuts::from_config(&config).context("failed to start shortcut service")?;

    shortcuts.declare(&name);
    if args.reset {
        shortcuts.reset(&[name.clone()]);
    }

    let changes = shortcuts.subscribe_changes();
    std::thread::spawn(move || {
        while let Ok(changed) = changes.recv_blocking() {
            println!("Configuration of '{}' changed", changed);
        }
    });

    shortcuts.on_key_up(&name, || info!("Demo shortcut released"));
    let presses = shortcuts.events_filtered(&name, EventKind::KeyDown);

    match shortcuts.get_shortcut(&name) {
        Some(active) => println!("Listening for {} ({} presses)...", active, args.presses),
        None => {
            println!("'{}' is disabled; run with --reset to restore it", name);
            return Ok(());
        }
    }
    if let Err(e) = shortcuts.try_enable(&name) {
        println!("{}", e.user_message());
        return Ok(());
    }

    for count in 1..=args.presses {
        if presses.recv_blocking().is_none() {
            break;
        }
        println!("Pressed {} ({}/{})", name, count, args.presses);
    }

    shortcuts.shutdown();
    Ok(())
}
