use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::protocol::PendingRedirect;
use crate::shortcuts::ShortcutRegistry;

/// Process-wide mutable state, managed by Tauri and mutated only through
/// the registry/session APIs.
pub struct AppState {
    /// The shortcut registry owning the active mapping and OS bindings.
    pub registry: Mutex<ShortcutRegistry>,
    /// Redirect buffered until the main window is ready to receive it.
    pub pending_redirect: Mutex<PendingRedirect>,
    /// Set once the main window exists; redirects arriving earlier are buffered.
    pub window_ready: AtomicBool,
}

impl AppState {
    pub fn new(registry: ShortcutRegistry) -> Self {
        Self {
            registry: Mutex::new(registry),
            pending_redirect: Mutex::new(PendingRedirect::default()),
            window_ready: AtomicBool::new(false),
        }
    }
}
