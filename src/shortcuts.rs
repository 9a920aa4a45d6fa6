//! Global-shortcut registry and mapping reconciliation.
//!
//! The OS hotkey table is a machine-wide resource shared with every other
//! application. The registry tracks exactly the bindings it created and never
//! touches ones it did not; a combination already held by another app is a
//! normal partial failure, not a bug.

use serde::Serialize;
use std::collections::HashMap;

use crate::settings::{normalize_shortcut_string, Action, ShortcutMapping};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShortcutError {
    /// Two actions in a proposed mapping share the same key combination.
    /// The swap does not proceed; the previous mapping stays active.
    #[error("Shortcut \"{shortcut}\" is assigned to both {first} and {second}")]
    DuplicateShortcut {
        shortcut: String,
        first: Action,
        second: Action,
    },
}

/// One entry of a mapping that could not be bound with the OS
/// (e.g. the combination is already held by another application).
/// Reported as data; the remaining bindings stay active.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BindFailure {
    pub action: Action,
    pub shortcut: String,
    pub reason: String,
}

/// Reject a mapping in which two actions share a key combination
/// (compared in normalized form). Validation happens before any OS
/// registration, so a rejected mapping leaves the OS state untouched.
pub fn validate_mapping(mapping: &ShortcutMapping) -> Result<(), ShortcutError> {
    let mut seen: HashMap<String, Action> = HashMap::new();
    for (action, descriptor) in mapping.entries() {
        let normalized = normalize_shortcut_string(descriptor);
        if let Some(&first) = seen.get(&normalized) {
            return Err(ShortcutError::DuplicateShortcut {
                shortcut: descriptor.to_string(),
                first,
                second: action,
            });
        }
        seen.insert(normalized, action);
    }
    Ok(())
}

/// Seam to the OS global hotkey table. The production implementation wraps
/// the global-shortcut plugin; tests use an in-memory fake.
pub trait ShortcutBackend: Send {
    /// Bind a key combination. On success, returns the spelling the backend
    /// reports when the combination fires, which differs from the user's
    /// descriptor spelling ("Ctrl+3" fires as "control+Digit3").
    fn bind(&mut self, accelerator: &str) -> Result<String, String>;
    fn unbind(&mut self, accelerator: &str) -> Result<(), String>;
}

/// One binding the registry made: the user's descriptor spelling, the
/// fired-event spelling the backend reported at bind time, and the action.
#[derive(Debug)]
struct Registration {
    action: Action,
    spelling: String,
    canonical: String,
}

/// Owns the active [`ShortcutMapping`] and the OS registrations backing it.
///
/// The swap state machine is Idle -> Swapping -> Idle and never observable
/// mid-swap from outside: [`ShortcutRegistry::swap`] either rejects the new
/// mapping up front (previous mapping untouched) or commits it, reporting
/// any per-entry bind failures as data.
pub struct ShortcutRegistry {
    backend: Box<dyn ShortcutBackend>,
    /// The bindings we created. Never more than one per action.
    registered: Vec<Registration>,
    active: ShortcutMapping,
}

impl ShortcutRegistry {
    /// Create a registry with no OS registrations. `activate` (or `swap`)
    /// performs the initial registration.
    pub fn new(backend: Box<dyn ShortcutBackend>, initial: ShortcutMapping) -> Self {
        Self {
            backend,
            registered: Vec::new(),
            active: initial,
        }
    }

    /// The mapping the user chose, whether or not every entry bound.
    pub fn active_mapping(&self) -> &ShortcutMapping {
        &self.active
    }

    /// Whether this registry currently holds an OS binding for the descriptor.
    pub fn is_registered(&self, descriptor: &str) -> bool {
        let normalized = normalize_shortcut_string(descriptor);
        self.registered
            .iter()
            .any(|r| normalize_shortcut_string(&r.spelling) == normalized)
    }

    /// The action bound to a fired key combination. The backend reports
    /// fired combinations in its own spelling, so the lookup accepts both
    /// that form and the descriptor spelling.
    pub fn action_for(&self, accelerator: &str) -> Option<Action> {
        let normalized = normalize_shortcut_string(accelerator);
        self.registered
            .iter()
            .find(|r| {
                normalize_shortcut_string(&r.canonical) == normalized
                    || normalize_shortcut_string(&r.spelling) == normalized
            })
            .map(|r| r.action)
    }

    /// Register the active mapping with the OS. Individual failures do not
    /// abort the rest; each one is collected into the returned list.
    pub fn activate(&mut self) -> Vec<BindFailure> {
        let mapping = self.active.clone();
        self.register(&mapping)
    }

    fn register(&mut self, mapping: &ShortcutMapping) -> Vec<BindFailure> {
        let mut failures = Vec::new();
        for (action, descriptor) in mapping.entries() {
            if self.is_registered(descriptor) {
                // Already ours from a previous registration; re-binding
                // would make the OS report a spurious conflict.
                continue;
            }
            match self.backend.bind(descriptor) {
                Ok(canonical) => {
                    self.registered.push(Registration {
                        action,
                        spelling: descriptor.to_string(),
                        canonical,
                    });
                }
                Err(reason) => {
                    log::warn!(
                        "Could not bind {} to \"{}\": {}",
                        action,
                        descriptor,
                        reason
                    );
                    failures.push(BindFailure {
                        action,
                        shortcut: descriptor.to_string(),
                        reason,
                    });
                }
            }
        }
        failures
    }

    /// Release every binding this registry made for `mapping`. Descriptors
    /// that are not currently registered are skipped (idempotent no-op), so
    /// a binding owned by another application is never touched.
    pub fn unregister(&mut self, mapping: &ShortcutMapping) {
        for (_, descriptor) in mapping.entries() {
            let normalized = normalize_shortcut_string(descriptor);
            if let Some(index) = self
                .registered
                .iter()
                .position(|r| normalize_shortcut_string(&r.spelling) == normalized)
            {
                let registration = self.registered.swap_remove(index);
                if let Err(e) = self.backend.unbind(&registration.spelling) {
                    log::warn!("Failed to unbind \"{}\": {}", registration.spelling, e);
                }
            }
        }
    }

    /// Atomically replace the active mapping.
    ///
    /// A mapping with a duplicate descriptor is rejected and the previous
    /// mapping remains active and registered. Otherwise the old bindings are
    /// released, the new mapping becomes active, and any entries the OS
    /// refused to bind are returned for the caller to surface.
    pub fn swap(&mut self, new_mapping: ShortcutMapping) -> Result<Vec<BindFailure>, ShortcutError> {
        validate_mapping(&new_mapping)?;

        let old_mapping = std::mem::replace(&mut self.active, new_mapping.clone());
        self.unregister(&old_mapping);
        Ok(self.register(&new_mapping))
    }

    /// Terminal transition: release every binding we hold, regardless of
    /// current state. Must run at shutdown so no hotkey outlives the process.
    pub fn unregister_all(&mut self) {
        for registration in std::mem::take(&mut self.registered) {
            if let Err(e) = self.backend.unbind(&registration.spelling) {
                log::warn!(
                    "Failed to unbind \"{}\" at shutdown: {}",
                    registration.spelling,
                    e
                );
            }
        }
    }
}

// ============================================================================
// Production backend (global-shortcut plugin)
// ============================================================================

#[cfg(desktop)]
pub use desktop_backend::TauriShortcutBackend;

#[cfg(desktop)]
mod desktop_backend {
    use super::ShortcutBackend;
    use std::str::FromStr;
    use tauri::AppHandle;
    use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

    /// Binds key combinations through the global-shortcut plugin. Fired
    /// shortcuts are routed back through [`crate::handle_shortcut_fired`].
    pub struct TauriShortcutBackend {
        app: AppHandle,
    }

    impl TauriShortcutBackend {
        pub fn new(app: AppHandle) -> Self {
            Self { app }
        }
    }

    impl ShortcutBackend for TauriShortcutBackend {
        fn bind(&mut self, accelerator: &str) -> Result<String, String> {
            // Parse up front: the fired callback reports the combination via
            // `Shortcut::to_string`, with keys under their key-code names
            // ("Ctrl+3" fires as "control+Digit3"). That spelling, not the
            // descriptor, is what the registry must match against.
            let shortcut = Shortcut::from_str(accelerator).map_err(|e| e.to_string())?;
            let canonical = shortcut.to_string();
            self.app
                .global_shortcut()
                .on_shortcut(shortcut, |app, shortcut, event| {
                    if event.state == ShortcutState::Pressed {
                        crate::handle_shortcut_fired(app, &shortcut.to_string());
                    }
                })
                .map_err(|e| e.to_string())?;
            Ok(canonical)
        }

        fn unbind(&mut self, accelerator: &str) -> Result<(), String> {
            self.app
                .global_shortcut()
                .unregister(accelerator)
                .map_err(|e| e.to_string())
        }
    }
}
