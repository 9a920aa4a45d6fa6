//! Tauri commands for the shortcut configuration surface.

use tauri::AppHandle;

use crate::settings::ShortcutMapping;
use crate::shortcuts::BindFailure;

#[cfg(desktop)]
use tauri::{Emitter, Manager};

#[cfg(desktop)]
use tauri_plugin_store::StoreExt;

#[cfg(desktop)]
use crate::settings::{SETTINGS_STORE_FILE, SHORTCUTS_STORE_KEY};

#[cfg(desktop)]
use crate::state::AppState;

/// Swap the active mapping, persist it, and publish the result.
///
/// Shared by the `set_shortcuts` command and the legacy `set-shortcuts`
/// event listener. Rejection (duplicate descriptor) leaves the previous
/// mapping active and registered.
#[cfg(desktop)]
pub(crate) fn apply_mapping(
    app: &AppHandle,
    mapping: ShortcutMapping,
) -> Result<Vec<BindFailure>, String> {
    let state = app.state::<AppState>();
    let failures = state
        .registry
        .lock()
        .unwrap()
        .swap(mapping.clone())
        .map_err(|e| e.to_string())?;

    persist_shortcuts(app, &mapping);
    emit_current_shortcuts(app, &mapping);

    if !failures.is_empty() {
        log::warn!(
            "Mapping committed with {} unbound action(s): {:?}",
            failures.len(),
            failures.iter().map(|f| f.action).collect::<Vec<_>>()
        );
    }
    Ok(failures)
}

#[cfg(desktop)]
pub(crate) fn persist_shortcuts(app: &AppHandle, mapping: &ShortcutMapping) {
    let Ok(store) = app.store(SETTINGS_STORE_FILE) else {
        log::warn!("Settings store unavailable; shortcuts not persisted");
        return;
    };
    match serde_json::to_value(mapping) {
        Ok(value) => {
            store.set(SHORTCUTS_STORE_KEY.to_string(), value);
            if let Err(e) = store.save() {
                log::warn!("Failed to save shortcuts to store: {}", e);
            }
        }
        Err(e) => log::warn!("Failed to serialize shortcuts: {}", e),
    }
}

/// Publish the active mapping on the `current-shortcuts` event
/// (payload is the serialized mapping, as the frontend expects).
#[cfg(desktop)]
pub(crate) fn emit_current_shortcuts(app: &AppHandle, mapping: &ShortcutMapping) {
    match serde_json::to_string(mapping) {
        Ok(payload) => {
            let _ = app.emit("current-shortcuts", payload);
        }
        Err(e) => log::warn!("Failed to serialize current shortcuts: {}", e),
    }
}

/// Replace the active shortcut mapping. Returns the actions that could not
/// be bound (held by another application); an `Err` means the mapping was
/// rejected outright and nothing changed.
#[cfg(desktop)]
#[tauri::command]
pub async fn set_shortcuts(
    app: AppHandle,
    shortcuts: ShortcutMapping,
) -> Result<Vec<BindFailure>, String> {
    log::info!("Applying new shortcut mapping from settings UI");
    apply_mapping(&app, shortcuts)
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn set_shortcuts(
    _app: AppHandle,
    _shortcuts: ShortcutMapping,
) -> Result<Vec<BindFailure>, String> {
    Ok(Vec::new())
}

/// The currently active mapping (the one the user chose, whether or not
/// every entry bound).
#[cfg(desktop)]
#[tauri::command]
pub async fn get_shortcuts(app: AppHandle) -> Result<ShortcutMapping, String> {
    let state = app.state::<AppState>();
    let mapping = state.registry.lock().unwrap().active_mapping().clone();
    Ok(mapping)
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn get_shortcuts(_app: AppHandle) -> Result<ShortcutMapping, String> {
    Ok(ShortcutMapping::default())
}

/// Temporarily release all global shortcuts.
/// Call this before capturing a new hotkey so the active shortcuts don't
/// intercept the key presses being recorded.
#[cfg(desktop)]
#[tauri::command]
pub async fn unregister_shortcuts(app: AppHandle) -> Result<(), String> {
    log::info!("Temporarily releasing all shortcuts for hotkey capture");
    let state = app.state::<AppState>();
    state.registry.lock().unwrap().unregister_all();
    Ok(())
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn unregister_shortcuts(_app: AppHandle) -> Result<(), String> {
    Ok(())
}

/// Re-register the active mapping after a hotkey capture session.
#[cfg(desktop)]
#[tauri::command]
pub async fn register_shortcuts(app: AppHandle) -> Result<Vec<BindFailure>, String> {
    log::info!("Re-registering active shortcut mapping");
    let state = app.state::<AppState>();
    let failures = state.registry.lock().unwrap().activate();
    Ok(failures)
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn register_shortcuts(_app: AppHandle) -> Result<Vec<BindFailure>, String> {
    Ok(Vec::new())
}
