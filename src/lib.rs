mod commands;
mod credentials;
mod protocol;
mod session;
mod settings;
mod shortcuts;
mod spotify;
mod state;

#[cfg(test)]
mod tests;

use session::Session;

#[cfg(desktop)]
use settings::ShortcutMapping;

#[cfg(desktop)]
use tauri::AppHandle;

#[cfg(desktop)]
use std::sync::atomic::Ordering;

#[cfg(desktop)]
use std::sync::Arc;

#[cfg(desktop)]
use tauri::{Emitter, Listener, Manager};

#[cfg(desktop)]
use tauri_plugin_store::StoreExt;

#[cfg(desktop)]
use credentials::{CaptureOutcome, CredentialStore};

#[cfg(desktop)]
use settings::{
    ACCESS_TOKEN_STORE_KEY, SETTINGS_STORE_FILE, SHORTCUTS_STORE_KEY, TOKEN_EXPIRATION_STORE_KEY,
};

#[cfg(desktop)]
use shortcuts::{ShortcutRegistry, TauriShortcutBackend};

#[cfg(desktop)]
use spotify::{PlaybackClient, PlaybackError};

#[cfg(desktop)]
use state::AppState;

/// Helper to read a setting from the store with a default fallback
#[cfg(desktop)]
fn get_setting_from_store<T: serde::de::DeserializeOwned>(
    app: &AppHandle,
    key: &str,
    default: T,
) -> T {
    app.store(SETTINGS_STORE_FILE)
        .ok()
        .and_then(|store| store.get(key))
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(default)
}

/// Seed `settings.json` with platform defaults for missing keys so the
/// frontend and backend agree on the effective mapping from the first run.
/// Existing values are never overwritten.
#[cfg(desktop)]
fn ensure_default_settings(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    let store = app.store(SETTINGS_STORE_FILE)?;

    let missing = matches!(
        store.get(SHORTCUTS_STORE_KEY),
        None | Some(serde_json::Value::Null)
    );
    if missing {
        store.set(
            SHORTCUTS_STORE_KEY.to_string(),
            serde_json::to_value(ShortcutMapping::default())?,
        );
        if let Err(e) = store.save() {
            log::warn!("Failed to save seeded default shortcuts: {}", e);
        }
    }

    Ok(())
}

/// The persisted mapping, falling back to platform defaults when the store
/// is empty or holds something invalid (e.g. a hand-edited duplicate).
#[cfg(desktop)]
fn load_initial_mapping(app: &AppHandle) -> ShortcutMapping {
    let mapping: ShortcutMapping =
        get_setting_from_store(app, SHORTCUTS_STORE_KEY, ShortcutMapping::default());
    if let Err(e) = shortcuts::validate_mapping(&mapping) {
        log::warn!("Persisted shortcuts are invalid ({}); using defaults", e);
        return ShortcutMapping::default();
    }
    mapping
}

/// Rebuild the credential store from the persisted token/expiration pair.
/// The expiration key historically held either a number or a numeric string.
#[cfg(desktop)]
fn load_credentials(app: &AppHandle) -> CredentialStore {
    let token: Option<String> = get_setting_from_store(app, ACCESS_TOKEN_STORE_KEY, None);
    let raw_expiration: serde_json::Value =
        get_setting_from_store(app, TOKEN_EXPIRATION_STORE_KEY, serde_json::Value::Null);
    let expiration_ms = match raw_expiration {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };
    CredentialStore::from_persisted(token, expiration_ms, chrono::Utc::now())
}

/// Write (or clear) the persisted token/expiration pair.
#[cfg(desktop)]
fn persist_credential(app: &AppHandle, persisted: Option<(String, i64)>) {
    let Ok(store) = app.store(SETTINGS_STORE_FILE) else {
        log::warn!("Settings store unavailable; credential not persisted");
        return;
    };
    match persisted {
        Some((token, expiration_ms)) => {
            store.set(
                ACCESS_TOKEN_STORE_KEY.to_string(),
                serde_json::Value::from(token),
            );
            store.set(
                TOKEN_EXPIRATION_STORE_KEY.to_string(),
                serde_json::Value::from(expiration_ms),
            );
        }
        None => {
            store.delete(ACCESS_TOKEN_STORE_KEY);
            store.delete(TOKEN_EXPIRATION_STORE_KEY);
        }
    }
    if let Err(e) = store.save() {
        log::warn!("Failed to save credential to store: {}", e);
    }
}

/// Route a fired key combination to its logical action.
/// Called from the global-shortcut backend's per-shortcut handler.
#[cfg(desktop)]
pub(crate) fn handle_shortcut_fired(app: &AppHandle, accelerator: &str) {
    let action = {
        let state = app.state::<AppState>();
        let registry = state.registry.lock().unwrap();
        registry.action_for(accelerator)
    };
    match action {
        Some(action) => app.state::<Session>().dispatch_action(action),
        None => log::warn!("Unknown shortcut fired: {}", accelerator),
    }
}

/// Entry point for an incoming custom-scheme redirect, wherever it came from
/// (launch argument, forwarded second launch, or deep-link activation).
///
/// Before the main window is ready, the redirect is buffered (single slot,
/// last wins) and replayed once on window ready.
#[cfg(desktop)]
pub(crate) fn handle_redirect(app: &AppHandle, uri: &str) {
    let state = app.state::<AppState>();
    if !state.window_ready.load(Ordering::SeqCst) {
        log::info!("Main window not ready; buffering redirect");
        state.pending_redirect.lock().unwrap().buffer(uri.to_string());
        return;
    }
    drop(state);
    deliver_redirect(app, uri);
}

#[cfg(desktop)]
fn deliver_redirect(app: &AppHandle, uri: &str) {
    let params = match protocol::parse(uri) {
        Ok(params) => params,
        Err(e) => {
            // Expected occasionally (stray launches, truncated URIs).
            log::warn!("Dropping redirect: {}", e);
            return;
        }
    };

    let session = app.state::<Session>();
    match session.capture_redirect(&params) {
        Ok(CaptureOutcome::Stored) => {
            if let Some(token) = session.current_token() {
                let _ = app.emit("spotify-auth-success", token);
            }
        }
        Ok(CaptureOutcome::NoToken) => {}
        Err(e) => log::warn!("Dropping redirect: {}", e),
    }
}

/// Flip the window-ready flag and replay the buffered redirect, if any.
#[cfg(desktop)]
fn mark_window_ready(app: &AppHandle) {
    let pending = {
        let state = app.state::<AppState>();
        state.window_ready.store(true, Ordering::SeqCst);
        let pending = state.pending_redirect.lock().unwrap().take();
        pending
    };
    if let Some(uri) = pending {
        log::info!("Replaying buffered redirect now that the window is ready");
        deliver_redirect(app, &uri);
    }
}

/// Bring the main window to the foreground, restoring it if minimized.
#[cfg(desktop)]
fn focus_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window("main") {
        if window.is_minimized().unwrap_or(false) {
            let _ = window.unminimize();
        }
        let _ = window.show();
        let _ = window.set_focus();
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut builder = tauri::Builder::default();

    #[cfg(desktop)]
    {
        // Must be the first plugin: a second launch forwards its arguments
        // here and exits before doing anything else.
        builder = builder.plugin(tauri_plugin_single_instance::init(|app, args, _cwd| {
            log::info!("Second launch detected; focusing existing window");
            focus_main_window(app);
            if let Some(uri) = protocol::find_redirect_in_args(&args) {
                handle_redirect(app, &uri);
            }
        }));
        builder = builder.plugin(tauri_plugin_global_shortcut::Builder::new().build());
    }

    builder
        .plugin(tauri_plugin_deep_link::init())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_store::Builder::new().build())
        .invoke_handler(tauri::generate_handler![
            commands::settings::get_shortcuts,
            commands::settings::set_shortcuts,
            commands::settings::register_shortcuts,
            commands::settings::unregister_shortcuts,
            commands::auth::login,
            commands::auth::logout,
            commands::auth::current_token,
        ])
        .setup(|app| {
            #[cfg(desktop)]
            {
                // Seed defaults before anything reads the store.
                ensure_default_settings(app.handle())?;

                // Session (credential store + subscriptions)
                let session = Session::new(load_credentials(app.handle()));
                app.manage(session);

                // Keep the persisted token/expiration pair in sync with the
                // in-memory credential.
                let persist_handle = app.handle().clone();
                app.state::<Session>().on_credential_change(move |credential| {
                    let persisted = credential
                        .map(|c| (c.access_token.clone(), c.expires_at.timestamp_millis()));
                    persist_credential(&persist_handle, persisted);
                });

                // Logical actions: notify the frontend and issue the player
                // call fire-and-forget, so a slow call never delays the next
                // hotkey event.
                let playback = Arc::new(PlaybackClient::new());
                let action_handle = app.handle().clone();
                app.state::<Session>().on_action(move |action| {
                    let _ = action_handle.emit(action.event_name(), ());

                    let Some(token) = action_handle.state::<Session>().current_token() else {
                        log::info!("{}: no valid token; re-authorization required", action);
                        return;
                    };
                    let client = Arc::clone(&playback);
                    let call_handle = action_handle.clone();
                    tauri::async_runtime::spawn(async move {
                        match client.perform(action, &token).await {
                            Ok(()) => {}
                            Err(PlaybackError::Unauthorized) => {
                                log::warn!("{}: token rejected; clearing credential", action);
                                call_handle.state::<Session>().invalidate();
                            }
                            Err(e) => log::error!("{}: Spotify call failed: {}", action, e),
                        }
                    });
                });

                // Shortcut registry with the persisted (or default) mapping.
                let backend = TauriShortcutBackend::new(app.handle().clone());
                let registry = ShortcutRegistry::new(Box::new(backend), load_initial_mapping(app.handle()));
                app.manage(AppState::new(registry));

                let failures = app
                    .state::<AppState>()
                    .registry
                    .lock()
                    .unwrap()
                    .activate();
                if failures.is_empty() {
                    log::info!("Global shortcuts registered");
                } else {
                    log::warn!(
                        "Global shortcuts registered with {} unbound action(s)",
                        failures.len()
                    );
                }

                // Legacy event surface, preserved verbatim for the frontend.
                let set_handle = app.handle().clone();
                app.listen("set-shortcuts", move |event| {
                    match serde_json::from_str::<ShortcutMapping>(event.payload()) {
                        Ok(mapping) => {
                            if let Err(e) = commands::settings::apply_mapping(&set_handle, mapping)
                            {
                                log::warn!("Rejected shortcut mapping: {}", e);
                            }
                        }
                        Err(e) => log::warn!("Ignoring malformed set-shortcuts payload: {}", e),
                    }
                });
                let get_handle = app.handle().clone();
                app.listen("get-shortcuts", move |_event| {
                    let mapping = {
                        let state = get_handle.state::<AppState>();
                        let registry = state.registry.lock().unwrap();
                        registry.active_mapping().clone()
                    };
                    commands::settings::emit_current_shortcuts(&get_handle, &mapping);
                });

                // Register the custom scheme with the OS before any
                // authorization flow can start. Failure is non-fatal: the app
                // keeps working for everything that doesn't need a redirect.
                use tauri_plugin_deep_link::DeepLinkExt;
                if let Err(e) = app.deep_link().register(protocol::CUSTOM_SCHEME) {
                    log::warn!(
                        "Could not register the {}:// scheme with the OS: {}",
                        protocol::CUSTOM_SCHEME,
                        e
                    );
                }

                // Redirects arriving while we are running (macOS activation path).
                let open_handle = app.handle().clone();
                app.deep_link().on_open_url(move |event| {
                    for url in event.urls() {
                        handle_redirect(&open_handle, url.as_ref());
                    }
                });

                // A redirect may also have launched this very process.
                if let Ok(Some(urls)) = app.deep_link().get_current() {
                    // Only the newest redirect is meaningful.
                    if let Some(url) = urls.last() {
                        handle_redirect(app.handle(), url.as_ref());
                    }
                }

                // Windows from the config exist by now; release anything we
                // buffered during startup.
                mark_window_ready(app.handle());
            }

            #[cfg(not(desktop))]
            {
                app.manage(Session::new(crate::credentials::CredentialStore::new()));
            }

            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|_app, _event| {
            #[cfg(desktop)]
            if let tauri::RunEvent::Exit = _event {
                // Terminal transition: never leak hotkey bindings past the
                // process lifetime, whatever state the registry is in.
                if let Some(state) = _app.try_state::<AppState>() {
                    state.registry.lock().unwrap().unregister_all();
                }
            }
        });
}
