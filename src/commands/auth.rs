//! Tauri commands for the login/logout surface.

use tauri::AppHandle;

use crate::spotify;

#[cfg(desktop)]
use tauri::Manager;

#[cfg(desktop)]
use tauri_plugin_opener::OpenerExt;

#[cfg(desktop)]
use crate::session::Session;

/// Open the Spotify authorize page in the system browser. The token comes
/// back through the custom-scheme redirect, not through this command.
#[cfg(desktop)]
#[tauri::command]
pub async fn login(app: AppHandle) -> Result<(), String> {
    let url = spotify::authorize_url();
    log::info!("Opening Spotify authorization page in system browser");
    app.opener()
        .open_url(url, None::<String>)
        .map_err(|e| format!("Failed to open browser: {}", e))
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn login(_app: AppHandle) -> Result<(), String> {
    Err("Login requires a desktop environment".to_string())
}

/// The current access token, or `None` when absent/expired (which also
/// clears an expired credential).
#[cfg(desktop)]
#[tauri::command]
pub async fn current_token(app: AppHandle) -> Result<Option<String>, String> {
    let session = app.state::<Session>();
    Ok(session.current_token())
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn current_token(_app: AppHandle) -> Result<Option<String>, String> {
    Ok(None)
}

/// Drop the stored credential.
#[cfg(desktop)]
#[tauri::command]
pub async fn logout(app: AppHandle) -> Result<(), String> {
    log::info!("Logging out; clearing stored credential");
    let session = app.state::<Session>();
    session.invalidate();
    Ok(())
}

#[cfg(not(desktop))]
#[tauri::command]
pub async fn logout(_app: AppHandle) -> Result<(), String> {
    Ok(())
}
