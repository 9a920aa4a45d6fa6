//! Spotify Web API playback client.
//!
//! One call per logical action; every call is fire-and-forget from the
//! session's point of view. A 401 is reported distinctly so the caller can
//! invalidate the stored credential and prompt re-authorization.

use std::time::Duration;

use crate::settings::Action;

pub const CLIENT_ID: &str = "7d1e55e578874bf39f191c0425cca5d9";
pub const REDIRECT_URI: &str = "http://localhost:1213/";
pub const AUTH_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
pub const SCOPES: &str = "user-modify-playback-state user-read-playback-state";

const API_BASE: &str = "https://api.spotify.com/v1";

/// Volume percent applied by the volume-up / volume-down actions.
const VOLUME_UP_PERCENT: u8 = 75;
const VOLUME_DOWN_PERCENT: u8 = 25;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Spotify rejected the bearer token; the credential should be invalidated.
    #[error("Spotify rejected the access token (HTTP 401)")]
    Unauthorized,

    #[error("Spotify API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
}

/// Build the implicit-grant authorize URL opened in the system browser.
pub fn authorize_url() -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&scope={}&response_type=token&show_dialog=true",
        AUTH_ENDPOINT,
        CLIENT_ID,
        REDIRECT_URI,
        SCOPES.replace(' ', "%20"),
    )
}

/// Thin client over the player endpoints the shortcut actions drive.
pub struct PlaybackClient {
    client: reqwest::Client,
    api_base: String,
}

impl Default for PlaybackClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_base: API_BASE.to_string(),
        }
    }

    /// Client pointed at a custom base URL (used by tests).
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn with_base(api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base,
        }
    }

    /// Issue the player call for a logical action.
    pub async fn perform(&self, action: Action, token: &str) -> Result<(), PlaybackError> {
        let request = match action {
            Action::NextTrack => self
                .client
                .post(format!("{}/me/player/next", self.api_base)),
            Action::PlayTrack => self
                .client
                .put(format!("{}/me/player/play", self.api_base)),
            Action::PauseTrack => self
                .client
                .put(format!("{}/me/player/pause", self.api_base)),
            Action::VolumeUp => self.client.put(format!(
                "{}/me/player/volume?volume_percent={}",
                self.api_base, VOLUME_UP_PERCENT
            )),
            Action::VolumeDown => self.client.put(format!(
                "{}/me/player/volume?volume_percent={}",
                self.api_base, VOLUME_DOWN_PERCENT
            )),
        };

        let response = request
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            log::debug!("{}: Spotify call succeeded ({})", action, status);
            return Ok(());
        }

        if status.as_u16() == 401 {
            return Err(PlaybackError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PlaybackError::Api {
            status: status.as_u16(),
            body,
        })
    }
}
