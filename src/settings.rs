use serde::{Deserialize, Serialize};

// ============================================================================
// STORE KEYS - Single source of truth for persisted settings
// ============================================================================

/// Store file used for all persisted settings.
pub const SETTINGS_STORE_FILE: &str = "settings.json";

/// Store key for the active shortcut mapping.
pub const SHORTCUTS_STORE_KEY: &str = "shortcuts";

/// Store key for the persisted Spotify access token.
pub const ACCESS_TOKEN_STORE_KEY: &str = "spotifyAccessToken";

/// Store key for the token expiration instant (epoch milliseconds).
pub const TOKEN_EXPIRATION_STORE_KEY: &str = "spotifyTokenExpiration";

// ============================================================================

/// The five logical playback actions a global shortcut can trigger.
///
/// Serialized names double as the event names the frontend listens on, so
/// they are preserved verbatim (including the `VolumeUP` capitalization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "nextTrack")]
    NextTrack,
    #[serde(rename = "playTrack")]
    PlayTrack,
    #[serde(rename = "pauseTrack")]
    PauseTrack,
    #[serde(rename = "VolumeUP")]
    VolumeUp,
    #[serde(rename = "VolumeDown")]
    VolumeDown,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::NextTrack,
        Action::PlayTrack,
        Action::PauseTrack,
        Action::VolumeUp,
        Action::VolumeDown,
    ];

    /// Event name emitted to the frontend when this action fires.
    pub fn event_name(self) -> &'static str {
        match self {
            Action::NextTrack => "nextTrack",
            Action::PlayTrack => "playTrack",
            Action::PauseTrack => "pauseTrack",
            Action::VolumeUp => "VolumeUP",
            Action::VolumeDown => "VolumeDown",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Normalize a shortcut string for comparison (handles "ctrl" vs "control"
/// and the various names for the super/command key).
pub fn normalize_shortcut_string(s: &str) -> String {
    s.to_lowercase()
        .replace("ctrl", "control")
        .replace("command", "super")
        .replace("cmd", "super")
        .replace("meta", "super")
        .replace("win", "super")
}

/// The active set of key combinations, one per logical action.
///
/// Field names are preserved verbatim in serialized form: this struct
/// round-trips through the `shortcuts` store key and the
/// `set-shortcuts`/`current-shortcuts` event payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortcutMapping {
    #[serde(rename = "nextTrack")]
    pub next_track: String,
    #[serde(rename = "playTrack")]
    pub play_track: String,
    #[serde(rename = "pauseTrack")]
    pub pause_track: String,
    #[serde(rename = "VolumeDown")]
    pub volume_down: String,
    #[serde(rename = "VolumeUP")]
    pub volume_up: String,
}

impl Default for ShortcutMapping {
    fn default() -> Self {
        Self::platform_defaults(cfg!(target_os = "macos"))
    }
}

impl ShortcutMapping {
    /// Platform-appropriate defaults: `Command+N` on macOS, `Ctrl+N` elsewhere.
    pub fn platform_defaults(is_mac: bool) -> Self {
        let modifier = if is_mac { "Command" } else { "Ctrl" };
        Self {
            next_track: format!("{}+3", modifier),
            play_track: format!("{}+5", modifier),
            pause_track: format!("{}+4", modifier),
            volume_down: format!("{}+1", modifier),
            volume_up: format!("{}+2", modifier),
        }
    }

    /// The descriptor assigned to a logical action.
    pub fn get(&self, action: Action) -> &str {
        match action {
            Action::NextTrack => &self.next_track,
            Action::PlayTrack => &self.play_track,
            Action::PauseTrack => &self.pause_track,
            Action::VolumeUp => &self.volume_up,
            Action::VolumeDown => &self.volume_down,
        }
    }

    pub fn set(&mut self, action: Action, descriptor: String) {
        match action {
            Action::NextTrack => self.next_track = descriptor,
            Action::PlayTrack => self.play_track = descriptor,
            Action::PauseTrack => self.pause_track = descriptor,
            Action::VolumeUp => self.volume_up = descriptor,
            Action::VolumeDown => self.volume_down = descriptor,
        }
    }

    /// All (action, descriptor) pairs in a fixed order.
    pub fn entries(&self) -> impl Iterator<Item = (Action, &str)> {
        Action::ALL.into_iter().map(move |a| (a, self.get(a)))
    }

    /// Find the action bound to a key combination, comparing normalized forms.
    pub fn action_for(&self, shortcut: &str) -> Option<Action> {
        let normalized = normalize_shortcut_string(shortcut);
        Action::ALL
            .into_iter()
            .find(|a| normalize_shortcut_string(self.get(*a)) == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_mac_defaults() {
        let mapping = ShortcutMapping::platform_defaults(false);
        assert_eq!(mapping.next_track, "Ctrl+3");
        assert_eq!(mapping.play_track, "Ctrl+5");
        assert_eq!(mapping.pause_track, "Ctrl+4");
        assert_eq!(mapping.volume_down, "Ctrl+1");
        assert_eq!(mapping.volume_up, "Ctrl+2");
    }

    #[test]
    fn test_mac_defaults_use_command() {
        let mapping = ShortcutMapping::platform_defaults(true);
        assert_eq!(mapping.next_track, "Command+3");
        assert_eq!(mapping.volume_up, "Command+2");
    }

    #[test]
    fn test_serialized_field_names_are_verbatim() {
        let mapping = ShortcutMapping::platform_defaults(false);
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["nextTrack"], "Ctrl+3");
        assert_eq!(json["playTrack"], "Ctrl+5");
        assert_eq!(json["pauseTrack"], "Ctrl+4");
        assert_eq!(json["VolumeDown"], "Ctrl+1");
        assert_eq!(json["VolumeUP"], "Ctrl+2");
    }

    #[test]
    fn test_mapping_round_trips_through_store_value() {
        let mapping = ShortcutMapping::platform_defaults(true);
        let value = serde_json::to_value(&mapping).unwrap();
        let back: ShortcutMapping = serde_json::from_value(value).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_action_for_ignores_case_and_modifier_aliases() {
        let mapping = ShortcutMapping::platform_defaults(false);
        assert_eq!(mapping.action_for("ctrl+3"), Some(Action::NextTrack));
        assert_eq!(mapping.action_for("Control+5"), Some(Action::PlayTrack));
        assert_eq!(mapping.action_for("Ctrl+9"), None);

        let mac = ShortcutMapping::platform_defaults(true);
        assert_eq!(mac.action_for("super+3"), Some(Action::NextTrack));
        assert_eq!(mac.action_for("Cmd+2"), Some(Action::VolumeUp));
    }

    #[test]
    fn test_action_event_names() {
        assert_eq!(Action::NextTrack.event_name(), "nextTrack");
        assert_eq!(Action::VolumeUp.event_name(), "VolumeUP");
        assert_eq!(Action::VolumeDown.event_name(), "VolumeDown");
    }
}
