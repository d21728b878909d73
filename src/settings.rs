//! Session settings
//!
//! Loaded from an optional JSON file; anything missing falls back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// What happens at zero lives when the host registered no game-over callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GameOverFallback {
    /// Quietly start over at level 1
    #[default]
    AutoReset,
    /// Stop the session for good
    Terminate,
}

impl GameOverFallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameOverFallback::AutoReset => "auto-reset",
            GameOverFallback::Terminate => "terminate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto-reset" | "autoreset" | "reset" => Some(GameOverFallback::AutoReset),
            "terminate" | "quit" => Some(GameOverFallback::Terminate),
            _ => None,
        }
    }
}

/// Audio preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            sfx_volume: 1.0,
            muted: false,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base seed for every engine RNG
    pub seed: u64,

    // === Playfield ===
    pub playfield_width: f32,
    pub playfield_height: f32,

    // === Timing ===
    /// Step used when the host ticks without a delta
    pub frame_dt_ms: f64,
    /// Host deltas are clamped to this
    pub max_frame_dt_ms: f64,

    // === Progression ===
    pub starting_lives: i32,
    pub game_over_fallback: GameOverFallback,

    pub audio: AudioSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0x5EED_A5CA_DE00_0001,

            playfield_width: PLAYFIELD_WIDTH,
            playfield_height: PLAYFIELD_HEIGHT,

            frame_dt_ms: FRAME_DT_MS,
            max_frame_dt_ms: MAX_FRAME_DT_MS,

            starting_lives: STARTING_LIVES,
            game_over_fallback: GameOverFallback::AutoReset,

            audio: AudioSettings::default(),
        }
    }
}

impl Settings {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Clamp a host-supplied delta (or substitute the fixed step)
    pub fn frame_delta(&self, dt_ms: Option<f64>) -> f64 {
        match dt_ms {
            Some(dt) if dt.is_finite() && dt > 0.0 => dt.min(self.max_frame_dt_ms),
            Some(_) => 0.0,
            None => self.frame_dt_ms,
        }
    }

    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Option<Self> {
        match serde_json::from_str(json) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("Invalid settings JSON: {}", e);
                None
            }
        }
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => {
                if let Some(settings) = Self::from_json(&json) {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
            }
            Err(e) => log::warn!("Could not read settings {}: {}", path.display(), e),
        }

        log::info!("Using default settings");
        Self::default()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s = Settings::from_json(r#"{"seed": 7, "game_over_fallback": "Terminate"}"#)
            .expect("valid json");
        assert_eq!(s.seed, 7);
        assert_eq!(s.game_over_fallback, GameOverFallback::Terminate);
        assert_eq!(s.starting_lives, STARTING_LIVES);
        assert_eq!(s.playfield_width, PLAYFIELD_WIDTH);
    }

    #[test]
    fn test_bad_json_rejected() {
        assert!(Settings::from_json("{ nope").is_none());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let s = Settings::load_from("/definitely/not/here/settings.json");
        assert_eq!(s.frame_dt_ms, FRAME_DT_MS);
    }

    #[test]
    fn test_frame_delta() {
        let s = Settings::default();
        assert_eq!(s.frame_delta(None), FRAME_DT_MS);
        assert_eq!(s.frame_delta(Some(16.0)), 16.0);
        assert_eq!(s.frame_delta(Some(5000.0)), MAX_FRAME_DT_MS);
        assert_eq!(s.frame_delta(Some(-3.0)), 0.0);
        assert_eq!(s.frame_delta(Some(f64::NAN)), 0.0);
    }

    #[test]
    fn test_json_round_trip() {
        let s = Settings::with_seed(99);
        let back = Settings::from_json(&s.to_json()).expect("round trip");
        assert_eq!(back.seed, 99);
    }

    #[test]
    fn test_fallback_from_str() {
        assert_eq!(GameOverFallback::from_str("Quit"), Some(GameOverFallback::Terminate));
        assert_eq!(GameOverFallback::from_str("reset"), Some(GameOverFallback::AutoReset));
        assert_eq!(GameOverFallback::from_str("maybe"), None);
    }
}
