//! Sound cues
//!
//! Engines only name the cue they want; playback belongs to the host. A
//! missing or failing cue is logged and otherwise ignored.

use serde::{Deserialize, Serialize};

use crate::settings::AudioSettings;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cue {
    /// Tetris rows removed
    LineClear,
    /// Tetris piece rotated
    Rotate,
    /// Tetris hard drop
    Drop,
    /// Snake ate food
    Eat,
    /// Snake crashed
    Crash,
    /// Paddle/wall contact, boss hit, player hit
    Hit,
    /// Ping Pong point
    Score,
    /// Player fired
    Shoot,
    /// Enemy destroyed
    Explosion,
    /// Mole whacked
    Bonk,
    /// Session lost
    GameOver,
}

impl Cue {
    pub const ALL: [Cue; 11] = [
        Cue::LineClear,
        Cue::Rotate,
        Cue::Drop,
        Cue::Eat,
        Cue::Crash,
        Cue::Hit,
        Cue::Score,
        Cue::Shoot,
        Cue::Explosion,
        Cue::Bonk,
        Cue::GameOver,
    ];

    /// Asset name the host registers the sound under
    pub fn name(&self) -> &'static str {
        match self {
            Cue::LineClear => "lineClear",
            Cue::Rotate => "rotate",
            Cue::Drop => "drop",
            Cue::Eat => "eat",
            Cue::Crash => "crash",
            Cue::Hit => "hit",
            Cue::Score => "score",
            Cue::Shoot => "shoot",
            Cue::Explosion => "explosion",
            Cue::Bonk => "bonk",
            Cue::GameOver => "gameover",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Host-side playback. Fire-and-forget: returns false if the cue could not be played.
pub trait AudioSink {
    fn play_cue(&mut self, name: &str) -> bool;
}

/// Discards every cue
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play_cue(&mut self, _name: &str) -> bool {
        true
    }
}

/// Volume-aware sink that validates cue names and logs playback.
///
/// Hosts with a real mixer wrap or replace it; headless runs use it as is.
#[derive(Debug)]
pub struct AudioManager {
    master_volume: f32,
    sfx_volume: f32,
    muted: bool,
    played: u64,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new(&AudioSettings::default())
    }
}

impl AudioManager {
    pub fn new(settings: &AudioSettings) -> Self {
        Self {
            master_volume: settings.master_volume.clamp(0.0, 1.0),
            sfx_volume: settings.sfx_volume.clamp(0.0, 1.0),
            muted: settings.muted,
            played: 0,
        }
    }

    /// Set master volume (0.0 - 1.0)
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Set SFX volume (0.0 - 1.0)
    pub fn set_sfx_volume(&mut self, vol: f32) {
        self.sfx_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all audio
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Get effective volume
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master_volume * self.sfx_volume
        }
    }

    /// Cues actually played so far
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl AudioSink for AudioManager {
    fn play_cue(&mut self, name: &str) -> bool {
        let Some(cue) = Cue::from_name(name) else {
            log::warn!("Unknown sound cue '{}', ignoring", name);
            return false;
        };

        let vol = self.effective_volume();
        if vol <= 0.0 {
            return true;
        }

        self.played += 1;
        log::debug!("cue {:?} at volume {:.2}", cue, vol);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_names_round_trip() {
        for cue in Cue::ALL {
            assert_eq!(Cue::from_name(cue.name()), Some(cue));
        }
        assert_eq!(Cue::from_name("kazoo"), None);
    }

    #[test]
    fn test_missing_cue_is_not_fatal() {
        let mut audio = AudioManager::default();
        assert!(!audio.play_cue("kazoo"));
        assert!(audio.play_cue("bonk"));
        assert_eq!(audio.played(), 1);
    }

    #[test]
    fn test_muted_skips_playback() {
        let mut audio = AudioManager::default();
        audio.set_muted(true);
        assert!(audio.play_cue("hit"));
        assert_eq!(audio.played(), 0);
        assert_eq!(audio.effective_volume(), 0.0);
    }

    #[test]
    fn test_volume_clamped() {
        let mut audio = AudioManager::default();
        audio.set_master_volume(3.0);
        audio.set_sfx_volume(-1.0);
        assert_eq!(audio.effective_volume(), 0.0);
        audio.set_sfx_volume(0.5);
        assert!((audio.effective_volume() - 0.5).abs() < 1e-6);
    }
}
