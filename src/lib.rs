//! Retro Arcade - five arcade mini-games on one progression model
//!
//! Core modules:
//! - `sim`: Session state, timers, input and the host-facing runner
//! - `games`: Rule engines (Whack-a-Mole, Tetris, Snake, Ping Pong, Shooting Game)
//! - `settings`: Data-driven configuration
//! - `audio`: Named sound cues, fire-and-forget

pub mod audio;
pub mod games;
pub mod settings;
pub mod sim;

pub use audio::{AudioManager, AudioSink, Cue};
pub use games::GameKind;
pub use settings::{GameOverFallback, Settings};
pub use sim::{
    Arcade, DialogCallbacks, GameEvent, InputEvent, Key, Outcome, SessionPhase, SessionState,
    TickInput,
};

/// Game configuration constants
pub mod consts {
    /// Step used when the host ticks without a delta (60 Hz)
    pub const FRAME_DT_MS: f64 = 1000.0 / 60.0;
    /// Largest delta accepted per tick to bound catch-up work
    pub const MAX_FRAME_DT_MS: f64 = 100.0;

    /// Logical playfield used by the physics games
    pub const PLAYFIELD_WIDTH: f32 = 800.0;
    pub const PLAYFIELD_HEIGHT: f32 = 600.0;

    /// Session defaults
    pub const STARTING_LIVES: i32 = 3;
    pub const STARTING_LEVEL: u32 = 1;

    /// Session score awarded per progress event
    pub const WHACK_POINTS: u32 = 10;
    pub const LINE_POINTS: u32 = 100;
    pub const FOOD_POINTS: u32 = 10;
    pub const RALLY_POINTS: u32 = 50;
    pub const ENEMY_POINTS: u32 = 25;
    pub const BOSS_HIT_POINTS: u32 = 5;
    pub const BOSS_DEFEAT_POINTS: u32 = 250;
}

/// `max(base - level * step, floor)`: a value that shrinks with level but never
/// drops below a safe minimum (drop intervals, spawn rates, time budgets).
#[inline]
pub fn shrink_with_level(base: f64, step: f64, level: u32, floor: f64) -> f64 {
    (base - level as f64 * step).max(floor)
}

/// `min(base + level * step, cap)`: a value that grows with level up to a cap.
#[inline]
pub fn grow_with_level(base: f64, step: f64, level: u32, cap: f64) -> f64 {
    (base + level as f64 * step).min(cap)
}

/// Per-level target that starts at `base` on level 1 and adds `step` each level.
#[inline]
pub fn level_target(base: u32, step: u32, level: u32) -> u32 {
    base + level.saturating_sub(1) * step
}

/// Sine ease-in-out over `t` in [0, 1]
#[inline]
pub fn sine_ease_in_out(t: f32) -> f32 {
    0.5 * (1.0 - (std::f32::consts::PI * t.clamp(0.0, 1.0)).cos())
}
