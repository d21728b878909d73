//! Deterministic simulation module
//!
//! Session state, timers and the per-frame runner. This module must stay
//! deterministic:
//! - Virtual clock only (time moves when ticked)
//! - Seeded RNG only
//! - No rendering or platform dependencies

pub mod collision;
pub mod state;
pub mod tick;
pub mod timer;

pub use collision::{Rect, reflect_velocity};
pub use state::{GameEvent, Outcome, RoundCtx, SessionPhase, SessionState};
pub use tick::{Arcade, DialogCallbacks, HeldKeys, InputEvent, Key, TickInput};
pub use timer::{TimerHandle, TimerService};
