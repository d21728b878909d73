//! Session state and core simulation types
//!
//! The lives/level/score triple, the pause/outcome state machine, and the
//! plain-data events the presentation layer consumes.

use serde::{Deserialize, Serialize};

use crate::audio::Cue;
use crate::consts::*;

/// Round outcome awaiting a host response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Level target met; `level` is the level just entered
    LevelComplete { level: u32, score: u32 },
    /// Lives exhausted
    GameOver { score: u32 },
}

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Simulation running
    Playing,
    /// Halted by the host (or after a reset), waiting for `resume_game`
    Paused,
    /// Outcome raised, waiting for the host to dismiss it
    AwaitingOutcome(Outcome),
    /// Session over, nothing more will run
    Terminated,
}

/// Things that happened during a tick, for presentation and audio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Cue(Cue),
    LifeLost { lives: i32 },
    RoundRestarted { level: u32 },
    LevelComplete { level: u32, score: u32 },
    GameOver { score: u32 },
    SessionReset,

    // Tetris
    LinesCleared { count: u32, total: u32 },
    PieceLocked,
    // Snake
    FoodEaten { length: u32 },
    // Ping Pong
    PaddleHit { speed: f32 },
    PointScored { player: bool },
    // Shooting Game
    EnemyDestroyed { defeated: u32 },
    BossHit { health: u32 },
    PlayerDamaged,
    // Whack-a-Mole
    MoleShown { hole: usize },
    MoleHidden { hole: usize },
    MoleWhacked { hole: usize },
    TimeLeft { seconds: u32 },
}

/// Lives, level and score plus the pause/outcome state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Not clamped: gameplay ends at <= 0
    pub lives: i32,
    pub level: u32,
    pub score: u32,
    phase: SessionPhase,
    /// Round lost with lives remaining; the runner rebuilds the engine
    restart_requested: bool,
    /// Lives granted by `reset`
    starting_lives: i32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(STARTING_LIVES)
    }
}

impl SessionState {
    pub fn new(starting_lives: i32) -> Self {
        Self {
            lives: starting_lives,
            level: STARTING_LEVEL,
            score: 0,
            phase: SessionPhase::Playing,
            restart_requested: false,
            starting_lives,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
    }

    pub fn is_playing(&self) -> bool {
        self.phase == SessionPhase::Playing
    }

    pub fn pending_outcome(&self) -> Option<Outcome> {
        match self.phase {
            SessionPhase::AwaitingOutcome(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Adds `delta` lives. At <= 0 the GameOver outcome is raised.
    /// Returns true while the player is still alive.
    pub fn update_lives(&mut self, delta: i32) -> bool {
        self.lives += delta;
        if self.lives <= 0 {
            self.phase = SessionPhase::AwaitingOutcome(Outcome::GameOver { score: self.score });
            self.restart_requested = false;
            false
        } else {
            true
        }
    }

    /// Next level; score and lives carry over
    pub fn advance_level(&mut self) {
        self.level += 1;
        self.phase = SessionPhase::AwaitingOutcome(Outcome::LevelComplete {
            level: self.level,
            score: self.score,
        });
    }

    /// Back to `{lives: starting, level: 1, score: 0}`
    pub fn reset(&mut self) {
        self.lives = self.starting_lives;
        self.level = STARTING_LEVEL;
        self.score = 0;
        self.restart_requested = false;
    }

    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    pub fn request_restart(&mut self) {
        if self.is_playing() {
            self.restart_requested = true;
        }
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn take_restart_request(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }
}

/// What an engine sees of the session while it runs a round
pub struct RoundCtx<'a> {
    pub session: &'a mut SessionState,
    pub events: &'a mut Vec<GameEvent>,
}

impl<'a> RoundCtx<'a> {
    pub fn new(session: &'a mut SessionState, events: &'a mut Vec<GameEvent>) -> Self {
        Self { session, events }
    }

    /// False once the round ended (level complete, restart pending, game over)
    pub fn is_live(&self) -> bool {
        self.session.is_playing() && !self.session.restart_requested()
    }

    pub fn level(&self) -> u32 {
        self.session.level
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn cue(&mut self, cue: Cue) {
        self.events.push(GameEvent::Cue(cue));
    }

    pub fn add_score(&mut self, points: u32) {
        self.session.add_score(points);
    }

    /// Lose one life without ending the round. Returns true if still alive.
    pub fn lose_life(&mut self) -> bool {
        let alive = self.session.update_lives(-1);
        self.events.push(GameEvent::LifeLost {
            lives: self.session.lives,
        });
        alive
    }

    /// Lose one life and restart the current level if any remain
    pub fn round_lost(&mut self) {
        if self.lose_life() {
            self.session.request_restart();
        }
    }

    pub fn level_complete(&mut self) {
        self.session.advance_level();
    }
}
