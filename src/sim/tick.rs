//! Per-frame driver
//!
//! Input types plus the host-facing `Arcade` runner. The runner owns the
//! session and the active engine, turns round endings into outcome callbacks,
//! and rebuilds engines on restart, level change and game switch.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{GameEvent, Outcome, RoundCtx, SessionPhase, SessionState};
use crate::audio::{AudioManager, AudioSink, Cue};
use crate::games::{Engine, EngineConfig, GameKind};
use crate::settings::{GameOverFallback, Settings};

/// Logical keys the games listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    /// Fire / hard drop
    Action,
}

/// Continuous "is held" state of every key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldKeys {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub action: bool,
}

impl HeldKeys {
    pub fn is_held(&self, key: Key) -> bool {
        match key {
            Key::Left => self.left,
            Key::Right => self.right,
            Key::Up => self.up,
            Key::Down => self.down,
            Key::Action => self.action,
        }
    }

    pub fn set(&mut self, key: Key, held: bool) {
        match key {
            Key::Left => self.left = held,
            Key::Right => self.right = held,
            Key::Up => self.up = held,
            Key::Down => self.down = held,
            Key::Action => self.action = held,
        }
    }
}

/// Discrete input delivered between ticks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(Key),
    PointerDown(Vec2),
    PointerMove(Vec2),
}

/// Input sampled for a single tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// Frame delta from the host; None uses the fixed step
    pub dt_ms: Option<f64>,
    pub held: HeldKeys,
    /// Last known pointer position
    pub pointer: Option<Vec2>,
}

impl TickInput {
    pub fn with_dt(dt_ms: f64) -> Self {
        Self {
            dt_ms: Some(dt_ms),
            ..Self::default()
        }
    }
}

/// Host callbacks raised when a round ends
#[derive(Default)]
pub struct DialogCallbacks {
    on_game_over: Option<Box<dyn FnMut(u32)>>,
    on_level_complete: Option<Box<dyn FnMut(u32, u32)>>,
}

impl DialogCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the final score
    pub fn on_game_over(mut self, f: impl FnMut(u32) + 'static) -> Self {
        self.on_game_over = Some(Box::new(f));
        self
    }

    /// Called with the level just entered and the score so far
    pub fn on_level_complete(mut self, f: impl FnMut(u32, u32) + 'static) -> Self {
        self.on_level_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for DialogCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogCallbacks")
            .field("on_game_over", &self.on_game_over.is_some())
            .field("on_level_complete", &self.on_level_complete.is_some())
            .finish()
    }
}

/// Session runner: one game, one engine at a time
pub struct Arcade {
    kind: GameKind,
    engine: Engine,
    session: SessionState,
    settings: Settings,
    callbacks: DialogCallbacks,
    audio: Box<dyn AudioSink>,
    events: Vec<GameEvent>,
    /// Events before this index were already sent to the audio sink
    audio_cursor: usize,
    /// Engines built so far; mixed into each engine seed
    round: u64,
}

impl Arcade {
    pub fn new(kind: GameKind, settings: Settings) -> Self {
        let session = SessionState::new(settings.starting_lives);
        let config = Self::engine_config(&settings, kind, session.level, 0);
        let engine = Engine::new(kind, session.level, &config);
        log::info!("Arcade ready: {} (seed {:#x})", kind.display_name(), settings.seed);
        Self {
            kind,
            engine,
            session,
            audio: Box::new(AudioManager::new(&settings.audio)),
            settings,
            callbacks: DialogCallbacks::default(),
            events: Vec::new(),
            audio_cursor: 0,
            round: 0,
        }
    }

    /// Replace the default audio manager
    pub fn with_audio(mut self, sink: impl AudioSink + 'static) -> Self {
        self.audio = Box::new(sink);
        self
    }

    fn engine_config(settings: &Settings, kind: GameKind, level: u32, round: u64) -> EngineConfig {
        EngineConfig::for_round(
            settings.seed,
            kind,
            level,
            round,
            Vec2::new(settings.playfield_width, settings.playfield_height),
        )
    }

    /// Start (or restart) at `level` with the host's outcome callbacks
    pub fn init(&mut self, level: u32, callbacks: DialogCallbacks) {
        self.callbacks = callbacks;
        self.session.level = level.max(1);
        self.session.set_phase(SessionPhase::Playing);
        self.session.take_restart_request();
        self.rebuild_engine();
        log::info!("{} started at level {}", self.kind.display_name(), self.session.level);
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True once the session was quit (or ended with no way back)
    pub fn is_terminal(&self) -> bool {
        self.session.phase() == SessionPhase::Terminated
    }

    /// Events queued since the last drain
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Hand over everything that happened since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.flush_audio();
        self.audio_cursor = 0;
        std::mem::take(&mut self.events)
    }

    /// Tear down the current engine, then build a fresh one at the session level
    fn rebuild_engine(&mut self) {
        let cancelled = self.engine.teardown();
        log::info!(
            "Tearing down {} engine, {} timers cancelled",
            self.engine.kind().slug(),
            cancelled
        );
        self.round += 1;
        let config = Self::engine_config(&self.settings, self.kind, self.session.level, self.round);
        self.engine = Engine::new(self.kind, self.session.level, &config);
    }

    /// Advance one frame
    pub fn tick(&mut self, input: &TickInput) {
        match self.session.phase() {
            SessionPhase::Playing => {}
            SessionPhase::Terminated => {
                log::warn!("tick after the session terminated, ignoring");
                return;
            }
            _ => return,
        }

        let dt_ms = self.settings.frame_delta(input.dt_ms);
        {
            let mut ctx = RoundCtx::new(&mut self.session, &mut self.events);
            self.engine.tick(dt_ms, input, &mut ctx);
        }
        self.settle();
    }

    /// Deliver a key press or pointer event
    pub fn on_input(&mut self, event: InputEvent) {
        if !self.session.is_playing() {
            return;
        }
        {
            let mut ctx = RoundCtx::new(&mut self.session, &mut self.events);
            self.engine.on_input(&event, &mut ctx);
        }
        self.settle();
    }

    /// Turn whatever the engine left in the session into restarts and outcomes
    fn settle(&mut self) {
        if self.session.take_restart_request() {
            let level = self.session.level;
            log::info!("Round lost, {} lives left, restarting level {}", self.session.lives, level);
            self.rebuild_engine();
            self.events.push(GameEvent::RoundRestarted { level });
        }

        match self.session.pending_outcome() {
            Some(Outcome::LevelComplete { level, score }) => {
                self.engine.pause();
                self.events.push(GameEvent::LevelComplete { level, score });
                log::info!("Level complete, entering level {} with score {}", level, score);
                self.flush_audio();
                match self.callbacks.on_level_complete.as_mut() {
                    Some(cb) => cb(level, score),
                    None => self.resume_game(),
                }
            }
            Some(Outcome::GameOver { score }) => {
                self.engine.pause();
                self.events.push(GameEvent::Cue(Cue::GameOver));
                self.events.push(GameEvent::GameOver { score });
                log::info!("Game over with score {}", score);
                self.flush_audio();
                match self.callbacks.on_game_over.as_mut() {
                    Some(cb) => cb(score),
                    None => self.game_over_fallback(),
                }
            }
            None => {}
        }
        self.flush_audio();
    }

    fn game_over_fallback(&mut self) {
        match self.settings.game_over_fallback {
            GameOverFallback::AutoReset => {
                log::info!("No game-over handler, starting over");
                self.reset_game();
                self.resume_game();
            }
            GameOverFallback::Terminate => {
                log::info!("No game-over handler, terminating");
                self.quit();
            }
        }
    }

    fn flush_audio(&mut self) {
        for event in &self.events[self.audio_cursor..] {
            if let GameEvent::Cue(cue) = event {
                if !self.audio.play_cue(cue.name()) {
                    log::warn!("Cue '{}' could not be played", cue.name());
                }
            }
        }
        self.audio_cursor = self.events.len();
    }

    /// Host pause (menu, focus loss)
    pub fn pause(&mut self) {
        if self.session.is_playing() {
            self.engine.pause();
            self.session.set_phase(SessionPhase::Paused);
            log::info!("Paused");
        }
    }

    /// Continue after a host pause, a reset, or a level-complete dialog
    pub fn resume_game(&mut self) {
        match self.session.phase() {
            SessionPhase::Playing => {}
            SessionPhase::Paused => {
                self.engine.resume();
                self.session.set_phase(SessionPhase::Playing);
                log::info!("Resumed at level {}", self.session.level);
            }
            SessionPhase::AwaitingOutcome(Outcome::LevelComplete { level, .. }) => {
                self.session.set_phase(SessionPhase::Playing);
                self.rebuild_engine();
                log::info!("Next level {}", level);
            }
            SessionPhase::AwaitingOutcome(Outcome::GameOver { .. }) => {
                log::warn!("resume_game during game over without a reset, ignoring");
            }
            SessionPhase::Terminated => {
                log::warn!("resume_game after the session terminated, ignoring");
            }
        }
    }

    /// Back to level 1 with full lives and no score. Play continues after `resume_game`.
    pub fn reset_game(&mut self) {
        let phase = self.session.phase();
        if phase == SessionPhase::Terminated {
            log::warn!("reset_game after the session terminated, ignoring");
            return;
        }

        self.session.reset();
        self.rebuild_engine();
        self.events.push(GameEvent::SessionReset);
        if phase != SessionPhase::Playing {
            self.engine.pause();
            self.session.set_phase(SessionPhase::Paused);
            log::info!("Session reset, waiting for resume");
        }
    }

    /// Stop for good
    pub fn quit(&mut self) {
        let cancelled = self.engine.teardown();
        self.session.set_phase(SessionPhase::Terminated);
        log::info!("Session terminated ({} timers cancelled)", cancelled);
    }

    /// Swap to another game. The old engine's timers are cancelled first and
    /// the session starts over.
    pub fn switch_game(&mut self, kind: GameKind) {
        if self.is_terminal() {
            log::warn!("switch_game after the session terminated, ignoring");
            return;
        }
        let cancelled = self.engine.teardown();
        log::info!(
            "Switching {} -> {} ({} timers cancelled)",
            self.kind.slug(),
            kind.slug(),
            cancelled
        );
        self.kind = kind;
        self.session.reset();
        self.session.set_phase(SessionPhase::Playing);
        self.rebuild_engine();
    }
}
