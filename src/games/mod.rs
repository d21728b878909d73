//! Rule engines
//!
//! One engine per mini-game. Every engine owns its entities, its RNG and its
//! timer table; the runner only ever talks to them through [`Engine`].

pub mod ping_pong;
pub mod shooting;
pub mod snake;
pub mod tetris;
pub mod whack_a_mole;

pub use ping_pong::PingPong;
pub use shooting::ShootingGame;
pub use snake::Snake;
pub use tetris::Tetris;
pub use whack_a_mole::WhackAMole;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::{PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH};
use crate::sim::state::RoundCtx;
use crate::sim::tick::{InputEvent, TickInput};

/// Which mini-game to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    WhackAMole,
    Tetris,
    Snake,
    PingPong,
    ShootingGame,
}

impl GameKind {
    pub const ALL: [GameKind; 5] = [
        GameKind::WhackAMole,
        GameKind::Tetris,
        GameKind::Snake,
        GameKind::PingPong,
        GameKind::ShootingGame,
    ];

    /// Identifier hosts select games by
    pub fn slug(&self) -> &'static str {
        match self {
            GameKind::WhackAMole => "whack-a-mole",
            GameKind::Tetris => "tetris",
            GameKind::Snake => "snake",
            GameKind::PingPong => "ping-pong",
            GameKind::ShootingGame => "shooting-game",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GameKind::WhackAMole => "Whack-a-Mole",
            GameKind::Tetris => "Tetris",
            GameKind::Snake => "Snake",
            GameKind::PingPong => "Ping Pong",
            GameKind::ShootingGame => "Shooting Game",
        }
    }

    /// Accepts a slug or a display name, case-insensitively
    pub fn from_slug(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|k| {
            k.slug().eq_ignore_ascii_case(s) || k.display_name().eq_ignore_ascii_case(s)
        })
    }

    fn seed_salt(&self) -> u64 {
        match self {
            GameKind::WhackAMole => 1,
            GameKind::Tetris => 2,
            GameKind::Snake => 3,
            GameKind::PingPong => 4,
            GameKind::ShootingGame => 5,
        }
    }
}

/// Construction parameters shared by all engines
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// RNG seed for this engine instance
    pub seed: u64,
    /// Logical playfield size (width, height)
    pub playfield: Vec2,
}

impl EngineConfig {
    /// Seed mixed from the session seed, game, level and round so every
    /// restart gets fresh but reproducible randomness
    pub fn for_round(
        base_seed: u64,
        kind: GameKind,
        level: u32,
        round: u64,
        playfield: Vec2,
    ) -> Self {
        let seed = base_seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(kind.seed_salt().wrapping_mul(2654435761))
            .wrapping_add((level as u64) << 32)
            .wrapping_add(round.wrapping_mul(7919));
        Self { seed, playfield }
    }

    pub fn for_tests(seed: u64) -> Self {
        Self {
            seed,
            playfield: Vec2::new(PLAYFIELD_WIDTH, PLAYFIELD_HEIGHT),
        }
    }

    pub fn rng(&self) -> Pcg32 {
        Pcg32::seed_from_u64(self.seed)
    }
}

/// Lifecycle every engine implements
pub trait RuleEngine {
    /// Build all entities and arm timers for `level`
    fn init(level: u32, config: &EngineConfig) -> Self
    where
        Self: Sized;

    /// Advance by `dt_ms`: frame-driven logic first, then due timers
    fn tick(&mut self, dt_ms: f64, input: &TickInput, ctx: &mut RoundCtx);

    /// Discrete input (key press, pointer down)
    fn on_input(&mut self, event: &InputEvent, ctx: &mut RoundCtx);

    /// True once this round has ended
    fn is_terminal(&self) -> bool;

    /// Freeze timers
    fn pause(&mut self);

    /// Unfreeze timers from the same logical point
    fn resume(&mut self);

    /// Cancel every outstanding timer; returns how many were cancelled
    fn teardown(&mut self) -> usize;
}

/// Active engine, dispatched by a single match
#[derive(Debug, Clone)]
pub enum Engine {
    WhackAMole(WhackAMole),
    Tetris(Tetris),
    Snake(Snake),
    PingPong(PingPong),
    ShootingGame(ShootingGame),
}

impl Engine {
    pub fn new(kind: GameKind, level: u32, config: &EngineConfig) -> Self {
        match kind {
            GameKind::WhackAMole => Engine::WhackAMole(WhackAMole::init(level, config)),
            GameKind::Tetris => Engine::Tetris(Tetris::init(level, config)),
            GameKind::Snake => Engine::Snake(Snake::init(level, config)),
            GameKind::PingPong => Engine::PingPong(PingPong::init(level, config)),
            GameKind::ShootingGame => Engine::ShootingGame(ShootingGame::init(level, config)),
        }
    }

    pub fn kind(&self) -> GameKind {
        match self {
            Engine::WhackAMole(_) => GameKind::WhackAMole,
            Engine::Tetris(_) => GameKind::Tetris,
            Engine::Snake(_) => GameKind::Snake,
            Engine::PingPong(_) => GameKind::PingPong,
            Engine::ShootingGame(_) => GameKind::ShootingGame,
        }
    }

    pub fn tick(&mut self, dt_ms: f64, input: &TickInput, ctx: &mut RoundCtx) {
        match self {
            Engine::WhackAMole(e) => e.tick(dt_ms, input, ctx),
            Engine::Tetris(e) => e.tick(dt_ms, input, ctx),
            Engine::Snake(e) => e.tick(dt_ms, input, ctx),
            Engine::PingPong(e) => e.tick(dt_ms, input, ctx),
            Engine::ShootingGame(e) => e.tick(dt_ms, input, ctx),
        }
    }

    pub fn on_input(&mut self, event: &InputEvent, ctx: &mut RoundCtx) {
        match self {
            Engine::WhackAMole(e) => e.on_input(event, ctx),
            Engine::Tetris(e) => e.on_input(event, ctx),
            Engine::Snake(e) => e.on_input(event, ctx),
            Engine::PingPong(e) => e.on_input(event, ctx),
            Engine::ShootingGame(e) => e.on_input(event, ctx),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            Engine::WhackAMole(e) => e.is_terminal(),
            Engine::Tetris(e) => e.is_terminal(),
            Engine::Snake(e) => e.is_terminal(),
            Engine::PingPong(e) => e.is_terminal(),
            Engine::ShootingGame(e) => e.is_terminal(),
        }
    }

    pub fn pause(&mut self) {
        match self {
            Engine::WhackAMole(e) => e.pause(),
            Engine::Tetris(e) => e.pause(),
            Engine::Snake(e) => e.pause(),
            Engine::PingPong(e) => e.pause(),
            Engine::ShootingGame(e) => e.pause(),
        }
    }

    pub fn resume(&mut self) {
        match self {
            Engine::WhackAMole(e) => e.resume(),
            Engine::Tetris(e) => e.resume(),
            Engine::Snake(e) => e.resume(),
            Engine::PingPong(e) => e.resume(),
            Engine::ShootingGame(e) => e.resume(),
        }
    }

    pub fn teardown(&mut self) -> usize {
        match self {
            Engine::WhackAMole(e) => e.teardown(),
            Engine::Tetris(e) => e.teardown(),
            Engine::Snake(e) => e.teardown(),
            Engine::PingPong(e) => e.teardown(),
            Engine::ShootingGame(e) => e.teardown(),
        }
    }
}
