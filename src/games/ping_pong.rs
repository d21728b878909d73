//! Ping Pong against a heuristic opponent
//!
//! Entirely frame-driven: paddles and ball integrate per tick, there are no
//! engine timers. The player holds the left paddle, the opponent the right.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::{EngineConfig, RuleEngine};
use crate::audio::Cue;
use crate::consts::RALLY_POINTS;
use crate::sim::collision::{Rect, reflect_velocity};
use crate::sim::state::{GameEvent, RoundCtx};
use crate::sim::tick::{InputEvent, TickInput};
use crate::{grow_with_level, level_target, shrink_with_level};

pub const PADDLE_WIDTH: f32 = 15.0;
pub const PADDLE_INSET: f32 = 40.0;
pub const PLAYER_PADDLE_HEIGHT: f32 = 100.0;
/// Paddle speed (px/s)
pub const PADDLE_SPEED: f32 = 400.0;
pub const BALL_SIZE: f32 = 15.0;
/// Opponent points that end the round
pub const OPPONENT_WIN_POINTS: u32 = 5;
/// Vertical launch spread relative to the horizontal component
const LAUNCH_SPREAD: f32 = 0.7;
/// Vertical speed at the paddle edge after a hit
const DEFLECTION_SPEED: f32 = 300.0;
/// How far ahead (seconds of vy) the opponent aims
const PREDICTION_LOOKAHEAD: f32 = 0.3;
const DRIFT_FACTOR: f32 = 0.03;
const DRIFT_DEADBAND: f32 = 10.0;

/// A paddle with its own height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub rect: Rect,
}

impl Paddle {
    fn new(x: f32, y: f32, height: f32) -> Self {
        Self {
            rect: Rect::new(Vec2::new(x, y), Vec2::new(PADDLE_WIDTH, height)),
        }
    }

    pub fn y(&self) -> f32 {
        self.rect.center.y
    }

    pub fn height(&self) -> f32 {
        self.rect.size().y
    }

    fn shift(&mut self, dy: f32, field: Vec2) {
        self.rect.center.y += dy;
        self.rect.clamp_into(field.x, field.y);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Ball {
    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, Vec2::splat(BALL_SIZE))
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }
}

/// Ping Pong rule engine
#[derive(Debug, Clone)]
pub struct PingPong {
    level: u32,
    field: Vec2,
    player: Paddle,
    opponent: Paddle,
    ball: Ball,
    base_speed: f32,
    difficulty: f32,
    player_points: u32,
    opponent_points: u32,
    target_points: u32,
    rng: Pcg32,
    paused: bool,
    over: bool,
}

impl PingPong {
    pub fn opponent_height_for(level: u32) -> f32 {
        shrink_with_level(100.0, 5.0, level, 30.0) as f32
    }

    pub fn difficulty_for(level: u32) -> f32 {
        grow_with_level(0.05, 0.01, level, 0.17) as f32
    }

    pub fn ball_speed_for(level: u32) -> f32 {
        300.0 + level as f32 * 20.0
    }

    /// Multiplier applied to ball speed on each paddle hit
    pub fn hit_speedup_for(level: u32) -> f32 {
        1.05 + level as f32 * 0.01
    }

    pub fn target_points_for(level: u32) -> u32 {
        level_target(5, 2, level)
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn player(&self) -> &Paddle {
        &self.player
    }

    pub fn opponent(&self) -> &Paddle {
        &self.opponent
    }

    /// (player, opponent)
    pub fn points(&self) -> (u32, u32) {
        (self.player_points, self.opponent_points)
    }

    pub fn target_points(&self) -> u32 {
        self.target_points
    }

    /// Center the ball and send it toward a random side
    fn launch(&mut self) {
        let dir_x = if self.rng.random_bool(0.5) { 1.0 } else { -1.0 };
        let dir_y = (self.rng.random::<f32>() * 2.0 - 1.0) * LAUNCH_SPREAD;
        self.ball = Ball {
            pos: self.field * 0.5,
            vel: Vec2::new(dir_x, dir_y).normalize() * self.base_speed,
        };
    }

    fn move_player(&mut self, input: &TickInput, dt: f32) {
        let mut dir = 0.0;
        if input.held.up {
            dir -= 1.0;
        }
        if input.held.down {
            dir += 1.0;
        }
        let mut dy = dir * PADDLE_SPEED * dt;

        // Pointer steers toward its y when no key is held
        if dir == 0.0 {
            if let Some(p) = input.pointer {
                let max = PADDLE_SPEED * dt;
                dy = (p.y - self.player.y()).clamp(-max, max);
            }
        }
        self.player.shift(dy, self.field);
    }

    fn move_opponent(&mut self, dt: f32) {
        let y = self.opponent.y();
        let dy = if self.ball.vel.x > 0.0 {
            let predicted = self.ball.pos.y + self.ball.vel.y * PREDICTION_LOOKAHEAD;
            let band = self.opponent.height() / 4.0;
            let speed = PADDLE_SPEED * self.difficulty;
            if predicted < y - band {
                -speed
            } else if predicted > y + band {
                speed
            } else {
                0.0
            }
        } else {
            let center = self.field.y * 0.5;
            let speed = PADDLE_SPEED * DRIFT_FACTOR;
            if y < center - DRIFT_DEADBAND {
                speed
            } else if y > center + DRIFT_DEADBAND {
                -speed
            } else {
                0.0
            }
        };
        self.opponent.shift(dy * dt, self.field);
    }

    /// Paddle contact: speed up, then re-aim from where the ball struck
    fn deflect(&mut self, paddle: Paddle, away: f32, ctx: &mut RoundCtx) {
        let new_speed = self.ball.speed() * Self::hit_speedup_for(self.level);
        let offset = (self.ball.pos.y - paddle.y()) / (paddle.height() / 2.0);
        let dir = Vec2::new(away * self.ball.vel.x.abs(), offset * DEFLECTION_SPEED);
        self.ball.vel = dir.normalize_or(Vec2::new(away, 0.0)) * new_speed;

        // Push out so the next frame does not hit again
        let reach = paddle.rect.half.x + BALL_SIZE / 2.0;
        self.ball.pos.x = paddle.rect.center.x + away * reach;

        ctx.cue(Cue::Hit);
        ctx.emit(GameEvent::PaddleHit { speed: new_speed });
    }

    fn resolve_walls(&mut self, ctx: &mut RoundCtx) {
        let half = BALL_SIZE / 2.0;
        let ball = self.ball.rect();
        if ball.top() < 0.0 && self.ball.vel.y < 0.0 {
            self.ball.pos.y = half;
            self.ball.vel = reflect_velocity(self.ball.vel, Vec2::Y);
            ctx.cue(Cue::Hit);
        } else if ball.bottom() > self.field.y && self.ball.vel.y > 0.0 {
            self.ball.pos.y = self.field.y - half;
            self.ball.vel = reflect_velocity(self.ball.vel, Vec2::NEG_Y);
            ctx.cue(Cue::Hit);
        }
    }

    fn resolve_paddles(&mut self, ctx: &mut RoundCtx) {
        let ball = self.ball.rect();
        if self.ball.vel.x < 0.0 && ball.overlaps(&self.player.rect) {
            let paddle = self.player;
            self.deflect(paddle, 1.0, ctx);
        } else if self.ball.vel.x > 0.0 && ball.overlaps(&self.opponent.rect) {
            let paddle = self.opponent;
            self.deflect(paddle, -1.0, ctx);
        }
    }

    fn resolve_breach(&mut self, ctx: &mut RoundCtx) {
        let player_scored = if self.ball.pos.x < 0.0 {
            false
        } else if self.ball.pos.x > self.field.x {
            true
        } else {
            return;
        };

        ctx.cue(Cue::Score);
        ctx.emit(GameEvent::PointScored {
            player: player_scored,
        });

        if player_scored {
            self.player_points += 1;
            ctx.add_score(RALLY_POINTS);
            if self.player_points >= self.target_points {
                log::info!(
                    "Ping Pong level {} won {}-{}",
                    self.level,
                    self.player_points,
                    self.opponent_points
                );
                ctx.level_complete();
                self.over = true;
                return;
            }
        } else {
            self.opponent_points += 1;
            if self.opponent_points >= OPPONENT_WIN_POINTS {
                log::info!(
                    "Ping Pong level {} lost {}-{}",
                    self.level,
                    self.player_points,
                    self.opponent_points
                );
                ctx.round_lost();
                self.over = true;
                return;
            }
        }
        self.launch();
    }
}

impl RuleEngine for PingPong {
    fn init(level: u32, config: &EngineConfig) -> Self {
        let field = config.playfield;
        let mid = field.y * 0.5;
        let mut game = Self {
            level,
            field,
            player: Paddle::new(PADDLE_INSET, mid, PLAYER_PADDLE_HEIGHT),
            opponent: Paddle::new(field.x - PADDLE_INSET, mid, Self::opponent_height_for(level)),
            ball: Ball {
                pos: field * 0.5,
                vel: Vec2::ZERO,
            },
            base_speed: Self::ball_speed_for(level),
            difficulty: Self::difficulty_for(level),
            player_points: 0,
            opponent_points: 0,
            target_points: Self::target_points_for(level),
            rng: config.rng(),
            paused: false,
            over: false,
        };
        game.launch();
        game
    }

    fn tick(&mut self, dt_ms: f64, input: &TickInput, ctx: &mut RoundCtx) {
        if self.over || self.paused {
            return;
        }
        let dt = (dt_ms / 1000.0) as f32;

        // Input, then motion, then contacts, then scoring
        self.move_player(input, dt);
        self.move_opponent(dt);
        self.ball.pos += self.ball.vel * dt;

        self.resolve_walls(ctx);
        self.resolve_paddles(ctx);
        self.resolve_breach(ctx);
    }

    fn on_input(&mut self, event: &InputEvent, _ctx: &mut RoundCtx) {
        if self.over || self.paused {
            return;
        }
        if let InputEvent::PointerMove(p) = event {
            self.player.rect.center.y = p.y;
            self.player.rect.clamp_into(self.field.x, self.field.y);
        }
    }

    fn is_terminal(&self) -> bool {
        self.over
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn teardown(&mut self) -> usize {
        self.over = true;
        0
    }
}
