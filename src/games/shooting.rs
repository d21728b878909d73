//! Vertical shooter
//!
//! Regular levels stream enemies down from the top on a spawn timer. Levels 3,
//! 7 and 12 replace the stream with a single boss that sways side to side and
//! fires its own pattern. Damage costs a life but does not restart the round.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::{EngineConfig, RuleEngine};
use crate::audio::Cue;
use crate::consts::{BOSS_DEFEAT_POINTS, BOSS_HIT_POINTS, ENEMY_POINTS};
use crate::sim::collision::Rect;
use crate::sim::state::{GameEvent, RoundCtx};
use crate::sim::tick::{InputEvent, Key, TickInput};
use crate::sim::timer::TimerService;
use crate::{level_target, shrink_with_level, sine_ease_in_out};

/// Ship speed (px/s)
pub const SHIP_SPEED: f32 = 300.0;
/// Distance of the ship above the bottom edge
pub const SHIP_BOTTOM_OFFSET: f32 = 50.0;
pub const SHIP_SIZE: Vec2 = Vec2::new(40.0, 30.0);
pub const ENEMY_SIZE: Vec2 = Vec2::new(30.0, 30.0);
pub const BOSS_SIZE: Vec2 = Vec2::new(96.0, 64.0);
pub const BULLET_SIZE: Vec2 = Vec2::new(6.0, 12.0);

/// Minimum time between player shots
pub const FIRE_INTERVAL_MS: f64 = 200.0;
pub const PLAYER_BULLET_SPEED: f32 = 500.0;
pub const PLAYER_BULLET_LIFETIME_MS: f64 = 1000.0;
pub const ENEMY_BULLET_LIFETIME_MS: f64 = 1000.0;
pub const PLAYER_BULLET_POOL: usize = 30;
pub const ENEMY_BULLET_POOL: usize = 50;
pub const ENEMY_BULLET_SPEED: f32 = 200.0;
pub const BOSS_BULLET_SPEED: f32 = 250.0;

/// Regular enemies are discarded this far below the bottom edge
const OFFSCREEN_MARGIN: f32 = 50.0;
/// Spawn x is kept this far from both edges
const SPAWN_MARGIN: f32 = 50.0;

pub const BOSS_START_Y: f32 = 100.0;
/// Horizontal sway of the boss to the right of its start
pub const BOSS_SWAY: f32 = 200.0;
/// One sway leg (there and back takes twice this)
pub const BOSS_SWAY_MS: f64 = 2000.0;

/// Damage flash duration (4 blinks)
pub const DAMAGE_FLASH_MS: f64 = 800.0;

/// Boss attack shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossPattern {
    Single,
    Spread,
    Ring,
}

/// Parameters of a boss level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BossLevel {
    pub health: u32,
    pub fire_interval_ms: u32,
    pub pattern: BossPattern,
}

/// Boss parameters for `level`, or None on a regular level
pub fn boss_level(level: u32) -> Option<BossLevel> {
    match level {
        3 => Some(BossLevel {
            health: 20,
            fire_interval_ms: 2000,
            pattern: BossPattern::Single,
        }),
        7 => Some(BossLevel {
            health: 35,
            fire_interval_ms: 1500,
            pattern: BossPattern::Spread,
        }),
        12 => Some(BossLevel {
            health: 50,
            fire_interval_ms: 1000,
            pattern: BossPattern::Ring,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bullet {
    pub pos: Vec2,
    pub vel: Vec2,
    pub age_ms: f64,
}

impl Bullet {
    fn new(pos: Vec2, vel: Vec2) -> Self {
        Self {
            pos,
            vel,
            age_ms: 0.0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, BULLET_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enemy {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Enemy {
    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, ENEMY_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boss {
    pub pos: Vec2,
    pub health: u32,
    max_health: u32,
    origin_x: f32,
    sway_ms: f64,
}

impl Boss {
    pub fn rect(&self) -> Rect {
        Rect::new(self.pos, BOSS_SIZE)
    }

    /// Remaining health in [0, 1], for health bars
    pub fn health_fraction(&self) -> f32 {
        if self.max_health == 0 {
            0.0
        } else {
            self.health as f32 / self.max_health as f32
        }
    }

    /// Sine-eased yoyo between `origin_x` and `origin_x + BOSS_SWAY`
    fn sway(&mut self, dt_ms: f64) {
        self.sway_ms = (self.sway_ms + dt_ms) % (BOSS_SWAY_MS * 2.0);
        let leg = if self.sway_ms < BOSS_SWAY_MS {
            self.sway_ms / BOSS_SWAY_MS
        } else {
            2.0 - self.sway_ms / BOSS_SWAY_MS
        };
        self.pos.x = self.origin_x + BOSS_SWAY * sine_ease_in_out(leg as f32);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShooterTimer {
    Spawn,
    BossFire,
}

/// Shooting Game rule engine
#[derive(Debug, Clone)]
pub struct ShootingGame {
    level: u32,
    field: Vec2,
    ship: Vec2,
    bullets: Vec<Bullet>,
    enemy_bullets: Vec<Bullet>,
    enemies: Vec<Enemy>,
    boss: Option<Boss>,
    boss_level: Option<BossLevel>,
    /// Regular enemies currently counted against the level budget
    spawned: u32,
    total_enemies: u32,
    enemies_defeated: u32,
    next_fire_ms: f64,
    flash_ms: f64,
    timers: TimerService<ShooterTimer>,
    rng: Pcg32,
    over: bool,
}

impl ShootingGame {
    pub fn spawn_interval_for(level: u32) -> f64 {
        shrink_with_level(1000.0, 50.0, level, 500.0)
    }

    pub fn total_enemies_for(level: u32) -> u32 {
        if boss_level(level).is_some() {
            1
        } else {
            level_target(10, 2, level)
        }
    }

    pub fn enemy_speed_for(level: u32) -> f32 {
        50.0 + level as f32 * 10.0
    }

    /// Chance an enemy fires as it spawns (only past level 3)
    pub fn enemy_fire_chance_for(level: u32) -> f64 {
        if level > 3 {
            (0.01 * level as f64).min(1.0)
        } else {
            0.0
        }
    }

    pub fn ship(&self) -> Vec2 {
        self.ship
    }

    pub fn ship_rect(&self) -> Rect {
        Rect::new(self.ship, SHIP_SIZE)
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn enemy_bullets(&self) -> &[Bullet] {
        &self.enemy_bullets
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn boss(&self) -> Option<&Boss> {
        self.boss.as_ref()
    }

    pub fn enemies_defeated(&self) -> u32 {
        self.enemies_defeated
    }

    pub fn total_enemies(&self) -> u32 {
        self.total_enemies
    }

    /// True while the damage flash is showing
    pub fn is_flashing(&self) -> bool {
        self.flash_ms > 0.0
    }

    fn move_ship(&mut self, input: &TickInput, dt: f32) {
        let dir = if input.held.left {
            -1.0
        } else if input.held.right {
            1.0
        } else {
            0.0
        };
        let half = SHIP_SIZE.x / 2.0;
        self.ship.x = (self.ship.x + dir * SHIP_SPEED * dt).clamp(half, self.field.x - half);
    }

    /// Fire if the interval has elapsed and the pool has room
    fn try_fire(&mut self, ctx: &mut RoundCtx) -> bool {
        let now = self.timers.now_ms();
        if now < self.next_fire_ms || self.bullets.len() >= PLAYER_BULLET_POOL {
            return false;
        }
        self.next_fire_ms = now + FIRE_INTERVAL_MS;
        self.bullets.push(Bullet::new(
            self.ship - Vec2::new(0.0, 20.0),
            Vec2::new(0.0, -PLAYER_BULLET_SPEED),
        ));
        ctx.cue(Cue::Shoot);
        true
    }

    fn push_enemy_bullet(&mut self, pos: Vec2, vel: Vec2) {
        if self.enemy_bullets.len() < ENEMY_BULLET_POOL {
            self.enemy_bullets.push(Bullet::new(pos, vel));
        }
    }

    /// Spawn one regular enemy unless the level budget is used up
    pub fn spawn_enemy(&mut self) -> bool {
        if self.spawned >= self.total_enemies {
            return false;
        }
        let x = self
            .rng
            .random_range(SPAWN_MARGIN..=(self.field.x - SPAWN_MARGIN).max(SPAWN_MARGIN));
        let enemy = Enemy {
            pos: Vec2::new(x, 0.0),
            vel: Vec2::new(0.0, Self::enemy_speed_for(self.level)),
        };
        self.enemies.push(enemy);
        self.spawned += 1;

        let chance = Self::enemy_fire_chance_for(self.level);
        if chance > 0.0 && self.rng.random_bool(chance) {
            self.push_enemy_bullet(
                enemy.pos + Vec2::new(0.0, 20.0),
                Vec2::new(0.0, ENEMY_BULLET_SPEED),
            );
        }
        log::debug!("Spawned enemy {}/{} at x={:.0}", self.spawned, self.total_enemies, x);
        true
    }

    fn boss_fire(&mut self) {
        let (Some(boss), Some(stats)) = (self.boss, self.boss_level) else {
            return;
        };
        match stats.pattern {
            BossPattern::Single => self.push_enemy_bullet(
                boss.pos + Vec2::new(0.0, 30.0),
                Vec2::new(0.0, BOSS_BULLET_SPEED),
            ),
            BossPattern::Spread => {
                for i in -1..=1 {
                    let i = i as f32;
                    self.push_enemy_bullet(
                        boss.pos + Vec2::new(i * 30.0, 30.0),
                        Vec2::new(i * 50.0, BOSS_BULLET_SPEED),
                    );
                }
            }
            BossPattern::Ring => {
                for i in 0..8 {
                    let angle = i as f32 / 8.0 * std::f32::consts::TAU;
                    self.push_enemy_bullet(
                        boss.pos,
                        Vec2::from_angle(angle) * ENEMY_BULLET_SPEED,
                    );
                }
            }
        }
    }

    fn integrate(&mut self, dt_ms: f64) {
        let dt = (dt_ms / 1000.0) as f32;
        for b in self.bullets.iter_mut().chain(self.enemy_bullets.iter_mut()) {
            b.pos += b.vel * dt;
            b.age_ms += dt_ms;
        }
        for e in &mut self.enemies {
            e.pos += e.vel * dt;
        }
        if let Some(boss) = &mut self.boss {
            boss.sway(dt_ms);
        }
        self.flash_ms = (self.flash_ms - dt_ms).max(0.0);
    }

    fn damage_player(&mut self, ctx: &mut RoundCtx) -> bool {
        let alive = ctx.lose_life();
        if alive {
            self.flash_ms = DAMAGE_FLASH_MS;
            ctx.emit(GameEvent::PlayerDamaged);
        }
        alive
    }

    fn check_cleared(&mut self, ctx: &mut RoundCtx) -> bool {
        if self.enemies_defeated >= self.total_enemies {
            log::info!(
                "Shooting Game level {} cleared ({} defeated)",
                self.level,
                self.enemies_defeated
            );
            ctx.level_complete();
            self.halt();
            true
        } else {
            false
        }
    }

    /// Player bullets against enemies and the boss. Returns true if the level ended.
    fn resolve_player_bullets(&mut self, ctx: &mut RoundCtx) -> bool {
        let mut i = 0;
        while i < self.bullets.len() {
            let rect = self.bullets[i].rect();

            if let Some(idx) = self.enemies.iter().position(|e| e.rect().overlaps(&rect)) {
                self.bullets.remove(i);
                self.enemies.remove(idx);
                self.enemies_defeated += 1;
                ctx.cue(Cue::Explosion);
                ctx.add_score(ENEMY_POINTS);
                ctx.emit(GameEvent::EnemyDestroyed {
                    defeated: self.enemies_defeated,
                });
                if self.check_cleared(ctx) {
                    return true;
                }
                continue;
            }

            if let Some(boss) = &mut self.boss {
                if boss.rect().overlaps(&rect) {
                    self.bullets.remove(i);
                    boss.health = boss.health.saturating_sub(1);
                    let health = boss.health;
                    log::debug!("Boss hit, {:.0}% left", boss.health_fraction() * 100.0);
                    ctx.cue(Cue::Hit);
                    ctx.add_score(BOSS_HIT_POINTS);
                    ctx.emit(GameEvent::BossHit { health });
                    if health == 0 {
                        log::info!("Boss defeated on level {}", self.level);
                        self.boss = None;
                        self.enemies_defeated += 1;
                        ctx.cue(Cue::Explosion);
                        ctx.add_score(BOSS_DEFEAT_POINTS);
                        ctx.emit(GameEvent::EnemyDestroyed {
                            defeated: self.enemies_defeated,
                        });
                        if self.check_cleared(ctx) {
                            return true;
                        }
                    }
                    continue;
                }
            }
            i += 1;
        }
        false
    }

    /// Enemy bullets and ramming enemies against the ship. Returns true on game over.
    fn resolve_player_hits(&mut self, ctx: &mut RoundCtx) -> bool {
        let ship = self.ship_rect();

        let mut i = 0;
        while i < self.enemy_bullets.len() {
            if self.enemy_bullets[i].rect().overlaps(&ship) {
                self.enemy_bullets.remove(i);
                ctx.cue(Cue::Hit);
                if !self.damage_player(ctx) {
                    self.halt();
                    return true;
                }
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.enemies.len() {
            if self.enemies[i].rect().overlaps(&ship) {
                self.enemies.remove(i);
                // The rammed enemy goes back into the spawn budget
                self.spawned = self.spawned.saturating_sub(1);
                ctx.cue(Cue::Explosion);
                if !self.damage_player(ctx) {
                    self.halt();
                    return true;
                }
            } else {
                i += 1;
            }
        }
        false
    }

    fn discard_expired(&mut self) {
        let field = self.field;
        let bounds = Rect::new(field * 0.5, field);
        let on_screen = |p: Vec2| bounds.contains_point(p);

        self.bullets
            .retain(|b| b.age_ms < PLAYER_BULLET_LIFETIME_MS && on_screen(b.pos));
        self.enemy_bullets
            .retain(|b| b.age_ms < ENEMY_BULLET_LIFETIME_MS && on_screen(b.pos));

        let before = self.enemies.len();
        self.enemies.retain(|e| e.pos.y <= field.y + OFFSCREEN_MARGIN);
        let escaped = (before - self.enemies.len()) as u32;
        if escaped > 0 {
            // Escaped enemies are re-spawned later so the level stays winnable
            self.spawned = self.spawned.saturating_sub(escaped);
        }
    }

    fn halt(&mut self) {
        self.over = true;
        self.timers.pause();
    }
}

impl RuleEngine for ShootingGame {
    fn init(level: u32, config: &EngineConfig) -> Self {
        let field = config.playfield;
        let boss_stats = boss_level(level);
        let mut timers = TimerService::new();

        let boss = boss_stats.map(|stats| {
            timers.schedule(stats.fire_interval_ms as f64, ShooterTimer::BossFire, true);
            Boss {
                pos: Vec2::new(field.x / 2.0, BOSS_START_Y),
                health: stats.health,
                max_health: stats.health,
                origin_x: field.x / 2.0,
                sway_ms: 0.0,
            }
        });
        if boss.is_none() {
            timers.schedule(Self::spawn_interval_for(level), ShooterTimer::Spawn, true);
        }
        log::debug!(
            "Shooting Game level {}: {}",
            level,
            if boss.is_some() { "boss" } else { "regular" }
        );

        Self {
            level,
            field,
            ship: Vec2::new(field.x / 2.0, field.y - SHIP_BOTTOM_OFFSET),
            bullets: Vec::new(),
            enemy_bullets: Vec::new(),
            enemies: Vec::new(),
            boss,
            boss_level: boss_stats,
            spawned: if boss_stats.is_some() { 1 } else { 0 },
            total_enemies: Self::total_enemies_for(level),
            enemies_defeated: 0,
            next_fire_ms: 0.0,
            flash_ms: 0.0,
            timers,
            rng: config.rng(),
            over: false,
        }
    }

    fn tick(&mut self, dt_ms: f64, input: &TickInput, ctx: &mut RoundCtx) {
        if self.over || self.timers.is_paused() {
            return;
        }

        // Input, then motion, then contacts, then timers
        self.move_ship(input, (dt_ms / 1000.0) as f32);
        if input.held.action {
            self.try_fire(ctx);
        }
        self.integrate(dt_ms);

        if self.resolve_player_bullets(ctx) || self.resolve_player_hits(ctx) {
            return;
        }
        self.discard_expired();

        let until = self.timers.now_ms() + dt_ms;
        while let Some((_, event)) = self.timers.pop_due(until) {
            match event {
                ShooterTimer::Spawn => {
                    self.spawn_enemy();
                }
                ShooterTimer::BossFire => self.boss_fire(),
            }
            if !ctx.is_live() {
                self.halt();
                return;
            }
        }
        self.timers.advance_to(until);
    }

    fn on_input(&mut self, event: &InputEvent, ctx: &mut RoundCtx) {
        if self.over || self.timers.is_paused() {
            return;
        }
        if let InputEvent::KeyDown(Key::Action) = event {
            self.try_fire(ctx);
        }
    }

    fn is_terminal(&self) -> bool {
        self.over
    }

    fn pause(&mut self) {
        self.timers.pause();
    }

    fn resume(&mut self) {
        if !self.over {
            self.timers.resume();
        }
    }

    fn teardown(&mut self) -> usize {
        self.over = true;
        self.timers.cancel_all()
    }
}
