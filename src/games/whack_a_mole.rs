//! Whack-a-Mole
//!
//! Six holes in a 3x2 grid. Moles pop up on a repeating timer and sink back on
//! their own deadline; a one second countdown runs alongside.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::{EngineConfig, RuleEngine};
use crate::audio::Cue;
use crate::consts::WHACK_POINTS;
use crate::shrink_with_level;
use crate::sim::state::{GameEvent, RoundCtx};
use crate::sim::tick::{InputEvent, TickInput};
use crate::sim::timer::{TimerHandle, TimerService};

pub const HOLE_COUNT: usize = 6;
pub const HOLE_COLUMNS: usize = 3;
pub const HOLE_SPACING: f32 = 120.0;
/// Pointer distance that still counts as a hit
pub const HIT_RADIUS: f32 = 40.0;
pub const COUNTDOWN_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoleTimer {
    PopUp,
    Hide(usize),
    Countdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hole {
    pub pos: Vec2,
    pub visible: bool,
    hide_timer: Option<TimerHandle>,
}

/// Whack-a-Mole rule engine
#[derive(Debug, Clone)]
pub struct WhackAMole {
    level: u32,
    holes: [Hole; HOLE_COUNT],
    whacked: u32,
    target: u32,
    time_left: u32,
    hide_delay_ms: f64,
    timers: TimerService<MoleTimer>,
    rng: Pcg32,
    over: bool,
}

impl WhackAMole {
    pub fn target_for(level: u32) -> u32 {
        3 + level
    }

    /// Round length in seconds
    pub fn time_budget_for(level: u32) -> u32 {
        shrink_with_level(20.0, 1.0, level, 9.0) as u32
    }

    pub fn popup_interval_for(level: u32) -> f64 {
        shrink_with_level(1000.0, 50.0, level, 500.0)
    }

    pub fn hide_delay_for(level: u32) -> f64 {
        shrink_with_level(2000.0, 100.0, level, 800.0)
    }

    /// Hole centers: 3 columns by 2 rows, centered in the playfield
    pub fn layout(field: Vec2) -> [Vec2; HOLE_COUNT] {
        let start = Vec2::new(
            (field.x - HOLE_SPACING * 2.0) / 2.0,
            (field.y - HOLE_SPACING) / 2.0,
        );
        std::array::from_fn(|i| {
            let (row, col) = (i / HOLE_COLUMNS, i % HOLE_COLUMNS);
            start + Vec2::new(col as f32, row as f32) * HOLE_SPACING
        })
    }

    pub fn holes(&self) -> &[Hole; HOLE_COUNT] {
        &self.holes
    }

    pub fn whacked(&self) -> u32 {
        self.whacked
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn visible_count(&self) -> usize {
        self.holes.iter().filter(|h| h.visible).count()
    }

    /// Show a random hidden mole and arm its hide deadline
    fn pop_up(&mut self, ctx: &mut RoundCtx) {
        let hidden: Vec<usize> = (0..HOLE_COUNT).filter(|i| !self.holes[*i].visible).collect();
        if hidden.is_empty() {
            return;
        }
        let hole = hidden[self.rng.random_range(0..hidden.len())];
        let handle = self
            .timers
            .schedule(self.hide_delay_ms, MoleTimer::Hide(hole), false);
        self.holes[hole].visible = true;
        self.holes[hole].hide_timer = Some(handle);
        ctx.emit(GameEvent::MoleShown { hole });
    }

    fn hide(&mut self, hole: usize, ctx: &mut RoundCtx) {
        let h = &mut self.holes[hole];
        h.hide_timer = None;
        if h.visible {
            h.visible = false;
            ctx.emit(GameEvent::MoleHidden { hole });
        }
    }

    /// Whack the mole in `hole`. Hidden moles are a miss.
    pub fn whack(&mut self, hole: usize, ctx: &mut RoundCtx) -> bool {
        if self.over || hole >= HOLE_COUNT || !self.holes[hole].visible {
            return false;
        }
        let h = &mut self.holes[hole];
        h.visible = false;
        if let Some(handle) = h.hide_timer.take() {
            self.timers.cancel(handle);
        }

        self.whacked += 1;
        ctx.cue(Cue::Bonk);
        ctx.add_score(WHACK_POINTS);
        ctx.emit(GameEvent::MoleWhacked { hole });

        if self.whacked >= self.target {
            log::info!("Whack-a-Mole level {} complete", self.level);
            ctx.level_complete();
            self.halt();
        }
        true
    }

    /// Visible hole under the pointer, if any
    pub fn hole_at(&self, p: Vec2) -> Option<usize> {
        self.holes
            .iter()
            .position(|h| h.visible && h.pos.distance(p) <= HIT_RADIUS)
    }

    fn countdown(&mut self, ctx: &mut RoundCtx) {
        self.time_left = self.time_left.saturating_sub(1);
        ctx.emit(GameEvent::TimeLeft {
            seconds: self.time_left,
        });
        if self.time_left == 0 {
            log::info!(
                "Whack-a-Mole level {} timed out at {}/{}",
                self.level,
                self.whacked,
                self.target
            );
            // No crash cue on time-out
            ctx.round_lost();
            self.halt();
        }
    }

    fn halt(&mut self) {
        self.over = true;
        for h in &mut self.holes {
            h.visible = false;
            h.hide_timer = None;
        }
        self.timers.pause();
    }
}

impl RuleEngine for WhackAMole {
    fn init(level: u32, config: &EngineConfig) -> Self {
        let mut timers = TimerService::new();
        timers.schedule(COUNTDOWN_MS, MoleTimer::Countdown, true);
        timers.schedule(Self::popup_interval_for(level), MoleTimer::PopUp, true);

        let positions = Self::layout(config.playfield);
        Self {
            level,
            holes: positions.map(|pos| Hole {
                pos,
                visible: false,
                hide_timer: None,
            }),
            whacked: 0,
            target: Self::target_for(level),
            time_left: Self::time_budget_for(level),
            hide_delay_ms: Self::hide_delay_for(level),
            timers,
            rng: config.rng(),
            over: false,
        }
    }

    fn tick(&mut self, dt_ms: f64, _input: &TickInput, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        let until = self.timers.now_ms() + dt_ms;
        while let Some((_, event)) = self.timers.pop_due(until) {
            match event {
                MoleTimer::PopUp => self.pop_up(ctx),
                MoleTimer::Hide(hole) => self.hide(hole, ctx),
                MoleTimer::Countdown => self.countdown(ctx),
            }
            if self.over || !ctx.is_live() {
                return;
            }
        }
        self.timers.advance_to(until);
    }

    fn on_input(&mut self, event: &InputEvent, ctx: &mut RoundCtx) {
        if self.over || self.timers.is_paused() {
            return;
        }
        if let InputEvent::PointerDown(p) = event {
            if let Some(hole) = self.hole_at(*p) {
                self.whack(hole, ctx);
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Outcome, SessionState};

    fn game(level: u32) -> WhackAMole {
        WhackAMole::init(level, &EngineConfig::for_tests(9))
    }

    #[test]
    fn test_level_formulas() {
        assert_eq!(WhackAMole::target_for(1), 4);
        assert_eq!(WhackAMole::time_budget_for(1), 19);
        assert_eq!(WhackAMole::time_budget_for(15), 9);
        assert_eq!(WhackAMole::popup_interval_for(1), 950.0);
        assert_eq!(WhackAMole::hide_delay_for(1), 1900.0);
        assert_eq!(WhackAMole::hide_delay_for(20), 800.0);
    }

    #[test]
    fn test_layout_is_centered_grid() {
        let holes = WhackAMole::layout(Vec2::new(800.0, 600.0));
        assert_eq!(holes[0], Vec2::new(280.0, 240.0));
        assert_eq!(holes[2], Vec2::new(520.0, 240.0));
        assert_eq!(holes[5], Vec2::new(520.0, 360.0));
    }

    #[test]
    fn test_unwhacked_mole_hides_on_its_own() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut g = game(1);

        // First pop-up at 950 ms, hidden again at 950 + 1900
        g.tick(960.0, &TickInput::default(), &mut ctx);
        let shown = g.holes().iter().position(|h| h.visible);
        let Some(hole) = shown else {
            panic!("no mole shown");
        };
        for _ in 0..200 {
            g.tick(10.0, &TickInput::default(), &mut ctx);
        }
        assert!(events.contains(&GameEvent::MoleHidden { hole }));
    }

    #[test]
    fn test_whack_scores_and_cancels_hide_timer() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut g = game(1);
        g.tick(960.0, &TickInput::default(), &mut ctx);
        let hole = g.holes().iter().position(|h| h.visible).unwrap_or(0);
        let pending = g.timers.pending();

        let pos = g.holes()[hole].pos + Vec2::new(10.0, 10.0);
        g.on_input(&InputEvent::PointerDown(pos), &mut ctx);

        assert_eq!(g.whacked(), 1);
        assert_eq!(session.score, WHACK_POINTS);
        assert_eq!(g.timers.pending(), pending - 1);
        assert!(events.contains(&GameEvent::Cue(Cue::Bonk)));
    }

    #[test]
    fn test_whacking_hidden_mole_misses() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut g = game(1);
        assert!(!g.whack(0, &mut ctx));
        assert!(!g.whack(HOLE_COUNT, &mut ctx));
        assert_eq!(session.score, 0);
    }

    #[test]
    fn test_pointer_outside_radius_misses() {
        let mut g = game(1);
        g.holes[0].visible = true;
        let p = g.holes()[0].pos;
        assert_eq!(g.hole_at(p + Vec2::new(HIT_RADIUS, 0.0)), Some(0));
        assert_eq!(g.hole_at(p + Vec2::new(HIT_RADIUS + 1.0, 0.0)), None);
    }

    #[test]
    fn test_reaching_target_completes_level() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut g = game(1);
        for _ in 0..g.target() {
            g.holes[0].visible = true;
            g.whack(0, &mut ctx);
        }
        assert!(g.is_terminal());
        assert_eq!(g.visible_count(), 0);
        assert!(matches!(
            session.pending_outcome(),
            Some(Outcome::LevelComplete { level: 2, .. })
        ));
    }

    #[test]
    fn test_timeout_loses_round_without_crash_cue() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut g = game(1);
        for _ in 0..25 {
            g.tick(1000.0, &TickInput::default(), &mut ctx);
            if g.is_terminal() {
                break;
            }
        }
        assert!(g.is_terminal());
        assert_eq!(g.time_left(), 0);
        assert_eq!(session.lives, 2);
        assert!(session.restart_requested());
        assert!(!events.contains(&GameEvent::Cue(Cue::Crash)));
    }
}
