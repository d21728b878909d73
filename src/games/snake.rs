//! Grid snake
//!
//! 15x15 grid. The snake steps on a repeating timer; direction changes are
//! buffered and committed once per step so a quick double turn can never
//! reverse the head into the neck. From level 2 the grid carries obstacles,
//! and from level 7 some of them wander.

use std::collections::VecDeque;

use glam::IVec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::{EngineConfig, RuleEngine};
use crate::audio::Cue;
use crate::consts::FOOD_POINTS;
use crate::sim::state::{GameEvent, RoundCtx};
use crate::sim::tick::{InputEvent, Key, TickInput};
use crate::sim::timer::TimerService;
use crate::{grow_with_level, level_target, shrink_with_level};

pub const GRID_SIZE: i32 = 15;
pub const START_LENGTH: u32 = 3;
/// Period of the wandering-obstacle step
pub const OBSTACLE_STEP_MS: f64 = 2000.0;
/// First level with wandering obstacles
pub const MOVING_OBSTACLE_LEVEL: u32 = 7;

/// Movement direction on the grid (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Down,
        Direction::Up,
    ];

    pub fn delta(&self) -> IVec2 {
        match self {
            Direction::Up => IVec2::new(0, -1),
            Direction::Down => IVec2::new(0, 1),
            Direction::Left => IVec2::new(-1, 0),
            Direction::Right => IVec2::new(1, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    fn from_key(key: Key) -> Option<Direction> {
        match key {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            Key::Action => None,
        }
    }
}

#[inline]
pub fn in_bounds(cell: IVec2) -> bool {
    cell.x >= 0 && cell.x < GRID_SIZE && cell.y >= 0 && cell.y < GRID_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnakeTimer {
    Step,
    ShiftObstacles,
}

/// Result of one movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Moved,
    Ate,
    Crashed,
}

/// Snake rule engine
#[derive(Debug, Clone)]
pub struct Snake {
    level: u32,
    /// Head first
    body: VecDeque<IVec2>,
    direction: Direction,
    next_direction: Direction,
    food: IVec2,
    obstacles: Vec<IVec2>,
    target_length: u32,
    step_interval_ms: f64,
    timers: TimerService<SnakeTimer>,
    rng: Pcg32,
    over: bool,
}

impl Snake {
    pub fn target_length_for(level: u32) -> u32 {
        level_target(10, 2, level)
    }

    pub fn step_interval_for(level: u32) -> f64 {
        shrink_with_level(150.0, 10.0, level, 50.0)
    }

    /// Placement attempts for obstacles on `level` (0 before level 2)
    pub fn obstacle_count_for(level: u32) -> usize {
        if level > 1 {
            grow_with_level(5.0, 2.0, level, 30.0) as usize
        } else {
            0
        }
    }

    pub fn body(&self) -> &VecDeque<IVec2> {
        &self.body
    }

    pub fn head(&self) -> IVec2 {
        self.body[0]
    }

    pub fn length(&self) -> u32 {
        self.body.len() as u32
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn next_direction(&self) -> Direction {
        self.next_direction
    }

    pub fn food(&self) -> IVec2 {
        self.food
    }

    pub fn obstacles(&self) -> &[IVec2] {
        &self.obstacles
    }

    pub fn target_length(&self) -> u32 {
        self.target_length
    }

    pub fn step_interval_ms(&self) -> f64 {
        self.step_interval_ms
    }

    fn random_cell(rng: &mut Pcg32) -> IVec2 {
        IVec2::new(rng.random_range(0..GRID_SIZE), rng.random_range(0..GRID_SIZE))
    }

    pub fn is_occupied(&self, cell: IVec2) -> bool {
        self.body.contains(&cell) || self.obstacles.contains(&cell)
    }

    /// Buffer a turn; reversing onto the neck is refused
    pub fn steer(&mut self, dir: Direction) -> bool {
        if dir == self.direction.opposite() {
            return false;
        }
        self.next_direction = dir;
        true
    }

    fn place_obstacles(&mut self) {
        let attempts = Self::obstacle_count_for(self.level);
        for _ in 0..attempts {
            let cell = Self::random_cell(&mut self.rng);
            // A collided attempt is dropped, not retried
            if !self.is_occupied(cell) {
                self.obstacles.push(cell);
            }
        }
        log::debug!(
            "Snake level {}: {} obstacles from {} attempts",
            self.level,
            self.obstacles.len(),
            attempts
        );
    }

    /// Move food to a random free cell. Returns false if the grid is full.
    fn relocate_food(&mut self) -> bool {
        let free: Vec<IVec2> = (0..GRID_SIZE)
            .flat_map(|y| (0..GRID_SIZE).map(move |x| IVec2::new(x, y)))
            .filter(|c| !self.is_occupied(*c))
            .collect();
        if free.is_empty() {
            return false;
        }
        self.food = free[self.rng.random_range(0..free.len())];
        true
    }

    /// Commit the buffered direction and move the head one cell
    pub fn step(&mut self, ctx: &mut RoundCtx) -> StepResult {
        if self.over {
            return StepResult::Crashed;
        }
        self.direction = self.next_direction;
        let new_head = self.head() + self.direction.delta();

        // The tail cell is free: it vacates this step (food is never on the body)
        let body_len = self.body.len();
        let hits_body = self
            .body
            .iter()
            .take(body_len.saturating_sub(1))
            .any(|c| *c == new_head);

        if !in_bounds(new_head) || hits_body || self.obstacles.contains(&new_head) {
            log::debug!("Snake crashed at {:?}", new_head);
            ctx.cue(Cue::Crash);
            ctx.round_lost();
            self.halt();
            return StepResult::Crashed;
        }

        self.body.push_front(new_head);

        if new_head == self.food {
            ctx.cue(Cue::Eat);
            ctx.add_score(FOOD_POINTS);
            ctx.emit(GameEvent::FoodEaten {
                length: self.length(),
            });
            // A full grid counts as reaching the target
            let placed = self.relocate_food();
            if self.length() >= self.target_length || !placed {
                log::info!("Snake level {} complete at length {}", self.level, self.length());
                ctx.level_complete();
                self.halt();
            }
            StepResult::Ate
        } else {
            self.body.pop_back();
            StepResult::Moved
        }
    }

    /// Wandering obstacles: the first `min(count, level / 2)` try one random step
    pub fn shift_obstacles(&mut self) {
        let to_move = self.obstacles.len().min((self.level / 2) as usize);
        let head = self.head();
        for i in 0..to_move {
            let dir = Direction::ALL[self.rng.random_range(0..4)];
            let target = self.obstacles[i] + dir.delta();
            if in_bounds(target) && target != head {
                self.obstacles[i] = target;
            }
        }
    }

    fn halt(&mut self) {
        self.over = true;
        self.timers.pause();
    }
}

impl RuleEngine for Snake {
    fn init(level: u32, config: &EngineConfig) -> Self {
        let step_interval_ms = Self::step_interval_for(level);
        let mut timers = TimerService::new();
        timers.schedule(step_interval_ms, SnakeTimer::Step, true);

        let mut snake = Self {
            level,
            body: VecDeque::from(vec![IVec2::new(3, 7), IVec2::new(2, 7), IVec2::new(1, 7)]),
            direction: Direction::Right,
            next_direction: Direction::Right,
            food: IVec2::ZERO,
            obstacles: Vec::new(),
            target_length: Self::target_length_for(level),
            step_interval_ms,
            timers,
            rng: config.rng(),
            over: false,
        };

        snake.place_obstacles();
        if level >= MOVING_OBSTACLE_LEVEL && !snake.obstacles.is_empty() {
            snake
                .timers
                .schedule(OBSTACLE_STEP_MS, SnakeTimer::ShiftObstacles, true);
        }
        snake.relocate_food();
        snake
    }

    fn tick(&mut self, dt_ms: f64, input: &TickInput, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }

        // Held arrows buffer a turn every frame, first match wins
        let held = [
            (input.held.left, Direction::Left),
            (input.held.right, Direction::Right),
            (input.held.up, Direction::Up),
            (input.held.down, Direction::Down),
        ];
        if let Some((_, dir)) = held
            .into_iter()
            .find(|(down, dir)| *down && *dir != self.direction.opposite())
        {
            self.next_direction = dir;
        }

        let until = self.timers.now_ms() + dt_ms;
        while let Some((_, event)) = self.timers.pop_due(until) {
            match event {
                SnakeTimer::Step => {
                    self.step(ctx);
                }
                SnakeTimer::ShiftObstacles => self.shift_obstacles(),
            }
            if self.over || !ctx.is_live() {
                return;
            }
        }
        self.timers.advance_to(until);
    }

    fn on_input(&mut self, event: &InputEvent, _ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        if let InputEvent::KeyDown(key) = event {
            if let Some(dir) = Direction::from_key(*key) {
                self.steer(dir);
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
    use proptest::prelude::*;

    fn snake(level: u32) -> Snake {
        Snake::init(level, &EngineConfig::for_tests(7))
    }

    #[test]
    fn test_level_formulas() {
        assert_eq!(Snake::target_length_for(1), 10);
        assert_eq!(Snake::target_length_for(3), 14);
        assert_eq!(Snake::step_interval_for(1), 140.0);
        assert_eq!(Snake::step_interval_for(12), 50.0);
        assert_eq!(Snake::obstacle_count_for(1), 0);
        assert_eq!(Snake::obstacle_count_for(2), 9);
        assert_eq!(Snake::obstacle_count_for(20), 30);
    }

    #[test]
    fn test_initial_layout() {
        let s = snake(1);
        assert_eq!(s.length(), START_LENGTH);
        assert_eq!(s.head(), IVec2::new(3, 7));
        assert!(s.obstacles().is_empty());
        assert!(!s.body().contains(&s.food()));
    }

    #[test]
    fn test_obstacles_avoid_snake_and_food() {
        for level in 2..10 {
            let s = Snake::init(level, &EngineConfig::for_tests(level as u64));
            assert!(s.obstacles().len() <= Snake::obstacle_count_for(level));
            for o in s.obstacles() {
                assert!(!s.body().contains(o));
                assert_ne!(*o, s.food());
            }
        }
    }

    #[test]
    fn test_reverse_is_refused() {
        let mut s = snake(1);
        assert!(!s.steer(Direction::Left));
        assert_eq!(s.next_direction(), Direction::Right);
        assert!(s.steer(Direction::Up));
        // Still heading right until the step commits, so Left stays refused
        assert!(!s.steer(Direction::Left));
    }

    #[test]
    fn test_wall_crash_loses_round() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut s = snake(1);
        s.food = IVec2::new(0, 0);

        let mut result = StepResult::Moved;
        for _ in 0..20 {
            result = s.step(&mut ctx);
            if result == StepResult::Crashed {
                break;
            }
        }
        assert_eq!(result, StepResult::Crashed);
        assert!(s.is_terminal());
        assert_eq!(session.lives, 2);
        assert!(events.contains(&GameEvent::Cue(Cue::Crash)));
    }

    #[test]
    fn test_moving_into_vacating_tail_is_legal() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut s = snake(1);
        // A 2x2 loop: head chases its own tail
        s.body = VecDeque::from(vec![
            IVec2::new(5, 5),
            IVec2::new(5, 6),
            IVec2::new(4, 6),
            IVec2::new(4, 5),
        ]);
        s.direction = Direction::Up;
        s.next_direction = Direction::Left;
        s.food = IVec2::new(12, 12);

        assert_eq!(s.step(&mut ctx), StepResult::Moved);
        assert_eq!(s.head(), IVec2::new(4, 5));
        assert_eq!(s.length(), 4);
    }

    #[test]
    fn test_eating_grows_and_relocates_food() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut s = snake(1);
        s.food = IVec2::new(4, 7);

        assert_eq!(s.step(&mut ctx), StepResult::Ate);
        assert_eq!(s.length(), 4);
        assert!(!s.is_occupied(s.food()));
        assert_eq!(session.score, FOOD_POINTS);
    }

    #[test]
    fn test_reaching_target_completes_level() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut s = snake(1);
        s.target_length = 4;
        s.food = IVec2::new(4, 7);
        s.step(&mut ctx);

        assert!(s.is_terminal());
        assert!(matches!(
            session.pending_outcome(),
            Some(Outcome::LevelComplete { level: 2, .. })
        ));
    }

    #[test]
    fn test_obstacles_never_step_onto_head() {
        let mut s = snake(MOVING_OBSTACLE_LEVEL + 3);
        for _ in 0..200 {
            s.shift_obstacles();
            assert!(!s.obstacles().contains(&s.head()));
            for o in s.obstacles() {
                assert!(in_bounds(*o));
            }
        }
    }

    #[test]
    fn test_moving_obstacle_timer_only_from_level_seven() {
        assert_eq!(snake(6).timers.pending(), 1);
        let s = snake(MOVING_OBSTACLE_LEVEL);
        assert_eq!(s.timers.pending(), if s.obstacles.is_empty() { 1 } else { 2 });
    }

    #[test]
    fn test_held_key_buffers_direction() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut s = snake(1);
        let mut input = TickInput::default();
        input.held.up = true;
        s.tick(1.0, &input, &mut ctx);
        assert_eq!(s.next_direction(), Direction::Up);
        s.tick(s.step_interval_ms(), &TickInput::default(), &mut ctx);
        assert_eq!(s.head(), IVec2::new(3, 6));
    }

    proptest! {
        #[test]
        fn prop_head_moves_one_cell_and_length_never_shrinks(
            seed in any::<u64>(),
            turns in proptest::collection::vec(0usize..4, 1..120),
        ) {
            let mut session = SessionState::new(1000);
            let mut events = Vec::new();
            let mut s = Snake::init(1, &EngineConfig::for_tests(seed));
            s.target_length = 1000;

            for t in turns {
                let mut ctx = RoundCtx::new(&mut session, &mut events);
                s.steer(Direction::ALL[t]);
                let prev_head = s.head();
                let prev_len = s.length();
                match s.step(&mut ctx) {
                    StepResult::Crashed => break,
                    StepResult::Ate => prop_assert_eq!(s.length(), prev_len + 1),
                    StepResult::Moved => prop_assert_eq!(s.length(), prev_len),
                }
                let d = s.head() - prev_head;
                prop_assert_eq!(d.x.abs() + d.y.abs(), 1);
                // No two cells coincide
                let mut cells: Vec<_> = s.body().iter().map(|c| (c.x, c.y)).collect();
                cells.sort();
                cells.dedup();
                prop_assert_eq!(cells.len(), s.body().len());
            }
        }
    }
}
