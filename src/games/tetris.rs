//! Falling-block puzzle
//!
//! 10x20 board of color ids (0 = empty). Gravity comes from a repeating drop
//! timer; key presses move, rotate or hard-drop the active piece. Any move the
//! board rejects is silently ignored.

use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::{EngineConfig, RuleEngine};
use crate::audio::Cue;
use crate::consts::LINE_POINTS;
use crate::sim::state::{GameEvent, RoundCtx};
use crate::sim::tick::{InputEvent, Key, TickInput};
use crate::sim::timer::TimerService;
use crate::{level_target, shrink_with_level};

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

/// Tetromino kinds, in the order the bag is indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    I,
    O,
    T,
    L,
    J,
    S,
    Z,
}

impl Shape {
    pub const ALL: [Shape; 7] = [
        Shape::I,
        Shape::O,
        Shape::T,
        Shape::L,
        Shape::J,
        Shape::S,
        Shape::Z,
    ];

    /// Spawn orientation, rows top to bottom
    pub fn matrix(&self) -> Vec<Vec<u8>> {
        let rows: &[&[u8]] = match self {
            Shape::I => &[&[1, 1, 1, 1]],
            Shape::O => &[&[1, 1], &[1, 1]],
            Shape::T => &[&[0, 1, 0], &[1, 1, 1]],
            Shape::L => &[&[1, 0, 0], &[1, 1, 1]],
            Shape::J => &[&[0, 0, 1], &[1, 1, 1]],
            Shape::S => &[&[0, 1, 1], &[1, 1, 0]],
            Shape::Z => &[&[1, 1, 0], &[0, 1, 1]],
        };
        rows.iter().map(|r| r.to_vec()).collect()
    }

    /// RGB color stored in the board for this shape
    pub fn color(&self) -> u32 {
        match self {
            Shape::I => 0x00ffff,
            Shape::O => 0xffff00,
            Shape::T => 0x800080,
            Shape::L => 0xff7f00,
            Shape::J => 0x0000ff,
            Shape::S => 0x00ff00,
            Shape::Z => 0xff0000,
        }
    }
}

/// Rotate a shape matrix 90° clockwise (transpose then reverse each row)
pub fn rotate_matrix(matrix: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let rows = matrix.len();
    let cols = matrix.first().map_or(0, |r| r.len());
    let mut rotated = vec![vec![0; rows]; cols];
    for (y, row) in matrix.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            rotated[x][rows - 1 - y] = cell;
        }
    }
    rotated
}

/// The falling piece
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Piece {
    pub shape: Shape,
    pub matrix: Vec<Vec<u8>>,
    /// Board column of the matrix's left edge
    pub x: i32,
    /// Board row of the matrix's top edge
    pub y: i32,
    pub color: u32,
}

impl Piece {
    /// New piece horizontally centered on the top row
    pub fn spawn(shape: Shape) -> Self {
        let matrix = shape.matrix();
        let width = matrix[0].len() as i32;
        Self {
            shape,
            x: BOARD_WIDTH as i32 / 2 - width / 2,
            y: 0,
            color: shape.color(),
            matrix,
        }
    }

    /// Board coordinates of every filled cell at an offset position
    pub fn cells_at(&self, x: i32, y: i32) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.matrix.iter().enumerate().flat_map(move |(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, c)| **c != 0)
                .map(move |(col, _)| (x + col as i32, y + row as i32))
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells_at(self.x, self.y)
    }
}

/// Cell grid; rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: Vec<Vec<u32>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            rows: vec![vec![0; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        BOARD_WIDTH
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    pub fn get(&self, x: i32, y: i32) -> Option<u32> {
        if x < 0 || y < 0 {
            return None;
        }
        self.rows.get(y as usize)?.get(x as usize).copied()
    }

    pub fn set(&mut self, x: usize, y: usize, color: u32) {
        self.rows[y][x] = color;
    }

    pub fn filled_cells(&self) -> usize {
        self.rows.iter().flatten().filter(|c| **c != 0).count()
    }

    /// True if `matrix` placed at (x, y) stays in bounds and hits no filled cell.
    /// Rows above the board (negative y) are open.
    pub fn fits(&self, matrix: &[Vec<u8>], x: i32, y: i32) -> bool {
        for (row, cells) in matrix.iter().enumerate() {
            for (col, &cell) in cells.iter().enumerate() {
                if cell == 0 {
                    continue;
                }
                let bx = x + col as i32;
                let by = y + row as i32;
                if bx < 0 || bx >= BOARD_WIDTH as i32 || by >= self.rows.len() as i32 {
                    return false;
                }
                if by >= 0 && self.rows[by as usize][bx as usize] != 0 {
                    return false;
                }
            }
        }
        true
    }

    /// Write the piece's cells into the grid
    pub fn lock(&mut self, piece: &Piece) {
        let height = self.rows.len() as i32;
        for (x, y) in piece.cells() {
            if (0..height).contains(&y) && (0..BOARD_WIDTH as i32).contains(&x) {
                self.rows[y as usize][x as usize] = piece.color;
            }
        }
    }

    /// Remove full rows bottom to top, inserting an empty row on top for each.
    /// Returns how many rows were removed.
    pub fn clear_lines(&mut self) -> u32 {
        let mut cleared = 0;
        let mut y = self.rows.len();
        while y > 0 {
            let row = y - 1;
            if self.rows[row].iter().all(|c| *c != 0) {
                self.rows.remove(row);
                self.rows.insert(0, vec![0; BOARD_WIDTH]);
                cleared += 1;
                // Same index again: the rows above shifted down into it
            } else {
                y -= 1;
            }
        }
        cleared
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TetrisTimer {
    Drop,
}

/// Tetris rule engine
#[derive(Debug, Clone)]
pub struct Tetris {
    level: u32,
    board: Board,
    piece: Piece,
    lines_cleared: u32,
    required_lines: u32,
    drop_interval_ms: f64,
    timers: TimerService<TetrisTimer>,
    rng: Pcg32,
    over: bool,
}

impl Tetris {
    /// Lines needed to finish `level`
    pub fn required_lines_for(level: u32) -> u32 {
        level_target(5, 2, level)
    }

    /// Gravity period for `level`
    pub fn drop_interval_for(level: u32) -> f64 {
        shrink_with_level(1000.0, 75.0, level, 200.0)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn piece(&self) -> &Piece {
        &self.piece
    }

    pub fn lines_cleared(&self) -> u32 {
        self.lines_cleared
    }

    pub fn required_lines(&self) -> u32 {
        self.required_lines
    }

    pub fn drop_interval_ms(&self) -> f64 {
        self.drop_interval_ms
    }

    pub fn move_left(&mut self) -> bool {
        self.try_shift(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.try_shift(1, 0)
    }

    /// Soft drop by one row; never locks
    pub fn move_down(&mut self) -> bool {
        self.try_shift(0, 1)
    }

    fn try_shift(&mut self, dx: i32, dy: i32) -> bool {
        if self.over {
            return false;
        }
        let (x, y) = (self.piece.x + dx, self.piece.y + dy);
        if self.board.fits(&self.piece.matrix, x, y) {
            self.piece.x = x;
            self.piece.y = y;
            true
        } else {
            false
        }
    }

    /// Rotate clockwise in place; rejected outright if it would collide
    pub fn rotate(&mut self, ctx: &mut RoundCtx) -> bool {
        if self.over {
            return false;
        }
        let rotated = rotate_matrix(&self.piece.matrix);
        if self.board.fits(&rotated, self.piece.x, self.piece.y) {
            self.piece.matrix = rotated;
            ctx.cue(Cue::Rotate);
            true
        } else {
            false
        }
    }

    /// Drop to the lowest legal row and lock immediately
    pub fn hard_drop(&mut self, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        while self.board.fits(&self.piece.matrix, self.piece.x, self.piece.y + 1) {
            self.piece.y += 1;
        }
        ctx.cue(Cue::Drop);
        self.settle(ctx);
    }

    /// One gravity step: fall a row, or lock and spawn the next piece
    pub fn drop_step(&mut self, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        if !self.move_down() {
            self.settle(ctx);
        }
    }

    fn settle(&mut self, ctx: &mut RoundCtx) {
        self.board.lock(&self.piece);
        ctx.emit(GameEvent::PieceLocked);

        let cleared = self.board.clear_lines();
        if cleared > 0 {
            self.lines_cleared += cleared;
            ctx.cue(Cue::LineClear);
            ctx.add_score(cleared * LINE_POINTS);
            ctx.emit(GameEvent::LinesCleared {
                count: cleared,
                total: self.lines_cleared,
            });

            if self.lines_cleared >= self.required_lines {
                log::info!(
                    "Tetris level {} cleared ({} lines)",
                    self.level,
                    self.lines_cleared
                );
                ctx.level_complete();
                self.halt();
                return;
            }
        }

        let shape = self.random_shape();
        self.spawn(shape, ctx);
    }

    fn random_shape(&mut self) -> Shape {
        Shape::ALL[self.rng.random_range(0..Shape::ALL.len())]
    }

    /// Put `shape` at the top. A spawn that collides ends the round at once.
    pub fn spawn(&mut self, shape: Shape, ctx: &mut RoundCtx) {
        self.piece = Piece::spawn(shape);
        if !self.board.fits(&self.piece.matrix, self.piece.x, self.piece.y) {
            log::info!("Tetris spawn blocked at level {}", self.level);
            ctx.round_lost();
            self.halt();
        }
    }

    fn halt(&mut self) {
        self.over = true;
        self.timers.pause();
    }
}

impl RuleEngine for Tetris {
    fn init(level: u32, config: &EngineConfig) -> Self {
        let mut rng = config.rng();
        let shape = Shape::ALL[rng.random_range(0..Shape::ALL.len())];
        let drop_interval_ms = Self::drop_interval_for(level);

        let mut timers = TimerService::new();
        timers.schedule(drop_interval_ms, TetrisTimer::Drop, true);

        Self {
            level,
            board: Board::new(),
            piece: Piece::spawn(shape),
            lines_cleared: 0,
            required_lines: Self::required_lines_for(level),
            drop_interval_ms,
            timers,
            rng,
            over: false,
        }
    }

    fn tick(&mut self, dt_ms: f64, _input: &TickInput, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        let until = self.timers.now_ms() + dt_ms;
        while let Some((_, TetrisTimer::Drop)) = self.timers.pop_due(until) {
            self.drop_step(ctx);
            if self.over || !ctx.is_live() {
                return;
            }
        }
        self.timers.advance_to(until);
    }

    fn on_input(&mut self, event: &InputEvent, ctx: &mut RoundCtx) {
        if self.over {
            return;
        }
        match event {
            InputEvent::KeyDown(Key::Left) => {
                self.move_left();
            }
            InputEvent::KeyDown(Key::Right) => {
                self.move_right();
            }
            InputEvent::KeyDown(Key::Down) => {
                self.move_down();
            }
            InputEvent::KeyDown(Key::Up) => {
                self.rotate(ctx);
            }
            InputEvent::KeyDown(Key::Action) => self.hard_drop(ctx),
            _ => {}
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

    fn engine(level: u32) -> Tetris {
        Tetris::init(level, &EngineConfig::for_tests(42))
    }

    fn full_row() -> Vec<u32> {
        vec![7; BOARD_WIDTH]
    }

    #[test]
    fn test_level_formulas() {
        assert_eq!(Tetris::required_lines_for(1), 5);
        assert_eq!(Tetris::required_lines_for(4), 11);
        assert_eq!(Tetris::drop_interval_for(1), 925.0);
        assert_eq!(Tetris::drop_interval_for(11), 200.0);
        assert_eq!(Tetris::drop_interval_for(50), 200.0);
    }

    #[test]
    fn test_rotate_matrix() {
        let t = Shape::T.matrix();
        assert_eq!(rotate_matrix(&t), vec![vec![1, 0], vec![1, 1], vec![1, 0]]);
        let i = Shape::I.matrix();
        assert_eq!(rotate_matrix(&i), vec![vec![1], vec![1], vec![1], vec![1]]);
        // Four turns is the identity
        let mut s = Shape::S.matrix();
        for _ in 0..4 {
            s = rotate_matrix(&s);
        }
        assert_eq!(s, Shape::S.matrix());
    }

    #[test]
    fn test_spawn_is_centered() {
        assert_eq!(Piece::spawn(Shape::I).x, 3);
        assert_eq!(Piece::spawn(Shape::O).x, 4);
        assert_eq!(Piece::spawn(Shape::T).x, 4);
        assert_eq!(Piece::spawn(Shape::T).y, 0);
    }

    #[test]
    fn test_walls_reject_moves() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut t = engine(1);
        t.spawn(Shape::O, &mut ctx);

        for _ in 0..4 {
            assert!(t.move_left());
        }
        assert!(!t.move_left());
        assert_eq!(t.piece().x, 0);

        for _ in 0..8 {
            t.move_right();
        }
        assert_eq!(t.piece().x, 8);
        assert!(!t.move_right());
    }

    #[test]
    fn test_rotation_against_wall_is_rejected() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut t = engine(1);
        t.spawn(Shape::I, &mut ctx);
        assert!(t.rotate(&mut ctx));
        // Vertical I against the right wall
        while t.move_right() {}
        assert_eq!(t.piece().x, 9);
        let before = t.piece().matrix.clone();
        assert!(!t.rotate(&mut ctx));
        assert_eq!(t.piece().matrix, before);
    }

    #[test]
    fn test_drop_nineteen_times_locks_on_bottom_row() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        let mut t = engine(1);
        t.spawn(Shape::O, &mut ctx);
        assert_eq!((t.piece().x, t.piece().y), (4, 0));

        for _ in 0..19 {
            t.drop_step(&mut ctx);
        }

        let board = t.board();
        assert_eq!(board.height(), BOARD_HEIGHT);
        assert_eq!(board.get(4, 19), Some(Shape::O.color()));
        assert_eq!(board.get(5, 19), Some(Shape::O.color()));
        assert_eq!(board.get(4, 18), Some(Shape::O.color()));
        assert_eq!(board.filled_cells(), 4);
        assert!(events.contains(&GameEvent::PieceLocked));
    }

    #[test]
    fn test_clear_lines_rechecks_same_row() {
        let mut board = Board::new();
        board.rows[19] = full_row();
        board.rows[18] = full_row();
        board.rows[17][0] = 3;
        board.rows[16] = full_row();

        assert_eq!(board.clear_lines(), 3);
        assert_eq!(board.height(), BOARD_HEIGHT);
        assert_eq!(board.rows[19][0], 3);
        assert_eq!(board.filled_cells(), 1);
    }

    #[test]
    fn test_hard_drop_clears_line_and_scores() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut t = engine(1);
        // Bottom row full except columns 3..7, filled by a flat I
        for x in 0..BOARD_WIDTH {
            if !(3..7).contains(&x) {
                t.board.set(x, 19, 1);
            }
        }
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        t.spawn(Shape::I, &mut ctx);
        t.hard_drop(&mut ctx);

        assert_eq!(t.lines_cleared(), 1);
        assert_eq!(t.board().filled_cells(), 0);
        assert_eq!(session.score, LINE_POINTS);
        assert!(events.contains(&GameEvent::Cue(Cue::LineClear)));
    }

    #[test]
    fn test_required_lines_completes_level() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut t = engine(1);
        t.lines_cleared = t.required_lines() - 1;
        for x in 0..BOARD_WIDTH {
            if !(3..7).contains(&x) {
                t.board.set(x, 19, 1);
            }
        }
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        t.spawn(Shape::I, &mut ctx);
        t.hard_drop(&mut ctx);

        assert!(t.is_terminal());
        assert_eq!(
            session.pending_outcome(),
            Some(Outcome::LevelComplete { level: 2, score: LINE_POINTS })
        );
    }

    #[test]
    fn test_blocked_spawn_loses_round() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut t = engine(1);
        for x in 0..BOARD_WIDTH - 1 {
            t.board.set(x, 0, 1);
        }
        let mut ctx = RoundCtx::new(&mut session, &mut events);
        t.spawn(Shape::O, &mut ctx);

        assert!(t.is_terminal());
        assert_eq!(session.lives, 2);
        assert!(session.restart_requested());
    }

    #[test]
    fn test_gravity_driven_by_timer() {
        let mut session = SessionState::default();
        let mut events = Vec::new();
        let mut t = engine(1);
        let start_y = t.piece().y;
        let mut ctx = RoundCtx::new(&mut session, &mut events);

        t.tick(900.0, &TickInput::default(), &mut ctx);
        assert_eq!(t.piece().y, start_y);
        t.tick(30.0, &TickInput::default(), &mut ctx);
        assert_eq!(t.piece().y, start_y + 1);
    }

    #[test]
    fn test_teardown_cancels_drop_timer() {
        let mut t = engine(3);
        assert_eq!(t.teardown(), 1);
        assert_eq!(t.teardown(), 0);
    }

    proptest! {
        #[test]
        fn prop_locked_cells_stay_in_bounds(
            seed in any::<u64>(),
            moves in proptest::collection::vec(0u8..6, 1..200),
        ) {
            let mut session = SessionState::new(1000);
            let mut events = Vec::new();
            let mut t = Tetris::init(1, &EngineConfig::for_tests(seed));

            for m in moves {
                if t.is_terminal() {
                    break;
                }
                let mut ctx = RoundCtx::new(&mut session, &mut events);
                let before = t.board().filled_cells();
                // Active cells never overlap filled ones before a lock
                for (x, y) in t.piece().cells() {
                    prop_assert!(x >= 0 && x < BOARD_WIDTH as i32);
                    prop_assert!(y < BOARD_HEIGHT as i32);
                    if y >= 0 {
                        prop_assert_eq!(t.board().get(x, y), Some(0));
                    }
                }
                match m {
                    0 => { t.move_left(); }
                    1 => { t.move_right(); }
                    2 => { t.move_down(); }
                    3 => { t.rotate(&mut ctx); }
                    4 => t.hard_drop(&mut ctx),
                    _ => t.drop_step(&mut ctx),
                }
                prop_assert_eq!(t.board().height(), BOARD_HEIGHT);
                prop_assert!(t.board().filled_cells() <= before + 4);
            }
        }
    }
}
