//! Game state: field, falling pair, chain resolution, tick state machine.

use crate::GameConfig;
use std::collections::HashSet;
use std::time::Duration;

/// Number of puyo colors; occupied cells carry a color in 1..=NUM_COLORS.
pub const NUM_COLORS: u8 = 4;

/// Blink period while a clearing wave is pending (render flicker only).
const BLINK_INTERVAL_MS: u128 = 100;

/// Child offset from the pivot per rotation index (clockwise: up, right, down, left).
const ROTATION_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Single cell: either empty or a puyo of a given colour (1..=NUM_COLORS).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Puyo(u8),
}

impl Cell {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Colour index for occupied cells.
    #[inline]
    pub fn color(&self) -> Option<u8> {
        match self {
            Self::Empty => None,
            Self::Puyo(c) => Some(*c),
        }
    }
}

/// One half of a pair: grid position plus colour. Rows may be negative while
/// the pair is still falling in from above the visible field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairCell {
    pub x: i32,
    pub y: i32,
    pub color: u8,
}

/// The falling two-cell unit: pivot plus child, with the child's offset from
/// the pivot encoded by the rotation index (0..4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub pivot: PairCell,
    pub child: PairCell,
    pub rot: u8,
}

impl Pair {
    pub fn cells(&self) -> [PairCell; 2] {
        [self.pivot, self.child]
    }
}

/// Playfield: grid of cells. y=0 is top; rows are stored [0..rows].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    rows: usize,
    cols: usize,
    /// cells[y][x]. cells[0] is the top row.
    cells: Vec<Vec<Cell>>,
}

impl Field {
    pub fn new(rows: u16, cols: u16) -> Self {
        let (rows, cols) = (rows as usize, cols as usize);
        let cells = (0..rows).map(|_| vec![Cell::Empty; cols]).collect();
        Self { rows, cols, cells }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.cols && y < self.rows {
            self.cells[y][x] = cell;
        }
    }

    /// Write the given cells into the grid. Entries outside the field are
    /// dropped individually; in-bounds siblings are still written.
    pub fn place_cells(&mut self, cells: &[PairCell]) {
        for cell in cells {
            if cell.y < 0 || cell.y >= self.rows as i32 {
                continue;
            }
            if cell.x < 0 || cell.x >= self.cols as i32 {
                continue;
            }
            self.cells[cell.y as usize][cell.x as usize] = Cell::Puyo(cell.color);
        }
    }

    /// Compact every column to the bottom, keeping the relative vertical
    /// order of its occupied cells. Idempotent.
    pub fn apply_gravity(&mut self) {
        for x in 0..self.cols {
            let mut write = self.rows;
            for y in (0..self.rows).rev() {
                if let Cell::Puyo(c) = self.cells[y][x] {
                    write -= 1;
                    if write != y {
                        self.cells[write][x] = Cell::Puyo(c);
                        self.cells[y][x] = Cell::Empty;
                    }
                }
            }
        }
    }

    /// All cells belonging to 4-connected same-colour groups of size >= 4,
    /// disjoint groups concatenated. Explicit stack, no recursion.
    pub fn find_matches(&self) -> Vec<(usize, usize)> {
        const DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        let mut matches = Vec::new();

        for y in 0..self.rows {
            for x in 0..self.cols {
                let color = match self.cells[y][x] {
                    Cell::Puyo(c) => c,
                    Cell::Empty => continue,
                };
                if visited.contains(&(x, y)) {
                    continue;
                }
                let mut group = Vec::new();
                let mut stack = vec![(x, y)];
                visited.insert((x, y));

                while let Some((cx, cy)) = stack.pop() {
                    group.push((cx, cy));
                    for (dx, dy) in DIRS {
                        let nx = cx as i32 + dx;
                        let ny = cy as i32 + dy;
                        if nx < 0 || nx >= self.cols as i32 || ny < 0 || ny >= self.rows as i32 {
                            continue;
                        }
                        let (nx, ny) = (nx as usize, ny as usize);
                        if visited.contains(&(nx, ny)) {
                            continue;
                        }
                        if self.cells[ny][nx] != Cell::Puyo(color) {
                            continue;
                        }
                        visited.insert((nx, ny));
                        stack.push((nx, ny));
                    }
                }

                if group.len() >= 4 {
                    matches.extend(group);
                }
            }
        }
        matches
    }
}

/// Colour source for fresh pairs (LCG; seedable for deterministic runs).
#[derive(Debug, Clone)]
struct ColorRng {
    state: u32,
}

impl ColorRng {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_rand(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state >> 16
    }

    /// Uniform colour in 1..=NUM_COLORS (16-bit output, NUM_COLORS divides 2^16).
    fn next_color(&mut self) -> u8 {
        1 + (self.next_rand() % u32::from(NUM_COLORS)) as u8
    }
}

/// Current phase of the turn cycle. Per-phase data lives in the variant so a
/// stale matched set or clear timer cannot outlive its phase.
#[derive(Debug, Clone)]
pub enum Phase {
    Falling,
    Clearing {
        countdown: Duration,
        blink: Duration,
        matched: Vec<(usize, usize)>,
        matched_set: HashSet<(usize, usize)>,
    },
    SpawnDelay {
        countdown: Duration,
    },
}

/// One game session: field, active pair, lookahead pairs, timers, chain
/// counters. Everything is owned here; `reset` rebuilds it in place.
#[derive(Debug)]
pub struct GameState {
    field: Field,
    current: Option<Pair>,
    next_pairs: [Pair; 2],
    rng: ColorRng,
    phase: Phase,
    drop_timer: Duration,
    soft_drop: bool,
    chain: u32,
    max_chain: u32,
    sessions: u32,
    rows: u16,
    cols: u16,
    drop_interval: Duration,
    soft_drop_interval: Duration,
    spawn_delay: Duration,
    clear_duration: Duration,
}

impl GameState {
    pub fn new(config: &GameConfig) -> Self {
        let mut rng = ColorRng::new(config.seed);
        let spawn_col = Self::spawn_col(config.cols);
        let next_pairs = [
            Self::make_pair(spawn_col, &mut rng),
            Self::make_pair(spawn_col, &mut rng),
        ];
        Self {
            field: Field::new(config.rows, config.cols),
            current: None,
            next_pairs,
            rng,
            phase: Phase::Falling,
            drop_timer: Duration::ZERO,
            soft_drop: false,
            chain: 0,
            max_chain: 0,
            sessions: 0,
            rows: config.rows,
            cols: config.cols,
            drop_interval: config.drop_interval,
            soft_drop_interval: config.soft_drop_interval,
            spawn_delay: config.spawn_delay,
            clear_duration: config.clear_duration,
        }
    }

    fn spawn_col(cols: u16) -> i32 {
        (i32::from(cols) / 2 - 1).max(0)
    }

    fn make_pair(spawn_col: i32, rng: &mut ColorRng) -> Pair {
        Pair {
            pivot: PairCell {
                x: spawn_col,
                y: 0,
                color: rng.next_color(),
            },
            child: PairCell {
                x: spawn_col,
                y: -1,
                color: rng.next_color(),
            },
            rot: 0,
        }
    }

    /// Reinitialize the session: field, pairs, timers, current chain. The
    /// max-chain high-water mark survives for the lifetime of the process.
    pub fn reset(&mut self) {
        let spawn_col = Self::spawn_col(self.cols);
        self.field = Field::new(self.rows, self.cols);
        self.current = None;
        self.next_pairs = [
            Self::make_pair(spawn_col, &mut self.rng),
            Self::make_pair(spawn_col, &mut self.rng),
        ];
        self.phase = Phase::Falling;
        self.drop_timer = Duration::ZERO;
        self.soft_drop = false;
        self.chain = 0;
        self.sessions = self.sessions.wrapping_add(1);
    }

    /// True if (x, y) is blocked: outside a wall or the floor, or occupied.
    /// Cells above the top edge (y < 0) are always free.
    pub fn collides(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.field.cols() as i32 || y >= self.field.rows() as i32 {
            return true;
        }
        if y < 0 {
            return false;
        }
        !matches!(self.field.get(x as usize, y as usize), Some(Cell::Empty))
    }

    /// Translate the active pair by (dx, dy) if both cells stay free.
    /// All-or-nothing: a blocked cell leaves the pair untouched.
    pub fn try_move(&mut self, dx: i32, dy: i32) -> bool {
        let (pivot, child) = match &self.current {
            Some(p) => (p.pivot, p.child),
            None => return false,
        };
        if self.collides(pivot.x + dx, pivot.y + dy) || self.collides(child.x + dx, child.y + dy) {
            return false;
        }
        if let Some(pair) = self.current.as_mut() {
            pair.pivot.x += dx;
            pair.pivot.y += dy;
            pair.child.x += dx;
            pair.child.y += dy;
        }
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.try_move(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.try_move(1, 0)
    }

    /// Rotate the child clockwise around the pivot. If the target cell is
    /// blocked, kick: retry with the target (and pivot) shifted one column
    /// left, then one column right. Both blocked: no-op.
    pub fn rotate(&mut self) -> bool {
        let (pivot, rot) = match &self.current {
            Some(p) => (p.pivot, p.rot),
            None => return false,
        };
        let next_rot = (rot + 1) % 4;
        let (ox, oy) = ROTATION_OFFSETS[next_rot as usize];
        let (tx, ty) = (pivot.x + ox, pivot.y + oy);

        let shift = if !self.collides(tx, ty) {
            0
        } else if !self.collides(tx - 1, ty) {
            -1
        } else if !self.collides(tx + 1, ty) {
            1
        } else {
            return false;
        };
        if let Some(pair) = self.current.as_mut() {
            pair.pivot.x += shift;
            pair.child.x = tx + shift;
            pair.child.y = ty;
            pair.rot = next_rot;
        }
        true
    }

    /// Soft drop is a held state: short drop interval while on.
    pub fn set_soft_drop(&mut self, on: bool) {
        self.soft_drop = on;
    }

    /// Advance the session by one tick of wall-clock time. Must be called
    /// serially; actions (move/rotate/reset) apply between ticks.
    pub fn update(&mut self, delta: Duration) {
        match &mut self.phase {
            Phase::SpawnDelay { countdown } => {
                *countdown = countdown.saturating_sub(delta);
                if countdown.is_zero() {
                    self.enter_falling();
                }
            }
            Phase::Clearing { countdown, blink, .. } => {
                *countdown = countdown.saturating_sub(delta);
                *blink += delta;
                if countdown.is_zero() {
                    self.finish_wave();
                }
            }
            Phase::Falling => {
                if self.current.is_none() && !self.spawn_pair() {
                    // Board was full; the session has been reset.
                    return;
                }
                self.drop_timer += delta;
                let interval = if self.soft_drop {
                    self.soft_drop_interval
                } else {
                    self.drop_interval
                };
                if self.drop_timer >= interval {
                    self.drop_timer = Duration::ZERO;
                    if !self.try_move(0, 1) {
                        self.lock_pair();
                    }
                }
            }
        }
    }

    /// Promote lookahead 1 to active and generate a fresh lookahead 2.
    /// A blocked spawn cell resets the whole session instead (board full).
    fn spawn_pair(&mut self) -> bool {
        let spawn_col = Self::spawn_col(self.cols);
        let fresh = Self::make_pair(spawn_col, &mut self.rng);
        let pair = self.next_pairs[0];
        self.next_pairs[0] = self.next_pairs[1];
        self.next_pairs[1] = fresh;
        if self.collides(pair.pivot.x, pair.pivot.y) || self.collides(pair.child.x, pair.child.y) {
            self.reset();
            return false;
        }
        self.current = Some(pair);
        true
    }

    fn lock_pair(&mut self) {
        let pair = match self.current.take() {
            Some(p) => p,
            None => return,
        };
        self.field.place_cells(&pair.cells());
        self.field.apply_gravity();
        self.drop_timer = Duration::ZERO;
        self.chain = 0;
        self.resolve_clears();
    }

    fn resolve_clears(&mut self) {
        let matches = self.field.find_matches();
        if matches.is_empty() {
            self.enter_spawn_delay();
        } else {
            self.start_wave(matches);
        }
    }

    /// End of a clearing wave: remove the matched cells, settle, rematch.
    fn finish_wave(&mut self) {
        let matched = match &mut self.phase {
            Phase::Clearing { matched, .. } => std::mem::take(matched),
            _ => return,
        };
        for &(x, y) in &matched {
            self.field.set(x, y, Cell::Empty);
        }
        self.field.apply_gravity();
        self.resolve_clears();
    }

    fn start_wave(&mut self, matched: Vec<(usize, usize)>) {
        self.chain += 1;
        if self.chain > self.max_chain {
            self.max_chain = self.chain;
        }
        let matched_set = matched.iter().copied().collect();
        self.phase = Phase::Clearing {
            countdown: self.clear_duration,
            blink: Duration::ZERO,
            matched,
            matched_set,
        };
    }

    fn enter_spawn_delay(&mut self) {
        self.chain = 0;
        self.phase = Phase::SpawnDelay {
            countdown: self.spawn_delay,
        };
    }

    fn enter_falling(&mut self) {
        self.phase = Phase::Falling;
        self.drop_timer = Duration::ZERO;
        if self.current.is_none() {
            self.spawn_pair();
        }
    }

    #[inline]
    pub fn field(&self) -> &Field {
        &self.field
    }

    #[inline]
    pub fn current(&self) -> Option<&Pair> {
        self.current.as_ref()
    }

    /// Lookahead pairs, next-to-fall first.
    #[inline]
    pub fn next_pairs(&self) -> &[Pair; 2] {
        &self.next_pairs
    }

    #[inline]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[inline]
    pub fn chain(&self) -> u32 {
        self.chain
    }

    #[inline]
    pub fn max_chain(&self) -> u32 {
        self.max_chain
    }

    /// Number of session resets so far (board-full or manual).
    #[inline]
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Blink gate for the clearing flicker; false outside a clearing wave.
    pub fn blink_on(&self) -> bool {
        match &self.phase {
            Phase::Clearing { blink, .. } => (blink.as_millis() / BLINK_INTERVAL_MS) % 2 == 0,
            _ => false,
        }
    }

    /// True while (x, y) belongs to the wave currently being cleared.
    pub fn is_clearing_cell(&self, x: usize, y: usize) -> bool {
        match &self.phase {
            Phase::Clearing { matched_set, .. } => matched_set.contains(&(x, y)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: u8 = 1;
    const BLUE: u8 = 2;
    const YELLOW: u8 = 3;
    const GREEN: u8 = 4;

    fn config(rows: u16, cols: u16) -> GameConfig {
        GameConfig {
            rows,
            cols,
            drop_interval: Duration::from_millis(550),
            soft_drop_interval: Duration::from_millis(70),
            spawn_delay: Duration::from_millis(220),
            clear_duration: Duration::from_millis(480),
            seed: 7,
        }
    }

    fn state(rows: u16, cols: u16) -> GameState {
        GameState::new(&config(rows, cols))
    }

    fn cell(x: i32, y: i32, color: u8) -> PairCell {
        PairCell { x, y, color }
    }

    fn column(field: &Field, x: usize) -> Vec<Cell> {
        (0..field.rows()).map(|y| field.get(x, y).unwrap()).collect()
    }

    fn occupied_count(field: &Field) -> usize {
        (0..field.rows())
            .map(|y| {
                (0..field.cols())
                    .filter(|&x| !field.get(x, y).unwrap().is_empty())
                    .count()
            })
            .sum()
    }

    fn pair_at(x: i32, y: i32, pivot_color: u8, child_color: u8) -> Pair {
        Pair {
            pivot: cell(x, y, pivot_color),
            child: cell(x, y - 1, child_color),
            rot: 0,
        }
    }

    #[test]
    fn gravity_compacts_each_column_to_bottom() {
        let mut field = Field::new(4, 2);
        field.place_cells(&[cell(0, 1, RED), cell(0, 3, YELLOW), cell(1, 2, BLUE)]);

        field.apply_gravity();

        assert_eq!(
            column(&field, 0),
            vec![Cell::Empty, Cell::Empty, Cell::Puyo(RED), Cell::Puyo(YELLOW)]
        );
        assert_eq!(
            column(&field, 1),
            vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Puyo(BLUE)]
        );
    }

    #[test]
    fn gravity_settles_higher_cell_above_existing_occupant() {
        let mut field = Field::new(4, 2);
        field.place_cells(&[cell(0, 3, 9)]);
        field.place_cells(&[cell(0, 2, RED), cell(1, 2, BLUE)]);

        field.apply_gravity();

        assert_eq!(
            column(&field, 0),
            vec![Cell::Empty, Cell::Empty, Cell::Puyo(RED), Cell::Puyo(9)]
        );
        assert_eq!(
            column(&field, 1),
            vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Puyo(BLUE)]
        );
    }

    #[test]
    fn gravity_is_idempotent() {
        let mut field = Field::new(6, 3);
        field.place_cells(&[
            cell(0, 0, RED),
            cell(0, 3, BLUE),
            cell(1, 2, GREEN),
            cell(2, 1, YELLOW),
            cell(2, 4, RED),
        ]);
        field.apply_gravity();
        let once = field.clone();
        field.apply_gravity();
        assert_eq!(field, once);
    }

    #[test]
    fn gravity_preserves_column_order_and_multiset() {
        let mut field = Field::new(6, 1);
        field.place_cells(&[cell(0, 0, RED), cell(0, 2, BLUE), cell(0, 4, YELLOW)]);

        field.apply_gravity();

        assert_eq!(
            column(&field, 0),
            vec![
                Cell::Empty,
                Cell::Empty,
                Cell::Empty,
                Cell::Puyo(RED),
                Cell::Puyo(BLUE),
                Cell::Puyo(YELLOW)
            ]
        );
    }

    #[test]
    fn gravity_noop_on_settled_field() {
        let mut field = Field::new(3, 3);
        field.place_cells(&[cell(0, 2, RED), cell(1, 2, BLUE), cell(2, 2, YELLOW)]);
        let before = field.clone();
        field.apply_gravity();
        assert_eq!(field, before);
    }

    #[test]
    fn no_match_for_group_of_three() {
        let mut field = Field::new(12, 6);
        field.place_cells(&[cell(0, 11, RED), cell(1, 11, RED), cell(2, 11, RED)]);
        assert!(field.find_matches().is_empty());
    }

    #[test]
    fn match_includes_every_cell_of_group_of_four() {
        let mut field = Field::new(12, 6);
        // L-shaped group.
        field.place_cells(&[
            cell(0, 11, RED),
            cell(1, 11, RED),
            cell(2, 11, RED),
            cell(0, 10, RED),
        ]);
        let mut matches = field.find_matches();
        matches.sort_unstable();
        assert_eq!(matches, vec![(0, 10), (0, 11), (1, 11), (2, 11)]);
    }

    #[test]
    fn disjoint_groups_are_concatenated() {
        let mut field = Field::new(12, 6);
        field.place_cells(&[
            cell(0, 11, RED),
            cell(0, 10, RED),
            cell(0, 9, RED),
            cell(0, 8, RED),
            cell(5, 11, BLUE),
            cell(5, 10, BLUE),
            cell(5, 9, BLUE),
            cell(5, 8, BLUE),
        ]);
        let matches = field.find_matches();
        assert_eq!(matches.len(), 8);
        assert!(matches.contains(&(0, 8)));
        assert!(matches.contains(&(5, 8)));
    }

    #[test]
    fn diagonal_touch_does_not_connect() {
        let mut field = Field::new(12, 6);
        // Two diagonal dominoes of the same colour: 2 + 2, never 4.
        field.place_cells(&[
            cell(0, 11, RED),
            cell(1, 11, RED),
            cell(2, 10, RED),
            cell(3, 10, RED),
        ]);
        assert!(field.find_matches().is_empty());
    }

    #[test]
    fn place_cells_drops_out_of_bounds_entries() {
        let mut field = Field::new(4, 2);
        field.place_cells(&[
            cell(0, -1, RED),
            cell(-1, 2, BLUE),
            cell(2, 2, YELLOW),
            cell(0, 4, GREEN),
            cell(1, 1, BLUE),
        ]);
        // Only the in-bounds entry landed; nothing else changed.
        assert_eq!(field.get(1, 1), Some(Cell::Puyo(BLUE)));
        assert_eq!(occupied_count(&field), 1);
    }

    #[test]
    fn collision_rules() {
        let mut st = state(12, 6);
        st.field.place_cells(&[cell(3, 5, RED)]);
        assert!(st.collides(-1, 0), "left wall");
        assert!(st.collides(6, 0), "right wall");
        assert!(st.collides(0, 12), "floor");
        assert!(!st.collides(0, -3), "above the top edge is free");
        assert!(st.collides(3, 5), "occupied cell");
        assert!(!st.collides(3, 4), "empty cell");
    }

    #[test]
    fn blocked_move_leaves_pair_unchanged() {
        let mut st = state(12, 6);
        st.current = Some(pair_at(0, 5, RED, BLUE));
        assert!(!st.move_left());
        let pair = st.current.unwrap();
        assert_eq!((pair.pivot.x, pair.pivot.y), (0, 5));
        assert_eq!((pair.child.x, pair.child.y), (0, 4));
        assert!(st.move_right());
        assert_eq!(st.current.unwrap().pivot.x, 1);
    }

    #[test]
    fn rotate_advances_child_clockwise() {
        let mut st = state(12, 6);
        st.current = Some(pair_at(2, 5, RED, BLUE));
        assert!(st.rotate());
        let pair = st.current.unwrap();
        assert_eq!(pair.rot, 1);
        assert_eq!((pair.pivot.x, pair.pivot.y), (2, 5));
        assert_eq!((pair.child.x, pair.child.y), (3, 5));
    }

    #[test]
    fn rotate_kicks_right_at_left_wall() {
        let mut st = state(12, 6);
        // Child below pivot; the clockwise target is the wall at x = -1.
        st.current = Some(Pair {
            pivot: cell(0, 5, RED),
            child: cell(0, 6, BLUE),
            rot: 2,
        });
        assert!(st.rotate());
        let pair = st.current.unwrap();
        assert_eq!(pair.rot, 3);
        assert_eq!((pair.pivot.x, pair.pivot.y), (1, 5));
        assert_eq!((pair.child.x, pair.child.y), (0, 5));
    }

    #[test]
    fn rotate_noop_when_both_kicks_blocked() {
        let mut st = state(12, 6);
        st.field
            .place_cells(&[cell(0, 2, RED), cell(1, 2, RED), cell(2, 2, RED)]);
        // Child right of pivot; the downward target and both kicks are occupied.
        st.current = Some(Pair {
            pivot: cell(1, 1, BLUE),
            child: cell(2, 1, GREEN),
            rot: 1,
        });
        assert!(!st.rotate());
        let pair = st.current.unwrap();
        assert_eq!(pair.rot, 1);
        assert_eq!((pair.pivot.x, pair.pivot.y), (1, 1));
        assert_eq!((pair.child.x, pair.child.y), (2, 1));
    }

    #[test]
    fn lock_without_match_enters_spawn_delay_with_zero_chain() {
        let mut st = state(12, 6);
        st.current = Some(pair_at(0, 11, RED, BLUE));
        st.update(Duration::from_millis(550));

        assert!(matches!(st.phase(), Phase::SpawnDelay { .. }));
        assert_eq!(st.chain(), 0);
        assert_eq!(st.field.get(0, 11), Some(Cell::Puyo(RED)));
        assert_eq!(st.field.get(0, 10), Some(Cell::Puyo(BLUE)));

        // Spawn delay expires into falling with a freshly spawned pair.
        st.update(Duration::from_millis(220));
        assert!(matches!(st.phase(), Phase::Falling));
        let spawned = st.current().expect("pair spawned after delay");
        assert_eq!((spawned.pivot.x, spawned.pivot.y), (2, 0));
        assert_eq!((spawned.child.x, spawned.child.y), (2, -1));
    }

    #[test]
    fn two_wave_chain_counts_and_resets() {
        let mut st = state(12, 6);
        st.field.place_cells(&[
            cell(0, 9, RED),
            cell(0, 10, RED),
            cell(0, 11, RED),
            cell(1, 9, BLUE),
            cell(1, 10, BLUE),
            cell(1, 11, BLUE),
        ]);
        // Red pivot under blue child; locking on the red stack completes a
        // red four, and the blue child then falls into the blue three.
        st.current = Some(pair_at(0, 7, RED, BLUE));

        st.update(Duration::from_millis(550)); // falls to y=8
        assert!(matches!(st.phase(), Phase::Falling));
        st.update(Duration::from_millis(550)); // blocked: locks, wave 1
        assert!(matches!(st.phase(), Phase::Clearing { .. }));
        assert_eq!(st.chain(), 1);
        assert!(st.is_clearing_cell(0, 8));
        assert!(st.is_clearing_cell(0, 11));
        assert!(!st.is_clearing_cell(1, 11));

        st.update(Duration::from_millis(480)); // reds cleared, blue falls in: wave 2
        assert!(matches!(st.phase(), Phase::Clearing { .. }));
        assert_eq!(st.chain(), 2);
        assert!(st.is_clearing_cell(0, 11));
        assert!(st.is_clearing_cell(1, 9));

        st.update(Duration::from_millis(480)); // stable: spawn delay, chain back to 0
        assert!(matches!(st.phase(), Phase::SpawnDelay { .. }));
        assert_eq!(st.chain(), 0);
        assert_eq!(st.max_chain(), 2);
        assert_eq!(occupied_count(&st.field), 0);
    }

    #[test]
    fn blink_toggles_at_fixed_period_during_clearing() {
        let mut st = state(12, 6);
        st.field.place_cells(&[
            cell(0, 11, RED),
            cell(1, 11, RED),
            cell(2, 11, RED),
            cell(3, 11, RED),
        ]);
        st.current = Some(pair_at(5, 11, BLUE, GREEN));
        st.update(Duration::from_millis(550)); // locks next to the reds: wave 1
        assert!(matches!(st.phase(), Phase::Clearing { .. }));
        assert!(st.blink_on());
        st.update(Duration::from_millis(100));
        assert!(!st.blink_on());
        st.update(Duration::from_millis(100));
        assert!(st.blink_on());
    }

    #[test]
    fn soft_drop_shortens_the_drop_interval() {
        let mut st = state(12, 6);
        st.current = Some(pair_at(2, 5, RED, BLUE));
        st.set_soft_drop(true);
        st.update(Duration::from_millis(70));
        assert_eq!(st.current.unwrap().pivot.y, 6);

        st.set_soft_drop(false);
        st.update(Duration::from_millis(70));
        assert_eq!(st.current.unwrap().pivot.y, 6, "70 ms is below the normal interval");
        st.update(Duration::from_millis(480));
        assert_eq!(st.current.unwrap().pivot.y, 7);
    }

    #[test]
    fn spawn_promotes_lookahead_queue() {
        let mut st = state(12, 6);
        let expected_active = st.next_pairs[0];
        let expected_next = st.next_pairs[1];
        st.update(Duration::from_millis(1));
        assert_eq!(st.current.unwrap(), expected_active);
        assert_eq!(st.next_pairs[0], expected_next);
        assert_ne!(st.next_pairs[1], expected_next);
    }

    #[test]
    fn blocked_spawn_resets_session_but_keeps_max_chain() {
        let mut st = state(12, 6);
        st.max_chain = 5;
        st.field.place_cells(&[cell(2, 0, RED)]); // spawn pivot cell
        let sessions_before = st.sessions();

        st.update(Duration::from_millis(1)); // tries to spawn, board is full

        assert_eq!(st.sessions(), sessions_before + 1);
        assert!(st.current.is_none());
        assert_eq!(st.chain(), 0);
        assert_eq!(st.max_chain(), 5);
        assert!(st.field.get(2, 0).unwrap().is_empty(), "field reinitialized");
        assert!(matches!(st.phase(), Phase::Falling));
    }

    #[test]
    fn manual_reset_clears_everything_but_max_chain() {
        let mut st = state(12, 6);
        st.max_chain = 3;
        st.chain = 2;
        st.soft_drop = true;
        st.field.place_cells(&[cell(0, 11, RED)]);
        st.current = Some(pair_at(2, 4, RED, BLUE));
        st.phase = Phase::SpawnDelay {
            countdown: Duration::from_millis(50),
        };

        st.reset();

        assert!(st.current.is_none());
        assert!(!st.soft_drop);
        assert_eq!(st.chain(), 0);
        assert_eq!(st.max_chain(), 3);
        assert!(matches!(st.phase(), Phase::Falling));
        assert!(st.field.get(0, 11).unwrap().is_empty());
    }

    #[test]
    fn lock_above_top_edge_drops_offscreen_cell() {
        let mut st = state(12, 6);
        // Column 2 filled to one below the top; the pair locks with its
        // child still above the field.
        for y in 1..12 {
            st.field
                .place_cells(&[cell(2, y, if y % 2 == 0 { RED } else { BLUE })]);
        }
        st.current = Some(pair_at(2, 0, YELLOW, GREEN));
        st.update(Duration::from_millis(550));

        assert_eq!(st.field.get(2, 0), Some(Cell::Puyo(YELLOW)));
        assert!(st.current.is_none());
    }

    #[test]
    fn color_rng_stays_in_palette_range() {
        let mut rng = ColorRng::new(42);
        for _ in 0..200 {
            let c = rng.next_color();
            assert!((1..=NUM_COLORS).contains(&c));
        }
    }
}
