use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rng::SpinRng;
use crate::symbols::Symbol;
use crate::weights::WeightTable;

pub const ROWS: usize = 5;
pub const COLS: usize = 6;
pub const CELLS: usize = ROWS * COLS;

/// `None` only while a cascade has removed the symbol and not yet refilled.
pub type Cell = Option<Symbol>;

/// Grid coordinate. Orders row-major, row 0 at the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Uniform random cell: one draw for the row, then one for the column.
    pub fn random(rng: &mut SpinRng) -> Self {
        let row = rng.int_below(ROWS);
        let col = rng.int_below(COLS);
        Self { row, col }
    }

    /// In-bounds cells among the 8 surrounding this one.
    pub fn neighbors(self) -> impl Iterator<Item = Position> {
        const OFFSETS: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        OFFSETS.into_iter().filter_map(move |(dr, dc)| {
            let row = self.row.checked_add_signed(dr)?;
            let col = self.col.checked_add_signed(dc)?;
            (row < ROWS && col < COLS).then_some(Position { row, col })
        })
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self != other && self.row.abs_diff(other.row) <= 1 && self.col.abs_diff(other.col) <= 1
    }
}

/// The 5x6 board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: [[Cell; COLS]; ROWS],
}

impl Grid {
    pub fn empty() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
        }
    }

    pub fn from_rows(rows: [[Symbol; COLS]; ROWS]) -> Self {
        Self {
            cells: rows.map(|row| row.map(Some)),
        }
    }

    /// Parses rows of symbol keys (`"A"`, `"CLO"`, ...). `None` on a bad key
    /// or a wrong shape.
    pub fn from_keys<S: AsRef<str>>(rows: &[Vec<S>]) -> Option<Self> {
        if rows.len() != ROWS {
            return None;
        }
        let mut grid = Self::empty();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != COLS {
                return None;
            }
            for (c, key) in row.iter().enumerate() {
                grid.cells[r][c] = Some(Symbol::from_key(key.as_ref())?);
            }
        }
        Some(grid)
    }

    /// Fills every cell in row-major order, one weighted draw per cell.
    pub fn generate(rng: &mut SpinRng, table: &WeightTable) -> Self {
        let mut grid = Self::empty();
        for row in grid.cells.iter_mut() {
            for cell in row.iter_mut() {
                *cell = Some(table.sample(rng));
            }
        }
        grid
    }

    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row][pos.col]
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row][pos.col] = cell;
    }

    pub fn positions() -> impl Iterator<Item = Position> {
        (0..ROWS).flat_map(|row| (0..COLS).map(move |col| Position { row, col }))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| **c == Some(symbol))
            .count()
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.count(symbol) > 0
    }

    pub fn paying_cells(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|c| c.is_some_and(Symbol::is_paying))
            .count()
    }

    /// Row-major positions holding `symbol`.
    pub fn positions_of(&self, symbol: Symbol) -> Vec<Position> {
        Self::positions()
            .filter(|p| self.get(*p) == Some(symbol))
            .collect()
    }

    /// Empties the given cells; returns how many were occupied.
    pub fn clear(&mut self, positions: &[Position]) -> usize {
        let mut cleared = 0;
        for p in positions {
            if self.cells[p.row][p.col].take().is_some() {
                cleared += 1;
            }
        }
        cleared
    }

    /// Gravity then refill.
    ///
    /// Column by column, left to right: surviving symbols drop to the bottom
    /// keeping their order, then the vacated top cells are drawn from `rng`
    /// top to bottom. Returns the number of fresh draws.
    pub fn refill(&mut self, rng: &mut SpinRng, table: &WeightTable) -> usize {
        let mut drawn = 0;
        for col in 0..COLS {
            let mut write = ROWS;
            for row in (0..ROWS).rev() {
                if let Some(symbol) = self.cells[row][col] {
                    write -= 1;
                    self.cells[row][col] = None;
                    self.cells[write][col] = Some(symbol);
                }
            }
            for row in 0..write {
                self.cells[row][col] = Some(table.sample(rng));
                drawn += 1;
            }
        }
        drawn
    }

    /// Symbol keys, row by row. Empty cells render as `""`.
    pub fn keys(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|c| c.map(|s| s.key().to_string()).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|c| format!("{:>3}", c.map(Symbol::key).unwrap_or(".")))
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
