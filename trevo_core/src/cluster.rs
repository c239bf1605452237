//! Cluster detection over paying symbols.

use serde::{Deserialize, Serialize};

use crate::grid::{Grid, Position, COLS, ROWS};
use crate::symbols::Symbol;

/// Smallest region that pays.
pub const MIN_CLUSTER: usize = 5;

/// One 8-connected region of a single paying symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub symbol: Symbol,
    /// Row-major sorted.
    pub cells: Vec<Position>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.cells.binary_search(&pos).is_ok()
    }
}

/// Finds every paying region of at least `min_size` cells.
///
/// Clusters come back in the row-major order of the first cell that reached
/// them. The grid is not modified.
pub fn find_clusters(grid: &Grid, min_size: usize) -> Vec<Cluster> {
    let mut visited = [[false; COLS]; ROWS];
    let mut clusters = Vec::new();
    let mut stack = Vec::with_capacity(ROWS * COLS);

    for start in Grid::positions() {
        if visited[start.row][start.col] {
            continue;
        }
        let Some(symbol) = grid.get(start).filter(|s| s.is_paying()) else {
            continue;
        };

        let mut cells = Vec::new();
        visited[start.row][start.col] = true;
        stack.push(start);
        while let Some(pos) = stack.pop() {
            cells.push(pos);
            for next in pos.neighbors() {
                if !visited[next.row][next.col] && grid.get(next) == Some(symbol) {
                    visited[next.row][next.col] = true;
                    stack.push(next);
                }
            }
        }

        if cells.len() >= min_size {
            cells.sort_unstable();
            clusters.push(Cluster { symbol, cells });
        }
    }
    clusters
}

/// Every cell belonging to any cluster, once each, row-major.
pub fn union_cells(clusters: &[Cluster]) -> Vec<Position> {
    let mut cells: Vec<Position> = clusters.iter().flat_map(|c| c.cells.iter().copied()).collect();
    cells.sort_unstable();
    cells.dedup();
    cells
}
