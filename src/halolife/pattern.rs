//! Starting patterns, placed in global interior coordinates.

use std::ops::Range;

use rand::{RngCore, SeedableRng};

use super::cell::Cell;
use super::grid::Grid;

const GLIDER: [(usize, usize); 5] = [(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)];
const LWSS: [(usize, usize); 9] = [
    (0, 0),
    (0, 2),
    (1, 3),
    (2, 3),
    (3, 0),
    (3, 3),
    (4, 1),
    (4, 2),
    (4, 3),
];
const BLINKER: [(usize, usize); 3] = [(0, 0), (0, 1), (0, 2)];
const BLOCK: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 0), (1, 1)];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Empty,
    Glider { x: usize, y: usize },
    /// Lightweight spaceship, travelling along the columns.
    Lwss { x: usize, y: usize },
    Blinker { x: usize, y: usize },
    Block { x: usize, y: usize },
    /// Each cell alive with probability `1 / one_in`.
    Soup { seed: u64, one_in: u32 },
    Cells(Vec<(usize, usize)>),
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern::Lwss { x: 1, y: 2 }
    }
}

impl Pattern {
    /// Pattern by CLI name, at its customary position.
    pub fn by_name(name: &str) -> Option<Pattern> {
        let pattern = match name.to_ascii_lowercase().as_str() {
            "empty" => Pattern::Empty,
            "glider" => Pattern::Glider { x: 1, y: 1 },
            "lwss" => Pattern::default(),
            "blinker" => Pattern::Blinker { x: 2, y: 1 },
            "block" => Pattern::Block { x: 1, y: 1 },
            "soup" => Pattern::Soup { seed: 7, one_in: 20 },
            _ => return None,
        };
        Some(pattern)
    }

    /// Live cells on a `width` x `height` torus.
    pub fn live_cells(&self, width: usize, height: usize) -> Vec<(usize, usize)> {
        let place = |shape: &[(usize, usize)], x: usize, y: usize| -> Vec<(usize, usize)> {
            shape
                .iter()
                .map(|&(dx, dy)| ((x + dx) % width, (y + dy) % height))
                .collect()
        };
        match self {
            Pattern::Empty => Vec::new(),
            Pattern::Glider { x, y } => place(&GLIDER, *x, *y),
            Pattern::Lwss { x, y } => place(&LWSS, *x, *y),
            Pattern::Blinker { x, y } => place(&BLINKER, *x, *y),
            Pattern::Block { x, y } => place(&BLOCK, *x, *y),
            Pattern::Soup { seed, one_in } => {
                let mut rng = rand::rngs::StdRng::seed_from_u64(*seed);
                let one_in = (*one_in).max(1);
                let mut cells = Vec::new();
                for x in 0..width {
                    for y in 0..height {
                        if rng.next_u32() % one_in == 0 {
                            cells.push((x, y));
                        }
                    }
                }
                cells
            }
            Pattern::Cells(cells) => cells
                .iter()
                .map(|&(x, y)| (x % width, y % height))
                .collect(),
        }
    }

    /// The local grid of the worker owning global interior `columns`, ghost
    /// columns included and dead.
    pub fn seed(&self, columns: Range<usize>, width: usize, height: usize) -> Grid {
        let mut grid = Grid::new(columns.len() + 2, height);
        for (x, y) in self.live_cells(width, height) {
            if columns.contains(&x) {
                grid.set(x - columns.start + 1, y, Cell::Alive);
            }
        }
        grid
    }
}
