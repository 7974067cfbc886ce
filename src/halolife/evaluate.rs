//! In-place B3/S23 sweep with margin tracking.
//!
//! First pass marks transitions (`Dying`/`Newborn`) without disturbing what
//! neighbors read. Second pass settles the markers column by column and, on
//! the way, measures how many all-dead columns sit against each edge.

use super::cell::Cell;
use super::grid::GridMut;

/// Width of the all-dead band against each edge of the interior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Margins {
    pub skip_left: usize,
    pub skip_right: usize,
}

impl Margins {
    pub const fn new(skip_left: usize, skip_right: usize) -> Self {
        Self {
            skip_left,
            skip_right,
        }
    }

    /// An entirely dead interior reports its full width on both sides.
    #[inline]
    pub const fn is_quiescent(&self, interior_width: usize) -> bool {
        self.skip_left >= interior_width
    }
}

/// Advance the interior one generation and report the new margins.
///
/// Ghost columns are read but never written. Margins are measured from
/// scratch on every call; a fully dead interior yields `interior_width` on
/// both sides.
pub fn evaluate(grid: &mut GridMut<'_>) -> Margins {
    let width = grid.width();
    let height = grid.height();

    for y in 0..height {
        for x in 1..width - 1 {
            let count = grid.count_neighbors(x, y);
            let byte = grid.get_byte(x, y);
            if Cell::counts_alive(byte) {
                if !(2..=3).contains(&count) {
                    grid.set_byte(x, y, Cell::DYING);
                }
            } else if count == 3 {
                grid.set_byte(x, y, Cell::NEWBORN);
            }
        }
    }

    let interior = width - 2;
    let mut skip_left = 0;
    let mut skip_right = interior;
    let mut left_blocked = false;
    for x in 1..width - 1 {
        let mut all_dead = true;
        for byte in grid.column_mut(x) {
            *byte = Cell::settle(*byte);
            if *byte == Cell::ALIVE {
                all_dead = false;
            }
        }
        if all_dead {
            if !left_blocked {
                skip_left += 1;
            }
        } else {
            left_blocked = true;
            skip_right = width - x - 2;
        }
    }

    Margins {
        skip_left,
        skip_right,
    }
}
