//! Per-generation halo message.
//!
//! Borrows the four boundary columns straight out of grid memory: `near`
//! columns are transmitted, `far` (ghost) columns are received into. Built
//! fresh after every sweep and dropped once the exchange completes.

use super::evaluate::Margins;
use super::grid::{EdgeColumns, GridMut};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug)]
pub struct HaloMessage<'a> {
    pub left_far: &'a mut [u8],
    pub left_near: &'a mut [u8],
    pub right_far: &'a mut [u8],
    pub right_near: &'a mut [u8],
    pub margins: Margins,
}

impl<'a> HaloMessage<'a> {
    pub fn from_grid(grid: &'a mut GridMut<'_>, margins: Margins) -> Self {
        let EdgeColumns {
            left_far,
            left_near,
            right_near,
            right_far,
        } = grid.edges_mut();
        Self {
            left_far,
            left_near,
            right_far,
            right_near,
            margins,
        }
    }

    /// Message whose left and right edges live in different grids (the
    /// outer slabs of a memory domain).
    pub fn from_edges(
        left: (&'a mut [u8], &'a mut [u8]),
        right: (&'a mut [u8], &'a mut [u8]),
        margins: Margins,
    ) -> Self {
        let (left_far, left_near) = left;
        let (right_near, right_far) = right;
        debug_assert_eq!(left_far.len(), right_far.len());
        Self {
            left_far,
            left_near,
            right_far,
            right_near,
            margins,
        }
    }

    #[inline]
    pub fn column_len(&self) -> usize {
        self.left_near.len()
    }
}
