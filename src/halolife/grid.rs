//! Column-major cell storage for one worker.
//!
//! Column 0 and column `width - 1` are ghost columns: copies of the
//! neighbors' boundary columns, refreshed by the exchange and never
//! evaluated locally. Rows wrap around (the field is a torus vertically).
//!
//! `Grid` owns its cells. `GridView`/`GridMut` borrow a column-major slice so
//! the same evaluator runs over a private grid or over one slab of a memory
//! domain's shared allocation.

use super::cell::Cell;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// An all-dead grid. `width` counts both ghost columns.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width >= 3, "grid needs at least one interior column");
        assert!(height >= 1, "grid needs at least one row");
        Self {
            width,
            height,
            cells: vec![Cell::DEAD; width * height],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn interior_width(&self) -> usize {
        self.width - 2
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Cell {
        self.view().get(x, y)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        self.cells[x * self.height + y] = cell.byte();
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn view(&self) -> GridView<'_> {
        GridView {
            width: self.width,
            height: self.height,
            cells: &self.cells,
        }
    }

    pub fn view_mut(&mut self) -> GridMut<'_> {
        GridMut {
            width: self.width,
            height: self.height,
            cells: &mut self.cells,
        }
    }

    /// Mutable access to interior columns `first..first + count` (interior
    /// coordinates), contiguous thanks to column-major layout.
    pub fn interior_columns_mut(&mut self, first: usize, count: usize) -> &mut [u8] {
        let start = (first + 1) * self.height;
        &mut self.cells[start..start + count * self.height]
    }
}

#[inline(always)]
fn count_neighbors_in(cells: &[u8], width: usize, height: usize, x: usize, y: usize) -> u8 {
    debug_assert!(x >= 1 && x + 1 < width);
    let up = if y == 0 { height - 1 } else { y - 1 };
    let down = if y + 1 == height { 0 } else { y + 1 };
    let mut count = 0u8;
    for nx in [x - 1, x, x + 1] {
        let column = &cells[nx * height..(nx + 1) * height];
        count += Cell::counts_alive(column[up]) as u8;
        count += Cell::counts_alive(column[down]) as u8;
        if nx != x {
            count += Cell::counts_alive(column[y]) as u8;
        }
    }
    count
}

/// Read-only borrowed grid.
#[derive(Clone, Copy, Debug)]
pub struct GridView<'a> {
    width: usize,
    height: usize,
    cells: &'a [u8],
}

impl<'a> GridView<'a> {
    pub fn new(width: usize, height: usize, cells: &'a [u8]) -> Self {
        assert_eq!(cells.len(), width * height, "cell slice does not match grid shape");
        Self {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn interior_width(&self) -> usize {
        self.width - 2
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Cell {
        Cell::from_byte(self.cells[x * self.height + y]).unwrap_or(Cell::Dead)
    }

    #[inline]
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        Cell::counts_alive(self.cells[x * self.height + y])
    }

    #[inline]
    pub fn column(&self, x: usize) -> &'a [u8] {
        &self.cells[x * self.height..(x + 1) * self.height]
    }

    /// Neighbor count for an interior cell: rows wrap, columns stop at the
    /// ghost columns.
    #[inline]
    pub fn count_neighbors(&self, x: usize, y: usize) -> u8 {
        count_neighbors_in(self.cells, self.width, self.height, x, y)
    }

    /// Interior columns only, column-major.
    pub fn interior(&self) -> &'a [u8] {
        &self.cells[self.height..(self.width - 1) * self.height]
    }

    pub fn population(&self) -> usize {
        self.interior()
            .iter()
            .filter(|&&byte| Cell::counts_alive(byte))
            .count()
    }

    /// Visit live interior cells as `(x, y)` in interior coordinates.
    pub fn for_each_live<F: FnMut(usize, usize)>(&self, mut f: F) {
        for (i, &byte) in self.interior().iter().enumerate() {
            if Cell::counts_alive(byte) {
                f(i / self.height, i % self.height);
            }
        }
    }
}

/// Mutable borrowed grid.
#[derive(Debug)]
pub struct GridMut<'a> {
    width: usize,
    height: usize,
    cells: &'a mut [u8],
}

impl<'a> GridMut<'a> {
    pub fn new(width: usize, height: usize, cells: &'a mut [u8]) -> Self {
        assert!(width >= 3, "grid needs at least one interior column");
        assert_eq!(cells.len(), width * height, "cell slice does not match grid shape");
        Self {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn interior_width(&self) -> usize {
        self.width - 2
    }

    pub fn as_view(&self) -> GridView<'_> {
        GridView {
            width: self.width,
            height: self.height,
            cells: &self.cells[..],
        }
    }

    #[inline]
    pub fn get_byte(&self, x: usize, y: usize) -> u8 {
        self.cells[x * self.height + y]
    }

    #[inline]
    pub fn set_byte(&mut self, x: usize, y: usize, byte: u8) {
        self.cells[x * self.height + y] = byte;
    }

    #[inline]
    pub fn count_neighbors(&self, x: usize, y: usize) -> u8 {
        count_neighbors_in(&self.cells[..], self.width, self.height, x, y)
    }

    #[inline]
    pub fn column_mut(&mut self, x: usize) -> &mut [u8] {
        let h = self.height;
        &mut self.cells[x * h..(x + 1) * h]
    }

    /// `(left_far, left_near)`: the left ghost column and the first interior
    /// column.
    pub fn left_edges_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        let h = self.height;
        self.cells[..2 * h].split_at_mut(h)
    }

    /// `(right_near, right_far)`: the last interior column and the right
    /// ghost column.
    pub fn right_edges_mut(&mut self) -> (&mut [u8], &mut [u8]) {
        let h = self.height;
        let len = self.cells.len();
        self.cells[len - 2 * h..].split_at_mut(h)
    }

    /// All four boundary columns at once. Needs two distinct near columns.
    pub fn edges_mut(&mut self) -> EdgeColumns<'_> {
        assert!(self.width >= 4, "edge columns overlap below 2 interior columns");
        let h = self.height;
        let w = self.width;
        let (left, rest) = self.cells.split_at_mut(2 * h);
        let (_, right) = rest.split_at_mut((w - 4) * h);
        let (left_far, left_near) = left.split_at_mut(h);
        let (right_near, right_far) = right.split_at_mut(h);
        EdgeColumns {
            left_far,
            left_near,
            right_near,
            right_far,
        }
    }
}

/// The four boundary columns of a grid, borrowed disjointly.
#[derive(Debug)]
pub struct EdgeColumns<'a> {
    pub left_far: &'a mut [u8],
    pub left_near: &'a mut [u8],
    pub right_near: &'a mut [u8],
    pub right_far: &'a mut [u8],
}
