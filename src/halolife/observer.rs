//! Timing and rendering seams, plus frame assembly for rendering.
//!
//! The kernel never renders or measures anything itself; it calls an
//! `Observer` at fixed points of each generation. All callbacks default to
//! no-ops.

use std::ops::Range;

use super::grid::{Grid, GridView};
use super::transport::{Transport, TAG_GATHER};
use super::worker::WorkerTopology;
use super::error::TransportError;

pub trait Observer {
    /// Generation start, before the sweep.
    fn start_time(&mut self, _topology: &WorkerTopology) {}

    /// Halo exchange finished.
    fn exchange_time(&mut self, _topology: &WorkerTopology) {}

    /// Generation finished, after any frame was printed.
    fn end_time(&mut self, _topology: &WorkerTopology) {}

    /// A settled frame. Only called in render mode, and in distributed runs
    /// only on rank 0 with the gathered global grid.
    fn print(&mut self, _frame: GridView<'_>, _topology: &WorkerTopology, _generation: u64) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

impl<O: Observer + ?Sized> Observer for Box<O> {
    fn start_time(&mut self, topology: &WorkerTopology) {
        (**self).start_time(topology)
    }

    fn exchange_time(&mut self, topology: &WorkerTopology) {
        (**self).exchange_time(topology)
    }

    fn end_time(&mut self, topology: &WorkerTopology) {
        (**self).end_time(topology)
    }

    fn print(&mut self, frame: GridView<'_>, topology: &WorkerTopology, generation: u64) {
        (**self).print(frame, topology, generation)
    }
}

/// Concatenate the interiors of `blocks` (left to right) into one grid with
/// fresh dead ghost columns.
pub fn stitch(height: usize, blocks: &[GridView<'_>]) -> Grid {
    let width: usize = blocks.iter().map(GridView::interior_width).sum();
    let mut frame = Grid::new(width + 2, height);
    let mut first = 0;
    for block in blocks {
        debug_assert_eq!(block.height(), height);
        let count = block.interior_width();
        frame
            .interior_columns_mut(first, count)
            .copy_from_slice(block.interior());
        first += count;
    }
    frame
}

/// Ships every rank's interior to rank 0 for rendering.
#[derive(Clone, Debug)]
pub struct FrameGather {
    columns: Vec<Range<usize>>,
    height: usize,
}

impl FrameGather {
    /// `columns[r]` is the global interior range owned by rank `r`.
    pub fn new(columns: Vec<Range<usize>>, height: usize) -> Self {
        Self { columns, height }
    }

    pub fn width(&self) -> usize {
        self.columns.last().map_or(0, |range| range.end)
    }

    /// Returns the global frame on rank 0 and `None` elsewhere.
    pub fn gather<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        local: GridView<'_>,
    ) -> Result<Option<Grid>, TransportError> {
        let rank = transport.rank();
        if rank != 0 {
            transport.send(0, TAG_GATHER, local.interior())?;
            return Ok(None);
        }

        let mut frame = Grid::new(self.width() + 2, self.height);
        if let Some(own) = self.columns.first() {
            frame
                .interior_columns_mut(own.start, own.len())
                .copy_from_slice(local.interior());
        }
        for (src, range) in self.columns.iter().enumerate().skip(1) {
            let block = frame.interior_columns_mut(range.start, range.len());
            transport.recv(src, TAG_GATHER, block)?;
        }
        Ok(Some(frame))
    }
}
