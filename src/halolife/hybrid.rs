//! Several workers sharing one memory domain.
//!
//! The domain's grid is one allocation cut into per-worker slabs, each with
//! its own ghost columns. Every generation runs as:
//!
//! 1. each worker sweeps its slab;
//! 2. barrier;
//! 3. worker 0 copies halos between neighboring slabs, exchanges the
//!    domain's outer edges over the ring and presents the frame;
//! 4. barrier.
//!
//! The barriers are the only synchronization; slab mutexes are never
//! contended because the phases do not overlap.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Barrier, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::error::{HaloLifeError, TransportError};
use super::evaluate::{evaluate, Margins};
use super::grid::{Grid, GridMut, GridView};
use super::halo::HaloMessage;
use super::observer::{stitch, FrameGather, Observer};
use super::ring::{ExchangeStats, RingLink};
use super::transport::Transport;
use super::worker::WorkerTopology;

/// One allocation holding every slab of a memory domain back to back.
#[derive(Clone, Debug)]
pub struct DomainGrid {
    height: usize,
    widths: Vec<usize>,
    cells: Vec<u8>,
}

impl DomainGrid {
    /// Pack `slabs` (left to right) into one allocation.
    pub fn from_slabs(slabs: &[Grid]) -> Self {
        assert!(!slabs.is_empty(), "a domain needs at least one slab");
        let height = slabs[0].height();
        let widths: Vec<usize> = slabs.iter().map(Grid::width).collect();
        let mut cells = Vec::with_capacity(widths.iter().sum::<usize>() * height);
        for slab in slabs {
            assert_eq!(slab.height(), height, "slabs must share a height");
            cells.extend_from_slice(slab.cells());
        }
        Self {
            height,
            widths,
            cells,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn slab_count(&self) -> usize {
        self.widths.len()
    }

    pub fn interior_width(&self) -> usize {
        self.widths.iter().map(|w| w - 2).sum()
    }

    pub fn slabs(&self) -> Vec<GridView<'_>> {
        let mut rest = &self.cells[..];
        self.widths
            .iter()
            .map(|&w| {
                let (slab, tail) = rest.split_at(w * self.height);
                rest = tail;
                GridView::new(w, self.height, slab)
            })
            .collect()
    }

    pub fn slabs_mut(&mut self) -> Vec<GridMut<'_>> {
        let height = self.height;
        let mut rest = &mut self.cells[..];
        let mut out = Vec::with_capacity(self.widths.len());
        for &w in &self.widths {
            let (slab, tail) = std::mem::take(&mut rest).split_at_mut(w * height);
            rest = tail;
            out.push(GridMut::new(w, height, slab));
        }
        out
    }

    /// The domain's interior as one grid with dead ghost columns.
    pub fn frame(&self) -> Grid {
        stitch(self.height, &self.slabs())
    }
}

/// Margins of the whole domain from its slabs' margins: a dead band may run
/// across fully dead slabs.
pub fn domain_margins(slabs: &[Margins], interior_widths: &[usize]) -> Margins {
    let mut skip_left = 0;
    for (margins, &width) in slabs.iter().zip(interior_widths) {
        skip_left += margins.skip_left.min(width);
        if margins.skip_left < width {
            break;
        }
    }
    let mut skip_right = 0;
    for (margins, &width) in slabs.iter().zip(interior_widths).rev() {
        skip_right += margins.skip_right.min(width);
        if margins.skip_right < width {
            break;
        }
    }
    Margins::new(skip_left, skip_right)
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Copy halos across every slab boundary inside the domain.
fn copy_inner_halos(slabs: &mut [MutexGuard<'_, GridMut<'_>>]) {
    for i in 1..slabs.len() {
        let (head, tail) = slabs.split_at_mut(i);
        let left = &mut head[i - 1];
        let right = &mut tail[0];
        let (right_near, right_far) = left.right_edges_mut();
        let (left_far, left_near) = right.left_edges_mut();
        right_far.copy_from_slice(left_near);
        left_far.copy_from_slice(right_near);
    }
}

/// Exchange the domain's two outer edges over the ring.
fn exchange_outer<T: Transport>(
    slabs: &mut [MutexGuard<'_, GridMut<'_>>],
    margins: Margins,
    link: &mut RingLink<T>,
) -> Result<(), TransportError> {
    if slabs.len() == 1 {
        let mut msg = HaloMessage::from_grid(&mut slabs[0], margins);
        return link.exchange(&mut msg);
    }
    let (first, rest) = slabs.split_at_mut(1);
    let last = rest.len() - 1;
    let mut msg = HaloMessage::from_edges(
        first[0].left_edges_mut(),
        rest[last].right_edges_mut(),
        margins,
    );
    link.exchange(&mut msg)
}

/// State only worker 0 touches.
struct Representative<'a, T, O> {
    topology: WorkerTopology,
    link: &'a mut RingLink<T>,
    observer: &'a mut O,
    gather: Option<&'a FrameGather>,
    interior_widths: Vec<usize>,
    height: usize,
    generation: u64,
}

impl<T: Transport, O: Observer> Representative<'_, T, O> {
    fn exchange(
        &mut self,
        slabs: &[Mutex<GridMut<'_>>],
        margins: Option<&[Margins]>,
    ) -> Result<(), TransportError> {
        let mut guards: Vec<_> = slabs.iter().map(lock).collect();
        copy_inner_halos(&mut guards);
        let margins = match margins {
            Some(slab_margins) => domain_margins(slab_margins, &self.interior_widths),
            None => Margins::default(),
        };
        exchange_outer(&mut guards, margins, self.link)?;
        debug!(
            node = self.topology.node,
            skip_left = margins.skip_left,
            skip_right = margins.skip_right,
            "domain halo settled"
        );
        Ok(())
    }

    fn present(&mut self, slabs: &[Mutex<GridMut<'_>>]) -> Result<(), TransportError> {
        let Some(gather) = self.gather else {
            return Ok(());
        };
        let frame = {
            let guards: Vec<_> = slabs.iter().map(lock).collect();
            let views: Vec<GridView<'_>> = guards.iter().map(|slab| slab.as_view()).collect();
            stitch(self.height, &views)
        };
        if self.link.size() == 1 {
            self.observer
                .print(frame.view(), &self.topology, self.generation);
            return Ok(());
        }
        match gather.gather(self.link.transport_mut(), frame.view()) {
            Ok(Some(global)) => {
                self.observer
                    .print(global.view(), &self.topology, self.generation);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                self.link.transport_mut().abort();
                Err(err)
            }
        }
    }
}

/// Drives the workers of one memory domain.
pub struct HybridCoordinator<T, O> {
    topology: WorkerTopology,
    grid: DomainGrid,
    link: RingLink<T>,
    observer: O,
    gather: Option<FrameGather>,
    generation: u64,
}

impl<T, O> HybridCoordinator<T, O>
where
    T: Transport + Send,
    O: Observer + Send,
{
    /// `topology` is that of the domain's worker 0; `link` connects the
    /// domains (its rank is the domain index).
    pub fn new(topology: WorkerTopology, grid: DomainGrid, link: RingLink<T>, observer: O) -> Self {
        Self {
            topology,
            grid,
            link,
            observer,
            gather: None,
            generation: 0,
        }
    }

    /// Present every generation; `gather` holds per-domain column ranges.
    pub fn rendering(mut self, gather: FrameGather) -> Self {
        self.gather = Some(gather);
        self
    }

    pub fn threads(&self) -> usize {
        self.grid.slab_count()
    }

    pub fn grid(&self) -> &DomainGrid {
        &self.grid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> ExchangeStats {
        *self.link.stats()
    }

    pub fn into_parts(self) -> (DomainGrid, ExchangeStats, O) {
        let stats = *self.link.stats();
        (self.grid, stats, self.observer)
    }

    /// Run `generations` generations (forever on `None`) on a dedicated pool
    /// with one thread per slab.
    pub fn run(&mut self, generations: Option<u64>) -> Result<(), HaloLifeError> {
        let threads = self.threads();
        let node = self.topology.node;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("halo-node-{node}-worker-{i}"))
            .build()?;

        let interior_widths: Vec<usize> = self.grid.widths.iter().map(|w| w - 2).collect();
        let height = self.grid.height;
        let start = self.generation;
        let Self {
            topology,
            grid,
            link,
            observer,
            gather,
            generation,
        } = self;

        let slabs: Vec<Mutex<GridMut<'_>>> = grid.slabs_mut().into_iter().map(Mutex::new).collect();
        let margins: Vec<Mutex<Margins>> = (0..threads).map(|_| Mutex::default()).collect();
        let representative = Mutex::new(Representative {
            topology: *topology,
            link,
            observer,
            gather: gather.as_ref(),
            interior_widths,
            height,
            generation: start,
        });
        let barrier = Barrier::new(threads);
        let failed = AtomicBool::new(false);
        let failure: Mutex<Option<TransportError>> = Mutex::new(None);

        let fail = |err: TransportError| {
            debug!(node, %err, "domain stopping");
            lock(&failure).get_or_insert(err);
            failed.store(true, Ordering::Release);
        };

        pool.broadcast(|ctx| {
            let index = ctx.index();
            if index == 0 {
                let mut rep = lock(&representative);
                if let Err(err) = rep.exchange(&slabs, None).and_then(|()| rep.present(&slabs)) {
                    fail(err);
                }
            }
            barrier.wait();
            if failed.load(Ordering::Acquire) {
                return;
            }

            let mut done = 0u64;
            while generations.map_or(true, |n| done < n) {
                if index == 0 {
                    let mut guard = lock(&representative);
                    let rep = &mut *guard;
                    rep.observer.start_time(&rep.topology);
                }
                *lock(&margins[index]) = evaluate(&mut lock(&slabs[index]));
                barrier.wait();

                if index == 0 {
                    let mut guard = lock(&representative);
                    let rep = &mut *guard;
                    let slab_margins: Vec<Margins> = margins.iter().map(|m| *lock(m)).collect();
                    let outcome = rep.exchange(&slabs, Some(&slab_margins[..])).and_then(|()| {
                        rep.observer.exchange_time(&rep.topology);
                        rep.generation += 1;
                        rep.present(&slabs)
                    });
                    match outcome {
                        Ok(()) => rep.observer.end_time(&rep.topology),
                        Err(err) => fail(err),
                    }
                }
                barrier.wait();
                if failed.load(Ordering::Acquire) {
                    return;
                }
                done += 1;
            }
        });

        *generation = representative
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .generation;
        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

/// Column ranges of each domain, given every worker's range in ring order.
pub fn domain_columns(worker_columns: &[Range<usize>], threads: usize) -> Vec<Range<usize>> {
    worker_columns
        .chunks(threads)
        .map(|chunk| chunk[0].start..chunk[chunk.len() - 1].end)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halolife::cell::Cell;
    use crate::halolife::observer::NoopObserver;
    use crate::halolife::transport::ChannelTransport;

    #[test]
    fn domain_grid_round_trips_slabs() {
        let mut a = Grid::new(4, 5);
        let mut b = Grid::new(5, 5);
        a.set(1, 0, Cell::Alive);
        b.set(3, 4, Cell::Alive);
        let mut domain = DomainGrid::from_slabs(&[a, b]);
        assert_eq!(domain.interior_width(), 5);
        let slabs = domain.slabs_mut();
        assert_eq!(slabs.len(), 2);
        assert_eq!(slabs[1].width(), 5);
        let mut live = Vec::new();
        domain.frame().view().for_each_live(|x, y| live.push((x, y)));
        assert_eq!(live, vec![(0, 0), (4, 4)]);
    }

    #[test]
    fn margins_run_through_dead_slabs() {
        let widths = [3, 4, 5];
        let slabs = [
            Margins::new(3, 3),
            Margins::new(1, 2),
            Margins::new(5, 5),
        ];
        assert_eq!(domain_margins(&slabs, &widths), Margins::new(4, 7));
        let dead = [Margins::new(3, 3), Margins::new(4, 4), Margins::new(5, 5)];
        assert_eq!(domain_margins(&dead, &widths), Margins::new(12, 12));
    }

    #[test]
    fn domain_columns_merge_worker_ranges() {
        let workers = vec![0..5, 5..10, 10..15, 15..20, 20..25, 25..30];
        assert_eq!(domain_columns(&workers, 3), vec![0..15, 15..30]);
    }

    #[test]
    fn blinker_across_slab_seam_oscillates() {
        // Horizontal blinker straddling the seam between two slabs.
        let mut left = Grid::new(5, 6);
        let mut right = Grid::new(5, 6);
        left.set(3, 2, Cell::Alive);
        right.set(1, 2, Cell::Alive);
        right.set(2, 2, Cell::Alive);
        let transport = ChannelTransport::mesh(1).pop().unwrap();
        let mut coordinator = HybridCoordinator::new(
            WorkerTopology::new(0, 1, 0, 2),
            DomainGrid::from_slabs(&[left, right]),
            RingLink::new(transport, true),
            NoopObserver,
        );
        coordinator.run(Some(1)).unwrap();
        let mut live = Vec::new();
        coordinator
            .grid()
            .frame()
            .view()
            .for_each_live(|x, y| live.push((x, y)));
        assert_eq!(live, vec![(3, 1), (3, 2), (3, 3)]);
        coordinator.run(Some(1)).unwrap();
        assert_eq!(coordinator.generation(), 2);
        assert_eq!(coordinator.grid().frame().view().population(), 3);
    }
}
