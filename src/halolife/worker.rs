//! Per-worker context: owns the grid, the exchange capability and the
//! observer, and drives the evaluate -> exchange -> present cycle.

use super::error::TransportError;
use super::evaluate::{evaluate, Margins};
use super::grid::Grid;
use super::halo::HaloMessage;
use super::observer::{FrameGather, Observer};
use super::ring::{wrap_in_place, ExchangeStats, RingLink};
use super::transport::Transport;

/// Where a worker sits.
///
/// `node` is the memory domain; `rank` is the worker's position on the
/// global ring of `rank_count` workers. Outside hybrid runs every worker is
/// its own domain, so `node == rank`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerTopology {
    pub node: usize,
    pub node_count: usize,
    pub rank: usize,
    pub rank_count: usize,
}

impl WorkerTopology {
    pub const fn new(node: usize, node_count: usize, rank: usize, rank_count: usize) -> Self {
        Self {
            node,
            node_count,
            rank,
            rank_count,
        }
    }

    pub const fn sequential() -> Self {
        Self::new(0, 1, 0, 1)
    }

    #[inline]
    pub fn left_neighbor(&self) -> usize {
        (self.rank + self.rank_count - 1) % self.rank_count
    }

    #[inline]
    pub fn right_neighbor(&self) -> usize {
        (self.rank + 1) % self.rank_count
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

/// How a worker refreshes its ghost columns.
pub enum Exchange<T> {
    /// Sole worker: near columns wrap straight into the opposite ghosts.
    Sequential(ExchangeStats),
    /// Member of a message-passing ring.
    Ring(RingLink<T>),
}

impl<T: Transport> Exchange<T> {
    pub fn sequential() -> Self {
        Exchange::Sequential(ExchangeStats::default())
    }

    pub fn exchange(&mut self, msg: &mut HaloMessage<'_>) -> Result<(), TransportError> {
        match self {
            Exchange::Sequential(stats) => {
                wrap_in_place(msg);
                stats.rounds += 1;
                Ok(())
            }
            Exchange::Ring(link) => link.exchange(msg),
        }
    }

    pub fn stats(&self) -> ExchangeStats {
        match self {
            Exchange::Sequential(stats) => *stats,
            Exchange::Ring(link) => *link.stats(),
        }
    }

    pub fn ring_size(&self) -> usize {
        match self {
            Exchange::Sequential(_) => 1,
            Exchange::Ring(link) => link.size(),
        }
    }
}

pub struct Worker<T, O> {
    topology: WorkerTopology,
    grid: Grid,
    exchange: Exchange<T>,
    observer: O,
    gather: Option<FrameGather>,
    generation: u64,
    margins: Margins,
}

impl<T: Transport, O: Observer> Worker<T, O> {
    pub fn new(topology: WorkerTopology, grid: Grid, exchange: Exchange<T>, observer: O) -> Self {
        Self {
            topology,
            grid,
            exchange,
            observer,
            gather: None,
            generation: 0,
            margins: Margins::default(),
        }
    }

    /// Hand every generation to the observer's `print`; ring members ship
    /// their block to rank 0 first.
    pub fn rendering(mut self, gather: FrameGather) -> Self {
        self.gather = Some(gather);
        self
    }

    /// Fill the ghost columns from the seeded neighbors. Zero margins keep
    /// every slot due, so the next round transfers in full.
    pub fn prime(&mut self) -> Result<(), TransportError> {
        let mut view = self.grid.view_mut();
        let mut msg = HaloMessage::from_grid(&mut view, Margins::default());
        self.exchange.exchange(&mut msg)
    }

    /// Advance one generation.
    pub fn step(&mut self) -> Result<Margins, TransportError> {
        self.observer.start_time(&self.topology);
        let mut view = self.grid.view_mut();
        let margins = evaluate(&mut view);
        let mut msg = HaloMessage::from_grid(&mut view, margins);
        self.exchange.exchange(&mut msg)?;
        self.observer.exchange_time(&self.topology);

        self.generation += 1;
        self.margins = margins;
        self.present()?;
        self.observer.end_time(&self.topology);
        Ok(margins)
    }

    /// Prime, show generation 0, then step `generations` times (forever on
    /// `None`).
    pub fn run(&mut self, generations: Option<u64>) -> Result<(), TransportError> {
        self.prime()?;
        self.present()?;
        match generations {
            Some(n) => {
                for _ in 0..n {
                    self.step()?;
                }
            }
            None => loop {
                self.step()?;
            },
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), TransportError> {
        let Some(gather) = &self.gather else {
            return Ok(());
        };
        match &mut self.exchange {
            Exchange::Ring(link) if link.size() > 1 => {
                let frame = match gather.gather(link.transport_mut(), self.grid.view()) {
                    Ok(frame) => frame,
                    Err(err) => {
                        link.transport_mut().abort();
                        return Err(err);
                    }
                };
                if let Some(frame) = frame {
                    self.observer
                        .print(frame.view(), &self.topology, self.generation);
                }
            }
            _ => self
                .observer
                .print(self.grid.view(), &self.topology, self.generation),
        }
        Ok(())
    }

    pub fn topology(&self) -> &WorkerTopology {
        &self.topology
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Margins reported by the last sweep.
    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn stats(&self) -> ExchangeStats {
        self.exchange.stats()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_parts(self) -> (Grid, ExchangeStats, O) {
        let stats = self.exchange.stats();
        (self.grid, stats, self.observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halolife::cell::Cell;
    use crate::halolife::grid::GridView;
    use crate::halolife::observer::NoopObserver;
    use crate::halolife::transport::ChannelTransport;

    #[derive(Default)]
    struct Frames(Vec<(u64, usize)>);

    impl Observer for Frames {
        fn print(&mut self, frame: GridView<'_>, _topology: &WorkerTopology, generation: u64) {
            self.0.push((generation, frame.population()));
        }
    }

    #[test]
    fn topology_neighbors_wrap() {
        let topology = WorkerTopology::new(0, 4, 0, 4);
        assert_eq!(topology.left_neighbor(), 3);
        assert_eq!(topology.right_neighbor(), 1);
        let last = WorkerTopology::new(3, 4, 3, 4);
        assert_eq!(last.right_neighbor(), 0);
        assert_eq!(WorkerTopology::sequential().left_neighbor(), 0);
    }

    #[test]
    fn blinker_on_the_seam_wraps_sequentially() {
        // A horizontal blinker on the seam only survives if columns wrap.
        let mut grid = Grid::new(8, 6);
        grid.set(6, 2, Cell::Alive);
        grid.set(1, 2, Cell::Alive);
        grid.set(2, 2, Cell::Alive);
        let mut worker: Worker<ChannelTransport, _> = Worker::new(
            WorkerTopology::sequential(),
            grid,
            Exchange::sequential(),
            NoopObserver,
        );
        worker.run(Some(2)).unwrap();
        assert_eq!(worker.generation(), 2);
        assert_eq!(worker.grid().view().population(), 3);
        assert!(worker.grid().view().is_alive(1, 2));
        assert_eq!(worker.stats().rounds, 3);
    }

    #[test]
    fn rendering_prints_every_generation() {
        let mut grid = Grid::new(7, 7);
        grid.set(3, 2, Cell::Alive);
        grid.set(3, 3, Cell::Alive);
        grid.set(3, 4, Cell::Alive);
        let mut worker: Worker<ChannelTransport, _> = Worker::new(
            WorkerTopology::sequential(),
            grid,
            Exchange::sequential(),
            Frames::default(),
        )
        .rendering(FrameGather::new(vec![0..5], 7));
        worker.run(Some(3)).unwrap();
        assert_eq!(worker.observer().0, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
    }
}
