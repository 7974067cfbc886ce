//! Launchers for the three execution modes.
//!
//! In-process runs give every memory domain its own OS thread and nothing
//! but a transport endpoint to talk to the others, so a distributed run here
//! exercises the same protocol a multi-process run does.

use std::ops::Range;
use std::thread;

use tracing::info;

use super::config::{ExecutionMode, HaloLifeConfig, RenderMode};
use super::error::{ConfigError, HaloLifeError};
use super::grid::{Grid, GridView};
use super::hybrid::{domain_columns, DomainGrid, HybridCoordinator};
use super::observer::{stitch, FrameGather, Observer};
use super::ring::{ExchangeStats, RingLink};
use super::transport::{ChannelTransport, Transport};
use super::worker::{Exchange, Worker, WorkerTopology};

/// Outcome of a bounded run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Final global grid, dead ghost columns around the interior.
    pub grid: Grid,
    /// One entry per memory domain, in ring order.
    pub stats: Vec<ExchangeStats>,
    pub generations: u64,
}

impl RunReport {
    pub fn total_stats(&self) -> ExchangeStats {
        let mut total = ExchangeStats::default();
        for stats in &self.stats {
            total.merge(stats);
        }
        total
    }
}

/// Run `config` in-process. `observers` builds one observer per memory
/// domain.
///
/// Returns only once every worker has stopped, so `generations: None`
/// returns only on failure.
pub fn run<O, F>(config: &HaloLifeConfig, observers: F) -> Result<RunReport, HaloLifeError>
where
    O: Observer + Send,
    F: Fn(WorkerTopology) -> O + Sync,
{
    config.validate()?;
    info!(
        width = config.width,
        height = config.height,
        mode = ?config.mode,
        render = ?config.render,
        skip = config.skip_optimization,
        generations = ?config.generations,
        "launching halo-life"
    );
    match config.mode {
        ExecutionMode::Sequential => run_sequential(config, observers),
        ExecutionMode::Distributed { workers } => {
            run_ring(config, ChannelTransport::mesh(workers), observers)
        }
        ExecutionMode::Hybrid { domains, .. } => {
            run_hybrid(config, ChannelTransport::mesh(domains), observers)
        }
    }
}

pub fn run_sequential<O, F>(config: &HaloLifeConfig, observers: F) -> Result<RunReport, HaloLifeError>
where
    O: Observer,
    F: Fn(WorkerTopology) -> O,
{
    let columns = config.partition()?;
    let topology = WorkerTopology::sequential();
    let grid = config
        .pattern
        .seed(columns[0].clone(), config.width, config.height);
    let mut worker: Worker<ChannelTransport, O> =
        Worker::new(topology, grid, Exchange::sequential(), observers(topology));
    if config.render == RenderMode::EachGeneration {
        worker = worker.rendering(FrameGather::new(columns, config.height));
    }
    worker.run(config.generations)?;
    let generations = worker.generation();
    let (grid, stats, _) = worker.into_parts();
    Ok(RunReport {
        grid,
        stats: vec![stats],
        generations,
    })
}

/// One thread per ring member; `transports[r]` must have rank `r`.
pub fn run_ring<T, O, F>(
    config: &HaloLifeConfig,
    transports: Vec<T>,
    observers: F,
) -> Result<RunReport, HaloLifeError>
where
    T: Transport + Send,
    O: Observer + Send,
    F: Fn(WorkerTopology) -> O + Sync,
{
    let columns = config.partition()?;
    check_ring_size(transports.len(), columns.len())?;
    let observers = &observers;
    let columns = &columns[..];

    let results = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(transports.len());
        for transport in transports {
            let rank = transport.rank();
            let handle = thread::Builder::new()
                .name(format!("halo-rank-{rank}"))
                .spawn_scoped(scope, move || {
                    let mut worker = ring_worker(config, columns, transport, observers);
                    worker.run(config.generations)?;
                    let generations = worker.generation();
                    let (grid, stats, _) = worker.into_parts();
                    Ok::<_, HaloLifeError>((grid, stats, generations))
                });
            handles.push((rank, handle));
        }
        join_all(handles)
    })?;

    let views: Vec<GridView<'_>> = results.iter().map(|(grid, _, _)| grid.view()).collect();
    let grid = stitch(config.height, &views);
    Ok(RunReport {
        grid,
        stats: results.iter().map(|(_, stats, _)| *stats).collect(),
        generations: results.first().map_or(0, |(_, _, g)| *g),
    })
}

/// One thread per memory domain, each running its own worker pool.
/// `transports[d]` connects domain `d`.
pub fn run_hybrid<T, O, F>(
    config: &HaloLifeConfig,
    transports: Vec<T>,
    observers: F,
) -> Result<RunReport, HaloLifeError>
where
    T: Transport + Send,
    O: Observer + Send,
    F: Fn(WorkerTopology) -> O + Sync,
{
    let ExecutionMode::Hybrid { domains, threads } = config.mode else {
        return Err(ConfigError::InvalidValue {
            name: "mode".to_string(),
            value: format!("{:?}", config.mode),
        }
        .into());
    };
    let columns = config.partition()?;
    check_ring_size(transports.len(), domains)?;
    let observers = &observers;
    let columns = &columns[..];

    let results = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(transports.len());
        for transport in transports {
            let node = transport.rank();
            let handle = thread::Builder::new()
                .name(format!("halo-node-{node}"))
                .spawn_scoped(scope, move || {
                    let mut coordinator =
                        domain_coordinator(config, columns, threads, transport, observers);
                    coordinator.run(config.generations)?;
                    let generations = coordinator.generation();
                    let (grid, stats, _) = coordinator.into_parts();
                    Ok::<_, HaloLifeError>((grid, stats, generations))
                });
            handles.push((node * threads, handle));
        }
        join_all(handles)
    })?;

    let frames: Vec<Grid> = results.iter().map(|(grid, _, _)| grid.frame()).collect();
    let views: Vec<GridView<'_>> = frames.iter().map(Grid::view).collect();
    Ok(RunReport {
        grid: stitch(config.height, &views),
        stats: results.iter().map(|(_, stats, _)| *stats).collect(),
        generations: results.first().map_or(0, |(_, _, g)| *g),
    })
}

/// Run this process's share of a multi-process computation; `transport`
/// spans every process. Distributed mode runs one worker, hybrid mode a
/// pool of `threads`. Returns this process's block of the grid.
pub fn run_process<T, O>(
    config: &HaloLifeConfig,
    transport: T,
    observer: O,
) -> Result<(Grid, ExchangeStats), HaloLifeError>
where
    T: Transport + Send,
    O: Observer + Send,
{
    let config = match config.mode {
        ExecutionMode::Hybrid { threads, .. } => config.clone().mode(ExecutionMode::Hybrid {
            domains: transport.size(),
            threads,
        }),
        _ => config.clone().mode(ExecutionMode::Distributed {
            workers: transport.size(),
        }),
    };
    let columns = config.partition()?;
    info!(
        rank = transport.rank(),
        size = transport.size(),
        mode = ?config.mode,
        "joining ring"
    );
    match config.mode {
        ExecutionMode::Hybrid { threads, .. } => {
            let mut coordinator =
                domain_coordinator(&config, &columns, threads, transport, |_| observer);
            coordinator.run(config.generations)?;
            let (grid, stats, _) = coordinator.into_parts();
            Ok((grid.frame(), stats))
        }
        _ => {
            let mut worker = ring_worker(&config, &columns, transport, |_| observer);
            worker.run(config.generations)?;
            let (grid, stats, _) = worker.into_parts();
            Ok((grid, stats))
        }
    }
}

fn ring_worker<T, O, F>(
    config: &HaloLifeConfig,
    columns: &[Range<usize>],
    transport: T,
    observer: F,
) -> Worker<T, O>
where
    T: Transport,
    O: Observer,
    F: FnOnce(WorkerTopology) -> O,
{
    let rank = transport.rank();
    let size = transport.size();
    let topology = WorkerTopology::new(rank, size, rank, size);
    let grid = config
        .pattern
        .seed(columns[rank].clone(), config.width, config.height);
    let link = RingLink::new(transport, config.skip_optimization);
    let worker = Worker::new(topology, grid, Exchange::Ring(link), observer(topology));
    match config.render {
        RenderMode::EachGeneration => {
            worker.rendering(FrameGather::new(columns.to_vec(), config.height))
        }
        RenderMode::Benchmark => worker,
    }
}

fn domain_coordinator<T, O, F>(
    config: &HaloLifeConfig,
    columns: &[Range<usize>],
    threads: usize,
    transport: T,
    observer: F,
) -> HybridCoordinator<T, O>
where
    T: Transport + Send,
    O: Observer + Send,
    F: FnOnce(WorkerTopology) -> O,
{
    let node = transport.rank();
    let nodes = transport.size();
    let slabs: Vec<Grid> = columns[node * threads..(node + 1) * threads]
        .iter()
        .map(|range| config.pattern.seed(range.clone(), config.width, config.height))
        .collect();
    let topology = WorkerTopology::new(node, nodes, node * threads, nodes * threads);
    let link = RingLink::new(transport, config.skip_optimization);
    let coordinator = HybridCoordinator::new(
        topology,
        DomainGrid::from_slabs(&slabs),
        link,
        observer(topology),
    );
    match config.render {
        RenderMode::EachGeneration => coordinator.rendering(FrameGather::new(
            domain_columns(columns, threads),
            config.height,
        )),
        RenderMode::Benchmark => coordinator,
    }
}

fn check_ring_size(transports: usize, expected: usize) -> Result<(), ConfigError> {
    if transports == expected {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            name: "transport count".to_string(),
            value: format!("{transports} (expected {expected})"),
        })
    }
}

/// Join every handle, preferring an original failure over the echoes it
/// caused in other workers.
fn join_all<R>(
    handles: Vec<(
        usize,
        std::io::Result<thread::ScopedJoinHandle<'_, Result<R, HaloLifeError>>>,
    )>,
) -> Result<Vec<R>, HaloLifeError> {
    let mut results = Vec::with_capacity(handles.len());
    let mut primary = None;
    let mut secondary = None;
    for (rank, handle) in handles {
        let outcome = match handle {
            Ok(handle) => handle
                .join()
                .unwrap_or(Err(HaloLifeError::WorkerPanicked { rank })),
            Err(err) => Err(HaloLifeError::Spawn(err)),
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(err) if err.is_secondary() => {
                secondary.get_or_insert(err);
            }
            Err(err) => {
                primary.get_or_insert(err);
            }
        }
    }
    match primary.or(secondary) {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halolife::observer::NoopObserver;
    use crate::halolife::pattern::Pattern;

    #[test]
    fn report_totals_merge_domains() {
        let report = RunReport {
            grid: Grid::new(3, 5),
            stats: vec![
                ExchangeStats {
                    rounds: 2,
                    transfers: 8,
                    skipped: 0,
                },
                ExchangeStats {
                    rounds: 2,
                    transfers: 4,
                    skipped: 4,
                },
            ],
            generations: 1,
        };
        assert_eq!(
            report.total_stats(),
            ExchangeStats {
                rounds: 4,
                transfers: 12,
                skipped: 4
            }
        );
    }

    #[test]
    fn mismatched_transport_count_is_rejected() {
        let config = HaloLifeConfig::default()
            .mode(ExecutionMode::Distributed { workers: 3 })
            .generations(1);
        let err = run_ring(&config, ChannelTransport::mesh(2), |_| NoopObserver).unwrap_err();
        assert!(matches!(err, HaloLifeError::Config(_)));
    }

    #[test]
    fn invalid_config_fails_before_launch() {
        let config = HaloLifeConfig::default().height(3).generations(1);
        let err = run(&config, |_| NoopObserver).unwrap_err();
        assert!(matches!(
            err,
            HaloLifeError::Config(ConfigError::HeightTooSmall(3))
        ));
    }

    #[test]
    fn distributed_block_stays_put() {
        let config = HaloLifeConfig::default()
            .width(12)
            .height(6)
            .mode(ExecutionMode::Distributed { workers: 3 })
            .pattern(Pattern::Block { x: 3, y: 2 })
            .generations(4);
        let report = run(&config, |_| NoopObserver).unwrap();
        assert_eq!(report.generations, 4);
        assert_eq!(report.stats.len(), 3);
        let mut live = Vec::new();
        report.grid.view().for_each_live(|x, y| live.push((x, y)));
        assert_eq!(live, vec![(3, 2), (3, 3), (4, 2), (4, 3)]);
    }
}
