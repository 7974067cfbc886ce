#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use halo_life::halolife::{
    run, GridView, HaloLifeConfig, Observer, RenderMode, RunReport, WorkerTopology,
};

pub type LiveSet = HashSet<(usize, usize)>;

/// Wall-time bound for any single run in the suite.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(60);

pub fn live_set(frame: GridView<'_>) -> LiveSet {
    let mut out = HashSet::new();
    frame.for_each_live(|x, y| {
        out.insert((x, y));
    });
    out
}

/// Reference B3/S23 step on a `width` x `height` torus.
pub fn naive_step(live: &LiveSet, width: usize, height: usize) -> LiveSet {
    let mut counts = std::collections::HashMap::<(usize, usize), u8>::new();
    for &(x, y) in live {
        for dx in [width - 1, 0, 1] {
            for dy in [height - 1, 0, 1] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                *counts.entry(((x + dx) % width, (y + dy) % height)).or_default() += 1;
            }
        }
    }
    counts
        .into_iter()
        .filter(|&(cell, n)| n == 3 || (n == 2 && live.contains(&cell)))
        .map(|(cell, _)| cell)
        .collect()
}

pub fn naive_frames(config: &HaloLifeConfig, generations: u64) -> Vec<LiveSet> {
    let mut live: LiveSet = config
        .pattern
        .live_cells(config.width, config.height)
        .into_iter()
        .collect();
    let mut frames = vec![live.clone()];
    for _ in 0..generations {
        live = naive_step(&live, config.width, config.height);
        frames.push(live.clone());
    }
    frames
}

/// Keeps every frame handed to `print`.
#[derive(Clone, Default)]
pub struct Recorder(pub Arc<Mutex<Vec<(u64, LiveSet)>>>);

impl Observer for Recorder {
    fn print(&mut self, frame: GridView<'_>, _topology: &WorkerTopology, generation: u64) {
        self.0.lock().unwrap().push((generation, live_set(frame)));
    }
}

/// Run `config` in render mode on a watchdog; returns the report and every
/// frame in order.
pub fn recorded_run(config: &HaloLifeConfig) -> (RunReport, Vec<LiveSet>) {
    let config = config.clone().render(RenderMode::EachGeneration);
    let recorder = Recorder::default();
    let frames = Arc::clone(&recorder.0);
    let report = bounded(move || run(&config, move |_| recorder.clone()).unwrap());
    let frames = Arc::try_unwrap(frames).unwrap().into_inner().unwrap();
    for (i, (generation, _)) in frames.iter().enumerate() {
        assert_eq!(*generation, i as u64, "frames out of order");
    }
    (report, frames.into_iter().map(|(_, live)| live).collect())
}

/// Run `f` on its own thread and fail the test if it outlives `RUN_TIMEOUT`.
pub fn bounded<R, F>(f: F) -> R
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        let _ = tx.send(f());
    });
    match rx.recv_timeout(RUN_TIMEOUT) {
        Ok(result) => {
            handle.join().unwrap();
            result
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // The closure panicked; surface its message.
            match handle.join() {
                Err(panic) => std::panic::resume_unwind(panic),
                Ok(()) => unreachable!("sender dropped without sending"),
            }
        }
        Err(mpsc::RecvTimeoutError::Timeout) => panic!("run did not finish within {RUN_TIMEOUT:?}"),
    }
}
