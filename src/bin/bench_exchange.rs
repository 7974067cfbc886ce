//! Halo traffic and wall time with the skip optimization on vs. off.
//!
//! Every scenario runs twice on the same seed; the final grids must agree,
//! only the number of transfers may differ. Use `--release` for timings.

use std::time::Instant;

use halo_life::halolife::{run, ExchangeStats, ExecutionMode, HaloLifeConfig, NoopObserver, Pattern};

struct Scenario {
    name: &'static str,
    width: usize,
    height: usize,
    mode: ExecutionMode,
    pattern: Pattern,
    generations: u64,
}

fn run_scenario(s: &Scenario, skip: bool) -> (f64, ExchangeStats, Vec<u8>) {
    let config = HaloLifeConfig::default()
        .width(s.width)
        .height(s.height)
        .mode(s.mode)
        .pattern(s.pattern.clone())
        .skip_optimization(skip)
        .generations(s.generations);
    let start = Instant::now();
    let report = match run(&config, |_| NoopObserver) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{}: {err}", s.name);
            std::process::exit(1);
        }
    };
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;
    (total_ms, report.total_stats(), report.grid.cells().to_vec())
}

fn main() {
    let scenarios = [
        Scenario {
            name: "lwss-4",
            width: 30,
            height: 20,
            mode: ExecutionMode::Distributed { workers: 4 },
            pattern: Pattern::default(),
            generations: 500,
        },
        Scenario {
            name: "glider-8",
            width: 256,
            height: 64,
            mode: ExecutionMode::Distributed { workers: 8 },
            pattern: Pattern::Glider { x: 1, y: 1 },
            generations: 1000,
        },
        Scenario {
            name: "soup-8",
            width: 512,
            height: 256,
            mode: ExecutionMode::Distributed { workers: 8 },
            pattern: Pattern::Soup {
                seed: 0xA1,
                one_in: 20,
            },
            generations: 200,
        },
        Scenario {
            name: "block-16",
            width: 512,
            height: 32,
            mode: ExecutionMode::Distributed { workers: 16 },
            pattern: Pattern::Block { x: 40, y: 10 },
            generations: 1000,
        },
        Scenario {
            name: "glider-hybrid-2x4",
            width: 256,
            height: 64,
            mode: ExecutionMode::Hybrid {
                domains: 2,
                threads: 4,
            },
            pattern: Pattern::Glider { x: 1, y: 1 },
            generations: 1000,
        },
    ];

    println!(
        "{:<20} {:>6} {:>12} {:>12} {:>10} {:>10} {:>8}",
        "Scenario", "Skip", "Total(ms)", "Avg(ms)", "Transfers", "Skipped", "Same"
    );
    println!("{}", "-".repeat(84));

    for s in &scenarios {
        let (off_ms, off_stats, off_cells) = run_scenario(s, false);
        let (on_ms, on_stats, on_cells) = run_scenario(s, true);
        let same = if off_cells == on_cells { "yes" } else { "NO" };
        for (skip, ms, stats) in [("off", off_ms, off_stats), ("on", on_ms, on_stats)] {
            println!(
                "{:<20} {:>6} {:>12.3} {:>12.6} {:>10} {:>10} {:>8}",
                s.name,
                skip,
                ms,
                ms / s.generations as f64,
                stats.transfers,
                stats.skipped,
                same
            );
        }
    }
}
