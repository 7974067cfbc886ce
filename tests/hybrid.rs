mod common;

use common::{naive_frames, recorded_run};
use halo_life::halolife::{ExecutionMode, HaloLifeConfig, Pattern};

fn config(pattern: Pattern, domains: usize, threads: usize, generations: u64) -> HaloLifeConfig {
    HaloLifeConfig::default()
        .width(30)
        .height(20)
        .mode(ExecutionMode::Hybrid { domains, threads })
        .pattern(pattern)
        .generations(generations)
}

#[test]
fn two_domains_of_three_threads_match_reference() {
    for pattern in [
        Pattern::default(),
        Pattern::Glider { x: 1, y: 1 },
        Pattern::Soup { seed: 0xC3, one_in: 5 },
    ] {
        let config = config(pattern.clone(), 2, 3, 90);
        let (report, frames) = recorded_run(&config);
        assert_eq!(frames, naive_frames(&config, 90), "{pattern:?}");
        assert_eq!(report.generations, 90);
        assert_eq!(report.stats.len(), 2);
    }
}

#[test]
fn single_domain_wraps_through_its_own_slabs() {
    let config = config(Pattern::Glider { x: 25, y: 15 }, 1, 4, 60);
    let (report, frames) = recorded_run(&config);
    assert_eq!(frames, naive_frames(&config, 60));
    // A lone domain never touches its transport.
    assert_eq!(report.total_stats().transfers, 0);
}

#[test]
fn hybrid_skip_optimization_is_invisible() {
    let base = config(Pattern::Glider { x: 3, y: 2 }, 3, 2, 80);
    let (on_report, on) = recorded_run(&base.clone().skip_optimization(true));
    let (off_report, off) = recorded_run(&base.skip_optimization(false));
    assert_eq!(on, off);
    assert!(on_report.total_stats().transfers < off_report.total_stats().transfers);
}

#[test]
fn one_thread_per_domain_behaves_like_distributed() {
    let hybrid = config(Pattern::default(), 4, 1, 50);
    let distributed = hybrid
        .clone()
        .mode(ExecutionMode::Distributed { workers: 4 });
    let (_, a) = recorded_run(&hybrid);
    let (_, b) = recorded_run(&distributed);
    assert_eq!(a, b);
}
