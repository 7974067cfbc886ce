#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use halo_life::halolife::{
    ConfigError, ExecutionMode, GridView, HaloLifeConfig, HaloLifeError, Observer, Pattern,
    RenderMode, WorkerTopology,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: halo-life [--mode seq|dist|hybrid] [--workers N] [--domains N] \
[--threads N] [--width N] [--height N] [--generations N] [--bench] [--no-skip] \
[--pattern lwss|glider|blinker|block|soup|empty] [--delay-ms N] [--mpi]";

struct MainArgs {
    config: HaloLifeConfig,
    mpi: bool,
}

fn parse_args() -> Result<MainArgs, ConfigError> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = HaloLifeConfig::default().with_env_overrides()?;
    let mut mpi = false;
    let mut mode_name: Option<String> = None;
    let mut workers: Option<usize> = None;
    let mut domains: Option<usize> = None;
    let mut threads: Option<usize> = None;

    let value = |i: usize, flag: &str| -> Result<&str, ConfigError> {
        args.get(i).map(String::as_str).ok_or_else(|| ConfigError::InvalidValue {
            name: flag.to_string(),
            value: String::new(),
        })
    };
    let number = |i: usize, flag: &str| -> Result<usize, ConfigError> {
        let raw = value(i, flag)?;
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: flag.to_string(),
            value: raw.to_string(),
        })
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                i += 1;
                mode_name = Some(value(i, "--mode")?.to_ascii_lowercase());
            }
            "--workers" => {
                i += 1;
                workers = Some(number(i, "--workers")?);
            }
            "--domains" => {
                i += 1;
                domains = Some(number(i, "--domains")?);
            }
            "--threads" => {
                i += 1;
                threads = Some(number(i, "--threads")?);
            }
            "--width" => {
                i += 1;
                config = config.width(number(i, "--width")?);
            }
            "--height" => {
                i += 1;
                config = config.height(number(i, "--height")?);
            }
            "--generations" => {
                i += 1;
                config = config.generations(number(i, "--generations")? as u64);
            }
            "--bench" => {
                config = config.render(RenderMode::Benchmark);
            }
            "--render" => {
                config = config.render(RenderMode::EachGeneration);
            }
            "--no-skip" => {
                config = config.skip_optimization(false);
            }
            "--pattern" => {
                i += 1;
                let name = value(i, "--pattern")?;
                let pattern = Pattern::by_name(name).ok_or_else(|| ConfigError::InvalidValue {
                    name: "--pattern".to_string(),
                    value: name.to_string(),
                })?;
                config = config.pattern(pattern);
            }
            "--delay-ms" => {
                i += 1;
                let ms = number(i, "--delay-ms")?;
                config = config.frame_delay(Duration::from_millis(ms as u64));
            }
            "--mpi" => {
                mpi = true;
            }
            other => return Err(ConfigError::UnknownArgument(other.to_string())),
        }
        i += 1;
    }

    let mode = match (mode_name.as_deref(), config.mode) {
        (Some("seq" | "sequential"), _) => ExecutionMode::Sequential,
        (Some("dist" | "distributed"), ExecutionMode::Distributed { workers: current }) => {
            ExecutionMode::Distributed {
                workers: workers.unwrap_or(current),
            }
        }
        (Some("dist" | "distributed"), _) => ExecutionMode::Distributed {
            workers: workers.unwrap_or(4),
        },
        (Some("hybrid"), current) => {
            let (d, t) = match current {
                ExecutionMode::Hybrid { domains, threads } => (domains, threads),
                _ => (2, 2),
            };
            ExecutionMode::Hybrid {
                domains: domains.unwrap_or(d),
                threads: threads.unwrap_or(t),
            }
        }
        (Some(other), _) => {
            return Err(ConfigError::InvalidValue {
                name: "--mode".to_string(),
                value: other.to_string(),
            })
        }
        (None, ExecutionMode::Distributed { workers: current }) => ExecutionMode::Distributed {
            workers: workers.unwrap_or(current),
        },
        (None, ExecutionMode::Hybrid { domains: d, threads: t }) => ExecutionMode::Hybrid {
            domains: domains.unwrap_or(d),
            threads: threads.unwrap_or(t),
        },
        (None, ExecutionMode::Sequential) => ExecutionMode::Sequential,
    };
    config = config.mode(mode);
    config.validate()?;
    Ok(MainArgs { config, mpi })
}

#[derive(Default)]
struct Timings {
    generations: u64,
    sweep_and_exchange: Duration,
    present: Duration,
}

/// ASCII frames plus per-generation timing.
struct Console {
    render: bool,
    delay: Duration,
    started: Option<Instant>,
    exchanged: Option<Instant>,
    timings: Arc<Mutex<Timings>>,
}

impl Console {
    fn new(config: &HaloLifeConfig, timings: Arc<Mutex<Timings>>) -> Self {
        Self {
            render: config.render == RenderMode::EachGeneration,
            delay: config.frame_delay,
            started: None,
            exchanged: None,
            timings,
        }
    }
}

impl Observer for Console {
    fn start_time(&mut self, _topology: &WorkerTopology) {
        self.started = Some(Instant::now());
    }

    fn exchange_time(&mut self, _topology: &WorkerTopology) {
        self.exchanged = Some(Instant::now());
    }

    fn end_time(&mut self, topology: &WorkerTopology) {
        if !topology.is_root() {
            return;
        }
        let (Some(started), Some(exchanged)) = (self.started.take(), self.exchanged.take()) else {
            return;
        };
        let mut timings = self.timings.lock().unwrap_or_else(PoisonError::into_inner);
        timings.generations += 1;
        timings.sweep_and_exchange += exchanged - started;
        timings.present += exchanged.elapsed();
    }

    fn print(&mut self, frame: GridView<'_>, _topology: &WorkerTopology, generation: u64) {
        if !self.render {
            return;
        }
        let mut out = String::with_capacity((frame.interior_width() + 1) * frame.height() + 32);
        let _ = writeln!(out, "generation {generation}");
        for y in 0..frame.height() {
            for x in 1..frame.width() - 1 {
                out.push(if frame.is_alive(x, y) { '#' } else { '_' });
            }
            out.push('\n');
        }
        println!("{out}");
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

fn print_summary(timings: &Timings, transfers: u64, skipped: u64, population: Option<usize>) {
    let generations = timings.generations.max(1) as f64;
    let step_ms = timings.sweep_and_exchange.as_secs_f64() * 1000.0;
    let present_ms = timings.present.as_secs_f64() * 1000.0;
    println!("\n--- Summary ({} generations) ---", timings.generations);
    println!(
        "sweep + exchange: {step_ms:.3} ms total, {:.6} ms/gen",
        step_ms / generations
    );
    println!(
        "present: {present_ms:.3} ms total, {:.6} ms/gen",
        present_ms / generations
    );
    println!("halo transfers: {transfers}, skipped: {skipped}");
    if let Some(population) = population {
        println!("final population: {population}");
    }
}

fn run_local(config: HaloLifeConfig) -> Result<(), HaloLifeError> {
    let timings = Arc::new(Mutex::new(Timings::default()));
    let started = Instant::now();
    let report = halo_life::halolife::run(&config, |_| Console::new(&config, Arc::clone(&timings)))?;
    info!(elapsed = ?started.elapsed(), "run finished");
    let total = report.total_stats();
    let timings = timings.lock().unwrap_or_else(PoisonError::into_inner);
    print_summary(
        &timings,
        total.transfers,
        total.skipped,
        Some(report.grid.view().population()),
    );
    Ok(())
}

#[cfg(feature = "mpi")]
fn run_mpi(config: HaloLifeConfig) -> Result<(), HaloLifeError> {
    use halo_life::halolife::mpi_transport::MpiTransport;
    use mpi::Threading;

    let Some((universe, threading)) = mpi::initialize_with_threading(Threading::Serialized) else {
        return Err(ConfigError::InvalidValue {
            name: "mpi".to_string(),
            value: "already initialized".to_string(),
        }
        .into());
    };
    if threading < Threading::Serialized {
        return Err(ConfigError::InvalidValue {
            name: "mpi threading".to_string(),
            value: format!("{threading:?}"),
        }
        .into());
    }
    let transport = MpiTransport::new(universe.world());
    let timings = Arc::new(Mutex::new(Timings::default()));
    let console = Console::new(&config, Arc::clone(&timings));
    let (_, stats) = halo_life::halolife::run_process(&config, transport, console)?;
    let timings = timings.lock().unwrap_or_else(PoisonError::into_inner);
    if timings.generations > 0 {
        print_summary(&timings, stats.transfers, stats.skipped, None);
    }
    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: HaloLifeConfig) -> Result<(), HaloLifeError> {
    Err(ConfigError::InvalidValue {
        name: "--mpi".to_string(),
        value: "built without the `mpi` feature".to_string(),
    }
    .into())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}\n{USAGE}");
            std::process::exit(2);
        }
    };
    let outcome = if args.mpi {
        run_mpi(args.config)
    } else {
        run_local(args.config)
    };
    if let Err(err) = outcome {
        error!(%err, "halo-life failed");
        std::process::exit(1);
    }
}
