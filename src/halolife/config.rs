//! Run configuration and column partitioning.

use std::ops::Range;
use std::time::Duration;

use super::error::ConfigError;
use super::pattern::Pattern;
use super::skip_codec::MIN_COLUMN_LEN;

/// Execution type (`sequential`, `dist`, `hybrid`).
pub const ENV_TYPE: &str = "HALOLIFE_TYPE";
/// Output mode (`render` or `bench`).
pub const ENV_MODE: &str = "HALOLIFE_MODE";
/// Worker count: ranks in `dist`, threads per domain in `hybrid`.
pub const ENV_COUNT: &str = "HALOLIFE_COUNT";

const DEFAULT_HYBRID_DOMAINS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One worker, no transport.
    Sequential,
    /// One worker per memory domain, message passing only.
    Distributed { workers: usize },
    /// `domains` memory domains, each running `threads` workers that share
    /// one allocation.
    Hybrid { domains: usize, threads: usize },
}

impl ExecutionMode {
    /// Total number of column partitions.
    pub fn worker_count(&self) -> usize {
        match *self {
            ExecutionMode::Sequential => 1,
            ExecutionMode::Distributed { workers } => workers,
            ExecutionMode::Hybrid { domains, threads } => domains * threads,
        }
    }

    fn parse(kind: &str, count: Option<usize>) -> Option<Self> {
        let mode = match kind.to_ascii_lowercase().as_str() {
            "seq" | "sequential" => ExecutionMode::Sequential,
            "dist" | "distributed" | "mpi" => ExecutionMode::Distributed {
                workers: count.unwrap_or(1),
            },
            "hybrid" => ExecutionMode::Hybrid {
                domains: DEFAULT_HYBRID_DOMAINS,
                threads: count.unwrap_or(1),
            },
            _ => return None,
        };
        Some(mode)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Hand every settled generation to the observer.
    EachGeneration,
    /// No frames; only timing callbacks fire.
    #[default]
    Benchmark,
}

/// Configuration for a HaloLife run.
///
/// `width` counts global interior columns (ghost columns are added per
/// worker). Customise via the builder methods.
#[derive(Clone, Debug)]
pub struct HaloLifeConfig {
    pub width: usize,
    pub height: usize,
    pub mode: ExecutionMode,
    pub render: RenderMode,
    /// Elide halo transfers while edges are quiet.
    pub skip_optimization: bool,
    /// `None` runs until the process is killed.
    pub generations: Option<u64>,
    pub pattern: Pattern,
    /// Pause after each rendered frame.
    pub frame_delay: Duration,
}

impl Default for HaloLifeConfig {
    fn default() -> Self {
        Self {
            width: 30,
            height: 20,
            mode: ExecutionMode::Sequential,
            render: RenderMode::default(),
            skip_optimization: true,
            generations: None,
            pattern: Pattern::default(),
            frame_delay: Duration::ZERO,
        }
    }
}

impl HaloLifeConfig {
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn render(mut self, render: RenderMode) -> Self {
        self.render = render;
        self
    }

    pub fn skip_optimization(mut self, enabled: bool) -> Self {
        self.skip_optimization = enabled;
        self
    }

    pub fn generations(mut self, n: u64) -> Self {
        self.generations = Some(n);
        self
    }

    pub fn forever(mut self) -> Self {
        self.generations = None;
        self
    }

    pub fn pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.height < MIN_COLUMN_LEN {
            return Err(ConfigError::HeightTooSmall(self.height));
        }
        if u32::try_from(self.width).is_err() {
            return Err(ConfigError::WidthOverflow(self.width));
        }
        if let ExecutionMode::Hybrid { domains: 0, .. } = self.mode {
            return Err(ConfigError::NoWorkers);
        }
        let workers = self.mode.worker_count();
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.width / workers < 2 {
            return Err(ConfigError::NarrowPartition {
                width: self.width,
                workers,
            });
        }
        Ok(())
    }

    /// Interior column range of every worker, in ring order.
    pub fn partition(&self) -> Result<Vec<Range<usize>>, ConfigError> {
        self.validate()?;
        Ok(partition_columns(self.width, self.mode.worker_count()))
    }

    /// Apply `HALOLIFE_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |name: &str, value: &str| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        };

        let count = match lookup(ENV_COUNT) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(invalid(ENV_COUNT, &raw)),
            },
            None => None,
        };

        if let Some(raw) = lookup(ENV_TYPE) {
            self.mode = ExecutionMode::parse(raw.trim(), count)
                .ok_or_else(|| invalid(ENV_TYPE, &raw))?;
        } else if let Some(n) = count {
            self.mode = match self.mode {
                ExecutionMode::Sequential => ExecutionMode::Sequential,
                ExecutionMode::Distributed { .. } => ExecutionMode::Distributed { workers: n },
                ExecutionMode::Hybrid { domains, .. } => ExecutionMode::Hybrid {
                    domains,
                    threads: n,
                },
            };
        }

        if let Some(raw) = lookup(ENV_MODE) {
            self.render = match raw.trim().to_ascii_lowercase().as_str() {
                "render" => RenderMode::EachGeneration,
                "bench" | "benchmark" => RenderMode::Benchmark,
                _ => return Err(invalid(ENV_MODE, &raw)),
            };
        }
        Ok(self)
    }
}

/// Split `width` columns into `parts` contiguous ranges; the first
/// `width % parts` ranges get one extra column.
pub fn partition_columns(width: usize, parts: usize) -> Vec<Range<usize>> {
    assert!(parts > 0, "cannot partition across zero workers");
    let base = width / parts;
    let extra = width % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partition_is_contiguous_and_balanced() {
        let ranges = partition_columns(30, 4);
        assert_eq!(ranges, vec![0..8, 8..16, 16..23, 23..30]);
        assert_eq!(partition_columns(6, 1), vec![0..6]);
    }

    #[test]
    fn validation_rejects_short_and_narrow_grids() {
        let base = HaloLifeConfig::default();
        assert_eq!(
            base.clone().height(4).validate(),
            Err(ConfigError::HeightTooSmall(4))
        );
        assert_eq!(
            base.clone()
                .width(7)
                .mode(ExecutionMode::Distributed { workers: 4 })
                .validate(),
            Err(ConfigError::NarrowPartition {
                width: 7,
                workers: 4
            })
        );
        assert_eq!(
            base.clone()
                .mode(ExecutionMode::Distributed { workers: 0 })
                .validate(),
            Err(ConfigError::NoWorkers)
        );
        assert!(base
            .mode(ExecutionMode::Hybrid {
                domains: 2,
                threads: 3
            })
            .validate()
            .is_ok());
    }

    #[test]
    fn env_selects_type_mode_and_count() {
        let config = HaloLifeConfig::default()
            .apply_overrides(env(&[
                (ENV_TYPE, "hybrid"),
                (ENV_MODE, "render"),
                (ENV_COUNT, "3"),
            ]))
            .unwrap();
        assert_eq!(
            config.mode,
            ExecutionMode::Hybrid {
                domains: 2,
                threads: 3
            }
        );
        assert_eq!(config.render, RenderMode::EachGeneration);
    }

    #[test]
    fn env_count_alone_resizes_current_mode() {
        let config = HaloLifeConfig::default()
            .mode(ExecutionMode::Distributed { workers: 2 })
            .apply_overrides(env(&[(ENV_COUNT, "5")]))
            .unwrap();
        assert_eq!(config.mode, ExecutionMode::Distributed { workers: 5 });
    }

    #[test]
    fn env_garbage_is_reported() {
        let err = HaloLifeConfig::default()
            .apply_overrides(env(&[(ENV_TYPE, "quantum")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: ENV_TYPE.to_string(),
                value: "quantum".to_string()
            }
        );
    }
}
