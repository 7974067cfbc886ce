//! HaloLife engine: column-partitioned workers on a ring, exchanging halo
//! columns only when activity can reach them.

pub mod cell;
pub mod cluster;
pub mod config;
pub mod credit;
pub mod error;
pub mod evaluate;
pub mod grid;
pub mod halo;
pub mod hybrid;
#[cfg(feature = "mpi")]
pub mod mpi_transport;
pub mod observer;
pub mod pattern;
pub mod ring;
pub mod skip_codec;
pub mod transport;
pub mod worker;

pub use cell::Cell;
pub use cluster::{run, run_process, RunReport};
pub use config::{ExecutionMode, HaloLifeConfig, RenderMode};
pub use error::{ConfigError, HaloLifeError, TransportError, TransportErrorKind};
pub use grid::{Grid, GridView};
pub use observer::{NoopObserver, Observer};
pub use pattern::Pattern;
pub use ring::ExchangeStats;
pub use transport::{ChannelTransport, Transport};
pub use worker::WorkerTopology;
