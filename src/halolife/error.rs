//! Error taxonomy for HaloLife.
//!
//! Nothing here is recoverable: transport failures and precondition
//! violations both end the whole computation. The types exist so the
//! failing operation and its source location reach the user intact.

use std::panic::Location;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportErrorKind {
    #[error("peer disconnected")]
    Disconnected,
    #[error("aborted by a failing peer")]
    Aborted,
    #[error("expected tag {expected}, received tag {actual}")]
    TagMismatch { expected: i32, actual: i32 },
    #[error("expected {expected} bytes, received {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("peer is not part of this communicator")]
    PeerOutOfRange,
}

/// A failed send/receive on the worker ring.
#[derive(Debug, Clone, Error)]
#[error("{op} with rank {peer} failed at {location}: {kind}")]
pub struct TransportError {
    pub op: &'static str,
    pub peer: usize,
    pub location: &'static Location<'static>,
    pub kind: TransportErrorKind,
}

impl TransportError {
    #[track_caller]
    pub fn new(op: &'static str, peer: usize, kind: TransportErrorKind) -> Self {
        Self {
            op,
            peer,
            location: Location::caller(),
            kind,
        }
    }

    /// True when this error is only the echo of some other worker's failure.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Aborted | TransportErrorKind::Disconnected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("height {0} is below the 5 rows needed to carry skip margins")]
    HeightTooSmall(usize),
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("{width} columns cannot give each of {workers} workers 2 interior columns")]
    NarrowPartition { width: usize, workers: usize },
    #[error("width {0} does not fit the 4-byte margin encoding")]
    WidthOverflow(usize),
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: String, value: String },
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

#[derive(Debug, Error)]
pub enum HaloLifeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: usize },
}

impl HaloLifeError {
    pub fn is_secondary(&self) -> bool {
        match self {
            HaloLifeError::Transport(err) => err.is_secondary(),
            _ => false,
        }
    }
}
