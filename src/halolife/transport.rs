//! Point-to-point transport between memory domains.
//!
//! The ring protocol only needs blocking, tagged send/receive of byte
//! columns. `ChannelTransport` provides that in-process with rendezvous
//! channels: a send does not return until the matching receive has taken
//! the data, the strictest ordering an MPI implementation may choose, so a
//! schedule that is deadlock-free here is deadlock-free everywhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use super::error::{TransportError, TransportErrorKind};

pub type Tag = i32;

/// Halo columns.
pub const TAG_EDGE: Tag = 1;
/// Interior blocks shipped to rank 0 for rendering.
pub const TAG_GATHER: Tag = 2;

/// How often a blocked receive checks whether a peer aborted.
const ABORT_POLL: Duration = Duration::from_millis(20);

pub trait Transport {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Blocking send of `buf` to `dest`.
    fn send(&mut self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransportError>;

    /// Blocking receive from `src` into `buf`; the message length must match.
    fn recv(&mut self, src: usize, tag: Tag, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Tear the whole computation down after a fatal error.
    fn abort(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    #[track_caller]
    fn send(&mut self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransportError> {
        (**self).send(dest, tag, buf)
    }

    #[track_caller]
    fn recv(&mut self, src: usize, tag: Tag, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).recv(src, tag, buf)
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

struct Packet {
    tag: Tag,
    payload: Vec<u8>,
}

/// One endpoint of a fully connected in-process mesh.
///
/// Every ordered pair of ranks gets its own zero-capacity channel, so
/// messages between two ranks arrive in the order they were sent. Dropping
/// an endpoint disconnects it from every peer.
pub struct ChannelTransport {
    rank: usize,
    size: usize,
    outbox: Vec<Option<SyncSender<Packet>>>,
    inbox: Vec<Option<Receiver<Packet>>>,
    aborted: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Build `size` connected endpoints, indexed by rank.
    pub fn mesh(size: usize) -> Vec<ChannelTransport> {
        let mut outboxes: Vec<Vec<Option<SyncSender<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            for dst in 0..size {
                if src == dst {
                    continue;
                }
                let (tx, rx) = mpsc::sync_channel(0);
                outboxes[src][dst] = Some(tx);
                inboxes[dst][src] = Some(rx);
            }
        }

        let aborted = Arc::new(AtomicBool::new(false));
        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outbox, inbox))| ChannelTransport {
                rank,
                size,
                outbox,
                inbox,
                aborted: Arc::clone(&aborted),
            })
            .collect()
    }

    #[inline]
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    #[track_caller]
    fn send(&mut self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransportError> {
        if self.is_aborted() {
            return Err(TransportError::new("send", dest, TransportErrorKind::Aborted));
        }
        let Some(Some(outbox)) = self.outbox.get(dest) else {
            return Err(TransportError::new(
                "send",
                dest,
                TransportErrorKind::PeerOutOfRange,
            ));
        };
        let packet = Packet {
            tag,
            payload: buf.to_vec(),
        };
        match outbox.send(packet) {
            Ok(()) => Ok(()),
            Err(_) => Err(TransportError::new(
                "send",
                dest,
                TransportErrorKind::Disconnected,
            )),
        }
    }

    #[track_caller]
    fn recv(&mut self, src: usize, tag: Tag, buf: &mut [u8]) -> Result<(), TransportError> {
        let Some(Some(inbox)) = self.inbox.get(src) else {
            return Err(TransportError::new(
                "recv",
                src,
                TransportErrorKind::PeerOutOfRange,
            ));
        };
        let packet = loop {
            match inbox.recv_timeout(ABORT_POLL) {
                Ok(packet) => break packet,
                Err(RecvTimeoutError::Timeout) => {
                    if self.aborted.load(Ordering::Acquire) {
                        return Err(TransportError::new("recv", src, TransportErrorKind::Aborted));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(TransportError::new(
                        "recv",
                        src,
                        TransportErrorKind::Disconnected,
                    ));
                }
            }
        };
        if packet.tag != tag {
            return Err(TransportError::new(
                "recv",
                src,
                TransportErrorKind::TagMismatch {
                    expected: tag,
                    actual: packet.tag,
                },
            ));
        }
        if packet.payload.len() != buf.len() {
            return Err(TransportError::new(
                "recv",
                src,
                TransportErrorKind::LengthMismatch {
                    expected: buf.len(),
                    actual: packet.payload.len(),
                },
            ));
        }
        buf.copy_from_slice(&packet.payload);
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted.store(true, Ordering::Release);
    }
}
