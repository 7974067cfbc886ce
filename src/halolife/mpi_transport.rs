//! `Transport` over an MPI world communicator.

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Rank;

use super::error::{TransportError, TransportErrorKind};
use super::transport::{Tag, Transport};

/// Exit code handed to `MPI_Abort` when a worker fails.
const ABORT_CODE: i32 = 1;

pub struct MpiTransport {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

// SAFETY: the world communicator is a plain handle. The universe is
// initialized with at least `Threading::Serialized`, and every call through
// this transport happens on whichever single thread currently owns it (a
// hybrid domain only touches it from its representative, under a lock).
unsafe impl Send for MpiTransport {}

impl MpiTransport {
    pub fn new(world: SimpleCommunicator) -> Self {
        let rank = usize::try_from(world.rank()).unwrap_or(0);
        let size = usize::try_from(world.size()).unwrap_or(1);
        Self { world, rank, size }
    }

    #[track_caller]
    fn peer(&self, op: &'static str, peer: usize) -> Result<Rank, TransportError> {
        match Rank::try_from(peer) {
            Ok(rank) if peer < self.size && peer != self.rank => Ok(rank),
            _ => Err(TransportError::new(
                op,
                peer,
                TransportErrorKind::PeerOutOfRange,
            )),
        }
    }
}

impl Transport for MpiTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    #[track_caller]
    fn send(&mut self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransportError> {
        let rank = self.peer("send", dest)?;
        self.world.process_at_rank(rank).send_with_tag(buf, tag);
        Ok(())
    }

    #[track_caller]
    fn recv(&mut self, src: usize, tag: Tag, buf: &mut [u8]) -> Result<(), TransportError> {
        let rank = self.peer("recv", src)?;
        let status = self
            .world
            .process_at_rank(rank)
            .receive_into_with_tag(buf, tag);
        let received = status.count(u8::equivalent_datatype());
        if usize::try_from(received).ok() != Some(buf.len()) {
            return Err(TransportError::new(
                "recv",
                src,
                TransportErrorKind::LengthMismatch {
                    expected: buf.len(),
                    actual: usize::try_from(received).unwrap_or(0),
                },
            ));
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.world.abort(ABORT_CODE)
    }
}
