//! Three-phase halo exchange on a ring of workers.
//!
//! With blocking sends, two neighbors that both send first deadlock. The
//! exchange is therefore split so that in every active pair one side sends
//! while the other receives:
//!
//! ```text
//! phase 1:  0 <-> 1    2 <-> 3    4 <-> 5  ...   (even rank talks right)
//! phase 2:       1 <-> 2    3 <-> 4    ...       (odd rank talks right)
//! phase 3:  0 <-----------------------> N-1      (closes the ring)
//! ```
//!
//! A single worker is its own neighbor: phase 3 copies its near columns into
//! the opposite ghost columns. Every slot is gated by the credit scheduler;
//! a slot with outstanding credit is skipped on both ends.

use tracing::{debug, error};

use super::credit::CreditState;
use super::error::TransportError;
use super::halo::{HaloMessage, Side};
use super::skip_codec::{decode_margin, encode_margin};
use super::transport::{Transport, TAG_EDGE};

/// Communication volume of one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub rounds: u64,
    pub transfers: u64,
    pub skipped: u64,
}

impl ExchangeStats {
    pub fn merge(&mut self, other: &ExchangeStats) {
        self.rounds += other.rounds;
        self.transfers += other.transfers;
        self.skipped += other.skipped;
    }
}

/// Which ghost columns were refreshed this round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Refreshed {
    pub left: bool,
    pub right: bool,
}

#[track_caller]
fn send_slot<T: Transport + ?Sized>(
    transport: &mut T,
    due: bool,
    dest: usize,
    column: &[u8],
    stats: &mut ExchangeStats,
) -> Result<(), TransportError> {
    if !due {
        stats.skipped += 1;
        return Ok(());
    }
    transport.send(dest, TAG_EDGE, column)?;
    stats.transfers += 1;
    Ok(())
}

#[track_caller]
fn recv_slot<T: Transport + ?Sized>(
    transport: &mut T,
    due: bool,
    src: usize,
    column: &mut [u8],
    stats: &mut ExchangeStats,
) -> Result<bool, TransportError> {
    if !due {
        stats.skipped += 1;
        return Ok(false);
    }
    transport.recv(src, TAG_EDGE, column)?;
    stats.transfers += 1;
    Ok(true)
}

fn first_phase<T: Transport + ?Sized>(
    msg: &mut HaloMessage<'_>,
    credits: &CreditState,
    transport: &mut T,
    stats: &mut ExchangeStats,
    refreshed: &mut Refreshed,
) -> Result<(), TransportError> {
    let rank = transport.rank();
    let size = transport.size();
    if rank % 2 == 0 && rank + 1 != size {
        send_slot(transport, credits.send_due(Side::Right), rank + 1, msg.right_near, stats)?;
        refreshed.right |=
            recv_slot(transport, credits.recv_due(Side::Right), rank + 1, msg.right_far, stats)?;
    } else if rank % 2 == 1 {
        refreshed.left |=
            recv_slot(transport, credits.recv_due(Side::Left), rank - 1, msg.left_far, stats)?;
        send_slot(transport, credits.send_due(Side::Left), rank - 1, msg.left_near, stats)?;
    }
    Ok(())
}

fn second_phase<T: Transport + ?Sized>(
    msg: &mut HaloMessage<'_>,
    credits: &CreditState,
    transport: &mut T,
    stats: &mut ExchangeStats,
    refreshed: &mut Refreshed,
) -> Result<(), TransportError> {
    let rank = transport.rank();
    let size = transport.size();
    if rank % 2 == 0 && rank != 0 {
        send_slot(transport, credits.send_due(Side::Left), rank - 1, msg.left_near, stats)?;
        refreshed.left |=
            recv_slot(transport, credits.recv_due(Side::Left), rank - 1, msg.left_far, stats)?;
    } else if rank % 2 == 1 && rank + 1 != size {
        refreshed.right |=
            recv_slot(transport, credits.recv_due(Side::Right), rank + 1, msg.right_far, stats)?;
        send_slot(transport, credits.send_due(Side::Right), rank + 1, msg.right_near, stats)?;
    }
    Ok(())
}

fn third_phase<T: Transport + ?Sized>(
    msg: &mut HaloMessage<'_>,
    credits: &CreditState,
    transport: &mut T,
    stats: &mut ExchangeStats,
    refreshed: &mut Refreshed,
) -> Result<(), TransportError> {
    let rank = transport.rank();
    let size = transport.size();
    if size == 1 {
        wrap_in_place(msg);
        refreshed.left = true;
        refreshed.right = true;
        return Ok(());
    }
    if rank == 0 {
        send_slot(transport, credits.send_due(Side::Left), size - 1, msg.left_near, stats)?;
        refreshed.left |=
            recv_slot(transport, credits.recv_due(Side::Left), size - 1, msg.left_far, stats)?;
    } else if rank + 1 == size {
        refreshed.right |=
            recv_slot(transport, credits.recv_due(Side::Right), 0, msg.right_far, stats)?;
        send_slot(transport, credits.send_due(Side::Right), 0, msg.right_near, stats)?;
    }
    Ok(())
}

/// A worker that is its own left and right neighbor.
pub fn wrap_in_place(msg: &mut HaloMessage<'_>) {
    msg.left_far.copy_from_slice(msg.right_near);
    msg.right_far.copy_from_slice(msg.left_near);
}

/// Run the three phases. Columns are moved as they are; margin encoding is
/// the caller's business.
pub fn ring_exchange<T: Transport + ?Sized>(
    msg: &mut HaloMessage<'_>,
    credits: &CreditState,
    transport: &mut T,
    stats: &mut ExchangeStats,
) -> Result<Refreshed, TransportError> {
    let mut refreshed = Refreshed::default();
    first_phase(msg, credits, transport, stats, &mut refreshed)?;
    second_phase(msg, credits, transport, stats, &mut refreshed)?;
    third_phase(msg, credits, transport, stats, &mut refreshed)?;
    Ok(refreshed)
}

/// One worker's (or one memory domain's) end of the ring: transport plus
/// the credit state that persists across generations.
pub struct RingLink<T> {
    transport: T,
    credits: CreditState,
    stats: ExchangeStats,
    skip_enabled: bool,
}

impl<T: Transport> RingLink<T> {
    pub fn new(transport: T, skip_enabled: bool) -> Self {
        Self {
            transport,
            credits: CreditState::default(),
            stats: ExchangeStats::default(),
            skip_enabled,
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.transport.size()
    }

    pub fn credits(&self) -> &CreditState {
        &self.credits
    }

    pub fn stats(&self) -> &ExchangeStats {
        &self.stats
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Full exchange step: piggyback margins on the near columns, run the
    /// phases, restore the columns and fold what arrived into the credits.
    ///
    /// Any transport error is fatal; peers are told to abort before the
    /// error is returned.
    pub fn exchange(&mut self, msg: &mut HaloMessage<'_>) -> Result<(), TransportError> {
        let sent = msg.margins;
        encode_margin(sent.skip_left, msg.left_near);
        encode_margin(sent.skip_right, msg.right_near);

        let outcome = ring_exchange(msg, &self.credits, &mut self.transport, &mut self.stats);

        decode_margin(msg.left_near);
        decode_margin(msg.right_near);
        let refreshed = match outcome {
            Ok(refreshed) => refreshed,
            Err(err) => {
                if !err.is_secondary() {
                    error!(rank = self.transport.rank(), %err, "halo exchange failed");
                }
                self.transport.abort();
                return Err(err);
            }
        };

        let received = [
            refreshed.left.then(|| decode_margin(msg.left_far)),
            refreshed.right.then(|| decode_margin(msg.right_far)),
        ];
        self.stats.rounds += 1;
        if self.skip_enabled {
            self.credits.update(sent, received);
        }
        debug!(
            rank = self.transport.rank(),
            skip_left = sent.skip_left,
            skip_right = sent.skip_right,
            ?received,
            credits = ?self.credits,
            "halo exchange"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halolife::cell::Cell;
    use crate::halolife::evaluate::Margins;
    use crate::halolife::grid::Grid;
    use crate::halolife::transport::ChannelTransport;
    use std::thread;

    fn striped(width: usize, height: usize) -> Grid {
        // Column x holds the pattern `row % (x + 2) == 0`, distinct per column.
        let mut grid = Grid::new(width, height);
        for x in 1..width - 1 {
            for y in 0..height {
                if y % (x + 2) == 0 {
                    grid.set(x, y, Cell::Alive);
                }
            }
        }
        grid
    }

    #[test]
    fn single_worker_wraps_onto_itself() {
        let mut grid = striped(6, 7);
        let left_near = grid.view().column(1).to_vec();
        let right_near = grid.view().column(4).to_vec();

        let transport = ChannelTransport::mesh(1).pop().unwrap();
        let mut link = RingLink::new(transport, true);
        let mut view = grid.view_mut();
        let mut msg = HaloMessage::from_grid(&mut view, Margins::new(0, 0));
        link.exchange(&mut msg).unwrap();

        assert_eq!(grid.view().column(0), &right_near[..]);
        assert_eq!(grid.view().column(5), &left_near[..]);
        assert_eq!(grid.view().column(1), &left_near[..]);
        assert_eq!(grid.view().column(4), &right_near[..]);
        assert_eq!(link.stats().transfers, 0);
    }

    #[test]
    fn self_wrap_carries_own_margins() {
        let mut grid = striped(6, 7);
        let transport = ChannelTransport::mesh(1).pop().unwrap();
        let mut link = RingLink::new(transport, true);
        let mut view = grid.view_mut();
        let mut msg = HaloMessage::from_grid(&mut view, Margins::new(3, 5));
        link.exchange(&mut msg).unwrap();
        // recv_left heard our own right margin (5), send_left our left (3).
        assert_eq!(
            *link.credits(),
            CreditState {
                recv_left: 4,
                send_left: 2,
                recv_right: 2,
                send_right: 4,
            }
        );
    }

    fn run_pair(credits: [CreditState; 2]) -> (Vec<Grid>, Vec<ExchangeStats>) {
        let mesh = ChannelTransport::mesh(2);
        let handles: Vec<_> = mesh
            .into_iter()
            .zip(credits)
            .map(|(mut transport, credits)| {
                thread::spawn(move || {
                    let rank = transport.rank();
                    let mut grid = striped(5 + rank, 6);
                    let mut stats = ExchangeStats::default();
                    let mut view = grid.view_mut();
                    let mut msg = HaloMessage::from_grid(&mut view, Margins::default());
                    ring_exchange(&mut msg, &credits, &mut transport, &mut stats).unwrap();
                    (grid, stats)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).unzip()
    }

    #[test]
    fn two_workers_swap_both_sides() {
        let (grids, stats) = run_pair([CreditState::default(); 2]);
        let (a, b) = (&grids[0], &grids[1]);
        let a_w = a.width();
        let b_w = b.width();
        assert_eq!(a.view().column(a_w - 1), b.view().column(1));
        assert_eq!(a.view().column(0), b.view().column(b_w - 2));
        assert_eq!(b.view().column(0), a.view().column(a_w - 2));
        assert_eq!(b.view().column(b_w - 1), a.view().column(1));
        assert_eq!(stats[0].transfers, 4);
        assert_eq!(stats[1].transfers, 4);
    }

    #[test]
    fn credited_slots_are_skipped_on_both_ends() {
        let quiet_right = CreditState {
            recv_right: 2,
            send_right: 2,
            ..CreditState::default()
        };
        let quiet_left = CreditState {
            recv_left: 2,
            send_left: 2,
            ..CreditState::default()
        };
        let (grids, stats) = run_pair([quiet_right, quiet_left]);
        let (a, b) = (&grids[0], &grids[1]);
        // Phase 1 link skipped: ghosts keep their old (dead) content.
        assert!(a.view().column(a.width() - 1).iter().all(|&c| c == Cell::DEAD));
        assert!(b.view().column(0).iter().all(|&c| c == Cell::DEAD));
        // Phase 3 link still ran.
        assert_eq!(a.view().column(0), b.view().column(b.width() - 2));
        assert_eq!(stats[0].skipped, 2);
        assert_eq!(stats[1].skipped, 2);
    }
}
