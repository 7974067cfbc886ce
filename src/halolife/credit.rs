//! Credit scheduling for halo transfers.
//!
//! A margin of `k` dead columns means no activity can reach the shared
//! boundary for `k - 1` more generations, so that many exchanges can be
//! skipped. Each of the four transfer slots (recv/send on either side)
//! counts down its own credit; a slot transfers only in rounds where its
//! credit is zero.
//!
//! Both ends of a link derive the same numbers: my `send_right` comes from
//! my right margin and my neighbor's `recv_left` from the very same margin,
//! which it just received. Coupling recv and send on a side (either one at
//! zero zeroes the other) keeps the two ends agreeing on every round.

use super::evaluate::Margins;
use super::halo::Side;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreditState {
    pub recv_left: u32,
    pub send_left: u32,
    pub recv_right: u32,
    pub send_right: u32,
}

impl CreditState {
    #[inline]
    pub fn recv_due(&self, side: Side) -> bool {
        match side {
            Side::Left => self.recv_left == 0,
            Side::Right => self.recv_right == 0,
        }
    }

    #[inline]
    pub fn send_due(&self, side: Side) -> bool {
        match side {
            Side::Left => self.send_left == 0,
            Side::Right => self.send_right == 0,
        }
    }

    /// Apply one round's outcome.
    ///
    /// `sent` holds this worker's own margins; `received` holds the
    /// neighbors' margins decoded from columns that actually arrived this
    /// round (`[left, right]`).
    pub fn update(&mut self, sent: Margins, received: [Option<usize>; 2]) {
        advance(&mut self.recv_left, received[0]);
        advance(&mut self.send_left, Some(sent.skip_left));
        advance(&mut self.recv_right, received[1]);
        advance(&mut self.send_right, Some(sent.skip_right));
        self.couple();
    }

    fn couple(&mut self) {
        if self.recv_left == 0 || self.send_left == 0 {
            self.recv_left = 0;
            self.send_left = 0;
        }
        if self.recv_right == 0 || self.send_right == 0 {
            self.recv_right = 0;
            self.send_right = 0;
        }
    }

    /// `recv == 0 <=> send == 0` on both sides.
    pub fn is_coupled(&self) -> bool {
        (self.recv_left == 0) == (self.send_left == 0)
            && (self.recv_right == 0) == (self.send_right == 0)
    }
}

#[inline]
fn advance(credit: &mut u32, margin: Option<usize>) {
    if *credit == 0 {
        let fresh = margin.unwrap_or(0).saturating_sub(1);
        *credit = u32::try_from(fresh).unwrap_or(u32::MAX);
    } else {
        *credit -= 1;
    }
}
