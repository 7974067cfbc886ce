//! Skip-margin piggybacking on boundary columns.
//!
//! Wire layout of a transmitted column (one byte per row):
//!
//! ```text
//! row:    0    1    2    3    4         5 ..
//!       +----+----+----+----+---------+------
//!       | m0 | m1 | m2 | m3 | parity  | cells
//!       +----+----+----+----+---------+------
//! ```
//!
//! `m0..m3` are the little-endian bytes of the margin. The four cells they
//! displace are folded into row 4: bit 0 keeps row 4's own cell, bit `q + 1`
//! keeps row `q`. Decoding restores all five rows exactly, provided they held
//! settled states (0 or 1) before encoding.

use super::cell::Cell;

pub const MARGIN_BYTES: usize = 4;
pub const PARITY_ROW: usize = MARGIN_BYTES;
/// Shortest column able to carry a margin.
pub const MIN_COLUMN_LEN: usize = PARITY_ROW + 1;

const _: () = assert!(std::mem::size_of::<u32>() == MARGIN_BYTES);
const _: () = assert!(std::mem::size_of::<Cell>() == 1);

/// Write `margin` into the first rows of `column`, stashing the displaced
/// cells in the parity row.
pub fn encode_margin(margin: usize, column: &mut [u8]) {
    assert!(
        column.len() >= MIN_COLUMN_LEN,
        "column of {} rows cannot carry a margin",
        column.len()
    );
    let margin = u32::try_from(margin).unwrap_or(u32::MAX);
    for (q, byte) in margin.to_le_bytes().into_iter().enumerate() {
        column[PARITY_ROW] = column[PARITY_ROW].wrapping_add(column[q] << (q + 1));
        column[q] = byte;
    }
}

/// Extract the margin from `column` and put the original cells back.
pub fn decode_margin(column: &mut [u8]) -> usize {
    assert!(
        column.len() >= MIN_COLUMN_LEN,
        "column of {} rows cannot carry a margin",
        column.len()
    );
    let mut bytes = [0u8; MARGIN_BYTES];
    for (q, byte) in bytes.iter_mut().enumerate() {
        *byte = column[q];
        column[q] = (column[PARITY_ROW] >> (q + 1)) & 1;
    }
    column[PARITY_ROW] &= 1;
    u32::from_le_bytes(bytes) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wire_layout_is_little_endian_with_parity() {
        let mut column = [1, 0, 1, 1, 1, 0, 1];
        encode_margin(0x0102_0304, &mut column);
        assert_eq!(column, [0x04, 0x03, 0x02, 0x01, 1 + 2 + 8 + 16, 0, 1]);
        assert_eq!(decode_margin(&mut column), 0x0102_0304);
        assert_eq!(column, [1, 0, 1, 1, 1, 0, 1]);
    }

    #[test]
    fn rows_past_parity_are_untouched() {
        let mut column = vec![Cell::DEAD; 20];
        column[5] = Cell::ALIVE;
        column[19] = Cell::ALIVE;
        encode_margin(17, &mut column);
        assert_eq!(column[5], Cell::ALIVE);
        assert_eq!(column[19], Cell::ALIVE);
        assert_eq!(decode_margin(&mut column), 17);
    }

    #[test]
    #[should_panic(expected = "cannot carry a margin")]
    fn short_column_is_rejected() {
        let mut column = [0u8; 4];
        encode_margin(1, &mut column);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            margin in 0usize..=u32::MAX as usize,
            cells in proptest::collection::vec(0u8..=1, MIN_COLUMN_LEN..64),
        ) {
            let mut column = cells.clone();
            encode_margin(margin, &mut column);
            prop_assert_eq!(decode_margin(&mut column), margin);
            prop_assert_eq!(column, cells);
        }
    }
}
