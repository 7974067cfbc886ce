//! Cell states.
//!
//! The sweep writes the next generation into the same array it reads, so two
//! transient states remember what a cell used to be: `Dying` still counts as
//! alive for neighbors, `Newborn` still counts as dead. Settling collapses
//! them back to `Dead`/`Alive`.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Dead = 0,
    Alive = 1,
    Dying = 2,
    Newborn = 3,
}

// A cell travels on the wire as exactly one byte.
const _: () = assert!(std::mem::size_of::<Cell>() == 1);

impl Cell {
    pub const DEAD: u8 = Cell::Dead as u8;
    pub const ALIVE: u8 = Cell::Alive as u8;
    pub const DYING: u8 = Cell::Dying as u8;
    pub const NEWBORN: u8 = Cell::Newborn as u8;

    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_byte(byte: u8) -> Option<Cell> {
        match byte {
            Self::DEAD => Some(Cell::Dead),
            Self::ALIVE => Some(Cell::Alive),
            Self::DYING => Some(Cell::Dying),
            Self::NEWBORN => Some(Cell::Newborn),
            _ => None,
        }
    }

    /// Alive as seen by neighbors during a sweep.
    #[inline(always)]
    pub const fn counts_alive(byte: u8) -> bool {
        byte == Self::ALIVE || byte == Self::DYING
    }

    #[inline(always)]
    pub const fn settle(byte: u8) -> u8 {
        match byte {
            Self::DYING => Self::DEAD,
            Self::NEWBORN => Self::ALIVE,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cell;

    #[test]
    fn transient_states_settle() {
        assert_eq!(Cell::settle(Cell::DYING), Cell::DEAD);
        assert_eq!(Cell::settle(Cell::NEWBORN), Cell::ALIVE);
        assert_eq!(Cell::settle(Cell::ALIVE), Cell::ALIVE);
        assert_eq!(Cell::settle(Cell::DEAD), Cell::DEAD);
    }

    #[test]
    fn dying_still_counts_as_alive() {
        assert!(Cell::counts_alive(Cell::DYING));
        assert!(!Cell::counts_alive(Cell::NEWBORN));
        assert_eq!(Cell::from_byte(7), None);
    }
}
