//! Coordinate and identifier types
//!
//! In memory, coordinates and hit counts are held wider than their wire
//! representation so that values which do not fit the binary format can be
//! represented and rejected at encode time instead of being truncated.

use std::fmt;

use crate::error::{Result, WriteError};

/// Dense zero-based gene identifier, assigned in registration order
pub type GeneId = usize;

/// Number of transcript reads observed for a gene at a coordinate
pub type Hits = u64;

/// Bit width of a coordinate component on the wire
pub const COORD_BITS: u32 = u16::BITS;

/// Bit width of a hit count on the wire
pub const HITS_BITS: u32 = u32::BITS;

/// Largest coordinate component that can be encoded
pub const MAX_COORD: u32 = u16::MAX as u32;

/// Largest hit count that can be encoded
pub const MAX_HITS: Hits = u32::MAX as Hits;

/// A spot position on the tissue grid
///
/// Coordinates order lexicographically by `(x, y)`, which is the order in
/// which positions are written to the binary format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}
impl Coord {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Returns true if both components fit the 16-bit wire width
    #[must_use]
    pub fn fits_wire(&self) -> bool {
        self.x <= MAX_COORD && self.y <= MAX_COORD
    }

    /// Narrows the coordinate to its wire representation
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::CoordOverflow`] if either component exceeds [`MAX_COORD`].
    pub fn to_wire(self) -> Result<(u16, u16)> {
        match (u16::try_from(self.x), u16::try_from(self.y)) {
            (Ok(x), Ok(y)) => Ok((x, y)),
            _ => Err(WriteError::CoordOverflow {
                x: self.x,
                y: self.y,
                bits: COORD_BITS,
            }
            .into()),
        }
    }
}
impl From<(u32, u32)> for Coord {
    fn from((x, y): (u32, u32)) -> Self {
        Self::new(x, y)
    }
}
impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Narrows a hit count observed at `coord` to its wire representation
///
/// # Errors
///
/// Returns [`WriteError::HitsOverflow`] if `hits` exceeds [`MAX_HITS`].
pub fn hits_to_wire(coord: Coord, hits: Hits) -> Result<u32> {
    u32::try_from(hits).map_err(|_| {
        WriteError::HitsOverflow {
            x: coord.x,
            y: coord.y,
            hits,
            bits: HITS_BITS,
        }
        .into()
    })
}
