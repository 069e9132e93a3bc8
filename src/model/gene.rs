use std::collections::HashMap;

use crate::types::{Coord, Hits};

/// One sparse entry: an x-coordinate and its hit count within an implied row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionHit {
    pub x: u32,
    pub hits: Hits,
}
impl PositionHit {
    #[must_use]
    pub const fn new(x: u32, hits: Hits) -> Self {
        Self { x, hits }
    }
}

/// The hits of a single gene on a single row
///
/// Position hits keep their insertion order. They are not sorted by x and the
/// same x may occur more than once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HorizontalLine {
    y: u32,
    position_hits: Vec<PositionHit>,
}
impl HorizontalLine {
    #[must_use]
    pub fn new(y: u32) -> Self {
        Self {
            y,
            position_hits: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_hits(y: u32, position_hits: Vec<PositionHit>) -> Self {
        Self { y, position_hits }
    }

    /// Row of this line
    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    #[must_use]
    pub fn position_hits(&self) -> &[PositionHit] {
        &self.position_hits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.position_hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position_hits.is_empty()
    }

    pub fn push(&mut self, hit: PositionHit) {
        self.position_hits.push(hit);
    }

    /// Iterates over the `(coordinate, hits)` pairs of the line
    pub fn iter_coords(&self) -> impl Iterator<Item = (Coord, Hits)> + '_ {
        self.position_hits
            .iter()
            .map(|ph| (Coord::new(ph.x, self.y), ph.hits))
    }
}

/// Sparse hit structure of one gene
///
/// Only rows with at least one hit have a line. Lines are kept in the order
/// in which their rows were first seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gene {
    horizontal_lines: Vec<HorizontalLine>,

    /// Row to index into `horizontal_lines`
    rows: HashMap<u32, usize>,
}
impl Gene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_lines(horizontal_lines: Vec<HorizontalLine>) -> Self {
        // a repeated row resolves to its last line
        let rows = horizontal_lines
            .iter()
            .enumerate()
            .map(|(idx, line)| (line.y, idx))
            .collect();
        Self {
            horizontal_lines,
            rows,
        }
    }

    #[must_use]
    pub fn horizontal_lines(&self) -> &[HorizontalLine] {
        &self.horizontal_lines
    }

    /// Returns the line of row `y`, if the gene has one
    #[must_use]
    pub fn line(&self, y: u32) -> Option<&HorizontalLine> {
        self.rows
            .get(&y)
            .and_then(|&idx| self.horizontal_lines.get(idx))
    }

    /// Appends a hit to the line of `coord.y`, creating the line if needed
    pub fn add_hit(&mut self, coord: Coord, hits: Hits) {
        let hit = PositionHit::new(coord.x, hits);
        match self.rows.get(&coord.y) {
            Some(&idx) => self.horizontal_lines[idx].push(hit),
            None => {
                self.rows.insert(coord.y, self.horizontal_lines.len());
                self.horizontal_lines
                    .push(HorizontalLine::from_hits(coord.y, vec![hit]));
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.horizontal_lines.iter().all(HorizontalLine::is_empty)
    }

    /// Number of position hits over all lines
    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.horizontal_lines.iter().map(HorizontalLine::len).sum()
    }

    /// Sum of all hit counts
    #[must_use]
    pub fn total_reads(&self) -> u128 {
        self.iter_hits().map(|(_, hits)| u128::from(hits)).sum()
    }

    /// Iterates over `(coordinate, hits)` in line order, then position order
    pub fn iter_hits(&self) -> impl Iterator<Item = (Coord, Hits)> + '_ {
        self.horizontal_lines
            .iter()
            .flat_map(HorizontalLine::iter_coords)
    }
}
