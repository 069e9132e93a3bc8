//! Seeded random datasets for benchmarks and tests

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::model::Everything;
use crate::types::Coord;

/// Default seed for synthetic datasets
pub const RNG_SEED: u64 = 42;

/// Width and height of the synthetic tissue grid
pub const GRID_SIDE: u32 = 1000;

/// Largest hit count drawn for a single position
const MAX_DRAWN_HITS: u64 = 50;

/// Generates a reproducible dataset
///
/// `num_spots` distinct positions are drawn on the grid and given barcodes.
/// Each gene then receives hits on a random subset of those positions. The
/// same arguments always produce the same dataset.
pub fn synthetic(num_genes: usize, num_spots: usize, seed: u64) -> Result<Everything> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut everything = Everything::new();

    let capacity = (GRID_SIDE as usize) * (GRID_SIDE as usize);
    let num_spots = num_spots.min(capacity);
    let mut spots = Vec::with_capacity(num_spots);
    while spots.len() < num_spots {
        let coord = Coord::new(
            rng.random_range(0..GRID_SIDE),
            rng.random_range(0..GRID_SIDE),
        );
        if everything.barcode(coord).is_none() {
            everything.record_barcode(coord, barcode_for(spots.len()));
            spots.push(coord);
        }
    }

    for gene in 0..num_genes {
        let gene_id = everything.register_gene(&format!("GENE{gene}"));
        if spots.is_empty() {
            continue;
        }
        let amount = rng.random_range(1..=spots.len());
        for idx in rand::seq::index::sample(&mut rng, spots.len(), amount) {
            let hits = rng.random_range(1..=MAX_DRAWN_HITS);
            everything.add_hit(gene_id, spots[idx], hits)?;
        }
    }
    Ok(everything)
}

/// Barcode of the `idx`-th synthetic spot
fn barcode_for(idx: usize) -> String {
    const BASES: [u8; 4] = *b"ACGT";
    let mut barcode = Vec::with_capacity(16);
    let mut rest = idx;
    for _ in 0..16 {
        barcode.push(BASES[rest % 4]);
        rest /= 4;
    }
    barcode.into_iter().map(char::from).collect()
}
