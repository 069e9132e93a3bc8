//! # Sparse gene matrix model
//!
//! [`Everything`] is the in-memory aggregate of one spatial transcriptomics
//! experiment: the gene name table, the coordinate to barcode map and one
//! sparse [`Gene`] structure per gene name.
//!
//! The model only supports appending. It is populated once, either by a
//! decoder or from the application's feature lists, and is then read by an
//! encoder, the JSON exporter or the feature adapter.

mod gene;

use std::collections::{BTreeMap, HashMap};

pub use gene::{Gene, HorizontalLine, PositionHit};

use crate::error::{LookupError, ModelError, ReadError, Result};
use crate::types::{hits_to_wire, Coord, GeneId, Hits};

/// The full dataset of an experiment
///
/// `genes[i]` always belongs to `gene_names[i]`, and `gene_id_map` maps every
/// name back to its index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Everything {
    gene_names: Vec<String>,
    gene_id_map: HashMap<String, GeneId>,
    barcode_map: BTreeMap<Coord, String>,
    genes: Vec<Gene>,
}
impl Everything {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles a dataset from decoded parts
    ///
    /// Gene ids are assigned in `gene_names` order.
    pub(crate) fn from_parts(
        gene_names: Vec<String>,
        barcode_map: BTreeMap<Coord, String>,
        genes: Vec<Gene>,
    ) -> Result<Self> {
        if gene_names.len() != genes.len() {
            return Err(ReadError::GeneCountMismatch {
                names: gene_names.len(),
                genes: genes.len(),
            }
            .into());
        }
        let mut gene_id_map = HashMap::with_capacity(gene_names.len());
        for (id, name) in gene_names.iter().enumerate() {
            if gene_id_map.insert(name.clone(), id).is_some() {
                return Err(ReadError::DuplicateGeneName(name.clone()).into());
            }
        }
        Ok(Self {
            gene_names,
            gene_id_map,
            barcode_map,
            genes,
        })
    }

    /// Registers a gene name and returns its id
    ///
    /// Registering a name twice returns the id of the first registration.
    pub fn register_gene(&mut self, name: &str) -> GeneId {
        if let Some(&id) = self.gene_id_map.get(name) {
            return id;
        }
        let id = self.gene_names.len();
        self.gene_names.push(name.to_string());
        self.gene_id_map.insert(name.to_string(), id);
        self.genes.push(Gene::new());
        id
    }

    /// Records the barcode of a spot, replacing and returning any previous one
    pub fn record_barcode<S: Into<String>>(&mut self, coord: Coord, barcode: S) -> Option<String> {
        self.barcode_map.insert(coord, barcode.into())
    }

    /// Appends a hit for `gene_id` at `coord`
    ///
    /// Hits are never merged: recording the same coordinate twice keeps both
    /// entries in order.
    pub fn add_hit(&mut self, gene_id: GeneId, coord: Coord, hits: Hits) -> Result<()> {
        let num_genes = self.genes.len();
        let gene = self
            .genes
            .get_mut(gene_id)
            .ok_or(ModelError::UnknownGene(gene_id, num_genes))?;
        gene.add_hit(coord, hits);
        Ok(())
    }

    #[must_use]
    pub fn gene_names(&self) -> &[String] {
        &self.gene_names
    }

    #[must_use]
    pub fn gene_name(&self, id: GeneId) -> Option<&str> {
        self.gene_names.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn gene_id(&self, name: &str) -> Option<GeneId> {
        self.gene_id_map.get(name).copied()
    }

    #[must_use]
    pub fn gene_id_map(&self) -> &HashMap<String, GeneId> {
        &self.gene_id_map
    }

    #[must_use]
    pub fn gene(&self, id: GeneId) -> Option<&Gene> {
        self.genes.get(id)
    }

    #[must_use]
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    #[must_use]
    pub fn barcode(&self, coord: Coord) -> Option<&str> {
        self.barcode_map.get(&coord).map(String::as_str)
    }

    /// Resolves the barcode of a coordinate referenced by hit data
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::MissingBarcode`] if no barcode is recorded at `coord`.
    pub fn resolve_barcode(&self, coord: Coord) -> Result<&str> {
        self.barcode(coord).ok_or_else(|| {
            LookupError::MissingBarcode {
                x: coord.x,
                y: coord.y,
            }
            .into()
        })
    }

    #[must_use]
    pub fn barcode_map(&self) -> &BTreeMap<Coord, String> {
        &self.barcode_map
    }

    #[must_use]
    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn num_spots(&self) -> usize {
        self.barcode_map.len()
    }

    /// Number of position hits over all genes
    #[must_use]
    pub fn num_hits(&self) -> usize {
        self.genes.iter().map(Gene::num_hits).sum()
    }

    /// Sum of all hit counts over all genes
    #[must_use]
    pub fn total_reads(&self) -> u128 {
        self.genes.iter().map(Gene::total_reads).sum()
    }

    /// Iterates over every hit as `(gene id, coordinate, hits)`
    ///
    /// The order is by gene, then by line, then by position within the line.
    /// This is the traversal order of every encoder and exporter.
    pub fn iter_hits(&self) -> impl Iterator<Item = (GeneId, Coord, Hits)> + '_ {
        self.genes.iter().enumerate().flat_map(|(id, gene)| {
            gene.iter_hits().map(move |(coord, hits)| (id, coord, hits))
        })
    }

    /// Checks that the dataset can be encoded
    ///
    /// Every position must fit the wire width, every hit must reference a
    /// recorded barcode and fit the wire widths. The first violation is
    /// returned.
    pub fn validate(&self) -> Result<()> {
        for coord in self.barcode_map.keys() {
            coord.to_wire()?;
        }
        for (_, coord, hits) in self.iter_hits() {
            self.resolve_barcode(coord)?;
            coord.to_wire()?;
            hits_to_wire(coord, hits)?;
        }
        Ok(())
    }

    /// Checks only that every hit references a recorded barcode
    pub fn validate_barcodes(&self) -> Result<()> {
        self.iter_hits()
            .try_for_each(|(_, coord, _)| self.resolve_barcode(coord).map(|_| ()))
    }
}
