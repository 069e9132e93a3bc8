//! Conversion between [`Everything`] and the flat feature lists used by the
//! viewer application.
//!
//! Every feature holds a shared handle to its gene's display object, so
//! recoloring or selecting a gene is visible through all of its features.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::model::Everything;
use crate::types::{Coord, Hits};

/// An RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}
impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}
impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Color given to newly created gene display objects
pub const DEFAULT_GENE_COLOR: Rgb = Rgb::new(255, 65, 65);

/// Prefix of gene names that could not be assigned unambiguously
pub const AMBIGUOUS_PREFIX: &str = "ambiguous";

/// Display state of one gene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneDisplay {
    pub name: String,
    pub selected: bool,
    pub color: Rgb,
}
impl GeneDisplay {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            selected: false,
            color: DEFAULT_GENE_COLOR,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.name.starts_with(AMBIGUOUS_PREFIX)
    }
}

/// One hit as seen by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub barcode: String,
    pub gene: String,
    pub x: u32,
    pub y: u32,
    pub hits: Hits,
    /// Display object shared by all features of the same gene
    pub gene_ref: Arc<GeneDisplay>,
}
impl Feature {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Gene display objects and features of a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureList {
    genes: Vec<Arc<GeneDisplay>>,
    features: Vec<Feature>,
}
impl FeatureList {
    /// Flattens a dataset into features
    ///
    /// One display object is created per gene name, in gene id order, before
    /// any feature. Features follow the traversal order of the dataset. Fails
    /// on the first hit whose coordinate has no barcode.
    #[instrument(level = "debug", skip_all, fields(genes = everything.num_genes()))]
    pub fn from_everything(everything: &Everything) -> Result<Self> {
        let genes: Vec<_> = everything
            .gene_names()
            .iter()
            .map(|name| Arc::new(GeneDisplay::new(name.as_str())))
            .collect();

        let mut features = Vec::with_capacity(everything.num_hits());
        for (gene_id, coord, hits) in everything.iter_hits() {
            let barcode = everything.resolve_barcode(coord)?;
            let gene_ref = Arc::clone(&genes[gene_id]);
            features.push(Feature {
                barcode: barcode.to_string(),
                gene: gene_ref.name.clone(),
                x: coord.x,
                y: coord.y,
                hits,
                gene_ref,
            });
        }
        debug!(features = features.len(), "built feature list");
        Ok(Self { genes, features })
    }

    pub fn genes(&self) -> &[Arc<GeneDisplay>] {
        &self.genes
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Summed hits per gene name
    pub fn gene_totals(&self) -> HashMap<&str, u128> {
        let mut totals: HashMap<&str, u128> = self
            .genes
            .iter()
            .map(|gene| (gene.name.as_str(), 0))
            .collect();
        for feature in &self.features {
            *totals.entry(feature.gene.as_str()).or_default() += u128::from(feature.hits);
        }
        totals
    }

    /// Summed hits per spot over all genes
    pub fn spot_totals(&self) -> BTreeMap<Coord, u128> {
        let mut totals = BTreeMap::new();
        for feature in &self.features {
            *totals.entry(feature.coord()).or_default() += u128::from(feature.hits);
        }
        totals
    }

    /// Distinct spots referenced by any feature
    pub fn unique_spots(&self) -> BTreeSet<Coord> {
        self.features.iter().map(Feature::coord).collect()
    }

    pub fn features_for_gene<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features.iter().filter(move |feature| feature.gene == name)
    }

    /// Rebuilds a dataset from the feature list
    ///
    /// Genes are registered in display object order, then features are
    /// replayed in order. A later feature never overrides the barcode of an
    /// already recorded coordinate.
    pub fn to_everything(&self) -> Result<Everything> {
        let mut everything = Everything::new();
        for gene in &self.genes {
            everything.register_gene(&gene.name);
        }
        for feature in &self.features {
            let coord = feature.coord();
            if everything.barcode(coord).is_none() {
                everything.record_barcode(coord, feature.barcode.as_str());
            }
            let gene_id = everything.register_gene(&feature.gene);
            everything.add_hit(gene_id, coord, feature.hits)?;
        }
        Ok(everything)
    }
}
