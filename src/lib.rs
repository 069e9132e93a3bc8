//! # stgene
//!
//! Storage of spatial transcriptomics hit data: a sparse gene-by-position
//! count matrix ([`Everything`]) together with codecs for a compact binary
//! format ([`gbin`]) and a flat JSON export ([`json`]).

pub mod adapter;
pub mod codec;
mod error;
pub mod gbin;
pub mod json;
mod model;
pub mod synthetic;
mod types;
mod utils;

pub use adapter::{Feature, FeatureList, GeneDisplay, Rgb, DEFAULT_GENE_COLOR};
pub use codec::{
    read_path, spawn_decode, write_path, BinaryCodec, FeatureCodec, Format, JsonCodec,
    PendingDecode,
};
pub use error::{
    Error, FormatError, HeaderError, LookupError, ModelError, ReadError, Result, WriteError,
};
pub use model::{Everything, Gene, HorizontalLine, PositionHit};
pub use types::{Coord, GeneId, Hits, COORD_BITS, HITS_BITS, MAX_COORD, MAX_HITS};
