//! # Binary gene format
//!
//! A compact binary representation of an [`Everything`](crate::Everything):
//! a fixed 32-byte header followed by one body that holds the gene names, the
//! spot positions with their barcodes and one record per gene.
//!
//! ## File Structure
//!
//! ```text
//! ┌──────────────────────┐
//! │     File Header      │ 32 bytes
//! ├──────────────────────┤
//! │  Gene Names          │ u32 count, (u32 len, utf8)*
//! ├──────────────────────┤
//! │  Positions           │ u32 count, (u16 x, u16 y, u32 len, utf8)*
//! ├──────────────────────┤
//! │  Gene Offset Table   │ u32 count, u64 offset*
//! ├──────────────────────┤
//! │                      │
//! │  Gene Records        │ Variable size
//! │                      │
//! └──────────────────────┘
//! ```
//!
//! Everything after the header is optionally a single zstd frame.
//!
//! ## Gene Records
//!
//! A gene record is a list of lines. Each line carries its row explicitly,
//! followed by two parallel arrays of equal length:
//!
//! * row `y` (u16)
//! * x-coordinates (u32 count, u16 each)
//! * hit counts (u32 count, u32 each)
//!
//! Rows without hits are simply absent. The offset table makes any gene
//! reachable without decoding the genes before it.
//!
//! ## Usage Example
//!
//! ```
//! use stgene::gbin::{self, GeneWriterBuilder};
//! use stgene::{Coord, Everything};
//!
//! let mut everything = Everything::new();
//! let actb = everything.register_gene("Actb");
//! everything.register_gene("Gapdh");
//! everything.record_barcode(Coord::new(0, 0), "BC1");
//! everything.record_barcode(Coord::new(1, 0), "BC2");
//! everything.add_hit(actb, Coord::new(0, 0), 12).unwrap();
//! everything.add_hit(actb, Coord::new(1, 0), 7).unwrap();
//!
//! let bytes = GeneWriterBuilder::default().encode(&everything).unwrap();
//! assert_eq!(gbin::decode(&bytes).unwrap(), everything);
//!
//! let genes = gbin::retrieve_genes(&bytes, &[actb]).unwrap();
//! assert_eq!(genes[0].num_hits(), 2);
//! ```

mod header;
mod reader;
mod utils;
mod writer;

pub use header::{GeneHeader, SIZE_HEADER};
pub use reader::{
    decode, retrieve_genes, GeneReader, GeneReaderBuilder, MmapGeneFile,
    DEFAULT_TRAVERSAL_LIMIT_WORDS, WORD_SIZE,
};
pub use writer::{GeneWriter, GeneWriterBuilder, DEFAULT_COMPRESSION_LEVEL};
