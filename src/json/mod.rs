//! # JSON export format
//!
//! A human-readable flattening of an [`Everything`](crate::Everything): one
//! array holding one object per hit, written one object per line.
//!
//! ```text
//! [
//!   {"y":0,"x":0,"hits":12,"barcode":"BC1","gene":"Actb"},
//!   {"y":0,"x":1,"hits":7,"barcode":"BC2","gene":"Actb"}
//! ]
//! ```
//!
//! Genes without hits and barcodes not referenced by any hit do not appear
//! in the export.

mod reader;
mod writer;

pub use reader::{from_records, parse, parse_path, JsonRecord};
pub use writer::{JsonWriter, JsonWriterBuilder, DEFAULT_COORD_LIMIT};
