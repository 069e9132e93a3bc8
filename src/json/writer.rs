//! JSON exporter
//!
//! Flattens an [`Everything`] into a JSON array with one object per hit.
//! Records are emitted gene by gene in registration order, then line by line
//! and position by position in the order they were added.

use std::io::Write;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{Result, WriteError};
use crate::model::Everything;
use crate::types::Coord;
use crate::utils::write_file;

/// Default exclusive upper bound for exported coordinates
pub const DEFAULT_COORD_LIMIT: u32 = 100_000;

/// A builder for creating configured [`JsonWriter`] instances
///
/// # Examples
///
/// ```rust
/// use stgene::json::JsonWriterBuilder;
/// use stgene::{Coord, Everything};
///
/// let mut everything = Everything::new();
/// let gene = everything.register_gene("Actb");
/// everything.record_barcode(Coord::new(3, 4), "BC1");
/// everything.add_hit(gene, Coord::new(3, 4), 5).unwrap();
///
/// let bytes = JsonWriterBuilder::default().encode(&everything).unwrap();
/// assert_eq!(
///     std::str::from_utf8(&bytes).unwrap(),
///     "[\n  {\"y\":4,\"x\":3,\"hits\":5,\"barcode\":\"BC1\",\"gene\":\"Actb\"}\n]\n"
/// );
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWriterBuilder {
    /// Exclusive upper bound for both coordinates
    coord_limit: Option<u32>,
}
impl JsonWriterBuilder {
    #[must_use]
    pub fn coord_limit(mut self, limit: u32) -> Self {
        self.coord_limit = Some(limit);
        self
    }

    pub fn build<W: Write>(self, inner: W) -> JsonWriter<W> {
        JsonWriter {
            inner,
            coord_limit: self.coord_limit.unwrap_or(DEFAULT_COORD_LIMIT),
            buffer: Vec::new(),
        }
    }

    /// Exports a dataset into an in-memory buffer
    pub fn encode(self, everything: &Everything) -> Result<Vec<u8>> {
        let mut writer = self.build(Vec::new());
        writer.write_everything(everything)?;
        Ok(writer.into_inner())
    }

    /// Exports a dataset to `path`
    ///
    /// The file is only created once the whole export succeeded in memory.
    pub fn write_to_path<P: AsRef<Path>>(self, path: P, everything: &Everything) -> Result<()> {
        let bytes = self.encode(everything)?;
        write_file(path.as_ref(), &bytes)
    }
}

/// Writes datasets as JSON to an inner writer
pub struct JsonWriter<W: Write> {
    inner: W,
    coord_limit: u32,

    /// Staging buffer, flushed to `inner` only after a complete export
    buffer: Vec<u8>,
}
impl<W: Write> JsonWriter<W> {
    /// Exports a complete dataset
    ///
    /// Returns the number of bytes written. Nothing reaches the inner writer
    /// if a coordinate is out of bounds or lacks a barcode.
    #[instrument(level = "debug", skip_all, fields(genes = everything.num_genes(), hits = everything.num_hits()))]
    pub fn write_everything(&mut self, everything: &Everything) -> Result<usize> {
        self.buffer.clear();
        self.buffer.extend_from_slice(b"[\n");

        let mut first = true;
        for (gene_id, coord, hits) in everything.iter_hits() {
            self.check_bounds(coord)?;
            let barcode = everything.resolve_barcode(coord)?;
            let gene = &everything.gene_names()[gene_id];
            if !first {
                self.buffer.extend_from_slice(b",\n");
            }
            first = false;
            write_record(&mut self.buffer, coord, hits, barcode, gene)?;
        }
        if !first {
            self.buffer.push(b'\n');
        }
        self.buffer.extend_from_slice(b"]\n");

        self.inner.write_all(&self.buffer)?;
        debug!(bytes = self.buffer.len(), "exported json");
        Ok(self.buffer.len())
    }

    fn check_bounds(&self, coord: Coord) -> Result<()> {
        if coord.x >= self.coord_limit || coord.y >= self.coord_limit {
            return Err(WriteError::CoordOutOfBounds {
                x: coord.x,
                y: coord.y,
                limit: self.coord_limit,
            }
            .into());
        }
        Ok(())
    }

    pub fn by_ref(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Writes one indented, single-line record object
fn write_record(
    buf: &mut Vec<u8>,
    coord: Coord,
    hits: u64,
    barcode: &str,
    gene: &str,
) -> Result<()> {
    let mut num = itoa::Buffer::new();
    buf.extend_from_slice(b"  {\"y\":");
    buf.extend_from_slice(num.format(coord.y).as_bytes());
    buf.extend_from_slice(b",\"x\":");
    buf.extend_from_slice(num.format(coord.x).as_bytes());
    buf.extend_from_slice(b",\"hits\":");
    buf.extend_from_slice(num.format(hits).as_bytes());
    buf.extend_from_slice(b",\"barcode\":");
    serde_json::to_writer(&mut *buf, barcode)?;
    buf.extend_from_slice(b",\"gene\":");
    serde_json::to_writer(&mut *buf, gene)?;
    buf.push(b'}');
    Ok(())
}
