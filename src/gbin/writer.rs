//! Binary gene writer module
//!
//! This module serializes an [`Everything`] into the binary gene format.
//! The whole dataset is validated and encoded in memory before anything is
//! written to the output, so an invalid dataset never produces a partial file.

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::{debug, instrument};
use zstd::Encoder as ZstdEncoder;

use super::header::GeneHeader;
use super::utils::{write_len, write_text};
use crate::error::Result;
use crate::model::{Everything, Gene};
use crate::types::{hits_to_wire, Coord};
use crate::utils::write_file;

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Encodes the body of the binary format into `buf`
///
/// Sections are written in order: gene names, positions (ascending by
/// coordinate), then the gene offset table followed by one record per gene.
fn encode_body(everything: &Everything, buf: &mut Vec<u8>) -> Result<()> {
    write_len(buf, everything.num_genes())?;
    for name in everything.gene_names() {
        write_text(buf, name)?;
    }

    write_len(buf, everything.num_spots())?;
    for (coord, barcode) in everything.barcode_map() {
        let (x, y) = coord.to_wire()?;
        buf.write_u16::<LittleEndian>(x)?;
        buf.write_u16::<LittleEndian>(y)?;
        write_text(buf, barcode)?;
    }

    // gene records are staged so that their offsets can be written first
    let mut records = Vec::new();
    let mut offsets = Vec::with_capacity(everything.num_genes());
    for gene in everything.genes() {
        offsets.push(records.len() as u64);
        encode_gene(gene, &mut records)?;
    }

    write_len(buf, offsets.len())?;
    for offset in offsets {
        buf.write_u64::<LittleEndian>(offset)?;
    }
    buf.extend_from_slice(&records);
    Ok(())
}

/// Encodes one gene record
///
/// Each line stores its row followed by two parallel arrays of equal length:
/// the x-coordinates and the hit counts.
fn encode_gene(gene: &Gene, buf: &mut Vec<u8>) -> Result<()> {
    write_len(buf, gene.horizontal_lines().len())?;
    for line in gene.horizontal_lines() {
        let first_x = line.position_hits().first().map_or(0, |ph| ph.x);
        let (_, y) = Coord::new(first_x, line.y()).to_wire()?;
        buf.write_u16::<LittleEndian>(y)?;

        write_len(buf, line.len())?;
        for (coord, _) in line.iter_coords() {
            let (x, _) = coord.to_wire()?;
            buf.write_u16::<LittleEndian>(x)?;
        }

        write_len(buf, line.len())?;
        for (coord, hits) in line.iter_coords() {
            buf.write_u32::<LittleEndian>(hits_to_wire(coord, hits)?)?;
        }
    }
    Ok(())
}

/// A builder for creating configured [`GeneWriter`] instances
///
/// # Examples
///
/// ```rust
/// use stgene::gbin::GeneWriterBuilder;
/// use stgene::{Coord, Everything};
///
/// let mut everything = Everything::new();
/// let gene = everything.register_gene("Actb");
/// everything.record_barcode(Coord::new(0, 0), "BC1");
/// everything.add_hit(gene, Coord::new(0, 0), 12).unwrap();
///
/// let mut writer = GeneWriterBuilder::default()
///     .compress(true)
///     .build(Vec::new());
/// writer.write_everything(&everything).unwrap();
/// assert!(!writer.by_ref().is_empty());
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneWriterBuilder {
    /// Whether the body is written as a zstd frame
    compress: Option<bool>,
    /// zstd compression level
    level: Option<i32>,
    /// Number of zstd worker threads (0 uses all available cores)
    threads: Option<usize>,
}
impl GeneWriterBuilder {
    #[must_use]
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    #[must_use]
    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn build<W: Write>(self, inner: W) -> GeneWriter<W> {
        let threads = match self.threads.unwrap_or(1) {
            0 => num_cpus::get(),
            n => n,
        };
        GeneWriter {
            inner,
            compress: self.compress.unwrap_or(false),
            level: self.level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
            threads,
            ubuf: Vec::new(),
            zbuf: Vec::new(),
        }
    }

    /// Encodes a dataset into a complete in-memory file
    pub fn encode(self, everything: &Everything) -> Result<Vec<u8>> {
        let mut writer = self.build(Vec::new());
        writer.write_everything(everything)?;
        Ok(writer.into_inner())
    }

    /// Encodes a dataset and writes it to `path`
    ///
    /// The destination is created (or truncated) only once the dataset has been
    /// validated and fully encoded. If writing fails the incomplete file is
    /// removed before the error is returned.
    pub fn write_to_path<P: AsRef<Path>>(self, path: P, everything: &Everything) -> Result<()> {
        let bytes = self.encode(everything)?;
        write_file(path.as_ref(), &bytes)
    }
}

/// Writes datasets in the binary gene format to an inner writer
pub struct GeneWriter<W: Write> {
    /// Inner writer
    inner: W,

    /// Whether the body is zstd-compressed
    compress: bool,

    /// zstd compression level
    level: i32,

    /// Number of zstd worker threads
    threads: usize,

    /// Reusable buffer for the uncompressed body
    ubuf: Vec<u8>,

    /// Reusable buffer for the compressed body
    zbuf: Vec<u8>,
}
impl<W: Write> GeneWriter<W> {
    /// Validates, encodes and writes a complete dataset
    ///
    /// Returns the number of bytes written, header included. Nothing is written
    /// to the inner writer if the dataset fails validation.
    #[instrument(level = "debug", skip_all, fields(genes = everything.num_genes(), spots = everything.num_spots()))]
    pub fn write_everything(&mut self, everything: &Everything) -> Result<usize> {
        everything.validate()?;

        self.ubuf.clear();
        encode_body(everything, &mut self.ubuf)?;

        let body = if self.compress {
            self.compress_body()?;
            &self.zbuf
        } else {
            &self.ubuf
        };

        let header = GeneHeader::new(self.compress, body.len() as u64);
        header.write_bytes(&mut self.inner)?;
        self.inner.write_all(body)?;
        debug!(
            uncompressed = self.ubuf.len(),
            stored = body.len(),
            "encoded binary gene body"
        );
        Ok(super::header::SIZE_HEADER + body.len())
    }

    fn compress_body(&mut self) -> Result<()> {
        self.zbuf.clear();
        let mut encoder = ZstdEncoder::new(&mut self.zbuf, self.level)?;
        if self.threads > 1 {
            encoder.multithread(self.threads as u32)?;
        }
        encoder.write_all(&self.ubuf)?;
        encoder.finish()?;
        Ok(())
    }

    /// Returns true if bodies are written as zstd frames
    pub fn is_compressed(&self) -> bool {
        self.compress
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

#[cfg(test)]
mod testing {

    use super::*;
    use crate::error::{Error, LookupError, WriteError};
    use crate::gbin::header::SIZE_HEADER;

    fn scenario() -> Result<Everything> {
        let mut everything = Everything::new();
        let actb = everything.register_gene("Actb");
        everything.register_gene("Gapdh");
        everything.record_barcode(Coord::new(0, 0), "BC1");
        everything.record_barcode(Coord::new(1, 0), "BC2");
        everything.add_hit(actb, Coord::new(0, 0), 12)?;
        everything.add_hit(actb, Coord::new(1, 0), 7)?;
        Ok(everything)
    }

    #[test]
    fn test_empty_dataset() -> Result<()> {
        let bytes = GeneWriterBuilder::default().encode(&Everything::new())?;
        // header + three empty list prefixes
        assert_eq!(bytes.len(), SIZE_HEADER + 12);
        Ok(())
    }

    #[test]
    fn test_body_layout() -> Result<()> {
        let bytes = GeneWriterBuilder::default().encode(&scenario()?)?;
        let body = &bytes[SIZE_HEADER..];

        let names = 4 + (4 + 4) + (4 + 5);
        let positions = 4 + 2 * (2 + 2 + 4 + 3);
        let table = 4 + 2 * 8;
        let actb = 4 + 2 + 4 + 2 * 2 + 4 + 2 * 4;
        let gapdh = 4;
        assert_eq!(body.len(), names + positions + table + actb + gapdh);

        // gene count, then the offset of the second gene
        let table_start = names + positions;
        assert_eq!(&body[table_start..table_start + 4], &2u32.to_le_bytes());
        assert_eq!(
            &body[table_start + 12..table_start + 20],
            &(actb as u64).to_le_bytes()
        );
        Ok(())
    }

    #[test]
    fn test_hits_overflow_writes_nothing() -> Result<()> {
        let mut everything = scenario()?;
        everything.add_hit(1, Coord::new(1, 0), 1 << 32)?;

        let mut writer = GeneWriterBuilder::default().build(Vec::new());
        let result = writer.write_everything(&everything);
        assert!(matches!(
            result,
            Err(Error::WriteError(WriteError::HitsOverflow { .. }))
        ));
        assert!(writer.by_ref().is_empty());
        Ok(())
    }

    #[test]
    fn test_coord_overflow_writes_nothing() -> Result<()> {
        let mut everything = scenario()?;
        everything.record_barcode(Coord::new(65536, 2), "BC9");
        everything.add_hit(0, Coord::new(65536, 2), 1)?;

        let mut writer = GeneWriterBuilder::default().build(Vec::new());
        assert!(matches!(
            writer.write_everything(&everything),
            Err(Error::WriteError(WriteError::CoordOverflow { x: 65536, .. }))
        ));
        assert!(writer.by_ref().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_barcode_rejected() -> Result<()> {
        let mut everything = scenario()?;
        everything.add_hit(0, Coord::new(5, 5), 1)?;
        let result = GeneWriterBuilder::default().encode(&everything);
        assert!(matches!(
            result,
            Err(Error::LookupError(LookupError::MissingBarcode { x: 5, y: 5 }))
        ));
        Ok(())
    }

    #[test]
    fn test_compressed_flag() -> Result<()> {
        let mut writer = GeneWriterBuilder::default()
            .compress(true)
            .level(1)
            .threads(2)
            .build(Vec::new());
        assert!(writer.is_compressed());
        writer.write_everything(&scenario()?)?;
        let bytes = writer.into_inner();
        assert_eq!(bytes[5], 1);
        Ok(())
    }

    #[test]
    fn test_to_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scenario.stg");
        GeneWriterBuilder::default().write_to_path(&path, &scenario()?)?;
        let bytes = std::fs::read(&path)?;
        assert_eq!(bytes, GeneWriterBuilder::default().encode(&scenario()?)?);
        Ok(())
    }

    #[test]
    fn test_to_path_overflow_leaves_no_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("overflow.stg");
        let mut everything = scenario()?;
        everything.add_hit(0, Coord::new(0, 0), u64::from(u32::MAX) + 1)?;
        assert!(GeneWriterBuilder::default()
            .write_to_path(&path, &everything)
            .is_err());
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_to_path_missing_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("out.stg");
        let result = GeneWriterBuilder::default().write_to_path(&path, &scenario()?);
        assert!(matches!(result, Err(Error::IoError(_))));
        Ok(())
    }
}
