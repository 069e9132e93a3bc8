//! Binary gene reader module
//!
//! Decodes the binary gene format back into an [`Everything`], either in full
//! or for a selection of genes. Selective retrieval seeks through the gene
//! offset table and never materializes the rest of the dataset.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, instrument};
use zstd::Decoder;

use super::header::{GeneHeader, SIZE_HEADER};
use super::utils::ByteCursor;
use crate::error::{ReadError, Result};
use crate::model::{Everything, Gene, HorizontalLine, PositionHit};
use crate::types::{Coord, GeneId};

/// Size of a machine word used to express the traversal limit
pub const WORD_SIZE: u64 = 8;

/// Default traversal limit in words (20 x 8Mi words, 1.25 GiB)
///
/// Real datasets easily exceed conservative message limits, so the default
/// leaves a wide margin.
pub const DEFAULT_TRAVERSAL_LIMIT_WORDS: u64 = 20 * 8 * 1024 * 1024;

/// Smallest encoded size of one position (x, y, empty barcode)
const MIN_POSITION_SIZE: usize = 2 + 2 + 4;

/// Smallest encoded size of one line (y, two empty arrays)
const MIN_LINE_SIZE: usize = 2 + 4 + 4;

/// A builder for configuring how binary gene messages are decoded
///
/// # Examples
///
/// ```rust
/// use stgene::gbin::{GeneReaderBuilder, GeneWriterBuilder};
/// use stgene::Everything;
///
/// let bytes = GeneWriterBuilder::default().encode(&Everything::new()).unwrap();
/// let reader = GeneReaderBuilder::default()
///     .traversal_limit(1024)
///     .build(&bytes)
///     .unwrap();
/// assert_eq!(reader.num_genes(), 0);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneReaderBuilder {
    /// Maximum message size in 8-byte words
    traversal_limit: Option<u64>,
    /// Whether decoded hits must reference recorded barcodes
    validate_barcodes: Option<bool>,
}
impl GeneReaderBuilder {
    #[must_use]
    pub fn traversal_limit(mut self, words: u64) -> Self {
        self.traversal_limit = Some(words);
        self
    }

    #[must_use]
    pub fn validate_barcodes(mut self, validate: bool) -> Self {
        self.validate_barcodes = Some(validate);
        self
    }

    pub fn build(self, bytes: &[u8]) -> Result<GeneReader<'_>> {
        GeneReader::new(
            bytes,
            self.traversal_limit.unwrap_or(DEFAULT_TRAVERSAL_LIMIT_WORDS),
            self.validate_barcodes.unwrap_or(true),
        )
    }

    /// Memory-maps a binary gene file for decoding
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<MmapGeneFile> {
        MmapGeneFile::new(path, self)
    }
}

/// Positions of the sections within a message body
#[derive(Debug, Clone)]
struct Layout {
    num_genes: usize,
    positions_start: usize,
    /// Byte range of every gene record, checked to tile the gene section
    records: Vec<Range<usize>>,
}

/// A decoder over one binary gene message
///
/// Uncompressed bodies are read in place. Compressed bodies are inflated once
/// when the reader is built.
pub struct GeneReader<'a> {
    header: GeneHeader,
    body: Cow<'a, [u8]>,
    layout: Layout,
    validate_barcodes: bool,
}
impl<'a> GeneReader<'a> {
    fn new(bytes: &'a [u8], traversal_limit: u64, validate_barcodes: bool) -> Result<Self> {
        let header = GeneHeader::from_buffer(bytes)?;
        let stored = &bytes[SIZE_HEADER..];
        check_traversal_limit(stored.len() as u64, traversal_limit)?;

        let body = if header.compressed {
            Cow::Owned(inflate(stored, traversal_limit)?)
        } else {
            Cow::Borrowed(stored)
        };
        let layout = scan_layout(&body)?;
        debug!(
            compressed = header.compressed,
            body = body.len(),
            genes = layout.num_genes,
            "opened binary gene message"
        );
        Ok(Self {
            header,
            body,
            layout,
            validate_barcodes,
        })
    }

    #[must_use]
    pub fn header(&self) -> GeneHeader {
        self.header
    }

    #[must_use]
    pub fn num_genes(&self) -> usize {
        self.layout.num_genes
    }

    /// Decodes the gene names in order; their index is their gene id
    pub fn gene_names(&self) -> Result<Vec<String>> {
        let mut cursor = ByteCursor::new(&self.body);
        let count = cursor.read_count(4)?;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(cursor.read_text()?.to_string());
        }
        Ok(names)
    }

    /// Decodes the coordinate to barcode map; duplicate coordinates keep the last barcode
    pub fn barcode_map(&self) -> Result<BTreeMap<Coord, String>> {
        let mut cursor = ByteCursor::at(&self.body, self.layout.positions_start);
        let count = cursor.read_count(MIN_POSITION_SIZE)?;
        let mut barcode_map = BTreeMap::new();
        for _ in 0..count {
            let x = cursor.read_u16()?;
            let y = cursor.read_u16()?;
            let barcode = cursor.read_text()?;
            barcode_map.insert(Coord::new(x.into(), y.into()), barcode.to_string());
        }
        Ok(barcode_map)
    }

    /// Decodes the complete dataset
    #[instrument(level = "debug", skip_all, fields(genes = self.layout.num_genes))]
    pub fn decode(&self) -> Result<Everything> {
        let gene_names = self.gene_names()?;
        let barcode_map = self.barcode_map()?;
        let genes = (0..self.layout.num_genes)
            .map(|id| self.decode_gene_at(id))
            .collect::<Result<Vec<Gene>>>()?;
        self.assemble(gene_names, barcode_map, genes)
    }

    /// Decodes the complete dataset, splitting the gene records across threads
    ///
    /// A `num_threads` of 0 uses all available cores. The result is identical
    /// to [`GeneReader::decode`].
    #[instrument(level = "debug", skip_all, fields(genes = self.layout.num_genes))]
    pub fn decode_parallel(&self, num_threads: usize) -> Result<Everything> {
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        let gene_names = self.gene_names()?;
        let barcode_map = self.barcode_map()?;

        let num_genes = self.layout.num_genes;
        let genes_per_thread = num_genes.div_ceil(num_threads.max(1)).max(1);
        let chunks: Vec<Result<Vec<Gene>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..num_genes)
                .step_by(genes_per_thread)
                .map(|start| {
                    let end = (start + genes_per_thread).min(num_genes);
                    scope.spawn(move || {
                        (start..end)
                            .map(|id| self.decode_gene_at(id))
                            .collect::<Result<Vec<Gene>>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut genes = Vec::with_capacity(num_genes);
        for chunk in chunks {
            genes.extend(chunk?);
        }
        self.assemble(gene_names, barcode_map, genes)
    }

    /// Decodes only the requested genes, in the requested order
    ///
    /// Each returned [`Gene`] is identical to the gene with the same id in a
    /// full decode.
    pub fn retrieve_genes(&self, ids: &[GeneId]) -> Result<Vec<Gene>> {
        ids.iter().map(|&id| self.decode_gene_at(id)).collect()
    }

    /// Decodes the record of gene `id`, which must fill its byte range exactly
    ///
    /// A record that stops short of the next gene's offset means the offset
    /// table is wrong; one that stops short of the end of the body leaves
    /// trailing bytes.
    fn decode_gene_at(&self, id: GeneId) -> Result<Gene> {
        let Range { start, end } = self
            .layout
            .records
            .get(id)
            .cloned()
            .ok_or(ReadError::OutOfRange(id, self.layout.num_genes))?;
        let mut cursor = ByteCursor::at(&self.body[..end], start);
        let gene = decode_gene(&mut cursor, id)?;
        match cursor.remaining() {
            0 => Ok(gene),
            rest if id + 1 == self.layout.num_genes => Err(ReadError::TrailingBytes(rest).into()),
            _ => Err(ReadError::InvalidGeneOffset(id + 1).into()),
        }
    }

    fn assemble(
        &self,
        gene_names: Vec<String>,
        barcode_map: BTreeMap<Coord, String>,
        genes: Vec<Gene>,
    ) -> Result<Everything> {
        let everything = Everything::from_parts(gene_names, barcode_map, genes)?;
        if self.validate_barcodes {
            everything.validate_barcodes()?;
        }
        Ok(everything)
    }
}

fn check_traversal_limit(bytes: u64, limit: u64) -> Result<()> {
    let words = bytes.div_ceil(WORD_SIZE);
    if words > limit {
        return Err(ReadError::TraversalLimitExceeded { words, limit }.into());
    }
    Ok(())
}

/// Inflates a zstd body, refusing to grow beyond the traversal limit
fn inflate(stored: &[u8], traversal_limit: u64) -> Result<Vec<u8>> {
    let max_bytes = traversal_limit.saturating_mul(WORD_SIZE);
    let mut body = Vec::new();
    Decoder::new(stored)?
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut body)?;
    check_traversal_limit(body.len() as u64, traversal_limit)?;
    Ok(body)
}

/// Walks the name and position sections to find the gene offset table
fn scan_layout(body: &[u8]) -> Result<Layout> {
    let mut cursor = ByteCursor::new(body);
    let num_names = cursor.read_count(4)?;
    for _ in 0..num_names {
        cursor.skip_text()?;
    }

    let positions_start = cursor.pos();
    let num_positions = cursor.read_count(MIN_POSITION_SIZE)?;
    for _ in 0..num_positions {
        cursor.take(4)?;
        cursor.skip_text()?;
    }

    let num_genes = cursor.read_count(8)?;
    if num_genes != num_names {
        return Err(ReadError::GeneCountMismatch {
            names: num_names,
            genes: num_genes,
        }
        .into());
    }

    let mut starts = Vec::with_capacity(num_genes);
    for _ in 0..num_genes {
        starts.push(cursor.read_u64()?);
    }
    let records_start = cursor.pos();
    if num_genes == 0 && cursor.remaining() > 0 {
        return Err(ReadError::TrailingBytes(cursor.remaining()).into());
    }

    // offsets start at zero, strictly increase and stay inside the body
    let mut records: Vec<Range<usize>> = Vec::with_capacity(num_genes);
    for (id, &relative) in starts.iter().enumerate() {
        let start = usize::try_from(relative)
            .ok()
            .and_then(|rel| records_start.checked_add(rel))
            .filter(|&pos| pos < body.len())
            .ok_or(ReadError::InvalidGeneOffset(id))?;
        match records.last_mut() {
            None if start != records_start => {
                return Err(ReadError::InvalidGeneOffset(id).into());
            }
            Some(prev) if start <= prev.start => {
                return Err(ReadError::InvalidGeneOffset(id).into());
            }
            Some(prev) => prev.end = start,
            None => {}
        }
        records.push(start..body.len());
    }

    Ok(Layout {
        num_genes,
        positions_start,
        records,
    })
}

/// Decodes one gene record at the cursor position
fn decode_gene(cursor: &mut ByteCursor<'_>, gene: GeneId) -> Result<Gene> {
    let num_lines = cursor.read_count(MIN_LINE_SIZE)?;
    let mut horizontal_lines = Vec::with_capacity(num_lines);
    for line in 0..num_lines {
        let y = cursor.read_u16()?;
        let num_x = cursor.read_count(2)?;
        let xcoords = cursor.read_u16_array(num_x)?;
        let num_hits = cursor.read_count(4)?;
        if num_x != num_hits {
            return Err(ReadError::ParallelLengthMismatch {
                gene,
                line,
                xcoords: num_x,
                hits: num_hits,
            }
            .into());
        }
        let hits = cursor.read_u32_array(num_hits)?;
        let position_hits = xcoords
            .into_iter()
            .zip(hits)
            .map(|(x, hits)| PositionHit::new(x.into(), hits.into()))
            .collect();
        horizontal_lines.push(HorizontalLine::from_hits(y.into(), position_hits));
    }
    Ok(Gene::from_lines(horizontal_lines))
}

/// Decodes a complete dataset with default options
pub fn decode(bytes: &[u8]) -> Result<Everything> {
    GeneReaderBuilder::default().build(bytes)?.decode()
}

/// Decodes only the genes with the given ids, with default options
pub fn retrieve_genes(bytes: &[u8], ids: &[GeneId]) -> Result<Vec<Gene>> {
    GeneReaderBuilder::default()
        .build(bytes)?
        .retrieve_genes(ids)
}

/// A memory-mapped binary gene file
///
/// The file is mapped once; decoding and gene retrieval read directly from the
/// mapped memory.
pub struct MmapGeneFile {
    /// Memory mapped file contents
    mmap: Mmap,

    /// Decoding options
    options: GeneReaderBuilder,
}
impl MmapGeneFile {
    /// Opens and maps a binary gene file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(path, GeneReaderBuilder::default())
    }

    fn new<P: AsRef<Path>>(path: P, options: GeneReaderBuilder) -> Result<Self> {
        // Verify input file is a file before attempting to map
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap, options })
    }

    /// Builds a reader over the mapped bytes
    pub fn reader(&self) -> Result<GeneReader<'_>> {
        self.options.build(&self.mmap)
    }

    pub fn decode(&self) -> Result<Everything> {
        self.reader()?.decode()
    }

    pub fn retrieve_genes(&self, ids: &[GeneId]) -> Result<Vec<Gene>> {
        self.reader()?.retrieve_genes(ids)
    }

    /// Size of the mapped file in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

#[cfg(test)]
mod testing {

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::*;
    use crate::error::{Error, HeaderError, LookupError};
    use crate::gbin::utils::{write_len, write_text};
    use crate::gbin::GeneWriterBuilder;

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

    /// A dataset with sparse rows, unsorted x and repeated coordinates
    fn sparse() -> Result<Everything> {
        let mut everything = Everything::new();
        for y in [0u32, 3, 9, 65535] {
            for x in [2u32, 0, 40_000] {
                everything.record_barcode(Coord::new(x, y), format!("S{x}x{y}"));
            }
        }
        let a = everything.register_gene("Sox2");
        let b = everything.register_gene("Pax6");
        let c = everything.register_gene("Nes");
        everything.add_hit(a, Coord::new(40_000, 9), u64::from(u32::MAX))?;
        everything.add_hit(a, Coord::new(2, 9), 1)?;
        everything.add_hit(a, Coord::new(0, 3), 5)?;
        everything.add_hit(a, Coord::new(2, 9), 1)?;
        everything.add_hit(c, Coord::new(0, 65535), 8)?;
        everything.add_hit(b, Coord::new(2, 0), 3)?;
        Ok(everything)
    }

    /// File position of the Gapdh entry in the offset table of `scenario()`
    const GAPDH_OFFSET: usize = SIZE_HEADER + 21 + 26 + 4 + 8;

    fn encode(everything: &Everything, compress: bool) -> Result<Vec<u8>> {
        GeneWriterBuilder::default()
            .compress(compress)
            .encode(everything)
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        for everything in [Everything::new(), scenario()?, sparse()?] {
            for compress in [false, true] {
                let decoded = decode(&encode(&everything, compress)?)?;
                assert_eq!(decoded, everything);
            }
        }
        Ok(())
    }

    #[test]
    fn test_sparse_rows_keep_their_y() -> Result<()> {
        let decoded = decode(&encode(&sparse()?, false)?)?;
        let sox2 = decoded.gene(0).unwrap();
        let rows: Vec<u32> = sox2.horizontal_lines().iter().map(HorizontalLine::y).collect();
        assert_eq!(rows, vec![9, 3]);
        assert_eq!(
            sox2.line(9).unwrap().position_hits(),
            &[
                PositionHit::new(40_000, u64::from(u32::MAX)),
                PositionHit::new(2, 1),
                PositionHit::new(2, 1)
            ]
        );
        Ok(())
    }

    #[test]
    fn test_retrieve_genes_matches_decode() -> Result<()> {
        for compress in [false, true] {
            let bytes = encode(&sparse()?, compress)?;
            let full = decode(&bytes)?;
            let ids = [2, 0, 2];
            let genes = retrieve_genes(&bytes, &ids)?;
            assert_eq!(genes.len(), 3);
            for (gene, id) in genes.iter().zip(ids) {
                assert_eq!(gene, full.gene(id).unwrap());
            }
        }
        Ok(())
    }

    #[test]
    fn test_retrieve_unknown_gene() -> Result<()> {
        let bytes = encode(&scenario()?, false)?;
        assert!(matches!(
            retrieve_genes(&bytes, &[2]),
            Err(Error::ReadError(ReadError::OutOfRange(2, 2)))
        ));
        Ok(())
    }

    #[test]
    fn test_decode_parallel_matches_decode() -> Result<()> {
        let mut everything = sparse()?;
        for idx in 0..50u32 {
            let id = everything.register_gene(&format!("G{idx}"));
            everything.add_hit(id, Coord::new(0, 3), u64::from(idx))?;
        }
        let bytes = encode(&everything, false)?;
        let reader = GeneReaderBuilder::default().build(&bytes)?;
        for threads in [0, 1, 3] {
            assert_eq!(reader.decode_parallel(threads)?, everything);
        }
        Ok(())
    }

    #[test]
    fn test_traversal_limit() -> Result<()> {
        let bytes = encode(&sparse()?, false)?;
        let result = GeneReaderBuilder::default().traversal_limit(4).build(&bytes);
        assert!(matches!(
            result,
            Err(Error::ReadError(ReadError::TraversalLimitExceeded { limit: 4, .. }))
        ));

        // the limit applies to the inflated body as well
        let mut everything = sparse()?;
        for _ in 0..500 {
            everything.add_hit(0, Coord::new(0, 3), 5)?;
        }
        let bytes = encode(&everything, true)?;
        let words = (bytes.len() - SIZE_HEADER).div_ceil(8) as u64;
        let result = GeneReaderBuilder::default()
            .traversal_limit(words)
            .build(&bytes);
        assert!(matches!(
            result,
            Err(Error::ReadError(ReadError::TraversalLimitExceeded { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_default_limit_has_headroom() {
        assert_eq!(DEFAULT_TRAVERSAL_LIMIT_WORDS, 167_772_160);
    }

    #[test]
    fn test_parallel_length_mismatch() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        // the hit count prefix of the single Actb line sits right before the two hits
        let hits_prefix = bytes.len() - 4 - 2 * 4 - 4;
        bytes[hits_prefix..hits_prefix + 4].copy_from_slice(&1u32.to_le_bytes());
        // keep the body size consistent by dropping one hit
        let len = bytes.len();
        bytes.copy_within(len - 4.., len - 8);
        bytes.truncate(len - 4);
        let body = (bytes.len() - SIZE_HEADER) as u64;
        bytes[6..14].copy_from_slice(&body.to_le_bytes());
        // Gapdh moved four bytes closer
        bytes[GAPDH_OFFSET..GAPDH_OFFSET + 8].copy_from_slice(&22u64.to_le_bytes());

        assert!(matches!(
            decode(&bytes),
            Err(Error::ReadError(ReadError::ParallelLengthMismatch {
                gene: 0,
                line: 0,
                xcoords: 2,
                hits: 1
            }))
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_body() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode(&bytes),
            Err(Error::HeaderError(HeaderError::InvalidSize(..)))
        ));

        // a consistent header over a short body fails while reading the body
        let body = (bytes.len() - SIZE_HEADER) as u64;
        bytes[6..14].copy_from_slice(&body.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(Error::ReadError(ReadError::Truncated(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_barcode_detected() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        // rewrite the x of the second position from 1 to 2
        let position = SIZE_HEADER + 4 + (4 + 4) + (4 + 5) + 4 + (2 + 2 + 4 + 3);
        bytes[position..position + 2].copy_from_slice(&2u16.to_le_bytes());

        assert!(matches!(
            decode(&bytes),
            Err(Error::LookupError(LookupError::MissingBarcode { x: 1, y: 0 }))
        ));

        let lenient = GeneReaderBuilder::default()
            .validate_barcodes(false)
            .build(&bytes)?
            .decode()?;
        assert_eq!(lenient.barcode(Coord::new(2, 0)), Some("BC2"));
        Ok(())
    }

    #[test]
    fn test_mmap_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sparse.stg");
        GeneWriterBuilder::default()
            .compress(true)
            .write_to_path(&path, &sparse()?)?;

        let file = MmapGeneFile::open(&path)?;
        assert!(!file.is_empty());
        assert_eq!(file.decode()?, sparse()?);
        assert_eq!(file.retrieve_genes(&[1])?[0], *sparse()?.gene(1).unwrap());
        Ok(())
    }

    #[test]
    fn test_mmap_directory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(MmapGeneFile::open(dir.path()).is_err());
        Ok(())
    }

    /// Wraps a hand-written body in an uncompressed header
    fn message(body: &[u8]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        GeneHeader::new(false, body.len() as u64).write_bytes(&mut bytes)?;
        bytes.extend_from_slice(body);
        Ok(bytes)
    }

    /// Decodes sequentially and with two worker threads
    fn decode_both(bytes: &[u8]) -> [Result<Everything>; 2] {
        [
            decode(bytes),
            GeneReaderBuilder::default()
                .build(bytes)
                .and_then(|reader| reader.decode_parallel(2)),
        ]
    }

    fn set_body_len(bytes: &mut [u8]) {
        let body = (bytes.len() - SIZE_HEADER) as u64;
        bytes[6..14].copy_from_slice(&body.to_le_bytes());
    }

    #[test]
    fn test_duplicate_positions_keep_last_barcode() -> Result<()> {
        let mut body = Vec::new();
        write_len(&mut body, 1)?;
        write_text(&mut body, "Nes")?;
        write_len(&mut body, 2)?;
        for barcode in ["FIRST", "LAST"] {
            body.write_u16::<LittleEndian>(1)?;
            body.write_u16::<LittleEndian>(1)?;
            write_text(&mut body, barcode)?;
        }
        write_len(&mut body, 1)?;
        body.write_u64::<LittleEndian>(0)?;
        // one line on row 1 with a single hit at x = 1
        write_len(&mut body, 1)?;
        body.write_u16::<LittleEndian>(1)?;
        write_len(&mut body, 1)?;
        body.write_u16::<LittleEndian>(1)?;
        write_len(&mut body, 1)?;
        body.write_u32::<LittleEndian>(5)?;

        let bytes = message(&body)?;
        for result in decode_both(&bytes) {
            let everything = result?;
            assert_eq!(everything.num_spots(), 1);
            assert_eq!(everything.barcode(Coord::new(1, 1)), Some("LAST"));
            assert_eq!(everything.num_hits(), 1);
        }
        Ok(())
    }

    #[test]
    fn test_trailing_bytes() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        bytes.extend_from_slice(&[0; 3]);
        set_body_len(&mut bytes);
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::TrailingBytes(3)))
            ));
        }

        let mut bytes = encode(&Everything::new(), false)?;
        bytes.extend_from_slice(&[0; 2]);
        set_body_len(&mut bytes);
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::TrailingBytes(2)))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_offset_into_previous_record() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        bytes[GAPDH_OFFSET..GAPDH_OFFSET + 8].copy_from_slice(&0u64.to_le_bytes());
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::InvalidGeneOffset(1)))
            ));
        }
        assert!(retrieve_genes(&bytes, &[1]).is_err());
        Ok(())
    }

    #[test]
    fn test_first_offset_not_zero() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        let first = GAPDH_OFFSET - 8;
        bytes[first..first + 8].copy_from_slice(&4u64.to_le_bytes());
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::InvalidGeneOffset(0)))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_offset_leaves_gap() -> Result<()> {
        // Actb is 26 bytes long; pointing Gapdh two bytes further leaves a gap
        let mut bytes = encode(&scenario()?, false)?;
        bytes[GAPDH_OFFSET..GAPDH_OFFSET + 8].copy_from_slice(&28u64.to_le_bytes());
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::InvalidGeneOffset(1)))
            ));
        }
        assert!(matches!(
            retrieve_genes(&bytes, &[0]),
            Err(Error::ReadError(ReadError::InvalidGeneOffset(1)))
        ));
        Ok(())
    }

    #[test]
    fn test_offset_past_body() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        bytes[GAPDH_OFFSET..GAPDH_OFFSET + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::InvalidGeneOffset(1)))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_gene_count_mismatch_on_wire() -> Result<()> {
        let mut body = Vec::new();
        write_len(&mut body, 2)?;
        write_text(&mut body, "A")?;
        write_text(&mut body, "B")?;
        write_len(&mut body, 0)?;
        write_len(&mut body, 1)?;
        body.write_u64::<LittleEndian>(0)?;
        write_len(&mut body, 0)?;

        let bytes = message(&body)?;
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::GeneCountMismatch {
                    names: 2,
                    genes: 1
                }))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_parallel_rejects_corrupt_lines() -> Result<()> {
        let mut bytes = encode(&scenario()?, false)?;
        bytes.truncate(bytes.len() - 3);
        set_body_len(&mut bytes);
        for result in decode_both(&bytes) {
            assert!(matches!(
                result,
                Err(Error::ReadError(ReadError::Truncated(_)))
            ));
        }
        Ok(())
    }
}
