//! Header module for the binary gene format
//!
//! The header is a fixed 32-byte block at the start of every file. It identifies
//! the format, records whether the body is zstd-compressed and stores the size of
//! the body as it is stored in the file.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};

use crate::error::{HeaderError, Result};

/// Current magic number: "STGB" in ASCII (in little-endian byte order)
#[allow(clippy::unreadable_literal)]
const MAGIC: u32 = 0x42475453;

/// Current format version of the binary gene file format
const FORMAT: u8 = 1;

/// Flag bit marking a zstd-compressed body
const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = 32;

/// Reserved bytes for future use, set to a placeholder value
pub const RESERVED: [u8; 18] = [42; 18];

/// Header structure for binary gene files
///
/// Layout (little-endian):
///
/// ```text
/// 0..4    magic
/// 4       format version
/// 5       flags
/// 6..14   body length in bytes
/// 14..32  reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneHeader {
    /// Magic number to identify the file format
    pub magic: u32,

    /// Version of the file format
    pub format: u8,

    /// Whether the body is a single zstd frame
    pub compressed: bool,

    /// Number of body bytes following the header, as stored
    pub body: u64,

    /// Reserved bytes for future use
    pub reserved: [u8; 18],
}
impl GeneHeader {
    /// Creates a new header for a body of `body` stored bytes
    #[must_use]
    pub fn new(compressed: bool, body: u64) -> Self {
        Self {
            magic: MAGIC,
            format: FORMAT,
            compressed,
            body,
            reserved: RESERVED,
        }
    }

    /// Parses a header from a fixed-size byte array
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The magic number is incorrect
    /// * The format version is unsupported
    /// * The reserved bytes are invalid
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        let format = buffer[4];
        if format != FORMAT {
            return Err(HeaderError::InvalidFormatVersion(format).into());
        }
        let compressed = buffer[5] & FLAG_COMPRESSED != 0;
        let body = LittleEndian::read_u64(&buffer[6..14]);
        let reserved = match buffer[14..32].try_into() {
            Ok(reserved) => reserved,
            Err(_) => return Err(HeaderError::InvalidReservedBytes.into()),
        };
        Ok(Self {
            magic,
            format,
            compressed,
            body,
            reserved,
        })
    }

    /// Parses a header from the start of a buffer and checks the body size
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is smaller than the header, if the header
    /// is invalid, or if the remaining bytes differ from the recorded body size.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        let mut bytes = [0u8; SIZE_HEADER];
        if buffer.len() < SIZE_HEADER {
            return Err(HeaderError::InvalidSize(buffer.len(), SIZE_HEADER).into());
        }
        bytes.copy_from_slice(&buffer[..SIZE_HEADER]);
        let header = Self::from_bytes(&bytes)?;
        let expected = SIZE_HEADER as u64 + header.body;
        if buffer.len() as u64 != expected {
            return Err(HeaderError::InvalidSize(buffer.len(), expected as usize).into());
        }
        Ok(header)
    }

    /// Writes the header to a writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], self.magic);
        buffer[4] = self.format;
        buffer[5] = if self.compressed { FLAG_COMPRESSED } else { 0 };
        LittleEndian::write_u64(&mut buffer[6..14], self.body);
        buffer[14..32].copy_from_slice(&self.reserved);
        writer.write_all(&buffer)?;
        Ok(())
    }

    /// Reads a header from a reader
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }
}
