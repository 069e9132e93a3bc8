use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{ReadError, Result, WriteError};

/// Writes a 32-bit list length prefix
pub fn write_len(buf: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| WriteError::ListTooLong(len))?;
    buf.write_u32::<LittleEndian>(len)?;
    Ok(())
}

/// Writes a length-prefixed UTF-8 string
pub fn write_text(buf: &mut Vec<u8>, text: &str) -> Result<()> {
    write_len(buf, text.len())?;
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

/// Bounds-checked little-endian reader over a message body
///
/// Every read that would run past the end of the body fails with
/// [`ReadError::Truncated`] at the position of the read.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ReadError::Truncated(self.pos).into());
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take(2).map(LittleEndian::read_u16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take(4).map(LittleEndian::read_u32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.take(8).map(LittleEndian::read_u64)
    }

    /// Reads a list length and checks that the list can fit the remaining bytes
    ///
    /// `min_size` is the smallest encoded size of one element. Checking before
    /// allocating keeps a corrupt count from reserving huge buffers.
    pub fn read_count(&mut self, min_size: usize) -> Result<usize> {
        let start = self.pos;
        let count = self.read_u32()? as usize;
        match count.checked_mul(min_size) {
            Some(size) if size <= self.remaining() => Ok(count),
            _ => Err(ReadError::Truncated(start).into()),
        }
    }

    pub fn read_text(&mut self) -> Result<&'a str> {
        let len = self.read_count(1)?;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// Skips over a length-prefixed string
    pub fn skip_text(&mut self) -> Result<()> {
        let len = self.read_count(1)?;
        self.take(len)?;
        Ok(())
    }

    pub fn read_u16_array(&mut self, len: usize) -> Result<Vec<u16>> {
        let bytes = self.take(len * 2)?;
        Ok(bytes.chunks_exact(2).map(LittleEndian::read_u16).collect())
    }

    pub fn read_u32_array(&mut self, len: usize) -> Result<Vec<u32>> {
        let bytes = self.take(len * 4)?;
        Ok(bytes.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }
}
