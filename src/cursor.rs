//! Bounds-checked, endianness-aware access to fixed byte buffers
//!
//! All multi-byte reads and writes go through [`Endian`] so that nothing in
//! this crate ever depends on host byte order. Destination buffers are
//! caller-owned and never resized; [`ByteCursor`] polices capacity on every
//! write.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order for reading and writing multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Read a `u16` at `pos`, failing on a truncated buffer.
    pub fn read_u16(self, data: &[u8], pos: usize) -> Result<u16> {
        let slice = get_slice(data, pos, 2)?;
        Ok(match self {
            Endian::Little => LittleEndian::read_u16(slice),
            Endian::Big => BigEndian::read_u16(slice),
        })
    }

    /// Read a `u32` at `pos`, failing on a truncated buffer.
    pub fn read_u32(self, data: &[u8], pos: usize) -> Result<u32> {
        let slice = get_slice(data, pos, 4)?;
        Ok(match self {
            Endian::Little => LittleEndian::read_u32(slice),
            Endian::Big => BigEndian::read_u32(slice),
        })
    }

    /// Read an unsigned integer of `width` bytes at `pos`.
    ///
    /// Only widths 2 and 4 exist in the tag-directory wire format; any other
    /// width is a contract violation reported as [`Error::Metadata`].
    pub fn read_int(self, data: &[u8], pos: usize, width: usize) -> Result<u32> {
        match width {
            2 => self.read_u16(data, pos).map(u32::from),
            4 => self.read_u32(data, pos),
            _ => Err(Error::Metadata(format!(
                "unsupported integer width {width} at position {pos}"
            ))),
        }
    }

    /// Write a `u32` at `pos`, failing on a truncated buffer.
    pub fn write_u32(self, data: &mut [u8], pos: usize, value: u32) -> Result<()> {
        let end = checked_end(data.len(), pos, 4)?;
        let slice = &mut data[pos..end];
        match self {
            Endian::Little => LittleEndian::write_u32(slice, value),
            Endian::Big => BigEndian::write_u32(slice, value),
        }
        Ok(())
    }
}

fn checked_end(len: usize, pos: usize, width: usize) -> Result<usize> {
    let end = pos
        .checked_add(width)
        .ok_or_else(|| Error::Metadata(format!("position overflow at {pos}")))?;
    if end > len {
        return Err(Error::Metadata(format!(
            "truncated buffer: {width} bytes at position {pos} exceed length {len}"
        )));
    }
    Ok(end)
}

fn get_slice(data: &[u8], pos: usize, width: usize) -> Result<&[u8]> {
    let end = checked_end(data.len(), pos, width)?;
    Ok(&data[pos..end])
}

/// Sequential writer over a fixed-capacity destination buffer.
///
/// Capacity is the length of the slice handed to [`ByteCursor::new`]; there
/// is no resizing. A failed write leaves earlier writes in place, so callers
/// must discard the destination on error.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    dest: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(dest: &'a mut [u8]) -> Self {
        Self { dest, pos: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Copy `source` at the current position and advance, returning the new
    /// position. Fails with [`Error::BufferTooSmall`] if the destination
    /// cannot hold it.
    pub fn write(&mut self, source: &[u8]) -> Result<usize> {
        let needed = self.pos + source.len();
        if needed > self.dest.len() {
            return Err(Error::BufferTooSmall {
                needed,
                capacity: self.dest.len(),
            });
        }
        self.dest[self.pos..needed].copy_from_slice(source);
        self.pos = needed;
        Ok(self.pos)
    }
}
