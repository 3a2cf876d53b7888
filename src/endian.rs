//! Byte-order and alignment helpers, and a bounds-checked view over a
//! byte buffer.

use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Stored byte order of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running host.
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn is_host(self) -> bool {
        self == Self::host()
    }

    pub fn name(self) -> &'static str {
        match self {
            Endian::Little => "Little-Endian",
            Endian::Big => "Big-Endian",
        }
    }

    #[inline]
    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        }
    }

    #[inline]
    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    #[inline]
    fn u64(self, b: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        }
    }
}

/// Align a value up to the given power-of-two alignment.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.saturating_add(alignment - 1) & !(alignment - 1)
}

#[inline]
pub fn align2(value: usize) -> usize {
    align_up(value as u64, 2) as usize
}

#[inline]
pub fn align4(value: usize) -> usize {
    align_up(value as u64, 4) as usize
}

/// A byte buffer paired with the byte order its integers are stored in.
///
/// Every accessor checks `offset + width` against the buffer, so decoding
/// attacker-controlled offsets can fail but never panic.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub fn le(data: &'a [u8]) -> Self {
        Self::new(data, Endian::Little)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Borrow `len` bytes at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or(Error::out_of_range(offset as u64, self.data.len() as u64))?;
        self.data
            .get(offset..end)
            .ok_or(Error::out_of_range(end as u64, self.data.len() as u64))
    }

    /// A sub-view of `len` bytes at `offset` with the same byte order.
    pub fn sub(&self, offset: usize, len: usize) -> Result<ByteView<'a>> {
        Ok(ByteView::new(self.slice(offset, len)?, self.endian))
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        Ok(self.endian.u16(self.slice(offset, 2)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        Ok(self.endian.u32(self.slice(offset, 4)?))
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64> {
        Ok(self.endian.u64(self.slice(offset, 8)?))
    }

    /// Bytes from `offset` up to (not including) the next NUL.
    /// Fails if no terminator exists before the end of the buffer.
    pub fn cstr_at(&self, offset: usize) -> Result<&'a [u8]> {
        let rest = self
            .data
            .get(offset..)
            .ok_or(Error::out_of_range(offset as u64, self.data.len() as u64))?;
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::Corrupt("unterminated string"))?;
        Ok(&rest[..end])
    }
}
