//! PE section header structures and the section table walker.

use crate::endian::ByteView;
use crate::limits::Limits;
use crate::reader::Reader;
use crate::{Error, Result};

/// Section characteristics flags.
pub mod characteristics {
    pub const CODE: u32 = 0x0000_0020;
    pub const INITIALIZED_DATA: u32 = 0x0000_0040;
    pub const UNINITIALIZED_DATA: u32 = 0x0000_0080;
    pub const SHARED: u32 = 0x1000_0000;
    pub const EXECUTE: u32 = 0x2000_0000;
    pub const READ: u32 = 0x4000_0000;
    pub const WRITE: u32 = 0x8000_0000;
}

/// Section header (IMAGE_SECTION_HEADER).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionHeader {
    /// Section name (8-byte NUL-padded ASCII).
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    /// Size of a section header in bytes.
    pub const SIZE: usize = 40;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        let mut name = [0u8; 8];
        name.copy_from_slice(&data[0..8]);

        Ok(Self {
            name,
            virtual_size: v.u32_at(8)?,
            virtual_address: v.u32_at(12)?,
            size_of_raw_data: v.u32_at(16)?,
            pointer_to_raw_data: v.u32_at(20)?,
            characteristics: v.u32_at(36)?,
        })
    }

    /// Section name, trimmed at the first NUL.
    pub fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & characteristics::EXECUTE != 0
    }

    /// File offset for `size` bytes at `rva`, if they lie in this
    /// section's raw data.
    pub fn rva_to_offset(&self, rva: u32, size: u32) -> Option<u64> {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size_of_raw_data);
        let rva = u64::from(rva);
        if rva < start || rva + u64::from(size) > end {
            return None;
        }
        Some(u64::from(self.pointer_to_raw_data) + (rva - start))
    }

    /// File offset of `rva` and the raw bytes left in this section from it.
    pub fn raw_span_from(&self, rva: u32) -> Option<(u64, u32)> {
        let end = u64::from(self.virtual_address) + u64::from(self.size_of_raw_data);
        if rva < self.virtual_address || u64::from(rva) >= end {
            return None;
        }
        let delta = rva - self.virtual_address;
        Some((
            u64::from(self.pointer_to_raw_data) + u64::from(delta),
            self.size_of_raw_data - delta,
        ))
    }
}

/// Validated PE section table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable {
    sections: Vec<SectionHeader>,
}

impl SectionTable {
    /// Walk the section table that starts at `table_offset`.
    ///
    /// The entry count comes from the space between the table and
    /// `SizeOfHeaders`, capped by `limits.max_pe_sections`. The walk stops
    /// at the first entry with an empty name or raw data beyond the end
    /// of the file; a short read truncates instead of failing.
    pub fn read<R: Reader>(
        reader: &R,
        table_offset: u64,
        size_of_headers: u32,
        limits: &Limits,
    ) -> Result<Self> {
        let span = u64::from(size_of_headers).saturating_sub(table_offset);
        let count = ((span / SectionHeader::SIZE as u64) as usize).min(limits.max_pe_sections);
        if count == 0 {
            log::debug!("no room for section headers before SizeOfHeaders {size_of_headers:#x}");
            return Ok(Self::default());
        }

        let buf = reader.read_up_to(table_offset, count * SectionHeader::SIZE)?;
        let file_size = reader.size();
        let mut sections = Vec::with_capacity(buf.len() / SectionHeader::SIZE);
        for chunk in buf.chunks_exact(SectionHeader::SIZE) {
            let section = SectionHeader::parse(chunk)?;
            if section.name[0] == 0 {
                break;
            }
            if file_size.is_some_and(|size| u64::from(section.pointer_to_raw_data) > size) {
                log::debug!(
                    "section {} raw data at {:#x} is past end of file",
                    section.name_str(),
                    section.pointer_to_raw_data
                );
                break;
            }
            sections.push(section);
        }
        Ok(Self { sections })
    }

    pub fn from_sections(sections: Vec<SectionHeader>) -> Self {
        Self { sections }
    }

    pub fn as_slice(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name_str() == name)
    }

    /// Section whose virtual range contains `rva`.
    pub fn containing(&self, rva: u32) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| {
            let len = s.virtual_size.max(s.size_of_raw_data);
            rva >= s.virtual_address && u64::from(rva) < u64::from(s.virtual_address) + u64::from(len)
        })
    }

    /// File offset of `size` bytes at `rva`, if a single section's raw
    /// data covers them.
    pub fn rva_to_offset(&self, rva: u32, size: u32) -> Option<u64> {
        self.sections.iter().find_map(|s| s.rva_to_offset(rva, size))
    }

    pub fn raw_span_from(&self, rva: u32) -> Option<(u64, u32)> {
        self.sections.iter().find_map(|s| s.raw_span_from(rva))
    }
}
