//! PE (PE32/PE32+) header set and address translation.

use crate::coff::{verify_pe_signature, CoffHeader};
use crate::data_dir::{DataDirectory, DataDirectoryType};
use crate::limits::Limits;
use crate::optional::OptionalHeader;
use crate::reader::Reader;
use crate::section::{SectionHeader, SectionTable};
use crate::{Error, Result};

/// Size of IMAGE_NT_HEADERS32.
pub const NT_HEADERS32_SIZE: usize = 248;
/// Size of IMAGE_NT_HEADERS64, the largest secondary header.
pub const NT_HEADERS64_SIZE: usize = 264;

/// Decoded PE headers: COFF, optional header and section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeHeaders {
    /// Offset where the PE signature was found.
    pub pe_offset: u64,
    pub coff_header: CoffHeader,
    pub optional_header: OptionalHeader,
    pub sections: SectionTable,
}

impl PeHeaders {
    /// Read PE headers whose signature is at `pe_offset`.
    pub fn read_from<R: Reader>(reader: &R, pe_offset: u64, limits: &Limits) -> Result<Self> {
        verify_pe_signature(reader, pe_offset)?;

        let coff_offset = pe_offset + 4;
        let coff_header = CoffHeader::read_from(reader, coff_offset)?;

        let optional_offset = coff_offset + CoffHeader::SIZE as u64;
        let optional_header =
            OptionalHeader::read_from(reader, optional_offset, coff_header.size_of_optional_header)?;

        let table_offset = optional_offset + u64::from(coff_header.size_of_optional_header);
        let sections = SectionTable::read(
            reader,
            table_offset,
            optional_header.size_of_headers,
            limits,
        )
        .unwrap_or_else(|err| {
            log::debug!("section table unreadable: {err}");
            SectionTable::default()
        });

        Ok(Self {
            pe_offset,
            coff_header,
            optional_header,
            sections,
        })
    }

    pub fn is_64bit(&self) -> bool {
        self.optional_header.is_pe32plus()
    }

    pub fn is_dll(&self) -> bool {
        self.coff_header.is_dll()
    }

    pub fn entry_point(&self) -> u32 {
        self.optional_header.address_of_entry_point
    }

    pub fn image_base(&self) -> u64 {
        self.optional_header.image_base
    }

    pub fn data_directory(&self, dir: DataDirectoryType) -> DataDirectory {
        self.optional_header.data_directory(dir)
    }

    /// File offset for `size` bytes at `rva`.
    pub fn rva_to_offset(&self, rva: u32, size: u32) -> Option<u64> {
        self.sections.rva_to_offset(rva, size)
    }

    /// Read exactly `len` bytes at `rva`.
    pub fn read_rva<R: Reader>(&self, reader: &R, rva: u32, len: u32) -> Result<Vec<u8>> {
        let offset = self
            .rva_to_offset(rva, len)
            .ok_or_else(|| Error::out_of_range(rva.into(), self.optional_header.size_of_image.into()))?;
        reader.read_bytes_at(offset, len as usize)
    }

    /// Read at most `max` bytes at `rva`, stopping at the end of the
    /// containing section's raw data or of the file.
    pub fn read_rva_up_to<R: Reader>(&self, reader: &R, rva: u32, max: u32) -> Result<Vec<u8>> {
        let (offset, avail) = self
            .sections
            .raw_span_from(rva)
            .ok_or_else(|| Error::out_of_range(rva.into(), self.optional_header.size_of_image.into()))?;
        reader.read_up_to(offset, avail.min(max) as usize)
    }

    /// NUL-terminated 8-bit string at `rva`, at most `max` bytes long.
    pub fn read_rva_cstr<R: Reader>(&self, reader: &R, rva: u32, max: u32) -> Result<String> {
        let buf = self.read_rva_up_to(reader, rva, max)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Section holding the resource tree: the one containing the resource
    /// directory RVA, else one named ".rsrc".
    pub fn resource_section(&self) -> Option<&SectionHeader> {
        let dir = self.data_directory(DataDirectoryType::Resource);
        if dir.virtual_address != 0 {
            if let Some(section) = self
                .sections
                .as_slice()
                .iter()
                .find(|s| s.virtual_address == dir.virtual_address)
                .or_else(|| self.sections.containing(dir.virtual_address))
            {
                return Some(section);
            }
        }
        self.sections.by_name(".rsrc")
    }
}
