//! DOS MZ header structures and parsing.

use crate::endian::ByteView;
use crate::reader::Reader;
use crate::{Error, Result};

/// DOS "MZ" signature.
pub const DOS_SIGNATURE: u16 = 0x5A4D; // "MZ"
/// Byte-swapped "ZM" signature accepted by old DOS loaders.
pub const DOS_SIGNATURE_ZM: u16 = 0x4D5A; // "ZM"

/// DOS header (IMAGE_DOS_HEADER).
///
/// Only the fields a loader actually consults are kept; the reserved
/// words are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosHeader {
    /// Magic number, "MZ" or "ZM".
    pub e_magic: u16,
    /// Bytes on last page of file.
    pub e_cblp: u16,
    /// Pages in file.
    pub e_cp: u16,
    /// Relocations.
    pub e_crlc: u16,
    /// Size of header in paragraphs.
    pub e_cparhdr: u16,
    /// Minimum extra paragraphs needed.
    pub e_minalloc: u16,
    /// Maximum extra paragraphs needed.
    pub e_maxalloc: u16,
    /// Initial (relative) SS value.
    pub e_ss: u16,
    /// Initial SP value.
    pub e_sp: u16,
    /// Checksum.
    pub e_csum: u16,
    /// Initial IP value.
    pub e_ip: u16,
    /// Initial (relative) CS value.
    pub e_cs: u16,
    /// File address of relocation table.
    pub e_lfarlc: u16,
    /// Overlay number.
    pub e_ovno: u16,
    /// OEM identifier.
    pub e_oemid: u16,
    /// OEM information.
    pub e_oeminfo: u16,
    /// File address of the secondary (NE/LE/PE) header.
    pub e_lfanew: u32,
}

/// Consistency warnings for a plain DOS image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MzWarning {
    /// The file is shorter than the image the header describes.
    ProgramImageTruncated,
    /// The file continues past the image the header describes.
    ExtraDataAfterEnd,
    /// SS:SP is 0000:0000.
    NoStack,
}

impl MzWarning {
    pub fn message(self) -> &'static str {
        match self {
            MzWarning::ProgramImageTruncated => "Program image truncated",
            MzWarning::ExtraDataAfterEnd => "Extra data after end of file",
            MzWarning::NoStack => "No stack",
        }
    }
}

impl DosHeader {
    /// Size of the DOS header in bytes.
    pub const SIZE: usize = 64;

    /// Parse a DOS header from a byte slice.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);

        let e_magic = v.u16_at(0)?;
        if e_magic != DOS_SIGNATURE && e_magic != DOS_SIGNATURE_ZM {
            return Err(Error::InvalidSignature("MZ"));
        }

        Ok(Self {
            e_magic,
            e_cblp: v.u16_at(2)?,
            e_cp: v.u16_at(4)?,
            e_crlc: v.u16_at(6)?,
            e_cparhdr: v.u16_at(8)?,
            e_minalloc: v.u16_at(10)?,
            e_maxalloc: v.u16_at(12)?,
            e_ss: v.u16_at(14)?,
            e_sp: v.u16_at(16)?,
            e_csum: v.u16_at(18)?,
            e_ip: v.u16_at(20)?,
            e_cs: v.u16_at(22)?,
            e_lfarlc: v.u16_at(24)?,
            e_ovno: v.u16_at(26)?,
            e_oemid: v.u16_at(36)?,
            e_oeminfo: v.u16_at(38)?,
            e_lfanew: v.u32_at(60)?,
        })
    }

    /// Parse a DOS header from a Reader at the given offset.
    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf)
    }

    /// The magic is the byte-swapped "ZM" form.
    pub fn is_zm(&self) -> bool {
        self.e_magic == DOS_SIGNATURE_ZM
    }

    /// Whether this header can only describe a plain DOS program.
    ///
    /// A relocation table below 0x40 leaves no room for `e_lfanew`, and
    /// "ZM" images predate secondary headers. EFI stubs zero the whole
    /// header apart from `e_lfanew`, so that pattern is let through.
    pub fn is_dos_only(&self) -> bool {
        if self.is_zm() {
            return true;
        }
        if self.e_lfarlc >= 0x40 {
            return false;
        }
        let efi_stub = self.e_lfarlc == 0
            && self.e_cp == 0
            && self.e_cs == 0
            && self.e_ip == 0
            && self.e_ss == 0
            && self.e_sp == 0;
        !efi_stub
    }

    /// Header size in bytes.
    pub fn header_size(&self) -> u32 {
        u32::from(self.e_cparhdr) * 16
    }

    /// Load-module size in bytes, as the DOS loader computes it.
    pub fn program_size(&self) -> u32 {
        (u32::from(self.e_cp) * 512).saturating_sub(self.header_size())
    }

    /// Image size described by `e_cp`/`e_cblp`.
    pub fn image_size(&self) -> u64 {
        let pages = i64::from(self.e_cp) * 512;
        let size = if self.e_cblp != 0 {
            pages - (512 - i64::from(self.e_cblp))
        } else {
            pages
        };
        size.max(0) as u64
    }

    /// `Some((min, max))` memory requirements in bytes, with `None` for
    /// max meaning "all available". `None` overall means load-high.
    pub fn memory_bounds(&self) -> Option<(u32, Option<u32>)> {
        if self.e_maxalloc == 0 {
            return None;
        }
        let min = u32::from(self.e_minalloc) * 16;
        let max = (self.e_maxalloc != 0xFFFF).then(|| u32::from(self.e_maxalloc) * 16);
        Some((min, max))
    }

    /// File-size consistency check for plain DOS images.
    ///
    /// Only meaningful when `e_cblp` is out of its 0..=511 range, which is
    /// when the page counts stop agreeing with the file.
    pub fn size_warning(&self, file_size: u64) -> Option<MzWarning> {
        if self.e_cblp <= 511 {
            return None;
        }
        let image_size = self.image_size();
        if file_size < image_size {
            Some(MzWarning::ProgramImageTruncated)
        } else if file_size > image_size {
            Some(MzWarning::ExtraDataAfterEnd)
        } else {
            None
        }
    }

    pub fn has_stack(&self) -> bool {
        self.e_ss != 0 || self.e_sp != 0
    }
}
