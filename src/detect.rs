//! Container format detection.
//!
//! Detection never fails on content: anything unrecognised is reported as
//! [`ContainerFormat::Unknown`]. Only reader failures surface as errors.

use crate::dos::{DosHeader, DOS_SIGNATURE, DOS_SIGNATURE_ZM};
use crate::elf::{self, ElfClass, ELF_MAGIC};
use crate::endian::{ByteView, Endian};
use crate::optional::{PE32PLUS_MAGIC, PE32_MAGIC};
use crate::pe::NT_HEADERS64_SIZE;
use crate::reader::Reader;
use crate::{Error, Result};

/// File offset of the NE header in a COM/NE hybrid.
pub const COM_NE_OFFSET: u64 = 0x1190;

/// Executable container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Plain DOS program, or an MZ stub whose secondary header is unusable.
    Mz,
    Ne,
    /// COM stub that jumps over an embedded NE image.
    ComNe,
    Le,
    Lx,
    /// Windows/386 kernel container.
    W3,
    Pe32,
    Pe64,
    Elf32Le,
    Elf32Be,
    Elf64Le,
    Elf64Be,
    Unknown,
}

impl ContainerFormat {
    /// Native word size, if known.
    pub fn bits(self) -> Option<u32> {
        match self {
            Self::Mz | Self::Ne | Self::ComNe => Some(16),
            Self::Le | Self::Lx | Self::W3 | Self::Pe32 | Self::Elf32Le | Self::Elf32Be => {
                Some(32)
            }
            Self::Pe64 | Self::Elf64Le | Self::Elf64Be => Some(64),
            Self::Unknown => None,
        }
    }

    /// Byte order of the container's headers.
    ///
    /// LE/LX headers carry their own byte-order flag; the container-level
    /// answer for them is little-endian.
    pub fn endian(self) -> Option<Endian> {
        match self {
            Self::Elf32Be | Self::Elf64Be => Some(Endian::Big),
            Self::Unknown => None,
            _ => Some(Endian::Little),
        }
    }

    /// Starts with a DOS header (or, for COM/NE, a DOS program).
    pub fn is_mz_family(self) -> bool {
        matches!(
            self,
            Self::Mz | Self::Ne | Self::ComNe | Self::Le | Self::Lx | Self::W3 | Self::Pe32 | Self::Pe64
        )
    }

    pub fn is_elf(self) -> bool {
        matches!(
            self,
            Self::Elf32Le | Self::Elf32Be | Self::Elf64Le | Self::Elf64Be
        )
    }

    pub fn is_pe(self) -> bool {
        matches!(self, Self::Pe32 | Self::Pe64)
    }

    /// Uses the NE header layout.
    pub fn is_ne(self) -> bool {
        matches!(self, Self::Ne | Self::ComNe)
    }

    /// Uses the LE/LX header layout.
    pub fn is_le(self) -> bool {
        matches!(self, Self::Le | Self::Lx | Self::W3)
    }
}

/// Outcome of detection, with what was learned on the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Detection {
    pub format: ContainerFormat,
    /// DOS header, for MZ-family formats that have one.
    pub dos: Option<DosHeader>,
    /// Offset of the NE/LE/PE header.
    pub secondary_offset: u64,
}

impl Detection {
    fn unknown() -> Self {
        Self::bare(ContainerFormat::Unknown)
    }

    fn bare(format: ContainerFormat) -> Self {
        Self {
            format,
            dos: None,
            secondary_offset: 0,
        }
    }
}

/// Identify the container format of `reader`.
pub fn detect<R: Reader>(reader: &R) -> Result<ContainerFormat> {
    Ok(detect_full(reader)?.format)
}

pub(crate) fn detect_full<R: Reader>(reader: &R) -> Result<Detection> {
    let head = reader.read_up_to(0, DosHeader::SIZE)?;
    if head.len() < 2 {
        return Ok(Detection::unknown());
    }

    if head.len() >= 4 && ByteView::new(&head, Endian::Big).u32_at(0)? == ELF_MAGIC {
        return Ok(detect_elf(&head));
    }

    let magic = u16::from_le_bytes([head[0], head[1]]);
    if magic == DOS_SIGNATURE || magic == DOS_SIGNATURE_ZM {
        return detect_mz(reader, &head);
    }

    if com_ne_jump(reader, &head) {
        let mut sig = [0u8; 2];
        if reader.read_at(COM_NE_OFFSET, &mut sig)? == 2 && &sig == b"NE" {
            return Ok(Detection {
                format: ContainerFormat::ComNe,
                dos: None,
                secondary_offset: COM_NE_OFFSET,
            });
        }
    }
    Ok(Detection::unknown())
}

fn detect_elf(head: &[u8]) -> Detection {
    let format = match elf::parse_primary(head) {
        Ok((ElfClass::Elf32, Endian::Little)) => ContainerFormat::Elf32Le,
        Ok((ElfClass::Elf32, Endian::Big)) => ContainerFormat::Elf32Be,
        Ok((ElfClass::Elf64, Endian::Little)) => ContainerFormat::Elf64Le,
        Ok((ElfClass::Elf64, Endian::Big)) => ContainerFormat::Elf64Be,
        Err(err) => {
            log::debug!("ELF magic with unusable primary header: {err}");
            ContainerFormat::Unknown
        }
    };
    Detection::bare(format)
}

fn detect_mz<R: Reader>(reader: &R, head: &[u8]) -> Result<Detection> {
    let dos = match DosHeader::parse(head) {
        Ok(dos) => dos,
        Err(err) => {
            log::debug!("MZ magic without a full DOS header: {err}");
            return Ok(Detection::unknown());
        }
    };
    let mut detection = Detection {
        format: ContainerFormat::Mz,
        dos: Some(dos),
        secondary_offset: 0,
    };
    if dos.is_dos_only() {
        return Ok(detection);
    }

    let hdr_addr = u64::from(dos.e_lfanew);
    let too_far = reader
        .size()
        .is_some_and(|size| hdr_addr >= size.saturating_sub(NT_HEADERS64_SIZE as u64));
    if hdr_addr < DosHeader::SIZE as u64 || too_far {
        log::warn!("e_lfanew {hdr_addr:#x} out of range, treating as MZ only");
        return Ok(detection);
    }

    // PE signature, COFF header and the optional header magic.
    let mut sig = [0u8; 26];
    match reader.read_exact_at(hdr_addr, &mut sig) {
        Ok(()) => {}
        Err(Error::BufferTooSmall { .. }) => {
            log::debug!("secondary header at {hdr_addr:#x} truncated");
            return Ok(Detection::unknown());
        }
        Err(err) => return Err(err),
    }

    detection.secondary_offset = hdr_addr;
    detection.format = match &sig[..4] {
        b"PE\0\0" => match u16::from_le_bytes([sig[24], sig[25]]) {
            PE32_MAGIC => ContainerFormat::Pe32,
            PE32PLUS_MAGIC => ContainerFormat::Pe64,
            other => {
                log::debug!("PE optional header magic {other:#06x} rejected");
                return Ok(Detection::unknown());
            }
        },
        [b'N', b'E', ..] => ContainerFormat::Ne,
        [b'L', b'E', ..] => ContainerFormat::Le,
        [b'L', b'X', ..] => ContainerFormat::Lx,
        [b'W', b'3', ..] => ContainerFormat::W3,
        _ => {
            log::debug!("no secondary signature at {hdr_addr:#x}");
            detection.secondary_offset = 0;
            ContainerFormat::Mz
        }
    };
    Ok(detection)
}

/// A COM program starting with a short or near jump whose target lies
/// inside the file.
fn com_ne_jump<R: Reader>(reader: &R, head: &[u8]) -> bool {
    let target = match head {
        [0xEB, rel, ..] => 2 + i64::from(*rel as i8),
        [0xE9, lo, hi, ..] => 3 + i64::from(i16::from_le_bytes([*lo, *hi])),
        _ => return false,
    };
    let Some(size) = reader.size() else {
        return false;
    };
    target >= 0 && (target as u64) < size && size > COM_NE_OFFSET
}
