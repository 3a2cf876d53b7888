//! ELF header, program header and section header structures, and the
//! program/section table walkers.

use crate::detect::ContainerFormat;
use crate::endian::{ByteView, Endian};
use crate::limits::Limits;
use crate::note::{self, NoteInfo};
use crate::reader::Reader;
use crate::{Error, Result};

/// "\x7FELF" read as a big-endian u32.
pub const ELF_MAGIC: u32 = 0x7F45_4C46;
/// Bytes of `e_ident` plus `e_type`, `e_machine` and `e_version`.
pub const PRIMARY_HEADER_SIZE: usize = 24;

/// `e_type` values.
pub mod e_type {
    pub const ET_NONE: u16 = 0;
    pub const ET_REL: u16 = 1;
    pub const ET_EXEC: u16 = 2;
    pub const ET_DYN: u16 = 3;
    pub const ET_CORE: u16 = 4;
    /// PlayStation 2 IOP relocatable executable.
    pub const ET_SCE_IOPRELEXEC: u16 = 0xFF80;
    pub const ET_SCE_IOPRELEXEC2: u16 = 0xFF81;
    /// Wii U RPX/RPL.
    pub const ET_CAFE_RPL: u16 = 0xFE01;
}

/// `e_machine` values that get special treatment.
pub mod e_machine {
    pub const EM_SPARC: u16 = 2;
    pub const EM_68K: u16 = 4;
    pub const EM_MIPS: u16 = 8;
    pub const EM_MIPS_RS3_LE: u16 = 10;
    pub const EM_PARISC: u16 = 15;
    pub const EM_SPARC32PLUS: u16 = 18;
    pub const EM_PPC: u16 = 20;
    pub const EM_ARM: u16 = 40;
    pub const EM_OLD_ALPHA: u16 = 41;
    pub const EM_SH: u16 = 42;
    pub const EM_SPARCV9: u16 = 43;
    pub const EM_RISCV: u16 = 243;
    pub const EM_ALPHA: u16 = 0x9026;
}

/// Program header types.
pub mod p_type {
    pub const PT_NULL: u32 = 0;
    pub const PT_LOAD: u32 = 1;
    pub const PT_DYNAMIC: u32 = 2;
    pub const PT_INTERP: u32 = 3;
    pub const PT_NOTE: u32 = 4;
}

/// Section header types.
pub mod sh_type {
    pub const SHT_SYMTAB: u32 = 2;
    pub const SHT_STRTAB: u32 = 3;
    pub const SHT_NOTE: u32 = 7;
    pub const SHT_DYNSYM: u32 = 11;
}

/// OS ABI of Wii U executables.
pub const ELFOSABI_CAFEOS: u8 = 0xCA;

/// File class (bitness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    pub fn ehdr_size(self) -> usize {
        match self {
            ElfClass::Elf32 => 52,
            ElfClass::Elf64 => 64,
        }
    }

    pub fn phdr_size(self) -> usize {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 56,
        }
    }

    pub fn shdr_size(self) -> usize {
        match self {
            ElfClass::Elf32 => 40,
            ElfClass::Elf64 => 64,
        }
    }

    pub fn sym_size(self) -> usize {
        match self {
            ElfClass::Elf32 => 16,
            ElfClass::Elf64 => 24,
        }
    }
}

/// Validate the 24-byte primary header and return class and byte order.
///
/// Only the four (class, data) pairs 1/2 x 1/2 are accepted.
pub fn parse_primary(data: &[u8]) -> Result<(ElfClass, Endian)> {
    if data.len() < PRIMARY_HEADER_SIZE {
        return Err(Error::buffer_too_small(PRIMARY_HEADER_SIZE, data.len()));
    }
    if ByteView::new(data, Endian::Big).u32_at(0)? != ELF_MAGIC {
        return Err(Error::InvalidSignature("ELF"));
    }
    let class = match data[4] {
        1 => ElfClass::Elf32,
        2 => ElfClass::Elf64,
        _ => return Err(Error::UnsupportedFormat),
    };
    let endian = match data[5] {
        1 => Endian::Little,
        2 => Endian::Big,
        _ => return Err(Error::UnsupportedFormat),
    };
    Ok((class, endian))
}

/// ELF file header, widened to the 64-bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub class: ElfClass,
    pub endian: Endian,
    pub ident_version: u8,
    pub osabi: u8,
    pub abi_version: u8,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl ElfHeader {
    /// Parse a complete header. The primary header decides how much of
    /// `data` is interpreted, so a 32-bit header is never read as 64-bit.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (class, endian) = parse_primary(data)?;
        let size = class.ehdr_size();
        if data.len() < size {
            return Err(Error::buffer_too_small(size, data.len()));
        }
        let v = ByteView::new(data, endian);

        let (e_entry, e_phoff, e_shoff, rest) = match class {
            ElfClass::Elf32 => (
                u64::from(v.u32_at(24)?),
                u64::from(v.u32_at(28)?),
                u64::from(v.u32_at(32)?),
                36,
            ),
            ElfClass::Elf64 => (v.u64_at(24)?, v.u64_at(32)?, v.u64_at(40)?, 48),
        };

        Ok(Self {
            class,
            endian,
            ident_version: data[6],
            osabi: data[7],
            abi_version: data[8],
            e_type: v.u16_at(16)?,
            e_machine: v.u16_at(18)?,
            e_version: v.u32_at(20)?,
            e_entry,
            e_phoff,
            e_shoff,
            e_flags: v.u32_at(rest)?,
            e_ehsize: v.u16_at(rest + 4)?,
            e_phentsize: v.u16_at(rest + 6)?,
            e_phnum: v.u16_at(rest + 8)?,
            e_shentsize: v.u16_at(rest + 10)?,
            e_shnum: v.u16_at(rest + 12)?,
            e_shstrndx: v.u16_at(rest + 14)?,
        })
    }

    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut primary = [0u8; PRIMARY_HEADER_SIZE];
        reader.read_exact_at(offset, &mut primary)?;
        let (class, _) = parse_primary(&primary)?;
        let buf = reader.read_bytes_at(offset, class.ehdr_size())?;
        Self::parse(&buf)
    }

    pub fn format(&self) -> ContainerFormat {
        match (self.class, self.endian) {
            (ElfClass::Elf32, Endian::Little) => ContainerFormat::Elf32Le,
            (ElfClass::Elf32, Endian::Big) => ContainerFormat::Elf32Be,
            (ElfClass::Elf64, Endian::Little) => ContainerFormat::Elf64Le,
            (ElfClass::Elf64, Endian::Big) => ContainerFormat::Elf64Be,
        }
    }

    /// Wii U RPX/RPL: Cafe OS ABI, 32-bit big-endian PowerPC.
    pub fn is_wiiu(&self) -> bool {
        self.osabi == ELFOSABI_CAFEOS
            && self.abi_version == 0xFE
            && self.class == ElfClass::Elf32
            && self.endian == Endian::Big
            && self.e_machine == e_machine::EM_PPC
    }
}

/// Program header, widened to the 64-bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl ProgramHeader {
    pub fn parse(v: ByteView<'_>, class: ElfClass) -> Result<Self> {
        Ok(match class {
            ElfClass::Elf32 => Self {
                p_type: v.u32_at(0)?,
                p_offset: u64::from(v.u32_at(4)?),
                p_vaddr: u64::from(v.u32_at(8)?),
                p_paddr: u64::from(v.u32_at(12)?),
                p_filesz: u64::from(v.u32_at(16)?),
                p_memsz: u64::from(v.u32_at(20)?),
                p_flags: v.u32_at(24)?,
                p_align: u64::from(v.u32_at(28)?),
            },
            ElfClass::Elf64 => Self {
                p_type: v.u32_at(0)?,
                p_flags: v.u32_at(4)?,
                p_offset: v.u64_at(8)?,
                p_vaddr: v.u64_at(16)?,
                p_paddr: v.u64_at(24)?,
                p_filesz: v.u64_at(32)?,
                p_memsz: v.u64_at(40)?,
                p_align: v.u64_at(48)?,
            },
        })
    }
}

/// Section header, widened to the 64-bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElfSectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl ElfSectionHeader {
    pub fn parse(v: ByteView<'_>, class: ElfClass) -> Result<Self> {
        Ok(match class {
            ElfClass::Elf32 => Self {
                sh_name: v.u32_at(0)?,
                sh_type: v.u32_at(4)?,
                sh_flags: u64::from(v.u32_at(8)?),
                sh_addr: u64::from(v.u32_at(12)?),
                sh_offset: u64::from(v.u32_at(16)?),
                sh_size: u64::from(v.u32_at(20)?),
                sh_link: v.u32_at(24)?,
                sh_info: v.u32_at(28)?,
                sh_addralign: u64::from(v.u32_at(32)?),
                sh_entsize: u64::from(v.u32_at(36)?),
            },
            ElfClass::Elf64 => Self {
                sh_name: v.u32_at(0)?,
                sh_type: v.u32_at(4)?,
                sh_flags: v.u64_at(8)?,
                sh_addr: v.u64_at(16)?,
                sh_offset: v.u64_at(24)?,
                sh_size: v.u64_at(32)?,
                sh_link: v.u32_at(40)?,
                sh_info: v.u32_at(44)?,
                sh_addralign: v.u64_at(48)?,
                sh_entsize: v.u64_at(56)?,
            },
        })
    }
}

/// Loadable segments kept sorted by virtual address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSegments {
    segments: Vec<ProgramHeader>,
}

impl LoadSegments {
    /// Append a PT_LOAD entry. An entry whose virtual address is below its
    /// predecessor's is dropped; returns whether it was kept.
    pub fn push(&mut self, phdr: ProgramHeader) -> bool {
        if let Some(last) = self.segments.last() {
            if phdr.p_vaddr < last.p_vaddr {
                return false;
            }
        }
        self.segments.push(phdr);
        true
    }

    pub fn as_slice(&self) -> &[ProgramHeader] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// File offset of `len` bytes at `vaddr`, if one segment's file image
    /// holds all of them.
    pub fn va_to_offset(&self, vaddr: u64, len: u64) -> Option<u64> {
        let idx = self.segments.partition_point(|s| s.p_vaddr <= vaddr);
        let seg = self.segments.get(idx.checked_sub(1)?)?;
        let end = vaddr.checked_add(len)?;
        let seg_end = seg.p_vaddr.checked_add(seg.p_filesz)?;
        if vaddr < seg.p_vaddr || end > seg_end {
            return None;
        }
        seg.p_offset.checked_add(vaddr - seg.p_vaddr)
    }

    /// Read `len` bytes at virtual address `vaddr`.
    pub fn read_at_va<R: Reader>(&self, reader: &R, vaddr: u64, len: usize) -> Result<Vec<u8>> {
        let offset = self
            .va_to_offset(vaddr, len as u64)
            .ok_or(Error::NotFound)?;
        reader.read_bytes_at(offset, len)
    }
}

/// Everything captured from one pass over the program headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInfo {
    pub loads: LoadSegments,
    pub dynamic: Option<ProgramHeader>,
    /// PT_INTERP was present (regardless of whether it was readable).
    pub has_interp: bool,
    pub interpreter: Option<String>,
    pub notes: NoteInfo,
}

impl ProgramInfo {
    /// Walk the program header table once.
    ///
    /// A short read ends the walk with whatever was decoded so far.
    pub fn read<R: Reader>(reader: &R, header: &ElfHeader, limits: &Limits) -> Result<Self> {
        let mut info = Self::default();
        if header.e_phoff == 0 || header.e_phnum == 0 {
            return Ok(info);
        }

        let entsize = header.class.phdr_size();
        let table = reader.read_up_to(header.e_phoff, usize::from(header.e_phnum) * entsize)?;
        for chunk in table.chunks_exact(entsize) {
            let phdr = ProgramHeader::parse(ByteView::new(chunk, header.endian), header.class)?;
            match phdr.p_type {
                p_type::PT_INTERP => {
                    info.has_interp = true;
                    info.interpreter = read_interpreter(reader, &phdr, limits);
                }
                p_type::PT_LOAD => {
                    if !info.loads.push(phdr) {
                        log::debug!(
                            "dropping out-of-order PT_LOAD at vaddr {:#x}",
                            phdr.p_vaddr
                        );
                    }
                }
                p_type::PT_DYNAMIC => info.dynamic = Some(phdr),
                p_type::PT_NOTE => {
                    read_note_block(reader, phdr.p_offset, phdr.p_filesz, header.endian, limits, &mut info.notes)
                }
                _ => {}
            }
        }
        Ok(info)
    }
}

fn read_interpreter<R: Reader>(reader: &R, phdr: &ProgramHeader, limits: &Limits) -> Option<String> {
    if phdr.p_filesz > limits.max_elf_interp {
        log::debug!("PT_INTERP of {} bytes ignored", phdr.p_filesz);
        return None;
    }
    let mut buf = match reader.read_bytes_at(phdr.p_offset, phdr.p_filesz as usize) {
        Ok(buf) => buf,
        Err(err) => {
            log::debug!("PT_INTERP unreadable: {err}");
            return None;
        }
    };
    while buf.last() == Some(&0) {
        buf.pop();
    }
    (!buf.is_empty()).then(|| String::from_utf8_lossy(&buf).into_owned())
}

pub(crate) fn read_note_block<R: Reader>(
    reader: &R,
    offset: u64,
    size: u64,
    endian: Endian,
    limits: &Limits,
    out: &mut NoteInfo,
) {
    if size < note::NOTE_HEADER_SIZE as u64 || size > limits.max_elf_note {
        log::trace!("note block of {size} bytes skipped");
        return;
    }
    match reader.read_bytes_at(offset, size as usize) {
        Ok(buf) => out.absorb(&buf, endian),
        Err(err) => log::debug!("note block at {offset:#x} unreadable: {err}"),
    }
}

/// Symbol table location taken from a SHT_SYMTAB/SHT_DYNSYM section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymtabLocation {
    pub offset: u64,
    pub size: u64,
    pub entsize: u64,
    /// Linked string table (offset, size), if `sh_link` resolved to one.
    pub strtab: Option<(u64, u64)>,
}

/// Everything captured from the section header table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionInfo {
    pub sections: Vec<ElfSectionHeader>,
    pub symtab: Option<SymtabLocation>,
    pub dynsym: Option<SymtabLocation>,
    pub notes: NoteInfo,
}

impl SectionInfo {
    /// Read all section headers, then resolve symbol tables and notes.
    pub fn read<R: Reader>(reader: &R, header: &ElfHeader, limits: &Limits) -> Result<Self> {
        let mut info = Self::default();
        if header.e_shoff == 0 || header.e_shnum == 0 {
            return Ok(info);
        }

        let entsize = header.class.shdr_size();
        let table = reader.read_up_to(header.e_shoff, usize::from(header.e_shnum) * entsize)?;
        info.sections = table
            .chunks_exact(entsize)
            .map(|chunk| ElfSectionHeader::parse(ByteView::new(chunk, header.endian), header.class))
            .collect::<Result<_>>()?;

        for shdr in &info.sections {
            match shdr.sh_type {
                sh_type::SHT_SYMTAB | sh_type::SHT_DYNSYM => {
                    let strtab = info
                        .sections
                        .get(shdr.sh_link as usize)
                        .filter(|s| s.sh_type == sh_type::SHT_STRTAB)
                        .map(|s| (s.sh_offset, s.sh_size));
                    let loc = SymtabLocation {
                        offset: shdr.sh_offset,
                        size: shdr.sh_size,
                        entsize: shdr.sh_entsize,
                        strtab,
                    };
                    if shdr.sh_type == sh_type::SHT_SYMTAB {
                        info.symtab = Some(loc);
                    } else {
                        info.dynsym = Some(loc);
                    }
                }
                sh_type::SHT_NOTE => read_note_block(
                    reader,
                    shdr.sh_offset,
                    shdr.sh_size,
                    header.endian,
                    limits,
                    &mut info.notes,
                ),
                _ => {}
            }
        }
        Ok(info)
    }
}
