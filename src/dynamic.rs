//! ELF `PT_DYNAMIC` parsing.

use crate::elf::{ElfClass, ElfHeader, LoadSegments, ProgramHeader};
use crate::endian::ByteView;
use crate::limits::Limits;
use crate::reader::Reader;
use crate::symbol::StringTable;
use crate::{Error, Result};

/// Dynamic tags this parser keeps.
pub mod d_tag {
    pub const DT_NULL: u64 = 0;
    pub const DT_NEEDED: u64 = 1;
    pub const DT_STRTAB: u64 = 5;
    pub const DT_STRSZ: u64 = 10;
    pub const DT_SONAME: u64 = 14;
    pub const DT_RPATH: u64 = 15;
    pub const DT_RUNPATH: u64 = 29;
    pub const DT_FLAGS: u64 = 30;
    pub const DT_FLAGS_1: u64 = 0x6fff_fffb;
}

/// Bit names of `DT_FLAGS`.
pub const DT_FLAGS_NAMES: &[Option<&str>] = &[
    Some("ORIGIN"),
    Some("SYMBOLIC"),
    Some("TEXTREL"),
    Some("BIND_NOW"),
    Some("STATIC_TLS"),
];

/// Bit names of `DT_FLAGS_1`. Internal-use bits are unnamed.
pub const DT_FLAGS_1_NAMES: &[Option<&str>] = &[
    Some("Now"),
    Some("Global"),
    Some("Group"),
    Some("NoDelete"),
    Some("LoadFltr"),
    Some("InitFirst"),
    Some("NoOpen"),
    Some("Origin"),
    Some("Direct"),
    None,
    Some("Interpose"),
    Some("NoDefLib"),
    Some("NoDump"),
    Some("ConfAlt"),
    Some("EndFiltee"),
    Some("DispRelDNE"),
    Some("DispRelPND"),
    Some("NoDirect"),
    None,
    None,
    None,
    Some("Edited"),
    None,
    Some("SymIntpose"),
    Some("GlobAudit"),
    Some("Singleton"),
    Some("Stub"),
    Some("PIE"),
];

/// Values collected from one `PT_DYNAMIC` segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamicInfo {
    /// String-table offsets of every `DT_NEEDED`, in tag order.
    pub needed: Vec<u64>,
    pub flags: Option<u32>,
    pub flags_1: Option<u32>,
    pub strtab_addr: Option<u64>,
    pub strtab_size: Option<u64>,
    pub soname: Option<u64>,
    pub rpath: Option<u64>,
    pub runpath: Option<u64>,
    /// The `DT_STRTAB` buffer, present only if it was readable and
    /// NUL-bracketed.
    pub strtab: Option<StringTable>,
}

impl DynamicInfo {
    /// Decode (tag, value) pairs up to `DT_NULL` or the end of `data`.
    pub fn parse(v: ByteView<'_>, class: ElfClass) -> Result<Self> {
        let entsize = match class {
            ElfClass::Elf32 => 8,
            ElfClass::Elf64 => 16,
        };
        let mut info = Self::default();
        for i in 0..v.len() / entsize {
            let at = i * entsize;
            let (tag, val) = match class {
                ElfClass::Elf32 => (u64::from(v.u32_at(at)?), u64::from(v.u32_at(at + 4)?)),
                ElfClass::Elf64 => (v.u64_at(at)?, v.u64_at(at + 8)?),
            };
            match tag {
                d_tag::DT_NULL => break,
                d_tag::DT_NEEDED => info.needed.push(val),
                d_tag::DT_FLAGS => info.flags = Some(val as u32),
                d_tag::DT_FLAGS_1 => info.flags_1 = Some(val as u32),
                d_tag::DT_STRTAB => info.strtab_addr = Some(val),
                d_tag::DT_STRSZ => info.strtab_size = Some(val),
                d_tag::DT_SONAME => info.soname = Some(val),
                d_tag::DT_RPATH => info.rpath = Some(val),
                d_tag::DT_RUNPATH => info.runpath = Some(val),
                _ => log::trace!("dynamic tag {tag:#x} ignored"),
            }
        }
        Ok(info)
    }

    /// Read and decode `PT_DYNAMIC`, then load its string table through
    /// the `PT_LOAD` segments.
    pub fn read<R: Reader>(
        reader: &R,
        header: &ElfHeader,
        dynamic: &ProgramHeader,
        loads: &LoadSegments,
        limits: &Limits,
    ) -> Result<Self> {
        if dynamic.p_offset == 0 {
            return Err(Error::NotFound);
        }
        if dynamic.p_filesz > limits.max_elf_dynamic {
            return Err(Error::too_large("PT_DYNAMIC", dynamic.p_filesz, limits.max_elf_dynamic));
        }
        let buf = reader.read_bytes_at(dynamic.p_offset, dynamic.p_filesz as usize)?;
        let mut info = Self::parse(ByteView::new(&buf, header.endian), header.class)?;

        if let (Some(addr), Some(size)) = (info.strtab_addr, info.strtab_size) {
            if size < limits.max_elf_strtab {
                match loads.read_at_va(reader, addr, size as usize) {
                    Ok(data) => {
                        info.strtab = StringTable::new(data);
                        if info.strtab.is_none() {
                            log::debug!("DT_STRTAB is not NUL-bracketed");
                        }
                    }
                    Err(err) => log::debug!("DT_STRTAB at {addr:#x} unreadable: {err}"),
                }
            }
        }
        Ok(info)
    }

    fn string(&self, offset: Option<u64>) -> Option<String> {
        self.strtab.as_ref()?.get(offset?)
    }

    pub fn soname(&self) -> Option<String> {
        self.string(self.soname)
    }

    pub fn rpath(&self) -> Option<String> {
        self.string(self.rpath)
    }

    pub fn runpath(&self) -> Option<String> {
        self.string(self.runpath)
    }

    /// Names of needed libraries; empty without a trusted string table.
    pub fn needed_names(&self) -> Vec<String> {
        match &self.strtab {
            Some(strtab) => self.needed.iter().filter_map(|&off| strtab.get(off)).collect(),
            None => Vec::new(),
        }
    }

    /// Whether there is anything worth reporting.
    pub fn has_fields(&self) -> bool {
        let has_strings = self.strtab.as_ref().is_some_and(|t| !t.is_empty())
            && (!self.needed.is_empty()
                || self.soname.is_some()
                || self.rpath.is_some()
                || self.runpath.is_some());
        self.flags.is_some() || self.flags_1.is_some() || has_strings
    }
}
