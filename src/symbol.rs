//! ELF string tables and symbol tables.

use crate::elf::{ElfClass, SymtabLocation};
use crate::endian::{ByteView, Endian};
use crate::limits::Limits;
use crate::reader::Reader;
use crate::Result;

/// A string table whose first and last bytes are NUL, so every in-range
/// offset names a terminated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    data: Vec<u8>,
}

impl StringTable {
    /// Accept `data` only if it is bracketed by NUL bytes.
    pub fn new(data: Vec<u8>) -> Option<Self> {
        match (data.first(), data.last()) {
            (Some(0), Some(0)) => Some(Self { data }),
            _ => None,
        }
    }

    /// Read a section-linked string table from the file.
    pub fn read_from<R: Reader>(reader: &R, offset: u64, size: u64, limits: &Limits) -> Option<Self> {
        if size == 0 || size > limits.max_elf_strtab {
            return None;
        }
        match reader.read_bytes_at(offset, size as usize) {
            Ok(data) => Self::new(data),
            Err(err) => {
                log::debug!("string table at {offset:#x} unreadable: {err}");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// String at `offset`, or `None` when the offset is out of range.
    pub fn get(&self, offset: u64) -> Option<String> {
        let rest = self.data.get(usize::try_from(offset).ok()?..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        Some(String::from_utf8_lossy(&rest[..end]).into_owned())
    }
}

pub const SHN_UNDEF: u16 = 0;
pub const SHN_ABS: u16 = 0xFFF1;
pub const SHN_COMMON: u16 = 0xFFF2;

/// One raw symbol table entry, widened to the 64-bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElfSymbol {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl ElfSymbol {
    pub fn parse(v: ByteView<'_>, class: ElfClass) -> Result<Self> {
        Ok(match class {
            ElfClass::Elf32 => Self {
                st_name: v.u32_at(0)?,
                st_value: u64::from(v.u32_at(4)?),
                st_size: u64::from(v.u32_at(8)?),
                st_info: v.u8_at(12)?,
                st_other: v.u8_at(13)?,
                st_shndx: v.u16_at(14)?,
            },
            ElfClass::Elf64 => Self {
                st_name: v.u32_at(0)?,
                st_info: v.u8_at(4)?,
                st_other: v.u8_at(5)?,
                st_shndx: v.u16_at(6)?,
                st_value: v.u64_at(8)?,
                st_size: v.u64_at(16)?,
            },
        })
    }

    pub fn binding(&self) -> u8 {
        self.st_info >> 4
    }

    pub fn sym_type(&self) -> u8 {
        self.st_info & 0xF
    }

    pub fn visibility(&self) -> u8 {
        self.st_other & 3
    }
}

const BINDINGS: [&str; 16] = [
    "LOCAL", "GLOBAL", "WEAK", "3", "4", "5", "6", "7", "8", "9", "GNU_UNIQUE", "LOOS+1",
    "LOOS+2", "LOPROC+0", "LOPROC+1", "LOPROC+2",
];

const TYPES: [&str; 16] = [
    "NOTYPE", "OBJECT", "FUNC", "SECTION", "FILE", "COMMON", "TLS", "7", "8", "9", "GNU_IFUNC",
    "LOOS+1", "LOOS+2", "LOPROC+0", "LOPROC+1", "LOPROC+2",
];

const VISIBILITIES: [&str; 4] = ["DEFAULT", "INTERNAL", "HIDDEN", "PROTECTED"];

pub fn binding_name(binding: u8) -> &'static str {
    BINDINGS[usize::from(binding & 0xF)]
}

pub fn type_name(sym_type: u8) -> &'static str {
    TYPES[usize::from(sym_type & 0xF)]
}

pub fn visibility_name(visibility: u8) -> &'static str {
    VISIBILITIES[usize::from(visibility & 3)]
}

pub fn section_name(shndx: u16) -> String {
    match shndx {
        SHN_UNDEF => "(Undefined)".to_string(),
        SHN_ABS => "(Absolute)".to_string(),
        SHN_COMMON => "(COMMON)".to_string(),
        n => n.to_string(),
    }
}

/// A symbol with its name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub raw: ElfSymbol,
}

impl Symbol {
    pub const COLUMNS: [&'static str; 7] =
        ["Name", "Binding", "Type", "Visibility", "Section", "Value", "Size"];

    /// Display row in [`Symbol::COLUMNS`] order.
    pub fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            binding_name(self.raw.binding()).to_string(),
            type_name(self.raw.sym_type()).to_string(),
            visibility_name(self.raw.visibility()).to_string(),
            section_name(self.raw.st_shndx),
            format!("0x{:08X}", self.raw.st_value),
            format!("0x{:08X}", self.raw.st_size),
        ]
    }
}

/// Read the raw entries of a symbol table section.
///
/// Tables that are empty, over the size ceiling, have an entry size
/// smaller than the class's symbol record, or cannot be read in full
/// yield no entries.
pub fn read_symbols<R: Reader>(
    reader: &R,
    loc: &SymtabLocation,
    class: ElfClass,
    endian: Endian,
    limits: &Limits,
) -> Vec<ElfSymbol> {
    if loc.size == 0 || loc.size > limits.max_elf_symtab {
        log::debug!("symbol table of {} bytes skipped", loc.size);
        return Vec::new();
    }
    if loc.entsize < class.sym_size() as u64 {
        log::debug!("symbol entry size {} too small", loc.entsize);
        return Vec::new();
    }
    let entsize = loc.entsize as usize;
    let len = (loc.size / loc.entsize) as usize * entsize;
    let buf = match reader.read_bytes_at(loc.offset, len) {
        Ok(buf) => buf,
        Err(err) => {
            log::debug!("symbol table at {:#x} unreadable: {err}", loc.offset);
            return Vec::new();
        }
    };
    buf.chunks_exact(entsize)
        .filter_map(|chunk| ElfSymbol::parse(ByteView::new(chunk, endian), class).ok())
        .collect()
}

/// Attach names to `raw` entries, dropping entries whose name offset is
/// out of range or names the empty string, and sort by name.
pub fn resolve_symbols(raw: &[ElfSymbol], strtab: &StringTable) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = raw
        .iter()
        .filter_map(|sym| {
            let name = strtab.get(u64::from(sym.st_name))?;
            if name.is_empty() {
                return None;
            }
            Some(Symbol { name, raw: *sym })
        })
        .collect();
    symbols.sort_by(|a, b| a.name.cmp(&b.name));
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SliceReader;

    #[test]
    fn test_string_table_requires_nul_brackets() {
        assert!(StringTable::new(b"\0libc.so.6\0".to_vec()).is_some());
        assert!(StringTable::new(b"\0libc.so.6".to_vec()).is_none());
        assert!(StringTable::new(b"x\0".to_vec()).is_none());
        assert!(StringTable::new(Vec::new()).is_none());
    }

    #[test]
    fn test_string_table_get() {
        let t = StringTable::new(b"\0foo\0bar\0".to_vec()).unwrap();
        assert_eq!(t.get(1).as_deref(), Some("foo"));
        assert_eq!(t.get(5).as_deref(), Some("bar"));
        assert_eq!(t.get(0).as_deref(), Some(""));
        assert_eq!(t.get(9), None);
        assert_eq!(t.get(u64::MAX), None);
    }

    fn sym32(name: u32, info: u8, other: u8, shndx: u16, value: u32, size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&name.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.push(info);
        out.push(other);
        out.extend_from_slice(&shndx.to_le_bytes());
        out
    }

    #[test]
    fn test_read_and_resolve() {
        let mut table = sym32(0, 0, 0, 0, 0, 0);
        table.extend(sym32(5, 0x12, 0, 7, 0x1000, 0x20));
        table.extend(sym32(1, 0x11, 2, SHN_ABS, 0x2000, 4));
        table.extend(sym32(99, 0x12, 0, 1, 0, 0));
        let reader = SliceReader::new(&table);
        let loc = SymtabLocation {
            offset: 0,
            size: table.len() as u64,
            entsize: 16,
            strtab: None,
        };
        let raw = read_symbols(&reader, &loc, ElfClass::Elf32, Endian::Little, &Limits::default());
        assert_eq!(raw.len(), 4);

        let strtab = StringTable::new(b"\0zed\0main\0".to_vec()).unwrap();
        let syms = resolve_symbols(&raw, &strtab);
        let names: Vec<&str> = syms.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["main", "zed"]);
        assert_eq!(
            syms[0].row(),
            vec!["main", "GLOBAL", "FUNC", "DEFAULT", "7", "0x00001000", "0x00000020"]
        );
        assert_eq!(
            syms[1].row(),
            vec!["zed", "GLOBAL", "OBJECT", "HIDDEN", "(Absolute)", "0x00002000", "0x00000004"]
        );
    }

    #[test]
    fn test_read_rejects_small_entsize() {
        let data = vec![0u8; 64];
        let reader = SliceReader::new(&data);
        let loc = SymtabLocation { offset: 0, size: 64, entsize: 16, strtab: None };
        let limits = Limits::default();
        assert!(read_symbols(&reader, &loc, ElfClass::Elf64, Endian::Little, &limits).is_empty());
        assert_eq!(
            read_symbols(&reader, &loc, ElfClass::Elf32, Endian::Little, &limits).len(),
            4
        );
    }

    #[test]
    fn test_name_tables() {
        assert_eq!(binding_name(10), "GNU_UNIQUE");
        assert_eq!(type_name(10), "GNU_IFUNC");
        assert_eq!(type_name(15), "LOPROC+2");
        assert_eq!(section_name(SHN_UNDEF), "(Undefined)");
        assert_eq!(section_name(SHN_COMMON), "(COMMON)");
    }
}
