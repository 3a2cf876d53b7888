//! NE module references and relocation-based imports.

use std::collections::HashSet;

use crate::import::{ImportCollector, ImportEntry, ImportSymbol};
use crate::limits::Limits;
use crate::ne::{NeHeader, NeSegment};
use crate::reader::Reader;
use crate::runtime::{ne_runtime_dll, NeModuleScan};
use crate::{Error, Result};

const RELOC_SIZE: usize = 8;
const RELOC_TARGET_MASK: u8 = 0x03;
const RELOC_IMPORTED_ORDINAL: u8 = 1;
const RELOC_IMPORTED_NAME: u8 = 2;

/// Module reference table and the imported-names table it indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTable {
    /// Offsets into `names`, one per module reference.
    refs: Vec<u16>,
    names: Vec<u8>,
}

impl ModuleTable {
    /// Read both tables as one span.
    ///
    /// The imported-names table has no declared size. When it precedes the
    /// entry table its size is the gap between them; otherwise it is
    /// estimated from the module count (8.3 names, counted).
    pub fn read<R: Reader>(
        reader: &R,
        ne_offset: u64,
        header: &NeHeader,
        limits: &Limits,
    ) -> Result<Self> {
        let mod_refs = u32::from(header.mod_refs);
        if mod_refs == 0 {
            return Err(Error::NotFound);
        }
        let modref = u32::from(header.mod_ref_table);
        let import = u32::from(header.import_name_table);

        let (low, names_size, read_size) = if modref < import {
            let names_size = if header.entry_table_offset > header.import_name_table {
                u32::from(header.entry_table_offset) - import
            } else {
                9 * (mod_refs + 2) + 256
            };
            (modref, names_size, (import - modref) + names_size)
        } else {
            let names_size = modref - import;
            (import, names_size, names_size + mod_refs * 2)
        };
        if read_size > limits.max_ne_name_tables {
            return Err(Error::too_large(
                "NE module tables",
                read_size.into(),
                limits.max_ne_name_tables.into(),
            ));
        }

        let buf = reader.read_bytes_at(ne_offset + u64::from(low), read_size as usize)?;
        let (refs_at, names_at) = if modref < import {
            (0, (import - modref) as usize)
        } else {
            ((modref - import) as usize, 0)
        };
        let refs_end = refs_at + mod_refs as usize * 2;
        let refs = buf
            .get(refs_at..refs_end)
            .ok_or(Error::Corrupt("NE module reference table"))?
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let names = buf[names_at..names_at + names_size as usize].to_vec();
        Ok(Self { refs, names })
    }

    /// Counted string at `offset` in the imported-names table.
    pub fn imported_name(&self, offset: u16) -> Option<&[u8]> {
        let offset = usize::from(offset);
        let len = usize::from(*self.names.get(offset)?);
        self.names.get(offset + 1..offset + 1 + len)
    }

    /// Module names in reference order; stops at the first reference
    /// outside the names table.
    pub fn modules(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.refs
            .iter()
            .map_while(move |&offset| self.imported_name(offset))
    }

    /// Module name for a 1-based module index.
    pub fn module(&self, index: u16) -> Option<String> {
        let offset = *self.refs.get(usize::from(index).checked_sub(1)?)?;
        self.imported_name(offset)
            .map(|name| String::from_utf8_lossy(name).into_owned())
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Scan module references for KERNEL and a runtime DLL.
///
/// I/O and bounds failures assume KERNEL is present, since nearly every
/// NE image in the wild is a Windows one.
pub fn scan_modules<R: Reader>(
    reader: &R,
    ne_offset: u64,
    header: &NeHeader,
    limits: &Limits,
) -> NeModuleScan {
    match ModuleTable::read(reader, ne_offset, header, limits) {
        Ok(table) => ne_runtime_dll(table.modules()),
        Err(err) => {
            log::debug!("NE module tables unavailable: {err}");
            NeModuleScan {
                has_kernel: true,
                runtime: None,
            }
        }
    }
}

/// Decode relocation records into imports, stopping once `out` is full.
pub fn parse_relocations(records: &[u8], modules: &ModuleTable, out: &mut ImportCollector) {
    for rec in records.chunks_exact(RELOC_SIZE) {
        if !out.take_record() {
            log::debug!("relocation walk stopped after {} imports", out.len());
            return;
        }
        let module_index = u16::from_le_bytes([rec[4], rec[5]]);
        let value = u16::from_le_bytes([rec[6], rec[7]]);
        let symbol = match rec[1] & RELOC_TARGET_MASK {
            RELOC_IMPORTED_ORDINAL => ImportSymbol::Ordinal(value),
            RELOC_IMPORTED_NAME => match modules.imported_name(value) {
                Some(name) => ImportSymbol::Name(String::from_utf8_lossy(name).into_owned()),
                None => {
                    log::trace!("imported name offset {value:#x} out of range");
                    continue;
                }
            },
            _ => continue,
        };
        let Some(module) = modules.module(module_index) else {
            log::trace!("relocation references module {module_index}");
            continue;
        };
        if !out.insert(ImportEntry {
            module,
            symbol,
            hint: None,
        }) {
            log::debug!("import ceiling reached");
            return;
        }
    }
}

/// Imports gathered from every segment's relocation records, deduplicated
/// and sorted by (module, symbol).
///
/// Segments sharing a relocation block are walked once.
pub fn read_imports<R: Reader>(
    reader: &R,
    ne_offset: u64,
    header: &NeHeader,
    limits: &Limits,
) -> Result<Vec<ImportEntry>> {
    let modules = ModuleTable::read(reader, ne_offset, header, limits)?;
    let segments = NeSegment::read_table(reader, ne_offset, header)?;
    let shift = header.sector_shift();

    let mut out = ImportCollector::new(limits);
    let mut walked = HashSet::new();
    for (i, seg) in segments.iter().enumerate() {
        if out.records_left() == 0 {
            break;
        }
        if !seg.has_relocations() || seg.offset == 0 {
            continue;
        }
        let reloc_offset = seg.file_offset(shift) + u64::from(seg.data_len());
        if !walked.insert(reloc_offset) {
            log::trace!("segment {} shares relocations at {reloc_offset:#x}", i + 1);
            continue;
        }
        let count = match reader.read_u16_at(reloc_offset) {
            Ok(n) => usize::from(n).min(out.records_left()),
            Err(err) => {
                log::debug!("segment {} relocation count unreadable: {err}", i + 1);
                continue;
            }
        };
        match reader.read_bytes_at(reloc_offset + 2, count * RELOC_SIZE) {
            Ok(records) => parse_relocations(&records, &modules, &mut out),
            Err(err) => log::debug!("segment {} relocations unreadable: {err}", i + 1),
        }
    }
    Ok(out.into_vec())
}
