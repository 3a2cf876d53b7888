//! Import tables.
//!
//! PE imports come from the import directory: one descriptor per DLL,
//! each pointing at a lookup table of ordinal or hint/name thunks. DLL
//! names are read as one span covering every descriptor's name RVA.
//! NE imports are resolved from segment relocations in [`crate::ne_import`].

use std::collections::{BTreeSet, HashSet};

use crate::data_dir::DataDirectoryType;
use crate::endian::ByteView;
use crate::limits::Limits;
use crate::pe::PeHeaders;
use crate::reader::Reader;
use crate::{Error, Result};

/// MAX_PATH slack read after the last DLL name.
pub const NAME_SLACK: u32 = 260;
/// Longest imported function name read.
const MAX_SYMBOL_NAME: u32 = 512;

const ORDINAL_FLAG_32: u32 = 0x8000_0000;
const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;

/// IMAGE_IMPORT_DESCRIPTOR - 20 bytes
/// Describes one imported DLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportDescriptor {
    /// RVA to the Import Lookup Table.
    pub original_first_thunk: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    /// RVA to the DLL name.
    pub name_rva: u32,
    /// RVA to the Import Address Table.
    pub first_thunk: u32,
}

impl ImportDescriptor {
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        Ok(Self {
            original_first_thunk: v.u32_at(0)?,
            time_date_stamp: v.u32_at(4)?,
            forwarder_chain: v.u32_at(8)?,
            name_rva: v.u32_at(12)?,
            first_thunk: v.u32_at(16)?,
        })
    }

    /// Lookup table RVA, falling back to the IAT for images without an ILT.
    pub fn thunk_rva(&self) -> u32 {
        if self.original_first_thunk != 0 {
            self.original_first_thunk
        } else {
            self.first_thunk
        }
    }
}

/// Imported symbol: by ordinal or by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportSymbol {
    Ordinal(u16),
    Name(String),
}

impl std::fmt::Display for ImportSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportSymbol::Ordinal(n) => write!(f, "Ordinal #{n}"),
            ImportSymbol::Name(name) => f.write_str(name),
        }
    }
}

/// One imported function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportEntry {
    pub module: String,
    pub symbol: ImportSymbol,
    /// Hint from the hint/name entry; PE name imports only.
    pub hint: Option<u16>,
}

impl ImportEntry {
    pub const COLUMNS: [&'static str; 3] = ["Name", "Module", "Hint"];

    pub fn row(&self) -> Vec<String> {
        vec![
            self.symbol.to_string(),
            self.module.clone(),
            self.hint.map(|h| h.to_string()).unwrap_or_default(),
        ]
    }
}

/// Sorted, deduplicated import set with ceilings on distinct entries and
/// on records walked.
#[derive(Debug, Clone)]
pub struct ImportCollector {
    entries: BTreeSet<ImportEntry>,
    max_entries: usize,
    records_left: usize,
}

impl ImportCollector {
    pub fn new(limits: &Limits) -> Self {
        Self {
            entries: BTreeSet::new(),
            max_entries: limits.max_imports,
            records_left: limits.max_import_records,
        }
    }

    /// Account for one walked record. Returns false once the record budget
    /// or the entry ceiling is exhausted.
    pub fn take_record(&mut self) -> bool {
        if self.records_left == 0 || self.entries.len() >= self.max_entries {
            return false;
        }
        self.records_left -= 1;
        true
    }

    /// Records that may still be walked.
    pub fn records_left(&self) -> usize {
        if self.is_full() {
            0
        } else {
            self.records_left
        }
    }

    /// Add an entry; returns false when the set is full and the entry is new.
    pub fn insert(&mut self, entry: ImportEntry) -> bool {
        if self.is_full() && !self.entries.contains(&entry) {
            return false;
        }
        self.entries.insert(entry);
        true
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by module then symbol.
    pub fn into_vec(self) -> Vec<ImportEntry> {
        self.entries.into_iter().collect()
    }
}

/// Read the import descriptors up to the null terminator.
pub fn read_descriptors<R: Reader>(
    reader: &R,
    headers: &PeHeaders,
    limits: &Limits,
) -> Result<Vec<ImportDescriptor>> {
    let dir = headers.data_directory(DataDirectoryType::Import);
    if !dir.is_present() || (dir.size as usize) < ImportDescriptor::SIZE {
        return Err(Error::NotFound);
    }
    if dir.size > limits.max_import_directory {
        return Err(Error::too_large(
            "import directory",
            dir.size.into(),
            limits.max_import_directory.into(),
        ));
    }
    let table = headers.read_rva(reader, dir.virtual_address, dir.size)?;

    // MinGW places DLL names inside the directory, so its size need not be
    // a multiple of the descriptor size.
    let descriptors = table
        .chunks_exact(ImportDescriptor::SIZE)
        .map(ImportDescriptor::parse)
        .take_while(|d| d.as_ref().map_or(false, |d| d.name_rva != 0))
        .collect::<Result<Vec<_>>>()?;
    if descriptors.is_empty() {
        return Err(Error::NotFound);
    }
    Ok(descriptors)
}

/// DLL names of an import directory, read as one contiguous span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DllNames {
    low: u32,
    buf: Vec<u8>,
}

impl DllNames {
    /// Read the span `[min name RVA, max name RVA]` plus [`NAME_SLACK`].
    pub fn read<R: Reader>(
        reader: &R,
        headers: &PeHeaders,
        descriptors: &[ImportDescriptor],
        limits: &Limits,
    ) -> Result<Self> {
        let low = descriptors.iter().map(|d| d.name_rva).min().ok_or(Error::NotFound)?;
        let high = descriptors.iter().map(|d| d.name_rva).max().ok_or(Error::NotFound)?;
        let span = high - low + 1;
        if span > limits.max_import_name_span {
            return Err(Error::too_large(
                "import name span",
                span.into(),
                limits.max_import_name_span.into(),
            ));
        }
        let offset = headers
            .rva_to_offset(low, span)
            .ok_or_else(|| Error::out_of_range(low.into(), span.into()))?;

        let mut buf = reader.read_up_to(offset, (span + NAME_SLACK) as usize)?;
        if buf.len() < span as usize {
            return Err(Error::buffer_too_small(span as usize, buf.len()));
        }
        buf.resize((span + NAME_SLACK) as usize, 0);
        if let Some(last) = buf.last_mut() {
            *last = 0;
        }
        Ok(Self { low, buf })
    }

    /// Raw NUL-terminated name at `rva`.
    pub fn get(&self, rva: u32) -> Option<&[u8]> {
        let start = rva.checked_sub(self.low)? as usize;
        let rest = self.buf.get(start..)?;
        let end = rest.iter().position(|&b| b == 0)?;
        Some(&rest[..end])
    }

    /// Names in descriptor order, ASCII-lowercased.
    pub fn lowercase_names(&self, descriptors: &[ImportDescriptor]) -> Vec<String> {
        descriptors
            .iter()
            .filter_map(|d| self.get(d.name_rva))
            .map(|name| String::from_utf8_lossy(name).to_ascii_lowercase())
            .collect()
    }
}

fn read_thunks<R: Reader>(
    reader: &R,
    headers: &PeHeaders,
    module: &str,
    rva: u32,
    limits: &Limits,
    out: &mut ImportCollector,
) -> Result<()> {
    let is_64bit = headers.is_64bit();
    let width = if is_64bit { 8 } else { 4 };
    let per_module = limits.max_imports_per_module.min(out.records_left());
    let max = (per_module as u64 + 1) * width as u64;
    let table = headers.read_rva_up_to(reader, rva, max.min(u64::from(u32::MAX)) as u32)?;
    let v = ByteView::le(&table);

    for i in 0..table.len() / width {
        let (is_ordinal, ordinal, hint_rva) = if is_64bit {
            let raw = v.u64_at(i * width)?;
            if raw == 0 {
                break;
            }
            (raw & ORDINAL_FLAG_64 != 0, raw as u16, (raw & 0x7FFF_FFFF) as u32)
        } else {
            let raw = v.u32_at(i * width)?;
            if raw == 0 {
                break;
            }
            (raw & ORDINAL_FLAG_32 != 0, raw as u16, raw & 0x7FFF_FFFF)
        };
        if i >= limits.max_imports_per_module || !out.take_record() {
            log::debug!("{module}: import list truncated");
            break;
        }

        let entry = if is_ordinal {
            ImportEntry {
                module: module.to_string(),
                symbol: ImportSymbol::Ordinal(ordinal),
                hint: None,
            }
        } else {
            let hint_name = match headers.read_rva_up_to(reader, hint_rva, 2 + MAX_SYMBOL_NAME) {
                Ok(buf) if buf.len() >= 2 => buf,
                _ => {
                    log::trace!("{module}: hint/name at {hint_rva:#x} unreadable");
                    continue;
                }
            };
            let hint = u16::from_le_bytes([hint_name[0], hint_name[1]]);
            let name = &hint_name[2..];
            let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
            ImportEntry {
                module: module.to_string(),
                symbol: ImportSymbol::Name(String::from_utf8_lossy(&name[..end]).into_owned()),
                hint: Some(hint),
            }
        };
        if !out.insert(entry) {
            log::debug!("{module}: import ceiling reached");
            break;
        }
    }
    Ok(())
}

/// Every imported function, sorted by module then symbol.
///
/// A module whose lookup table cannot be read contributes nothing. A
/// (module, lookup table) pair is walked once however many descriptors
/// repeat it.
pub fn read_imports<R: Reader>(
    reader: &R,
    headers: &PeHeaders,
    limits: &Limits,
) -> Result<Vec<ImportEntry>> {
    let descriptors = read_descriptors(reader, headers, limits)?;
    let names = DllNames::read(reader, headers, &descriptors, limits)?;

    let mut out = ImportCollector::new(limits);
    let mut walked = HashSet::new();
    for desc in &descriptors {
        if out.records_left() == 0 {
            log::debug!("import walk stopped after {} entries", out.len());
            break;
        }
        let Some(name) = names.get(desc.name_rva) else {
            continue;
        };
        if !walked.insert((name, desc.thunk_rva())) {
            continue;
        }
        let module = String::from_utf8_lossy(name).into_owned();
        if let Err(err) = read_thunks(reader, headers, &module, desc.thunk_rva(), limits, &mut out) {
            log::debug!("{module}: import lookup table unreadable: {err}");
        }
    }
    Ok(out.into_vec())
}
