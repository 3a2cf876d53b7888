//! NE entry table and name tables.
//!
//! The entry table is a run of bundles. Each bundle starts with an entry
//! count and a segment indicator: 0 skips ordinals, 0xFF introduces
//! movable entries (flags, `INT 3Fh`, segment, offset) and anything else
//! is the segment number of fixed entries (flags, offset).

use crate::endian::ByteView;
use crate::limits::Limits;
use crate::ne::NeHeader;
use crate::reader::Reader;
use crate::{Error, Result};

const BUNDLE_UNUSED: u8 = 0x00;
const BUNDLE_MOVABLE: u8 = 0xFF;
const INT_3F: [u8; 2] = [0xCD, 0x3F];
const FIXED_ENTRY_SIZE: usize = 3;
const MOVABLE_ENTRY_SIZE: usize = 6;

/// Entry flag bits.
pub mod entry_flags {
    pub const EXPORTED: u8 = 0x01;
    pub const SHARED_DATA: u8 = 0x02;
}

/// One entry point, keyed by ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeEntry {
    pub ordinal: u16,
    pub segment: u8,
    pub offset: u16,
    pub flags: u8,
    pub movable: bool,
    pub name: Option<String>,
    /// Name came from the resident table.
    pub resident: bool,
}

impl NeEntry {
    pub const COLUMNS: [&'static str; 4] = ["Ordinal", "Name", "Address", "Flags"];

    pub fn is_exported(&self) -> bool {
        self.flags & entry_flags::EXPORTED != 0
    }

    pub fn row(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.is_exported() {
            flags.push("Export");
        }
        if self.flags & entry_flags::SHARED_DATA != 0 {
            flags.push("Shared");
        }
        if self.movable {
            flags.push("Movable");
        }
        if self.name.is_some() && !self.resident {
            flags.push("Non-resident");
        }
        vec![
            self.ordinal.to_string(),
            self.name.clone().unwrap_or_default(),
            format!("{:02X}:{:04X}", self.segment, self.offset),
            flags.join(", "),
        ]
    }
}

/// Decode the bundles of an entry table.
///
/// Decoding stops at the first entry that runs past the table or carries
/// a bad movable-entry marker; the entries before it are kept.
pub fn parse_entry_table(table: &[u8], limits: &Limits) -> Result<Vec<NeEntry>> {
    let v = ByteView::le(table);
    let mut entries = Vec::new();
    let mut ordinal: u32 = 1;
    let mut pos = 0usize;

    while pos + 2 <= table.len() {
        let count = usize::from(v.u8_at(pos)?);
        if count == 0 {
            break;
        }
        let indicator = v.u8_at(pos + 1)?;
        pos += 2;

        let size = match indicator {
            BUNDLE_UNUSED => {
                ordinal += count as u32;
                continue;
            }
            BUNDLE_MOVABLE => MOVABLE_ENTRY_SIZE,
            _ => FIXED_ENTRY_SIZE,
        };
        let fits = (table.len() - pos) / size;
        let truncated = count > fits;
        if truncated {
            log::debug!("NE entry bundle at {:#x} runs past the table", pos - 2);
        }

        for i in 0..count.min(fits) {
            if entries.len() >= limits.max_ne_entries || ordinal > u32::from(u16::MAX) {
                return Err(Error::too_large(
                    "NE entry table",
                    ordinal.into(),
                    limits.max_ne_entries as u64,
                ));
            }
            let e = pos + i * size;
            let entry = if indicator == BUNDLE_MOVABLE {
                if v.slice(e + 1, 2)? != INT_3F {
                    log::debug!("NE movable entry {ordinal} lacks INT 3Fh");
                    return Ok(entries);
                }
                NeEntry {
                    ordinal: ordinal as u16,
                    flags: v.u8_at(e)?,
                    segment: v.u8_at(e + 3)?,
                    offset: v.u16_at(e + 4)?,
                    movable: true,
                    name: None,
                    resident: false,
                }
            } else {
                NeEntry {
                    ordinal: ordinal as u16,
                    flags: v.u8_at(e)?,
                    segment: indicator,
                    offset: v.u16_at(e + 1)?,
                    movable: false,
                    name: None,
                    resident: false,
                }
            };
            entries.push(entry);
            ordinal += 1;
        }
        if truncated {
            break;
        }
        pos += count * size;
    }
    Ok(entries)
}

/// Iterate a resident or non-resident name table: (name, ordinal).
///
/// Each record is a length byte, the name, then a u16 ordinal; a zero
/// length ends the table. A record that would run past the end stops
/// the walk.
pub fn parse_name_table(table: &[u8]) -> Vec<(Vec<u8>, u16)> {
    let mut names = Vec::new();
    let mut pos = 0usize;
    while let Some(&len) = table.get(pos) {
        let len = usize::from(len);
        if len == 0 || pos + 1 + len + 2 > table.len() {
            break;
        }
        let name = table[pos + 1..pos + 1 + len].to_vec();
        let ordinal = u16::from_le_bytes([table[pos + 1 + len], table[pos + 2 + len]]);
        names.push((name, ordinal));
        pos += 1 + len + 2;
    }
    names
}

/// Attach names to entries. `entries` must be sorted by ordinal; names
/// for ordinal 0 (module name or description) are ignored.
pub fn attach_names(entries: &mut [NeEntry], names: &[(Vec<u8>, u16)], resident: bool) {
    for (name, ordinal) in names {
        if *ordinal == 0 {
            continue;
        }
        if let Ok(i) = entries.binary_search_by_key(ordinal, |e| e.ordinal) {
            if entries[i].name.is_none() {
                entries[i].name = Some(String::from_utf8_lossy(name).into_owned());
                entries[i].resident = resident;
            }
        }
    }
}

/// Entry points plus the module name and description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeEntries {
    pub module_name: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<NeEntry>,
}

/// Read the entry table and attach resident and non-resident names.
pub fn read_entries<R: Reader>(
    reader: &R,
    ne_offset: u64,
    header: &NeHeader,
    limits: &Limits,
) -> Result<NeEntries> {
    if header.entry_table_length == 0 {
        return Err(Error::NotFound);
    }
    let table = reader.read_bytes_at(
        ne_offset + u64::from(header.entry_table_offset),
        usize::from(header.entry_table_length),
    )?;
    let mut result = NeEntries {
        entries: parse_entry_table(&table, limits)?,
        ..NeEntries::default()
    };

    // The resident name table runs up to the module reference table.
    if header.mod_ref_table > header.resid_name_table {
        let len = header.mod_ref_table - header.resid_name_table;
        match reader.read_bytes_at(ne_offset + u64::from(header.resid_name_table), usize::from(len)) {
            Ok(buf) => {
                let names = parse_name_table(&buf);
                result.module_name = names
                    .first()
                    .map(|(n, _)| String::from_utf8_lossy(n).into_owned());
                attach_names(&mut result.entries, &names, true);
            }
            Err(err) => log::debug!("NE resident name table unreadable: {err}"),
        }
    }

    if header.off_start_non_res_tab != 0 && header.non_res_names_size != 0 {
        match reader.read_bytes_at(
            u64::from(header.off_start_non_res_tab),
            usize::from(header.non_res_names_size),
        ) {
            Ok(buf) => {
                let names = parse_name_table(&buf);
                result.description = names
                    .first()
                    .map(|(n, _)| String::from_utf8_lossy(n).into_owned());
                attach_names(&mut result.entries, &names, false);
            }
            Err(err) => log::debug!("NE non-resident name table unreadable: {err}"),
        }
    }
    Ok(result)
}
