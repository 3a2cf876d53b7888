//! PE export table.

use crate::data_dir::DataDirectoryType;
use crate::endian::ByteView;
use crate::limits::Limits;
use crate::pe::PeHeaders;
use crate::reader::Reader;
use crate::{Error, Result};

const MAX_EXPORT_NAME: u32 = 512;

/// IMAGE_EXPORT_DIRECTORY - 40 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportDirectory {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// RVA to the DLL name.
    pub name_rva: u32,
    /// Starting ordinal number.
    pub base: u32,
    pub number_of_functions: u32,
    pub number_of_names: u32,
    /// RVA to the Export Address Table.
    pub address_of_functions: u32,
    /// RVA to the Export Name Pointer Table.
    pub address_of_names: u32,
    /// RVA to the Export Ordinal Table.
    pub address_of_name_ordinals: u32,
}

impl ExportDirectory {
    pub const SIZE: usize = 40;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        Ok(Self {
            characteristics: v.u32_at(0)?,
            time_date_stamp: v.u32_at(4)?,
            major_version: v.u16_at(8)?,
            minor_version: v.u16_at(10)?,
            name_rva: v.u32_at(12)?,
            base: v.u32_at(16)?,
            number_of_functions: v.u32_at(20)?,
            number_of_names: v.u32_at(24)?,
            address_of_functions: v.u32_at(28)?,
            address_of_names: v.u32_at(32)?,
            address_of_name_ordinals: v.u32_at(36)?,
        })
    }
}

/// The address of an exported function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportAddress {
    Rva(u32),
    /// Forwarded to another DLL (e.g., "NTDLL.RtlAllocateHeap").
    Forwarder(String),
}

/// A single exported function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub ordinal: u32,
    pub name: Option<String>,
    /// Index into the name pointer table.
    pub hint: Option<u16>,
    pub address: ExportAddress,
}

impl ExportEntry {
    pub const COLUMNS: [&'static str; 4] = ["Name", "Ordinal", "Hint", "Virtual Address"];

    pub fn row(&self) -> Vec<String> {
        vec![
            self.name.clone().unwrap_or_default(),
            self.ordinal.to_string(),
            self.hint.map(|h| h.to_string()).unwrap_or_default(),
            match &self.address {
                ExportAddress::Rva(rva) => format!("0x{rva:08X}"),
                ExportAddress::Forwarder(target) => target.clone(),
            },
        ]
    }
}

/// Order exports by (hint, ordinal); unnamed exports have no hint and
/// sort first.
pub fn sort_exports(entries: &mut [ExportEntry]) {
    entries.sort_by_key(|e| (e.hint, e.ordinal));
}

fn read_u32_table<R: Reader>(reader: &R, headers: &PeHeaders, rva: u32, count: u32) -> Result<Vec<u32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let buf = headers.read_rva(reader, rva, count * 4)?;
    Ok(buf
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Read and sort the export table.
pub fn read_exports<R: Reader>(
    reader: &R,
    headers: &PeHeaders,
    limits: &Limits,
) -> Result<Vec<ExportEntry>> {
    let dir = headers.data_directory(DataDirectoryType::Export);
    if !dir.is_present() {
        return Err(Error::NotFound);
    }
    let raw = headers.read_rva(reader, dir.virtual_address, ExportDirectory::SIZE as u32)?;
    let directory = ExportDirectory::parse(&raw)?;

    let max = limits.max_exports as u32;
    for (what, count) in [
        ("export address table", directory.number_of_functions),
        ("export name table", directory.number_of_names),
    ] {
        if count > max {
            return Err(Error::too_large(what, count.into(), max.into()));
        }
    }

    let functions = read_u32_table(reader, headers, directory.address_of_functions, directory.number_of_functions)?;
    let (names, ordinals) = if directory.number_of_names > 0 {
        let names = read_u32_table(reader, headers, directory.address_of_names, directory.number_of_names)?;
        let raw = headers.read_rva(
            reader,
            directory.address_of_name_ordinals,
            directory.number_of_names * 2,
        )?;
        let ordinals: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        (names, ordinals)
    } else {
        (Vec::new(), Vec::new())
    };

    // Name and hint per address-table index.
    let mut named: Vec<Option<(u16, String)>> = vec![None; functions.len()];
    for (hint, (&name_rva, &index)) in names.iter().zip(&ordinals).enumerate() {
        let Some(slot) = named.get_mut(usize::from(index)) else {
            log::trace!("export name {hint} points past the address table");
            continue;
        };
        match headers.read_rva_cstr(reader, name_rva, MAX_EXPORT_NAME) {
            Ok(name) => *slot = Some((hint as u16, name)),
            Err(err) => log::trace!("export name {hint} unreadable: {err}"),
        }
    }

    let forwarder_range = u64::from(dir.virtual_address)..u64::from(dir.virtual_address) + u64::from(dir.size);
    let mut entries = Vec::with_capacity(functions.len());
    for (index, (&rva, name)) in functions.iter().zip(named).enumerate() {
        if rva == 0 && name.is_none() {
            continue;
        }
        let address = if forwarder_range.contains(&u64::from(rva)) {
            match headers.read_rva_cstr(reader, rva, MAX_EXPORT_NAME) {
                Ok(target) => ExportAddress::Forwarder(target),
                Err(_) => ExportAddress::Rva(rva),
            }
        } else {
            ExportAddress::Rva(rva)
        };
        let (hint, name) = match name {
            Some((hint, name)) => (Some(hint), Some(name)),
            None => (None, None),
        };
        entries.push(ExportEntry {
            ordinal: directory.base.wrapping_add(index as u32),
            name,
            hint,
            address,
        });
    }
    sort_exports(&mut entries);
    Ok(entries)
}
