//! NE resource table reader.
//!
//! The table is flat: an alignment shift, then `TYPEINFO` records each
//! followed by their `NAMEINFO` entries, terminated by a zero type id.
//! Integer type and resource ids have the high bit set.

use crate::endian::ByteView;
use crate::limits::Limits;
use crate::ne::NeHeader;
use crate::reader::Reader;
use crate::resource::{read_range, ResourceRange, ResourceReader};
use crate::version::VersionFormat;
use crate::{Error, Result};

const INTEGER_ID: u16 = 0x8000;
const TYPEINFO_SIZE: usize = 8;
const NAMEINFO_SIZE: usize = 12;
const MIN_TABLE_SIZE: u32 = 6;
const MAX_TABLE_SIZE: u32 = 65536;

/// One NAMEINFO record, with offset and length already shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeResource {
    pub id: u16,
    pub offset: u64,
    pub length: u64,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NeResourceType {
    type_id: u16,
    entries: Vec<NeResource>,
}

/// Size of the resource table: the distance to the nearest table that
/// follows it, else to the end of the file.
fn table_size(header: &NeHeader, table_abs: u64, file_size: u64) -> u64 {
    let res = header.res_table_offset;
    [
        header.seg_table_offset,
        header.resid_name_table,
        header.mod_ref_table,
        header.import_name_table,
    ]
    .into_iter()
    .filter(|&off| off > res)
    .min()
    .map(|next| u64::from(next - res))
    .unwrap_or_else(|| file_size.saturating_sub(table_abs))
}

/// Resource reader over an NE resource table.
pub struct NeResourceReader<'a, R: Reader> {
    reader: &'a R,
    file_size: u64,
    shift: u16,
    types: Vec<NeResourceType>,
}

impl<'a, R: Reader> NeResourceReader<'a, R> {
    /// Load the resource table of the NE header at `ne_offset`.
    pub fn new(reader: &'a R, ne_offset: u64, header: &NeHeader, limits: &Limits) -> Result<Self> {
        let file_size = reader.size().unwrap_or(u64::MAX);
        if file_size > limits.max_ne_file_size {
            return Err(Error::too_large("file", file_size, limits.max_ne_file_size));
        }
        if header.res_table_offset < NeHeader::SIZE as u16 {
            return Err(Error::NotFound);
        }

        let table_abs = ne_offset + u64::from(header.res_table_offset);
        let size = table_size(header, table_abs, file_size);
        if size < u64::from(MIN_TABLE_SIZE) {
            return Err(Error::NotFound);
        }
        if size > u64::from(MAX_TABLE_SIZE) {
            return Err(Error::too_large("NE resource table", size, MAX_TABLE_SIZE.into()));
        }

        let table = reader.read_up_to(table_abs, size as usize)?;
        let this = Self::parse_table(reader, &table, limits)?;
        log::trace!(
            "NE resource table at {table_abs:#x}: {} types, shift {}",
            this.types.len(),
            this.shift
        );
        Ok(this)
    }

    /// Parse a raw resource table. Records that do not fit in `table` are
    /// dropped.
    pub fn parse_table(reader: &'a R, table: &[u8], limits: &Limits) -> Result<Self> {
        let v = ByteView::le(table);
        let shift = v.u16_at(0)?;
        if shift >= 16 {
            return Err(Error::Corrupt("NE resource alignment shift"));
        }

        let mut types: Vec<NeResourceType> = Vec::new();
        let mut nodes = 0usize;
        let mut pos = 2usize;
        'types: while pos + TYPEINFO_SIZE <= table.len() {
            let type_id = v.u16_at(pos)?;
            if type_id == 0 {
                break;
            }
            if types.iter().any(|t| t.type_id == type_id) {
                log::debug!("duplicate NE resource type {type_id:#06x}");
                break;
            }
            let count = usize::from(v.u16_at(pos + 2)?);
            pos += TYPEINFO_SIZE;

            let mut entries = Vec::with_capacity(count.min(limits.max_resource_entries));
            for _ in 0..count {
                if pos + NAMEINFO_SIZE > table.len()
                    || entries.len() >= limits.max_resource_entries
                    || nodes >= limits.max_resource_nodes
                {
                    log::debug!("NE resource type {type_id:#06x} truncated");
                    types.push(NeResourceType { type_id, entries });
                    break 'types;
                }
                entries.push(NeResource {
                    offset: u64::from(v.u16_at(pos)?) << shift,
                    length: u64::from(v.u16_at(pos + 2)?) << shift,
                    flags: v.u16_at(pos + 4)?,
                    id: v.u16_at(pos + 6)?,
                });
                nodes += 1;
                pos += NAMEINFO_SIZE;
            }
            types.push(NeResourceType { type_id, entries });
        }

        Ok(Self {
            reader,
            file_size: reader.size().unwrap_or(u64::MAX),
            shift,
            types,
        })
    }

    pub fn alignment_shift(&self) -> u16 {
        self.shift
    }

    /// Resources of one numeric type, in table order.
    pub fn entries(&self, rtype: u16) -> &[NeResource] {
        let rtype = rtype | INTEGER_ID;
        self.types
            .iter()
            .find(|t| t.type_id == rtype)
            .map(|t| t.entries.as_slice())
            .unwrap_or(&[])
    }
}

impl<R: Reader> ResourceReader for NeResourceReader<'_, R> {
    /// NE resources carry no language; `lang` is ignored.
    fn open(&self, rtype: u16, id: Option<u16>, _lang: Option<u16>) -> Result<ResourceRange> {
        let entries = self.entries(rtype);
        let entry = match id {
            Some(id) => entries.iter().find(|e| e.id == id | INTEGER_ID),
            None => entries.first(),
        }
        .ok_or(Error::NotFound)?;
        let end = entry.offset + entry.length;
        if end > self.file_size {
            log::debug!(
                "NE resource {:#06x} at {:#x} runs past the end of the file",
                entry.id,
                entry.offset
            );
            return Err(Error::out_of_range(end, self.file_size));
        }
        let size = u32::try_from(entry.length)
            .map_err(|_| Error::too_large("NE resource", entry.length, u32::MAX.into()))?;
        Ok(ResourceRange {
            offset: entry.offset,
            size,
        })
    }

    fn read(&self, range: ResourceRange, max: u32) -> Result<Vec<u8>> {
        read_range(self.reader, range, max)
    }

    fn version_format(&self) -> VersionFormat {
        VersionFormat::Ne
    }
}
