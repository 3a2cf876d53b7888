//! PE resource tree reader.
//!
//! The `.rsrc` tree has three levels: type, id, language. Directory
//! offsets are relative to the root directory; data entries carry an RVA.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::data_dir::DataDirectoryType;
use crate::endian::ByteView;
use crate::limits::Limits;
use crate::pe::PeHeaders;
use crate::reader::Reader;
use crate::resource::{read_range, NodeBudget, ResourceRange, ResourceReader};
use crate::version::VersionFormat;
use crate::{Error, Result};

const HIGH_BIT: u32 = 0x8000_0000;

/// IMAGE_RESOURCE_DIRECTORY - 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceDirectoryHeader {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub number_of_named_entries: u16,
    pub number_of_id_entries: u16,
}

impl ResourceDirectoryHeader {
    pub const SIZE: usize = 16;

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
            number_of_named_entries: v.u16_at(12)?,
            number_of_id_entries: v.u16_at(14)?,
        })
    }

    pub fn total_entries(&self) -> usize {
        self.number_of_named_entries as usize + self.number_of_id_entries as usize
    }
}

/// IMAGE_RESOURCE_DIRECTORY_ENTRY - 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceDirectoryEntry {
    /// Name offset (high bit set) or ID.
    pub name_or_id: u32,
    /// Offset to data or subdirectory (high bit set = subdirectory).
    pub offset_to_data: u32,
}

impl ResourceDirectoryEntry {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        Ok(Self {
            name_or_id: v.u32_at(0)?,
            offset_to_data: v.u32_at(4)?,
        })
    }

    /// Named entries, and ids that do not fit 16 bits, are not indexed.
    pub fn numeric_id(&self) -> Option<u16> {
        u16::try_from(self.name_or_id).ok()
    }

    pub fn is_directory(&self) -> bool {
        (self.offset_to_data & HIGH_BIT) != 0
    }

    pub fn data_offset(&self) -> u32 {
        self.offset_to_data & !HIGH_BIT
    }
}

/// IMAGE_RESOURCE_DATA_ENTRY - 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceDataEntry {
    /// RVA of the resource data.
    pub offset_to_data: u32,
    pub size: u32,
    pub code_page: u32,
    pub reserved: u32,
}

impl ResourceDataEntry {
    pub const SIZE: usize = 16;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        Ok(Self {
            offset_to_data: v.u32_at(0)?,
            size: v.u32_at(4)?,
            code_page: v.u32_at(8)?,
            reserved: v.u32_at(12)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct DirEntry {
    id: u16,
    entry: ResourceDirectoryEntry,
}

type DirCache = RefCell<HashMap<u32, Vec<DirEntry>>>;

/// Resource reader over a PE resource section.
pub struct PeResourceReader<'a, R: Reader> {
    reader: &'a R,
    /// File offset of the root directory.
    base: u64,
    /// Bytes available from `base` to the end of the section.
    size: u32,
    /// RVA of the root directory.
    virtual_address: u32,
    max_entries: usize,
    max_nodes: usize,
    root: Vec<DirEntry>,
    type_dirs: DirCache,
    id_dirs: DirCache,
}

impl<'a, R: Reader> PeResourceReader<'a, R> {
    /// Open the resource tree of a PE image.
    pub fn new(reader: &'a R, headers: &PeHeaders, limits: &Limits) -> Result<Self> {
        let section = headers.resource_section().ok_or(Error::NotFound)?;
        let dir_va = headers
            .data_directory(DataDirectoryType::Resource)
            .virtual_address;
        let delta = if dir_va > section.virtual_address
            && dir_va - section.virtual_address < section.size_of_raw_data
        {
            dir_va - section.virtual_address
        } else {
            0
        };
        Self::with_section(
            reader,
            u64::from(section.pointer_to_raw_data) + u64::from(delta),
            section.size_of_raw_data - delta,
            section.virtual_address + delta,
            limits,
        )
    }

    /// Open a resource tree whose root directory is at file offset `base`.
    pub fn with_section(
        reader: &'a R,
        base: u64,
        size: u32,
        virtual_address: u32,
        limits: &Limits,
    ) -> Result<Self> {
        if base == 0 || size == 0 {
            return Err(Error::NotFound);
        }
        let file_size = reader.size().unwrap_or(u64::MAX);
        if file_size > limits.max_pe_resource_file_size {
            return Err(Error::too_large(
                "file",
                file_size,
                limits.max_pe_resource_file_size,
            ));
        }
        let end = base + u64::from(size);
        if base >= file_size || end > file_size {
            return Err(Error::out_of_range(end, file_size));
        }

        let mut this = Self {
            reader,
            base,
            size,
            virtual_address,
            max_entries: limits.max_resource_entries,
            max_nodes: limits.max_resource_nodes,
            root: Vec::new(),
            type_dirs: RefCell::new(HashMap::new()),
            id_dirs: RefCell::new(HashMap::new()),
        };
        let mut budget = NodeBudget::new(this.max_nodes);
        this.root = this.load_dir(0, &mut budget)?;
        Ok(this)
    }

    /// Numeric type ids present in the root directory.
    pub fn types(&self) -> Vec<u16> {
        self.root.iter().map(|e| e.id).collect()
    }

    /// Read one directory, truncating the entry list to what fits in the
    /// section and to the configured entry ceiling.
    fn load_dir(&self, addr: u32, budget: &mut NodeBudget) -> Result<Vec<DirEntry>> {
        let header_end = u64::from(addr) + ResourceDirectoryHeader::SIZE as u64;
        if header_end > u64::from(self.size) {
            return Err(Error::out_of_range(header_end, self.size.into()));
        }
        let mut buf = [0u8; ResourceDirectoryHeader::SIZE];
        self.reader
            .read_exact_at(self.base + u64::from(addr), &mut buf)?;
        let header = ResourceDirectoryHeader::parse(&buf)?;

        let declared = header.total_entries();
        let fits = (u64::from(self.size) - header_end) as usize / ResourceDirectoryEntry::SIZE;
        let count = declared.min(fits).min(self.max_entries);
        if count < declared {
            log::debug!(
                "resource directory at {addr:#x}: {declared} entries declared, reading {count}"
            );
        }
        budget.spend(count + 1)?;

        let raw = self.reader.read_bytes_at(
            self.base + header_end,
            count * ResourceDirectoryEntry::SIZE,
        )?;
        let entries = raw
            .chunks_exact(ResourceDirectoryEntry::SIZE)
            .filter_map(|chunk| ResourceDirectoryEntry::parse(chunk).ok())
            .filter_map(|entry| entry.numeric_id().map(|id| DirEntry { id, entry }))
            .collect();
        Ok(entries)
    }

    /// Find `want` (or the first entry) in a directory, loading it into
    /// `cache` under `key` when not yet cached.
    fn find_cached(
        &self,
        cache: &DirCache,
        key: u32,
        parent: &ResourceDirectoryEntry,
        want: Option<u16>,
        budget: &mut NodeBudget,
    ) -> Result<ResourceDirectoryEntry> {
        if !cache.borrow().contains_key(&key) {
            if !parent.is_directory() || parent.data_offset() == 0 {
                return Err(Error::Corrupt("resource subdirectory"));
            }
            let entries = self.load_dir(parent.data_offset(), budget)?;
            cache.borrow_mut().insert(key, entries);
        }
        let cache = cache.borrow();
        let entries = cache.get(&key).ok_or(Error::NotFound)?;
        find(entries, want)
    }

    fn read_data_entry(&self, addr: u32) -> Result<ResourceDataEntry> {
        let end = u64::from(addr) + ResourceDataEntry::SIZE as u64;
        if end > u64::from(self.size) {
            return Err(Error::out_of_range(end, self.size.into()));
        }
        let mut buf = [0u8; ResourceDataEntry::SIZE];
        self.reader
            .read_exact_at(self.base + u64::from(addr), &mut buf)?;
        ResourceDataEntry::parse(&buf)
    }
}

fn find(entries: &[DirEntry], want: Option<u16>) -> Result<ResourceDirectoryEntry> {
    match want {
        Some(id) => entries.iter().find(|e| e.id == id),
        None => entries.first(),
    }
    .map(|e| e.entry)
    .ok_or(Error::NotFound)
}

impl<R: Reader> ResourceReader for PeResourceReader<'_, R> {
    fn open(&self, rtype: u16, id: Option<u16>, lang: Option<u16>) -> Result<ResourceRange> {
        let mut budget = NodeBudget::new(self.max_nodes);

        let type_entry = find(&self.root, Some(rtype))?;
        let id_entry = self.find_cached(
            &self.type_dirs,
            u32::from(rtype),
            &type_entry,
            id,
            &mut budget,
        )?;
        // `id` may be unspecified, so key the language directory by the
        // subdirectory offset actually selected.
        let lang_entry = self.find_cached(
            &self.id_dirs,
            id_entry.offset_to_data,
            &id_entry,
            lang,
            &mut budget,
        )?;
        if lang_entry.is_directory() {
            return Err(Error::Corrupt("resource language entry"));
        }

        let data = self.read_data_entry(lang_entry.data_offset())?;
        let data_addr = data
            .offset_to_data
            .checked_sub(self.virtual_address)
            .filter(|&addr| addr < self.size)
            .ok_or_else(|| Error::out_of_range(data.offset_to_data.into(), self.size.into()))?;
        let size = data.size.min(self.size - data_addr);
        log::trace!(
            "resource {rtype}/{id:?}/{lang:?} at rva {:#x}, {size} bytes",
            data.offset_to_data
        );
        Ok(ResourceRange {
            offset: self.base + u64::from(data_addr),
            size,
        })
    }

    fn read(&self, range: ResourceRange, max: u32) -> Result<Vec<u8>> {
        read_range(self.reader, range, max)
    }

    fn version_format(&self) -> VersionFormat {
        VersionFormat::Pe
    }
}
