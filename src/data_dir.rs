//! Data directory structures and parsing.

use crate::endian::ByteView;
use crate::Result;

/// Index into the optional header's data directory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum DataDirectoryType {
    Export = 0,
    Import = 1,
    Resource = 2,
    Exception = 3,
    Security = 4,
    BaseReloc = 5,
    Debug = 6,
    Architecture = 7,
    GlobalPtr = 8,
    Tls = 9,
    LoadConfig = 10,
    BoundImport = 11,
    Iat = 12,
    DelayImport = 13,
    ClrRuntime = 14,
    Reserved = 15,
}

impl DataDirectoryType {
    pub const fn as_index(self) -> usize {
        self as usize
    }
}

/// Number of data directories in a standard optional header.
pub const NUMBER_OF_DIRECTORY_ENTRIES: usize = 16;

/// Data directory entry (IMAGE_DATA_DIRECTORY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    /// RVA of the table.
    pub virtual_address: u32,
    /// Size of the table in bytes.
    pub size: u32,
}

impl DataDirectory {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let v = ByteView::le(data);
        Ok(Self {
            virtual_address: v.u32_at(0)?,
            size: v.u32_at(4)?,
        })
    }

    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    /// Whether `rva` falls inside this directory.
    pub fn contains(&self, rva: u32) -> bool {
        rva >= self.virtual_address
            && u64::from(rva) < u64::from(self.virtual_address) + u64::from(self.size)
    }

    /// Parse up to `count` consecutive entries; missing entries read as empty.
    pub fn parse_array(data: &[u8], count: usize) -> Vec<Self> {
        let count = count.min(NUMBER_OF_DIRECTORY_ENTRIES);
        let mut dirs: Vec<Self> = data
            .chunks_exact(Self::SIZE)
            .take(count)
            .filter_map(|chunk| Self::parse(chunk).ok())
            .collect();
        dirs.resize(NUMBER_OF_DIRECTORY_ENTRIES, Self::default());
        dirs
    }
}
