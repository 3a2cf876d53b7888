//! Resource lookup shared by the PE and NE backends.
//!
//! A resource is addressed by numeric `(type, id, language)`. Named
//! entries are never indexed. `None` for the id or language selects the
//! first entry at that level.

use crate::version::{VersionFormat, VersionInfo};
use crate::{Error, Result};

/// Largest version resource that will be loaded.
pub const MAX_VERSION_RESOURCE: u32 = 64 * 1024;

/// Standard resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResourceType {
    Cursor = 1,
    Bitmap = 2,
    Icon = 3,
    Menu = 4,
    Dialog = 5,
    String = 6,
    FontDir = 7,
    Font = 8,
    Accelerator = 9,
    RcData = 10,
    MessageTable = 11,
    GroupCursor = 12,
    GroupIcon = 14,
    Version = 16,
    DlgInclude = 17,
    PlugPlay = 19,
    Vxd = 20,
    AniCursor = 21,
    AniIcon = 22,
    Html = 23,
    Manifest = 24,
}

impl ResourceType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Cursor),
            2 => Some(Self::Bitmap),
            3 => Some(Self::Icon),
            4 => Some(Self::Menu),
            5 => Some(Self::Dialog),
            6 => Some(Self::String),
            7 => Some(Self::FontDir),
            8 => Some(Self::Font),
            9 => Some(Self::Accelerator),
            10 => Some(Self::RcData),
            11 => Some(Self::MessageTable),
            12 => Some(Self::GroupCursor),
            14 => Some(Self::GroupIcon),
            16 => Some(Self::Version),
            17 => Some(Self::DlgInclude),
            19 => Some(Self::PlugPlay),
            20 => Some(Self::Vxd),
            21 => Some(Self::AniCursor),
            22 => Some(Self::AniIcon),
            23 => Some(Self::Html),
            24 => Some(Self::Manifest),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cursor => "CURSOR",
            Self::Bitmap => "BITMAP",
            Self::Icon => "ICON",
            Self::Menu => "MENU",
            Self::Dialog => "DIALOG",
            Self::String => "STRING",
            Self::FontDir => "FONTDIR",
            Self::Font => "FONT",
            Self::Accelerator => "ACCELERATOR",
            Self::RcData => "RCDATA",
            Self::MessageTable => "MESSAGETABLE",
            Self::GroupCursor => "GROUP_CURSOR",
            Self::GroupIcon => "GROUP_ICON",
            Self::Version => "VERSION",
            Self::DlgInclude => "DLGINCLUDE",
            Self::PlugPlay => "PLUGPLAY",
            Self::Vxd => "VXD",
            Self::AniCursor => "ANICURSOR",
            Self::AniIcon => "ANIICON",
            Self::Html => "HTML",
            Self::Manifest => "MANIFEST",
        }
    }
}

impl From<ResourceType> for u16 {
    fn from(rt: ResourceType) -> u16 {
        rt as u16
    }
}

/// Absolute file range of a resource payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRange {
    pub offset: u64,
    pub size: u32,
}

/// Numeric resource lookup.
pub trait ResourceReader {
    /// Resolve `(rtype, id, lang)` to a payload range.
    ///
    /// Returns [`Error::NotFound`] when any level has no matching entry.
    fn open(&self, rtype: u16, id: Option<u16>, lang: Option<u16>) -> Result<ResourceRange>;

    /// Read a payload, refusing ranges larger than `max` bytes.
    fn read(&self, range: ResourceRange, max: u32) -> Result<Vec<u8>>;

    /// String layout of version resources in this container.
    fn version_format(&self) -> VersionFormat;

    fn has_type(&self, rtype: u16) -> bool {
        self.open(rtype, None, None).is_ok()
    }

    fn read_resource(&self, rtype: u16, id: Option<u16>, lang: Option<u16>) -> Result<Vec<u8>> {
        let range = self.open(rtype, id, lang)?;
        self.read(range, u32::MAX)
    }

    /// Locate and parse the version resource.
    fn load_version_info(&self, id: Option<u16>, lang: Option<u16>) -> Result<VersionInfo> {
        let range = self.open(ResourceType::Version.into(), id, lang)?;
        let data = self.read(range, MAX_VERSION_RESOURCE)?;
        VersionInfo::parse(&data, self.version_format())
    }
}

/// Shared payload read used by both backends.
pub(crate) fn read_range<R: crate::Reader + ?Sized>(
    reader: &R,
    range: ResourceRange,
    max: u32,
) -> Result<Vec<u8>> {
    if range.size > max {
        return Err(Error::too_large("resource", range.size.into(), max.into()));
    }
    let end = range.offset.saturating_add(range.size.into());
    if let Some(file_size) = reader.size() {
        if end > file_size {
            return Err(Error::out_of_range(end, file_size));
        }
    }
    reader.read_bytes_at(range.offset, range.size as usize)
}

/// Per-`open()` node budget.
pub(crate) struct NodeBudget {
    left: usize,
    limit: usize,
}

impl NodeBudget {
    pub(crate) fn new(limit: usize) -> Self {
        Self { left: limit, limit }
    }

    pub(crate) fn spend(&mut self, n: usize) -> Result<()> {
        if n > self.left {
            return Err(Error::too_large(
                "resource walk",
                (self.limit - self.left + n) as u64,
                self.limit as u64,
            ));
        }
        self.left -= n;
        Ok(())
    }
}
