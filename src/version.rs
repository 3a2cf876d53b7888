//! `VS_VERSION_INFO` parsing.
//!
//! PE version resources use UTF-16LE keys and values with a `wType`
//! field in every block header; NE resources use 8-bit strings in the
//! string table's code page and omit `wType`. Both align every block to
//! four bytes from the start of the resource.

use std::collections::BTreeMap;

use crate::codepage::{self, DecodePath};
use crate::endian::{align4, ByteView};
use crate::{Error, Result};

pub const VS_FFI_SIGNATURE: u32 = 0xFEEF_04BD;
pub const VS_FFI_STRUCVERSION: u32 = 0x0001_0000;

/// Bit names of `dwFileFlags`.
pub const FILE_FLAG_NAMES: &[Option<&str>] = &[
    Some("Debug"),
    Some("Prerelease"),
    Some("Patched"),
    Some("Private Build"),
    Some("Info Inferred"),
    Some("Special Build"),
];

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const FILETIME_1970: i64 = 116_444_736_000_000_000;
const HECTONANOSEC_PER_SEC: i64 = 10_000_000;

/// String encoding of a version resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionFormat {
    /// Win32 layout: UTF-16LE, three-field headers.
    Pe,
    /// Win16 layout: 8-bit code page, two-field headers.
    Ne,
}

/// VS_FIXEDFILEINFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedFileInfo {
    pub signature: u32,
    pub struc_version: u32,
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date_ms: u32,
    pub file_date_ls: u32,
}

fn dotted(ms: u32, ls: u32) -> String {
    format!("{}.{}.{}.{}", ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF)
}

impl FixedFileInfo {
    pub const SIZE: usize = 52;

    /// Parse and check signature and structure version.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        let info = Self {
            signature: v.u32_at(0)?,
            struc_version: v.u32_at(4)?,
            file_version_ms: v.u32_at(8)?,
            file_version_ls: v.u32_at(12)?,
            product_version_ms: v.u32_at(16)?,
            product_version_ls: v.u32_at(20)?,
            file_flags_mask: v.u32_at(24)?,
            file_flags: v.u32_at(28)?,
            file_os: v.u32_at(32)?,
            file_type: v.u32_at(36)?,
            file_subtype: v.u32_at(40)?,
            file_date_ms: v.u32_at(44)?,
            file_date_ls: v.u32_at(48)?,
        };
        if info.signature != VS_FFI_SIGNATURE {
            return Err(Error::InvalidSignature("VS_FIXEDFILEINFO"));
        }
        if info.struc_version != VS_FFI_STRUCVERSION {
            return Err(Error::Corrupt("VS_FIXEDFILEINFO structure version"));
        }
        Ok(info)
    }

    pub fn file_version(&self) -> String {
        dotted(self.file_version_ms, self.file_version_ls)
    }

    pub fn product_version(&self) -> String {
        dotted(self.product_version_ms, self.product_version_ls)
    }

    /// Flags that are both set and declared valid by the mask.
    pub fn effective_flags(&self) -> u32 {
        self.file_flags & self.file_flags_mask
    }

    pub fn file_os_name(&self) -> String {
        let name = match self.file_os {
            0x0001_0000 => "MS-DOS",
            0x0002_0000 => "OS/2 (16-bit)",
            0x0003_0000 => "OS/2 (32-bit)",
            0x0004_0000 => "Windows NT",
            0x0005_0000 => "Windows CE",
            0x0000_0001 => "Windows (16-bit)",
            0x0000_0004 => "Windows (32-bit)",
            0x0000_0002 => "Presentation Manager (16-bit)",
            0x0000_0003 => "Presentation Manager (32-bit)",
            0x0001_0001 => "Windows on MS-DOS (16-bit)",
            0x0001_0004 => "Windows 9x (32-bit)",
            0x0002_0002 => "OS/2 with Presentation Manager (16-bit)",
            0x0003_0003 => "OS/2 with Presentation Manager (32-bit)",
            0x0004_0004 => "Windows NT",
            other => return format!("Unknown (0x{other:08X})"),
        };
        name.to_string()
    }

    pub fn file_type_name(&self) -> String {
        let name = match self.file_type {
            0 => "Unknown",
            1 => "Application",
            2 => "DLL",
            3 => "Device Driver",
            4 => "Font",
            5 => "Virtual Device Driver",
            7 => "Static Library",
            other => return format!("Unknown (0x{other:08X})"),
        };
        name.to_string()
    }

    /// Subtype name for drivers and fonts; `None` for other file types.
    pub fn file_subtype_name(&self) -> Option<String> {
        const DRIVERS: [&str; 13] = [
            "",
            "Printer",
            "Keyboard",
            "Language",
            "Display",
            "Mouse",
            "Network",
            "System",
            "Installable",
            "Sound",
            "Communications",
            "Input Method",
            "Versioned Printer",
        ];
        const FONTS: [&str; 4] = ["", "Raster", "Vector", "TrueType"];

        let table: &[&str] = match self.file_type {
            3 => &DRIVERS,
            4 => &FONTS,
            _ => return None,
        };
        let name = table
            .get(self.file_subtype as usize)
            .copied()
            .filter(|s| !s.is_empty());
        Some(match name {
            Some(name) => name.to_string(),
            None => format!("Unknown (0x{:02X})", self.file_subtype),
        })
    }

    /// File date as Unix seconds; `None` when unset.
    pub fn file_time(&self) -> Option<i64> {
        let ft = (u64::from(self.file_date_ms) << 32) | u64::from(self.file_date_ls);
        if ft == 0 {
            return None;
        }
        Some((ft as i64).wrapping_sub(FILETIME_1970) / HECTONANOSEC_PER_SEC)
    }
}

/// How a string table's text was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    Utf16Le,
    CodePage(DecodePath),
}

/// One `StringTable` block: key/value pairs in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    /// Language in the high 16 bits, code page in the low 16 bits.
    pub lang_id: u32,
    pub encoding: StringEncoding,
    pub entries: Vec<(String, String)>,
}

impl StringTable {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn language(&self) -> u16 {
        (self.lang_id >> 16) as u16
    }

    pub fn code_page(&self) -> u16 {
        self.lang_id as u16
    }
}

/// Decoded version resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub fixed: FixedFileInfo,
    /// Keyed by language id. Only the first string table of the resource
    /// is kept.
    pub string_file_info: BTreeMap<u32, StringTable>,
}

impl VersionInfo {
    /// The retained string table, if any.
    pub fn string_table(&self) -> Option<&StringTable> {
        self.string_file_info.values().next()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.string_table()?.get(key)
    }

    /// Parse a complete version resource.
    ///
    /// The `VS_VERSION_INFO` header and fixed block are mandatory. A
    /// missing or malformed `StringFileInfo` leaves the string map empty.
    pub fn parse(data: &[u8], format: VersionFormat) -> Result<Self> {
        let mut cur = Cursor::new(data);
        let root = cur.block_header(format)?;
        if root.key != "VS_VERSION_INFO" || (format == VersionFormat::Pe && root.w_type != 0) {
            return Err(Error::Corrupt("VS_VERSION_INFO key"));
        }
        if usize::from(root.value_len) != FixedFileInfo::SIZE {
            return Err(Error::Corrupt("VS_FIXEDFILEINFO size"));
        }
        let fixed = FixedFileInfo::parse(cur.take(FixedFileInfo::SIZE)?)?;
        cur.align();

        let end = usize::from(root.length).min(data.len());
        let mut string_file_info = BTreeMap::new();
        while cur.pos + 4 <= end {
            let child_start = cur.pos;
            let child = match cur.block_header(format) {
                Ok(child) => child,
                Err(err) => {
                    log::debug!("version child block unreadable: {err}");
                    break;
                }
            };
            match child.key.as_str() {
                "StringFileInfo" if format == VersionFormat::Ne || child.w_type == 1 => {
                    match read_string_table(&mut cur, format) {
                        Ok(table) => {
                            string_file_info.insert(table.lang_id, table);
                        }
                        Err(err) => log::debug!("StringFileInfo rejected: {err}"),
                    }
                    break;
                }
                "VarFileInfo" if child.length > 0 => {
                    log::trace!("skipping VarFileInfo");
                    cur.pos = align4(child_start + usize::from(child.length));
                }
                _ => {
                    log::debug!("unexpected version block {:?}", child.key);
                    break;
                }
            }
        }

        Ok(Self {
            fixed,
            string_file_info,
        })
    }
}

struct BlockHeader {
    length: u16,
    value_len: u16,
    w_type: u16,
    key: String,
}

struct Cursor<'a> {
    view: ByteView<'a>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            view: ByteView::le(data),
            pos: 0,
        }
    }

    fn u16(&mut self) -> Result<u16> {
        let v = self.view.u16_at(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let s = self.view.slice(self.pos, len)?;
        self.pos += len;
        Ok(s)
    }

    fn align(&mut self) {
        self.pos = align4(self.pos);
    }

    /// Read a NUL-terminated key in the format's encoding.
    fn key(&mut self, format: VersionFormat) -> Result<String> {
        match format {
            VersionFormat::Pe => {
                let mut units = Vec::new();
                loop {
                    let u = self.u16()?;
                    if u == 0 {
                        break;
                    }
                    units.push(u);
                }
                Ok(String::from_utf16_lossy(&units))
            }
            VersionFormat::Ne => {
                let bytes = self.view.cstr_at(self.pos)?;
                self.pos += bytes.len() + 1;
                Ok(codepage::decode_cp1252(bytes))
            }
        }
    }

    fn block_header(&mut self, format: VersionFormat) -> Result<BlockHeader> {
        let length = self.u16()?;
        let value_len = self.u16()?;
        let w_type = match format {
            VersionFormat::Pe => self.u16()?,
            VersionFormat::Ne => 0,
        };
        let key = self.key(format)?;
        self.align();
        Ok(BlockHeader {
            length,
            value_len,
            w_type,
            key,
        })
    }
}

/// Parse "040904B0" style language ids; all eight digits must be hex and
/// the value must be non-zero.
fn parse_lang_id(s: &str) -> Option<u32> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(s, 16).ok().filter(|&id| id != 0)
}

fn read_string_table(cur: &mut Cursor<'_>, format: VersionFormat) -> Result<StringTable> {
    let start = cur.pos;
    let length = cur.u16()?;
    let value_len = cur.u16()?;
    if value_len != 0 {
        return Err(Error::Corrupt("StringTable value length"));
    }
    if format == VersionFormat::Pe && cur.u16()? != 1 {
        return Err(Error::Corrupt("StringTable type"));
    }

    let lang_str = match format {
        VersionFormat::Pe => {
            let raw = cur.take(18)?;
            let v = ByteView::le(raw);
            if v.u16_at(16)? != 0 {
                return Err(Error::Corrupt("StringTable language id"));
            }
            let units: Vec<u16> = (0..8).map(|i| v.u16_at(i * 2)).collect::<Result<_>>()?;
            String::from_utf16_lossy(&units)
        }
        VersionFormat::Ne => {
            let raw = cur.take(9)?;
            if raw[8] != 0 {
                return Err(Error::Corrupt("StringTable language id"));
            }
            String::from_utf8_lossy(&raw[..8]).into_owned()
        }
    };
    let lang_id = parse_lang_id(&lang_str).ok_or(Error::Corrupt("StringTable language id"))?;
    cur.align();

    let table_len = i64::from(length) - (cur.pos - start) as i64;
    if table_len <= 0 {
        return Err(Error::Corrupt("StringTable length"));
    }
    let data = cur.take(table_len as usize)?;
    cur.align();

    let codepage = match lang_id as u16 {
        0 => codepage::CP_1252,
        cp => cp,
    };
    let (entries, encoding) = match format {
        VersionFormat::Pe => (parse_utf16_strings(data)?, StringEncoding::Utf16Le),
        VersionFormat::Ne => {
            let (entries, path) = parse_8bit_strings(data, codepage)?;
            (entries, StringEncoding::CodePage(path))
        }
    };
    Ok(StringTable {
        lang_id,
        encoding,
        entries,
    })
}

fn utf16_at(v: &ByteView<'_>, offset: usize, chars: usize) -> Result<Vec<u16>> {
    (0..chars).map(|i| v.u16_at(offset + i * 2)).collect()
}

fn parse_utf16_strings(data: &[u8]) -> Result<Vec<(String, String)>> {
    const FIELDS: usize = 6;
    let v = ByteView::le(data);
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let w_length = usize::from(v.u16_at(pos)?);
        let value_bytes = usize::from(v.u16_at(pos + 2)?) * 2;
        if v.u16_at(pos + 4)? != 1 {
            return Err(Error::Corrupt("String type"));
        }
        if w_length < FIELDS || value_bytes >= w_length || w_length > data.len() - pos {
            return Err(Error::Corrupt("String length"));
        }
        pos += FIELDS;

        let key_len = ((w_length - value_bytes - FIELDS) / 2).checked_sub(1).unwrap_or(0);
        if key_len == 0 {
            return Err(Error::Corrupt("String key length"));
        }
        let mut key = utf16_at(&v, pos, key_len)?;
        if v.u16_at(pos + key_len * 2)? != 0 {
            return Err(Error::Corrupt("String key terminator"));
        }
        // The key span runs up to the value and includes its padding.
        if let Some(nul) = key.iter().position(|&u| u == 0) {
            key.truncate(nul);
        }
        pos = align4(pos + (key_len + 1) * 2);

        let value = match (value_bytes / 2).checked_sub(1) {
            Some(value_len) if value_len > 0 => {
                let value = utf16_at(&v, pos, value_len)?;
                if v.u16_at(pos + value_len * 2)? != 0 {
                    return Err(Error::Corrupt("String value terminator"));
                }
                String::from_utf16_lossy(&value)
            }
            _ => String::new(),
        };

        entries.push((
            String::from_utf16_lossy(&key),
            codepage::dos2unix(&value),
        ));
        pos = align4(pos + value_bytes);
    }
    Ok(entries)
}

fn parse_8bit_strings(data: &[u8], codepage: u16) -> Result<(Vec<(String, String)>, DecodePath)> {
    const FIELDS: usize = 4;
    let v = ByteView::le(data);
    let mut entries = Vec::new();
    let mut path = DecodePath::Declared(codepage);
    let mut pos = 0usize;
    while pos < data.len() {
        let w_length = usize::from(v.u16_at(pos)?);
        let value_len_raw = usize::from(v.u16_at(pos + 2)?);
        if w_length < FIELDS || value_len_raw >= w_length || w_length > data.len() - pos {
            return Err(Error::Corrupt("String length"));
        }
        pos += FIELDS;

        let key_len = (w_length - value_len_raw - FIELDS).checked_sub(1).unwrap_or(0);
        if key_len == 0 {
            return Err(Error::Corrupt("String key length"));
        }
        let mut key = v.slice(pos, key_len)?;
        if v.u8_at(pos + key_len)? != 0 {
            return Err(Error::Corrupt("String key terminator"));
        }
        if let Some(nul) = key.iter().position(|&b| b == 0) {
            key = &key[..nul];
        }
        pos = align4(pos + key_len + 1);

        let (key, key_path) = codepage::decode(codepage, key);
        let value = match value_len_raw.checked_sub(1) {
            Some(value_len) if value_len > 0 => {
                let raw = v.slice(pos, value_len)?;
                if v.u8_at(pos + value_len)? != 0 {
                    return Err(Error::Corrupt("String value terminator"));
                }
                let (value, value_path) = codepage::decode(codepage, raw);
                if matches!(value_path, DecodePath::Cp1252Fallback { .. }) {
                    path = value_path;
                }
                value
            }
            _ => String::new(),
        };
        if matches!(key_path, DecodePath::Cp1252Fallback { .. }) {
            path = key_path;
        }

        entries.push((key, codepage::dos2unix(&value)));
        pos = align4(pos + value_len_raw);
    }
    Ok((entries, path))
}
