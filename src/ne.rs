//! 16-bit New Executable (NE) header structures and parsing.

use crate::endian::ByteView;
use crate::reader::Reader;
use crate::{Error, Result};

/// NE signature "NE".
pub const NE_SIGNATURE: u16 = 0x454E;

/// Program flags (`ProgFlags`).
pub mod prog_flags {
    /// DGroup type mask (bits 0-1).
    pub const DGROUP_MASK: u8 = 0x03;
    pub const GLOBAL_INIT: u8 = 1 << 2;
    pub const PROTECTED_MODE_ONLY: u8 = 1 << 3;
    pub const INSTR_8086: u8 = 1 << 4;
    pub const INSTR_80286: u8 = 1 << 5;
    pub const INSTR_80386: u8 = 1 << 6;
    pub const INSTR_X87: u8 = 1 << 7;
}

/// Application flags (`ApplFlags`).
pub mod appl_flags {
    /// Application type mask (bits 0-1).
    pub const TYPE_MASK: u8 = 0x03;
    pub const OS2_APP: u8 = 1 << 3;
    pub const IMAGE_ERROR: u8 = 1 << 5;
    pub const NON_CONFORMING: u8 = 1 << 6;
    pub const DLL: u8 = 1 << 7;
}

/// Other OS/2 flags (`OS2EXEFlags`).
pub mod os2_flags {
    pub const LONG_FILE_NAMES: u8 = 1 << 0;
    pub const PROTECTED_MODE: u8 = 1 << 1;
    pub const PROPORTIONAL_FONTS: u8 = 1 << 2;
    pub const GANGLOAD_AREA: u8 = 1 << 3;
}

/// Target operating system byte shared by NE and LE/LX headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Unknown,
    Os2,
    Windows,
    EuropeanDos4,
    Win386,
    Boss,
    PharLapOs2,
    PharLapWindows,
    Other(u16),
}

impl TargetOs {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Os2,
            2 => Self::Windows,
            3 => Self::EuropeanDos4,
            4 => Self::Win386,
            5 => Self::Boss,
            0x81 => Self::PharLapOs2,
            0x82 => Self::PharLapWindows,
            other => Self::Other(other),
        }
    }

    /// Display name for the five documented values.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Os2 => Some("IBM OS/2"),
            Self::Windows => Some("Microsoft Windows"),
            Self::EuropeanDos4 => Some("European MS-DOS 4.x"),
            Self::Win386 => Some("Microsoft Windows (386)"),
            Self::Boss => Some("Borland Operating System Services"),
            _ => None,
        }
    }
}

/// NE header (64 bytes at `e_lfanew`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeHeader {
    pub link_version: (u8, u8),
    pub entry_table_offset: u16,
    pub entry_table_length: u16,
    /// CRC on OS/2; early Windows linkers store a DOS timestamp here.
    pub file_load_crc: u32,
    pub prog_flags: u8,
    pub appl_flags: u8,
    pub auto_data_seg_index: u8,
    pub init_heap_size: u16,
    pub init_stack_size: u16,
    /// CS:IP, CS is a segment index.
    pub entry_point: u32,
    /// SS:SP, SS is a segment index.
    pub init_stack: u32,
    pub seg_count: u16,
    pub mod_refs: u16,
    pub non_res_names_size: u16,
    pub seg_table_offset: u16,
    pub res_table_offset: u16,
    pub resid_name_table: u16,
    pub mod_ref_table: u16,
    pub import_name_table: u16,
    /// File offset (not header-relative) of the non-resident names table.
    pub off_start_non_res_tab: u32,
    pub mov_entry_count: u16,
    pub file_aln_sz_shft_cnt: u16,
    pub n_res_tab_entries: u16,
    pub targ_os: u8,
    pub os2_exe_flags: u8,
    pub ret_thunk_offset: u16,
    pub seg_ref_thunks_offset: u16,
    pub min_code_swap: u16,
    /// Expected Windows version, minor first.
    pub expected_win_ver: [u8; 2],
    /// Header bytes 0x10..0x20 are all zero.
    resource_only: bool,
}

impl NeHeader {
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);
        if v.u16_at(0)? != NE_SIGNATURE {
            return Err(Error::InvalidSignature("NE"));
        }

        Ok(Self {
            link_version: (data[2], data[3]),
            entry_table_offset: v.u16_at(0x04)?,
            entry_table_length: v.u16_at(0x06)?,
            file_load_crc: v.u32_at(0x08)?,
            prog_flags: data[0x0C],
            appl_flags: data[0x0D],
            auto_data_seg_index: data[0x0E],
            init_heap_size: v.u16_at(0x10)?,
            init_stack_size: v.u16_at(0x12)?,
            entry_point: v.u32_at(0x14)?,
            init_stack: v.u32_at(0x18)?,
            seg_count: v.u16_at(0x1C)?,
            mod_refs: v.u16_at(0x1E)?,
            non_res_names_size: v.u16_at(0x20)?,
            seg_table_offset: v.u16_at(0x22)?,
            res_table_offset: v.u16_at(0x24)?,
            resid_name_table: v.u16_at(0x26)?,
            mod_ref_table: v.u16_at(0x28)?,
            import_name_table: v.u16_at(0x2A)?,
            off_start_non_res_tab: v.u32_at(0x2C)?,
            mov_entry_count: v.u16_at(0x30)?,
            file_aln_sz_shft_cnt: v.u16_at(0x32)?,
            n_res_tab_entries: v.u16_at(0x34)?,
            targ_os: data[0x36],
            os2_exe_flags: data[0x37],
            ret_thunk_offset: v.u16_at(0x38)?,
            seg_ref_thunks_offset: v.u16_at(0x3A)?,
            min_code_swap: v.u16_at(0x3C)?,
            expected_win_ver: [data[0x3E], data[0x3F]],
            resource_only: data[0x10..0x20].iter().all(|&b| b == 0),
        })
    }

    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf)
    }

    pub fn target_os(&self) -> TargetOs {
        TargetOs::from_u16(u16::from(self.targ_os))
    }

    /// Resource-only library: no heap, stack, entry point or segments.
    pub fn is_resource_library(&self) -> bool {
        self.resource_only
    }

    pub fn is_dll(&self) -> bool {
        self.appl_flags & appl_flags::DLL != 0
    }

    pub fn dgroup_type(&self) -> &'static str {
        match self.prog_flags & prog_flags::DGROUP_MASK {
            0 => "None",
            1 => "Single Shared",
            2 => "Multiple",
            _ => "(null)",
        }
    }

    pub fn application_type(&self) -> &'static str {
        let os2 = self.target_os() == TargetOs::Os2;
        match (self.appl_flags & appl_flags::TYPE_MASK, os2) {
            (0, _) => "None",
            (1, true) => "Full Screen (not aware of Presentation Manager)",
            (2, true) => "Presentation Manager compatible",
            (_, true) => "Presentation Manager application",
            (1, false) => "Full Screen (not aware of Windows)",
            (2, false) => "Windows compatible",
            (_, false) => "Windows application",
        }
    }

    /// Target OS display name, given whether the module imports `KERNEL`.
    ///
    /// Windows 1.x/2.x left the target byte at zero, as did early OS/2;
    /// the only way to tell them apart is the KERNEL import. Phar Lap 286
    /// extenders use 0x81/0x82 for OS/2 and Windows respectively.
    pub fn target_os_name(&self, has_kernel: bool) -> Option<&'static str> {
        match self.target_os() {
            TargetOs::Unknown if has_kernel => Some("Windows 1.x/2.x"),
            TargetOs::Unknown => Some("Old OS/2"),
            TargetOs::PharLapOs2 => TargetOs::Os2.name(),
            TargetOs::PharLapWindows => TargetOs::Windows.name(),
            other => other.name(),
        }
    }

    /// Expected Windows version as (major, minor), for Windows targets.
    pub fn expected_windows_version(&self) -> Option<(u8, u8)> {
        match self.target_os() {
            TargetOs::Windows | TargetOs::Win386 => {
                Some((self.expected_win_ver[1], self.expected_win_ver[0]))
            }
            _ => None,
        }
    }

    /// Link timestamp, when `FileLoadCRC` holds a plausible DOS date.
    ///
    /// Only 1983 through 1985 are accepted; outside that window the field
    /// is a real CRC.
    pub fn timestamp(&self) -> Option<i64> {
        let t = self.file_load_crc;
        let year = ((t >> 25) & 0x7F) + 1980;
        if !(1983..=1985).contains(&year) {
            return None;
        }
        let month = (t >> 21) & 0x0F;
        let day = (t >> 16) & 0x1F;
        let hour = (t >> 11) & 0x1F;
        let minute = (t >> 5) & 0x3F;
        let second = (t & 0x1F) * 2;
        if !(1..=12).contains(&month) || day > 31 || hour > 23 || minute > 60 || second > 59 {
            return None;
        }
        let days = days_from_civil(i64::from(year), month, 1) + i64::from(day) - 1;
        Some(days * 86400 + i64::from(hour * 3600 + minute * 60 + second))
    }

    /// Segment sector shift; zero means the 512-byte default.
    pub fn sector_shift(&self) -> u32 {
        match self.file_aln_sz_shft_cnt {
            0 => 9,
            n => u32::from(n.min(31)),
        }
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
pub(crate) fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}

/// Segment flags.
pub mod segment_flags {
    pub const DATA: u16 = 0x0001;
    pub const MOVABLE: u16 = 0x0010;
    pub const PRELOAD: u16 = 0x0040;
    pub const RELOC_INFO: u16 = 0x0100;
    pub const DISCARDABLE: u16 = 0x1000;
}

/// Segment table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeSegment {
    /// File offset in sectors.
    pub offset: u16,
    /// Bytes in file; zero means 64 KiB.
    pub file_size: u16,
    pub flags: u16,
    /// Bytes in memory; zero means 64 KiB.
    pub mem_size: u16,
}

impl NeSegment {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let v = ByteView::le(data);
        Ok(Self {
            offset: v.u16_at(0)?,
            file_size: v.u16_at(2)?,
            flags: v.u16_at(4)?,
            mem_size: v.u16_at(6)?,
        })
    }

    pub fn file_offset(&self, shift: u32) -> u64 {
        u64::from(self.offset) << shift
    }

    pub fn data_len(&self) -> u32 {
        match self.file_size {
            0 => 0x10000,
            n => u32::from(n),
        }
    }

    pub fn has_relocations(&self) -> bool {
        self.flags & segment_flags::RELOC_INFO != 0
    }

    /// Read the segment table described by `header` at NE offset `ne_offset`.
    pub fn read_table<R: Reader>(reader: &R, ne_offset: u64, header: &NeHeader) -> Result<Vec<Self>> {
        let count = usize::from(header.seg_count);
        let buf = reader.read_bytes_at(
            ne_offset + u64::from(header.seg_table_offset),
            count * Self::SIZE,
        )?;
        buf.chunks_exact(Self::SIZE).map(Self::parse).collect()
    }
}
