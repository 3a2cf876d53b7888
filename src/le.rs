//! Linear Executable (LE/LX) header structures and parsing.
//!
//! LE is used by Windows 3.x/9x virtual device drivers, LX by 32-bit OS/2.
//! Both share the same header layout.

use crate::endian::{ByteView, Endian};
use crate::ne::TargetOs;
use crate::reader::Reader;
use crate::{Error, Result};

/// "LE" signature.
pub const LE_SIGNATURE: u16 = 0x454C;
/// "LX" signature.
pub const LX_SIGNATURE: u16 = 0x584C;

/// Module type flags.
pub mod module_flags {
    pub const PER_PROCESS_INIT: u32 = 1 << 2;
    pub const NO_INTERNAL_FIXUPS: u32 = 1 << 4;
    pub const NO_EXTERNAL_FIXUPS: u32 = 1 << 5;
    pub const WINDOW_TYPE_MASK: u32 = 3 << 8;
    pub const NOT_LOADABLE: u32 = 1 << 13;
    pub const DLL: u32 = 1 << 15;
}

/// LE/LX header (0xA8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeHeader {
    pub is_lx: bool,
    /// Byte order of the multi-byte fields below.
    pub endian: Endian,
    pub word_order: u8,
    pub format_level: u32,
    pub cpu_type: u16,
    pub targ_os: u16,
    pub module_version: u32,
    pub module_type_flags: u32,
    pub module_page_count: u32,
    pub initial_cs_number: u32,
    pub initial_eip: u32,
    pub initial_ss_number: u32,
    pub initial_esp: u32,
    pub page_size: u32,
    pub bytes_on_last_page: u32,
    pub fixup_section_size: u32,
    pub loader_section_size: u32,
    pub object_table_offset: u32,
    pub object_table_count: u32,
    pub resource_table_offset: u32,
    pub resource_table_count: u32,
    pub resident_names_table_offset: u32,
    pub entry_table_offset: u32,
}

impl LeHeader {
    pub const SIZE: usize = 0xA8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let is_lx = match ByteView::le(data).u16_at(0)? {
            LE_SIGNATURE => false,
            LX_SIGNATURE => true,
            _ => return Err(Error::InvalidSignature("LE")),
        };
        let endian = if data[2] != 0 { Endian::Big } else { Endian::Little };
        let v = ByteView::new(data, endian);

        Ok(Self {
            is_lx,
            endian,
            word_order: data[3],
            format_level: v.u32_at(0x04)?,
            cpu_type: v.u16_at(0x08)?,
            targ_os: v.u16_at(0x0A)?,
            module_version: v.u32_at(0x0C)?,
            module_type_flags: v.u32_at(0x10)?,
            module_page_count: v.u32_at(0x14)?,
            initial_cs_number: v.u32_at(0x18)?,
            initial_eip: v.u32_at(0x1C)?,
            initial_ss_number: v.u32_at(0x20)?,
            initial_esp: v.u32_at(0x24)?,
            page_size: v.u32_at(0x28)?,
            bytes_on_last_page: v.u32_at(0x2C)?,
            fixup_section_size: v.u32_at(0x30)?,
            loader_section_size: v.u32_at(0x38)?,
            object_table_offset: v.u32_at(0x40)?,
            object_table_count: v.u32_at(0x44)?,
            resource_table_offset: v.u32_at(0x50)?,
            resource_table_count: v.u32_at(0x54)?,
            resident_names_table_offset: v.u32_at(0x58)?,
            entry_table_offset: v.u32_at(0x5C)?,
        })
    }

    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf)
    }

    pub fn target_os(&self) -> TargetOs {
        TargetOs::from_u16(self.targ_os)
    }

    /// Win386 target means a virtual device driver.
    pub fn is_vxd(&self) -> bool {
        self.target_os() == TargetOs::Win386
    }

    pub fn is_dll(&self) -> bool {
        self.module_type_flags & module_flags::DLL != 0
    }
}
