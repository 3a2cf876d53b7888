//! Optional header structures and parsing.

use crate::data_dir::{DataDirectory, DataDirectoryType};
use crate::endian::ByteView;
use crate::reader::Reader;
use crate::{Error, Result};

/// PE32 magic number.
pub const PE32_MAGIC: u16 = 0x10B;
/// PE32+ (64-bit) magic number.
pub const PE32PLUS_MAGIC: u16 = 0x20B;

/// Windows subsystem values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Subsystem {
    Unknown = 0,
    Native = 1,
    WindowsGui = 2,
    WindowsCui = 3,
    Os2Cui = 5,
    PosixCui = 7,
    NativeWindows = 8,
    WindowsCeGui = 9,
    EfiApplication = 10,
    EfiBootServiceDriver = 11,
    EfiRuntimeDriver = 12,
    EfiRom = 13,
    Xbox = 14,
    WindowsBootApplication = 16,
}

impl Subsystem {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Unknown),
            1 => Some(Self::Native),
            2 => Some(Self::WindowsGui),
            3 => Some(Self::WindowsCui),
            5 => Some(Self::Os2Cui),
            7 => Some(Self::PosixCui),
            8 => Some(Self::NativeWindows),
            9 => Some(Self::WindowsCeGui),
            10 => Some(Self::EfiApplication),
            11 => Some(Self::EfiBootServiceDriver),
            12 => Some(Self::EfiRuntimeDriver),
            13 => Some(Self::EfiRom),
            14 => Some(Self::Xbox),
            16 => Some(Self::WindowsBootApplication),
            _ => None,
        }
    }

    /// Display name; `Unknown` and the boot-application subsystem have none.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Native => Some("Native"),
            Self::WindowsGui => Some("Windows"),
            Self::WindowsCui => Some("Console"),
            Self::Os2Cui => Some("OS/2 Console"),
            Self::PosixCui => Some("POSIX Console"),
            Self::NativeWindows => Some("Win9x Native Driver"),
            Self::WindowsCeGui => Some("Windows CE"),
            Self::EfiApplication => Some("EFI Application"),
            Self::EfiBootServiceDriver => Some("EFI Boot Service Driver"),
            Self::EfiRuntimeDriver => Some("EFI Runtime Driver"),
            Self::EfiRom => Some("EFI ROM Image"),
            Self::Xbox => Some("Xbox"),
            Self::Unknown | Self::WindowsBootApplication => None,
        }
    }

    pub fn is_efi(self) -> bool {
        matches!(
            self,
            Self::EfiApplication | Self::EfiBootServiceDriver | Self::EfiRuntimeDriver | Self::EfiRom
        )
    }
}

/// DLL characteristics flags.
pub mod dll_characteristics {
    pub const HIGH_ENTROPY_VA: u16 = 0x0020;
    pub const DYNAMIC_BASE: u16 = 0x0040;
    pub const FORCE_INTEGRITY: u16 = 0x0080;
    pub const NX_COMPAT: u16 = 0x0100;
    pub const NO_ISOLATION: u16 = 0x0200;
    pub const NO_SEH: u16 = 0x0400;
    pub const NO_BIND: u16 = 0x0800;
    pub const APPCONTAINER: u16 = 0x1000;
    pub const WDM_DRIVER: u16 = 0x2000;
    pub const GUARD_CF: u16 = 0x4000;
    pub const TERMINAL_SERVER_AWARE: u16 = 0x8000;
}

/// Which optional-header layout was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeKind {
    Pe32,
    Pe32Plus,
}

/// Optional header, normalized across PE32 and PE32+.
///
/// PE32 fields are widened; `base_of_data` only exists in PE32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader {
    pub kind: PeKind,
    pub magic: u16,
    pub linker_version: (u8, u8),
    pub size_of_code: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: Option<u32>,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub os_version: (u16, u16),
    pub image_version: (u16, u16),
    pub subsystem_version: (u16, u16),
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_heap_reserve: u64,
    pub number_of_rva_and_sizes: u32,
    /// Always sixteen entries; absent ones are zero.
    pub data_directories: Vec<DataDirectory>,
}

impl OptionalHeader {
    /// Standard PE32 optional header size.
    pub const SIZE32: usize = 224;
    /// Standard PE32+ optional header size.
    pub const SIZE64: usize = 240;

    /// Parse from a buffer that starts at the optional header magic.
    ///
    /// The buffer must cover the fixed part of the header; data directories
    /// beyond the end of the buffer read as empty.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let v = ByteView::le(data);
        let magic = v.u16_at(0)?;
        let kind = match magic {
            PE32_MAGIC => PeKind::Pe32,
            PE32PLUS_MAGIC => PeKind::Pe32Plus,
            other => return Err(Error::InvalidOptionalHeaderMagic(other)),
        };
        let fixed = match kind {
            PeKind::Pe32 => 96,
            PeKind::Pe32Plus => 112,
        };
        if data.len() < fixed {
            return Err(Error::buffer_too_small(fixed, data.len()));
        }

        let (base_of_data, image_base, stack, heap, rva_count_at) = match kind {
            PeKind::Pe32 => (
                Some(v.u32_at(24)?),
                u64::from(v.u32_at(28)?),
                u64::from(v.u32_at(72)?),
                u64::from(v.u32_at(80)?),
                92,
            ),
            PeKind::Pe32Plus => (None, v.u64_at(24)?, v.u64_at(72)?, v.u64_at(88)?, 108),
        };
        let number_of_rva_and_sizes = v.u32_at(rva_count_at)?;
        let dirs_at = rva_count_at + 4;
        let data_directories = DataDirectory::parse_array(
            &data[dirs_at..],
            number_of_rva_and_sizes.min(16) as usize,
        );

        Ok(Self {
            kind,
            magic,
            linker_version: (v.u8_at(2)?, v.u8_at(3)?),
            size_of_code: v.u32_at(4)?,
            address_of_entry_point: v.u32_at(16)?,
            base_of_code: v.u32_at(20)?,
            base_of_data,
            image_base,
            section_alignment: v.u32_at(32)?,
            file_alignment: v.u32_at(36)?,
            os_version: (v.u16_at(40)?, v.u16_at(42)?),
            image_version: (v.u16_at(44)?, v.u16_at(46)?),
            subsystem_version: (v.u16_at(48)?, v.u16_at(50)?),
            size_of_image: v.u32_at(56)?,
            size_of_headers: v.u32_at(60)?,
            check_sum: v.u32_at(64)?,
            subsystem: v.u16_at(68)?,
            dll_characteristics: v.u16_at(70)?,
            size_of_stack_reserve: stack,
            size_of_heap_reserve: heap,
            number_of_rva_and_sizes,
            data_directories,
        })
    }

    /// Read the optional header at `offset`, taking `size` bytes as
    /// declared by the COFF header (clamped to the standard sizes).
    pub fn read_from<R: Reader>(reader: &R, offset: u64, size: u16) -> Result<Self> {
        let len = usize::from(size).clamp(2, Self::SIZE64);
        let buf = reader.read_bytes_at(offset, len)?;
        Self::parse(&buf)
    }

    pub fn is_pe32plus(&self) -> bool {
        self.kind == PeKind::Pe32Plus
    }

    pub fn subsystem_kind(&self) -> Option<Subsystem> {
        Subsystem::from_u16(self.subsystem)
    }

    pub fn data_directory(&self, dir: DataDirectoryType) -> DataDirectory {
        self.data_directories
            .get(dir.as_index())
            .copied()
            .unwrap_or_default()
    }

    /// Managed (.NET) image: the CLR header directory has a size.
    pub fn is_dotnet(&self) -> bool {
        self.data_directory(DataDirectoryType::ClrRuntime).size != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(magic: u16) -> Vec<u8> {
        let size = if magic == PE32_MAGIC { OptionalHeader::SIZE32 } else { OptionalHeader::SIZE64 };
        let mut buf = vec![0u8; size];
        buf[0..2].copy_from_slice(&magic.to_le_bytes());
        buf[16..20].copy_from_slice(&0x1234u32.to_le_bytes());
        buf[40..42].copy_from_slice(&6u16.to_le_bytes());
        buf[48..50].copy_from_slice(&5u16.to_le_bytes());
        buf[50..52].copy_from_slice(&1u16.to_le_bytes());
        buf[60..64].copy_from_slice(&0x400u32.to_le_bytes());
        buf[68..70].copy_from_slice(&2u16.to_le_bytes());
        buf[70..72].copy_from_slice(&dll_characteristics::NX_COMPAT.to_le_bytes());
        let (count_at, dirs_at) = if magic == PE32_MAGIC { (92, 96) } else { (108, 112) };
        buf[count_at..count_at + 4].copy_from_slice(&16u32.to_le_bytes());
        let clr = dirs_at + 14 * 8;
        buf[clr..clr + 4].copy_from_slice(&0x2000u32.to_le_bytes());
        buf[clr + 4..clr + 8].copy_from_slice(&0x48u32.to_le_bytes());
        buf
    }

    #[test]
    fn test_optional_header_sizes() {
        assert_eq!(OptionalHeader::SIZE32, 224);
        assert_eq!(OptionalHeader::SIZE64, 240);
    }

    #[test]
    fn test_parse_pe32() {
        let mut buf = build(PE32_MAGIC);
        buf[28..32].copy_from_slice(&0x0040_0000u32.to_le_bytes());
        let opt = OptionalHeader::parse(&buf).unwrap();
        assert_eq!(opt.kind, PeKind::Pe32);
        assert_eq!(opt.image_base, 0x0040_0000);
        assert_eq!(opt.address_of_entry_point, 0x1234);
        assert_eq!(opt.subsystem_kind(), Some(Subsystem::WindowsGui));
        assert_eq!(opt.subsystem_version, (5, 1));
        assert!(opt.is_dotnet());
    }

    #[test]
    fn test_parse_pe32plus() {
        let mut buf = build(PE32PLUS_MAGIC);
        buf[24..32].copy_from_slice(&0x1_4000_0000u64.to_le_bytes());
        let opt = OptionalHeader::parse(&buf).unwrap();
        assert!(opt.is_pe32plus());
        assert_eq!(opt.base_of_data, None);
        assert_eq!(opt.image_base, 0x1_4000_0000);
        assert_eq!(opt.size_of_headers, 0x400);
        assert_eq!(opt.data_directories.len(), 16);
    }

    #[test]
    fn test_reject_unknown_magic() {
        let mut buf = build(PE32_MAGIC);
        buf[0..2].copy_from_slice(&0x107u16.to_le_bytes());
        assert!(matches!(
            OptionalHeader::parse(&buf),
            Err(Error::InvalidOptionalHeaderMagic(0x107))
        ));
    }

    #[test]
    fn test_truncated_directories_read_empty() {
        let buf = build(PE32_MAGIC);
        let opt = OptionalHeader::parse(&buf[..100]).unwrap();
        assert!(!opt.is_dotnet());
    }

    #[test]
    fn test_subsystem_names() {
        assert_eq!(Subsystem::from_u16(3).and_then(Subsystem::name), Some("Console"));
        assert_eq!(Subsystem::from_u16(13).and_then(Subsystem::name), Some("EFI ROM Image"));
        assert!(Subsystem::EfiRuntimeDriver.is_efi());
        assert_eq!(Subsystem::from_u16(4), None);
    }
}
