//! COFF file header structures and parsing.

use crate::endian::ByteView;
use crate::reader::Reader;
use crate::{Error, Result};

/// PE signature "PE\0\0".
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// Machine type constants referenced by the decoders.
pub mod machine {
    pub const I386: u16 = 0x014C;
    pub const ARMNT: u16 = 0x01C4;
    pub const POWERPCBE: u16 = 0x01F2;
    pub const AMD64: u16 = 0x8664;
    pub const ARM64: u16 = 0xAA64;
    pub const CEE: u16 = 0xC0EE;
}

/// Display name of a COFF machine type.
pub fn machine_name(machine: u16) -> Option<&'static str> {
    Some(match machine {
        0x014C => "Intel i386",
        0x014D => "Intel i860",
        0x0160 => "MIPS R3000 (big-endian)",
        0x0162 => "MIPS R3000",
        0x0166 => "MIPS R4000",
        0x0168 => "MIPS R10000",
        0x0169 => "MIPS (WCE v2)",
        0x0184 => "DEC Alpha AXP",
        0x01A2 => "Hitachi SH3",
        0x01A3 => "Hitachi SH3 DSP",
        0x01A4 => "Hitachi SH3E",
        0x01A6 => "Hitachi SH4",
        0x01A8 => "Hitachi SH5",
        0x01C0 => "ARM",
        0x01C2 => "ARM Thumb",
        0x01C4 => "ARM Thumb-2",
        0x01D3 => "Matsushita AM33",
        0x01F0 => "PowerPC",
        0x01F1 => "PowerPC with FPU",
        0x01F2 => "PowerPC (big-endian)",
        0x0200 => "Intel Itanium",
        0x0266 => "MIPS16",
        0x0268 => "Motorola 68000",
        0x0284 => "DEC Alpha AXP (64-bit)",
        0x0290 => "PA-RISC",
        0x0366 => "MIPS with FPU",
        0x0466 => "MIPS16 with FPU",
        0x0520 => "Infineon TriCore",
        0x0CEF => "Common Executable Format",
        0x0EBC => "EFI Byte Code",
        0x5032 => "RISC-V (32-bit)",
        0x5064 => "RISC-V (64-bit)",
        0x5128 => "RISC-V (128-bit)",
        0x6232 => "LoongArch (32-bit)",
        0x6264 => "LoongArch (64-bit)",
        0x8664 => "AMD64",
        0x9041 => "Mitsubishi M32R",
        0xA641 => "ARM64EC",
        0xA64E => "ARM64X",
        0xAA64 => "ARM64",
        0xC0EE => "MSIL",
        _ => return None,
    })
}

/// Characteristics flags for the COFF header.
pub mod characteristics {
    pub const RELOCS_STRIPPED: u16 = 0x0001;
    pub const EXECUTABLE_IMAGE: u16 = 0x0002;
    pub const LARGE_ADDRESS_AWARE: u16 = 0x0020;
    pub const MACHINE_32BIT: u16 = 0x0100;
    pub const DEBUG_STRIPPED: u16 = 0x0200;
    pub const SYSTEM: u16 = 0x1000;
    pub const DLL: u16 = 0x2000;
}

/// COFF file header (IMAGE_FILE_HEADER).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoffHeader {
    /// Target machine type.
    pub machine: u16,
    pub number_of_sections: u16,
    /// Link time (seconds since epoch), or a build hash on reproducible builds.
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

impl CoffHeader {
    /// Size of the COFF header in bytes.
    pub const SIZE: usize = 20;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::buffer_too_small(Self::SIZE, data.len()));
        }
        let v = ByteView::le(data);

        Ok(Self {
            machine: v.u16_at(0)?,
            number_of_sections: v.u16_at(2)?,
            time_date_stamp: v.u32_at(4)?,
            pointer_to_symbol_table: v.u32_at(8)?,
            number_of_symbols: v.u32_at(12)?,
            size_of_optional_header: v.u16_at(16)?,
            characteristics: v.u16_at(18)?,
        })
    }

    pub fn read_from<R: Reader>(reader: &R, offset: u64) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact_at(offset, &mut buf)?;
        Self::parse(&buf)
    }

    pub fn machine_name(&self) -> Option<&'static str> {
        machine_name(self.machine)
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics & characteristics::DLL != 0
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & characteristics::EXECUTABLE_IMAGE != 0
    }
}

/// Verify the PE signature at the given offset.
pub fn verify_pe_signature<R: Reader>(reader: &R, offset: u64) -> Result<()> {
    if reader.read_u32_at(offset)? != PE_SIGNATURE {
        return Err(Error::InvalidSignature("PE"));
    }
    Ok(())
}
