//! Machine-specific interpretation of ELF `e_flags`.

use crate::elf::e_machine::*;
use crate::elf::ElfClass;
use crate::sink::FieldSink;

const SPARC_MEMORY_ORDERING: [&str; 4] = [
    "Total Store Ordering",
    "Partial Store Ordering",
    "Relaxed Memory Ordering",
    "Invalid",
];

/// Bits 8..24 of `e_flags`.
const SPARC_FLAG_NAMES: &[Option<&str>] = &[
    Some("SPARC V8+"),
    Some("UltraSPARC I"),
    Some("HaL R1"),
    Some("UltraSPARC III"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("LE Data"),
];

const MIPS_LEVELS: [&str; 11] = [
    "MIPS-I",
    "MIPS-II",
    "MIPS-III",
    "MIPS-IV",
    "MIPS-V",
    "MIPS32",
    "MIPS64",
    "MIPS32 rel2",
    "MIPS64 rel2",
    "MIPS32 rel6",
    "MIPS64 rel6",
];

/// Low 12 bits, then the ASE nibble (bits 24..28) moved down to 12..16.
const MIPS_FLAG_NAMES: &[Option<&str>] = &[
    Some("No Reorder"),
    Some("PIC"),
    Some("CPIC"),
    Some("XGOT"),
    Some("UCODE"),
    Some("ABI2"),
    Some("ABI ON32"),
    Some("Options First"),
    Some("32-bit"),
    Some("FP64"),
    Some("NaN 2008"),
    None,
    None,
    Some("MicroMIPS"),
    Some("MIPS-16"),
    Some("MDMX"),
];

const PARISC_FLAG_NAMES: &[Option<&str>] = &[
    Some("Trap NULL"),
    Some("EXT"),
    Some("LSB"),
    Some("Wide"),
    Some("No KABP"),
    None,
    Some("Lazy Swap"),
];

const ARM_FLAG_NAMES: &[Option<&str>] = &[
    Some("RelExec"),
    None,
    Some("Interwork"),
    Some("APCS 26"),
    Some("APCS Float"),
    Some("PIC"),
    Some("Align8"),
    Some("New ABI"),
    Some("Old ABI"),
    Some("Soft Float"),
    Some("VFP Float"),
    Some("Maverick Float"),
];

const ALPHA_FLAG_NAMES: &[Option<&str>] = &[Some("Addresses <= 2GB"), Some("Relaxed Code Movement")];

const SUPERH_SUBTYPES: [Option<&str>; 25] = [
    None,
    Some("SH-1"),
    Some("SH-2"),
    Some("SH-3"),
    Some("SH-DSP"),
    Some("SH3-DSP"),
    Some("SH4AL-DSP"),
    None,
    Some("SH-3E"),
    Some("SH-4"),
    Some("SH-5"),
    Some("SH-2E"),
    Some("SH-4A"),
    Some("SH-2A"),
    None,
    None,
    Some("SH-4 (No FPU)"),
    Some("SH-4A (No FPU)"),
    Some("SH-4 (No MMU or FPU)"),
    Some("SH-2A (No FPU)"),
    Some("SH-3 (No MMU)"),
    Some("SH-2A/SH-4 (No FPU)"),
    Some("SH-2A/SH-3 (No FPU)"),
    Some("SH-2A/SH-4"),
    Some("SH-2A/SH-3E"),
];

/// Bits 8..16 of `e_flags`.
const SUPERH_FLAG_NAMES: &[Option<&str>] =
    &[Some("PIC"), None, None, None, None, None, None, Some("FDPIC")];

const RISCV_FP_ABI: [&str; 4] = ["Soft-Float", "Single-Float", "Double-Float", "Quad-Float"];

const RISCV_FLAG_NAMES: &[Option<&str>] = &[Some("RVC"), None, None, Some("RV32E")];

/// Emit the fields `e_flags` carries for `machine`, if any.
pub fn emit_cpu_flags(machine: u16, class: ElfClass, e_flags: u32, sink: &mut dyn FieldSink) {
    let is32 = class == ElfClass::Elf32;
    match machine {
        EM_68K if is32 => {
            let insn = if e_flags == 0 {
                Some("68020")
            } else if e_flags & 0x0100_0000 != 0 {
                Some("68000")
            } else if e_flags & 0x0081_0000 == 0x0081_0000 {
                Some("CPU32")
            } else if e_flags & 0x0200_0000 != 0 {
                Some("Fido")
            } else {
                None
            };
            if let Some(insn) = insn {
                sink.string("Instruction Set", insn);
            }
        }
        EM_SPARC32PLUS | EM_SPARCV9 => {
            // SPARC32PLUS is 32-bit only, SPARCV9 64-bit only.
            if (machine == EM_SPARC32PLUS) != is32 {
                return;
            }
            sink.string("Memory Ordering", SPARC_MEMORY_ORDERING[(e_flags & 3) as usize]);
            sink.bitfield("CPU Flags", e_flags >> 8, SPARC_FLAG_NAMES);
        }
        EM_MIPS | EM_MIPS_RS3_LE => {
            if is32 {
                sink.string("MIPS ABI", if e_flags & 0x20 != 0 { "N32" } else { "O32" });
            }
            let level = e_flags >> 28;
            match MIPS_LEVELS.get(level as usize) {
                Some(name) => sink.string("CPU Level", name),
                None => sink.string("CPU Level", &format!("Unknown (0x{level:02X})")),
            }
            let flags = (e_flags & 0xFFF) | ((e_flags >> 12) & 0xF000);
            sink.bitfield("CPU Flags", flags, MIPS_FLAG_NAMES);
        }
        EM_PARISC => {
            let mut version = match e_flags & 0xFFFF {
                0x0210 => "1.1",
                0x0214 => "2.0",
                _ => "1.0",
            }
            .to_string();
            if e_flags & 0x0008 != 0 {
                version.push_str(" (LP64)");
            }
            sink.string("PA-RISC Version", &version);
            sink.bitfield("CPU Flags", (e_flags >> 16) & 0x7F, PARISC_FLAG_NAMES);
        }
        EM_ARM if is32 => {
            let byte_order = match e_flags & 0x00C0_0000 {
                0x0080_0000 => " BE8",
                0x0040_0000 => " LE8",
                _ => "",
            };
            sink.string("ARM EABI", &format!("EABI{}{byte_order}", e_flags >> 24));
            sink.bitfield("CPU Flags", e_flags & 0xFFF, ARM_FLAG_NAMES);
        }
        EM_OLD_ALPHA | EM_ALPHA => {
            sink.bitfield("CPU Flags", e_flags & 3, ALPHA_FLAG_NAMES);
        }
        EM_SH => {
            if let Some(Some(subtype)) = SUPERH_SUBTYPES.get((e_flags & 0x1F) as usize) {
                sink.string("CPU Subtype", subtype);
            }
            sink.bitfield("CPU Flags", (e_flags >> 8) & 0xFF, SUPERH_FLAG_NAMES);
        }
        EM_RISCV => {
            sink.string("Floating-Point ABI", RISCV_FP_ABI[((e_flags & 6) >> 1) as usize]);
            sink.bitfield("CPU Flags", e_flags & 0xF, RISCV_FLAG_NAMES);
        }
        _ => {}
    }
}
