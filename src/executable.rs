//! Parsing session over one executable file.
//!
//! [`Executable::open`] detects the container format and decodes the
//! mandatory headers up front. Everything else (resources, version info,
//! imports, exports, dynamic section, symbols) is read on first use and
//! cached; a failure there is logged and reported as absent.

use std::cell::OnceCell;
use std::path::Path;

use crate::cpu;
use crate::coff::machine;
use crate::detect::{self, ContainerFormat};
use crate::dos::{DosHeader, MzWarning};
use crate::dynamic::{DynamicInfo, DT_FLAGS_1_NAMES, DT_FLAGS_NAMES};
use crate::elf::{e_machine, e_type, ElfClass, ElfHeader, ProgramInfo, SectionInfo};
use crate::elf_flags;
use crate::endian::Endian;
use crate::export::{self, ExportEntry};
use crate::import::{self, DllNames, ImportEntry};
use crate::le::LeHeader;
use crate::limits::Limits;
use crate::ne::{NeHeader, TargetOs};
use crate::ne_entry::{self, NeEntries, NeEntry};
use crate::ne_import;
use crate::ne_resource::NeResourceReader;
use crate::note::NoteInfo;
use crate::optional::Subsystem;
use crate::pe::PeHeaders;
use crate::pe_resource::PeResourceReader;
use crate::reader::{FileReader, Reader};
use crate::resource::ResourceReader;
use crate::runtime::{self, NeModuleScan, RuntimeDll};
use crate::sink::{Base, FieldSink};
use crate::symbol::{self, StringTable, Symbol};
use crate::version::{VersionInfo, FILE_FLAG_NAMES};
use crate::{Error, Result};

const NE_PROG_FLAG_NAMES: &[Option<&str>] = &[
    None,
    None,
    Some("Global Init"),
    Some("Protected Mode Only"),
    Some("8086 insns"),
    Some("80286 insns"),
    Some("80386 insns"),
    Some("FPU insns"),
];

const NE_APPL_FLAG_NAMES: &[Option<&str>] = &[
    None,
    None,
    None,
    Some("OS/2 Application"),
    None,
    Some("Image Error"),
    Some("Non-Conforming"),
    Some("DLL"),
];

const NE_OTHER_FLAG_NAMES: &[Option<&str>] = &[
    Some("Long File Names"),
    Some("Protected Mode"),
    Some("Proportional Fonts"),
    Some("Gangload Area"),
];

const PE_FLAG_NAMES: &[Option<&str>] = &[
    None,
    Some("Executable"),
    None,
    None,
    None,
    Some(">2GB addressing"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("DLL"),
    None,
    None,
];

const PE_DLL_FLAG_NAMES: &[Option<&str>] = &[
    None,
    None,
    None,
    None,
    None,
    Some("High Entropy VA"),
    Some("Dynamic Base"),
    Some("Force Integrity"),
    Some("NX Compatible"),
    Some("No Isolation"),
    Some("No SEH"),
    Some("No Bind"),
    Some("AppContainer"),
    Some("WDM Driver"),
    Some("Control Flow Guard"),
    Some("TS Aware"),
];

type SystemNames = [&'static str; 3];

const SYS_DOS: SystemNames = ["Microsoft MS-DOS", "MS-DOS", "DOS"];
const SYS_WINDOWS: SystemNames = ["Microsoft Windows", "Windows", "Windows"];
const SYS_OS2: SystemNames = ["IBM OS/2", "OS/2", "OS/2"];
const SYS_EURODOS: SystemNames = ["European MS-DOS 4.x", "EuroDOS 4.x", "EuroDOS 4.x"];
const SYS_BOSS: SystemNames = ["Borland Operating System Services", "BOSS", "BOSS"];
const SYS_PHARLAP_OS2: SystemNames = [
    "Phar Lap 286 DOS Extender, OS/2",
    "Phar Lap 286 OS/2",
    "Phar Lap 286 OS/2",
];
const SYS_PHARLAP_WINDOWS: SystemNames = [
    "Phar Lap 286 DOS Extender, Windows",
    "Phar Lap 286 Windows",
    "Phar Lap 286 Windows",
];
const SYS_UNKNOWN_NE: SystemNames = ["Unknown NE", "Unknown NE", "Unknown NE"];
const SYS_UNKNOWN_LE: SystemNames = ["Unknown LE/LX", "Unknown LE/LX", "Unknown LE/LX"];
const SYS_EFI: SystemNames = ["Extensible Firmware Interface", "EFI", "EFI"];
const SYS_XBOX: SystemNames = ["Microsoft Xbox", "Xbox", "Xbox"];
const SYS_XBOX_360: SystemNames = ["Microsoft Xbox 360", "Xbox 360", "X360"];
const SYS_XBOX_ONE: SystemNames = ["Microsoft Xbox One", "Xbox One", "Xbone"];
const SYS_ELF: SystemNames = ["Executable and Linkable Format", "ELF", "ELF"];
const SYS_WIIU: SystemNames = ["Nintendo Wii U", "Wii U", "Wii U"];

/// What kind of module a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Executable,
    Dll,
    DeviceDriver,
    ResourceLibrary,
    RomImage,
    RelocatableObject,
    SharedLibrary,
    CoreDump,
    Unknown,
}

impl FileKind {
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Executable => "Executable",
            FileKind::Dll => "Dynamic Link Library",
            FileKind::DeviceDriver => "Device Driver",
            FileKind::ResourceLibrary => "Resource Library",
            FileKind::RomImage => "ROM Image",
            FileKind::RelocatableObject => "Relocatable Object File",
            FileKind::SharedLibrary => "Shared Library",
            FileKind::CoreDump => "Core Dump",
            FileKind::Unknown => "Unknown",
        }
    }
}

/// Length of a system name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemNameKind {
    Long,
    Short,
    Abbrev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    Static,
    Dynamic,
}

impl Linkage {
    pub fn name(self) -> &'static str {
        match self {
            Linkage::Static => "Static",
            Linkage::Dynamic => "Dynamic",
        }
    }
}

/// Which ELF symbol table to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolTable {
    Symtab,
    Dynsym,
}

/// ELF header plus the program and section header walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfInfo {
    pub header: ElfHeader,
    pub program: ProgramInfo,
    pub sections: SectionInfo,
}

impl ElfInfo {
    /// Decode the ELF header and walk both header tables.
    ///
    /// Wii U images have no usable program headers. A table that cannot
    /// be walked is treated as empty.
    pub fn read<R: Reader>(reader: &R, limits: &Limits) -> Result<Self> {
        let header = ElfHeader::read_from(reader, 0)?;
        let program = if header.is_wiiu() {
            ProgramInfo::default()
        } else {
            ProgramInfo::read(reader, &header, limits).unwrap_or_else(|err| {
                log::debug!("ELF program headers unreadable: {err}");
                ProgramInfo::default()
            })
        };
        let sections = SectionInfo::read(reader, &header, limits).unwrap_or_else(|err| {
            log::debug!("ELF section headers unreadable: {err}");
            SectionInfo::default()
        });
        Ok(Self {
            header,
            program,
            sections,
        })
    }

    /// `ET_DYN` with an interpreter.
    pub fn is_pie(&self) -> bool {
        self.header.e_type == e_type::ET_DYN && self.program.has_interp
    }

    pub fn is_dynamic(&self) -> bool {
        self.header.is_wiiu() || self.program.dynamic.is_some()
    }

    /// Notes from `PT_NOTE` segments, or from `SHT_NOTE` sections when no
    /// segment carried any.
    pub fn notes(&self) -> &NoteInfo {
        if self.program.notes == NoteInfo::default() {
            &self.sections.notes
        } else {
            &self.program.notes
        }
    }

    /// PlayStation 2 IOP relocatable module: 32-bit little-endian MIPS-I
    /// using the O32 ABI.
    fn is_ps2_iop_module(&self) -> bool {
        let h = &self.header;
        h.class == ElfClass::Elf32
            && h.endian == Endian::Little
            && h.e_machine == e_machine::EM_MIPS
            && h.e_flags & 0x20 == 0
            && h.e_flags >> 28 == 0
    }

    pub fn file_kind(&self) -> FileKind {
        let h = &self.header;
        if h.is_wiiu() {
            return if h.e_type == e_type::ET_CAFE_RPL {
                FileKind::Executable
            } else {
                FileKind::Unknown
            };
        }
        match h.e_type {
            e_type::ET_REL => FileKind::RelocatableObject,
            e_type::ET_EXEC => FileKind::Executable,
            e_type::ET_DYN if self.is_pie() => FileKind::Executable,
            e_type::ET_DYN => FileKind::SharedLibrary,
            e_type::ET_CORE => FileKind::CoreDump,
            e_type::ET_SCE_IOPRELEXEC | e_type::ET_SCE_IOPRELEXEC2 if self.is_ps2_iop_module() => {
                FileKind::SharedLibrary
            }
            _ => FileKind::Unknown,
        }
    }
}

/// Decoded primary header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    /// Plain DOS executable; the DOS header is all there is.
    Mz,
    Ne(NeHeader),
    Le(LeHeader),
    /// Windows/386 kernel; nothing past the signature is decoded.
    W3,
    Pe(Box<PeHeaders>),
    Elf(Box<ElfInfo>),
}

/// Normalized summary of the primary header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutableHeader {
    /// Entry point as stored: CS:IP packed as `cs << 16 | ip` for MZ and
    /// NE, object-relative EIP for LE/LX, an RVA for PE, a virtual address
    /// for ELF.
    pub entry_point: Option<u64>,
    /// Target operating system or ABI.
    pub target: Option<String>,
    pub cpu: Option<String>,
    /// Raw characteristic flags of the primary header.
    pub flags: u64,
    pub subsystem: Option<String>,
    /// Link time, seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub linkage: Option<Linkage>,
}

/// An open executable.
pub struct Executable<R: Reader> {
    reader: R,
    limits: Limits,
    format: ContainerFormat,
    dos: Option<DosHeader>,
    header_offset: u64,
    header: Header,
    ne_scan: Option<NeModuleScan>,
    summary: ExecutableHeader,
    version: OnceCell<Option<VersionInfo>>,
    imports: OnceCell<Vec<ImportEntry>>,
    exports: OnceCell<Vec<ExportEntry>>,
    ne_entries: OnceCell<Option<NeEntries>>,
    dynamic: OnceCell<Option<DynamicInfo>>,
    pe_runtime: OnceCell<Option<RuntimeDll>>,
}

impl Executable<FileReader> {
    /// Open a file from disk with default limits.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(FileReader::open(path)?)
    }
}

impl<R: Reader> Executable<R> {
    pub fn open(reader: R) -> Result<Self> {
        Self::open_with(reader, Limits::default())
    }

    /// Detect the format and decode its headers.
    ///
    /// Returns [`Error::UnsupportedFormat`] when the format is not
    /// recognised, and the decoder's error when a recognised header is
    /// damaged.
    pub fn open_with(reader: R, limits: Limits) -> Result<Self> {
        let detection = detect::detect_full(&reader)?;
        let offset = detection.secondary_offset;
        let header = match detection.format {
            ContainerFormat::Unknown => return Err(Error::UnsupportedFormat),
            ContainerFormat::Mz => Header::Mz,
            ContainerFormat::Ne | ContainerFormat::ComNe => {
                Header::Ne(NeHeader::read_from(&reader, offset)?)
            }
            ContainerFormat::Le | ContainerFormat::Lx => {
                Header::Le(LeHeader::read_from(&reader, offset)?)
            }
            ContainerFormat::W3 => Header::W3,
            ContainerFormat::Pe32 | ContainerFormat::Pe64 => {
                Header::Pe(Box::new(PeHeaders::read_from(&reader, offset, &limits)?))
            }
            ContainerFormat::Elf32Le
            | ContainerFormat::Elf32Be
            | ContainerFormat::Elf64Le
            | ContainerFormat::Elf64Be => Header::Elf(Box::new(ElfInfo::read(&reader, &limits)?)),
        };
        log::debug!("opened {:?} image, header at {offset:#x}", detection.format);

        let ne_scan = match &header {
            Header::Ne(ne) => Some(ne_import::scan_modules(&reader, offset, ne, &limits)),
            _ => None,
        };

        let mut exe = Self {
            reader,
            limits,
            format: detection.format,
            dos: detection.dos,
            header_offset: offset,
            header,
            ne_scan,
            summary: ExecutableHeader::default(),
            version: OnceCell::new(),
            imports: OnceCell::new(),
            exports: OnceCell::new(),
            ne_entries: OnceCell::new(),
            dynamic: OnceCell::new(),
            pe_runtime: OnceCell::new(),
        };
        exe.summary = exe.build_summary();
        Ok(exe)
    }

    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn summary(&self) -> &ExecutableHeader {
        &self.summary
    }

    /// DOS header of MZ-family files. COM/NE hybrids have none.
    pub fn dos_header(&self) -> Option<&DosHeader> {
        self.dos.as_ref()
    }

    /// File offset of the NE/LE/PE header; zero for MZ and ELF.
    pub fn header_offset(&self) -> u64 {
        self.header_offset
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn format_name(&self) -> &'static str {
        match self.format {
            ContainerFormat::Mz => "MS-DOS Executable",
            ContainerFormat::Ne => "16-bit New Executable",
            ContainerFormat::ComNe => "16-bit COM/NE Hybrid",
            ContainerFormat::Le => "Mixed-Mode Linear Executable",
            ContainerFormat::W3 => "Windows/386 Kernel",
            ContainerFormat::Lx => "32-bit Linear Executable",
            ContainerFormat::Pe32 => "32-bit Portable Executable",
            ContainerFormat::Pe64 => "64-bit Portable Executable",
            ContainerFormat::Elf32Le
            | ContainerFormat::Elf32Be
            | ContainerFormat::Elf64Le
            | ContainerFormat::Elf64Be => "Executable and Linkable Format",
            ContainerFormat::Unknown => "Unknown",
        }
    }

    pub fn file_kind(&self) -> FileKind {
        match &self.header {
            Header::Mz | Header::W3 => FileKind::Executable,
            Header::Ne(ne) if ne.is_resource_library() => FileKind::ResourceLibrary,
            Header::Ne(ne) if ne.is_dll() => FileKind::Dll,
            Header::Ne(_) => FileKind::Executable,
            Header::Le(le) if le.is_vxd() => FileKind::DeviceDriver,
            Header::Le(le) if le.is_dll() => FileKind::Dll,
            Header::Le(_) => FileKind::Executable,
            Header::Pe(pe) if pe.is_dll() => FileKind::Dll,
            Header::Pe(pe) => match pe.optional_header.subsystem_kind() {
                Some(Subsystem::EfiBootServiceDriver | Subsystem::EfiRuntimeDriver) => {
                    FileKind::DeviceDriver
                }
                Some(Subsystem::EfiRom) => FileKind::RomImage,
                _ => FileKind::Executable,
            },
            Header::Elf(elf) => elf.file_kind(),
        }
    }

    /// Name of the system the file targets.
    pub fn system_name(&self, kind: SystemNameKind) -> &'static str {
        let names = match &self.header {
            Header::Mz => SYS_DOS,
            Header::Ne(ne) => match ne.targ_os {
                0 | 2 | 4 => SYS_WINDOWS,
                1 => SYS_OS2,
                3 => SYS_EURODOS,
                5 => SYS_BOSS,
                0x81 => SYS_PHARLAP_OS2,
                0x82 => SYS_PHARLAP_WINDOWS,
                _ => SYS_UNKNOWN_NE,
            },
            Header::Le(le) => match le.targ_os {
                0 | 2 | 4 => SYS_WINDOWS,
                1 => SYS_OS2,
                3 => SYS_EURODOS,
                _ => SYS_UNKNOWN_LE,
            },
            Header::W3 => SYS_WINDOWS,
            Header::Pe(pe) => match pe.optional_header.subsystem_kind() {
                Some(sub) if sub.is_efi() => SYS_EFI,
                Some(Subsystem::Xbox) => match pe.coff_header.machine {
                    machine::POWERPCBE => SYS_XBOX_360,
                    machine::AMD64 => SYS_XBOX_ONE,
                    _ => SYS_XBOX,
                },
                _ => SYS_WINDOWS,
            },
            Header::Elf(elf) if elf.header.is_wiiu() => SYS_WIIU,
            Header::Elf(_) => SYS_ELF,
        };
        match kind {
            SystemNameKind::Long => names[0],
            SystemNameKind::Short => names[1],
            SystemNameKind::Abbrev => names[2],
        }
    }

    fn ne_target_name(&self, ne: &NeHeader) -> String {
        let has_kernel = self.ne_scan.as_ref().map_or(true, |scan| scan.has_kernel);
        match ne.target_os_name(has_kernel) {
            Some(name) => name.to_string(),
            None => format!("Unknown (0x{:02X})", ne.targ_os),
        }
    }

    fn build_summary(&self) -> ExecutableHeader {
        match &self.header {
            Header::Mz => ExecutableHeader {
                entry_point: self
                    .dos
                    .map(|dos| u64::from(dos.e_cs) << 16 | u64::from(dos.e_ip)),
                target: Some(self.system_name(SystemNameKind::Long).to_string()),
                ..ExecutableHeader::default()
            },
            Header::Ne(ne) => ExecutableHeader {
                entry_point: Some(u64::from(ne.entry_point)),
                target: Some(self.ne_target_name(ne)),
                flags: u64::from(ne.appl_flags) << 8 | u64::from(ne.prog_flags),
                subsystem: Some(ne.application_type().to_string()),
                timestamp: ne.timestamp(),
                ..ExecutableHeader::default()
            },
            Header::Le(le) => ExecutableHeader {
                entry_point: Some(u64::from(le.initial_eip)),
                target: le.target_os().name().map(str::to_string),
                cpu: cpu::le_cpu_name(le.cpu_type).map(str::to_string),
                flags: u64::from(le.module_type_flags),
                ..ExecutableHeader::default()
            },
            Header::W3 => ExecutableHeader {
                target: Some(self.system_name(SystemNameKind::Long).to_string()),
                ..ExecutableHeader::default()
            },
            Header::Pe(pe) => {
                let opt = &pe.optional_header;
                let stamp = pe.coff_header.time_date_stamp;
                ExecutableHeader {
                    entry_point: Some(u64::from(pe.entry_point())),
                    target: Some(self.system_name(SystemNameKind::Long).to_string()),
                    cpu: pe.coff_header.machine_name().map(str::to_string),
                    flags: u64::from(pe.coff_header.characteristics),
                    subsystem: opt.subsystem_kind().and_then(Subsystem::name).map(str::to_string),
                    timestamp: (stamp != 0).then_some(i64::from(stamp)),
                    linkage: None,
                }
            }
            Header::Elf(elf) => {
                let h = &elf.header;
                ExecutableHeader {
                    entry_point: Some(h.e_entry),
                    target: cpu::elf_osabi_name(h.osabi).map(str::to_string),
                    cpu: cpu::elf_machine_name(h.e_machine).map(str::to_string),
                    flags: u64::from(h.e_flags),
                    subsystem: None,
                    timestamp: None,
                    linkage: Some(if elf.is_dynamic() {
                        Linkage::Dynamic
                    } else {
                        Linkage::Static
                    }),
                }
            }
        }
    }

    /// Resource directory of a PE or NE image.
    pub fn resource_reader(&self) -> Option<Box<dyn ResourceReader + '_>> {
        let result: Result<Box<dyn ResourceReader + '_>> = match &self.header {
            Header::Ne(ne) => NeResourceReader::new(&self.reader, self.header_offset, ne, &self.limits)
                .map(|r| Box::new(r) as Box<dyn ResourceReader + '_>),
            Header::Pe(pe) => PeResourceReader::new(&self.reader, pe, &self.limits)
                .map(|r| Box::new(r) as Box<dyn ResourceReader + '_>),
            _ => return None,
        };
        match result {
            Ok(reader) => Some(reader),
            Err(err) => {
                log::debug!("no resource directory: {err}");
                None
            }
        }
    }

    /// The first version resource, in any language.
    pub fn version_info(&self) -> Option<&VersionInfo> {
        self.version
            .get_or_init(|| {
                let resources = self.resource_reader()?;
                match resources.load_version_info(None, None) {
                    Ok(info) => Some(info),
                    Err(err) => {
                        log::debug!("version resource rejected: {err}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Imported functions, sorted by module then symbol.
    pub fn imports(&self) -> &[ImportEntry] {
        self.imports.get_or_init(|| {
            let result = match &self.header {
                Header::Ne(ne) => {
                    ne_import::read_imports(&self.reader, self.header_offset, ne, &self.limits)
                }
                Header::Pe(pe) => import::read_imports(&self.reader, pe, &self.limits),
                _ => return Vec::new(),
            };
            result.unwrap_or_else(|err| {
                log::debug!("imports unavailable: {err}");
                Vec::new()
            })
        })
    }

    /// PE exports.
    pub fn exports(&self) -> &[ExportEntry] {
        self.exports.get_or_init(|| {
            let Header::Pe(pe) = &self.header else {
                return Vec::new();
            };
            export::read_exports(&self.reader, pe, &self.limits).unwrap_or_else(|err| {
                log::debug!("exports unavailable: {err}");
                Vec::new()
            })
        })
    }

    /// NE entry table with resident and non-resident names.
    pub fn ne_entries(&self) -> Option<&NeEntries> {
        self.ne_entries
            .get_or_init(|| {
                let Header::Ne(ne) = &self.header else {
                    return None;
                };
                match ne_entry::read_entries(&self.reader, self.header_offset, ne, &self.limits) {
                    Ok(entries) => Some(entries),
                    Err(err) => {
                        log::debug!("NE entry table unavailable: {err}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Decoded `PT_DYNAMIC`.
    pub fn dynamic_info(&self) -> Option<&DynamicInfo> {
        self.dynamic
            .get_or_init(|| {
                let Header::Elf(elf) = &self.header else {
                    return None;
                };
                if elf.header.is_wiiu() {
                    return None;
                }
                let phdr = elf.program.dynamic.as_ref()?;
                match DynamicInfo::read(
                    &self.reader,
                    &elf.header,
                    phdr,
                    &elf.program.loads,
                    &self.limits,
                ) {
                    Ok(info) => Some(info),
                    Err(err) => {
                        log::debug!("PT_DYNAMIC unavailable: {err}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Named symbols of an ELF symbol table, sorted by name.
    pub fn symbols(&self, table: SymbolTable) -> Vec<Symbol> {
        let Header::Elf(elf) = &self.header else {
            return Vec::new();
        };
        let loc = match table {
            SymbolTable::Symtab => elf.sections.symtab,
            SymbolTable::Dynsym => elf.sections.dynsym,
        };
        let Some(loc) = loc else {
            return Vec::new();
        };
        let Some((offset, size)) = loc.strtab else {
            log::debug!("{table:?} has no linked string table");
            return Vec::new();
        };
        let Some(strtab) = StringTable::read_from(&self.reader, offset, size, &self.limits) else {
            log::debug!("{table:?} string table rejected");
            return Vec::new();
        };
        let raw = symbol::read_symbols(
            &self.reader,
            &loc,
            elf.header.class,
            elf.header.endian,
            &self.limits,
        );
        symbol::resolve_symbols(&raw, &strtab)
    }

    /// Runtime library the image depends on, if recognised.
    pub fn runtime_dll(&self) -> Option<&RuntimeDll> {
        match &self.header {
            Header::Ne(_) => self.ne_scan.as_ref()?.runtime.as_ref(),
            Header::Pe(pe) => self
                .pe_runtime
                .get_or_init(|| self.scan_pe_runtime(pe))
                .as_ref(),
            _ => None,
        }
    }

    fn scan_pe_runtime(&self, pe: &PeHeaders) -> Option<RuntimeDll> {
        let descriptors = match import::read_descriptors(&self.reader, pe, &self.limits) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                log::debug!("no import descriptors: {err}");
                return None;
            }
        };
        let names = match DllNames::read(&self.reader, pe, &descriptors, &self.limits) {
            Ok(names) => names,
            Err(err) => {
                log::debug!("import DLL names unreadable: {err}");
                return None;
            }
        };
        let names = names.lowercase_names(&descriptors);
        runtime::pe_runtime_dll(
            names.iter().map(String::as_str),
            pe.coff_header.machine,
            pe.is_64bit(),
        )
    }

    /// Emit every descriptive field to `sink`.
    pub fn emit_fields(&self, sink: &mut dyn FieldSink) {
        if let Header::Elf(elf) = &self.header {
            self.emit_elf(elf, sink);
            return;
        }

        sink.tab(match self.format {
            ContainerFormat::Ne | ContainerFormat::ComNe => "NE",
            ContainerFormat::Le | ContainerFormat::Lx => "LE",
            ContainerFormat::W3 => "W3",
            ContainerFormat::Pe32 | ContainerFormat::Pe64 => "PE",
            _ => "MZ",
        });
        sink.string("Type", self.format_name());
        match &self.header {
            Header::Mz => {
                if let Some(dos) = &self.dos {
                    self.emit_mz(dos, sink);
                }
                return;
            }
            Header::Ne(ne) => self.emit_ne(ne, sink),
            Header::Le(le) => emit_le(le, sink),
            Header::Pe(pe) => self.emit_pe(pe, sink),
            Header::W3 | Header::Elf(_) => {}
        }

        if let Some(dos) = &self.dos {
            sink.tab("MZ");
            self.emit_mz(dos, sink);
        }
    }

    fn emit_mz(&self, dos: &DosHeader, sink: &mut dyn FieldSink) {
        sink.numeric("Header Size", u64::from(dos.header_size()), Base::Dec, 0);
        sink.numeric("Program Size", u64::from(dos.program_size()), Base::Dec, 0);

        let mut warned = false;
        if self.format == ContainerFormat::Mz {
            let warning = self.reader.size().and_then(|size| dos.size_warning(size));
            if let Some(warning) = warning {
                sink.warning(warning.message());
                warned = true;
            }
        }

        match dos.memory_bounds() {
            Some((min, max)) => {
                sink.numeric("Min. Memory", u64::from(min), Base::Dec, 0);
                match max {
                    Some(max) => sink.numeric("Max. Memory", u64::from(max), Base::Dec, 0),
                    None => sink.string("Max. Memory", "All"),
                }
            }
            None => sink.string("Load Type", "High"),
        }

        sink.string("Initial CS:IP", &format!("{:04X}:{:04X}", dos.e_cs, dos.e_ip));
        sink.string("Initial SS:SP", &format!("{:04X}:{:04X}", dos.e_ss, dos.e_sp));

        if !dos.has_stack() && !warned {
            sink.warning(MzWarning::NoStack.message());
        }
    }

    fn emit_ne(&self, ne: &NeHeader, sink: &mut dyn FieldSink) {
        sink.string("Target OS", &self.ne_target_name(ne));
        sink.string("DGroup Type", ne.dgroup_type());
        sink.bitfield("Program Flags", u32::from(ne.prog_flags), NE_PROG_FLAG_NAMES);
        sink.string("Application Type", ne.application_type());
        sink.bitfield("Application Flags", u32::from(ne.appl_flags), NE_APPL_FLAG_NAMES);
        sink.bitfield("Other Flags", u32::from(ne.os2_exe_flags), NE_OTHER_FLAG_NAMES);
        if let Some(time) = ne.timestamp() {
            sink.datetime("Timestamp", time);
        }
        if let Some((major, minor)) = ne.expected_windows_version() {
            sink.string("Windows Version", &format!("{major}.{minor}"));
        }
        if ne.target_os() == TargetOs::Windows {
            if let Some(runtime) = self.runtime_dll() {
                sink.string("Runtime DLL", &runtime.description);
            }
        }

        self.emit_version_tab(sink);

        if let Some(entries) = self.ne_entries() {
            if !entries.entries.is_empty() {
                sink.tab("Entries");
                if let Some(name) = &entries.module_name {
                    sink.string("Module Name", name);
                }
                if let Some(description) = &entries.description {
                    sink.string("Description", description);
                }
                let rows = entries.entries.iter().map(NeEntry::row).collect();
                sink.list("Entries", &NeEntry::COLUMNS, rows);
            }
        }
        self.emit_imports_tab(sink);
    }

    fn emit_pe(&self, pe: &PeHeaders, sink: &mut dyn FieldSink) {
        let coff = &pe.coff_header;
        let opt = &pe.optional_header;

        let mut cpu = match coff.machine_name() {
            Some(name) => name.to_string(),
            None => format!("Unknown (0x{:04X})", coff.machine),
        };
        if opt.is_dotnet() {
            cpu.push_str(" (.NET)");
        }
        sink.string("CPU", &cpu);

        sink.string("OS Version", &format!("{}.{}", opt.os_version.0, opt.os_version.1));

        let (major, minor) = opt.subsystem_version;
        let subsystem = match (opt.subsystem, opt.subsystem_kind().and_then(Subsystem::name)) {
            (_, Some(name)) => format!("{name} {major}.{minor}"),
            (0, None) => format!("Unknown {major}.{minor}"),
            (other, None) => format!("Unknown ({other}) {major}.{minor}"),
        };
        sink.string("Subsystem", &subsystem);

        sink.bitfield("PE Flags", u32::from(coff.characteristics), PE_FLAG_NAMES);
        sink.bitfield("DLL Flags", u32::from(opt.dll_characteristics), PE_DLL_FLAG_NAMES);

        match coff.time_date_stamp {
            0 => sink.string("Timestamp", "Not set"),
            stamp => sink.datetime("Timestamp", i64::from(stamp)),
        }

        if let Some(runtime) = self.runtime_dll() {
            sink.string("Runtime DLL", &runtime.description);
        }

        self.emit_version_tab(sink);

        let exports = self.exports();
        if !exports.is_empty() {
            sink.tab("Exports");
            let rows = exports.iter().map(ExportEntry::row).collect();
            sink.list("Exports", &ExportEntry::COLUMNS, rows);
        }
        self.emit_imports_tab(sink);
    }

    fn emit_imports_tab(&self, sink: &mut dyn FieldSink) {
        let imports = self.imports();
        if !imports.is_empty() {
            sink.tab("Imports");
            let rows = imports.iter().map(ImportEntry::row).collect();
            sink.list("Imports", &ImportEntry::COLUMNS, rows);
        }
    }

    fn emit_version_tab(&self, sink: &mut dyn FieldSink) {
        if let Some(info) = self.version_info() {
            sink.tab("Version");
            emit_version(info, sink);
        }
    }

    fn emit_elf(&self, elf: &ElfInfo, sink: &mut dyn FieldSink) {
        let h = &elf.header;
        sink.tab("ELF");
        sink.string(
            "Format",
            match (h.class, h.endian) {
                (ElfClass::Elf32, Endian::Little) => "32-bit Little-Endian",
                (ElfClass::Elf64, Endian::Little) => "64-bit Little-Endian",
                (ElfClass::Elf32, Endian::Big) => "32-bit Big-Endian",
                (ElfClass::Elf64, Endian::Big) => "64-bit Big-Endian",
            },
        );
        match cpu::elf_machine_name(h.e_machine) {
            Some(name) => sink.string("CPU", name),
            None => sink.string("CPU", &format!("Unknown (0x{:04X})", h.e_machine)),
        }
        elf_flags::emit_cpu_flags(h.e_machine, h.class, h.e_flags, sink);

        match cpu::elf_osabi_name(h.osabi) {
            Some(name) => sink.string("OS ABI", name),
            None => sink.string("OS ABI", &format!("Unknown ({})", h.osabi)),
        }
        let wiiu = h.is_wiiu();
        if !wiiu {
            sink.numeric("ABI Version", u64::from(h.abi_version), Base::Dec, 0);
        }

        let executable = elf.file_kind() == FileKind::Executable;
        if executable {
            let linkage = if elf.is_dynamic() {
                Linkage::Dynamic
            } else {
                Linkage::Static
            };
            sink.string("Linkage", linkage.name());
        }
        if let Some(interpreter) = &elf.program.interpreter {
            sink.string("Interpreter", interpreter);
        }
        let notes = elf.notes();
        if let Some(os_version) = &notes.os_version {
            sink.string("OS Version", os_version);
        }
        if executable {
            let mut entry = format!("0x{:08X}", h.e_entry);
            if elf.is_pie() {
                entry.push_str(" (Position-Independent)");
            }
            sink.string("Entry Point", &entry);
        }
        if let Some(build_id) = &notes.build_id {
            sink.hexdump(&build_id.field_name(), &build_id.bytes);
        }

        if let Some(dynamic) = self.dynamic_info() {
            if dynamic.has_fields() {
                sink.tab("PT_DYNAMIC");
                emit_dynamic(dynamic, sink);
            }
        }

        for (name, table) in [
            ("SHT_SYMTAB", SymbolTable::Symtab),
            ("SHT_DYNSYM", SymbolTable::Dynsym),
        ] {
            let symbols = self.symbols(table);
            if symbols.is_empty() {
                continue;
            }
            sink.tab(name);
            let rows = symbols.iter().map(Symbol::row).collect();
            sink.list(name, &Symbol::COLUMNS, rows);
        }
    }
}

fn emit_le(le: &LeHeader, sink: &mut dyn FieldSink) {
    match cpu::le_cpu_name(le.cpu_type) {
        Some(name) => sink.string("CPU", name),
        None => sink.string("CPU", &format!("Unknown (0x{:04X})", le.cpu_type)),
    }
    match le.target_os().name() {
        Some(name) => sink.string("Target OS", name),
        None => sink.string("Target OS", &format!("Unknown (0x{:02X})", le.targ_os)),
    }
}

fn emit_version(info: &VersionInfo, sink: &mut dyn FieldSink) {
    let fixed = &info.fixed;
    sink.string("File Version", &fixed.file_version());
    sink.string("Product Version", &fixed.product_version());
    sink.bitfield("File Flags", fixed.effective_flags(), FILE_FLAG_NAMES);
    sink.string("File OS", &fixed.file_os_name());
    sink.string("File Type", &fixed.file_type_name());
    if let Some(subtype) = fixed.file_subtype_name() {
        sink.string("File Subtype", &subtype);
    }
    if let Some(time) = fixed.file_time() {
        sink.datetime("File Time", time);
    }
    if let Some(table) = info.string_table() {
        let rows = table
            .entries
            .iter()
            .map(|(key, value)| vec![key.clone(), value.clone()])
            .collect();
        sink.list("StringFileInfo", &["Key", "Value"], rows);
    }
}

fn emit_dynamic(dynamic: &DynamicInfo, sink: &mut dyn FieldSink) {
    if let Some(flags) = dynamic.flags {
        sink.bitfield("DT_FLAGS", flags, DT_FLAGS_NAMES);
    }
    if let Some(flags) = dynamic.flags_1 {
        sink.bitfield("DT_FLAGS_1", flags, DT_FLAGS_1_NAMES);
    }
    if let Some(soname) = dynamic.soname() {
        sink.string("DT_SONAME", &soname);
    }
    if let Some(rpath) = dynamic.rpath() {
        sink.string("DT_RPATH", &rpath);
    }
    if let Some(runpath) = dynamic.runpath() {
        sink.string("DT_RUNPATH", &runpath);
    }
    let needed = dynamic.needed_names();
    if !needed.is_empty() {
        let rows = needed.into_iter().map(|name| vec![name]).collect();
        sink.list("DT_NEEDED", &["Name"], rows);
    }
}
