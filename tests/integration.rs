//! End-to-end tests over synthetic images: detection, session decoding
//! and field emission for every container family.

mod common;

use common::{
    elf_header, fixed_file_info, mz_image, mz_with_signature, ne_version_info, pe_version_info,
    ElfBuilder, NeBuilder, PeBuilder, EM_X86_64, ET_DYN, ET_EXEC, NE_OFFSET, NE_RES_TABLE,
};
use exeinfo::{
    detect, ContainerFormat, Error, ExportAddress, Executable, FieldList, FieldValue, FileKind,
    Header, ImportSymbol, Limits, Linkage, ResourceReader, SliceReader, SymbolTable, SystemNameKind,
    VecReader,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open(data: Vec<u8>) -> Executable<VecReader> {
    init_logging();
    Executable::open(VecReader::new(data)).expect("fixture should open")
}

fn fields(exe: &Executable<VecReader>) -> FieldList {
    let mut list = FieldList::new();
    exe.emit_fields(&mut list);
    list
}

fn rows<'a>(list: &'a FieldList, tab: &str, name: &str) -> &'a [Vec<String>] {
    list.get_in(tab, name)
        .and_then(FieldValue::rows)
        .unwrap_or_else(|| panic!("no {name} list in {tab}"))
}

fn strings(row: &[&str]) -> Vec<String> {
    row.iter().map(|s| s.to_string()).collect()
}

fn pe_fixture() -> Vec<u8> {
    let version = pe_version_info(
        &fixed_file_info((1, 2, 3, 4), 1),
        &[("CompanyName", "Acme Corp"), ("FileDescription", "Fixture")],
    );
    PeBuilder::new()
        .import("msvcr100.dll", &["printf", "malloc"])
        .import("KERNEL32.dll", &["ExitProcess"])
        .version(version)
        .build()
}

#[test]
fn test_detect_every_family() {
    init_logging();
    let detect_bytes = |data: &[u8]| detect(&SliceReader::new(data)).unwrap();

    assert_eq!(detect_bytes(&mz_image(0x400)), ContainerFormat::Mz);
    for (sig, expect) in [
        (b"NE", ContainerFormat::Ne),
        (b"LE", ContainerFormat::Le),
        (b"LX", ContainerFormat::Lx),
        (b"W3", ContainerFormat::W3),
    ] {
        assert_eq!(detect_bytes(&mz_with_signature(sig, 0x400)), expect);
    }
    assert_eq!(detect_bytes(&PeBuilder::new().build()), ContainerFormat::Pe32);
    assert_eq!(detect_bytes(&PeBuilder::new().pe64().build()), ContainerFormat::Pe64);

    for (class, data, expect) in [
        (1, 1, ContainerFormat::Elf32Le),
        (1, 2, ContainerFormat::Elf32Be),
        (2, 1, ContainerFormat::Elf64Le),
        (2, 2, ContainerFormat::Elf64Be),
    ] {
        assert_eq!(detect_bytes(&elf_header(class, data, ET_EXEC, EM_X86_64)), expect);
    }

    let mut com = vec![0u8; 0x1200];
    com[0] = 0xE9;
    com[1..3].copy_from_slice(&0x118Du16.to_le_bytes());
    com[0x1190..0x1192].copy_from_slice(b"NE");
    assert_eq!(detect_bytes(&com), ContainerFormat::ComNe);

    assert_eq!(detect_bytes(&[]), ContainerFormat::Unknown);
    assert_eq!(detect_bytes(b"#!/bin/sh\n"), ContainerFormat::Unknown);
}

#[test]
fn test_unknown_file_does_not_open() {
    init_logging();
    let result = Executable::open(VecReader::new(b"plain text, not a program".to_vec()));
    assert!(matches!(result, Err(Error::UnsupportedFormat)));
}

#[test]
fn test_mz_session() {
    let exe = open(mz_image(0x400));
    assert_eq!(exe.format(), ContainerFormat::Mz);
    assert!(matches!(exe.header(), Header::Mz));
    assert_eq!(exe.system_name(SystemNameKind::Long), "Microsoft MS-DOS");
    assert!(exe.resource_reader().is_none());
    assert!(exe.version_info().is_none());

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["MZ"]);
    assert_eq!(list.get("Program Size").and_then(FieldValue::as_u64), Some(960));
    assert_eq!(list.get_str("Initial SS:SP"), Some("0010:0100"));
    assert!(list.get("Warning").is_none());
}

#[test]
fn test_mz_truncated_image_warns() {
    // Only a last-page count above 511 makes the size check apply.
    let mut data = mz_image(0x400);
    data[2..4].copy_from_slice(&600u16.to_le_bytes());
    let list = fields(&open(data));
    assert_eq!(list.get_str("Warning"), Some("Program image truncated"));
}

#[test]
fn test_pe32_session() {
    let exe = open(pe_fixture());
    assert_eq!(exe.format(), ContainerFormat::Pe32);
    assert_eq!(exe.format_name(), "32-bit Portable Executable");
    assert_eq!(exe.file_kind(), FileKind::Executable);
    assert_eq!(exe.system_name(SystemNameKind::Short), "Windows");
    assert_eq!(exe.header_offset(), 0x80);

    let summary = exe.summary();
    assert_eq!(summary.entry_point, Some(0x3000));
    assert_eq!(summary.cpu.as_deref(), Some("Intel i386"));
    assert_eq!(summary.subsystem.as_deref(), Some("Windows"));
    assert_eq!(summary.timestamp, Some(0x4B00_0000));
    assert_eq!(summary.linkage, None);

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["PE", "Version", "Imports", "MZ"]);
    assert_eq!(list.get_in("PE", "Type").and_then(FieldValue::as_str), Some("32-bit Portable Executable"));
    assert_eq!(list.get_str("CPU"), Some("Intel i386"));
    assert_eq!(list.get_str("OS Version"), Some("6.0"));
    assert_eq!(list.get_str("Subsystem"), Some("Windows 6.1"));
    assert_eq!(list.get("Timestamp"), Some(&FieldValue::DateTime(0x4B00_0000)));
    assert_eq!(list.get_str("Runtime DLL"), Some("Microsoft Visual C++ 2010 Runtime"));
    assert_eq!(list.get_in("MZ", "Header Size").and_then(FieldValue::as_u64), Some(64));
}

#[test]
fn test_pe_version_resource() {
    let exe = open(pe_fixture());
    let info = exe.version_info().expect("version resource");
    assert_eq!(info.fixed.file_version(), "1.2.3.4");
    assert_eq!(info.fixed.file_type_name(), "Application");
    assert_eq!(info.get("CompanyName"), Some("Acme Corp"));

    let list = fields(&exe);
    assert_eq!(list.get_in("Version", "File Version").and_then(FieldValue::as_str), Some("1.2.3.4"));
    assert_eq!(list.get_in("Version", "File OS").and_then(FieldValue::as_str), Some("Windows NT"));
    assert_eq!(
        rows(&list, "Version", "StringFileInfo"),
        [strings(&["CompanyName", "Acme Corp"]), strings(&["FileDescription", "Fixture"])]
    );

    let resources = exe.resource_reader().expect("resource directory");
    assert!(resources.open(16, Some(1), Some(0x409)).is_ok());
    assert!(matches!(resources.open(16, Some(2), None), Err(Error::NotFound)));
}

#[test]
fn test_pe_imports_sorted_with_hints() {
    let exe = open(pe_fixture());
    let imports = exe.imports();
    assert_eq!(imports.len(), 3);
    assert_eq!(imports[0].module, "KERNEL32.dll");
    assert_eq!(imports[0].symbol, ImportSymbol::Name("ExitProcess".into()));

    let list = fields(&exe);
    assert_eq!(
        rows(&list, "Imports", "Imports"),
        [
            strings(&["ExitProcess", "KERNEL32.dll", "0"]),
            strings(&["malloc", "msvcr100.dll", "1"]),
            strings(&["printf", "msvcr100.dll", "0"]),
        ]
    );
}

#[test]
fn test_pe64_dll_exports() {
    let data = PeBuilder::new()
        .pe64()
        .characteristics(0x2022)
        .dll_characteristics(0x0160)
        .export("Zeta", 0x3010)
        .export("Alpha", 0x3020)
        .forwarder("Beta", "NTDLL.RtlBeta")
        .import("VCRUNTIME140.dll", &["memset"])
        .build();
    let exe = open(data);
    assert_eq!(exe.format(), ContainerFormat::Pe64);
    assert_eq!(exe.file_kind(), FileKind::Dll);

    let exports = exe.exports();
    assert_eq!(exports.len(), 3);
    assert_eq!(exports[1].address, ExportAddress::Forwarder("NTDLL.RtlBeta".into()));

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["PE", "Exports", "Imports", "MZ"]);
    assert_eq!(
        rows(&list, "Exports", "Exports"),
        [
            strings(&["Alpha", "2", "0", "0x00003020"]),
            strings(&["Beta", "3", "1", "NTDLL.RtlBeta"]),
            strings(&["Zeta", "1", "2", "0x00003010"]),
        ]
    );
    assert_eq!(list.get_str("CPU"), Some("AMD64"));

    let runtime = exe.runtime_dll().expect("runtime DLL");
    assert_eq!(runtime.description, "Microsoft Visual C++ 2015-2022 Runtime");
    assert_eq!(runtime.url, Some("https://aka.ms/vs/17/release/VC_redist.x64.exe"));
}

#[test]
fn test_pe_system_names() {
    let efi = open(PeBuilder::new().subsystem(10).build());
    assert_eq!(efi.system_name(SystemNameKind::Short), "EFI");

    let driver = open(PeBuilder::new().subsystem(11).build());
    assert_eq!(driver.file_kind(), FileKind::DeviceDriver);

    let x360 = open(PeBuilder::new().machine(0x01F2).subsystem(14).build());
    assert_eq!(x360.system_name(SystemNameKind::Abbrev), "X360");

    let dotnet = fields(&open(PeBuilder::new().clr_header().build()));
    assert_eq!(dotnet.get_str("CPU"), Some("Intel i386 (.NET)"));
}

#[test]
fn test_pe_import_limits_respected() {
    init_logging();
    let limits = Limits {
        max_import_directory: 8,
        ..Limits::default()
    };
    let exe = Executable::open_with(VecReader::new(pe_fixture()), limits).unwrap();
    assert!(exe.imports().is_empty());
    assert!(exe.runtime_dll().is_none());
}

#[test]
fn test_pe_total_import_ceiling() {
    init_logging();
    let limits = Limits {
        max_imports: 2,
        ..Limits::default()
    };
    let exe = Executable::open_with(VecReader::new(pe_fixture()), limits).unwrap();
    let names: Vec<String> = exe.imports().iter().map(|e| e.symbol.to_string()).collect();
    // msvcr100.dll comes first in the directory and fills the set.
    assert_eq!(names, ["malloc", "printf"]);
}

#[test]
fn test_ne_shared_relocations_walked_once() {
    init_logging();
    let limits = Limits {
        max_import_records: 2,
        ..Limits::default()
    };
    let data = NeBuilder::new().segments(16).build();
    let exe = Executable::open_with(VecReader::new(data), limits).unwrap();
    let imports = exe.imports();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].symbol, ImportSymbol::Ordinal(102));
    assert_eq!(imports[1].module, "USER");

    let limits = Limits {
        max_imports: 1,
        ..Limits::default()
    };
    let data = NeBuilder::new().segments(16).build();
    let exe = Executable::open_with(VecReader::new(data), limits).unwrap();
    assert_eq!(exe.imports().len(), 1);
    assert_eq!(exe.imports()[0].module, "KERNEL");
}

#[test]
fn test_ne_resource_past_end_rejected() {
    init_logging();
    let version = ne_version_info(&fixed_file_info((3, 10, 0, 0), 1), &[("CompanyName", b"Acme")]);
    let mut data = NeBuilder::new().version(version).build();
    // Stretch the version resource to 0xFFFF units of 16 bytes.
    let length_at = NE_OFFSET + NE_RES_TABLE + 12;
    data[length_at..length_at + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
    let file_size = data.len() as u64;

    let exe = open(data);
    let resources = exe.resource_reader().expect("resource table");
    assert!(matches!(
        resources.open(16, None, None),
        Err(Error::OutOfRange { limit, .. }) if limit == file_size
    ));
    assert!(resources.read_resource(16, None, None).is_err());
    assert!(exe.version_info().is_none());
    assert_eq!(fields(&exe).tabs(), ["NE", "Entries", "Imports", "MZ"]);
}

#[test]
fn test_ne_session() {
    let version = ne_version_info(
        &fixed_file_info((3, 10, 0, 0), 1),
        &[("CompanyName", b"Acme"), ("LegalCopyright", b"\xA9 Acme 1992")],
    );
    let exe = open(NeBuilder::new().version(version).build());
    assert_eq!(exe.format(), ContainerFormat::Ne);
    assert_eq!(exe.file_kind(), FileKind::Executable);
    assert_eq!(exe.system_name(SystemNameKind::Long), "Microsoft Windows");
    assert_eq!(exe.summary().entry_point, Some(0x0001_0010));

    let info = exe.version_info().expect("NE version resource");
    assert_eq!(info.fixed.file_version(), "3.10.0.0");
    assert_eq!(info.get("LegalCopyright"), Some("\u{A9} Acme 1992"));

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["NE", "Version", "Entries", "Imports", "MZ"]);
    assert_eq!(list.get_str("Target OS"), Some("Microsoft Windows"));
    assert_eq!(list.get_str("DGroup Type"), Some("Multiple"));
    assert_eq!(list.get_str("Application Type"), Some("Windows application"));
    assert_eq!(list.get_str("Windows Version"), Some("3.10"));
    assert!(list.get("Timestamp").is_none());
}

#[test]
fn test_ne_entries_and_imports() {
    let exe = open(NeBuilder::new().build());
    let entries = exe.ne_entries().expect("entry table");
    assert_eq!(entries.module_name.as_deref(), Some("HELLO"));
    assert_eq!(entries.description.as_deref(), Some("Test Module"));

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["NE", "Entries", "Imports", "MZ"]);
    assert_eq!(
        rows(&list, "Entries", "Entries"),
        [
            strings(&["1", "MAINPROC", "01:0010", "Export"]),
            strings(&["2", "Helper", "01:0020", "Export, Non-resident"]),
        ]
    );
    assert_eq!(
        rows(&list, "Imports", "Imports"),
        [
            strings(&["Ordinal #102", "KERNEL", ""]),
            strings(&["MessageBoxA", "USER", ""]),
        ]
    );
}

#[test]
fn test_ne_targets() {
    let os2 = open(NeBuilder::new().target_os(1).build());
    let list = fields(&os2);
    assert_eq!(list.get_str("Target OS"), Some("IBM OS/2"));
    assert!(list.get("Windows Version").is_none());
    assert_eq!(os2.system_name(SystemNameKind::Short), "OS/2");

    let dll = open(NeBuilder::new().dll().build());
    assert_eq!(dll.file_kind(), FileKind::Dll);
}

#[test]
fn test_le_and_w3_sessions() {
    let le = open(mz_with_signature(b"LX", 0x400));
    assert_eq!(le.format(), ContainerFormat::Lx);
    let list = fields(&le);
    assert_eq!(list.tabs(), ["LE", "MZ"]);
    assert_eq!(list.get_str("Type"), Some("32-bit Linear Executable"));

    let w3 = open(mz_with_signature(b"W3", 0x400));
    assert_eq!(w3.system_name(SystemNameKind::Long), "Microsoft Windows");
    assert_eq!(fields(&w3).tabs(), ["W3", "MZ"]);
}

#[test]
fn test_elf_pie_session() {
    let data = ElfBuilder::new(ET_DYN)
        .interp("/lib64/ld-linux-x86-64.so.2")
        .dynamic()
        .notes()
        .symtab()
        .build();
    let exe = open(data);
    assert_eq!(exe.format(), ContainerFormat::Elf64Le);
    assert_eq!(exe.file_kind(), FileKind::Executable);
    assert_eq!(exe.summary().linkage, Some(Linkage::Dynamic));
    assert_eq!(exe.summary().cpu.as_deref(), Some("AMD64"));

    let list = fields(&exe);
    assert_eq!(list.tabs(), ["ELF", "PT_DYNAMIC", "SHT_SYMTAB"]);
    assert!(list.get("Type").is_none());
    assert_eq!(list.get_str("Format"), Some("64-bit Little-Endian"));
    assert_eq!(list.get_str("OS ABI"), Some("UNIX System V"));
    assert_eq!(list.get_str("Linkage"), Some("Dynamic"));
    assert_eq!(list.get_str("Interpreter"), Some("/lib64/ld-linux-x86-64.so.2"));
    assert_eq!(list.get_str("OS Version"), Some("GNU/Linux 3.2.0"));
    assert_eq!(list.get_str("Entry Point"), Some("0x00001040 (Position-Independent)"));
    let build_id: Vec<u8> = (1..=20).collect();
    assert_eq!(list.get("BuildID[sha1]"), Some(&FieldValue::HexDump(build_id)));
}

#[test]
fn test_elf_dynamic_section() {
    let exe = open(ElfBuilder::new(ET_DYN).interp("/lib/ld.so").dynamic().build());
    let dynamic = exe.dynamic_info().expect("PT_DYNAMIC");
    assert_eq!(dynamic.needed_names(), ["libc.so.6", "libfoo.so.1"]);

    let list = fields(&exe);
    assert_eq!(list.get_in("PT_DYNAMIC", "DT_SONAME").and_then(FieldValue::as_str), Some("libfoo.so.1"));
    assert_eq!(list.get_str("DT_RUNPATH"), Some("$ORIGIN/lib"));
    assert!(list.get("DT_RPATH").is_none());
    assert_eq!(list.get("DT_FLAGS_1").unwrap().set_bits(), ["Now", "PIE"]);
    assert_eq!(
        rows(&list, "PT_DYNAMIC", "DT_NEEDED"),
        [strings(&["libc.so.6"]), strings(&["libfoo.so.1"])]
    );
}

#[test]
fn test_elf_symbols_sorted() {
    let exe = open(ElfBuilder::new(ET_EXEC).symtab().build());
    let names: Vec<String> = exe
        .symbols(SymbolTable::Symtab)
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["counter", "main"]);
    assert!(exe.symbols(SymbolTable::Dynsym).is_empty());

    let list = fields(&exe);
    assert_eq!(
        rows(&list, "SHT_SYMTAB", "SHT_SYMTAB")[1],
        strings(&["main", "GLOBAL", "FUNC", "DEFAULT", "1", "0x00001040", "0x00000020"])
    );
}

#[test]
fn test_elf_static_and_shared() {
    let exe = open(ElfBuilder::new(ET_EXEC).build());
    let list = fields(&exe);
    assert_eq!(list.tabs(), ["ELF"]);
    assert_eq!(list.get_str("Linkage"), Some("Static"));
    assert_eq!(list.get_str("Entry Point"), Some("0x00001040"));

    let lib = open(ElfBuilder::new(ET_DYN).dynamic().build());
    assert_eq!(lib.file_kind(), FileKind::SharedLibrary);
    let list = fields(&lib);
    assert!(list.get("Linkage").is_none());
    assert!(list.get("Entry Point").is_none());
    assert_eq!(list.get_str("DT_SONAME"), Some("libfoo.so.1"));
}

#[test]
fn test_non_pe_sessions_have_no_exports() {
    for data in [mz_image(0x400), NeBuilder::new().build(), ElfBuilder::new(ET_EXEC).build()] {
        let exe = open(data);
        assert!(exe.exports().is_empty());
    }
    assert!(open(ElfBuilder::new(ET_EXEC).build()).imports().is_empty());
}

#[test]
fn test_open_from_file() {
    init_logging();
    let path = std::env::temp_dir().join(format!("exeinfo-test-{}.exe", std::process::id()));
    std::fs::write(&path, pe_fixture()).unwrap();
    let result = Executable::from_file(&path);
    std::fs::remove_file(&path).unwrap();

    let exe = result.unwrap();
    assert_eq!(exe.format(), ContainerFormat::Pe32);
    assert_eq!(exe.imports().len(), 3);
    assert_eq!(
        exe.version_info().and_then(|v| v.get("FileDescription")),
        Some("Fixture")
    );
}
