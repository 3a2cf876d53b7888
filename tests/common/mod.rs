//! Synthetic executable images for the integration tests.
//!
//! Each builder lays out a small but structurally complete file: headers,
//! tables and payloads at fixed offsets, so tests can assert exact values.

#![allow(dead_code)]

fn put16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn put64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_le_bytes());
}

fn align_to(v: usize, a: usize) -> usize {
    (v + a - 1) / a * a
}

fn pad4(buf: &mut Vec<u8>) {
    buf.resize(align_to(buf.len(), 4), 0);
}

/// DOS header with a secondary header at `e_lfanew`.
fn dos_stub(buf: &mut [u8], e_lfanew: u32) {
    buf[0..2].copy_from_slice(b"MZ");
    put16(buf, 0x02, 0x90); // e_cblp
    put16(buf, 0x04, 3); // e_cp
    put16(buf, 0x08, 4); // e_cparhdr
    put16(buf, 0x0C, 0xFFFF); // e_maxalloc
    put16(buf, 0x10, 0xB8); // e_sp
    put16(buf, 0x18, 0x40); // e_lfarlc
    put32(buf, 0x3C, e_lfanew);
}

/// A DOS-only program of `len` bytes with a 64-byte header.
pub fn mz_image(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    buf[0..2].copy_from_slice(b"MZ");
    put16(&mut buf, 0x02, (len % 512) as u16);
    put16(&mut buf, 0x04, len.div_ceil(512) as u16);
    put16(&mut buf, 0x08, 4);
    put16(&mut buf, 0x0A, 0x10);
    put16(&mut buf, 0x0C, 0x20);
    put16(&mut buf, 0x0E, 0x10); // e_ss
    put16(&mut buf, 0x10, 0x100); // e_sp
    put16(&mut buf, 0x18, 0x1C);
    buf
}

/// An MZ stub followed by a bare secondary signature at 0x80.
pub fn mz_with_signature(sig: &[u8; 2], len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    dos_stub(&mut buf, 0x80);
    buf[0x80..0x82].copy_from_slice(sig);
    buf
}

// --- Version resources ---------------------------------------------------

/// `VS_FIXEDFILEINFO` for a Windows NT application.
pub fn fixed_file_info(file: (u16, u16, u16, u16), file_type: u32) -> Vec<u8> {
    let ms = u32::from(file.0) << 16 | u32::from(file.1);
    let ls = u32::from(file.2) << 16 | u32::from(file.3);
    [
        0xFEEF_04BD,
        0x0001_0000,
        ms,
        ls,
        ms,
        ls,
        0x3F,
        0,
        0x0004_0004,
        file_type,
        0,
        0,
        0,
    ]
    .iter()
    .flat_map(|v: &u32| v.to_le_bytes())
    .collect()
}

fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

fn pe_block(key: &str, w_type: u16, value_len: u16, value: &[u8], children: &[u8]) -> Vec<u8> {
    let mut b = vec![0u8; 6];
    b.extend(utf16z(key));
    pad4(&mut b);
    b.extend_from_slice(value);
    pad4(&mut b);
    b.extend_from_slice(children);
    let len = b.len() as u16;
    put16(&mut b, 0, len);
    put16(&mut b, 2, value_len);
    put16(&mut b, 4, w_type);
    b
}

fn pe_string(key: &str, value: &str) -> Vec<u8> {
    let v = utf16z(value);
    let mut b = pe_block(key, 1, (v.len() / 2) as u16, &v, &[]);
    let unpadded = b.len() - (align_to(v.len(), 4) - v.len());
    put16(&mut b, 0, unpadded as u16);
    b
}

/// UTF-16 `VS_VERSION_INFO` with one US English string table.
pub fn pe_version_info(fixed: &[u8], strings: &[(&str, &str)]) -> Vec<u8> {
    let body: Vec<u8> = strings.iter().flat_map(|(k, v)| pe_string(k, v)).collect();
    let table = pe_block("040904B0", 1, 0, &[], &body);
    let sfi = pe_block("StringFileInfo", 1, 0, &[], &table);
    pe_block("VS_VERSION_INFO", 0, fixed.len() as u16, fixed, &sfi)
}

fn ne_block(key: &str, value: &[u8], children: &[u8]) -> Vec<u8> {
    let mut b = vec![0u8; 4];
    b.extend_from_slice(key.as_bytes());
    b.push(0);
    pad4(&mut b);
    b.extend_from_slice(value);
    pad4(&mut b);
    b.extend_from_slice(children);
    let len = b.len() as u16;
    put16(&mut b, 0, len);
    put16(&mut b, 2, value.len() as u16);
    b
}

fn ne_string(key: &str, value: &[u8]) -> Vec<u8> {
    let mut v = value.to_vec();
    v.push(0);
    let mut b = ne_block(key, &v, &[]);
    let unpadded = b.len() - (align_to(v.len(), 4) - v.len());
    put16(&mut b, 0, unpadded as u16);
    b
}

/// 8-bit `VS_VERSION_INFO` in code page 1252.
pub fn ne_version_info(fixed: &[u8], strings: &[(&str, &[u8])]) -> Vec<u8> {
    let body: Vec<u8> = strings.iter().flat_map(|(k, v)| ne_string(k, v)).collect();
    let table = ne_block("040904E4", &[], &body);
    let sfi = ne_block("StringFileInfo", &[], &table);
    ne_block("VS_VERSION_INFO", fixed, &sfi)
}

// --- PE ------------------------------------------------------------------

const PE_OFFSET: usize = 0x80;
const SIZE_OF_HEADERS: usize = 0x400;
const RDATA_RVA: u32 = 0x1000;
const RDATA_SIZE: usize = 0x1000;
const RSRC_RVA: u32 = 0x2000;
const RSRC_OFFSET: usize = SIZE_OF_HEADERS + RDATA_SIZE;

/// Builder for a PE32 or PE32+ image with an `.rdata` section holding
/// the import and export directories and an optional `.rsrc` section.
#[derive(Debug, Clone)]
pub struct PeBuilder {
    pe32plus: bool,
    machine: u16,
    characteristics: u16,
    subsystem: u16,
    dll_characteristics: u16,
    timestamp: u32,
    entry_point: u32,
    clr_header: bool,
    imports: Vec<(String, Vec<String>)>,
    exports: Vec<(String, Export)>,
    version: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
enum Export {
    Rva(u32),
    Forwarder(String),
}

impl PeBuilder {
    pub fn new() -> Self {
        Self {
            pe32plus: false,
            machine: 0x014C,
            characteristics: 0x0102,
            subsystem: 2,
            dll_characteristics: 0,
            timestamp: 0x4B00_0000,
            entry_point: 0x3000,
            clr_header: false,
            imports: Vec::new(),
            exports: Vec::new(),
            version: None,
        }
    }

    /// PE32+ with an AMD64 machine type.
    pub fn pe64(mut self) -> Self {
        self.pe32plus = true;
        self.machine = 0x8664;
        self.characteristics = 0x0022;
        self
    }

    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    pub fn characteristics(mut self, characteristics: u16) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn subsystem(mut self, subsystem: u16) -> Self {
        self.subsystem = subsystem;
        self
    }

    pub fn dll_characteristics(mut self, flags: u16) -> Self {
        self.dll_characteristics = flags;
        self
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark the image as managed code.
    pub fn clr_header(mut self) -> Self {
        self.clr_header = true;
        self
    }

    pub fn import(mut self, module: &str, symbols: &[&str]) -> Self {
        self.imports.push((
            module.to_string(),
            symbols.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn export(mut self, name: &str, rva: u32) -> Self {
        self.exports.push((name.to_string(), Export::Rva(rva)));
        self
    }

    pub fn forwarder(mut self, name: &str, target: &str) -> Self {
        self.exports
            .push((name.to_string(), Export::Forwarder(target.to_string())));
        self
    }

    pub fn version(mut self, block: Vec<u8>) -> Self {
        self.version = Some(block);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut rdata = Rdata::default();
        let import_dir = self.layout_imports(&mut rdata);
        let export_dir = self.layout_exports(&mut rdata);
        assert!(rdata.buf.len() <= RDATA_SIZE, "fixture .rdata overflow");

        let rsrc = self.version.as_deref().map(resource_tree);
        let rsrc_size = rsrc.as_ref().map_or(0, |r| align_to(r.len(), 0x200));

        let mut buf = vec![0u8; RSRC_OFFSET + rsrc_size];
        dos_stub(&mut buf, PE_OFFSET as u32);
        buf[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let opt_size: usize = if self.pe32plus { 240 } else { 224 };
        let nsections = if rsrc.is_some() { 2 } else { 1 };
        let coff = PE_OFFSET + 4;
        put16(&mut buf, coff, self.machine);
        put16(&mut buf, coff + 2, nsections);
        put32(&mut buf, coff + 4, self.timestamp);
        put16(&mut buf, coff + 16, opt_size as u16);
        put16(&mut buf, coff + 18, self.characteristics);

        let opt = coff + 20;
        put16(&mut buf, opt, if self.pe32plus { 0x20B } else { 0x10B });
        put32(&mut buf, opt + 16, self.entry_point);
        if self.pe32plus {
            put64(&mut buf, opt + 24, 0x1_4000_0000);
        } else {
            put32(&mut buf, opt + 28, 0x40_0000);
        }
        put32(&mut buf, opt + 32, 0x1000);
        put32(&mut buf, opt + 36, 0x200);
        put16(&mut buf, opt + 40, 6);
        put16(&mut buf, opt + 48, 6);
        put16(&mut buf, opt + 50, 1);
        put32(&mut buf, opt + 56, 0x4000);
        put32(&mut buf, opt + 60, SIZE_OF_HEADERS as u32);
        put16(&mut buf, opt + 68, self.subsystem);
        put16(&mut buf, opt + 70, self.dll_characteristics);
        let (count_at, dirs) = if self.pe32plus { (108, 112) } else { (92, 96) };
        put32(&mut buf, opt + count_at, 16);
        let mut dir = |index: usize, (va, size): (u32, u32)| {
            put32(&mut buf, opt + dirs + index * 8, va);
            put32(&mut buf, opt + dirs + index * 8 + 4, size);
        };
        if let Some(d) = export_dir {
            dir(0, d);
        }
        if let Some(d) = import_dir {
            dir(1, d);
        }
        if let Some(r) = &rsrc {
            dir(2, (RSRC_RVA, r.len() as u32));
        }
        if self.clr_header {
            dir(14, (0x3800, 0x48));
        }

        let table = opt + opt_size;
        write_section(&mut buf, table, b".rdata", RDATA_RVA, RDATA_SIZE, SIZE_OF_HEADERS, 0x4000_0040);
        buf[SIZE_OF_HEADERS..SIZE_OF_HEADERS + rdata.buf.len()].copy_from_slice(&rdata.buf);
        if let Some(r) = rsrc {
            write_section(&mut buf, table + 40, b".rsrc", RSRC_RVA, rsrc_size, RSRC_OFFSET, 0x4000_0040);
            buf[RSRC_OFFSET..RSRC_OFFSET + r.len()].copy_from_slice(&r);
        }
        buf
    }

    fn layout_imports(&self, rdata: &mut Rdata) -> Option<(u32, u32)> {
        if self.imports.is_empty() {
            return None;
        }
        let width = if self.pe32plus { 8 } else { 4 };
        let mut descriptors = Vec::new();
        for (module, symbols) in &self.imports {
            let name_rva = rdata.cstr(module);
            let hint_rvas: Vec<u32> = symbols
                .iter()
                .enumerate()
                .map(|(hint, symbol)| {
                    let mut entry = (hint as u16).to_le_bytes().to_vec();
                    entry.extend_from_slice(symbol.as_bytes());
                    entry.push(0);
                    rdata.alloc(&entry, 2)
                })
                .collect();
            let mut thunks = vec![0u8; (hint_rvas.len() + 1) * width];
            for (i, rva) in hint_rvas.iter().enumerate() {
                if self.pe32plus {
                    put64(&mut thunks, i * 8, u64::from(*rva));
                } else {
                    put32(&mut thunks, i * 4, *rva);
                }
            }
            let ilt = rdata.alloc(&thunks, 8);
            descriptors.push((name_rva, ilt));
        }
        let mut table = vec![0u8; (descriptors.len() + 1) * 20];
        for (i, (name_rva, ilt)) in descriptors.iter().enumerate() {
            put32(&mut table, i * 20, *ilt);
            put32(&mut table, i * 20 + 12, *name_rva);
            put32(&mut table, i * 20 + 16, *ilt);
        }
        let size = table.len() as u32;
        Some((rdata.alloc(&table, 4), size))
    }

    /// One contiguous export directory: header, tables, then strings, so
    /// forwarder strings fall inside the directory range.
    fn layout_exports(&self, rdata: &mut Rdata) -> Option<(u32, u32)> {
        if self.exports.is_empty() {
            return None;
        }
        let base = rdata.alloc(&[], 4);
        let count = self.exports.len();
        let functions_at = 40;
        let names_at = functions_at + count * 4;
        let ordinals_at = names_at + count * 4;
        let strings_at = align_to(ordinals_at + count * 2, 4);

        let mut dir = vec![0u8; strings_at];
        let mut strings = Vec::new();
        let string_rva = |strings: &mut Vec<u8>, s: &str| {
            let rva = base + (strings_at + strings.len()) as u32;
            strings.extend_from_slice(s.as_bytes());
            strings.push(0);
            rva
        };

        let dll_name = string_rva(&mut strings, "fixture.dll");
        put32(&mut dir, 12, dll_name);
        put32(&mut dir, 16, 1);
        put32(&mut dir, 20, count as u32);
        put32(&mut dir, 24, count as u32);
        put32(&mut dir, 28, base + functions_at as u32);
        put32(&mut dir, 32, base + names_at as u32);
        put32(&mut dir, 36, base + ordinals_at as u32);

        for (index, (_, export)) in self.exports.iter().enumerate() {
            let rva = match export {
                Export::Rva(rva) => *rva,
                Export::Forwarder(target) => string_rva(&mut strings, target),
            };
            put32(&mut dir, functions_at + index * 4, rva);
        }
        let mut sorted: Vec<(usize, &str)> = self
            .exports
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (i, name.as_str()))
            .collect();
        sorted.sort_by_key(|(_, name)| *name);
        for (hint, (index, name)) in sorted.into_iter().enumerate() {
            let rva = string_rva(&mut strings, name);
            put32(&mut dir, names_at + hint * 4, rva);
            put16(&mut dir, ordinals_at + hint * 2, index as u16);
        }

        dir.extend_from_slice(&strings);
        let size = dir.len() as u32;
        rdata.alloc(&dir, 4);
        Some((base, size))
    }
}

impl Default for PeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct Rdata {
    buf: Vec<u8>,
}

impl Rdata {
    fn alloc(&mut self, data: &[u8], align: usize) -> u32 {
        let at = align_to(self.buf.len(), align);
        self.buf.resize(at, 0);
        self.buf.extend_from_slice(data);
        RDATA_RVA + at as u32
    }

    fn cstr(&mut self, s: &str) -> u32 {
        let mut data = s.as_bytes().to_vec();
        data.push(0);
        self.alloc(&data, 2)
    }
}

fn write_section(
    buf: &mut [u8],
    at: usize,
    name: &[u8],
    rva: u32,
    size: usize,
    offset: usize,
    characteristics: u32,
) {
    buf[at..at + name.len()].copy_from_slice(name);
    put32(buf, at + 8, size as u32);
    put32(buf, at + 12, rva);
    put32(buf, at + 16, size as u32);
    put32(buf, at + 20, offset as u32);
    put32(buf, at + 36, characteristics);
}

/// Resource tree: RT_VERSION -> id 1 -> language 0x409 -> `payload`.
fn resource_tree(payload: &[u8]) -> Vec<u8> {
    let mut r = vec![0u8; 0x60];
    let mut dir = |at: usize, id: u32, target: u32| {
        put16(&mut r, at + 14, 1);
        put32(&mut r, at + 16, id);
        put32(&mut r, at + 20, target);
    };
    dir(0x00, 16, 0x8000_0018);
    dir(0x18, 1, 0x8000_0030);
    dir(0x30, 0x409, 0x48);
    put32(&mut r, 0x48, RSRC_RVA + 0x60);
    put32(&mut r, 0x4C, payload.len() as u32);
    put32(&mut r, 0x50, 1252);
    r.extend_from_slice(payload);
    r
}

// --- NE ------------------------------------------------------------------

pub const NE_OFFSET: usize = 0x80;
/// Resource table, relative to the NE header.
pub const NE_RES_TABLE: usize = 0x48;
const NE_NONRES_OFFSET: usize = 0x200;
const NE_SEGMENT_OFFSET: usize = 0x400;
const NE_VERSION_OFFSET: usize = 0x500;
const NE_SHIFT: u16 = 4;

/// Builder for a Windows NE module with one code segment importing from
/// KERNEL and USER, two entry points and an optional version resource.
#[derive(Debug, Clone)]
pub struct NeBuilder {
    target_os: u8,
    appl_flags: u8,
    windows_version: (u8, u8),
    version: Option<Vec<u8>>,
    segments: u16,
}

impl NeBuilder {
    pub fn new() -> Self {
        Self {
            target_os: 2,
            appl_flags: 0x03,
            windows_version: (3, 10),
            version: None,
            segments: 1,
        }
    }

    /// Repeat the code segment `count` times, every copy sharing one
    /// relocation block. The table moves to NE offset 0x100 (16 entries max).
    pub fn segments(mut self, count: u16) -> Self {
        assert!((1..=16).contains(&count));
        self.segments = count;
        self
    }

    pub fn target_os(mut self, target_os: u8) -> Self {
        self.target_os = target_os;
        self
    }

    pub fn dll(mut self) -> Self {
        self.appl_flags |= 0x80;
        self
    }

    pub fn version(mut self, block: Vec<u8>) -> Self {
        self.version = Some(block);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let version_len = self.version.as_ref().map_or(0, Vec::len);
        let mut buf = vec![0u8; NE_VERSION_OFFSET + align_to(version_len.max(1), 16)];
        dos_stub(&mut buf, NE_OFFSET as u32);

        // Tables follow the 64-byte header in the usual order.
        let seg_table = 0x40usize;
        let res_table = seg_table + 8;
        let resid_names = res_table + 24;
        let mod_refs = resid_names + 20;
        let import_names = mod_refs + 4;
        let entry_table = import_names + 25;
        let entries: &[u8] = &[2, 1, 0x01, 0x10, 0x00, 0x01, 0x20, 0x00, 0];

        let h = NE_OFFSET;
        buf[h..h + 2].copy_from_slice(b"NE");
        buf[h + 2] = 5;
        put16(&mut buf, h + 0x04, entry_table as u16);
        put16(&mut buf, h + 0x06, entries.len() as u16);
        buf[h + 0x0C] = 0x02;
        buf[h + 0x0D] = self.appl_flags;
        buf[h + 0x0E] = 1;
        put16(&mut buf, h + 0x10, 0x400);
        put16(&mut buf, h + 0x12, 0x1000);
        put32(&mut buf, h + 0x14, 0x0001_0010);
        put32(&mut buf, h + 0x18, 0x0001_0000);
        put16(&mut buf, h + 0x1C, self.segments);
        put16(&mut buf, h + 0x1E, 2);
        put16(&mut buf, h + 0x20, 24);
        let seg_at = if self.segments > 1 { 0x100 } else { seg_table };
        put16(&mut buf, h + 0x22, seg_at as u16);
        put16(&mut buf, h + 0x24, res_table as u16);
        put16(&mut buf, h + 0x26, resid_names as u16);
        put16(&mut buf, h + 0x28, mod_refs as u16);
        put16(&mut buf, h + 0x2A, import_names as u16);
        put32(&mut buf, h + 0x2C, NE_NONRES_OFFSET as u32);
        put16(&mut buf, h + 0x32, NE_SHIFT);
        buf[h + 0x36] = self.target_os;
        buf[h + 0x3E] = self.windows_version.1;
        buf[h + 0x3F] = self.windows_version.0;

        // Code segments with relocations.
        for i in 0..usize::from(self.segments) {
            let s = h + seg_at + i * 8;
            put16(&mut buf, s, (NE_SEGMENT_OFFSET >> NE_SHIFT) as u16);
            put16(&mut buf, s + 2, 0x10);
            put16(&mut buf, s + 4, 0x0100);
            put16(&mut buf, s + 6, 0x10);
        }

        // Resource table: RT_VERSION id 1, or no types at all.
        let r = h + res_table;
        put16(&mut buf, r, NE_SHIFT);
        if self.version.is_some() {
            put16(&mut buf, r + 2, 0x8010);
            put16(&mut buf, r + 4, 1);
            put16(&mut buf, r + 10, (NE_VERSION_OFFSET >> NE_SHIFT) as u16);
            put16(&mut buf, r + 12, (align_to(version_len, 16) >> NE_SHIFT) as u16);
            put16(&mut buf, r + 14, 0x0030);
            put16(&mut buf, r + 16, 0x8001);
        }

        let resident: &[u8] = b"\x05HELLO\x00\x00\x08MAINPROC\x01\x00\x00";
        buf[h + resid_names..h + resid_names + resident.len()].copy_from_slice(resident);
        put16(&mut buf, h + mod_refs, 1);
        put16(&mut buf, h + mod_refs + 2, 8);
        let names: &[u8] = b"\x00\x06KERNEL\x04USER\x0bMessageBoxA";
        buf[h + import_names..h + import_names + names.len()].copy_from_slice(names);
        buf[h + entry_table..h + entry_table + entries.len()].copy_from_slice(entries);

        let nonres: &[u8] = b"\x0bTest Module\x00\x00\x06Helper\x02\x00\x00";
        buf[NE_NONRES_OFFSET..NE_NONRES_OFFSET + nonres.len()].copy_from_slice(nonres);

        // Relocations: KERNEL ordinal 102, USER!MessageBoxA by name.
        let relocs = NE_SEGMENT_OFFSET + 0x10;
        put16(&mut buf, relocs, 2);
        let records: [(u8, u16, u16); 2] = [(1, 1, 102), (2, 2, 13)];
        for (i, (kind, module, value)) in records.into_iter().enumerate() {
            let at = relocs + 2 + i * 8;
            buf[at] = 3;
            buf[at + 1] = kind;
            put16(&mut buf, at + 2, 0x0004 + i as u16 * 4);
            put16(&mut buf, at + 4, module);
            put16(&mut buf, at + 6, value);
        }

        if let Some(block) = &self.version {
            buf[NE_VERSION_OFFSET..NE_VERSION_OFFSET + block.len()].copy_from_slice(block);
        }
        buf
    }
}

impl Default for NeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// --- ELF -----------------------------------------------------------------

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;
pub const EM_X86_64: u16 = 62;

/// Builder for a 64-bit little-endian ELF image mapped by one `PT_LOAD`
/// at virtual address 0.
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    e_type: u16,
    machine: u16,
    interp: Option<String>,
    dynamic: bool,
    notes: bool,
    symtab: bool,
}

impl ElfBuilder {
    pub fn new(e_type: u16) -> Self {
        Self {
            e_type,
            machine: EM_X86_64,
            interp: None,
            dynamic: false,
            notes: false,
            symtab: false,
        }
    }

    pub fn interp(mut self, path: &str) -> Self {
        self.interp = Some(path.to_string());
        self
    }

    /// `PT_DYNAMIC` with two `DT_NEEDED`, a soname and a runpath.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    /// GNU build ID and ABI tag notes.
    pub fn notes(mut self) -> Self {
        self.notes = true;
        self
    }

    /// `.symtab` with `main` and `counter`.
    pub fn symtab(mut self) -> Self {
        self.symtab = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        const PHDRS: usize = 64;
        const PHDR_SIZE: usize = 56;

        let mut buf = vec![0u8; PHDRS + 4 * PHDR_SIZE];
        let mut phdrs: Vec<(u32, usize, usize)> = Vec::new();

        if let Some(path) = &self.interp {
            let at = buf.len();
            buf.extend_from_slice(path.as_bytes());
            buf.push(0);
            phdrs.push((3, at, path.len() + 1));
            pad4(&mut buf);
        }

        if self.notes {
            let at = buf.len();
            let id: Vec<u8> = (1..=20).collect();
            note(&mut buf, 3, &id);
            let tag: Vec<u8> = [0u32, 3, 2, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
            note(&mut buf, 1, &tag);
            phdrs.push((4, at, buf.len() - at));
        }

        if self.dynamic {
            buf.resize(align_to(buf.len(), 8), 0);
            let strtab = buf.len();
            let strings: &[u8] = b"\0libc.so.6\0libfoo.so.1\0$ORIGIN/lib\0";
            buf.extend_from_slice(strings);
            buf.resize(align_to(buf.len(), 8), 0);
            let at = buf.len();
            for (tag, val) in [
                (1u64, 1u64),
                (1, 11),
                (14, 11),
                (29, 23),
                (5, strtab as u64),
                (10, strings.len() as u64),
                (0x6fff_fffb, 0x0800_0001),
                (0, 0),
            ] {
                buf.extend_from_slice(&tag.to_le_bytes());
                buf.extend_from_slice(&val.to_le_bytes());
            }
            phdrs.push((2, at, buf.len() - at));
        }

        let mut sections: Vec<[u8; 64]> = Vec::new();
        if self.symtab {
            buf.resize(align_to(buf.len(), 8), 0);
            let symtab = buf.len();
            buf.extend_from_slice(&[0u8; 24]);
            for (name, info, shndx, value, size) in [
                (1u32, 0x12u8, 1u16, 0x1040u64, 0x20u64),
                (6, 0x01, 2, 0x4010, 4),
            ] {
                let mut sym = [0u8; 24];
                put32(&mut sym, 0, name);
                sym[4] = info;
                put16(&mut sym, 6, shndx);
                put64(&mut sym, 8, value);
                put64(&mut sym, 16, size);
                buf.extend_from_slice(&sym);
            }
            let strtab = buf.len();
            buf.extend_from_slice(b"\0main\0counter\0");

            sections.push([0u8; 64]);
            sections.push(section_header(2, symtab, 72, 2, 24));
            sections.push(section_header(3, strtab, 14, 0, 0));
        }

        buf.resize(align_to(buf.len(), 8), 0);
        let shoff = buf.len();
        for shdr in &sections {
            buf.extend_from_slice(shdr);
        }
        let file_size = buf.len();
        phdrs.push((1, 0, file_size));

        buf[0..4].copy_from_slice(b"\x7FELF");
        buf[4] = 2;
        buf[5] = 1;
        buf[6] = 1;
        put16(&mut buf, 16, self.e_type);
        put16(&mut buf, 18, self.machine);
        put32(&mut buf, 20, 1);
        put64(&mut buf, 24, 0x1040);
        put64(&mut buf, 32, PHDRS as u64);
        put64(&mut buf, 40, if sections.is_empty() { 0 } else { shoff as u64 });
        put16(&mut buf, 52, 64);
        put16(&mut buf, 54, PHDR_SIZE as u16);
        put16(&mut buf, 56, phdrs.len() as u16);
        put16(&mut buf, 58, 64);
        put16(&mut buf, 60, sections.len() as u16);

        for (i, (p_type, offset, size)) in phdrs.into_iter().enumerate() {
            let at = PHDRS + i * PHDR_SIZE;
            put32(&mut buf, at, p_type);
            put32(&mut buf, at + 4, 4);
            put64(&mut buf, at + 8, offset as u64);
            put64(&mut buf, at + 16, offset as u64);
            put64(&mut buf, at + 24, offset as u64);
            put64(&mut buf, at + 32, size as u64);
            put64(&mut buf, at + 40, size as u64);
        }
        buf
    }
}

fn note(buf: &mut Vec<u8>, n_type: u32, desc: &[u8]) {
    buf.extend_from_slice(&4u32.to_le_bytes());
    buf.extend_from_slice(&(desc.len() as u32).to_le_bytes());
    buf.extend_from_slice(&n_type.to_le_bytes());
    buf.extend_from_slice(b"GNU\0");
    buf.extend_from_slice(desc);
    pad4(buf);
}

fn section_header(sh_type: u32, offset: usize, size: usize, link: u32, entsize: u64) -> [u8; 64] {
    let mut shdr = [0u8; 64];
    put32(&mut shdr, 4, sh_type);
    put64(&mut shdr, 24, offset as u64);
    put64(&mut shdr, 32, size as u64);
    put32(&mut shdr, 40, link);
    put64(&mut shdr, 56, entsize);
    shdr
}

/// Minimal ELF header of the given class and byte order.
pub fn elf_header(class: u8, data: u8, e_type: u16, machine: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 64];
    buf[0..4].copy_from_slice(b"\x7FELF");
    buf[4] = class;
    buf[5] = data;
    buf[6] = 1;
    let (t, m) = if data == 2 {
        (e_type.to_be_bytes(), machine.to_be_bytes())
    } else {
        (e_type.to_le_bytes(), machine.to_le_bytes())
    };
    buf[16..18].copy_from_slice(&t);
    buf[18..20].copy_from_slice(&m);
    buf
}
