//! ELF note parsing: the GNU ABI tag (target OS version) and the GNU
//! build ID.

use crate::endian::{align4, ByteView, Endian};

/// `n_namesz`, `n_descsz` and `n_type`; identical for ELF32 and ELF64.
pub const NOTE_HEADER_SIZE: usize = 12;

pub const NT_GNU_ABI_TAG: u32 = 1;
pub const NT_GNU_BUILD_ID: u32 = 3;

/// One decoded note record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note<'a> {
    pub n_type: u32,
    /// Name including its NUL terminator, exactly `n_namesz` bytes.
    pub name: &'a [u8],
    pub desc: &'a [u8],
}

impl<'a> Note<'a> {
    fn is_named(&self, name: &str) -> bool {
        self.name.len() == name.len() + 1
            && self.name.ends_with(&[0])
            && &self.name[..name.len()] == name.as_bytes()
    }
}

/// Iterator over every note record in a buffer.
///
/// Descriptors start at the 4-byte aligned offset after the name, and each
/// record is padded to 4 bytes. Iteration stops at the first record that
/// does not fit.
pub struct Notes<'a> {
    view: ByteView<'a>,
    pos: usize,
}

impl<'a> Notes<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            view: ByteView::new(data, endian),
            pos: 0,
        }
    }
}

impl<'a> Iterator for Notes<'a> {
    type Item = Note<'a>;

    fn next(&mut self) -> Option<Note<'a>> {
        let hdr = self.view.sub(self.pos, NOTE_HEADER_SIZE).ok()?;
        let namesz = hdr.u32_at(0).ok()? as usize;
        let descsz = hdr.u32_at(4).ok()? as usize;
        let n_type = hdr.u32_at(8).ok()?;

        let name_at = self.pos + NOTE_HEADER_SIZE;
        let desc_at = name_at.checked_add(align4(namesz))?;
        let name = self.view.slice(name_at, namesz).ok()?;
        let desc = self.view.slice(desc_at, descsz).ok()?;
        self.pos = desc_at.checked_add(align4(descsz))?;
        Some(Note { n_type, name, desc })
    }
}

/// Flavour of a GNU build ID, chosen by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildIdKind {
    XxHash,
    Md5Uuid,
    Sha1,
    Unknown,
}

impl BuildIdKind {
    pub fn from_len(len: usize) -> Self {
        match len {
            8 => BuildIdKind::XxHash,
            16 => BuildIdKind::Md5Uuid,
            20 => BuildIdKind::Sha1,
            _ => BuildIdKind::Unknown,
        }
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            BuildIdKind::XxHash => Some("xxHash"),
            BuildIdKind::Md5Uuid => Some("md5/uuid"),
            BuildIdKind::Sha1 => Some("sha1"),
            BuildIdKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId {
    pub kind: BuildIdKind,
    pub bytes: Vec<u8>,
}

impl BuildId {
    /// Field name: `BuildID[sha1]`, or plain `BuildID` for odd lengths.
    pub fn field_name(&self) -> String {
        match self.kind.name() {
            Some(kind) => format!("BuildID[{kind}]"),
            None => "BuildID".to_string(),
        }
    }

    /// Lowercase hex of the identifier bytes.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Information gathered from all notes of a file. Later notes override
/// earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteInfo {
    pub os_version: Option<String>,
    pub build_id: Option<BuildId>,
}

impl NoteInfo {
    /// Fold every note in `data` into this summary.
    pub fn absorb(&mut self, data: &[u8], endian: Endian) {
        for note in Notes::new(data, endian) {
            if note.name.is_empty() || note.desc.is_empty() {
                continue;
            }
            match note.n_type {
                NT_GNU_ABI_TAG => {
                    if let Some(version) = abi_tag_os_version(&note, endian) {
                        self.os_version = Some(version);
                    }
                }
                NT_GNU_BUILD_ID if note.is_named("GNU") => {
                    self.build_id = Some(BuildId {
                        kind: BuildIdKind::from_len(note.desc.len()),
                        bytes: note.desc.to_vec(),
                    });
                }
                _ => {}
            }
        }
    }
}

/// OS version string from an NT_GNU_ABI_TAG note, keyed on vendor name.
pub fn abi_tag_os_version(note: &Note<'_>, endian: Endian) -> Option<String> {
    let desc = ByteView::new(note.desc, endian);
    if note.is_named("SuSE") {
        let d = desc.slice(0, 2).ok()?;
        Some(format!("SuSE Linux {}.{}", d[0], d[1]))
    } else if note.is_named("GNU") {
        const OS: [&str; 5] = ["Linux", "Hurd", "Solaris", "kFreeBSD", "kNetBSD"];
        let os = desc.u32_at(0).ok()?;
        let os = OS.get(os as usize).copied().unwrap_or("<unknown>");
        Some(format!(
            "GNU/{os} {}.{}.{}",
            desc.u32_at(4).ok()?,
            desc.u32_at(8).ok()?,
            desc.u32_at(12).ok()?
        ))
    } else if note.is_named("NetBSD") {
        Some(netbsd_version(desc.u32_at(0).ok()?))
    } else if note.is_named("FreeBSD") {
        Some(freebsd_version(desc.u32_at(0).ok()?))
    } else if note.is_named("OpenBSD") {
        Some("OpenBSD".to_string())
    } else if note.is_named("DragonFly") {
        let d = desc.u32_at(0).ok()?;
        Some(format!(
            "DragonFlyBSD {}.{}.{}",
            d / 100000,
            d / 10000 % 10,
            d % 10000
        ))
    } else {
        None
    }
}

/// `__NetBSD_Version__` is MMmmrrpp00; older files carry 199905.
fn netbsd_version(desc: u32) -> String {
    if desc <= 100_000_000 {
        return "NetBSD".to_string();
    }
    let patch = (desc / 100) % 100;
    let mut rel = (desc / 10000) % 100;
    let minor = (desc / 1_000_000) % 100;
    let major = desc / 100_000_000;

    let mut s = format!("NetBSD {major}.{minor}");
    if rel == 0 && patch != 0 {
        s.push_str(&format!(".{patch}"));
    } else if rel != 0 {
        while rel > 26 {
            s.push('Z');
            rel -= 26;
        }
        s.push(char::from(b'A' + (rel - 1) as u8));
    }
    s
}

fn freebsd_version(desc: u32) -> String {
    if desc == 460002 {
        return "FreeBSD 4.6.2".to_string();
    }
    let mut s;
    if desc < 460100 {
        s = format!("FreeBSD {}.{}", desc / 100000, desc / 10000 % 10);
        if desc / 1000 % 10 > 0 {
            s.push_str(&format!(".{}", desc / 1000 % 10));
        }
        if desc % 1000 > 0 || desc % 100000 == 0 {
            s.push_str(&format!(" ({desc})"));
        }
    } else if desc < 500000 {
        s = format!(
            "FreeBSD {}.{}",
            desc / 100000,
            desc / 10000 % 10 + desc / 1000 % 10
        );
        if desc / 100 % 10 > 0 {
            s.push_str(&format!(" ({desc})"));
        } else if desc / 10 % 10 > 0 {
            s.push_str(&format!(".{}", desc / 10 % 10));
        }
    } else {
        s = format!("FreeBSD {}.{}", desc / 100000, desc / 1000 % 100);
        if desc / 100 % 10 > 0 || desc % 100000 / 100 == 0 {
            s.push_str(&format!(" ({desc})"));
        } else if desc / 10 % 10 > 0 {
            s.push_str(&format!(".{}", desc / 10 % 10));
        }
    }
    s
}
