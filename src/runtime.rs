//! Runtime DLL recognition from imported module names.

use crate::coff::machine;

/// A recognised language runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDll {
    pub description: String,
    pub url: Option<&'static str>,
}

struct MsvcVersion {
    dll_version: u32,
    display: &'static str,
    url_i386: Option<&'static str>,
    url_amd64: Option<&'static str>,
}

const MSVC_VERSIONS: &[MsvcVersion] = &[
    MsvcVersion {
        dll_version: 120,
        display: "2013",
        url_i386: Some("https://aka.ms/highdpimfc2013x86enu"),
        url_amd64: Some("https://aka.ms/highdpimfc2013x64enu"),
    },
    MsvcVersion {
        dll_version: 110,
        display: "2012",
        url_i386: Some("https://download.microsoft.com/download/1/6/B/16B06F60-3B20-4FF2-B699-5E9B7962F9AE/VSU_4/vcredist_x86.exe"),
        url_amd64: Some("https://download.microsoft.com/download/1/6/B/16B06F60-3B20-4FF2-B699-5E9B7962F9AE/VSU_4/vcredist_x64.exe"),
    },
    MsvcVersion {
        dll_version: 100,
        display: "2010",
        url_i386: Some("https://download.microsoft.com/download/1/6/5/165255E7-1014-4D0A-B094-B6A430A6BFFC/vcredist_x86.exe"),
        url_amd64: Some("https://download.microsoft.com/download/1/6/5/165255E7-1014-4D0A-B094-B6A430A6BFFC/vcredist_x64.exe"),
    },
    MsvcVersion {
        dll_version: 90,
        display: "2008",
        url_i386: Some("https://download.microsoft.com/download/5/D/8/5D8C65CB-C849-4025-8E95-C3966CAFD8AE/vcredist_x86.exe"),
        url_amd64: Some("https://download.microsoft.com/download/5/D/8/5D8C65CB-C849-4025-8E95-C3966CAFD8AE/vcredist_x64.exe"),
    },
    MsvcVersion {
        dll_version: 80,
        display: "2005",
        url_i386: Some("https://download.microsoft.com/download/8/B/4/8B42259F-5D70-43F4-AC2E-4B208FD8D66A/vcredist_x86.EXE"),
        url_amd64: Some("https://download.microsoft.com/download/8/B/4/8B42259F-5D70-43F4-AC2E-4B208FD8D66A/vcredist_x64.EXE"),
    },
    MsvcVersion { dll_version: 71, display: "2003", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 70, display: "2002", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 60, display: "6.0", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 50, display: "5.0", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 42, display: "4.2", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 40, display: "4.0", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 20, display: "2.0", url_i386: None, url_amd64: None },
    MsvcVersion { dll_version: 10, display: "1.0", url_i386: None, url_amd64: None },
];

/// 32-bit Visual Basic runtimes: (major, minor, dll, url).
const VB_PE: &[(u8, u8, &str, Option<&str>)] = &[
    (6, 0, "msvbvm60.dll", Some("https://download.microsoft.com/download/5/a/d/5ad868a0-8ecd-4bb0-a882-fe53eb7ef348/VB6.0-KB290887-X86.exe")),
    (5, 0, "msvbvm50.dll", Some("https://download.microsoft.com/download/vb50pro/utility/1/win98/en-us/msvbvm50.exe")),
    (4, 0, "vbrun400.dll", None),
    (4, 0, "vbrun432.dll", None),
];

/// 16-bit Visual Basic runtimes, matched on the 8-character module name.
const VB_NE: &[(u8, u8, &[u8; 8], Option<&str>)] = &[
    (4, 0, b"VBRUN400", None),
    (4, 0, b"VBRUN416", None),
    (3, 0, b"VBRUN300", None),
    (2, 0, b"VBRUN200", None),
    (1, 0, b"VBRUN100", Some("https://download.microsoft.com/download/vb30/sampleaa/1/w9xnt4/en-us/vbrun100.exe")),
];

fn msvc(version: &str, debug: bool, url: Option<&'static str>) -> RuntimeDll {
    let description = if debug {
        format!("Microsoft Visual C++ {version} Debug Runtime")
    } else {
        format!("Microsoft Visual C++ {version} Runtime")
    };
    RuntimeDll { description, url }
}

fn visual_basic(major: u8, minor: u8, url: Option<&'static str>) -> RuntimeDll {
    RuntimeDll {
        description: format!("Microsoft Visual Basic {major}.{minor} Runtime"),
        url,
    }
}

/// Split `msvc[pr]NNN[d].dll` into (version, debug).
fn parse_msvc_name(name: &str) -> Option<(u32, bool)> {
    let rest = name.strip_prefix("msvc")?;
    let rest = rest.strip_prefix('p').or_else(|| rest.strip_prefix('r'))?;
    let rest = rest.strip_suffix(".dll")?;
    let digits = rest.trim_end_matches('d');
    let debug = match rest.len() - digits.len() {
        0 => false,
        1 => true,
        _ => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, debug))
}

fn pe_match(name: &str, machine_type: u16, is_64bit: bool) -> Option<RuntimeDll> {
    match name {
        "vcruntime140.dll" => {
            let url = match machine_type {
                machine::I386 => Some("https://aka.ms/vs/17/release/VC_redist.x86.exe"),
                machine::AMD64 => Some("https://aka.ms/vs/17/release/VC_redist.x64.exe"),
                machine::ARM64 => Some("https://aka.ms/vs/17/release/VC_redist.arm64.exe"),
                _ => None,
            };
            return Some(msvc("2015-2022", false, url));
        }
        "vcruntime140d.dll" => return Some(msvc("2015-2022", true, None)),
        "msvcrt.dll" => {
            return Some(RuntimeDll {
                description: "Microsoft System C++ Runtime".to_string(),
                url: None,
            })
        }
        "msvcrtd.dll" => return Some(msvc("6.0", false, None)),
        _ => {}
    }

    if let Some((version, debug)) = parse_msvc_name(name) {
        if let Some(v) = MSVC_VERSIONS.iter().find(|v| v.dll_version == version) {
            if debug {
                return Some(msvc(v.display, true, None));
            }
            let url = if is_64bit { v.url_amd64 } else { v.url_i386 };
            return Some(msvc(v.display, false, url));
        }
    }

    VB_PE
        .iter()
        .find(|(_, _, dll, _)| *dll == name)
        .map(|&(major, minor, _, url)| visual_basic(major, minor, url))
}

/// First recognised runtime among PE import DLL names, in descriptor
/// order. Matching is ASCII case-insensitive.
pub fn pe_runtime_dll<'a, I>(names: I, machine_type: u16, is_64bit: bool) -> Option<RuntimeDll>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .find_map(|name| pe_match(&name.to_ascii_lowercase(), machine_type, is_64bit))
}

/// Result of scanning NE module references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeModuleScan {
    /// KERNEL is imported; distinguishes Windows from old OS/2 images.
    pub has_kernel: bool,
    pub runtime: Option<RuntimeDll>,
}

/// Scan NE module names for KERNEL and a Visual Basic runtime.
pub fn ne_runtime_dll<'a, I>(names: I) -> NeModuleScan
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut scan = NeModuleScan::default();
    for name in names {
        let upper = name.to_ascii_uppercase();
        match upper.len() {
            6 if upper == b"KERNEL" => {
                scan.has_kernel = true;
                if scan.runtime.is_some() {
                    break;
                }
            }
            8 => {
                if let Some(&(major, minor, _, url)) =
                    VB_NE.iter().find(|(_, _, dll, _)| upper == dll[..])
                {
                    scan.runtime = Some(visual_basic(major, minor, url));
                }
            }
            _ => {}
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msvc_name_parse() {
        assert_eq!(parse_msvc_name("msvcr100.dll"), Some((100, false)));
        assert_eq!(parse_msvc_name("msvcp71d.dll"), Some((71, true)));
        assert_eq!(parse_msvc_name("msvcq100.dll"), None);
        assert_eq!(parse_msvc_name("msvcr.dll"), None);
        assert_eq!(parse_msvc_name("msvcrt.dll"), None);
    }

    #[test]
    fn test_vcruntime_url_by_machine() {
        let rt = pe_runtime_dll(["KERNEL32.dll", "VCRUNTIME140.dll"], machine::AMD64, true).unwrap();
        assert_eq!(rt.description, "Microsoft Visual C++ 2015-2022 Runtime");
        assert_eq!(rt.url, Some("https://aka.ms/vs/17/release/VC_redist.x64.exe"));
        let rt = pe_runtime_dll(["vcruntime140.dll"], machine::ARMNT, false).unwrap();
        assert_eq!(rt.url, None);
    }

    #[test]
    fn test_first_match_wins() {
        let rt = pe_runtime_dll(["MSVCP120.dll", "msvcr100.dll"], machine::I386, false).unwrap();
        assert_eq!(rt.description, "Microsoft Visual C++ 2013 Runtime");
        assert_eq!(rt.url, Some("https://aka.ms/highdpimfc2013x86enu"));
    }

    #[test]
    fn test_debug_and_legacy() {
        let rt = pe_runtime_dll(["msvcr90d.dll"], machine::I386, false).unwrap();
        assert_eq!(rt.description, "Microsoft Visual C++ 2008 Debug Runtime");
        assert_eq!(rt.url, None);
        let rt = pe_runtime_dll(["MSVCRT.DLL"], machine::I386, false).unwrap();
        assert_eq!(rt.description, "Microsoft System C++ Runtime");
        let rt = pe_runtime_dll(["msvbvm60.dll"], machine::I386, false).unwrap();
        assert_eq!(rt.description, "Microsoft Visual Basic 6.0 Runtime");
        assert!(rt.url.is_some());
        assert!(pe_runtime_dll(["KERNEL32.DLL", "USER32.dll"], machine::I386, false).is_none());
    }

    #[test]
    fn test_ne_scan() {
        let names: [&[u8]; 3] = [b"vbrun100", b"GDI", b"Kernel"];
        let scan = ne_runtime_dll(names);
        assert!(scan.has_kernel);
        let rt = scan.runtime.unwrap();
        assert_eq!(rt.description, "Microsoft Visual Basic 1.0 Runtime");
        assert!(rt.url.is_some());

        let names: [&[u8]; 2] = [b"DOSCALLS", b"VIOCALLS"];
        assert_eq!(ne_runtime_dll(names), NeModuleScan::default());
    }
}
