//! 8-bit code page decoding for NE version strings.

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GB18030, GBK, IBM866, ISO_8859_10, ISO_8859_13, ISO_8859_14,
    ISO_8859_15, ISO_8859_16, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6,
    ISO_8859_7, ISO_8859_8, KOI8_R, KOI8_U, MACINTOSH, SHIFT_JIS, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258, WINDOWS_874, X_MAC_CYRILLIC,
};

pub const CP_1252: u16 = 1252;
pub const CP_ISO_8859_1: u16 = 28591;
pub const CP_US_ASCII: u16 = 20127;
pub const CP_UTF8: u16 = 65001;

/// Which conversion produced a decoded string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodePath {
    /// The declared code page was supported and decoded the bytes.
    Declared(u16),
    /// The declared code page is unsupported or rejected the bytes, so
    /// Windows-1252 was used instead.
    Cp1252Fallback { requested: u16 },
}

/// Map a Windows code page number to its converter.
///
/// ISO-8859-1 and US-ASCII are handled separately: the WHATWG tables
/// fold both into Windows-1252.
pub fn encoding_for(codepage: u16) -> Option<&'static Encoding> {
    let encoding = match codepage {
        866 => IBM866,
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 => MACINTOSH,
        10007 => X_MAC_CYRILLIC,
        20866 => KOI8_R,
        21866 => KOI8_U,
        28592 => ISO_8859_2,
        28593 => ISO_8859_3,
        28594 => ISO_8859_4,
        28595 => ISO_8859_5,
        28596 => ISO_8859_6,
        28597 => ISO_8859_7,
        28598 => ISO_8859_8,
        28600 => ISO_8859_10,
        28603 => ISO_8859_13,
        28604 => ISO_8859_14,
        28605 => ISO_8859_15,
        28606 => ISO_8859_16,
        54936 => GB18030,
        _ => return None,
    };
    Some(encoding)
}

/// Decode `bytes` from `codepage`, falling back to Windows-1252.
pub fn decode(codepage: u16, bytes: &[u8]) -> (String, DecodePath) {
    let decoded = match codepage {
        CP_ISO_8859_1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        CP_US_ASCII if bytes.is_ascii() => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        CP_US_ASCII => None,
        CP_UTF8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
        cp => encoding_for(cp).and_then(|encoding| {
            encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned())
        }),
    };
    match decoded {
        Some(s) => (s, DecodePath::Declared(codepage)),
        None => {
            log::debug!("code page {codepage} unavailable, decoding as Windows-1252");
            (
                decode_cp1252(bytes),
                DecodePath::Cp1252Fallback {
                    requested: codepage,
                },
            )
        }
    }
}

/// Windows-1252 never fails: unassigned bytes map to the C1 control of
/// the same value.
pub fn decode_cp1252(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}

/// Convert CRLF line endings to LF.
pub fn dos2unix(s: &str) -> String {
    s.replace("\r\n", "\n")
}
