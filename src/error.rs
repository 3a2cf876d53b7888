//! Error types for executable introspection.

use std::io;
use thiserror::Error;

/// Result type alias for exeinfo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while detecting or decoding an executable.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Fewer bytes were available than the structure requires.
    #[error("buffer too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    /// The input is not an executable format this crate understands.
    #[error("unsupported executable format")]
    UnsupportedFormat,
    /// A magic number did not match.
    #[error("invalid {0} signature")]
    InvalidSignature(&'static str),
    /// PE optional header magic was neither PE32 nor PE32+.
    #[error("invalid optional header magic: {0:#06x}")]
    InvalidOptionalHeaderMagic(u16),
    /// An offset or range points outside its container.
    #[error("offset {offset:#x} out of range (limit {limit:#x})")]
    OutOfRange { offset: u64, limit: u64 },
    /// A declared length exceeds a sanity ceiling.
    #[error("{what} too large: {size:#x} bytes (limit {limit:#x})")]
    TooLarge {
        what: &'static str,
        size: u64,
        limit: u64,
    },
    /// A structure failed a consistency check.
    #[error("corrupt {0}")]
    Corrupt(&'static str),
    /// The requested item is not present.
    #[error("not found")]
    NotFound,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Reader failure or short read.
    Io,
    /// Input is not a supported format.
    Format,
    /// Offset, length or count is out of range or inconsistent.
    Corrupt,
    /// The optional structure does not exist.
    NotFound,
}

impl Error {
    pub(crate) fn buffer_too_small(expected: usize, actual: usize) -> Self {
        Error::BufferTooSmall { expected, actual }
    }

    pub(crate) fn out_of_range(offset: u64, limit: u64) -> Self {
        Error::OutOfRange { offset, limit }
    }

    pub(crate) fn too_large(what: &'static str, size: u64, limit: u64) -> Self {
        Error::TooLarge { what, size, limit }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::BufferTooSmall { .. } => ErrorKind::Io,
            Error::UnsupportedFormat
            | Error::InvalidSignature(_)
            | Error::InvalidOptionalHeaderMagic(_) => ErrorKind::Format,
            Error::OutOfRange { .. } | Error::TooLarge { .. } | Error::Corrupt(_) => {
                ErrorKind::Corrupt
            }
            Error::NotFound => ErrorKind::NotFound,
        }
    }
}
