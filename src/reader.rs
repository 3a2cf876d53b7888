//! Random-access byte sources that executables are decoded from.

use crate::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// A positioned, read-only byte source.
///
/// Every decoder in this crate pulls bytes through this trait, so an
/// executable can be inspected from a file, an in-memory buffer, or any
/// other seekable source without the parser knowing which.
pub trait Reader {
    /// Read bytes at `offset` into `buf`, returning how many were read.
    /// Reading at or past the end returns `Ok(0)`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total size of the source, if known.
    fn size(&self) -> Option<u64>;

    /// Fill `buf` completely or fail with [`Error::BufferTooSmall`].
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let n = self.read_at(offset, buf)?;
        if n < buf.len() {
            return Err(Error::buffer_too_small(buf.len(), n));
        }
        Ok(())
    }

    /// Read a little-endian u16.
    fn read_u16_at(&self, offset: u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian u32.
    fn read_u32_at(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian u64.
    fn read_u64_at(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read exactly `len` bytes into an owned buffer.
    ///
    /// Requests past the known end of the source fail before allocating.
    fn read_bytes_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if let Some(size) = self.size() {
            let available = size.saturating_sub(offset);
            if len as u64 > available {
                return Err(Error::buffer_too_small(len, available as usize));
            }
        }
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read at most `len` bytes; the returned buffer is truncated to what
    /// the source actually had.
    fn read_up_to(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let len = match self.size() {
            Some(size) => len.min(size.saturating_sub(offset).try_into().unwrap_or(usize::MAX)),
            None => len,
        };
        let mut buf = vec![0u8; len];
        let n = self.read_at(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

impl<R: Reader + ?Sized> Reader for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}

fn copy_from_slice_at(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    let Ok(offset) = usize::try_from(offset) else {
        return 0;
    };
    if offset >= data.len() {
        return 0;
    }
    let to_read = buf.len().min(data.len() - offset);
    buf[..to_read].copy_from_slice(&data[offset..offset + to_read]);
    to_read
}

/// Reader over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceReader<'a> {
    data: &'a [u8],
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl Reader for SliceReader<'_> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(copy_from_slice_at(self.data, offset, buf))
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Reader over an owned byte vector.
#[derive(Debug, Clone)]
pub struct VecReader {
    data: Vec<u8>,
}

impl VecReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Reader for VecReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        Ok(copy_from_slice_at(&self.data, offset, buf))
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Reader over a file on disk.
///
/// Seeks and reads go through a `RefCell`, so one `FileReader` serves a
/// single session on a single thread.
pub struct FileReader {
    file: RefCell<File>,
    size: u64,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file(File::open(path)?)
    }

    pub fn from_file(mut file: File) -> Result<Self> {
        let size = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file: RefCell::new(file),
            size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.size
    }
}

impl Reader for FileReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.size {
            return Ok(0);
        }
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_reader() {
        let data = [0x4D, 0x5A, 0x90, 0x00];
        let reader = SliceReader::new(&data);
        assert_eq!(reader.size(), Some(4));
        assert_eq!(reader.read_u16_at(0).unwrap(), 0x5A4D);
        assert_eq!(reader.read_u16_at(2).unwrap(), 0x0090);
    }

    #[test]
    fn test_vec_reader() {
        let reader = VecReader::new(vec![0x7F, b'E', b'L', b'F']);
        assert_eq!(reader.read_u32_at(0).unwrap(), 0x464C_457F);
        assert_eq!(reader.into_inner().len(), 4);
    }

    #[test]
    fn test_short_read_is_error() {
        let data = [0x4D, 0x5A];
        let reader = SliceReader::new(&data);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(0, &mut buf).unwrap(), 2);
        let err = reader.read_exact_at(0, &mut buf).unwrap_err();
        assert!(matches!(err, Error::BufferTooSmall { expected: 4, actual: 2 }));
    }

    #[test]
    fn test_read_bytes_past_end_fails_early() {
        let data = [1u8, 2, 3, 4];
        let reader = SliceReader::new(&data);
        assert_eq!(reader.read_bytes_at(1, 3).unwrap(), vec![2, 3, 4]);
        assert!(matches!(
            reader.read_bytes_at(2, 0x7FFF_8000),
            Err(Error::BufferTooSmall { expected: 0x7FFF_8000, actual: 2 })
        ));
        assert!(matches!(
            reader.read_bytes_at(9, 1),
            Err(Error::BufferTooSmall { actual: 0, .. })
        ));
    }

    #[test]
    fn test_read_up_to_truncates() {
        let data = [1u8, 2, 3, 4, 5];
        let reader = SliceReader::new(&data);
        assert_eq!(reader.read_up_to(3, 10).unwrap(), vec![4, 5]);
        assert!(reader.read_up_to(10, 4).unwrap().is_empty());
    }

    #[test]
    fn test_reader_by_reference() {
        fn first_byte<R: Reader>(r: R) -> u8 {
            let mut b = [0u8; 1];
            r.read_exact_at(0, &mut b).unwrap();
            b[0]
        }
        let reader = VecReader::new(vec![0xAB]);
        assert_eq!(first_byte(&reader), 0xAB);
    }

    #[test]
    fn test_file_reader() {
        let path = std::env::temp_dir().join(format!("exeinfo-reader-{}.bin", std::process::id()));
        std::fs::write(&path, [0x4D, 0x5A, 0x00, 0x01]).unwrap();
        let reader = FileReader::open(&path).unwrap();
        assert_eq!(reader.file_size(), 4);
        assert_eq!(reader.read_u16_at(2).unwrap(), 0x0100);
        let mut buf = [0u8; 2];
        assert_eq!(reader.read_at(8, &mut buf).unwrap(), 0);
        drop(reader);
        let _ = std::fs::remove_file(&path);
    }
}
