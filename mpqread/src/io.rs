//! I/O abstractions for MPQ archives
//!
//! Every file handle reads through the archive's stream with absolute,
//! positioned reads, so several handles can share one archive without
//! disturbing each other's position.

use crate::Result;
use parking_lot::Mutex;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// Random-access byte source backing an archive
pub trait ArchiveStream: Send + Sync + fmt::Debug {
    /// Fill `buf` with the bytes at absolute `offset`
    ///
    /// Short reads are errors.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Total size of the stream in bytes
    fn size(&self) -> Result<u64>;
}

/// Positioned reads over any `Read + Seek`, serialized by a mutex
pub struct SharedReader<R> {
    inner: Mutex<R>,
}

impl<R: Read + Seek> SharedReader<R> {
    /// Wrap a reader
    pub fn new(inner: R) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Unwrap the reader
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> fmt::Debug for SharedReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedReader").finish_non_exhaustive()
    }
}

impl<R: Read + Seek + Send> ArchiveStream for SharedReader<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.seek(SeekFrom::Start(offset))?;
        inner.read_exact(buf)?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        Ok(inner.seek(SeekFrom::End(0))?)
    }
}

/// Memory-mapped archive file
#[cfg(feature = "mmap")]
#[cfg_attr(docsrs, doc(cfg(feature = "mmap")))]
#[derive(Debug)]
pub struct MmapStream {
    map: memmap2::Mmap,
}

#[cfg(feature = "mmap")]
impl MmapStream {
    /// Map a file read-only
    pub fn new(file: &std::fs::File) -> Result<Self> {
        // SAFETY: the map is read-only; callers must not truncate the file
        // while the archive is open.
        let map = unsafe { memmap2::Mmap::map(file)? };
        Ok(Self { map })
    }
}

#[cfg(feature = "mmap")]
impl ArchiveStream for MmapStream {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(buf.len())?))
            .filter(|range| range.end <= self.map.len())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at {} is beyond the mapped {} bytes",
                        buf.len(),
                        offset,
                        self.map.len()
                    ),
                )
            })?;

        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.map.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Cursor;

    #[test]
    fn test_shared_reader_positioned_reads() {
        let stream = SharedReader::new(Cursor::new((0u8..=255).collect::<Vec<_>>()));

        let mut buf = [0u8; 4];
        stream.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);

        stream.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        assert_eq!(stream.size().unwrap(), 256);
    }

    #[test]
    fn test_shared_reader_short_read() {
        let stream = SharedReader::new(Cursor::new(vec![0u8; 8]));
        let mut buf = [0u8; 4];
        let err = stream.read_at(6, &mut buf).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[cfg(feature = "mmap")]
    #[test]
    fn test_mmap_stream() {
        use std::io::Write;

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();

        let stream = MmapStream::new(&file).unwrap();
        assert_eq!(stream.size().unwrap(), 10);

        let mut buf = [0u8; 3];
        stream.read_at(7, &mut buf).unwrap();
        assert_eq!(&buf, b"789");
        assert!(stream.read_at(8, &mut buf).is_err());
        assert!(stream.read_at(u64::MAX, &mut buf).is_err());
    }
}
