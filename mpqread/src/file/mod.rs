//! Reading files stored in an archive
//!
//! An [`MpqFile`] is a cursor over one file's plaintext. Archived files are
//! decoded sector by sector on demand: only the sectors touched by a read are
//! fetched, decrypted, checked and decompressed, and the most recent partial
//! sector is kept so that small sequential reads do not decode it again.
//! Files can also wrap a plain file on disk with the same interface.

mod archived;
mod info;
mod local;
mod pipeline;
mod sectors;
mod single_unit;

use crate::archive::Archive;
use crate::tables::BlockEntry;
use crate::{Error, Result};
use archived::ArchivedFile;
use local::LocalFile;
use std::io::{self, SeekFrom};
use std::path::Path;

pub use info::InfoClass;
pub(crate) use info::{write_info_value, wrong_handle_kind};

/// How a read ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadStatus {
    /// The buffer was filled
    Complete,
    /// The end of the file was reached before the buffer was filled
    EndOfFile,
}

/// Result of a successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadOutcome {
    /// Bytes written to the front of the buffer
    pub bytes_read: usize,
    /// Whether the end of the file cut the read short
    pub status: ReadStatus,
}

impl ReadOutcome {
    pub(crate) fn new(bytes_read: usize, requested: usize) -> Self {
        let status = if bytes_read < requested {
            ReadStatus::EndOfFile
        } else {
            ReadStatus::Complete
        };
        Self { bytes_read, status }
    }

    /// Whether the end of the file was reached
    pub fn is_eof(&self) -> bool {
        self.status == ReadStatus::EndOfFile
    }
}

/// Counters describing the decode work done by one file handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodeStats {
    /// Partial-sector reads served from the sector cache
    pub cache_hits: u64,
    /// Sectors decoded into the sector cache
    pub cache_fills: u64,
    /// Runs of whole sectors decoded straight into the caller's buffer
    pub batched_runs: u64,
    /// Sectors decoded in total
    pub sectors_decoded: u64,
    /// Reads issued against the archive stream
    pub stream_reads: u64,
}

/// An open file: either a file inside an archive or a local file
#[derive(Debug)]
pub struct MpqFile<'a> {
    inner: Inner<'a>,
}

#[derive(Debug)]
enum Inner<'a> {
    Archived(Box<ArchivedFile<'a>>),
    Local(LocalFile),
}

impl<'a> MpqFile<'a> {
    pub(crate) fn open_archived(
        archive: &'a Archive,
        name: Option<&str>,
        hash_index: Option<usize>,
        block_index: u32,
        block: BlockEntry,
    ) -> Result<Self> {
        let file = ArchivedFile::new(archive, name, hash_index, block_index, block);
        Ok(Self {
            inner: Inner::Archived(Box::new(file)),
        })
    }

    /// Open a plain file on disk with the same read/seek interface
    pub fn open_local<P: AsRef<Path>>(path: P) -> Result<MpqFile<'static>> {
        Ok(MpqFile {
            inner: Inner::Local(LocalFile::open(path.as_ref())?),
        })
    }

    /// Read from the current position into `buf`
    ///
    /// Never reads past the end of the file. A short count is reported with
    /// [`ReadStatus::EndOfFile`]; an empty buffer reads nothing and is
    /// `Complete`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match &mut self.inner {
            Inner::Archived(file) => file.read(buf),
            Inner::Local(file) => file.read(buf),
        }
    }

    /// Move the file position
    ///
    /// Negative targets clamp to 0. Positions past the end are accepted and
    /// subsequent reads return nothing. Archived files reject positions that
    /// do not fit in 32 bits.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match &mut self.inner {
            Inner::Archived(file) => file.seek(pos),
            Inner::Local(file) => file.seek(pos),
        }
    }

    /// Current position
    pub fn position(&self) -> u64 {
        match &self.inner {
            Inner::Archived(file) => file.position(),
            Inner::Local(file) => file.position(),
        }
    }

    /// Size of the plaintext file in bytes
    pub fn size(&self) -> Result<u64> {
        match &self.inner {
            Inner::Archived(file) => Ok(file.size()),
            Inner::Local(file) => file.size(),
        }
    }

    /// Read the whole file from its start
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let size = usize::try_from(self.size()?)
            .map_err(|_| Error::invalid_parameter("File too large for memory"))?;
        let mut data = crate::error::alloc_buffer(size)?;

        self.seek(SeekFrom::Start(0))?;
        let outcome = self.read(&mut data)?;
        data.truncate(outcome.bytes_read);
        Ok(data)
    }

    /// Supply the decryption key of an archived file
    ///
    /// Discards every cached state that depends on the key. This is the way
    /// to continue after [`Error::UnknownFileKey`].
    pub fn set_key(&mut self, key: u32) -> Result<()> {
        match &mut self.inner {
            Inner::Archived(file) => {
                file.set_key(key);
                Ok(())
            }
            Inner::Local(_) => Err(Error::invalid_handle("Local files are not encrypted")),
        }
    }

    /// Decryption key, if known
    pub fn key(&self) -> Option<u32> {
        match &self.inner {
            Inner::Archived(file) => file.key(),
            Inner::Local(_) => None,
        }
    }

    /// Name the file was opened with
    pub fn name(&self) -> Option<&str> {
        match &self.inner {
            Inner::Archived(file) => file.name(),
            Inner::Local(file) => file.name(),
        }
    }

    /// Block table index of an archived file
    pub fn block_index(&self) -> Option<u32> {
        match &self.inner {
            Inner::Archived(file) => Some(file.block_index()),
            Inner::Local(_) => None,
        }
    }

    /// Block table entry of an archived file
    pub fn block(&self) -> Option<&BlockEntry> {
        match &self.inner {
            Inner::Archived(file) => Some(file.block()),
            Inner::Local(_) => None,
        }
    }

    /// Decode counters; all zero for local files
    pub fn stats(&self) -> DecodeStats {
        match &self.inner {
            Inner::Archived(file) => file.stats(),
            Inner::Local(_) => DecodeStats::default(),
        }
    }

    /// Write a 32-bit file property into `out`
    pub fn query_info(&self, class: InfoClass, out: &mut [u8]) -> Result<usize> {
        match &self.inner {
            Inner::Archived(file) => file.query_info(class, out),
            Inner::Local(_) => Err(Error::invalid_handle(
                "Local files have no archive metadata",
            )),
        }
    }

    /// The file's name, or a generated one when it was opened by index
    ///
    /// Generated names have the form `File00000012.wav`, where the extension
    /// is guessed from the first bytes of the file. The file position is
    /// left unchanged.
    pub fn pseudo_name(&mut self) -> Result<String> {
        if let Some(name) = self.name() {
            return Ok(name.to_string());
        }

        let block_index = self
            .block_index()
            .ok_or_else(|| Error::invalid_handle("File has no name"))?;

        let saved = self.position();
        self.seek(SeekFrom::Start(0))?;
        let mut first_bytes = [0u8; 8];
        let sniffed = self.read(&mut first_bytes);
        self.seek(SeekFrom::Start(saved))?;

        if let Err(e) = sniffed {
            log::debug!("Could not sniff block {}: {}", block_index, e);
            first_bytes = [0u8; 8];
        }

        Ok(format!(
            "File{:08}.{}",
            block_index,
            info::extension_for(&first_bytes)
        ))
    }

    /// Close the file, releasing its buffers
    pub fn close(self) {}
}

/// Resolve a seek request against the current position and file end
///
/// Negative results clamp to 0.
pub(crate) fn seek_target(pos: SeekFrom, current: u64, end: u64) -> u64 {
    let target = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(delta) => current as i128 + delta as i128,
        SeekFrom::End(delta) => end as i128 + delta as i128,
    };
    target.clamp(0, u64::MAX as i128) as u64
}

impl io::Read for MpqFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(MpqFile::read(self, buf)?.bytes_read)
    }
}

impl io::Seek for MpqFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(MpqFile::seek(self, pos)?)
    }
}
