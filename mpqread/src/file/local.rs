//! Plain files on disk behind the archive file interface

use super::{seek_target, ReadOutcome};
use crate::Result;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug)]
pub(crate) struct LocalFile {
    file: File,
    name: String,
    position: u64,
}

impl LocalFile {
    pub(super) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        log::debug!("Opened local file {}", path.display());
        Ok(Self {
            file,
            name: path.to_string_lossy().into_owned(),
            position: 0,
        })
    }

    pub(super) fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    pub(super) fn position(&self) -> u64 {
        self.position
    }

    pub(super) fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Fill `buf` until it is full or the file ends
    pub(super) fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        self.position += total as u64;
        Ok(ReadOutcome::new(total, buf.len()))
    }

    pub(super) fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = seek_target(pos, self.position, self.size()?);
        self.position = self.file.seek(SeekFrom::Start(target))?;
        Ok(self.position)
    }
}
