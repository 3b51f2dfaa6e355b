//! Per-handle state of a file inside an archive and its read/seek logic

use super::{seek_target, DecodeStats, ReadOutcome};
use crate::archive::Archive;
use crate::crypto::file_key;
use crate::error::alloc_buffer;
use crate::tables::BlockEntry;
use crate::{Error, Result};
use std::io::SeekFrom;

/// One decoded sector, tagged with its aligned logical offset
#[derive(Debug, Default)]
pub(super) struct SectorCache {
    pub(super) buffer: Vec<u8>,
    pub(super) offset: Option<u32>,
    pub(super) len: usize,
}

impl SectorCache {
    fn invalidate(&mut self) {
        self.offset = None;
        self.len = 0;
    }
}

#[derive(Debug)]
pub(crate) struct ArchivedFile<'a> {
    pub(super) archive: &'a Archive,
    pub(super) name: Option<String>,
    pub(super) hash_index: Option<usize>,
    pub(super) block_index: u32,
    pub(super) block: BlockEntry,
    /// Absolute stream position of the raw data
    pub(super) raw_pos: u64,
    pub(super) sector_size: u32,
    pub(super) key: Option<u32>,
    pub(super) position: u64,
    pub(super) sector_offsets: Option<Vec<u32>>,
    pub(super) sector_checksums: Option<Vec<u32>>,
    pub(super) checksums_loaded: bool,
    pub(super) cache: SectorCache,
    pub(super) unit: Option<Vec<u8>>,
    pub(super) stats: DecodeStats,
}

impl<'a> ArchivedFile<'a> {
    pub(super) fn new(
        archive: &'a Archive,
        name: Option<&str>,
        hash_index: Option<usize>,
        block_index: u32,
        block: BlockEntry,
    ) -> Self {
        let key = name.map(|name| {
            file_key(name, block.file_pos, block.file_size, block.has_fix_key())
        });

        log::debug!(
            "Opened {} (block {}): size {}, stored {}, flags {:?}",
            name.unwrap_or("<unnamed>"),
            block_index,
            block.file_size,
            block.compressed_size,
            block.flags
        );

        Self {
            archive,
            name: name.map(str::to_owned),
            hash_index,
            block_index,
            block,
            raw_pos: archive.block_position(block_index, &block),
            sector_size: archive.sector_size(),
            key,
            position: 0,
            sector_offsets: None,
            sector_checksums: None,
            checksums_loaded: false,
            cache: SectorCache::default(),
            unit: None,
            stats: DecodeStats::default(),
        }
    }

    pub(super) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(super) fn block_index(&self) -> u32 {
        self.block_index
    }

    pub(super) fn block(&self) -> &BlockEntry {
        &self.block
    }

    pub(super) fn key(&self) -> Option<u32> {
        self.key
    }

    pub(super) fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub(super) fn position(&self) -> u64 {
        self.position
    }

    pub(super) fn size(&self) -> u64 {
        self.block.file_size as u64
    }

    pub(super) fn set_key(&mut self, key: u32) {
        log::debug!("Key 0x{:08X} set for block {}", key, self.block_index);
        self.key = Some(key);
        self.sector_offsets = None;
        self.sector_checksums = None;
        self.checksums_loaded = false;
        self.cache.invalidate();
        self.unit = None;
    }

    /// Read raw bytes at `offset` from the start of this file's data
    pub(super) fn read_raw(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.stats.stream_reads += 1;
        self.archive.read_raw(self.raw_pos + offset as u64, buf)
    }

    pub(super) fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = seek_target(pos, self.position, self.size());
        if target > u32::MAX as u64 {
            return Err(Error::invalid_parameter(format!(
                "Position {} is beyond the 32-bit range of archived files",
                target
            )));
        }

        self.position = target;
        Ok(target)
    }

    pub(super) fn read(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        let file_size = self.size();
        if buf.is_empty() || self.position >= file_size {
            return Ok(ReadOutcome::new(0, buf.len()));
        }

        let to_read = (file_size - self.position).min(buf.len() as u64) as usize;
        // position < file_size <= u32::MAX
        let offset = self.position as u32;

        if self.block.is_single_unit() {
            self.read_single_unit(&mut buf[..to_read], offset)?;
        } else {
            self.read_sectored(&mut buf[..to_read], offset)?;
        }

        self.position += to_read as u64;
        Ok(ReadOutcome::new(to_read, buf.len()))
    }

    /// Split a read into a leading partial sector, a run of whole sectors and
    /// a trailing partial sector
    ///
    /// `out` must not extend past the end of the file.
    fn read_sectored(&mut self, out: &mut [u8], offset: u32) -> Result<()> {
        let sector_size = self.sector_size as usize;
        let mut done = 0usize;
        let mut offset = offset;

        let in_sector = (offset % self.sector_size) as usize;
        if in_sector != 0 {
            let available = self.load_cached_sector(offset - in_sector as u32)?;
            let count = out.len().min(available.saturating_sub(in_sector));
            out[..count].copy_from_slice(&self.cache.buffer[in_sector..in_sector + count]);
            done += count;
            offset += count as u32;
        }

        let whole = (out.len() - done) / sector_size * sector_size;
        if whole > 0 {
            log::trace!("Batched read of {} sectors at {}", whole / sector_size, offset);
            let produced = self.read_sectors(&mut out[done..done + whole], offset, whole as u32)?;
            if produced != whole {
                return Err(Error::file_corrupt(format!(
                    "Decoded {} bytes where {} were expected",
                    produced, whole
                )));
            }
            self.stats.batched_runs += 1;
            done += whole;
            offset += whole as u32;
        }

        if done < out.len() {
            let available = self.load_cached_sector(offset)?;
            let count = out.len() - done;
            if available < count {
                return Err(Error::file_corrupt(format!(
                    "Sector at {} decoded to {} bytes, {} needed",
                    offset, available, count
                )));
            }
            out[done..].copy_from_slice(&self.cache.buffer[..count]);
        }

        Ok(())
    }

    /// Make the cache hold the sector starting at `aligned`, returning its length
    fn load_cached_sector(&mut self, aligned: u32) -> Result<usize> {
        if self.cache.offset == Some(aligned) {
            self.stats.cache_hits += 1;
            return Ok(self.cache.len);
        }

        let mut buffer = std::mem::take(&mut self.cache.buffer);
        if buffer.len() < self.sector_size as usize {
            buffer = alloc_buffer(self.sector_size as usize)?;
        }

        self.cache.invalidate();
        let result = self.read_sectors(&mut buffer, aligned, self.sector_size);
        self.cache.buffer = buffer;

        let len = result?;
        self.cache.offset = Some(aligned);
        self.cache.len = len;
        self.stats.cache_fills += 1;
        Ok(len)
    }
}
