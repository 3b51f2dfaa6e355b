//! Sector decode pipeline: raw read, decrypt, checksum, decompress

use super::archived::ArchivedFile;
use crate::compression;
use crate::crypto::decrypt_bytes;
use crate::error::alloc_buffer;
use crate::{Error, Result};

/// Checksum values that mean "not checked"
pub(super) const CHECKSUM_SENTINELS: [u32; 2] = [0, 0xFFFF_FFFF];

pub(super) fn sector_checksum(data: &[u8]) -> u32 {
    let mut adler = adler::Adler32::from_checksum(0);
    adler.write_slice(data);
    adler.checksum()
}

impl ArchivedFile<'_> {
    /// Decode whole sectors starting at the sector-aligned `byte_offset`
    ///
    /// The request is clipped to the end of the file; `out` must hold at
    /// least the clipped length. Returns the number of plaintext bytes
    /// written. On error, sectors before the failing one stay written.
    pub(super) fn read_sectors(
        &mut self,
        out: &mut [u8],
        byte_offset: u32,
        bytes_to_read: u32,
    ) -> Result<usize> {
        let file_size = self.block.file_size;
        if byte_offset >= file_size {
            return Ok(0);
        }
        debug_assert_eq!(byte_offset % self.sector_size, 0);

        let to_read = bytes_to_read.min(file_size - byte_offset) as usize;
        let first = byte_offset / self.sector_size;
        let count = (to_read as u32).div_ceil(self.sector_size);
        let out = &mut out[..to_read];

        if self.block.is_compressed() {
            self.ensure_sector_offsets()?;
            self.ensure_sector_checksums()?;

            let offsets = self
                .sector_offsets
                .as_deref()
                .ok_or_else(|| Error::file_corrupt("Sector offsets missing"))?;
            let raw_start = offsets[first as usize];
            let raw_end = offsets[(first + count) as usize];
            let mut raw = alloc_buffer((raw_end - raw_start) as usize)?;
            self.read_raw(raw_start, &mut raw)?;

            self.decode_compressed(out, &mut raw, first, raw_start)?;
        } else {
            self.read_raw(byte_offset, out)?;
            self.decode_plain(out, first)?;
        }

        self.stats.sectors_decoded += count as u64;
        Ok(to_read)
    }

    fn decode_compressed(
        &self,
        out: &mut [u8],
        raw: &mut [u8],
        first: u32,
        raw_start: u32,
    ) -> Result<()> {
        let sector_size = self.sector_size as usize;
        let family = self
            .block
            .codec_family()
            .ok_or_else(|| Error::file_corrupt("Compressed file without codec"))?;
        let key = if self.block.is_encrypted() {
            Some(self.key.ok_or(Error::UnknownFileKey)?)
        } else {
            None
        };

        let offsets = self
            .sector_offsets
            .as_deref()
            .ok_or_else(|| Error::file_corrupt("Sector offsets missing"))?;
        let checksums = self.sector_checksums.as_deref();

        for (i, plain) in out.chunks_mut(sector_size).enumerate() {
            let index = first + i as u32;
            let start = (offsets[index as usize] - raw_start) as usize;
            let end = (offsets[index as usize + 1] - raw_start) as usize;
            let sector = &mut raw[start..end];

            if let Some(key) = key {
                decrypt_bytes(sector, key.wrapping_add(index));
            }

            if let Some(expected) = checksums.and_then(|sums| sums.get(index as usize).copied()) {
                if !CHECKSUM_SENTINELS.contains(&expected) {
                    let actual = sector_checksum(sector);
                    if actual != expected {
                        return Err(Error::ChecksumError {
                            sector: index,
                            expected,
                            actual,
                        });
                    }
                }
            }

            log::trace!(
                "Sector {}: {} raw bytes -> {} bytes",
                index,
                sector.len(),
                plain.len()
            );

            if sector.len() < plain.len() {
                compression::decompress(family, plain, sector)?;
            } else {
                plain.copy_from_slice(&sector[..plain.len()]);
            }
        }

        Ok(())
    }

    /// Decrypt uncompressed sectors in place
    fn decode_plain(&mut self, out: &mut [u8], first: u32) -> Result<()> {
        if !self.block.is_encrypted() {
            return Ok(());
        }

        let key = match self.key {
            Some(key) => key,
            None => self.detect_key_from_sector(out, first)?,
        };

        for (i, sector) in out.chunks_mut(self.sector_size as usize).enumerate() {
            let index = first + i as u32;
            decrypt_bytes(sector, key.wrapping_add(index));
        }
        Ok(())
    }

    /// Recover the file key from the still-encrypted content of a sector
    pub(super) fn detect_key_from_sector(&mut self, data: &[u8], sector_index: u32) -> Result<u32> {
        let sector = &data[..data.len().min(self.sector_size as usize)];
        let key = self
            .archive
            .key_detector()
            .detect_from_sector(sector, sector_index, self.block.file_size)
            .ok_or(Error::UnknownFileKey)?;

        log::debug!(
            "Detected key 0x{:08X} for block {} from sector {}",
            key,
            self.block_index,
            sector_index
        );
        self.key = Some(key);
        Ok(key)
    }
}
