//! Lazy loading of the sector offset and checksum tables

use super::archived::ArchivedFile;
use super::pipeline::{sector_checksum, CHECKSUM_SENTINELS};
use crate::compression::{self, decompress_multi};
use crate::crypto::decrypt_bytes;
use crate::error::alloc_buffer;
use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

impl ArchivedFile<'_> {
    /// Number of sectors covering the file
    pub(super) fn sector_count(&self) -> u32 {
        self.block.file_size.div_ceil(self.sector_size)
    }

    /// Load and decrypt the sector offset table of a compressed file
    pub(super) fn ensure_sector_offsets(&mut self) -> Result<()> {
        if self.sector_offsets.is_some() {
            return Ok(());
        }

        let sectors = self.sector_count();
        let entries = sectors as usize + 1 + usize::from(self.block.has_sector_crc());
        let table_len = entries * 4;
        if table_len > self.block.compressed_size as usize {
            return Err(Error::file_corrupt(format!(
                "Sector table of {} bytes exceeds stored size {}",
                table_len, self.block.compressed_size
            )));
        }

        let mut raw = alloc_buffer(table_len)?;
        self.read_raw(0, &mut raw)?;

        let (offsets, detected_table_key) = match (self.block.is_encrypted(), self.key) {
            (false, _) => {
                let offsets = parse_offsets(&raw)
                    .filter(|offsets| self.offsets_valid(offsets, sectors))
                    .ok_or_else(|| Error::file_corrupt("Sector offset table is inconsistent"))?;
                (offsets, None)
            }
            (true, Some(key)) => {
                let offsets =
                    self.decrypt_sector_offsets(&raw, sectors, &[key.wrapping_sub(1), key])?;
                (offsets, None)
            }
            (true, None) => {
                // The detector reports the file key under the key - 1 convention
                let table_key = self
                    .archive
                    .key_detector()
                    .detect_from_offset_table(&raw, self.sector_size)
                    .ok_or(Error::UnknownFileKey)?
                    .wrapping_sub(1);
                let offsets = self.decrypt_sector_offsets(&raw, sectors, &[table_key])?;
                (offsets, Some(table_key))
            }
        };

        log::debug!(
            "Loaded {} sector offsets for block {}",
            offsets.len(),
            self.block_index
        );
        self.sector_offsets = Some(offsets);

        if let Some(table_key) = detected_table_key {
            match self.resolve_detected_key(table_key) {
                Ok(key) => {
                    log::debug!(
                        "Detected key 0x{:08X} for block {} from its sector table",
                        key,
                        self.block_index
                    );
                    self.key = Some(key);
                }
                Err(e) => {
                    self.sector_offsets = None;
                    self.sector_checksums = None;
                    self.checksums_loaded = false;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn decrypt_sector_offsets(
        &self,
        raw: &[u8],
        sectors: u32,
        table_keys: &[u32],
    ) -> Result<Vec<u32>> {
        for (attempt, &table_key) in table_keys.iter().enumerate() {
            let mut table = raw.to_vec();
            decrypt_bytes(&mut table, table_key);

            if let Some(offsets) = parse_offsets(&table) {
                if self.offsets_valid(&offsets, sectors) {
                    if attempt > 0 {
                        log::warn!(
                            "Sector table of block {} is encrypted with the file key itself",
                            self.block_index
                        );
                    }
                    return Ok(offsets);
                }
            }
        }

        Err(Error::file_corrupt(
            "Sector offset table does not decrypt to increasing offsets",
        ))
    }

    /// Pick the file key matching a table key recovered by detection
    ///
    /// The table is encrypted with either `key - 1` or `key`, so both
    /// candidates are tried on sector 0: its checksum decides when one is
    /// stored, otherwise the sector has to decompress.
    fn resolve_detected_key(&mut self, table_key: u32) -> Result<u32> {
        let candidates = [table_key.wrapping_add(1), table_key];
        if self.block.file_size == 0 {
            return Ok(candidates[0]);
        }

        self.ensure_sector_checksums()?;
        let (start, end) = match self.sector_offsets.as_deref() {
            Some([start, end, ..]) => (*start, *end),
            _ => return Err(Error::file_corrupt("Sector offsets missing")),
        };
        let plain_len = self.block.file_size.min(self.sector_size) as usize;
        let expected = self
            .sector_checksums
            .as_deref()
            .and_then(|sums| sums.first().copied())
            .filter(|sum| !CHECKSUM_SENTINELS.contains(sum));

        let stored_len = (end - start) as usize;
        if expected.is_none() && stored_len >= plain_len {
            // Stored verbatim and unchecked: nothing tells the candidates apart
            return Ok(candidates[0]);
        }

        let family = self
            .block
            .codec_family()
            .ok_or_else(|| Error::file_corrupt("Compressed file without codec"))?;
        let mut raw = alloc_buffer(stored_len)?;
        self.read_raw(start, &mut raw)?;
        let mut plain = alloc_buffer(plain_len)?;

        for key in candidates {
            let mut sector = raw.clone();
            decrypt_bytes(&mut sector, key);

            let matches = match expected {
                Some(sum) => sector_checksum(&sector) == sum,
                None => compression::decompress(family, &mut plain, &sector).is_ok(),
            };
            if matches {
                return Ok(key);
            }
        }

        log::debug!(
            "Neither key candidate decodes sector 0 of block {}",
            self.block_index
        );
        Err(Error::UnknownFileKey)
    }

    fn offsets_valid(&self, offsets: &[u32], sectors: u32) -> bool {
        let sectors = sectors as usize;
        let table_len = (offsets.len() * 4) as u32;

        offsets[0] >= table_len
            && offsets[..=sectors].windows(2).all(|pair| pair[0] < pair[1])
            && offsets[sectors] <= self.block.compressed_size
    }

    /// Load the per-sector checksums when the file has them and checking is on
    pub(super) fn ensure_sector_checksums(&mut self) -> Result<()> {
        if self.checksums_loaded {
            return Ok(());
        }

        if !self.archive.verify_sector_checksums()
            || !self.block.has_sector_crc()
            || !self.block.is_compressed()
            || self.block.is_single_unit()
        {
            self.checksums_loaded = true;
            return Ok(());
        }

        self.ensure_sector_offsets()?;
        let sectors = self.sector_count() as usize;
        let (start, end) = match self.sector_offsets.as_deref() {
            Some(offsets) if offsets.len() > sectors + 1 => (offsets[sectors], offsets[sectors + 1]),
            _ => (0, 0),
        };

        if end <= start || end > self.block.compressed_size {
            log::warn!(
                "Block {} has an invalid checksum table extent [{}, {}), skipping verification",
                self.block_index,
                start,
                end
            );
            self.checksums_loaded = true;
            return Ok(());
        }

        let mut raw = alloc_buffer((end - start) as usize)?;
        self.read_raw(start, &mut raw)?;

        let table_len = sectors * 4;
        let table = if raw.len() < table_len {
            match decompress_multi(&raw, table_len) {
                Ok(table) => table,
                Err(e) => {
                    log::warn!(
                        "Checksum table of block {} failed to decompress: {}",
                        self.block_index,
                        e
                    );
                    self.checksums_loaded = true;
                    return Ok(());
                }
            }
        } else {
            raw.truncate(table_len);
            raw
        };

        let mut checksums = vec![0u32; sectors];
        LittleEndian::read_u32_into(&table, &mut checksums);
        log::debug!(
            "Loaded {} sector checksums for block {}",
            sectors,
            self.block_index
        );

        self.sector_checksums = Some(checksums);
        self.checksums_loaded = true;
        Ok(())
    }
}

fn parse_offsets(table: &[u8]) -> Option<Vec<u32>> {
    if table.is_empty() || table.len() % 4 != 0 {
        return None;
    }
    let mut offsets = vec![0u32; table.len() / 4];
    LittleEndian::read_u32_into(table, &mut offsets);
    Some(offsets)
}
