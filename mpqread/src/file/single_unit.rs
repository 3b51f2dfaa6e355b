//! Files stored as a single unit, decoded once and kept in memory

use super::archived::ArchivedFile;
use crate::compression::{self, CodecFamily};
use crate::crypto::decrypt_bytes;
use crate::error::alloc_buffer;
use crate::tables::BlockFlags;
use crate::{Error, Result};

impl ArchivedFile<'_> {
    /// Decode the whole file into the handle's unit buffer on first use
    fn ensure_unit_loaded(&mut self) -> Result<()> {
        if self.unit.is_some() {
            return Ok(());
        }

        if self.block.flags.contains(BlockFlags::IMPLODE) {
            return Err(Error::file_corrupt(
                "Single-unit files cannot be imploded",
            ));
        }

        let file_size = self.block.file_size as usize;
        let stored_size = self.block.compressed_size as usize;
        let compressed = self.block.is_compressed() && stored_size < file_size;
        if stored_size < file_size && !compressed {
            return Err(Error::file_corrupt(format!(
                "Stored size {} is smaller than file size {} without compression",
                stored_size, file_size
            )));
        }

        let mut unit = alloc_buffer(file_size)?;
        let mut scratch = if compressed {
            alloc_buffer(stored_size)?
        } else {
            Vec::new()
        };
        let raw: &mut [u8] = if compressed { &mut scratch } else { &mut unit };
        self.read_raw(0, raw)?;

        if self.block.is_encrypted() {
            let key = match self.key {
                Some(key) => key,
                None => self.detect_key_from_sector(raw, 0)?,
            };
            decrypt_bytes(raw, key);
        }

        if compressed {
            compression::decompress(CodecFamily::Multi, &mut unit, &scratch)?;
        }

        log::debug!(
            "Decoded single-unit block {} ({} -> {} bytes)",
            self.block_index,
            stored_size.min(file_size),
            file_size
        );
        self.stats.sectors_decoded += 1;
        self.unit = Some(unit);
        Ok(())
    }

    /// Copy `out.len()` bytes at `offset` out of the decoded unit
    pub(super) fn read_single_unit(&mut self, out: &mut [u8], offset: u32) -> Result<()> {
        self.ensure_unit_loaded()?;

        let unit = self
            .unit
            .as_deref()
            .ok_or_else(|| Error::file_corrupt("Single-unit buffer missing"))?;
        let start = offset as usize;
        out.copy_from_slice(&unit[start..start + out.len()]);
        Ok(())
    }
}
