//! Cat command implementation

use super::open_archive;
use crate::global_options;
use anyhow::{Context, Result};
use std::io::{self, SeekFrom, Write};

/// Write `length` bytes of a file starting at `offset` to stdout
pub fn cat(archive_path: &str, file_name: &str, offset: u64, length: Option<u64>) -> Result<()> {
    let archive = open_archive(archive_path)?;
    let mut file = archive
        .open_file(file_name)
        .with_context(|| format!("Failed to open {}", file_name))?;

    file.seek(SeekFrom::Start(offset))
        .with_context(|| format!("Failed to seek to {}", offset))?;

    let mut remaining = length.unwrap_or(u64::MAX);
    let mut buffer = vec![0u8; global_options().chunk_size];
    let stdout = io::stdout();
    let mut out = stdout.lock();

    while remaining > 0 {
        let want = remaining.min(buffer.len() as u64) as usize;
        let outcome = file
            .read(&mut buffer[..want])
            .with_context(|| format!("Failed to read {} at {}", file_name, file.position()))?;

        out.write_all(&buffer[..outcome.bytes_read])?;
        remaining -= outcome.bytes_read as u64;
        if outcome.is_eof() {
            break;
        }
    }

    out.flush()?;
    log::debug!("cat {}: {:?}", file_name, file.stats());
    Ok(())
}
