//! Subcommand implementations

pub mod cat;
pub mod extract;
pub mod info;
pub mod list;
pub mod verify;

use crate::global_options;
use anyhow::{Context, Result};
use mpqread::{Archive, OpenOptions};

/// Open an archive with the checksum and mapping settings of this run
pub fn open_archive(archive_path: &str) -> Result<Archive> {
    let opts = global_options();
    OpenOptions::new()
        .verify_sector_checksums(opts.verify_checksums)
        .memory_map(opts.memory_map)
        .open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path))
}
