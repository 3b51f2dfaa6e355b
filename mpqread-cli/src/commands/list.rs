//! List command implementation

use super::open_archive;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use mpqread::{Archive, BlockFlags};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Serialize)]
struct FileListEntry {
    name: String,
    block_index: u32,
    size: u32,
    compressed_size: u32,
    flags: Vec<&'static str>,
}

/// Short names of the flags worth showing in a listing
fn flag_names(flags: BlockFlags) -> Vec<&'static str> {
    [
        (BlockFlags::IMPLODE, "implode"),
        (BlockFlags::COMPRESS, "compress"),
        (BlockFlags::ENCRYPTED, "encrypted"),
        (BlockFlags::FIX_KEY, "fix-key"),
        (BlockFlags::SINGLE_UNIT, "single-unit"),
        (BlockFlags::SECTOR_CRC, "crc"),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, name)| name)
    .collect()
}

/// List files in an MPQ archive
///
/// Without `show_all` only names from the (listfile) are shown. With it,
/// every existing block is listed and unnamed ones get a generated name.
pub fn list(archive_path: &str, show_all: bool) -> Result<()> {
    let archive = open_archive(archive_path)?;

    let entries = if show_all {
        list_blocks(&archive)?
    } else {
        archive
            .list()
            .context("Failed to read (listfile); use --all to list unnamed files")?
            .into_iter()
            .map(|entry| FileListEntry {
                name: entry.name,
                block_index: entry.block_index,
                size: entry.file_size,
                compressed_size: entry.compressed_size,
                flags: flag_names(entry.flags),
            })
            .collect()
    };

    if output::is_json() {
        output::print_json(&entries)?;
        return Ok(());
    }
    if !output::show_text() {
        return Ok(());
    }

    for entry in &entries {
        let size = format!("{:>10}", entry.size);
        let flags = entry.flags.join(",");
        if output::use_color() {
            println!("{} {}  {}", size, entry.name.cyan(), flags.dimmed());
        } else {
            println!("{} {}  {}", size, entry.name, flags);
        }
    }
    output::verbose_println(1, &format!("{} files", entries.len()));

    Ok(())
}

fn list_blocks(archive: &Archive) -> Result<Vec<FileListEntry>> {
    let names: HashMap<u32, String> = match archive.list() {
        Ok(entries) => entries
            .into_iter()
            .map(|entry| (entry.block_index, entry.name))
            .collect(),
        Err(e) => {
            log::info!("No usable (listfile): {}", e);
            HashMap::new()
        }
    };

    let mut entries = Vec::new();
    for (index, block) in archive.block_table().entries().iter().enumerate() {
        if !block.exists() {
            continue;
        }
        let block_index = index as u32;

        let name = match names.get(&block_index) {
            Some(name) => name.clone(),
            None => archive
                .open_file_by_index(block_index)
                .and_then(|mut file| file.pseudo_name())
                .with_context(|| format!("Failed to name block {}", block_index))?,
        };

        entries.push(FileListEntry {
            name,
            block_index,
            size: block.file_size,
            compressed_size: block.compressed_size,
            flags: flag_names(block.flags),
        });
    }

    Ok(entries)
}
