//! Info command implementation

use super::open_archive;
use crate::output;
use anyhow::Result;
use colored::*;
use serde::Serialize;

#[derive(Serialize)]
struct ArchiveSummary {
    path: String,
    archive_offset: u64,
    user_data_size: Option<u32>,
    format_version: u16,
    header_size: u32,
    archive_size: u32,
    sector_size: u32,
    hash_table_entries: u32,
    block_table_entries: u32,
    file_count: usize,
    has_listfile: bool,
}

/// Show header and table information of an archive
pub fn info(archive_path: &str) -> Result<()> {
    let archive = open_archive(archive_path)?;
    let header = archive.header();

    let summary = ArchiveSummary {
        path: archive_path.to_string(),
        archive_offset: archive.archive_offset(),
        user_data_size: archive.user_data().map(|user_data| user_data.user_data_size),
        format_version: header.format_version,
        header_size: header.header_size,
        archive_size: header.archive_size,
        sector_size: archive.sector_size(),
        hash_table_entries: header.hash_table_entries,
        block_table_entries: header.block_table_entries,
        file_count: archive.file_count(),
        has_listfile: archive.has_file(mpqread::listfile::LISTFILE_NAME),
    };

    if output::is_json() {
        output::print_json(&summary)?;
        return Ok(());
    }
    if !output::show_text() {
        return Ok(());
    }

    if output::use_color() {
        println!("{}: {}", "Archive".bold(), archive_path.cyan());
    } else {
        println!("Archive: {}", archive_path);
    }
    output::field("Archive offset", format!("0x{:X}", summary.archive_offset));
    if let Some(size) = summary.user_data_size {
        output::field("User data", output::format_size(size as u64));
    }
    output::field(
        "Format version",
        format!("{} (header {} bytes)", summary.format_version + 1, summary.header_size),
    );
    output::field("Archive size", output::format_size(summary.archive_size as u64));
    output::field("Sector size", summary.sector_size);
    output::field("Hash table entries", summary.hash_table_entries);
    output::field("Block table entries", summary.block_table_entries);
    output::field("Files", summary.file_count);
    output::field("Listfile", if summary.has_listfile { "yes" } else { "no" });

    Ok(())
}
