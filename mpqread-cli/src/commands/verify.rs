//! Verify command implementation

use super::open_archive;
use crate::{global_options, output};
use anyhow::Result;
use colored::*;
use mpqread::{Archive, Error};
use serde::Serialize;

#[derive(Serialize)]
struct VerifyResult {
    archive: String,
    checked: usize,
    failures: Vec<FileFailure>,
}

#[derive(Serialize)]
struct FileFailure {
    filename: String,
    error: String,
}

/// Read every file named in the (listfile), reporting the ones that fail
pub fn verify(archive_path: &str) -> Result<()> {
    let archive = open_archive(archive_path)?;
    if !global_options().verify_checksums {
        log::warn!("Sector checksum verification is disabled");
    }

    let entries = match archive.list() {
        Ok(entries) => entries,
        Err(Error::FileNotFound(_)) => {
            log::warn!("No (listfile) found - cannot verify individual files");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let mut failures = Vec::new();
    for entry in &entries {
        match read_through(&archive, &entry.name) {
            Ok(size) => output::verbose_println(1, &format!("{}: {} bytes OK", entry.name, size)),
            Err(e) => failures.push(FileFailure {
                filename: entry.name.clone(),
                error: e.to_string(),
            }),
        }
    }

    let result = VerifyResult {
        archive: archive_path.to_string(),
        checked: entries.len(),
        failures,
    };

    if output::is_json() {
        output::print_json(&result)?;
    } else if output::show_text() {
        println!("Verified {} files in {}", result.checked, archive_path);
        if result.failures.is_empty() {
            println!("{}", "All files read successfully".green());
        } else {
            for failure in &result.failures {
                println!("  {} {}: {}", "✗".red().bold(), failure.filename, failure.error);
            }
        }
    }

    if result.failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Archive verification failed for {} of {} files",
            result.failures.len(),
            result.checked
        ))
    }
}

/// Decode a whole file in chunks, discarding the data
fn read_through(archive: &Archive, name: &str) -> mpqread::Result<u64> {
    let mut file = archive.open_file(name)?;
    let mut buffer = vec![0u8; global_options().chunk_size];
    let mut total = 0u64;

    loop {
        let outcome = file.read(&mut buffer)?;
        total += outcome.bytes_read as u64;
        if outcome.is_eof() {
            return Ok(total);
        }
    }
}
