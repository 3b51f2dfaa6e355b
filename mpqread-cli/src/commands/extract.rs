//! Extract command implementation

use super::open_archive;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use mpqread::listfile::LISTFILE_NAME;
use mpqread::Archive;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

#[derive(Serialize)]
struct FileExtractResult {
    filename: String,
    output_path: String,
    size: u64,
    error: Option<String>,
}

#[derive(Serialize)]
struct ExtractResult {
    archive: String,
    output_dir: String,
    extracted: usize,
    failed: usize,
    files: Vec<FileExtractResult>,
}

/// Extract one file, or every file named in the (listfile)
pub fn extract(archive_path: &str, output_dir: &str, file: Option<&str>) -> Result<()> {
    let archive = open_archive(archive_path)?;

    let filenames: Vec<String> = match file {
        Some(name) => vec![name.to_string()],
        None => archive
            .list()
            .context("Failed to read (listfile)")?
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| name != LISTFILE_NAME)
            .collect(),
    };

    let progress = if file.is_none() && output::show_text() {
        let pb = ProgressBar::new(filenames.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut results = Vec::with_capacity(filenames.len());
    for filename in &filenames {
        let output_path = build_output_path(Path::new(output_dir), filename);
        if let Some(pb) = &progress {
            pb.set_message(filename.clone());
        }
        output::verbose_println(
            1,
            &format!("Extracting {} -> {}", filename, output_path.display()),
        );

        let result = extract_file(&archive, filename, &output_path);
        if progress.is_none() && output::show_text() {
            match &result {
                Ok(size) => println!(
                    "Extracting {} ... {} ({})",
                    filename.cyan(),
                    "OK".green().bold(),
                    output::format_size(*size).dimmed()
                ),
                Err(e) => println!(
                    "Extracting {} ... {}: {}",
                    filename.cyan(),
                    "FAILED".red().bold(),
                    format!("{:#}", e).red()
                ),
            }
        }

        results.push(FileExtractResult {
            filename: filename.clone(),
            output_path: output_path.display().to_string(),
            size: *result.as_ref().unwrap_or(&0),
            error: result.err().map(|e| format!("{:#}", e)),
        });

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let summary = ExtractResult {
        archive: archive_path.to_string(),
        output_dir: output_dir.to_string(),
        extracted: results.len() - failed,
        failed,
        files: results,
    };

    if output::is_json() {
        output::print_json(&summary)?;
    } else if output::show_text() && file.is_none() {
        println!();
        println!("{}", "Extraction complete:".bold().underline());
        output::field("Files extracted", summary.extracted.to_string().green());
        if failed > 0 {
            output::field("Files failed", failed.to_string().red());
            for result in summary.files.iter().filter(|r| r.error.is_some()) {
                println!("    {}: {}", result.filename, result.error.as_deref().unwrap_or(""));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to extract", failed, filenames.len());
    }
    Ok(())
}

/// Stream one file to disk, returning its size
fn extract_file(archive: &Archive, filename: &str, output_path: &Path) -> Result<u64> {
    let mut file = archive
        .open_file(filename)
        .with_context(|| format!("Failed to open {}", filename))?;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut out = BufWriter::new(
        File::create(output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?,
    );
    let size = io::copy(&mut file, &mut out).with_context(|| format!("Failed to read {}", filename))?;
    out.flush()?;
    Ok(size)
}

/// Map an archive path (backslash separated) below `output_dir`
///
/// Root, parent and current-directory components are dropped so entries
/// cannot escape the target directory.
fn build_output_path(output_dir: &Path, filename: &str) -> PathBuf {
    let mut path = output_dir.to_path_buf();
    for part in filename.split(['\\', '/']) {
        if let Some(Component::Normal(part)) = Path::new(part).components().next() {
            path.push(part);
        }
    }
    path
}
