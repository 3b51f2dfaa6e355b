use crate::{global_options, OutputFormat};
use colored::*;
use serde::Serialize;
use std::io;

/// Print JSON output
pub fn print_json<T: Serialize>(data: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}

/// Whether structured output was requested
pub fn is_json() -> bool {
    global_options().output == OutputFormat::Json
}

/// Whether regular text output should be printed
pub fn show_text() -> bool {
    let opts = global_options();
    !opts.quiet && opts.output == OutputFormat::Text
}

/// Print verbose message (only if verbose mode is on)
pub fn verbose_println(level: u8, message: &str) {
    let opts = global_options();

    if !opts.quiet && opts.verbose >= level {
        eprintln!("{} {}", "[VERBOSE]".dimmed(), message);
    }
}

/// Check if we should use color
pub fn use_color() -> bool {
    let opts = global_options();
    !opts.no_color && opts.output == OutputFormat::Text
}

/// A "label: value" line, bold label when colors are on
pub fn field(label: &str, value: impl std::fmt::Display) {
    if use_color() {
        println!("  {}: {}", label.bold(), value);
    } else {
        println!("  {}: {}", label, value);
    }
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
