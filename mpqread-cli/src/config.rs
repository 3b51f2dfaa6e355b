//! Configuration file support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default output format ("text" or "json")
    pub default_output: Option<String>,

    /// Check sector checksums while reading
    pub verify_checksums: Option<bool>,

    /// Memory-map archives instead of reading through a file handle
    pub memory_map: Option<bool>,

    /// Size of the pieces `cat` reads and writes
    pub chunk_size: Option<usize>,
}

/// Default configuration file locations, in search order
fn default_paths() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| {
            vec![
                home.join(".mpqread").join("config.toml"),
                home.join(".config").join("mpqread").join("config.toml"),
            ]
        })
        .unwrap_or_default()
}

/// Load configuration from file or defaults
///
/// An explicitly given file must exist; the default locations are optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_paths().into_iter().find(|path| path.exists()) {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };

    log::debug!("Loading configuration from {}", config_path.display());
    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid configuration in {}", config_path.display()))
}

fn parse_config(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}
