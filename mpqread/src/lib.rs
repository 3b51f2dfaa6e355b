//! # mpqread - random-access reader for MPQ archives
//!
//! Reads files stored inside MPQ (Mo'PaQ) archives, the container format
//! used by Blizzard Entertainment games. Files are decoded lazily: a read of
//! any byte range only fetches, decrypts, verifies and decompresses the
//! sectors it touches.
//!
//! ## Features
//!
//! - Hash/block table parsing with name lookup and locale selection
//! - Per-sector decryption, including key recovery for unnamed files
//! - Adler-32 sector checksum verification
//! - zlib, bzip2, LZMA, sparse and PKWARE implode decompression
//! - A one-sector cache that keeps small sequential reads cheap
//! - `std::io::Read` and `std::io::Seek` on every open file
//! - Memory-mapped I/O support
//!
//! ## Example
//!
//! ```no_run
//! use mpqread::Archive;
//! use std::io::SeekFrom;
//!
//! # fn main() -> Result<(), mpqread::Error> {
//! let archive = Archive::open("example.mpq")?;
//!
//! for entry in archive.list()? {
//!     println!("{} ({} bytes)", entry.name, entry.file_size);
//! }
//!
//! let mut file = archive.open_file("war3map.j")?;
//! file.seek(SeekFrom::Start(1024))?;
//! let mut buf = [0u8; 256];
//! let outcome = file.read(&mut buf)?;
//! println!("read {} bytes, eof: {}", outcome.bytes_read, outcome.is_eof());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod compression;
pub mod crypto;
pub mod error;
pub mod file;
pub mod header;
pub mod io;
pub mod listfile;
pub mod tables;

// Re-export commonly used types
pub use archive::{Archive, FileEntry, OpenOptions};
pub use crypto::{KeyDetector, KnownContentDetector, NoKeyDetection};
pub use error::{Error, Result};
pub use file::{DecodeStats, InfoClass, MpqFile, ReadOutcome, ReadStatus};
pub use tables::{BlockEntry, BlockFlags, HashEntry};

/// MPQ format version constants
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatVersion {
    /// Original MPQ format (32-byte header)
    V1 = 0,
    /// The Burning Crusade format (44-byte header)
    V2 = 1,
    /// Cataclysm Beta format (68-byte header)
    V3 = 2,
    /// Cataclysm+ format (208-byte header)
    V4 = 3,
}

/// MPQ signature constants
pub mod signatures {
    /// Standard MPQ archive signature ('MPQ\x1A')
    pub const MPQ_ARCHIVE: u32 = 0x1A51504D;

    /// MPQ user data signature ('MPQ\x1B')
    pub const MPQ_USERDATA: u32 = 0x1B51504D;
}

/// Sector size for a header's sector size shift
#[inline]
pub fn calculate_sector_size(sector_size_shift: u16) -> usize {
    512 << sector_size_shift
}

/// Check if a value is a power of two
#[inline]
pub fn is_power_of_two(value: u32) -> bool {
    value != 0 && (value & (value - 1)) == 0
}
