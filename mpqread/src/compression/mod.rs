//! Decompression of MPQ file data
//!
//! Files use one of two codec families, chosen by their block flags:
//! the legacy PKWARE implode format, or Blizzard's multi-compression where
//! the first byte of every compressed sector is a mask of the algorithms
//! that were applied.

mod algorithms;
mod multi;

use crate::{Error, Result};

pub use multi::decompress_multi;

/// Compression method flags
pub mod flags {
    /// Huffman (used for WAVE files, not supported for reading)
    pub const HUFFMAN: u8 = 0x01;
    /// Deflate with zlib header
    pub const ZLIB: u8 = 0x02;
    /// PKWARE Data Compression Library
    pub const PKWARE: u8 = 0x08;
    /// bzip2
    pub const BZIP2: u8 = 0x10;
    /// Run-length encoding of zero bytes
    pub const SPARSE: u8 = 0x20;
    /// IMA ADPCM mono (not supported for reading)
    pub const ADPCM_MONO: u8 = 0x40;
    /// IMA ADPCM stereo (not supported for reading)
    pub const ADPCM_STEREO: u8 = 0x80;
    /// LZMA; exclusive, never combined with other bits
    pub const LZMA: u8 = 0x12;
}

/// The compression scheme of a file, taken from its block flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecFamily {
    /// PKWARE implode without a mask byte (`IMPLODE` block flag)
    Implode,
    /// Mask byte followed by the compressed data (`COMPRESS` block flag)
    Multi,
}

/// Decompress `src` into `dst`, which must be sized to the expected output
///
/// Returns the number of bytes written, which always equals `dst.len()`;
/// any other outcome is reported as `Error::FileCorrupt`.
pub fn decompress(family: CodecFamily, dst: &mut [u8], src: &[u8]) -> Result<usize> {
    let expected = dst.len();

    let output = match family {
        CodecFamily::Implode => algorithms::pkware::explode(src, expected)?,
        CodecFamily::Multi => decompress_multi(src, expected)?,
    };

    if output.len() != expected {
        return Err(Error::compression(format!(
            "Decompressed {} bytes, expected {}",
            output.len(),
            expected
        )));
    }

    dst.copy_from_slice(&output);
    Ok(expected)
}

/// Decompress PKWARE implode data into a new buffer of at most `limit` bytes
pub fn explode(src: &[u8], limit: usize) -> Result<Vec<u8>> {
    algorithms::pkware::explode(src, limit)
}
