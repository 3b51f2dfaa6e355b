//! Multi-compression: a mask byte followed by data compressed in stages

use super::algorithms;
use super::flags;
use crate::{Error, Result};
use std::borrow::Cow;

type Stage = fn(&[u8], usize) -> Result<Vec<u8>>;

/// Decompression stages in the order they are undone
///
/// Compression applies them in reverse, so the last compressor runs first here.
const STAGES: [(u8, &str, Stage); 4] = [
    (flags::BZIP2, "bzip2", algorithms::bzip2::decompress),
    (flags::PKWARE, "pkware", algorithms::pkware::explode),
    (flags::ZLIB, "zlib", algorithms::zlib::decompress),
    (flags::SPARSE, "sparse", algorithms::sparse::decompress),
];

const UNSUPPORTED: u8 = flags::HUFFMAN | flags::ADPCM_MONO | flags::ADPCM_STEREO;

const KNOWN: u8 = flags::BZIP2 | flags::PKWARE | flags::ZLIB | flags::SPARSE | UNSUPPORTED;

/// Undo multi-compression, producing exactly `expected_size` bytes
pub fn decompress_multi(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let (&mask, payload) = data
        .split_first()
        .ok_or_else(|| Error::compression("Empty compressed data"))?;

    log::trace!(
        "Decompressing {} bytes to {} bytes with mask 0x{:02X}",
        payload.len(),
        expected_size,
        mask
    );

    let output = if mask == flags::LZMA {
        algorithms::lzma::decompress(payload, expected_size)?
    } else {
        if mask & !KNOWN != 0 {
            return Err(Error::compression(format!(
                "Unknown compression mask 0x{:02X}",
                mask
            )));
        }

        if mask & UNSUPPORTED != 0 {
            log::error!("Huffman/ADPCM decompression requested but not implemented");
            return Err(Error::compression(format!(
                "Unsupported compression mask 0x{:02X} (Huffman/ADPCM)",
                mask
            )));
        }

        let mut current = Cow::Borrowed(payload);
        for (flag, name, stage) in STAGES {
            if mask & flag != 0 {
                log::trace!("Applying {} stage to {} bytes", name, current.len());
                current = Cow::Owned(stage(&current, expected_size)?);
            }
        }
        current.into_owned()
    };

    if output.len() != expected_size {
        return Err(Error::compression(format!(
            "Multi-compression (mask 0x{:02X}) produced {} bytes, expected {}",
            mask,
            output.len(),
            expected_size
        )));
    }

    Ok(output)
}
