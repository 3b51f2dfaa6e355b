//! Compression algorithm implementations
//!
//! Every stage decodes into a fresh buffer of at most `limit` bytes. Output
//! that would exceed the limit is reported as corruption rather than
//! silently truncated.

pub(super) mod bzip2;
pub(super) mod lzma;
pub(super) mod pkware;
pub(super) mod sparse;
pub(super) mod zlib;

use crate::{Error, Result};
use std::io::Read;

/// Drain `reader` into a buffer, failing if it yields more than `limit` bytes
pub(super) fn read_limited<R: Read>(reader: R, limit: usize, codec: &str) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(limit);
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| Error::compression(format!("{} decompression failed: {}", codec, e)))?;

    if output.len() > limit {
        return Err(Error::compression(format!(
            "{} output exceeds the expected {} bytes",
            codec, limit
        )));
    }

    Ok(output)
}
