//! LZMA decompression
//!
//! MPQ stores a one-byte filter id before a standard `.lzma` stream
//! (5 property bytes and an 8-byte uncompressed size).

use crate::Result;

#[cfg(feature = "compression-lzma")]
pub(crate) fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    use crate::Error;
    use std::io::Cursor;

    let (&filter, stream) = data
        .split_first()
        .ok_or_else(|| Error::compression("Empty LZMA data"))?;
    if filter != 0 {
        return Err(Error::compression(format!(
            "Unsupported LZMA filter 0x{:02X}",
            filter
        )));
    }

    let mut output = Vec::with_capacity(limit);
    lzma_rs::lzma_decompress(&mut Cursor::new(stream), &mut output)
        .map_err(|e| Error::compression(format!("LZMA decompression failed: {:?}", e)))?;

    if output.len() > limit {
        return Err(Error::compression(format!(
            "LZMA output exceeds the expected {} bytes",
            limit
        )));
    }

    Ok(output)
}

#[cfg(not(feature = "compression-lzma"))]
pub(crate) fn decompress(_data: &[u8], _limit: usize) -> Result<Vec<u8>> {
    Err(crate::Error::compression(
        "LZMA support not compiled in (enable the compression-lzma feature)",
    ))
}

#[cfg(all(test, feature = "compression-lzma"))]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_filter() {
        assert!(decompress(&[0x01, 0x5D, 0, 0, 1, 0], 16).is_err());
        assert!(decompress(&[], 16).is_err());
    }
}
