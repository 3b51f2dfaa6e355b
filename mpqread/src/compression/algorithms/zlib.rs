//! Zlib (deflate) decompression

use crate::Result;
use flate2::read::ZlibDecoder;

/// Decompress zlib data of at most `limit` bytes
pub(crate) fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    super::read_limited(ZlibDecoder::new(data), limit, "Zlib")
}
