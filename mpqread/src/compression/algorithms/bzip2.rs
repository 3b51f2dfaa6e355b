//! BZip2 decompression

use crate::Result;

/// Decompress bzip2 data of at most `limit` bytes
#[cfg(feature = "compression-bzip2")]
pub(crate) fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    use bzip2::read::BzDecoder;

    super::read_limited(BzDecoder::new(data), limit, "BZip2")
}

#[cfg(not(feature = "compression-bzip2"))]
pub(crate) fn decompress(_data: &[u8], _limit: usize) -> Result<Vec<u8>> {
    Err(crate::Error::compression(
        "BZip2 support not compiled in (enable the compression-bzip2 feature)",
    ))
}

#[cfg(all(test, feature = "compression-bzip2"))]
mod tests {
    use super::*;
    use bzip2::{write::BzEncoder, Compression};
    use std::io::Write;

    #[test]
    fn test_bzip2_decompress() {
        let original = b"bzip2 test data, bzip2 test data, bzip2 test data".to_vec();
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress(&compressed, original.len()).unwrap(), original);
    }
}
