//! Sparse decompression: run-length encoding of zero bytes
//!
//! The stream starts with the big-endian decompressed size. Each control
//! byte then either introduces `(b & 0x7F) + 1` literal bytes (high bit set)
//! or stands for `(b & 0x7F) + 3` zero bytes.

use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

pub(crate) fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return Err(Error::compression("Sparse data too short"));
    }

    let declared = BigEndian::read_u32(&data[0..4]) as usize;
    if declared > limit {
        return Err(Error::compression(format!(
            "Sparse data declares {} bytes, limit is {}",
            declared, limit
        )));
    }

    let mut output = Vec::with_capacity(declared);
    let mut pos = 4;

    while pos < data.len() && output.len() < declared {
        let control = data[pos];
        pos += 1;
        let remaining = declared - output.len();

        if control & 0x80 != 0 {
            let count = ((control & 0x7F) as usize + 1).min(remaining);
            let end = pos + count;
            if end > data.len() {
                return Err(Error::compression(
                    "Sparse decompression: unexpected end of data",
                ));
            }
            output.extend_from_slice(&data[pos..end]);
            pos = end;
        } else {
            let count = ((control & 0x7F) as usize + 3).min(remaining);
            output.resize(output.len() + count, 0);
        }
    }

    output.resize(declared, 0);
    Ok(output)
}
