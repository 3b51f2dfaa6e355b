//! PKWARE Data Compression Library "explode"
//!
//! The stream starts with two bytes: whether literals are Huffman coded (0 or
//! 1) and the dictionary size in bits (4, 5 or 6). What follows is an
//! LSB-first bit stream of literals and length/distance pairs, terminated by
//! the length code 519. Huffman codes are stored bit-inverted.

use crate::{Error, Result};
use std::sync::LazyLock;

const MAX_BITS: usize = 13;

const END_OF_STREAM: usize = 519;

/// Run-length compressed code lengths: high nibble is repeat count - 1
const LITERAL_LENGTHS: [u8; 98] = [
    11, 124, 8, 7, 28, 7, 188, 13, 76, 4, 10, 8, 12, 10, 12, 10, 8, 23, 8, 9, 7, 6, 7, 8, 7, 6,
    55, 8, 23, 24, 12, 11, 7, 9, 11, 12, 6, 7, 22, 5, 7, 24, 6, 11, 9, 6, 7, 22, 7, 11, 38, 7, 9,
    8, 25, 11, 8, 11, 9, 12, 8, 12, 5, 38, 5, 38, 5, 11, 7, 5, 6, 21, 6, 10, 53, 8, 7, 24, 10, 27,
    44, 253, 253, 253, 252, 252, 252, 13, 12, 45, 12, 45, 12, 61, 12, 45, 44, 173,
];
const LENGTH_LENGTHS: [u8; 6] = [2, 35, 36, 53, 38, 23];
const DISTANCE_LENGTHS: [u8; 7] = [2, 20, 53, 230, 247, 151, 248];

const LENGTH_BASE: [u16; 16] = [3, 2, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];
const LENGTH_EXTRA: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// Canonical Huffman decoding table
#[derive(Debug)]
struct Huffman {
    count: [u16; MAX_BITS + 1],
    symbol: Vec<u16>,
}

impl Huffman {
    fn new(compact: &[u8]) -> Self {
        let lengths: Vec<usize> = compact
            .iter()
            .flat_map(|&b| std::iter::repeat_n((b & 0x0F) as usize, (b >> 4) as usize + 1))
            .collect();

        let mut count = [0u16; MAX_BITS + 1];
        for &len in &lengths {
            count[len] += 1;
        }

        let mut offsets = [0usize; MAX_BITS + 1];
        for len in 1..MAX_BITS {
            offsets[len + 1] = offsets[len] + count[len] as usize;
        }

        let mut symbol = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len != 0 {
                symbol[offsets[len]] = sym as u16;
                offsets[len] += 1;
            }
        }

        Self { count, symbol }
    }
}

static LITERAL_CODE: LazyLock<Huffman> = LazyLock::new(|| Huffman::new(&LITERAL_LENGTHS));
static LENGTH_CODE: LazyLock<Huffman> = LazyLock::new(|| Huffman::new(&LENGTH_LENGTHS));
static DISTANCE_CODE: LazyLock<Huffman> = LazyLock::new(|| Huffman::new(&DISTANCE_LENGTHS));

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buffer: u32,
    count: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            count: 0,
        }
    }

    fn bits(&mut self, need: u32) -> Result<u32> {
        while self.count < need {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| Error::compression("PKWARE data ended before end marker"))?;
            self.buffer |= (byte as u32) << self.count;
            self.pos += 1;
            self.count += 8;
        }

        let value = self.buffer & ((1u32 << need) - 1);
        self.buffer >>= need;
        self.count -= need;
        Ok(value)
    }

    fn decode(&mut self, table: &Huffman) -> Result<usize> {
        let mut code = 0i32;
        let mut first = 0i32;
        let mut index = 0i32;

        for len in 1..=MAX_BITS {
            code |= (self.bits(1)? ^ 1) as i32;
            let count = table.count[len] as i32;
            if code - count < first {
                return Ok(table.symbol[(index + (code - first)) as usize] as usize);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(Error::compression("Invalid PKWARE Huffman code"))
    }
}

/// Decompress an imploded stream, stopping once `limit` bytes are produced
pub(crate) fn explode(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(data);

    let coded_literals = reader.bits(8)?;
    if coded_literals > 1 {
        return Err(Error::compression(format!(
            "Invalid PKWARE literal mode {}",
            coded_literals
        )));
    }

    let dict_bits = reader.bits(8)?;
    if !(4..=6).contains(&dict_bits) {
        return Err(Error::compression(format!(
            "Invalid PKWARE dictionary size {}",
            dict_bits
        )));
    }

    let mut output = Vec::with_capacity(limit);

    while output.len() < limit {
        if reader.bits(1)? == 0 {
            let literal = if coded_literals == 1 {
                reader.decode(&LITERAL_CODE)? as u8
            } else {
                reader.bits(8)? as u8
            };
            output.push(literal);
            continue;
        }

        let symbol = reader.decode(&LENGTH_CODE)?;
        let length =
            LENGTH_BASE[symbol] as usize + reader.bits(LENGTH_EXTRA[symbol] as u32)? as usize;
        if length == END_OF_STREAM {
            break;
        }

        let shift = if length == 2 { 2 } else { dict_bits };
        let distance = (reader.decode(&DISTANCE_CODE)? << shift)
            + reader.bits(shift)? as usize
            + 1;
        if distance > output.len() {
            return Err(Error::compression(format!(
                "PKWARE distance {} reaches before start of output",
                distance
            )));
        }

        let copy = length.min(limit - output.len());
        for _ in 0..copy {
            let byte = output[output.len() - distance];
            output.push(byte);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AIAI: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8f, 0x80, 0x7f];

    #[test]
    fn test_explode_known_stream() {
        assert_eq!(explode(&AIAI, 64).unwrap(), b"AIAIAIAIAIAIA");
    }

    #[test]
    fn test_explode_stops_at_limit() {
        assert_eq!(explode(&AIAI, 5).unwrap(), b"AIAIA");
    }

    #[test]
    fn test_explode_truncated() {
        assert!(explode(&AIAI[..5], 64).is_err());
    }

    #[test]
    fn test_explode_bad_header() {
        assert!(explode(&[0x02, 0x04, 0x00], 16).is_err());
        assert!(explode(&[0x00, 0x07, 0x00], 16).is_err());
    }

    #[test]
    fn test_literal_table_shape() {
        let total: usize = LITERAL_CODE.count.iter().map(|&c| c as usize).sum();
        assert_eq!(total, 256);
        assert_eq!(LENGTH_CODE.symbol.len(), 16);
        assert_eq!(DISTANCE_CODE.symbol.len(), 64);
    }
}
