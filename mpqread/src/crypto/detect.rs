//! Recovery of unknown file keys from encrypted data
//!
//! Files opened without a name (by block index) have no name hash to derive
//! a key from. When the first two plaintext words of an encrypted buffer can
//! be predicted, the key that produced the ciphertext can be recovered by
//! trying the 256 possible values of its low byte.

use super::keys::ENCRYPTION_TABLE;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Strategy for guessing the key of an encrypted file
///
/// Implementations return the *file* key, so callers can decrypt sector `i`
/// with `key + i` as usual.
pub trait KeyDetector: fmt::Debug + Send + Sync {
    /// Guess the file key from the still-encrypted bytes of sector `sector_index`
    fn detect_from_sector(&self, sector: &[u8], sector_index: u32, file_size: u32)
        -> Option<u32>;

    /// Guess the file key from the still-encrypted sector offset table
    fn detect_from_offset_table(&self, table: &[u8], sector_size: u32) -> Option<u32> {
        detect_offset_table_key(table, sector_size)
    }
}

/// Known plaintext that a sector may begin with
#[derive(Debug, Clone, Copy)]
struct KnownHeader {
    first: u32,
    second: u32,
    min_sector_len: usize,
}

/// Detects keys of sectors that start with WAVE, EXE or XML headers
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownContentDetector;

impl KnownContentDetector {
    const ID_WAVE: u32 = 0x46464952;
    const ID_EXE: u32 = 0x00905A4D;
    const ID_XML: u32 = 0x6D783F3C;

    fn candidates(file_size: u32) -> [KnownHeader; 3] {
        [
            KnownHeader {
                first: Self::ID_WAVE,
                second: file_size.wrapping_sub(8),
                min_sector_len: 0x0C,
            },
            KnownHeader {
                first: Self::ID_EXE,
                second: 0x00000003,
                min_sector_len: 0x41,
            },
            KnownHeader {
                first: Self::ID_XML,
                second: 0x6576206C,
                min_sector_len: 0x05,
            },
        ]
    }
}

impl KeyDetector for KnownContentDetector {
    fn detect_from_sector(
        &self,
        sector: &[u8],
        sector_index: u32,
        file_size: u32,
    ) -> Option<u32> {
        if sector.len() < 8 {
            return None;
        }

        let encrypted = [
            LittleEndian::read_u32(&sector[0..4]),
            LittleEndian::read_u32(&sector[4..8]),
        ];

        Self::candidates(file_size)
            .iter()
            .filter(|header| sector.len() >= header.min_sector_len)
            .find_map(|header| {
                recover_key(encrypted, header.first, |second| second == header.second)
            })
            .map(|sector_key| {
                let key = sector_key.wrapping_sub(sector_index);
                log::debug!(
                    "Recovered file key 0x{:08X} from content of sector {}",
                    key,
                    sector_index
                );
                key
            })
    }
}

/// Never detects a key; encrypted files then need an explicit key
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeyDetection;

impl KeyDetector for NoKeyDetection {
    fn detect_from_sector(&self, _: &[u8], _: u32, _: u32) -> Option<u32> {
        None
    }

    fn detect_from_offset_table(&self, _: &[u8], _: u32) -> Option<u32> {
        None
    }
}

/// Recover the file key from an encrypted sector offset table
///
/// The first offset always equals the byte size of the table itself and the
/// second lies at most one sector further. The result assumes the usual
/// `file_key - 1` table key; some archives use the file key itself, which
/// the reader settles by decoding the first sector.
pub fn detect_offset_table_key(table: &[u8], sector_size: u32) -> Option<u32> {
    if table.len() < 8 {
        return None;
    }

    let table_size = table.len() as u32;
    let encrypted = [
        LittleEndian::read_u32(&table[0..4]),
        LittleEndian::read_u32(&table[4..8]),
    ];

    recover_key(encrypted, table_size, |second| {
        second > table_size && second - table_size <= sector_size
    })
    .map(|table_key| table_key.wrapping_add(1))
}

/// Find the key that turns `encrypted[0]` into `first` and whose second
/// decrypted word satisfies `accept_second`
pub fn recover_key<F>(encrypted: [u32; 2], first: u32, accept_second: F) -> Option<u32>
where
    F: Fn(u32) -> bool,
{
    // key + seed after the first table addition
    let key_plus_seed = (encrypted[0] ^ first).wrapping_sub(0xEEEEEEEE);

    for low_byte in 0..0x100usize {
        let candidate = key_plus_seed.wrapping_sub(ENCRYPTION_TABLE[0x400 + low_byte]);

        let mut key = candidate;
        let mut seed =
            0xEEEEEEEEu32.wrapping_add(ENCRYPTION_TABLE[0x400 + (key & 0xFF) as usize]);
        let decrypted0 = encrypted[0] ^ key.wrapping_add(seed);
        if decrypted0 != first {
            continue;
        }

        key = (!key << 0x15).wrapping_add(0x11111111) | (key >> 0x0B);
        seed = decrypted0
            .wrapping_add(seed)
            .wrapping_add(seed << 5)
            .wrapping_add(3);
        seed = seed.wrapping_add(ENCRYPTION_TABLE[0x400 + (key & 0xFF) as usize]);

        let decrypted1 = encrypted[1] ^ key.wrapping_add(seed);
        if accept_second(decrypted1) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt_block, encrypt_bytes};

    #[test]
    fn test_recover_known_words() {
        for key in [0x12345678u32, 0xC1EB1CEF, 0xDEADBEEF, 0x00000001] {
            let mut words = [0x46464952, 10000 - 8];
            encrypt_block(&mut words, key);
            let recovered = recover_key(words, 0x46464952, |second| second == 10000 - 8);
            assert_eq!(recovered, Some(key));
        }
    }

    #[test]
    fn test_detect_wave_sector() {
        let file_key = 0xA1B2C3D4u32;
        let mut sector = Vec::new();
        sector.extend_from_slice(b"RIFF");
        sector.extend_from_slice(&(4096u32 - 8).to_le_bytes());
        sector.extend_from_slice(b"WAVEfmt ");
        sector.resize(512, 0x55);

        // third sector of the file
        encrypt_bytes(&mut sector, file_key.wrapping_add(2));

        let detected = KnownContentDetector.detect_from_sector(&sector, 2, 4096);
        assert_eq!(detected, Some(file_key));
    }

    #[test]
    fn test_detect_rejects_unknown_content() {
        let mut sector = b"just some plain text content here".to_vec();
        encrypt_bytes(&mut sector, 0x0BADF00D);
        assert_eq!(
            KnownContentDetector.detect_from_sector(&sector, 0, 33),
            None
        );
    }

    #[test]
    fn test_detect_offset_table() {
        let file_key = 0x7E57C0DEu32;
        let mut table = Vec::new();
        for offset in [16u32, 300, 700, 900] {
            table.extend_from_slice(&offset.to_le_bytes());
        }
        encrypt_bytes(&mut table, file_key.wrapping_sub(1));

        assert_eq!(detect_offset_table_key(&table, 512), Some(file_key));
        assert_eq!(
            KnownContentDetector.detect_from_offset_table(&table, 512),
            Some(file_key)
        );
        assert_eq!(NoKeyDetection.detect_from_offset_table(&table, 512), None);
    }

    #[test]
    fn test_short_input() {
        assert_eq!(detect_offset_table_key(&[0u8; 4], 512), None);
        assert_eq!(KnownContentDetector.detect_from_sector(&[0u8; 6], 0, 6), None);
    }
}
