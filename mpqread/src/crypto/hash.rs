//! Hash algorithms for MPQ file name hashing

use super::keys::ENCRYPTION_TABLE;

/// Hash types for MPQ operations
pub mod hash_type {
    /// Starting slot in the hash table
    pub const TABLE_OFFSET: u32 = 0;
    /// First name verification hash
    pub const NAME_A: u32 = 1;
    /// Second name verification hash
    pub const NAME_B: u32 = 2;
    /// File decryption key
    pub const FILE_KEY: u32 = 3;
    /// Key mixing, used by key recovery
    pub const KEY2_MIX: u32 = 4;
}

/// ASCII uppercase conversion table
pub const ASCII_TO_UPPER: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    // Convert lowercase to uppercase (a-z to A-Z)
    let mut i = b'a';
    while i <= b'z' {
        table[i as usize] = i - 32;
        i += 1;
    }
    table
};

/// Hash a string using the MPQ hash algorithm
///
/// Names are case-insensitive and forward slashes hash like backslashes.
pub fn hash_string(filename: &str, hash_type: u32) -> u32 {
    let mut seed1: u32 = 0x7FED7FED;
    let mut seed2: u32 = 0xEEEEEEEE;

    for &byte in filename.as_bytes() {
        let mut ch = ASCII_TO_UPPER[byte as usize];
        if ch == b'/' {
            ch = b'\\';
        }

        let table_index = ((hash_type << 8) + ch as u32) as usize;
        seed1 = ENCRYPTION_TABLE[table_index] ^ seed1.wrapping_add(seed2);
        seed2 = (ch as u32)
            .wrapping_add(seed1)
            .wrapping_add(seed2)
            .wrapping_add(seed2 << 5)
            .wrapping_add(3);
    }

    seed1
}
