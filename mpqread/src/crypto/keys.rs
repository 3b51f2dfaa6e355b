//! Encryption table and per-file key derivation

use super::hash::{hash_string, hash_type};
use std::sync::LazyLock;

/// The static encryption table used by all MPQ operations
pub static ENCRYPTION_TABLE: LazyLock<[u32; 0x500]> = LazyLock::new(generate_encryption_table);

/// Generate the MPQ encryption table
///
/// This table is used for all encryption, decryption, and hashing operations
/// in the MPQ format. It consists of 1280 (0x500) 32-bit values.
fn generate_encryption_table() -> [u32; 0x500] {
    let mut table = [0u32; 0x500];
    let mut seed: u32 = 0x00100001;

    for index1 in 0..0x100 {
        for index2 in 0..5 {
            let table_index = index1 + index2 * 0x100;

            seed = (seed.wrapping_mul(125) + 3) % 0x2AAAAB;
            let temp1 = (seed & 0xFFFF) << 0x10;

            seed = (seed.wrapping_mul(125) + 3) % 0x2AAAAB;
            let temp2 = seed & 0xFFFF;

            table[table_index] = temp1 | temp2;
        }
    }

    table
}

/// The part of an archive path that feeds the file key
///
/// Keys are derived from the plain name only, so `units\human\footman.mdx`
/// and `footman.mdx` share a key.
pub fn key_name(filename: &str) -> &str {
    match filename.rfind(|c: char| c == '\\' || c == '/') {
        Some(pos) => &filename[pos + 1..],
        None => filename,
    }
}

/// Calculate the decryption key of a file
///
/// `file_pos` is the archive-relative offset of the file data and `file_size`
/// its uncompressed size; both only matter when `fix_key` is set.
pub fn file_key(filename: &str, file_pos: u32, file_size: u32, fix_key: bool) -> u32 {
    let base_key = hash_string(key_name(filename), hash_type::FILE_KEY);

    if fix_key {
        fix_file_key(base_key, file_pos, file_size)
    } else {
        base_key
    }
}

/// Apply the FIX_KEY adjustment to a name-derived key
#[inline]
pub fn fix_file_key(key: u32, file_pos: u32, file_size: u32) -> u32 {
    key.wrapping_add(file_pos) ^ file_size
}

/// Reverse the FIX_KEY adjustment, giving back the name-derived key
#[inline]
pub fn unfix_file_key(key: u32, file_pos: u32, file_size: u32) -> u32 {
    (key ^ file_size).wrapping_sub(file_pos)
}
