//! Block cipher used for MPQ tables and file sectors
//!
//! The cipher works on 32-bit words. On disk those words are little-endian,
//! so byte buffers are always read as little-endian words before decryption
//! and written back the same way, independent of host byte order.

use super::keys::ENCRYPTION_TABLE;
use byteorder::{ByteOrder, LittleEndian};

/// Running keystream state
#[derive(Debug, Clone, Copy)]
struct Keystream {
    key: u32,
    seed: u32,
}

impl Keystream {
    fn new(key: u32) -> Self {
        Self {
            key,
            seed: 0xEEEEEEEE,
        }
    }

    #[inline]
    fn mix(&mut self) -> u32 {
        self.seed = self
            .seed
            .wrapping_add(ENCRYPTION_TABLE[0x400 + (self.key & 0xFF) as usize]);
        self.key.wrapping_add(self.seed)
    }

    #[inline]
    fn advance(&mut self, plain: u32) {
        self.key = (!self.key << 0x15).wrapping_add(0x11111111) | (self.key >> 0x0B);
        self.seed = plain
            .wrapping_add(self.seed)
            .wrapping_add(self.seed << 5)
            .wrapping_add(3);
    }

    #[inline]
    fn decrypt(&mut self, value: u32) -> u32 {
        let plain = value ^ self.mix();
        self.advance(plain);
        plain
    }

    #[inline]
    fn encrypt(&mut self, plain: u32) -> u32 {
        let value = plain ^ self.mix();
        self.advance(plain);
        value
    }
}

/// Decrypt a block of data
pub fn decrypt_block(data: &mut [u32], key: u32) {
    let mut stream = Keystream::new(key);
    for value in data.iter_mut() {
        *value = stream.decrypt(*value);
    }
}

/// Encrypt a block of data
pub fn encrypt_block(data: &mut [u32], key: u32) {
    let mut stream = Keystream::new(key);
    for value in data.iter_mut() {
        *value = stream.encrypt(*value);
    }
}

/// Decrypt a single DWORD value
///
/// Equivalent to decrypting the first word of a block.
pub fn decrypt_dword(value: u32, key: u32) -> u32 {
    Keystream::new(key).decrypt(value)
}

/// Decrypt a byte buffer in place
///
/// Trailing bytes that do not fill a whole word are left untouched.
pub fn decrypt_bytes(data: &mut [u8], key: u32) {
    let mut stream = Keystream::new(key);
    for chunk in data.chunks_exact_mut(4) {
        let value = LittleEndian::read_u32(chunk);
        LittleEndian::write_u32(chunk, stream.decrypt(value));
    }
}

/// Encrypt a byte buffer in place
///
/// Trailing bytes that do not fill a whole word are left untouched.
pub fn encrypt_bytes(data: &mut [u8], key: u32) {
    let mut stream = Keystream::new(key);
    for chunk in data.chunks_exact_mut(4) {
        let value = LittleEndian::read_u32(chunk);
        LittleEndian::write_u32(chunk, stream.encrypt(value));
    }
}
