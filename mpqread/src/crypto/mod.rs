//! Cryptographic operations for MPQ files

mod cipher;
mod detect;
mod hash;
mod keys;

// Re-export public API
pub use cipher::{decrypt_block, decrypt_bytes, decrypt_dword, encrypt_block, encrypt_bytes};
pub use detect::{
    detect_offset_table_key, recover_key, KeyDetector, KnownContentDetector, NoKeyDetection,
};
pub use hash::{hash_string, hash_type, ASCII_TO_UPPER};
pub use keys::{file_key, fix_file_key, key_name, unfix_file_key, ENCRYPTION_TABLE};
