//! MPQ table structures (hash, block, hi-block)

use crate::compression::CodecFamily;
use crate::crypto::{decrypt_bytes, hash_string, hash_type};
use crate::error::alloc_buffer;
use crate::io::ArchiveStream;
use crate::{Error, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

/// Size of one hash or block table entry in bytes
pub const TABLE_ENTRY_SIZE: usize = 16;

/// Hash table entry (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HashEntry {
    /// The hash of the full file name (part A)
    pub name_1: u32,
    /// The hash of the full file name (part B)
    pub name_2: u32,
    /// The language of the file (Windows LANGID)
    pub locale: u16,
    /// The platform the file is used for
    pub platform: u16,
    /// Block table index or special value
    pub block_index: u32,
}

impl HashEntry {
    /// Value indicating the hash entry has never been used
    pub const EMPTY_NEVER_USED: u32 = 0xFFFFFFFF;
    /// Value indicating the hash entry was deleted
    pub const EMPTY_DELETED: u32 = 0xFFFFFFFE;

    /// Check if this entry has never been used
    pub fn is_empty(&self) -> bool {
        self.block_index == Self::EMPTY_NEVER_USED
    }

    /// Check if this entry was deleted
    pub fn is_deleted(&self) -> bool {
        self.block_index == Self::EMPTY_DELETED
    }

    /// Check if this entry refers to a block
    pub fn is_valid(&self) -> bool {
        self.block_index < Self::EMPTY_DELETED
    }

    fn parse(data: &[u8]) -> Self {
        Self {
            name_1: LittleEndian::read_u32(&data[0..4]),
            name_2: LittleEndian::read_u32(&data[4..8]),
            locale: LittleEndian::read_u16(&data[8..10]),
            platform: LittleEndian::read_u16(&data[10..12]),
            block_index: LittleEndian::read_u32(&data[12..16]),
        }
    }
}

bitflags! {
    /// Block table flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct BlockFlags: u32 {
        /// Compressed with PKWARE implode
        const IMPLODE = 0x0000_0100;
        /// Compressed with multi-compression
        const COMPRESS = 0x0000_0200;
        /// Either compression family
        const COMPRESSED = Self::IMPLODE.bits() | Self::COMPRESS.bits();
        /// Sectors are encrypted
        const ENCRYPTED = 0x0001_0000;
        /// Key is adjusted by block position and file size
        const FIX_KEY = 0x0002_0000;
        /// Patch file for a base archive
        const PATCH_FILE = 0x0010_0000;
        /// Stored as one unit, without a sector table
        const SINGLE_UNIT = 0x0100_0000;
        /// Deletion marker
        const DELETE_MARKER = 0x0200_0000;
        /// Sectors carry Adler-32 checksums
        const SECTOR_CRC = 0x0400_0000;
        /// The block is in use
        const EXISTS = 0x8000_0000;

        const _ = !0;
    }
}

/// Block table entry (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockEntry {
    /// Offset of the file data, relative to the archive start
    pub file_pos: u32,
    /// Size of the stored data, including sector tables
    pub compressed_size: u32,
    /// Size of the plaintext file
    pub file_size: u32,
    /// Flags for the file
    pub flags: BlockFlags,
}

impl BlockEntry {
    /// Check if the file is compressed with either family
    pub fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::COMPRESSED)
    }

    /// Check if the file is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(BlockFlags::ENCRYPTED)
    }

    /// Check if the file is stored as a single unit
    pub fn is_single_unit(&self) -> bool {
        self.flags.contains(BlockFlags::SINGLE_UNIT)
    }

    /// Check if the file has sector checksums
    pub fn has_sector_crc(&self) -> bool {
        self.flags.contains(BlockFlags::SECTOR_CRC)
    }

    /// Check if the file exists
    pub fn exists(&self) -> bool {
        self.flags.contains(BlockFlags::EXISTS)
    }

    /// Check if the key is adjusted by position and size
    pub fn has_fix_key(&self) -> bool {
        self.flags.contains(BlockFlags::FIX_KEY)
    }

    /// Codec family of the stored data; implode wins if both bits are set
    pub fn codec_family(&self) -> Option<CodecFamily> {
        if self.flags.contains(BlockFlags::IMPLODE) {
            Some(CodecFamily::Implode)
        } else if self.flags.contains(BlockFlags::COMPRESS) {
            Some(CodecFamily::Multi)
        } else {
            None
        }
    }

    fn parse(data: &[u8]) -> Self {
        Self {
            file_pos: LittleEndian::read_u32(&data[0..4]),
            compressed_size: LittleEndian::read_u32(&data[4..8]),
            file_size: LittleEndian::read_u32(&data[8..12]),
            flags: BlockFlags::from_bits_retain(LittleEndian::read_u32(&data[12..16])),
        }
    }
}

/// Read `entries` encrypted table entries at `offset`
fn read_encrypted_table(
    stream: &dyn ArchiveStream,
    offset: u64,
    entries: u32,
    key_name: &str,
) -> Result<Vec<u8>> {
    let byte_size = (entries as usize)
        .checked_mul(TABLE_ENTRY_SIZE)
        .ok_or_else(|| Error::invalid_format(format!("{} is too large", key_name)))?;

    let mut data = alloc_buffer(byte_size)?;
    stream.read_at(offset, &mut data)?;
    decrypt_bytes(&mut data, hash_string(key_name, hash_type::FILE_KEY));
    Ok(data)
}

/// Hash table
#[derive(Debug, Clone)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Read and decrypt a hash table
    pub fn read(stream: &dyn ArchiveStream, offset: u64, size: u32) -> Result<Self> {
        if !crate::is_power_of_two(size) {
            return Err(Error::invalid_format(format!(
                "Hash table size {} is not a power of two",
                size
            )));
        }

        let data = read_encrypted_table(stream, offset, size, "(hash table)")?;
        let entries = data
            .chunks_exact(TABLE_ENTRY_SIZE)
            .map(HashEntry::parse)
            .collect();

        log::debug!("Loaded hash table with {} entries at 0x{:X}", size, offset);
        Ok(Self { entries })
    }

    /// Get all entries
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Get a specific entry
    pub fn get(&self, index: usize) -> Option<&HashEntry> {
        self.entries.get(index)
    }

    /// Get the size of the hash table
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Find a file in the hash table
    ///
    /// An exact locale match is preferred, then the neutral locale (0). When
    /// `locale` is 0 any locale is accepted.
    pub fn find_file(&self, filename: &str, locale: u16) -> Option<(usize, &HashEntry)> {
        if self.entries.is_empty() {
            return None;
        }

        let name_a = hash_string(filename, hash_type::NAME_A);
        let name_b = hash_string(filename, hash_type::NAME_B);
        let mask = self.entries.len() - 1;
        let start = hash_string(filename, hash_type::TABLE_OFFSET) as usize & mask;

        let mut neutral = None;
        let mut any = None;
        let mut index = start;

        loop {
            let entry = &self.entries[index];
            if entry.is_empty() {
                break;
            }

            if entry.is_valid() && entry.name_1 == name_a && entry.name_2 == name_b {
                if entry.locale == locale {
                    return Some((index, entry));
                }
                if entry.locale == 0 && neutral.is_none() {
                    neutral = Some(index);
                }
                if any.is_none() {
                    any = Some(index);
                }
            }

            index = (index + 1) & mask;
            if index == start {
                break;
            }
        }

        neutral
            .or(if locale == 0 { any } else { None })
            .map(|index| (index, &self.entries[index]))
    }
}

/// Block table
#[derive(Debug, Clone)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    /// Read and decrypt a block table
    pub fn read(stream: &dyn ArchiveStream, offset: u64, size: u32) -> Result<Self> {
        let data = read_encrypted_table(stream, offset, size, "(block table)")?;
        let entries = data
            .chunks_exact(TABLE_ENTRY_SIZE)
            .map(BlockEntry::parse)
            .collect();

        log::debug!("Loaded block table with {} entries at 0x{:X}", size, offset);
        Ok(Self { entries })
    }

    /// Get all entries
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// Get a specific entry
    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// Get the size of the block table
    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

/// Hi-block table: upper 16 bits of each block's file position
#[derive(Debug, Clone)]
pub struct HiBlockTable {
    entries: Vec<u16>,
}

impl HiBlockTable {
    /// Read the (unencrypted) hi-block table
    pub fn read(stream: &dyn ArchiveStream, offset: u64, size: u32) -> Result<Self> {
        let mut data = alloc_buffer(size as usize * 2)?;
        stream.read_at(offset, &mut data)?;

        let mut entries = vec![0u16; size as usize];
        LittleEndian::read_u16_into(&data, &mut entries);
        Ok(Self { entries })
    }

    /// Get a hi-block entry
    pub fn get(&self, index: usize) -> Option<u16> {
        self.entries.get(index).copied()
    }

    /// High part of a block's file position, already shifted into place
    pub fn file_pos_high(&self, index: usize) -> u64 {
        (self.get(index).unwrap_or(0) as u64) << 32
    }
}
