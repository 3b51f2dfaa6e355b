//! MPQ header and user data header parsing

use crate::io::ArchiveStream;
use crate::{signatures, Error, FormatVersion, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Size of the original header
pub const HEADER_SIZE_V1: u32 = 32;

/// Size of the header with the extended (hi-block) fields
pub const HEADER_SIZE_V2: u32 = 44;

/// Headers are only searched at multiples of this alignment
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// Largest sector size shift accepted (512 << 22 = 2 GiB)
pub const MAX_SECTOR_SHIFT: u16 = 22;

/// User data header preceding the archive (`MPQ\x1B`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserDataHeader {
    /// Size of the user data block
    pub user_data_size: u32,
    /// Offset of the MPQ header, relative to this header
    pub header_offset: u32,
    /// Size of this header
    pub user_data_header_size: u32,
}

impl UserDataHeader {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::MPQ_USERDATA {
            return Err(Error::invalid_format("Not a user data header"));
        }

        Ok(Self {
            user_data_size: cursor.read_u32::<LittleEndian>()?,
            header_offset: cursor.read_u32::<LittleEndian>()?,
            user_data_header_size: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// MPQ archive header
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MpqHeader {
    /// Size of the header in bytes
    pub header_size: u32,
    /// Size of the archive in bytes
    pub archive_size: u32,
    /// Raw format version (0 for the original format)
    pub format_version: u16,
    /// Sector size as a shift applied to 512
    pub sector_size_shift: u16,
    /// Offset of the hash table, relative to the archive start
    pub hash_table_offset: u32,
    /// Offset of the block table, relative to the archive start
    pub block_table_offset: u32,
    /// Number of entries in the hash table
    pub hash_table_entries: u32,
    /// Number of entries in the block table
    pub block_table_entries: u32,
    /// Offset of the hi-block table (0 when absent)
    pub hi_block_table_offset: u64,
    /// High 16 bits of the hash table offset
    pub hash_table_offset_hi: u16,
    /// High 16 bits of the block table offset
    pub block_table_offset_hi: u16,
}

impl MpqHeader {
    /// Parse a header from the bytes starting at its signature
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::MPQ_ARCHIVE {
            return Err(Error::invalid_format(format!(
                "Invalid header signature 0x{:08X}",
                signature
            )));
        }

        let mut header = MpqHeader {
            header_size: cursor.read_u32::<LittleEndian>()?,
            archive_size: cursor.read_u32::<LittleEndian>()?,
            format_version: cursor.read_u16::<LittleEndian>()?,
            sector_size_shift: cursor.read_u16::<LittleEndian>()?,
            hash_table_offset: cursor.read_u32::<LittleEndian>()?,
            block_table_offset: cursor.read_u32::<LittleEndian>()?,
            hash_table_entries: cursor.read_u32::<LittleEndian>()?,
            block_table_entries: cursor.read_u32::<LittleEndian>()?,
            hi_block_table_offset: 0,
            hash_table_offset_hi: 0,
            block_table_offset_hi: 0,
        };

        if header.sector_size_shift > MAX_SECTOR_SHIFT {
            return Err(Error::invalid_format(format!(
                "Sector size shift {} is too large",
                header.sector_size_shift
            )));
        }

        if header.format_version >= 1 && header.header_size >= HEADER_SIZE_V2 {
            header.hi_block_table_offset = cursor.read_u64::<LittleEndian>()?;
            header.hash_table_offset_hi = cursor.read_u16::<LittleEndian>()?;
            header.block_table_offset_hi = cursor.read_u16::<LittleEndian>()?;
        }

        Ok(header)
    }

    /// Format version, if it is one of the known ones
    pub fn version(&self) -> Option<FormatVersion> {
        match self.format_version {
            0 => Some(FormatVersion::V1),
            1 => Some(FormatVersion::V2),
            2 => Some(FormatVersion::V3),
            3 => Some(FormatVersion::V4),
            _ => None,
        }
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        crate::calculate_sector_size(self.sector_size_shift) as u32
    }

    /// Full offset of the hash table, relative to the archive start
    pub fn hash_table_pos(&self) -> u64 {
        ((self.hash_table_offset_hi as u64) << 32) | self.hash_table_offset as u64
    }

    /// Full offset of the block table, relative to the archive start
    pub fn block_table_pos(&self) -> u64 {
        ((self.block_table_offset_hi as u64) << 32) | self.block_table_offset as u64
    }
}

/// Locate the archive header in a stream
///
/// Returns the absolute offset of the archive, the user data header that
/// led to it (if any) and the parsed header.
pub fn find_header(
    stream: &dyn ArchiveStream,
) -> Result<(u64, Option<UserDataHeader>, MpqHeader)> {
    let size = stream.size()?;
    let mut offset = 0u64;
    let mut buffer = [0u8; HEADER_SIZE_V2 as usize];

    while offset + HEADER_SIZE_V1 as u64 <= size {
        let available = (size - offset).min(buffer.len() as u64) as usize;
        let chunk = &mut buffer[..available];
        stream.read_at(offset, chunk)?;

        let signature = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match signature {
            signatures::MPQ_ARCHIVE => {
                log::debug!("Found MPQ header at offset 0x{:X}", offset);
                return Ok((offset, None, MpqHeader::parse(chunk)?));
            }
            signatures::MPQ_USERDATA => {
                let user_data = UserDataHeader::parse(chunk)?;
                let archive_offset = offset + user_data.header_offset as u64;
                log::debug!(
                    "Found user data header at 0x{:X}, archive at 0x{:X}",
                    offset,
                    archive_offset
                );

                if archive_offset + HEADER_SIZE_V1 as u64 <= size {
                    let available = (size - archive_offset).min(buffer.len() as u64) as usize;
                    let chunk = &mut buffer[..available];
                    stream.read_at(archive_offset, chunk)?;
                    if let Ok(header) = MpqHeader::parse(chunk) {
                        return Ok((archive_offset, Some(user_data), header));
                    }
                }
            }
            _ => {}
        }

        offset += HEADER_ALIGNMENT;
    }

    Err(Error::invalid_format("No MPQ header found"))
}
