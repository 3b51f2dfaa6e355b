//! Metadata queries on archives and files

use super::archived::ArchivedFile;
use crate::crypto::unfix_file_key;
use crate::{signatures, Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Property to query with `query_info`
///
/// Every property is a 32-bit value written little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InfoClass {
    /// Archive size from the header
    ArchiveSize,
    /// Number of hash table entries
    HashTableSize,
    /// Number of block table entries
    BlockTableSize,
    /// Sector size in bytes
    SectorSize,
    /// Number of hash entries referring to existing files
    FileCount,
    /// Hash table slot of the file
    HashIndex,
    /// First name hash of the file's hash entry
    NameHashA,
    /// Second name hash of the file's hash entry
    NameHashB,
    /// Locale of the file's hash entry
    Locale,
    /// Block table index
    BlockIndex,
    /// Plaintext size
    FileSize,
    /// Stored size
    CompressedSize,
    /// Block flags
    Flags,
    /// Raw data position, relative to the archive start
    Position,
    /// Decryption key
    Key,
    /// Decryption key without the position/size adjustment
    KeyUnfixed,
}

impl InfoClass {
    /// Whether the property belongs to an archive rather than a file
    pub fn is_archive_class(&self) -> bool {
        matches!(
            self,
            InfoClass::ArchiveSize
                | InfoClass::HashTableSize
                | InfoClass::BlockTableSize
                | InfoClass::SectorSize
                | InfoClass::FileCount
        )
    }
}

/// `InvalidHandle` for a property asked of the wrong kind of handle
pub(crate) fn wrong_handle_kind(class: InfoClass) -> Error {
    let owner = if class.is_archive_class() {
        "an archive"
    } else {
        "a file"
    };
    Error::invalid_handle(format!("{:?} is {} property", class, owner))
}

/// Store a 32-bit value at the start of `out`, returning the bytes written
pub(crate) fn write_info_value(value: u32, out: &mut [u8]) -> Result<usize> {
    const REQUIRED: usize = 4;
    if out.len() < REQUIRED {
        return Err(Error::InsufficientBuffer {
            required: REQUIRED,
            provided: out.len(),
        });
    }

    LittleEndian::write_u32(&mut out[..REQUIRED], value);
    Ok(REQUIRED)
}

const ID_EXE: u32 = 0x5A4D;

/// Known first words and the extension they imply
const EXTENSIONS: [(u32, &str); 18] = [
    (signatures::MPQ_ARCHIVE, "mpq"),
    (0x46464952, "wav"),
    (0x324B4D53, "smk"),
    (0x694B4942, "bik"),
    (0x0801050A, "pcx"),
    (0x544E4F46, "fnt"),
    (0x6D74683C, "html"),
    (0x4D54483C, "html"),
    (0x216F6F57, "tbl"),
    (0x31504C42, "blp"),
    (0x32504C42, "blp"),
    (0x584C444D, "mdx"),
    (0x45505954, "pud"),
    (0x38464947, "gif"),
    (0x3032444D, "m2"),
    (0x43424457, "dbc"),
    (0x47585053, "bls"),
    (0xE0FFD8FF, "jpg"),
];

/// Guess a file extension from the first eight bytes of a file
pub(super) fn extension_for(first_bytes: &[u8; 8]) -> &'static str {
    let first = LittleEndian::read_u32(&first_bytes[0..4]);
    let second = LittleEndian::read_u32(&first_bytes[4..8]);

    if first & 0xFFFF == ID_EXE {
        return "exe";
    }
    if first == 6 && second == 1 {
        return "dc6";
    }

    EXTENSIONS
        .iter()
        .find(|(id, _)| *id == first)
        .map_or("xxx", |&(_, ext)| ext)
}

impl ArchivedFile<'_> {
    pub(super) fn query_info(&self, class: InfoClass, out: &mut [u8]) -> Result<usize> {
        let hash_entry = self
            .hash_index
            .and_then(|index| self.archive.hash_table().get(index));

        let value = match class {
            InfoClass::HashIndex => self.hash_index.map_or(u32::MAX, |index| index as u32),
            InfoClass::NameHashA => hash_entry.map_or(0, |entry| entry.name_1),
            InfoClass::NameHashB => hash_entry.map_or(0, |entry| entry.name_2),
            InfoClass::Locale => hash_entry.map_or(0, |entry| entry.locale as u32),
            InfoClass::BlockIndex => self.block_index,
            InfoClass::FileSize => self.block.file_size,
            InfoClass::CompressedSize => self.block.compressed_size,
            InfoClass::Flags => self.block.flags.bits(),
            InfoClass::Position => self.block.file_pos,
            InfoClass::Key => self.key.ok_or(Error::UnknownFileKey)?,
            InfoClass::KeyUnfixed => {
                let key = self.key.ok_or(Error::UnknownFileKey)?;
                if self.block.has_fix_key() {
                    unfix_file_key(key, self.block.file_pos, self.block.file_size)
                } else {
                    key
                }
            }
            archive_class => return Err(wrong_handle_kind(archive_class)),
        };

        write_info_value(value, out)
    }
}
