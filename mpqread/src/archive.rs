//! MPQ archive handling

use crate::crypto::{KeyDetector, KnownContentDetector};
use crate::file::{InfoClass, MpqFile};
use crate::header::{self, MpqHeader, UserDataHeader};
use crate::io::{ArchiveStream, SharedReader};
use crate::listfile::{parse_listfile, LISTFILE_NAME};
use crate::tables::{BlockEntry, BlockFlags, BlockTable, HashTable, HiBlockTable};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for opening MPQ archives
#[derive(Debug, Clone)]
pub struct OpenOptions {
    verify_sector_checksums: bool,
    memory_map: bool,
    key_detector: Arc<dyn KeyDetector>,
    locale: u16,
}

impl OpenOptions {
    /// Create new default options
    pub fn new() -> Self {
        Self {
            verify_sector_checksums: true,
            memory_map: false,
            key_detector: Arc::new(KnownContentDetector),
            locale: 0,
        }
    }

    /// Check sector checksums of files flagged with `SECTOR_CRC`
    pub fn verify_sector_checksums(mut self, verify: bool) -> Self {
        self.verify_sector_checksums = verify;
        self
    }

    /// Map the archive file into memory instead of reading through a file handle
    ///
    /// Ignored when the `mmap` feature is disabled.
    pub fn memory_map(mut self, memory_map: bool) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Strategy used to recover keys of encrypted files opened without a name
    pub fn key_detector<D: KeyDetector + 'static>(mut self, detector: D) -> Self {
        self.key_detector = Arc::new(detector);
        self
    }

    /// Preferred locale for name lookups (0 = neutral)
    pub fn locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// Open an archive file
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Archive> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let stream: Box<dyn ArchiveStream> = self.file_stream(file)?;
        let mut archive = self.open_stream(stream)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    #[cfg(feature = "mmap")]
    fn file_stream(&self, file: File) -> Result<Box<dyn ArchiveStream>> {
        if self.memory_map {
            log::debug!("Memory-mapping archive");
            return Ok(Box::new(crate::io::MmapStream::new(&file)?));
        }
        Ok(Box::new(SharedReader::new(BufReader::new(file))))
    }

    #[cfg(not(feature = "mmap"))]
    fn file_stream(&self, file: File) -> Result<Box<dyn ArchiveStream>> {
        if self.memory_map {
            log::warn!("Memory mapping requested but the mmap feature is disabled");
        }
        Ok(Box::new(SharedReader::new(BufReader::new(file))))
    }

    /// Open an archive from any positioned byte source
    pub fn open_stream(self, stream: Box<dyn ArchiveStream>) -> Result<Archive> {
        let (archive_offset, user_data, header) = header::find_header(stream.as_ref())?;

        let hash_table = HashTable::read(
            stream.as_ref(),
            archive_offset + header.hash_table_pos(),
            header.hash_table_entries,
        )?;
        let block_table = BlockTable::read(
            stream.as_ref(),
            archive_offset + header.block_table_pos(),
            header.block_table_entries,
        )?;

        let hi_block_table = if header.hi_block_table_offset != 0 {
            Some(HiBlockTable::read(
                stream.as_ref(),
                archive_offset + header.hi_block_table_offset,
                header.block_table_entries,
            )?)
        } else {
            None
        };

        log::debug!(
            "Opened archive at 0x{:X}: version {}, sector size {}, {} hash / {} block entries",
            archive_offset,
            header.format_version,
            header.sector_size(),
            header.hash_table_entries,
            header.block_table_entries
        );

        Ok(Archive {
            path: None,
            stream,
            archive_offset,
            user_data,
            header,
            hash_table,
            block_table,
            hi_block_table,
            options: self,
        })
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// An open MPQ archive
///
/// The archive is immutable once opened. Any number of [`MpqFile`] handles
/// can borrow it at the same time.
#[derive(Debug)]
pub struct Archive {
    path: Option<PathBuf>,
    stream: Box<dyn ArchiveStream>,
    archive_offset: u64,
    user_data: Option<UserDataHeader>,
    header: MpqHeader,
    hash_table: HashTable,
    block_table: BlockTable,
    hi_block_table: Option<HiBlockTable>,
    options: OpenOptions,
}

impl Archive {
    /// Open an existing MPQ archive with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Open an archive from a reader with default options
    pub fn from_reader<R>(reader: R) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        OpenOptions::new().open_stream(Box::new(SharedReader::new(reader)))
    }

    /// Get the archive header
    pub fn header(&self) -> &MpqHeader {
        &self.header
    }

    /// Get the user data header if present
    pub fn user_data(&self) -> Option<&UserDataHeader> {
        self.user_data.as_ref()
    }

    /// Get the archive offset in the file
    pub fn archive_offset(&self) -> u64 {
        self.archive_offset
    }

    /// Get the path to the archive, when opened from a file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        self.header.sector_size()
    }

    /// Get the hash table
    pub fn hash_table(&self) -> &HashTable {
        &self.hash_table
    }

    /// Get the block table
    pub fn block_table(&self) -> &BlockTable {
        &self.block_table
    }

    /// Number of hash entries that refer to existing blocks
    pub fn file_count(&self) -> usize {
        self.hash_table
            .entries()
            .iter()
            .filter(|entry| {
                self.block_table
                    .get(entry.block_index as usize)
                    .is_some_and(BlockEntry::exists)
            })
            .count()
    }

    /// Look up a file by name
    pub fn find_file(&self, name: &str) -> Option<FileEntry> {
        let (hash_index, hash_entry) = self.hash_table.find_file(name, self.options.locale)?;
        let block = self.block_table.get(hash_entry.block_index as usize)?;
        if !block.exists() {
            return None;
        }

        Some(FileEntry {
            name: name.to_string(),
            hash_index: Some(hash_index),
            block_index: hash_entry.block_index,
            locale: hash_entry.locale,
            file_size: block.file_size,
            compressed_size: block.compressed_size,
            flags: block.flags,
        })
    }

    /// Check whether a file exists
    pub fn has_file(&self, name: &str) -> bool {
        self.find_file(name).is_some()
    }

    /// Open a file by name
    pub fn open_file(&self, name: &str) -> Result<MpqFile<'_>> {
        let (hash_index, hash_entry) = self
            .hash_table
            .find_file(name, self.options.locale)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        let block_index = hash_entry.block_index;
        let block = self.existing_block(block_index)?;
        MpqFile::open_archived(self, Some(name), Some(hash_index), block_index, block)
    }

    /// Open a file by its block table index
    ///
    /// No name is known, so the key of an encrypted file has to be detected
    /// from its content.
    pub fn open_file_by_index(&self, block_index: u32) -> Result<MpqFile<'_>> {
        if block_index as usize >= self.block_table.size() {
            return Err(Error::invalid_parameter(format!(
                "Block index {} out of range ({} blocks)",
                block_index,
                self.block_table.size()
            )));
        }

        let block = self.existing_block(block_index)?;
        let hash_index = self
            .hash_table
            .entries()
            .iter()
            .position(|entry| entry.block_index == block_index);
        MpqFile::open_archived(self, None, hash_index, block_index, block)
    }

    fn existing_block(&self, block_index: u32) -> Result<BlockEntry> {
        let block = self
            .block_table
            .get(block_index as usize)
            .copied()
            .ok_or_else(|| {
                Error::invalid_handle(format!(
                    "Hash entry points at block {} past the block table",
                    block_index
                ))
            })?;

        if !block.exists() {
            return Err(Error::invalid_handle(format!(
                "Block {} is not in use",
                block_index
            )));
        }

        Ok(block)
    }

    /// Read a whole file
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.open_file(name)?.read_to_vec()
    }

    /// List the files named in `(listfile)` that exist in the archive
    pub fn list(&self) -> Result<Vec<FileEntry>> {
        let data = self.read_file(LISTFILE_NAME)?;
        Ok(parse_listfile(&data)
            .iter()
            .filter_map(|name| self.find_file(name))
            .collect())
    }

    /// Write a 32-bit archive property into `out`
    pub fn query_info(&self, class: InfoClass, out: &mut [u8]) -> Result<usize> {
        let value = match class {
            InfoClass::ArchiveSize => self.header.archive_size,
            InfoClass::HashTableSize => self.header.hash_table_entries,
            InfoClass::BlockTableSize => self.header.block_table_entries,
            InfoClass::SectorSize => self.sector_size(),
            InfoClass::FileCount => self.file_count() as u32,
            file_class => return Err(crate::file::wrong_handle_kind(file_class)),
        };
        crate::file::write_info_value(value, out)
    }

    pub(crate) fn verify_sector_checksums(&self) -> bool {
        self.options.verify_sector_checksums
    }

    pub(crate) fn key_detector(&self) -> &dyn KeyDetector {
        self.options.key_detector.as_ref()
    }

    /// Absolute stream position of a block's raw data
    pub(crate) fn block_position(&self, block_index: u32, block: &BlockEntry) -> u64 {
        let high = self
            .hi_block_table
            .as_ref()
            .map_or(0, |table| table.file_pos_high(block_index as usize));
        self.archive_offset + (high | block.file_pos as u64)
    }

    pub(crate) fn read_raw(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.stream.read_at(offset, buf)
    }
}

/// Information about a file in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileEntry {
    /// File name
    pub name: String,
    /// Slot in the hash table
    pub hash_index: Option<usize>,
    /// Index in the block table
    pub block_index: u32,
    /// Locale of the hash entry
    pub locale: u16,
    /// Uncompressed size
    pub file_size: u32,
    /// Stored size
    pub compressed_size: u32,
    /// Block flags
    pub flags: BlockFlags,
}

impl FileEntry {
    /// Check if the file is compressed
    pub fn is_compressed(&self) -> bool {
        self.flags.intersects(BlockFlags::COMPRESSED)
    }

    /// Check if the file is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.flags.contains(BlockFlags::ENCRYPTED)
    }
}
