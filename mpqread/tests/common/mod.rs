//! In-memory MPQ archive builder for tests and benchmarks
//!
//! Layout: v1 header, file data, hash table, block table. Compressed sectors
//! use zlib (mask 0x02) only when that makes them smaller.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use mpqread::crypto::{encrypt_bytes, file_key, hash_string, hash_type};
use mpqread::io::SharedReader;
use mpqread::{Archive, BlockFlags, OpenOptions};
use std::io::{Cursor, Write};

/// How a file is stored
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    pub compress: bool,
    pub encrypt: bool,
    pub fix_key: bool,
    pub sector_crc: bool,
    pub single_unit: bool,
    /// Encrypt the sector offset table with the file key instead of key - 1
    pub table_key_is_file_key: bool,
    /// Checksum values written instead of the real ones
    pub checksum_overrides: Vec<(usize, u32)>,
}

impl FileOptions {
    pub fn compressed() -> Self {
        Self {
            compress: true,
            ..Self::default()
        }
    }

    pub fn encrypted() -> Self {
        Self {
            compress: true,
            encrypt: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Encode { data: Vec<u8>, options: FileOptions },
    Raw { stored: Vec<u8>, file_size: u32, flags: BlockFlags },
}

#[derive(Debug, Clone)]
struct TestFile {
    name: String,
    locale: u16,
    hashed: bool,
    payload: Payload,
}

/// Builds a complete v1 archive in memory
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    sector_shift: u16,
    hash_table_size: u32,
    user_data: Option<Vec<u8>>,
    listfile: bool,
    files: Vec<TestFile>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            sector_shift: 3,
            hash_table_size: 16,
            user_data: None,
            listfile: false,
            files: Vec::new(),
        }
    }

    pub fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    pub fn hash_table_size(mut self, size: u32) -> Self {
        self.hash_table_size = size;
        self
    }

    /// Put a user data block in front of the archive
    pub fn user_data(mut self, data: &[u8]) -> Self {
        self.user_data = Some(data.to_vec());
        self
    }

    /// Add a `(listfile)` naming every hashed file
    pub fn with_listfile(mut self) -> Self {
        self.listfile = true;
        self
    }

    pub fn file(self, name: &str, data: &[u8], options: FileOptions) -> Self {
        self.file_with_locale(name, 0, data, options)
    }

    pub fn file_with_locale(
        mut self,
        name: &str,
        locale: u16,
        data: &[u8],
        options: FileOptions,
    ) -> Self {
        self.files.push(TestFile {
            name: name.to_string(),
            locale,
            hashed: true,
            payload: Payload::Encode {
                data: data.to_vec(),
                options,
            },
        });
        self
    }

    /// A file that only exists in the block table
    pub fn unnamed_file(mut self, key_name: &str, data: &[u8], options: FileOptions) -> Self {
        self.files.push(TestFile {
            name: key_name.to_string(),
            locale: 0,
            hashed: false,
            payload: Payload::Encode {
                data: data.to_vec(),
                options,
            },
        });
        self
    }

    /// A file whose stored bytes are written verbatim
    pub fn raw_file(mut self, name: &str, stored: &[u8], file_size: u32, flags: BlockFlags) -> Self {
        self.files.push(TestFile {
            name: name.to_string(),
            locale: 0,
            hashed: true,
            payload: Payload::Raw {
                stored: stored.to_vec(),
                file_size,
                flags: flags | BlockFlags::EXISTS,
            },
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let sector_size = 512u32 << self.sector_shift;

        let mut files = self.files.clone();
        if self.listfile {
            let names: Vec<&str> = files
                .iter()
                .filter(|file| file.hashed)
                .map(|file| file.name.as_str())
                .collect();
            files.push(TestFile {
                name: "(listfile)".to_string(),
                locale: 0,
                hashed: true,
                payload: Payload::Encode {
                    data: names.join("\r\n").into_bytes(),
                    options: FileOptions::encrypted(),
                },
            });
        }

        // Archive-relative data, starting right after the header
        let mut body = Vec::new();
        let mut blocks = Vec::new();
        for file in &files {
            let file_pos = 32 + body.len() as u32;
            let (stored, file_size, flags) = match &file.payload {
                Payload::Raw {
                    stored,
                    file_size,
                    flags,
                } => (stored.clone(), *file_size, *flags),
                Payload::Encode { data, options } => {
                    encode_file(&file.name, data, options, file_pos, sector_size)
                }
            };
            blocks.push((file_pos, stored.len() as u32, file_size, flags.bits()));
            body.extend_from_slice(&stored);
        }

        let hash_table = self.hash_table(&files);
        let block_table = block_table(&blocks);

        let hash_table_offset = 32 + body.len() as u32;
        let block_table_offset = hash_table_offset + hash_table.len() as u32;
        let archive_size = block_table_offset + block_table.len() as u32;

        let mut archive = Vec::new();
        if let Some(user_data) = &self.user_data {
            archive.write_u32::<LittleEndian>(0x1B51504D).unwrap();
            archive
                .write_u32::<LittleEndian>(user_data.len() as u32)
                .unwrap();
            archive.write_u32::<LittleEndian>(0x200).unwrap();
            archive.write_u32::<LittleEndian>(16).unwrap();
            archive.extend_from_slice(user_data);
            archive.resize(0x200, 0);
        }

        archive.write_u32::<LittleEndian>(0x1A51504D).unwrap();
        archive.write_u32::<LittleEndian>(32).unwrap();
        archive.write_u32::<LittleEndian>(archive_size).unwrap();
        archive.write_u16::<LittleEndian>(0).unwrap();
        archive.write_u16::<LittleEndian>(self.sector_shift).unwrap();
        archive.write_u32::<LittleEndian>(hash_table_offset).unwrap();
        archive.write_u32::<LittleEndian>(block_table_offset).unwrap();
        archive
            .write_u32::<LittleEndian>(self.hash_table_size)
            .unwrap();
        archive.write_u32::<LittleEndian>(blocks.len() as u32).unwrap();

        archive.extend_from_slice(&body);
        archive.extend_from_slice(&hash_table);
        archive.extend_from_slice(&block_table);
        archive
    }

    /// Build and open with default options
    pub fn open(&self) -> Archive {
        Archive::from_reader(Cursor::new(self.build())).expect("open test archive")
    }

    /// Build and open with custom options
    pub fn open_with(&self, options: OpenOptions) -> Archive {
        options
            .open_stream(Box::new(SharedReader::new(Cursor::new(self.build()))))
            .expect("open test archive")
    }

    fn hash_table(&self, files: &[TestFile]) -> Vec<u8> {
        let size = self.hash_table_size as usize;
        let mut entries = vec![(u32::MAX, u32::MAX, 0xFFFFu16, 0xFFFFu16, u32::MAX); size];

        for (block_index, file) in files.iter().enumerate() {
            if !file.hashed {
                continue;
            }
            let mut index = hash_string(&file.name, hash_type::TABLE_OFFSET) as usize & (size - 1);
            while entries[index].4 != u32::MAX {
                index = (index + 1) & (size - 1);
            }
            entries[index] = (
                hash_string(&file.name, hash_type::NAME_A),
                hash_string(&file.name, hash_type::NAME_B),
                file.locale,
                0,
                block_index as u32,
            );
        }

        let mut table = Vec::with_capacity(size * 16);
        for (name_1, name_2, locale, platform, block_index) in entries {
            table.write_u32::<LittleEndian>(name_1).unwrap();
            table.write_u32::<LittleEndian>(name_2).unwrap();
            table.write_u16::<LittleEndian>(locale).unwrap();
            table.write_u16::<LittleEndian>(platform).unwrap();
            table.write_u32::<LittleEndian>(block_index).unwrap();
        }
        encrypt_bytes(&mut table, hash_string("(hash table)", hash_type::FILE_KEY));
        table
    }
}

fn block_table(blocks: &[(u32, u32, u32, u32)]) -> Vec<u8> {
    let mut table = Vec::with_capacity(blocks.len() * 16);
    for &(file_pos, stored_size, file_size, flags) in blocks {
        table.write_u32::<LittleEndian>(file_pos).unwrap();
        table.write_u32::<LittleEndian>(stored_size).unwrap();
        table.write_u32::<LittleEndian>(file_size).unwrap();
        table.write_u32::<LittleEndian>(flags).unwrap();
    }
    encrypt_bytes(&mut table, hash_string("(block table)", hash_type::FILE_KEY));
    table
}

fn encode_file(
    name: &str,
    data: &[u8],
    options: &FileOptions,
    file_pos: u32,
    sector_size: u32,
) -> (Vec<u8>, u32, BlockFlags) {
    let file_size = data.len() as u32;
    let mut flags = BlockFlags::EXISTS;
    if options.compress {
        flags |= BlockFlags::COMPRESS;
    }
    if options.encrypt {
        flags |= BlockFlags::ENCRYPTED;
    }
    if options.fix_key {
        flags |= BlockFlags::FIX_KEY;
    }
    if options.single_unit {
        flags |= BlockFlags::SINGLE_UNIT;
    }
    if options.sector_crc {
        flags |= BlockFlags::SECTOR_CRC;
    }
    let key = file_key(name, file_pos, file_size, options.fix_key);

    if options.single_unit {
        let mut stored = if options.compress {
            compress_sector(data)
        } else {
            data.to_vec()
        };
        if options.encrypt {
            encrypt_bytes(&mut stored, key);
        }
        return (stored, file_size, flags);
    }

    if !options.compress {
        let mut stored = data.to_vec();
        if options.encrypt {
            for (i, sector) in stored.chunks_mut(sector_size as usize).enumerate() {
                encrypt_bytes(sector, key.wrapping_add(i as u32));
            }
        }
        return (stored, file_size, flags);
    }

    let sectors: Vec<Vec<u8>> = data
        .chunks(sector_size as usize)
        .map(compress_sector)
        .collect();
    let count = sectors.len();
    let entries = count + 1 + usize::from(options.sector_crc);

    let mut offsets = Vec::with_capacity(entries);
    let mut position = (entries * 4) as u32;
    offsets.push(position);
    for sector in &sectors {
        position += sector.len() as u32;
        offsets.push(position);
    }

    let mut checksums: Vec<u32> = sectors.iter().map(|sector| sector_checksum(sector)).collect();
    for &(index, value) in &options.checksum_overrides {
        checksums[index] = value;
    }
    if options.sector_crc {
        offsets.push(position + (count * 4) as u32);
    }

    let mut table = Vec::with_capacity(entries * 4);
    for offset in offsets {
        table.write_u32::<LittleEndian>(offset).unwrap();
    }
    if options.encrypt {
        let table_key = if options.table_key_is_file_key {
            key
        } else {
            key.wrapping_sub(1)
        };
        encrypt_bytes(&mut table, table_key);
    }

    let mut stored = table;
    for (i, mut sector) in sectors.into_iter().enumerate() {
        if options.encrypt {
            encrypt_bytes(&mut sector, key.wrapping_add(i as u32));
        }
        stored.extend_from_slice(&sector);
    }
    if options.sector_crc {
        for checksum in checksums {
            stored.write_u32::<LittleEndian>(checksum).unwrap();
        }
    }

    (stored, file_size, flags)
}

/// zlib with the multi-compression mask, or the raw sector if that is smaller
fn compress_sector(plain: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(vec![0x02], Compression::default());
    encoder.write_all(plain).unwrap();
    let compressed = encoder.finish().unwrap();
    if compressed.len() < plain.len() {
        compressed
    } else {
        plain.to_vec()
    }
}

/// Adler-32 seeded with zero, as stored in sector checksum tables
pub fn sector_checksum(data: &[u8]) -> u32 {
    let mut adler = adler::Adler32::from_checksum(0);
    adler.write_slice(data);
    adler.checksum()
}

/// Deterministic xorshift generator
#[derive(Debug, Clone)]
pub struct TestRng(u64);

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 32) as u32
    }

    /// Incompressible bytes
    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_u32() as u8).collect()
    }

    /// Text-like bytes that compress well
    pub fn text(&mut self, len: usize) -> Vec<u8> {
        const WORDS: [&str; 8] = [
            "footman ", "peasant ", "gryphon ", "keep ", "castle ", "lumber ", "gold ", "\r\n",
        ];
        let mut out = Vec::with_capacity(len + 8);
        while out.len() < len {
            out.extend_from_slice(WORDS[self.next_u32() as usize % WORDS.len()].as_bytes());
        }
        out.truncate(len);
        out
    }
}

/// Text with an incompressible stretch, so sectors mix compressed and raw
pub fn mixed_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = TestRng::new(seed);
    let mut data = rng.text(len);
    let noise_start = len / 3;
    let noise_end = (noise_start + 6000).min(len);
    let noise = rng.bytes(noise_end - noise_start);
    data[noise_start..noise_end].copy_from_slice(&noise);
    data
}
