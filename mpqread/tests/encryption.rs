//! Encrypted files: name-derived keys, key detection and explicit keys

mod common;

use common::{ArchiveBuilder, FileOptions, TestRng};
use mpqread::crypto::{encrypt_bytes, file_key, hash_string, hash_type};
use mpqread::{BlockFlags, Error, InfoClass, NoKeyDetection, OpenOptions};
use pretty_assertions::assert_eq;

fn riff(len: usize) -> Vec<u8> {
    let mut data = b"RIFF".to_vec();
    data.extend_from_slice(&(len as u32 - 8).to_le_bytes());
    data.extend_from_slice(b"WAVEfmt ");
    data.extend_from_slice(&TestRng::new(5).bytes(len - 16));
    data
}

fn info(file: &mpqread::MpqFile<'_>, class: InfoClass) -> u32 {
    let mut out = [0u8; 4];
    file.query_info(class, &mut out).unwrap();
    u32::from_le_bytes(out)
}

#[test]
fn test_offset_table_encrypted_with_file_key() {
    let data = TestRng::new(1).text(10_000);
    let archive = ArchiveBuilder::new()
        .file(
            "odd.txt",
            &data,
            FileOptions {
                table_key_is_file_key: true,
                ..FileOptions::encrypted()
            },
        )
        .open();
    assert_eq!(archive.read_file("odd.txt").unwrap(), data);
}

#[test]
fn test_key_detected_from_offset_table() {
    let data = TestRng::new(2).text(9000);
    let archive = ArchiveBuilder::new()
        .file("known.txt", b"named", FileOptions::default())
        .unnamed_file("hidden.txt", &data, FileOptions::encrypted())
        .open();

    let mut file = archive.open_file_by_index(1).unwrap();
    assert_eq!(file.name(), None);
    assert_eq!(file.key(), None);
    assert_eq!(file.read_to_vec().unwrap(), data);

    let block = *file.block().unwrap();
    let expected = file_key("hidden.txt", block.file_pos, block.file_size, false);
    assert_eq!(file.key(), Some(expected));
    assert_eq!(info(&file, InfoClass::Key), expected);
    assert_eq!(info(&file, InfoClass::HashIndex), u32::MAX);
}

#[test]
fn test_key_detected_when_offset_table_uses_file_key() {
    let data = TestRng::new(9).text(9000);
    let archive = ArchiveBuilder::new()
        .unnamed_file(
            "odd.txt",
            &data,
            FileOptions {
                table_key_is_file_key: true,
                ..FileOptions::encrypted()
            },
        )
        .open();

    let mut file = archive.open_file_by_index(0).unwrap();
    assert_eq!(file.read_to_vec().unwrap(), data);

    let block = *file.block().unwrap();
    assert_eq!(
        file.key(),
        Some(file_key("odd.txt", block.file_pos, block.file_size, false))
    );
}

#[test]
fn test_key_detected_with_checksums_and_file_key_table() {
    let data = TestRng::new(10).text(12_000);
    let archive = ArchiveBuilder::new()
        .unnamed_file(
            "checked.txt",
            &data,
            FileOptions {
                table_key_is_file_key: true,
                sector_crc: true,
                ..FileOptions::encrypted()
            },
        )
        .open();

    let mut file = archive.open_file_by_index(0).unwrap();
    assert_eq!(file.read_to_vec().unwrap(), data);
}

#[test]
fn test_rejected_detected_key_is_not_kept() {
    // Passes detection (12 = table size, 22 one step further) but the last
    // offset lies past the stored data
    let mut stored: Vec<u8> = [12u32, 22, 0x7FFF_FFFF]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect();
    encrypt_bytes(&mut stored, 0x1234_5677);
    stored.extend_from_slice(&[0u8; 10]);

    let archive = ArchiveBuilder::new()
        .raw_file(
            "broken.bin",
            &stored,
            5000,
            BlockFlags::COMPRESS | BlockFlags::ENCRYPTED,
        )
        .open();

    let mut file = archive.open_file_by_index(0).unwrap();
    let mut buf = [0u8; 16];
    assert!(matches!(file.read(&mut buf), Err(Error::FileCorrupt(_))));
    assert_eq!(file.key(), None);

    let mut out = [0u8; 4];
    assert!(matches!(
        file.query_info(InfoClass::Key, &mut out),
        Err(Error::UnknownFileKey)
    ));
    assert!(matches!(file.read(&mut buf), Err(Error::FileCorrupt(_))));
    assert_eq!(file.key(), None);
}

#[test]
fn test_key_detected_from_wave_header() {
    let data = riff(6000);
    let archive = ArchiveBuilder::new()
        .unnamed_file(
            "sound.wav",
            &data,
            FileOptions {
                encrypt: true,
                ..FileOptions::default()
            },
        )
        .open();

    let mut file = archive.open_file_by_index(0).unwrap();
    assert_eq!(file.pseudo_name().unwrap(), "File00000000.wav");
    assert_eq!(file.position(), 0);
    assert_eq!(file.read_to_vec().unwrap(), data);
}

#[test]
fn test_fixed_key_detection_and_unfixed_query() {
    let data = riff(3000);
    let archive = ArchiveBuilder::new()
        .file("pad.bin", &[0u8; 64], FileOptions::default())
        .unnamed_file(
            "fixed.wav",
            &data,
            FileOptions {
                fix_key: true,
                ..FileOptions::encrypted()
            },
        )
        .open();

    let mut file = archive.open_file_by_index(1).unwrap();
    assert_eq!(file.read_to_vec().unwrap(), data);

    let block = *file.block().unwrap();
    assert_eq!(
        info(&file, InfoClass::Key),
        file_key("fixed.wav", block.file_pos, block.file_size, true)
    );
    assert_eq!(
        info(&file, InfoClass::KeyUnfixed),
        hash_string("fixed.wav", hash_type::FILE_KEY)
    );
    assert_eq!(info(&file, InfoClass::Position), block.file_pos);
}

#[test]
fn test_unknown_key_then_set_key() {
    let data = TestRng::new(3).text(5000);
    let builder = ArchiveBuilder::new().unnamed_file("locked.txt", &data, FileOptions::encrypted());
    let archive = builder.open_with(OpenOptions::new().key_detector(NoKeyDetection));

    let mut file = archive.open_file_by_index(0).unwrap();
    let mut buf = [0u8; 64];
    let err = file.read(&mut buf).unwrap_err();
    assert!(matches!(err, Error::UnknownFileKey));
    assert!(err.is_recoverable());

    let mut out = [0u8; 4];
    assert!(matches!(
        file.query_info(InfoClass::Key, &mut out),
        Err(Error::UnknownFileKey)
    ));

    let block = *file.block().unwrap();
    file.set_key(file_key("locked.txt", block.file_pos, block.file_size, false))
        .unwrap();
    assert_eq!(file.read_to_vec().unwrap(), data);
}

#[test]
fn test_wrong_key_is_detected_as_corruption() {
    let data = TestRng::new(4).text(9000);
    let archive = ArchiveBuilder::new()
        .file("a.txt", &data, FileOptions::encrypted())
        .open();

    let mut file = archive.open_file("a.txt").unwrap();
    file.set_key(0xDEAD_BEEF).unwrap();
    let err = file.read_to_vec().unwrap_err();
    assert!(matches!(err, Error::FileCorrupt(_)));
}

#[test]
fn test_key_uses_base_name() {
    let data = TestRng::new(6).text(7000);
    let archive = ArchiveBuilder::new()
        .file("Units\\Orc\\Grunt.mdx", &data, FileOptions::encrypted())
        .open();

    let file = archive.open_file("units\\orc\\grunt.mdx").unwrap();
    assert_eq!(
        file.key(),
        Some(hash_string("Grunt.mdx", hash_type::FILE_KEY))
    );
}

#[test]
fn test_file_query_info() {
    let data = TestRng::new(8).text(5000);
    let archive = ArchiveBuilder::new()
        .file_with_locale("locale.txt", 0x409, &data, FileOptions::encrypted())
        .open();

    let file = archive.open_file("locale.txt").unwrap();
    let block = *file.block().unwrap();
    let hash_index = archive.find_file("locale.txt").unwrap().hash_index.unwrap();

    assert_eq!(info(&file, InfoClass::HashIndex), hash_index as u32);
    assert_eq!(
        info(&file, InfoClass::NameHashA),
        hash_string("locale.txt", hash_type::NAME_A)
    );
    assert_eq!(
        info(&file, InfoClass::NameHashB),
        hash_string("locale.txt", hash_type::NAME_B)
    );
    assert_eq!(info(&file, InfoClass::Locale), 0x409);
    assert_eq!(info(&file, InfoClass::BlockIndex), 0);
    assert_eq!(info(&file, InfoClass::FileSize), 5000);
    assert_eq!(info(&file, InfoClass::CompressedSize), block.compressed_size);
    assert_eq!(info(&file, InfoClass::Flags), block.flags.bits());
    assert_eq!(info(&file, InfoClass::KeyUnfixed), info(&file, InfoClass::Key));

    let mut out = [0u8; 4];
    assert!(matches!(
        file.query_info(InfoClass::SectorSize, &mut out),
        Err(Error::InvalidHandle(_))
    ));
    assert!(matches!(
        file.query_info(InfoClass::FileSize, &mut out[..1]),
        Err(Error::InsufficientBuffer {
            required: 4,
            provided: 1
        })
    ));
}
