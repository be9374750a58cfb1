//! Round-trip tests for the compound-file writer against the reader.

use super::super::{CfbReader, MAGIC, SECTOR_SIZE};
use super::CfbWriter;

#[test]
fn test_empty_file_is_valid() {
    let writer = CfbWriter::new();
    let bytes = writer.into_bytes().unwrap();
    assert!(bytes.len() >= SECTOR_SIZE);
    assert_eq!(&bytes[..8], MAGIC);

    let reader = CfbReader::open(bytes).unwrap();
    assert!(!reader.has_stream("anything"));
}

#[test]
fn test_small_stream_roundtrip() {
    // below the 4096 cutoff, lands in the mini stream
    let payload = vec![0x5Au8; 700];

    let mut writer = CfbWriter::new();
    writer.add_stream("EncryptionInfo", &payload).unwrap();
    let bytes = writer.into_bytes().unwrap();

    let mut reader = CfbReader::open(bytes).unwrap();
    assert_eq!(reader.read_stream("EncryptionInfo").unwrap().unwrap(), payload);
    assert!(reader.read_stream("Missing").unwrap().is_none());
}

#[test]
fn test_large_stream_roundtrip() {
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();

    let mut writer = CfbWriter::new();
    writer.add_stream("EncryptedPackage", &payload).unwrap();
    let bytes = writer.into_bytes().unwrap();

    let mut reader = CfbReader::open(bytes).unwrap();
    assert_eq!(reader.read_stream("EncryptedPackage").unwrap().unwrap(), payload);
}

#[test]
fn test_mixed_streams_roundtrip() {
    let info = vec![1u8; 900];
    let package: Vec<u8> = (0..60_000u32).map(|i| (i % 97) as u8).collect();

    let mut writer = CfbWriter::new();
    writer.add_stream("EncryptionInfo", &info).unwrap();
    writer.add_stream("EncryptedPackage", &package).unwrap();
    let bytes = writer.into_bytes().unwrap();

    // file is whole sectors
    assert_eq!(bytes.len() % SECTOR_SIZE, 0);

    let mut reader = CfbReader::open(bytes).unwrap();
    assert_eq!(reader.read_stream("EncryptionInfo").unwrap().unwrap(), info);
    assert_eq!(reader.read_stream("EncryptedPackage").unwrap().unwrap(), package);
}

#[test]
fn test_stream_overwrite() {
    let mut writer = CfbWriter::new();
    writer.add_stream("S", b"first").unwrap();
    writer.add_stream("S", b"second").unwrap();
    let bytes = writer.into_bytes().unwrap();

    let mut reader = CfbReader::open(bytes).unwrap();
    assert_eq!(reader.read_stream("S").unwrap().unwrap(), b"second");
}

#[test]
fn test_sector_boundary_sizes() {
    for len in [4095usize, 4096, 4097, 8192, SECTOR_SIZE * 3 + 1] {
        let payload = vec![0xC3u8; len];
        let mut writer = CfbWriter::new();
        writer.add_stream("Data", &payload).unwrap();
        let bytes = writer.into_bytes().unwrap();

        let mut reader = CfbReader::open(bytes).unwrap();
        assert_eq!(reader.read_stream("Data").unwrap().unwrap(), payload, "len {len}");
    }
}

#[test]
fn test_rejects_overlong_name() {
    let mut writer = CfbWriter::new();
    assert!(writer.add_stream(&"x".repeat(32), b"data").is_err());
    assert!(writer.add_stream("", b"data").is_err());
    writer.add_stream(&"x".repeat(31), b"data").unwrap();
}
