//! OLE2 compound-file (CFB) container support.
//!
//! Encrypted workbooks are carried in a compound file with two streams,
//! `EncryptionInfo` and `EncryptedPackage`. The reader handles any
//! 512-byte-sector compound file with root-level streams; the writer emits
//! the minimal valid file external readers expect, bit-exact in its header,
//! FAT, MiniFAT, and directory layout.

pub mod reader;
pub mod writer;

pub use reader::CfbReader;
pub use writer::CfbWriter;

/// Magic bytes opening every compound file.
pub const MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Sector size for major version 3 files, the only size this crate writes.
pub const SECTOR_SIZE: usize = 512;

/// Mini-stream sector size.
pub const MINI_SECTOR_SIZE: usize = 64;

/// Streams below this size live in the mini stream.
pub const MINI_STREAM_CUTOFF: u32 = 4096;

/// Size of one directory entry.
pub const DIRENTRY_SIZE: usize = 128;

/// FAT marker: sector holds DIFAT data.
pub const DIFSECT: u32 = 0xFFFF_FFFC;

/// FAT marker: sector holds FAT data.
pub const FATSECT: u32 = 0xFFFF_FFFD;

/// FAT marker: end of a sector chain.
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;

/// FAT marker: unallocated sector.
pub const FREESECT: u32 = 0xFFFF_FFFF;

/// Directory marker: no sibling/child entry.
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Directory entry type: storage object.
pub const STGTY_STORAGE: u8 = 1;

/// Directory entry type: stream object.
pub const STGTY_STREAM: u8 = 2;

/// Directory entry type: root storage.
pub const STGTY_ROOT: u8 = 5;

/// Number of FAT sector ids held directly in the header.
pub const HEADER_FAT_ENTRIES: usize = 109;
