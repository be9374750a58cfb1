//! Directory-stream generation for the compound-file writer.
//!
//! Entries are 128 bytes with UTF-16LE names. Siblings under a storage form
//! a binary search tree ordered by name length first, then case-insensitive
//! comparison; the midpoint of the sorted children becomes the parent's
//! child pointer. Office readers expect exactly this shape.

use super::super::{DIRENTRY_SIZE, ENDOFCHAIN, NOSTREAM, STGTY_ROOT, STGTY_STREAM};

/// One directory entry being assembled.
#[derive(Debug)]
pub struct DirectoryEntry {
    pub name: String,
    pub entry_type: u8,
    pub start_sector: u32,
    pub size: u64,
    sid_left: u32,
    sid_right: u32,
    sid_child: u32,
}

impl DirectoryEntry {
    fn root(ministream_start: u32, ministream_size: u64) -> Self {
        Self {
            name: "Root Entry".to_string(),
            entry_type: STGTY_ROOT,
            start_sector: ministream_start,
            size: ministream_size,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        }
    }

    fn stream(name: String, start_sector: u32, size: u64) -> Self {
        Self {
            name,
            entry_type: STGTY_STREAM,
            start_sector,
            size,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        }
    }

    fn to_bytes(&self) -> [u8; DIRENTRY_SIZE] {
        let mut data = [0u8; DIRENTRY_SIZE];

        let utf16: Vec<u16> = self.name.encode_utf16().collect();
        let name_len = utf16.len().min(31);
        for (i, &unit) in utf16.iter().take(name_len).enumerate() {
            data[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        // length in bytes including the null terminator
        data[64..66].copy_from_slice(&(((name_len + 1) * 2) as u16).to_le_bytes());

        data[66] = self.entry_type;
        // node color: black
        data[67] = 1;
        data[68..72].copy_from_slice(&self.sid_left.to_le_bytes());
        data[72..76].copy_from_slice(&self.sid_right.to_le_bytes());
        data[76..80].copy_from_slice(&self.sid_child.to_le_bytes());
        // CLSID, state bits, timestamps stay zero
        data[116..120].copy_from_slice(&self.start_sector.to_le_bytes());
        data[120..128].copy_from_slice(&self.size.to_le_bytes());

        data
    }
}

/// Builds the directory stream for a root storage with flat stream children.
pub struct DirectoryBuilder {
    entries: Vec<DirectoryEntry>,
}

impl DirectoryBuilder {
    pub fn new(ministream_start: u32, ministream_size: u64) -> Self {
        Self {
            entries: vec![DirectoryEntry::root(ministream_start, ministream_size)],
        }
    }

    /// Add a root-level stream entry.
    pub fn add_stream(&mut self, name: &str, start_sector: u32, size: u64) {
        let start = if size == 0 { ENDOFCHAIN } else { start_sector };
        self.entries
            .push(DirectoryEntry::stream(name.to_string(), start, size));
    }

    /// Directory-tree name ordering: length first, then case-insensitive.
    fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
        a.len()
            .cmp(&b.len())
            .then_with(|| a.to_uppercase().cmp(&b.to_uppercase()))
    }

    /// Link root children as a sibling tree rooted at the sorted midpoint,
    /// then serialize all entries in SID order.
    pub fn generate_directory_stream(mut self) -> Vec<u8> {
        let mut children: Vec<u32> = (1..self.entries.len() as u32).collect();
        children.sort_by(|&a, &b| {
            Self::compare_names(&self.entries[a as usize].name, &self.entries[b as usize].name)
        });

        if !children.is_empty() {
            let midpoint = children.len() / 2;
            self.entries[0].sid_child = children[midpoint];

            // left chain toward the midpoint, right chain after it
            for i in 1..=midpoint {
                self.entries[children[i] as usize].sid_left = children[i - 1];
            }
            for i in midpoint..children.len() - 1 {
                self.entries[children[i] as usize].sid_right = children[i + 1];
            }
        }

        let mut data = Vec::with_capacity(self.entries.len() * DIRENTRY_SIZE);
        for entry in &self.entries {
            data.extend_from_slice(&entry.to_bytes());
        }
        // pad to a whole sector with empty entries
        let padded = data.len().div_ceil(super::super::SECTOR_SIZE) * super::super::SECTOR_SIZE;
        data.resize(padded, 0);
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_field(data: &[u8], sid: usize, offset: usize) -> u32 {
        let base = sid * DIRENTRY_SIZE + offset;
        u32::from_le_bytes(data[base..base + 4].try_into().unwrap())
    }

    #[test]
    fn test_two_stream_layout() {
        let mut dir = DirectoryBuilder::new(4, 192);
        dir.add_stream("EncryptionInfo", 0, 100);
        dir.add_stream("EncryptedPackage", 1, 5000);
        let data = dir.generate_directory_stream();

        assert_eq!(data.len(), 512);
        // the shorter name sorts first, so the midpoint (EncryptedPackage,
        // SID 2) becomes the root child with EncryptionInfo to its left
        assert_eq!(entry_field(&data, 0, 76), 2);
        assert_eq!(entry_field(&data, 2, 68), 1);
        assert_eq!(entry_field(&data, 2, 72), NOSTREAM);
        assert_eq!(entry_field(&data, 1, 68), NOSTREAM);
        assert_eq!(entry_field(&data, 1, 72), NOSTREAM);
    }

    #[test]
    fn test_name_encoding() {
        let mut dir = DirectoryBuilder::new(ENDOFCHAIN, 0);
        dir.add_stream("Ab", 0, 10);
        let data = dir.generate_directory_stream();

        let base = DIRENTRY_SIZE;
        assert_eq!(data[base], b'A');
        assert_eq!(data[base + 1], 0);
        assert_eq!(data[base + 2], b'b');
        // name length counts the null terminator
        assert_eq!(
            u16::from_le_bytes([data[base + 64], data[base + 65]]),
            6
        );
        assert_eq!(data[base + 66], STGTY_STREAM);
    }

    #[test]
    fn test_root_entry_fields() {
        let dir = DirectoryBuilder::new(7, 320);
        let data = dir.generate_directory_stream();
        assert_eq!(data[66], STGTY_ROOT);
        assert_eq!(entry_field(&data, 0, 116), 7);
    }
}
