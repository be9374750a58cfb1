//! 512-byte compound-file header generation.
//!
//! Field offsets follow MS-CFB section 2.2; external readers validate the
//! magic, byte-order mark, and sector shifts bit-for-bit.

use super::super::{ENDOFCHAIN, FREESECT, HEADER_FAT_ENTRIES, MAGIC, SECTOR_SIZE};

/// Builder for the file header.
pub struct HeaderBuilder {
    first_dir_sector: u32,
    first_minifat_sector: u32,
    num_minifat_sectors: u32,
    first_difat_sector: u32,
    num_difat_sectors: u32,
    fat_sectors: Vec<u32>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self {
            first_dir_sector: ENDOFCHAIN,
            first_minifat_sector: ENDOFCHAIN,
            num_minifat_sectors: 0,
            first_difat_sector: ENDOFCHAIN,
            num_difat_sectors: 0,
            fat_sectors: Vec::new(),
        }
    }

    pub fn set_first_dir_sector(&mut self, sector: u32) {
        self.first_dir_sector = sector;
    }

    pub fn set_minifat(&mut self, first_sector: u32, num_sectors: u32) {
        self.first_minifat_sector = first_sector;
        self.num_minifat_sectors = num_sectors;
    }

    pub fn set_difat(&mut self, first_sector: u32, num_sectors: u32) {
        self.first_difat_sector = first_sector;
        self.num_difat_sectors = num_sectors;
    }

    /// Record the FAT sector ids; the first 109 land in the header itself.
    pub fn add_fat_sectors(&mut self, sectors: &[u32]) {
        self.fat_sectors.extend_from_slice(sectors);
    }

    /// Emit the header block.
    pub fn generate(&self) -> Vec<u8> {
        let mut header = vec![0u8; SECTOR_SIZE];

        header[0..8].copy_from_slice(MAGIC);
        // CLSID at 8..24 stays zero

        // minor version 0x3E, major (DLL) version 3 for 512-byte sectors
        header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
        header[26..28].copy_from_slice(&3u16.to_le_bytes());

        // little-endian byte-order mark
        header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());

        // sector shift 9 (512), mini sector shift 6 (64)
        header[30..32].copy_from_slice(&9u16.to_le_bytes());
        header[32..34].copy_from_slice(&6u16.to_le_bytes());

        // reserved 34..40 zero; directory sector count must be 0 for v3
        header[44..48].copy_from_slice(&(self.fat_sectors.len() as u32).to_le_bytes());
        header[48..52].copy_from_slice(&self.first_dir_sector.to_le_bytes());
        // transaction signature 52..56 zero
        header[56..60].copy_from_slice(&4096u32.to_le_bytes());
        header[60..64].copy_from_slice(&self.first_minifat_sector.to_le_bytes());
        header[64..68].copy_from_slice(&self.num_minifat_sectors.to_le_bytes());
        header[68..72].copy_from_slice(&self.first_difat_sector.to_le_bytes());
        header[72..76].copy_from_slice(&self.num_difat_sectors.to_le_bytes());

        for i in 0..HEADER_FAT_ENTRIES {
            let offset = 76 + i * 4;
            let value = self.fat_sectors.get(i).copied().unwrap_or(FREESECT);
            header[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut builder = HeaderBuilder::new();
        builder.set_first_dir_sector(10);
        builder.add_fat_sectors(&[1, 2, 3]);
        let header = builder.generate();

        assert_eq!(header.len(), SECTOR_SIZE);
        assert_eq!(&header[..8], MAGIC);
        assert_eq!(&header[28..30], &0xFFFEu16.to_le_bytes());
        assert_eq!(&header[30..32], &9u16.to_le_bytes());
        assert_eq!(&header[44..48], &3u32.to_le_bytes());
        assert_eq!(&header[48..52], &10u32.to_le_bytes());
        assert_eq!(&header[76..80], &1u32.to_le_bytes());
        // unused header FAT slots are FREESECT
        assert_eq!(&header[88..92], &FREESECT.to_le_bytes());
    }
}
