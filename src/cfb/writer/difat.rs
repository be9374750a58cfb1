//! DIFAT sector generation for compound files with more than 109 FAT
//! sectors.
//!
//! Each DIFAT sector holds 127 FAT sector ids followed by the id of the next
//! DIFAT sector (`ENDOFCHAIN` on the last one). Files this crate writes only
//! need a DIFAT past roughly 55 MB of payload, but the layout must stay
//! valid when they do.

use super::super::{ENDOFCHAIN, FREESECT, HEADER_FAT_ENTRIES, SECTOR_SIZE};

const IDS_PER_SECTOR: usize = SECTOR_SIZE / 4 - 1;

/// Number of DIFAT sectors needed for `num_fat_sectors` FAT sectors.
pub fn difat_sector_count(num_fat_sectors: usize) -> u32 {
    if num_fat_sectors <= HEADER_FAT_ENTRIES {
        return 0;
    }
    let overflow = num_fat_sectors - HEADER_FAT_ENTRIES;
    overflow.div_ceil(IDS_PER_SECTOR) as u32
}

/// Emit the DIFAT sectors for the FAT sector ids beyond the header's 109,
/// chained starting at `first_difat_sector`.
pub fn generate_difat_sectors(fat_sectors: &[u32], first_difat_sector: u32) -> Vec<Vec<u8>> {
    if fat_sectors.len() <= HEADER_FAT_ENTRIES {
        return Vec::new();
    }

    let overflow = &fat_sectors[HEADER_FAT_ENTRIES..];
    let num_sectors = overflow.len().div_ceil(IDS_PER_SECTOR);

    let mut sectors = Vec::with_capacity(num_sectors);
    for sector_idx in 0..num_sectors {
        let mut sector = vec![0xFFu8; SECTOR_SIZE];

        let start = sector_idx * IDS_PER_SECTOR;
        let end = (start + IDS_PER_SECTOR).min(overflow.len());
        for (i, &id) in overflow[start..end].iter().enumerate() {
            sector[i * 4..i * 4 + 4].copy_from_slice(&id.to_le_bytes());
        }
        for i in (end - start)..IDS_PER_SECTOR {
            sector[i * 4..i * 4 + 4].copy_from_slice(&FREESECT.to_le_bytes());
        }

        let next = if sector_idx + 1 < num_sectors {
            first_difat_sector + sector_idx as u32 + 1
        } else {
            ENDOFCHAIN
        };
        let tail = IDS_PER_SECTOR * 4;
        sector[tail..tail + 4].copy_from_slice(&next.to_le_bytes());

        sectors.push(sector);
    }

    sectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_difat_below_threshold() {
        assert_eq!(difat_sector_count(109), 0);
        assert!(generate_difat_sectors(&vec![1; 109], 0).is_empty());
    }

    #[test]
    fn test_one_difat_sector() {
        assert_eq!(difat_sector_count(110), 1);
        let fat_ids: Vec<u32> = (0..110).collect();
        let sectors = generate_difat_sectors(&fat_ids, 500);
        assert_eq!(sectors.len(), 1);
        // first overflow id is FAT sector 109
        assert_eq!(&sectors[0][..4], &109u32.to_le_bytes());
        // chain terminator in the last slot
        let tail = IDS_PER_SECTOR * 4;
        assert_eq!(&sectors[0][tail..tail + 4], &ENDOFCHAIN.to_le_bytes());
    }

    #[test]
    fn test_chained_difat_sectors() {
        let count = HEADER_FAT_ENTRIES + IDS_PER_SECTOR + 1;
        assert_eq!(difat_sector_count(count), 2);
        let fat_ids: Vec<u32> = (0..count as u32).collect();
        let sectors = generate_difat_sectors(&fat_ids, 700);
        assert_eq!(sectors.len(), 2);
        let tail = IDS_PER_SECTOR * 4;
        assert_eq!(&sectors[0][tail..tail + 4], &701u32.to_le_bytes());
        assert_eq!(&sectors[1][tail..tail + 4], &ENDOFCHAIN.to_le_bytes());
    }
}
