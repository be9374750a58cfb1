//! MiniFAT and mini-stream construction for the compound-file writer.
//!
//! Streams under the 4096-byte cutoff are pooled into the mini stream in
//! 64-byte mini sectors; the MiniFAT chains them the same way the FAT chains
//! regular sectors.

use super::super::{ENDOFCHAIN, FREESECT, MINI_SECTOR_SIZE, SECTOR_SIZE};

/// Mini-sector allocator, MiniFAT table, and pooled mini-stream data.
#[derive(Debug, Default)]
pub struct MiniFatBuilder {
    minifat: Vec<u32>,
    next_mini_sector: u32,
    ministream: Vec<u8>,
}

impl MiniFatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a small stream to the mini stream, returning its first mini
    /// sector.
    pub fn allocate_mini_chain(&mut self, data: &[u8]) -> u32 {
        if data.is_empty() {
            return ENDOFCHAIN;
        }

        let num_sectors = data.len().div_ceil(MINI_SECTOR_SIZE);
        let start = self.next_mini_sector;

        self.minifat
            .resize(start as usize + num_sectors, FREESECT);
        for i in 0..num_sectors {
            let current = start + i as u32;
            self.minifat[current as usize] = if i + 1 < num_sectors {
                current + 1
            } else {
                ENDOFCHAIN
            };
        }
        self.next_mini_sector = start + num_sectors as u32;

        let padded = num_sectors * MINI_SECTOR_SIZE;
        let offset = self.ministream.len();
        self.ministream.resize(offset + padded, 0);
        self.ministream[offset..offset + data.len()].copy_from_slice(data);

        start
    }

    pub fn is_empty(&self) -> bool {
        self.minifat.is_empty()
    }

    /// The pooled mini-stream bytes, each stream padded to a mini-sector
    /// boundary.
    pub fn ministream_data(&self) -> &[u8] {
        &self.ministream
    }

    pub fn ministream_size(&self) -> u64 {
        self.ministream.len() as u64
    }

    /// Serialize the MiniFAT into whole regular sectors.
    pub fn generate_sectors(&self) -> Vec<Vec<u8>> {
        if self.minifat.is_empty() {
            return Vec::new();
        }

        let entries_per_sector = SECTOR_SIZE / 4;
        let num_sectors = self.minifat.len().div_ceil(entries_per_sector);

        let mut sectors = Vec::with_capacity(num_sectors);
        for sector_idx in 0..num_sectors {
            let mut sector = vec![0xFFu8; SECTOR_SIZE];
            let start = sector_idx * entries_per_sector;
            let end = (start + entries_per_sector).min(self.minifat.len());
            for (i, &value) in self.minifat[start..end].iter().enumerate() {
                sector[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
            }
            sectors.push(sector);
        }

        sectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mini_chain() {
        let mut minifat = MiniFatBuilder::new();
        let start = minifat.allocate_mini_chain(&[0xAA; 100]);
        assert_eq!(start, 0);
        assert_eq!(minifat.minifat[0], 1);
        assert_eq!(minifat.minifat[1], ENDOFCHAIN);
        assert_eq!(minifat.ministream_size(), 128);
    }

    #[test]
    fn test_sequential_allocations() {
        let mut minifat = MiniFatBuilder::new();
        assert_eq!(minifat.allocate_mini_chain(&[1; 50]), 0);
        assert_eq!(minifat.allocate_mini_chain(&[2; 100]), 1);
        assert_eq!(minifat.minifat[0], ENDOFCHAIN);
        assert_eq!(minifat.minifat[1], 2);
        assert_eq!(minifat.minifat[2], ENDOFCHAIN);
    }

    #[test]
    fn test_empty() {
        let mut minifat = MiniFatBuilder::new();
        assert_eq!(minifat.allocate_mini_chain(&[]), ENDOFCHAIN);
        assert!(minifat.is_empty());
        assert!(minifat.generate_sectors().is_empty());
    }
}
