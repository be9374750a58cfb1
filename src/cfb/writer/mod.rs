//! Compound-file writer.
//!
//! Buffers root-level streams in memory and emits a complete OLE2 file on
//! [`CfbWriter::into_bytes`]. Sector allocation happens in a fixed order so
//! the output can be assembled without seeking: large stream data, the mini
//! stream, the directory, the MiniFAT, then reserved DIFAT and FAT sectors.

mod difat;
mod directory;
mod fat;
mod header;
mod minifat;

use super::{ENDOFCHAIN, FATSECT, DIFSECT, HEADER_FAT_ENTRIES, MINI_STREAM_CUTOFF, SECTOR_SIZE};
use crate::error::{Error, Result};
use difat::{difat_sector_count, generate_difat_sectors};
use directory::DirectoryBuilder;
use fat::FatBuilder;
use header::HeaderBuilder;
use minifat::MiniFatBuilder;

/// Writer producing a compound file from named root-level streams.
pub struct CfbWriter {
    /// Streams in insertion order; order decides sector placement
    streams: Vec<(String, Vec<u8>)>,
}

impl CfbWriter {
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
        }
    }

    /// Add or replace a root-level stream. Names are limited to 31 UTF-16
    /// units by the directory-entry format.
    pub fn add_stream(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.is_empty() || name.encode_utf16().count() > 31 {
            return Err(Error::InvalidArgument(format!(
                "invalid stream name: {name:?}"
            )));
        }

        if let Some(entry) = self.streams.iter_mut().find(|(n, _)| n == name) {
            entry.1 = data.to_vec();
        } else {
            self.streams.push((name.to_string(), data.to_vec()));
        }
        Ok(())
    }

    /// Assemble the complete compound file.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut fat = FatBuilder::new();
        let mut minifat = MiniFatBuilder::new();

        // small streams pool into the mini stream, large ones take regular
        // sectors in insertion order
        let mut small: Vec<(&str, &[u8], u32)> = Vec::new();
        let mut large: Vec<(&str, &[u8], u32)> = Vec::new();
        for (name, data) in &self.streams {
            if data.len() < MINI_STREAM_CUTOFF as usize {
                let start = minifat.allocate_mini_chain(data);
                small.push((name, data, start));
            } else {
                large.push((name, data, 0));
            }
        }
        for entry in &mut large {
            entry.2 = fat.allocate_chain(entry.1.len());
        }

        let (ministream_start, ministream_size) = if minifat.is_empty() {
            (ENDOFCHAIN, 0u64)
        } else {
            let start = fat.allocate_chain(minifat.ministream_data().len());
            (start, minifat.ministream_size())
        };

        let mut directory = DirectoryBuilder::new(ministream_start, ministream_size);
        for (name, data, start) in &large {
            directory.add_stream(name, *start, data.len() as u64);
        }
        for (name, data, start) in &small {
            directory.add_stream(name, *start, data.len() as u64);
        }
        let dir_stream = directory.generate_directory_stream();
        let dir_start = fat.allocate_chain(dir_stream.len());

        let minifat_sectors = minifat.generate_sectors();
        let minifat_start = if minifat_sectors.is_empty() {
            ENDOFCHAIN
        } else {
            fat.allocate_chain(minifat_sectors.len() * SECTOR_SIZE)
        };

        // the FAT must also cover its own sectors and any DIFAT sectors;
        // iterate until the counts stabilize
        let entries_per_fat_sector = (SECTOR_SIZE / 4) as u32;
        let ids_per_difat_sector = entries_per_fat_sector - 1;
        let used = fat.total_sectors();
        let mut n_fat: u32 = 0;
        let mut n_difat: u32 = 0;
        for _ in 0..8 {
            let total = used + n_fat + n_difat;
            let next_fat = total.div_ceil(entries_per_fat_sector);
            let next_difat = if next_fat > HEADER_FAT_ENTRIES as u32 {
                (next_fat - HEADER_FAT_ENTRIES as u32).div_ceil(ids_per_difat_sector)
            } else {
                0
            };
            if next_fat == n_fat && next_difat == n_difat {
                break;
            }
            n_fat = next_fat;
            n_difat = next_difat;
        }

        let difat_start = fat.allocate_special(n_difat, DIFSECT);
        let fat_start = fat.allocate_special(n_fat, FATSECT);

        let fat_sector_ids: Vec<u32> = (fat_start..fat_start + n_fat).collect();
        let fat_sectors = fat.generate_sectors();
        if fat_sectors.len() != n_fat as usize {
            return Err(Error::Corrupt(format!(
                "FAT sizing failed to converge: planned {n_fat}, built {}",
                fat_sectors.len()
            )));
        }
        let difat_sectors = generate_difat_sectors(&fat_sector_ids, difat_start);
        debug_assert_eq!(difat_sectors.len() as u32, difat_sector_count(fat_sector_ids.len()));

        let mut builder = HeaderBuilder::new();
        builder.set_first_dir_sector(dir_start);
        builder.set_minifat(minifat_start, minifat_sectors.len() as u32);
        if n_difat > 0 {
            builder.set_difat(difat_start, n_difat);
        }
        builder.add_fat_sectors(&fat_sector_ids);

        // assemble: header plus every allocated sector at its position
        let total_sectors = fat.total_sectors() as usize;
        let mut out = vec![0u8; SECTOR_SIZE + total_sectors * SECTOR_SIZE];
        out[..SECTOR_SIZE].copy_from_slice(&builder.generate());

        let mut place = |start_sector: u32, data: &[u8]| {
            let offset = (start_sector as usize + 1) * SECTOR_SIZE;
            out[offset..offset + data.len()].copy_from_slice(data);
        };

        for (_, data, start) in &large {
            place(*start, data);
        }
        if ministream_start != ENDOFCHAIN {
            place(ministream_start, minifat.ministream_data());
        }
        place(dir_start, &dir_stream);
        for (i, sector) in minifat_sectors.iter().enumerate() {
            place(minifat_start + i as u32, sector);
        }
        for (i, sector) in difat_sectors.iter().enumerate() {
            place(difat_start + i as u32, sector);
        }
        for (i, sector) in fat_sectors.iter().enumerate() {
            place(fat_start + i as u32, sector);
        }

        Ok(out)
    }
}

impl Default for CfbWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
