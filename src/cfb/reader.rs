//! Compound-file reader.
//!
//! Parses the 512-byte header, loads the FAT (header DIFAT entries plus
//! chained DIFAT sectors), the MiniFAT, and the directory tree, and extracts
//! streams by name. Streams below the mini cutoff are pooled in the mini
//! stream referenced by the root entry.

use super::*;
use crate::error::{Error, Result};

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::Corrupt(format!("compound file truncated at offset {offset}")))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::Corrupt(format!("compound file truncated at offset {offset}")))
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64> {
    data.get(offset..offset + 8)
        .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| Error::Corrupt(format!("compound file truncated at offset {offset}")))
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// One parsed directory entry.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub entry_type: u8,
    pub sid_left: u32,
    pub sid_right: u32,
    pub sid_child: u32,
    pub start_sector: u32,
    pub size: u64,
}

/// In-memory compound-file reader.
pub struct CfbReader {
    data: Vec<u8>,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u32,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    entries: Vec<DirectoryEntry>,
    /// Pooled small-stream data, loaded lazily from the root entry chain
    ministream: Option<Vec<u8>>,
}

impl CfbReader {
    /// Parse a compound file held in memory.
    pub fn open(data: Vec<u8>) -> Result<Self> {
        if data.len() < SECTOR_SIZE || &data[..8] != MAGIC {
            return Err(Error::Corrupt("not an OLE compound file".to_string()));
        }

        let byte_order = read_u16(&data, 0x1C)?;
        if byte_order != 0xFFFE {
            return Err(Error::Corrupt(format!(
                "compound file byte order {byte_order:#06x}"
            )));
        }

        let sector_shift = read_u16(&data, 0x1E)?;
        let mini_sector_shift = read_u16(&data, 0x20)?;
        if !(7..=20).contains(&sector_shift) || mini_sector_shift > sector_shift {
            return Err(Error::Corrupt(format!(
                "compound file sector shift {sector_shift}/{mini_sector_shift}"
            )));
        }
        let sector_size = 1usize << sector_shift;
        let mini_sector_size = 1usize << mini_sector_shift;

        let first_dir_sector = read_u32(&data, 0x30)?;
        let mini_stream_cutoff = read_u32(&data, 0x38)?;
        let first_minifat_sector = read_u32(&data, 0x3C)?;
        let num_minifat_sectors = read_u32(&data, 0x40)?;
        let first_difat_sector = read_u32(&data, 0x44)?;
        let num_difat_sectors = read_u32(&data, 0x48)?;

        let mut reader = Self {
            data,
            sector_size,
            mini_sector_size,
            mini_stream_cutoff,
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: None,
        };

        reader.load_fat(first_difat_sector, num_difat_sectors)?;
        reader.load_directory(first_dir_sector)?;
        if num_minifat_sectors > 0 && first_minifat_sector != ENDOFCHAIN {
            reader.load_minifat(first_minifat_sector)?;
        }

        Ok(reader)
    }

    fn sector(&self, sector_id: u32) -> Result<&[u8]> {
        let start = (sector_id as usize + 1) * self.sector_size;
        self.data
            .get(start..start + self.sector_size)
            .ok_or_else(|| Error::Corrupt(format!("sector {sector_id} beyond end of file")))
    }

    /// Load the FAT from the header DIFAT entries plus any chained DIFAT
    /// sectors.
    fn load_fat(&mut self, first_difat_sector: u32, num_difat_sectors: u32) -> Result<()> {
        let mut fat_sectors = Vec::new();
        for i in 0..HEADER_FAT_ENTRIES {
            let sector = read_u32(&self.data, 0x4C + i * 4)?;
            if sector == FREESECT || sector == ENDOFCHAIN {
                break;
            }
            fat_sectors.push(sector);
        }

        let ids_per_difat = self.sector_size / 4 - 1;
        let mut difat_sector = first_difat_sector;
        for _ in 0..num_difat_sectors {
            if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
                break;
            }
            let sector_data = self.sector(difat_sector)?.to_vec();
            for i in 0..ids_per_difat {
                let id = read_u32(&sector_data, i * 4)?;
                if id == FREESECT || id == ENDOFCHAIN {
                    break;
                }
                fat_sectors.push(id);
            }
            difat_sector = read_u32(&sector_data, ids_per_difat * 4)?;
        }

        let mut fat = Vec::with_capacity(fat_sectors.len() * (self.sector_size / 4));
        for &sector_id in &fat_sectors {
            let sector_data = self.sector(sector_id)?;
            fat.extend(
                sector_data
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
            );
        }
        self.fat = fat;

        Ok(())
    }

    /// Read a full stream by walking a FAT chain.
    fn read_fat_chain(&self, start_sector: u32) -> Result<Vec<u8>> {
        if start_sector == ENDOFCHAIN {
            return Ok(Vec::new());
        }

        let mut data = Vec::new();
        let mut sector = start_sector;
        let mut hops = 0usize;

        while sector != ENDOFCHAIN {
            if sector as usize >= self.fat.len() {
                return Err(Error::Corrupt(format!("FAT chain leaves the table: {sector}")));
            }
            if hops > self.fat.len() {
                return Err(Error::Corrupt("cycle in FAT chain".to_string()));
            }
            data.extend_from_slice(self.sector(sector)?);
            sector = self.fat[sector as usize];
            hops += 1;
        }

        Ok(data)
    }

    fn load_minifat(&mut self, first_minifat_sector: u32) -> Result<()> {
        let raw = self.read_fat_chain(first_minifat_sector)?;
        self.minifat = raw
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(())
    }

    fn load_directory(&mut self, first_dir_sector: u32) -> Result<()> {
        let dir_data = self.read_fat_chain(first_dir_sector)?;
        if dir_data.is_empty() {
            return Err(Error::Corrupt("compound file has no directory".to_string()));
        }

        for chunk in dir_data.chunks_exact(DIRENTRY_SIZE) {
            let name_len = read_u16(chunk, 64)? as usize;
            let name = if name_len >= 2 {
                decode_utf16le(&chunk[..name_len.min(64)])
            } else {
                String::new()
            };
            let entry_type = chunk[66];

            // version 3 files only use the low half of the size field
            let size = if self.sector_size == SECTOR_SIZE {
                read_u64(chunk, 120)? & 0xFFFF_FFFF
            } else {
                read_u64(chunk, 120)?
            };

            self.entries.push(DirectoryEntry {
                name,
                entry_type,
                sid_left: read_u32(chunk, 68)?,
                sid_right: read_u32(chunk, 72)?,
                sid_child: read_u32(chunk, 76)?,
                start_sector: read_u32(chunk, 116)?,
                size,
            });
        }

        match self.entries.first() {
            Some(root) if root.entry_type == STGTY_ROOT => Ok(()),
            _ => Err(Error::Corrupt("compound file has no root entry".to_string())),
        }
    }

    /// Find a stream entry anywhere in the directory by name.
    fn find_stream(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|e| e.entry_type == STGTY_STREAM && e.name == name)
    }

    /// Whether a stream with this name exists.
    pub fn has_stream(&self, name: &str) -> bool {
        self.find_stream(name).is_some()
    }

    fn read_mini_chain(&mut self, start_sector: u32, size: u64) -> Result<Vec<u8>> {
        if self.ministream.is_none() {
            let root = &self.entries[0];
            let pool = self.read_fat_chain(root.start_sector)?;
            self.ministream = Some(pool);
        }
        let ministream = self.ministream.as_ref().expect("ministream just loaded");

        let mut data = Vec::with_capacity(size as usize);
        let mut sector = start_sector;
        let mut hops = 0usize;

        while sector != ENDOFCHAIN {
            if sector as usize >= self.minifat.len() {
                return Err(Error::Corrupt(format!(
                    "MiniFAT chain leaves the table: {sector}"
                )));
            }
            if hops > self.minifat.len() {
                return Err(Error::Corrupt("cycle in MiniFAT chain".to_string()));
            }

            let start = sector as usize * self.mini_sector_size;
            let end = start + self.mini_sector_size;
            let chunk = ministream
                .get(start..end)
                .ok_or_else(|| Error::Corrupt("mini sector beyond mini stream".to_string()))?;
            data.extend_from_slice(chunk);

            sector = self.minifat[sector as usize];
            hops += 1;
        }

        data.truncate(size as usize);
        Ok(data)
    }

    /// Read a stream's full contents by name. A missing stream is `None`.
    pub fn read_stream(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.find_stream(name).cloned() else {
            return Ok(None);
        };

        let data = if entry.size < self.mini_stream_cutoff as u64 {
            self.read_mini_chain(entry.start_sector, entry.size)?
        } else {
            let mut data = self.read_fat_chain(entry.start_sector)?;
            if (entry.size as usize) > data.len() {
                return Err(Error::Corrupt(format!(
                    "stream {name} declares {} bytes but chain holds {}",
                    entry.size,
                    data.len()
                )));
            }
            data.truncate(entry.size as usize);
            data
        };

        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_cfb() {
        assert!(CfbReader::open(b"PK\x03\x04".to_vec()).is_err());
        assert!(CfbReader::open(vec![0u8; 600]).is_err());
    }

    #[test]
    fn test_rejects_bad_byte_order() {
        let mut data = vec![0u8; 1536];
        data[..8].copy_from_slice(MAGIC);
        data[0x1C] = 0xFF;
        data[0x1D] = 0xFF;
        assert!(CfbReader::open(data).is_err());
    }
}
