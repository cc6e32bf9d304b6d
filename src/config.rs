use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Geometry of the simulated disk plus block and buffer sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Number of platters (default: 2)
    pub platters: u32,

    /// Surfaces per platter (default: 2)
    pub surfaces_per_platter: u32,

    /// Tracks per surface (default: 10)
    pub tracks_per_surface: u32,

    /// Sectors per track (default: 8)
    pub sectors_per_track: u32,

    /// Bytes per sector (default: 512)
    pub sector_capacity: usize,

    /// Maximum records held by one block (default: 5)
    pub records_per_block: usize,

    /// Maximum blocks held by the buffer manager (default: 10)
    pub buffer_blocks: usize,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            platters: 2,
            surfaces_per_platter: 2,
            tracks_per_surface: 10,
            sectors_per_track: 8,
            sector_capacity: 512,
            records_per_block: 5,
            buffer_blocks: 10,
        }
    }
}

impl DiskConfig {
    /// Set the number of platters
    pub fn platters(mut self, platters: u32) -> Self {
        self.platters = platters;
        self
    }

    /// Set surfaces per platter
    pub fn surfaces_per_platter(mut self, surfaces: u32) -> Self {
        self.surfaces_per_platter = surfaces;
        self
    }

    /// Set tracks per surface
    pub fn tracks_per_surface(mut self, tracks: u32) -> Self {
        self.tracks_per_surface = tracks;
        self
    }

    /// Set sectors per track
    pub fn sectors_per_track(mut self, sectors: u32) -> Self {
        self.sectors_per_track = sectors;
        self
    }

    /// Set sector capacity in bytes
    pub fn sector_capacity(mut self, bytes: usize) -> Self {
        self.sector_capacity = bytes;
        self
    }

    /// Set the record capacity of each block
    pub fn records_per_block(mut self, records: usize) -> Self {
        self.records_per_block = records;
        self
    }

    /// Set the buffer bound in blocks
    pub fn buffer_blocks(mut self, blocks: usize) -> Self {
        self.buffer_blocks = blocks;
        self
    }

    /// Total number of sectors across the whole geometry.
    pub fn sector_count(&self) -> usize {
        self.platters as usize
            * self.surfaces_per_platter as usize
            * self.tracks_per_surface as usize
            * self.sectors_per_track as usize
    }

    /// Total byte capacity, fixed at construction.
    pub fn total_capacity(&self) -> u64 {
        self.sector_count() as u64 * self.sector_capacity as u64
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("platters", self.platters as usize),
            ("surfaces_per_platter", self.surfaces_per_platter as usize),
            ("tracks_per_surface", self.tracks_per_surface as usize),
            ("sectors_per_track", self.sectors_per_track as usize),
            ("sector_capacity", self.sector_capacity),
            ("records_per_block", self.records_per_block),
            ("buffer_blocks", self.buffer_blocks),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{} must be positive", name)));
            }
        }

        (self.platters as usize)
            .checked_mul(self.surfaces_per_platter as usize)
            .and_then(|n| n.checked_mul(self.tracks_per_surface as usize))
            .and_then(|n| n.checked_mul(self.sectors_per_track as usize))
            .and_then(|n| n.checked_mul(self.sector_capacity))
            .ok_or_else(|| Error::InvalidConfig("geometry size overflows usize".to_string()))?;
        Ok(())
    }
}
