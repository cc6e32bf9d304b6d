use std::fmt;

use crc::{Algorithm, Crc};

pub const CRC_64_ECMA: Algorithm<u64> = crc::CRC_64_ECMA_182;

/// Checksums block images so a fetch can tell a damaged image from a good one.
#[derive(Clone)]
pub struct Hasher {
    crc64: Crc<u64>,
    buffer: Vec<u8>,
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hasher")
    }
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            crc64: Crc::<u64>::new(&CRC_64_ECMA),
            buffer: Vec::new(),
        }
    }

    pub fn write(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    pub fn checksum(&self) -> u64 {
        self.crc64.checksum(&self.buffer)
    }

    /// One-shot checksum of `data`.
    pub fn checksum_of(data: &[u8]) -> u64 {
        let mut hasher = Self::new();
        hasher.write(data);
        hasher.checksum()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = Hasher::new();
        hasher.write(b"1|0|name:Ada;\n");
        hasher.write(b"2|1|name:Bob;\n");

        assert_eq!(
            hasher.checksum(),
            Hasher::checksum_of(b"1|0|name:Ada;\n2|1|name:Bob;\n")
        );
    }

    #[test]
    fn test_tombstone_flip_changes_checksum() {
        let live = Hasher::checksum_of(b"7|0|city:Lima;\n");
        let dead = Hasher::checksum_of(b"7|1|city:Lima;\n");
        assert_ne!(live, dead, "A tombstone change must be visible in the checksum");
    }
}
