use std::fmt;

use serde::{Deserialize, Serialize};

/// Hierarchical address of a block's serialized bytes.
///
/// A location only exists once a placement succeeded; "unallocated" is
/// expressed as `Option::<PhysicalLocation>::None` throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalLocation {
    pub platter: u32,
    pub surface: u32,
    pub track: u32,
    pub sector: u32,
    /// Byte offset inside the sector.
    pub offset: usize,
}

impl PhysicalLocation {
    pub fn new(platter: u32, surface: u32, track: u32, sector: u32, offset: usize) -> Self {
        Self {
            platter,
            surface,
            track,
            sector,
            offset,
        }
    }
}

impl fmt::Display for PhysicalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "platter {}, surface {}, track {}, sector {}, offset {}",
            self.platter, self.surface, self.track, self.sector, self.offset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = PhysicalLocation::new(1, 0, 3, 2, 40);
        assert_eq!(
            loc.to_string(),
            "platter 1, surface 0, track 3, sector 2, offset 40"
        );
    }

    #[test]
    fn test_ordering_follows_hierarchy() {
        let a = PhysicalLocation::new(0, 0, 1, 0, 0);
        let b = PhysicalLocation::new(0, 1, 0, 0, 0);
        let c = PhysicalLocation::new(0, 1, 0, 0, 12);
        assert!(a < b);
        assert!(b < c);
    }
}
