use std::fmt;

use crate::error::{Error, Result};
use crate::format::Raw;

/// Fixed-capacity, append-only byte region.
///
/// `used` never decreases and never exceeds `capacity`. Bytes written once
/// are never overwritten or reclaimed.
pub struct Sector {
    id: u32,
    capacity: usize,
    used: usize,
    data: Vec<u8>,
}

impl Sector {
    pub fn new(id: u32, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            used: 0,
            data: vec![0; capacity],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn free(&self) -> usize {
        self.capacity - self.used
    }

    pub fn has_space(&self, required: usize) -> bool {
        self.used + required <= self.capacity
    }

    /// Appends `content` and returns the offset it was written at.
    pub fn write(&mut self, content: &[u8]) -> Result<usize> {
        if !self.has_space(content.len()) {
            return Err(Error::InsufficientSpace {
                required: content.len(),
                available: self.free(),
            });
        }

        let offset = self.used;
        self.data[offset..offset + content.len()].copy_from_slice(content);
        self.used += content.len();
        Ok(offset)
    }

    /// Returns the stored bytes verbatim, or `None` if the range reaches past
    /// what has been written.
    pub fn read(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len)?;
        if end > self.used {
            return None;
        }
        Some(&self.data[offset..end])
    }
}

impl fmt::Debug for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sector")
            .field("id", &self.id)
            .field("used", &self.used)
            .field("capacity", &self.capacity)
            .field("data", &Raw::truncated(&self.data[..self.used], 32))
            .finish()
    }
}
