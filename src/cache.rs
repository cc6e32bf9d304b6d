//! Bounded block cache with insertion-order eviction.
//!
//! Eviction is FIFO over admission order: the queue is never reordered on
//! access, so a block that is read constantly is still the first one out once
//! it is the oldest admission. Dirty blocks are handed to the [`WriteBack`]
//! sink before they are released.

use std::collections::{HashMap, VecDeque};

use crate::block::Block;
use crate::error::Result;

/// Destination for dirty blocks leaving the cache or being flushed.
pub trait WriteBack {
    fn write_back(&mut self, block: &Block) -> Result<()>;
}

/// Diagnostic view of one cached block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedBlock {
    pub block_id: u64,
    pub dirty: bool,
}

pub struct BufferManager<W: WriteBack> {
    max_blocks: usize,
    pool: HashMap<u64, Block>,
    /// block ids in admission order
    admissions: VecDeque<u64>,
    sink: W,
    stats: Stats,
}

impl<W: WriteBack> BufferManager<W> {
    pub fn new(max_blocks: usize, sink: W) -> Self {
        Self {
            max_blocks,
            pool: HashMap::new(),
            admissions: VecDeque::new(),
            sink,
            stats: Stats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_blocks
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn contains(&self, block_id: u64) -> bool {
        self.pool.contains_key(&block_id)
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Pure lookup; does not affect eviction order.
    pub fn get_block(&self, block_id: u64) -> Option<&Block> {
        self.pool.get(&block_id)
    }

    /// Mutable lookup; does not affect eviction order either.
    pub fn get_block_mut(&mut self, block_id: u64) -> Option<&mut Block> {
        self.pool.get_mut(&block_id)
    }

    /// Admits `block`, evicting the oldest admission first if the cache is
    /// full. Returns the id of the evicted block, if any.
    ///
    /// Re-admitting a cached id replaces the cached block in place and keeps
    /// its first admission position. A dirty cached copy is written back
    /// before it is replaced; if that fails the cached copy stays.
    pub fn add_block(&mut self, block: Block) -> Result<Option<u64>> {
        let block_id = block.id();
        if let Some(cached) = self.pool.get_mut(&block_id) {
            if cached.is_dirty() {
                Self::write_block_to_disk(&mut self.sink, &mut self.stats, cached)?;
            }
            *cached = block;
            return Ok(None);
        }

        let evicted = if self.pool.len() >= self.max_blocks {
            self.evict()?
        } else {
            None
        };

        self.pool.insert(block_id, block);
        self.admissions.push_back(block_id);
        Ok(evicted)
    }

    /// Removes the oldest admission, writing it back first if dirty.
    ///
    /// If the write-back fails the block stays cached at the front of the
    /// queue and the error is returned.
    pub fn evict(&mut self) -> Result<Option<u64>> {
        let block_id = loop {
            let Some(block_id) = self.admissions.pop_front() else {
                return Ok(None);
            };
            if self.pool.contains_key(&block_id) {
                break block_id;
            }
        };
        let Some(block) = self.pool.get_mut(&block_id) else {
            return Ok(None);
        };

        if block.is_dirty() {
            if let Err(e) = Self::write_block_to_disk(&mut self.sink, &mut self.stats, block) {
                self.admissions.push_front(block_id);
                return Err(e);
            }
        }

        self.pool.remove(&block_id);
        self.stats.evictions += 1;
        tracing::debug!(block_id, "Evicted block");
        Ok(Some(block_id))
    }

    /// Writes back one cached block. Clean blocks are left as they are.
    pub fn write_back(&mut self, block_id: u64) -> Result<()> {
        match self.pool.get_mut(&block_id) {
            Some(block) if block.is_dirty() => {
                Self::write_block_to_disk(&mut self.sink, &mut self.stats, block)
            }
            _ => Ok(()),
        }
    }

    /// Writes back every dirty cached block. Blocks stay cached.
    pub fn flush_all(&mut self) -> Result<()> {
        for block in self.pool.values_mut().filter(|b| b.is_dirty()) {
            Self::write_block_to_disk(&mut self.sink, &mut self.stats, block)?;
        }
        Ok(())
    }

    /// Cached blocks in admission order.
    pub fn cached_blocks(&self) -> Vec<CachedBlock> {
        self.admissions
            .iter()
            .filter_map(|id| self.pool.get(id))
            .map(|block| CachedBlock {
                block_id: block.id(),
                dirty: block.is_dirty(),
            })
            .collect()
    }

    /// Returns `(write_backs, evictions)`.
    pub fn stats(&self) -> (usize, usize) {
        (self.stats.write_backs, self.stats.evictions)
    }

    fn write_block_to_disk(sink: &mut W, stats: &mut Stats, block: &mut Block) -> Result<()> {
        sink.write_back(block)?;
        block.mark_clean();
        stats.write_backs += 1;
        tracing::debug!(block_id = block.id(), location = ?block.location(), "Wrote back block");
        Ok(())
    }
}

impl<W: WriteBack> Drop for BufferManager<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            tracing::warn!(error = %e, "Failed to flush buffer pool on teardown");
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    write_backs: usize,
    evictions: usize,
}
