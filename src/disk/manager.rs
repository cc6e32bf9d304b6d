use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::block::Block;
use crate::cache::{BufferManager, CachedBlock, WriteBack};
use crate::config::DiskConfig;
use crate::disk::geometry::Geometry;
use crate::disk::location::PhysicalLocation;
use crate::error::{Error, Result};
use crate::format::Raw;
use crate::hasher::Hasher;

/// What the disk knows about one placed block.
#[derive(Debug, Clone)]
struct BlockEntry {
    location: PhysicalLocation,
    capacity: usize,
    /// Bytes consumed by the placement write.
    placed_len: usize,
    /// Latest written-back serialization.
    image: Vec<u8>,
    checksum: u64,
}

/// Placed blocks by id, with the image each was last written back as.
///
/// Write-back only refreshes the image; the sector bytes of the first
/// placement are never rewritten.
#[derive(Debug, Default)]
pub struct BlockDirectory {
    entries: BTreeMap<u64, BlockEntry>,
}

impl BlockDirectory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, block_id: u64) -> bool {
        self.entries.contains_key(&block_id)
    }

    /// Placed block ids in ascending order.
    pub fn block_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    fn insert(&mut self, block: &Block, location: PhysicalLocation, image: Vec<u8>) {
        let entry = BlockEntry {
            location,
            capacity: block.capacity(),
            placed_len: image.len(),
            checksum: Hasher::checksum_of(&image),
            image,
        };
        self.entries.insert(block.id(), entry);
    }

    fn entry(&self, block_id: u64) -> Result<&BlockEntry> {
        self.entries
            .get(&block_id)
            .ok_or_else(|| Error::NotFound(format!("block {}", block_id)))
    }

    /// Decodes the block from its latest image.
    fn load(&self, block_id: u64) -> Result<Block> {
        let entry = self.entry(block_id)?;
        if Hasher::checksum_of(&entry.image) != entry.checksum {
            return Err(Error::ChecksumMismatch { block_id });
        }
        Block::decode(
            block_id,
            entry.capacity,
            Some(entry.location),
            &entry.image,
        )
    }

    #[cfg(test)]
    fn corrupt(&mut self, block_id: u64) {
        if let Some(entry) = self.entries.get_mut(&block_id) {
            entry.image.push(b'!');
        }
    }
}

impl WriteBack for BlockDirectory {
    fn write_back(&mut self, block: &Block) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&block.id())
            .ok_or_else(|| Error::NotFound(format!("block {}", block.id())))?;
        entry.image = block.encode();
        entry.checksum = Hasher::checksum_of(&entry.image);
        Ok(())
    }
}

/// Owns the sector hierarchy and the buffer pool.
///
/// Placement is first-fit over the hierarchy in depth-first order. A block is
/// written to a sector exactly once, when it is stored; later mutations reach
/// the block directory through cache write-back.
pub struct DiskManager {
    config: DiskConfig,
    geometry: Geometry,
    buffer: BufferManager<BlockDirectory>,
    next_block_id: u64,
}

impl DiskManager {
    pub fn new(config: DiskConfig) -> Result<Self> {
        config.validate()?;
        let geometry = Geometry::new(&config);
        let buffer = BufferManager::new(config.buffer_blocks, BlockDirectory::default());

        tracing::info!(
            platters = config.platters,
            surfaces_per_platter = config.surfaces_per_platter,
            tracks_per_surface = config.tracks_per_surface,
            sectors_per_track = config.sectors_per_track,
            sector_capacity = config.sector_capacity,
            records_per_block = config.records_per_block,
            buffer_blocks = config.buffer_blocks,
            "Disk initialized"
        );

        Ok(Self {
            config,
            geometry,
            buffer,
            next_block_id: 1,
        })
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn total_capacity(&self) -> u64 {
        self.geometry.total_capacity()
    }

    pub fn used_capacity(&self) -> u64 {
        self.geometry.used_capacity()
    }

    pub fn free_capacity(&self) -> u64 {
        self.total_capacity() - self.used_capacity()
    }

    /// Where a write of `required` bytes would land, or `None` if no sector
    /// has room.
    pub fn find_location_for_block(&self, required: usize) -> Option<PhysicalLocation> {
        self.geometry.find_with_space(required)
    }

    /// Creates an empty, unplaced block with the next block id.
    pub fn new_block(&mut self) -> Result<Block> {
        let block_id = self.next_block_id;
        self.next_block_id = block_id
            .checked_add(1)
            .ok_or(Error::IdsExhausted("block"))?;
        Ok(Block::new(block_id, self.config.records_per_block))
    }

    /// Serializes `block` and appends it to the first sector with room.
    ///
    /// On success the block is placed and clean. On failure nothing is written
    /// and the block stays unplaced.
    pub fn store_block(&mut self, block: &mut Block) -> Result<PhysicalLocation> {
        if block.location().is_some() {
            return Err(Error::AlreadyPlaced(block.id()));
        }

        let bytes = block.encode();
        let required = bytes.len();
        let Some(found) = self.find_location_for_block(required) else {
            tracing::warn!(
                block_id = block.id(),
                required,
                free = self.free_capacity(),
                "No sector has room for block"
            );
            return Err(Error::AllocationExhausted { required });
        };

        let sector = self
            .geometry
            .sector_mut(&found)
            .ok_or_else(|| Error::NotFound(format!("sector at {}", found)))?;
        let offset = sector.write(&bytes)?;
        let location = PhysicalLocation { offset, ..found };
        block.place(location)?;
        block.mark_clean();

        tracing::trace!(block_id = block.id(), data = %Raw::truncated(&bytes, 64), "Sector write");
        tracing::info!(block_id = block.id(), %location, bytes = required, "Stored block");

        self.buffer.sink_mut().insert(block, location, bytes);
        Ok(location)
    }

    /// Hands a placed block to the buffer pool. Returns the id of the block
    /// evicted to make room, if any.
    pub fn register_block(&mut self, block: Block) -> Result<Option<u64>> {
        if !self.buffer.sink().contains(block.id()) {
            return Err(Error::NotFound(format!(
                "placement of block {}",
                block.id()
            )));
        }
        self.buffer.add_block(block)
    }

    /// Cached block, loading it from its directory image on a miss.
    pub fn fetch_block(&mut self, block_id: u64) -> Result<&mut Block> {
        if !self.buffer.contains(block_id) {
            let block = self.buffer.sink().load(block_id)?;
            tracing::debug!(block_id, "Buffer miss, loading block");
            self.buffer.add_block(block)?;
        }
        self.buffer
            .get_block_mut(block_id)
            .ok_or_else(|| Error::NotFound(format!("block {}", block_id)))
    }

    /// Current view of a block without touching the buffer pool.
    pub fn peek_block(&self, block_id: u64) -> Result<Cow<'_, Block>> {
        match self.buffer.get_block(block_id) {
            Some(block) => Ok(Cow::Borrowed(block)),
            None => Ok(Cow::Owned(self.buffer.sink().load(block_id)?)),
        }
    }

    /// Placed block ids in ascending order.
    pub fn block_ids(&self) -> Vec<u64> {
        self.buffer.sink().block_ids().collect()
    }

    /// Bytes written to the sector when the block was placed.
    pub fn read_placed_bytes(&self, block_id: u64) -> Result<&[u8]> {
        let entry = self.buffer.sink().entry(block_id)?;
        self.geometry
            .sector(&entry.location)
            .and_then(|sector| sector.read(entry.location.offset, entry.placed_len))
            .ok_or_else(|| Error::NotFound(format!("bytes of block {}", block_id)))
    }

    pub fn buffer(&self) -> &BufferManager<BlockDirectory> {
        &self.buffer
    }

    pub fn cached_blocks(&self) -> Vec<CachedBlock> {
        self.buffer.cached_blocks()
    }

    pub fn flush_all(&mut self) -> Result<()> {
        self.buffer.flush_all()
    }

    #[cfg(test)]
    fn corrupt_image(&mut self, block_id: u64) {
        self.buffer.sink_mut().corrupt(block_id);
    }
}
