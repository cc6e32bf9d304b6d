//! Record-level operations over the disk and its buffer pool.
//!
//! Lookups are linear scans over every placed block in block-id order, going
//! through the buffer pool. Usage reporting reads blocks without admitting
//! them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::block::{Block, CompareOp};
use crate::cache::CachedBlock;
use crate::config::DiskConfig;
use crate::disk::{DiskManager, PhysicalLocation};
use crate::error::{Error, Result};
use crate::record::Record;

/// Where a record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub block_id: u64,
    pub location: PhysicalLocation,
}

/// A live record together with its owning block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub record: Record,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOccupancy {
    pub block_id: u64,
    pub location: PhysicalLocation,
    /// Stored records, tombstoned ones included.
    pub records: usize,
    pub live: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub blocks: Vec<BlockOccupancy>,
}

impl Usage {
    pub fn stored_records(&self) -> usize {
        self.blocks.iter().map(|b| b.records).sum()
    }

    pub fn live_records(&self) -> usize {
        self.blocks.iter().map(|b| b.live).sum()
    }
}

pub struct Store {
    disk: DiskManager,
    /// Placed blocks that still have a free record slot.
    open_blocks: BTreeSet<u64>,
    next_record_id: u64,
}

impl Store {
    pub fn new(config: DiskConfig) -> Result<Self> {
        Ok(Self {
            disk: DiskManager::new(config)?,
            open_blocks: BTreeSet::new(),
            next_record_id: 1,
        })
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    /// Builds a record with the next free record id.
    pub fn new_record(&mut self, attributes: BTreeMap<String, String>) -> Result<Record> {
        let record_id = self.next_record_id;
        self.next_record_id = record_id
            .checked_add(1)
            .ok_or(Error::IdsExhausted("record"))?;
        Ok(Record::new(record_id, attributes))
    }

    /// Adds `record` to the lowest-id block with a free slot, or places a new
    /// block holding it.
    pub fn insert(&mut self, record: Record) -> Result<Placement> {
        if let Some(key) = record.reserved_key() {
            return Err(Error::ReservedCharacter {
                key: key.to_string(),
            });
        }
        let record_id = record.id();

        let placement = match self.open_blocks.first().copied() {
            Some(block_id) => self.append_to(block_id, record)?,
            None => self.place_new_block(record)?,
        };

        self.next_record_id = self.next_record_id.max(record_id.saturating_add(1));
        tracing::debug!(
            record_id,
            block_id = placement.block_id,
            location = %placement.location,
            "Inserted record"
        );
        Ok(placement)
    }

    fn append_to(&mut self, block_id: u64, record: Record) -> Result<Placement> {
        let block = self.disk.fetch_block(block_id)?;
        block.add_record(record)?;
        let location = block
            .location()
            .ok_or_else(|| Error::NotFound(format!("placement of block {}", block_id)))?;
        if !block.has_space() {
            self.open_blocks.remove(&block_id);
        }
        Ok(Placement { block_id, location })
    }

    fn place_new_block(&mut self, record: Record) -> Result<Placement> {
        let mut block = self.disk.new_block()?;
        block.add_record(record)?;
        let location = self.disk.store_block(&mut block)?;

        let block_id = block.id();
        if block.has_space() {
            self.open_blocks.insert(block_id);
        }
        self.disk.register_block(block)?;
        Ok(Placement { block_id, location })
    }

    pub fn find(&mut self, record_id: u64) -> Result<Option<Located>> {
        for block_id in self.disk.block_ids() {
            let block = self.disk.fetch_block(block_id)?;
            if let Some(record) = block.find_record(record_id) {
                return Ok(Some(Located {
                    record: record.clone(),
                    placement: placement_of(block_id, block.location())?,
                }));
            }
        }
        Ok(None)
    }

    /// Live records whose `attribute` compares true against `value`, using
    /// string ordering.
    pub fn find_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        op: CompareOp,
    ) -> Result<Vec<Located>> {
        self.scan(|block| {
            block
                .find_by_attribute(attribute, value, op)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn all_records(&mut self) -> Result<Vec<Located>> {
        self.scan(|block| block.live_records().cloned().collect())
    }

    /// Tombstones the record in place. Its bytes stay where they were written.
    pub fn delete(&mut self, record_id: u64) -> Result<Placement> {
        for block_id in self.disk.block_ids() {
            let block = self.disk.fetch_block(block_id)?;
            if block.find_record(record_id).is_some() {
                block.remove_record(record_id)?;
                let placement = placement_of(block_id, block.location())?;
                tracing::debug!(record_id, block_id, "Deleted record");
                return Ok(placement);
            }
        }
        Err(Error::NotFound(format!("record {}", record_id)))
    }

    /// Byte and per-block occupancy. Does not change the buffer pool.
    pub fn usage(&self) -> Result<Usage> {
        let mut blocks = Vec::new();
        for block_id in self.disk.block_ids() {
            let block = self.disk.peek_block(block_id)?;
            blocks.push(BlockOccupancy {
                block_id,
                location: placement_of(block_id, block.location())?.location,
                records: block.len(),
                live: block.live_len(),
                capacity: block.capacity(),
            });
        }

        Ok(Usage {
            total_bytes: self.disk.total_capacity(),
            used_bytes: self.disk.used_capacity(),
            free_bytes: self.disk.free_capacity(),
            blocks,
        })
    }

    pub fn cached_blocks(&self) -> Vec<CachedBlock> {
        self.disk.cached_blocks()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.disk.flush_all()
    }

    fn scan<F>(&mut self, mut matches: F) -> Result<Vec<Located>>
    where
        F: FnMut(&Block) -> Vec<Record>,
    {
        let mut found = Vec::new();
        for block_id in self.disk.block_ids() {
            let block = self.disk.fetch_block(block_id)?;
            let placement = placement_of(block_id, block.location())?;
            found.extend(
                matches(block)
                    .into_iter()
                    .map(|record| Located { record, placement }),
            );
        }
        Ok(found)
    }
}

fn placement_of(block_id: u64, location: Option<PhysicalLocation>) -> Result<Placement> {
    let location =
        location.ok_or_else(|| Error::NotFound(format!("placement of block {}", block_id)))?;
    Ok(Placement { block_id, location })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_config() -> DiskConfig {
        DiskConfig::default()
            .platters(1)
            .surfaces_per_platter(1)
            .tracks_per_surface(2)
            .sectors_per_track(2)
            .sector_capacity(100)
            .records_per_block(2)
    }

    /// Encodes to 39 bytes for single-digit ids, 40 with the newline.
    fn passenger(store: &mut Store, n: u64) -> Record {
        let record = store
            .new_record(BTreeMap::from([
                ("name".to_string(), format!("Passenger-{:02}", n)),
                ("city".to_string(), "Southampton".to_string()),
            ]))
            .unwrap();
        assert_eq!(record.encoded_len() + 1, 40);
        record
    }

    fn aged(store: &mut Store, age: &str) -> Record {
        store
            .new_record(BTreeMap::from([("age".to_string(), age.to_string())]))
            .unwrap()
    }

    #[test]
    fn test_end_to_end_placement() {
        let mut store = Store::new(scenario_config()).unwrap();

        let placements: Vec<Placement> = (1..=5)
            .map(|n| {
                let record = passenger(&mut store, n);
                store.insert(record).unwrap()
            })
            .collect();

        // Each new block is placed with its first record only (40 bytes).
        // Block 3 does not fit behind blocks 1 and 2 (80 + 40 > 100), so
        // first-fit moves on to track 0, sector 1.
        let b1 = PhysicalLocation::new(0, 0, 0, 0, 0);
        let b2 = PhysicalLocation::new(0, 0, 0, 0, 40);
        let b3 = PhysicalLocation::new(0, 0, 0, 1, 0);
        let expected = [(1, b1), (1, b1), (2, b2), (2, b2), (3, b3)];
        for (placement, (block_id, location)) in placements.iter().zip(expected) {
            assert_eq!(placement.block_id, block_id);
            assert_eq!(placement.location, location);
        }

        let usage = store.usage().unwrap();
        assert_eq!(usage.blocks.len(), 3);
        assert_eq!(usage.used_bytes, 120);
        assert_eq!(usage.free_bytes, 280);
        assert_eq!(usage.stored_records(), 5);

        let sectors = store.disk().geometry().sectors();
        assert_eq!(sectors[0].used(), 80);
        assert_eq!(sectors[1].used(), 40);
        assert_eq!(sectors[2].used(), 0);
        assert_eq!(sectors[3].used(), 0);
    }

    #[test]
    fn test_find_by_id() {
        let mut store = Store::new(scenario_config()).unwrap();
        for n in 1..=3 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }

        let found = store.find(3).unwrap().expect("record 3 exists");
        assert_eq!(found.record.get("name"), Some("Passenger-03"));
        assert_eq!(found.placement.block_id, 2);
        assert_eq!(
            found.placement.location,
            PhysicalLocation::new(0, 0, 0, 0, 40)
        );

        assert!(store.find(42).unwrap().is_none());
    }

    #[test]
    fn test_lexicographic_query() {
        let mut store = Store::new(scenario_config()).unwrap();
        for age in ["9", "10"] {
            let record = aged(&mut store, age);
            store.insert(record).unwrap();
        }

        let found = store.find_by_attribute("age", "5", CompareOp::Gt).unwrap();
        let ages: Vec<&str> = found.iter().filter_map(|l| l.record.get("age")).collect();
        assert_eq!(ages, vec!["9"]);

        let found = store.find_by_attribute("age", "5", CompareOp::Lt).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.get("age"), Some("10"));

        assert!(store
            .find_by_attribute("height", "", CompareOp::Ge)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_tombstones_in_place() {
        let mut store = Store::new(scenario_config()).unwrap();
        for n in 1..=2 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }
        let used_before = store.disk().used_capacity();

        let placement = store.delete(1).unwrap();
        assert_eq!(placement.block_id, 1);
        assert!(store.find(1).unwrap().is_none());
        assert!(matches!(store.delete(1), Err(Error::NotFound(_))));

        let usage = store.usage().unwrap();
        assert_eq!(usage.blocks[0].records, 2);
        assert_eq!(usage.blocks[0].live, 1);
        assert_eq!(usage.used_bytes, used_before);

        // The placement write still carries the live encoding of record 1.
        let placed = store.disk().read_placed_bytes(1).unwrap();
        assert!(placed.starts_with(b"1|0|"));

        // A tombstoned slot is not reused.
        let record = passenger(&mut store, 3);
        assert_eq!(store.insert(record).unwrap().block_id, 2);
    }

    #[test]
    fn test_all_records_skips_deleted() {
        let mut store = Store::new(scenario_config()).unwrap();
        for n in 1..=4 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }
        store.delete(2).unwrap();

        let ids: Vec<u64> = store
            .all_records()
            .unwrap()
            .iter()
            .map(|l| l.record.id())
            .collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_allocation_exhausted() {
        let config = DiskConfig::default()
            .platters(1)
            .surfaces_per_platter(1)
            .tracks_per_surface(1)
            .sectors_per_track(1)
            .sector_capacity(50)
            .records_per_block(1);
        let mut store = Store::new(config).unwrap();

        let first = passenger(&mut store, 1);
        store.insert(first).unwrap();
        let second = passenger(&mut store, 2);
        assert_eq!(
            store.insert(second),
            Err(Error::AllocationExhausted { required: 40 })
        );

        let usage = store.usage().unwrap();
        assert_eq!(usage.blocks.len(), 1);
        assert_eq!(usage.used_bytes, 40);
        assert_eq!(store.all_records().unwrap().len(), 1);
    }

    #[test]
    fn test_reserved_characters_rejected() {
        let mut store = Store::new(scenario_config()).unwrap();
        let record = Record::from_pairs(1, [("note", "a;b")]);
        assert_eq!(
            store.insert(record),
            Err(Error::ReservedCharacter {
                key: "note".to_string()
            })
        );
        assert!(store.usage().unwrap().blocks.is_empty());
    }

    #[test]
    fn test_record_ids_follow_caller_ids() {
        let mut store = Store::new(scenario_config()).unwrap();
        store
            .insert(Record::from_pairs(41, [("k", "v")]))
            .unwrap();
        assert_eq!(store.new_record(BTreeMap::new()).unwrap().id(), 42);
    }

    #[test]
    fn test_record_ids_exhausted_after_max_id() {
        let mut store = Store::new(scenario_config()).unwrap();
        store
            .insert(Record::from_pairs(u64::MAX, [("k", "v")]))
            .unwrap();

        assert_eq!(
            store.new_record(BTreeMap::new()),
            Err(Error::IdsExhausted("record"))
        );
        assert!(store.find(u64::MAX).unwrap().is_some());
    }

    #[test]
    fn test_fifo_eviction_through_store() {
        let config = scenario_config().records_per_block(1).buffer_blocks(2);
        let mut store = Store::new(config).unwrap();
        for n in 1..=2 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }

        // Reading block 1 does not protect it from eviction.
        assert!(store.disk().buffer().get_block(1).is_some());
        let record = passenger(&mut store, 3);
        store.insert(record).unwrap();

        let cached: Vec<u64> = store.cached_blocks().iter().map(|c| c.block_id).collect();
        assert_eq!(cached, vec![2, 3]);
    }

    #[test]
    fn test_mutations_survive_eviction() {
        let config = scenario_config().buffer_blocks(1);
        let mut store = Store::new(config).unwrap();
        for n in 1..=4 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }

        // Record 2 was added to block 1 while cached and block 1 has since
        // been evicted; the write-back kept it.
        let found = store.find(2).unwrap().expect("record 2 exists");
        assert_eq!(found.placement.block_id, 1);

        store.delete(4).unwrap();
        store.find(1).unwrap();
        assert!(store.find(4).unwrap().is_none());
        assert_eq!(store.usage().unwrap().live_records(), 3);
    }

    #[test]
    fn test_flush_clears_dirty() {
        let mut store = Store::new(scenario_config()).unwrap();
        for n in 1..=2 {
            let record = passenger(&mut store, n);
            store.insert(record).unwrap();
        }
        assert!(store.cached_blocks().iter().any(|c| c.dirty));

        store.flush().unwrap();
        assert!(store.cached_blocks().iter().all(|c| !c.dirty));
    }

    #[test]
    fn test_usage_serializes() {
        let mut store = Store::new(scenario_config()).unwrap();
        let record = passenger(&mut store, 1);
        store.insert(record).unwrap();

        let json = serde_json::to_value(store.usage().unwrap()).unwrap();
        assert_eq!(json["used_bytes"], 40);
        assert_eq!(json["blocks"][0]["location"]["offset"], 0);
    }

    #[test]
    fn test_lookup_results_serialize() {
        let mut store = Store::new(scenario_config()).unwrap();
        let record = passenger(&mut store, 1);
        store.insert(record).unwrap();

        let found = store.find(1).unwrap().expect("record 1 exists");
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["record"]["id"], 1);
        assert_eq!(json["record"]["attributes"]["city"], "Southampton");
        assert_eq!(json["record"]["deleted"], false);
        assert_eq!(json["placement"]["block_id"], 1);

        let decoded: Record = serde_json::from_value(json["record"].clone()).unwrap();
        assert_eq!(decoded, found.record);
    }
}
