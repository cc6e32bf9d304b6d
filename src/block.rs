use std::fmt;
use std::str::FromStr;

use crate::disk::PhysicalLocation;
use crate::error::{Error, Result};
use crate::record::Record;

const RECORD_SEP: char = '\n';

/// Comparison used by [`Block::find_by_attribute`].
///
/// Values are always compared as strings, byte-wise lexicographically, so
/// `"10" < "5"` and `"9" > "5"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn matches(&self, stored: &str, value: &str) -> bool {
        match self {
            CompareOp::Eq => stored == value,
            CompareOp::Ge => stored >= value,
            CompareOp::Le => stored <= value,
            CompareOp::Gt => stored > value,
            CompareOp::Lt => stored < value,
        }
    }
}

impl FromStr for CompareOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(CompareOp::Eq),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        };
        f.write_str(op)
    }
}

/// Fixed-capacity, insertion-ordered run of records.
///
/// Records are never removed from the sequence; deletes only tombstone them,
/// so `len()` counts tombstoned records as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: u64,
    records: Vec<Record>,
    capacity: usize,
    dirty: bool,
    location: Option<PhysicalLocation>,
}

impl Block {
    pub fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            records: Vec::with_capacity(capacity),
            capacity,
            dirty: false,
            location: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.live_records().count()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn live_records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| !r.is_deleted())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn location(&self) -> Option<PhysicalLocation> {
        self.location
    }

    /// Records where the block was placed. A block is placed exactly once.
    pub fn place(&mut self, location: PhysicalLocation) -> Result<()> {
        if self.location.is_some() {
            return Err(Error::AlreadyPlaced(self.id));
        }
        self.location = Some(location);
        Ok(())
    }

    pub fn has_space(&self) -> bool {
        self.records.len() < self.capacity
    }

    pub fn add_record(&mut self, record: Record) -> Result<()> {
        if !self.has_space() {
            return Err(Error::CapacityExceeded {
                block_id: self.id,
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        self.dirty = true;
        Ok(())
    }

    /// Tombstones the live record with `record_id`.
    pub fn remove_record(&mut self, record_id: u64) -> Result<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id() == record_id && !r.is_deleted())
            .ok_or_else(|| Error::NotFound(format!("record {}", record_id)))?;
        record.mark_deleted();
        self.dirty = true;
        Ok(())
    }

    pub fn find_record(&self, record_id: u64) -> Option<&Record> {
        self.live_records().find(|r| r.id() == record_id)
    }

    pub fn find_by_attribute(&self, attribute: &str, value: &str, op: CompareOp) -> Vec<&Record> {
        self.live_records()
            .filter(|r| r.get(attribute).is_some_and(|stored| op.matches(stored, value)))
            .collect()
    }

    /// Every record, live or tombstoned, each followed by a newline.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&record.encode());
            out.push(RECORD_SEP);
        }
        out.into_bytes()
    }

    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(|r| r.encoded_len() + 1).sum()
    }

    /// Rebuilds a clean block from [`Block::encode`] output.
    pub fn decode(
        id: u64,
        capacity: usize,
        location: Option<PhysicalLocation>,
        bytes: &[u8],
    ) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::MalformedEncoding(format!("block {}: {}", id, e)))?;

        let mut block = Block::new(id, capacity);
        block.location = location;
        for line in text.split(RECORD_SEP).filter(|l| !l.is_empty()) {
            block.add_record(Record::decode(line)?)?;
        }
        block.dirty = false;
        Ok(block)
    }
}
