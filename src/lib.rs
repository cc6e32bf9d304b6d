//! Simulated storage layer: a fixed platter/surface/track/sector geometry,
//! record blocks placed on it first-fit, and a bounded buffer pool with
//! write-back.

pub mod block;
pub mod cache;
pub mod config;
pub mod disk;
pub mod error;
pub mod format;
pub mod hasher;
pub mod record;
pub mod store;

pub use block::{Block, CompareOp};
pub use cache::{BufferManager, CachedBlock, WriteBack};
pub use config::DiskConfig;
pub use disk::{DiskManager, PhysicalLocation};
pub use error::{Error, Result};
pub use hasher::Hasher;
pub use record::Record;
pub use store::{BlockOccupancy, Located, Placement, Store, Usage};
