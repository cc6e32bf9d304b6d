pub mod geometry;
pub mod location;
pub mod manager;
pub mod sector;

pub use geometry::{Geometry, Platter, Surface, Track};
pub use location::PhysicalLocation;
pub use manager::{BlockDirectory, DiskManager};
pub use sector::Sector;
