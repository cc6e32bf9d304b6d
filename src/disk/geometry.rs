//! Platter → surface → track → sector topology.
//!
//! Sectors are stored in one flat table laid out in depth-first order, so a
//! single forward pass over the table visits sectors in exactly the order a
//! nested platter/surface/track walk would. The `Platter`, `Surface` and
//! `Track` types are borrowed views that recover the hierarchical addressing.

use crate::config::DiskConfig;
use crate::disk::location::PhysicalLocation;
use crate::disk::sector::Sector;

pub struct Geometry {
    platters: u32,
    surfaces_per_platter: u32,
    tracks_per_surface: u32,
    sectors_per_track: u32,
    sector_capacity: usize,
    sectors: Vec<Sector>,
}

impl Geometry {
    pub fn new(config: &DiskConfig) -> Self {
        let mut sectors = Vec::with_capacity(config.sector_count());
        for _ in 0..config.sector_count() / config.sectors_per_track.max(1) as usize {
            for k in 0..config.sectors_per_track {
                sectors.push(Sector::new(k, config.sector_capacity));
            }
        }

        Self {
            platters: config.platters,
            surfaces_per_platter: config.surfaces_per_platter,
            tracks_per_surface: config.tracks_per_surface,
            sectors_per_track: config.sectors_per_track,
            sector_capacity: config.sector_capacity,
            sectors,
        }
    }

    pub fn sector_capacity(&self) -> usize {
        self.sector_capacity
    }

    /// All sectors in depth-first order.
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn total_capacity(&self) -> u64 {
        self.sectors.len() as u64 * self.sector_capacity as u64
    }

    pub fn used_capacity(&self) -> u64 {
        self.sectors.iter().map(|s| s.used() as u64).sum()
    }

    pub fn platters(&self) -> impl Iterator<Item = Platter<'_>> {
        (0..self.platters).map(move |id| Platter { geometry: self, id })
    }

    pub fn platter(&self, id: u32) -> Option<Platter<'_>> {
        (id < self.platters).then_some(Platter { geometry: self, id })
    }

    /// First-fit search: the first sector in depth-first order with room for
    /// `required` more bytes. The returned offset is that sector's current fill.
    pub fn find_with_space(&self, required: usize) -> Option<PhysicalLocation> {
        let idx = self.sectors.iter().position(|s| s.has_space(required))?;
        Some(self.location_of(idx, self.sectors[idx].used()))
    }

    pub fn sector(&self, loc: &PhysicalLocation) -> Option<&Sector> {
        self.index_of(loc).map(|idx| &self.sectors[idx])
    }

    pub fn sector_mut(&mut self, loc: &PhysicalLocation) -> Option<&mut Sector> {
        self.index_of(loc).map(move |idx| &mut self.sectors[idx])
    }

    fn index_of(&self, loc: &PhysicalLocation) -> Option<usize> {
        if loc.platter >= self.platters
            || loc.surface >= self.surfaces_per_platter
            || loc.track >= self.tracks_per_surface
            || loc.sector >= self.sectors_per_track
        {
            return None;
        }
        Some(self.flat_index(loc.platter, loc.surface, loc.track, loc.sector))
    }

    fn flat_index(&self, platter: u32, surface: u32, track: u32, sector: u32) -> usize {
        let surfaces = self.surfaces_per_platter as usize;
        let tracks = self.tracks_per_surface as usize;
        let sectors = self.sectors_per_track as usize;
        ((platter as usize * surfaces + surface as usize) * tracks + track as usize) * sectors
            + sector as usize
    }

    fn location_of(&self, idx: usize, offset: usize) -> PhysicalLocation {
        let sectors = self.sectors_per_track as usize;
        let tracks = self.tracks_per_surface as usize;
        let surfaces = self.surfaces_per_platter as usize;
        PhysicalLocation {
            platter: (idx / (sectors * tracks * surfaces)) as u32,
            surface: ((idx / (sectors * tracks)) % surfaces) as u32,
            track: ((idx / sectors) % tracks) as u32,
            sector: (idx % sectors) as u32,
            offset,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Platter<'a> {
    geometry: &'a Geometry,
    id: u32,
}

impl<'a> Platter<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn surfaces(&self) -> impl Iterator<Item = Surface<'a>> {
        let (geometry, platter) = (self.geometry, self.id);
        (0..geometry.surfaces_per_platter).map(move |id| Surface {
            geometry,
            platter,
            id,
        })
    }

    /// First surface holding a sector with room for `required` bytes.
    pub fn find_with_space(&self, required: usize) -> Option<Surface<'a>> {
        self.surfaces()
            .find(|surface| surface.find_with_space(required).is_some())
    }
}

#[derive(Clone, Copy)]
pub struct Surface<'a> {
    geometry: &'a Geometry,
    platter: u32,
    id: u32,
}

impl<'a> Surface<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn tracks(&self) -> impl Iterator<Item = Track<'a>> {
        let (geometry, platter, surface) = (self.geometry, self.platter, self.id);
        (0..geometry.tracks_per_surface).map(move |id| Track {
            geometry,
            platter,
            surface,
            id,
        })
    }

    /// First track holding a sector with room for `required` bytes.
    pub fn find_with_space(&self, required: usize) -> Option<Track<'a>> {
        self.tracks()
            .find(|track| track.find_with_space(required).is_some())
    }
}

#[derive(Clone, Copy)]
pub struct Track<'a> {
    geometry: &'a Geometry,
    platter: u32,
    surface: u32,
    id: u32,
}

impl<'a> Track<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn sectors(&self) -> &'a [Sector] {
        let start = self
            .geometry
            .flat_index(self.platter, self.surface, self.id, 0);
        &self.geometry.sectors[start..start + self.geometry.sectors_per_track as usize]
    }

    /// First sector with room for `required` bytes.
    pub fn find_with_space(&self, required: usize) -> Option<&'a Sector> {
        self.sectors().iter().find(|sector| sector.has_space(required))
    }
}
