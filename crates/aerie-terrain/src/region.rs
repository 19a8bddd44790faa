//! Region coordinates on the infinite terrain grid.

use std::fmt;

use glam::DVec2;

/// Default edge length of one region in world units.
pub const REGION_SIZE: f64 = 200.0;

/// Default number of cells along one region edge.
pub const REGION_RESOLUTION: usize = 60;

/// Integer address of a region. Region `(x, z)` is centred on world
/// `(x * size, z * size)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    /// Index along world X.
    pub x: i32,
    /// Index along world Z.
    pub z: i32,
}

impl RegionCoord {
    /// Create a coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The region whose square contains world point `(world_x, world_z)`.
    ///
    /// Points beyond the `i32` index range clamp to the outermost region.
    pub fn containing(world_x: f64, world_z: f64, region_size: f64) -> Self {
        Self {
            x: (world_x / region_size + 0.5).floor() as i32,
            z: (world_z / region_size + 0.5).floor() as i32,
        }
    }

    /// Coordinate shifted by `(dx, dz)` regions, saturating at the grid edge.
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            z: self.z.saturating_add(dz),
        }
    }

    /// Whether either index sits on the `i32` limit, where [`offset`](Self::offset)
    /// stops moving.
    pub const fn is_at_grid_edge(&self) -> bool {
        self.x == i32::MIN || self.x == i32::MAX || self.z == i32::MIN || self.z == i32::MAX
    }

    /// Chebyshev (square-ring) distance in regions.
    pub fn chebyshev_distance(&self, other: &RegionCoord) -> u32 {
        self.x.abs_diff(other.x).max(self.z.abs_diff(other.z))
    }

    /// Squared Euclidean distance in regions.
    pub fn distance_sq(&self, other: &RegionCoord) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dz = self.z.abs_diff(other.z) as u64;
        dx * dx + dz * dz
    }
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Geometry shared by every region: edge length and sample resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegionLayout {
    /// Edge length in world units.
    pub size: f64,
    /// Cells per edge; each edge has `resolution + 1` samples.
    pub resolution: usize,
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            size: REGION_SIZE,
            resolution: REGION_RESOLUTION,
        }
    }
}

impl RegionLayout {
    /// Create a layout. A zero resolution is raised to one cell.
    pub fn new(size: f64, resolution: usize) -> Self {
        Self {
            size,
            resolution: resolution.max(1),
        }
    }

    /// World distance between neighbouring samples.
    pub fn cell_size(&self) -> f64 {
        self.size / self.resolution as f64
    }

    /// Samples along one edge of the height grid.
    pub fn samples_per_edge(&self) -> usize {
        self.resolution + 1
    }

    /// World `(x, z)` of the region centre.
    pub fn center(&self, coord: RegionCoord) -> DVec2 {
        DVec2::new(coord.x as f64 * self.size, coord.z as f64 * self.size)
    }

    /// World `(x, z)` of the grid's `[0][0]` sample (the min corner).
    pub fn origin(&self, coord: RegionCoord) -> DVec2 {
        self.center(coord) - DVec2::splat(self.size * 0.5)
    }

    /// Whether `(world_x, world_z)` lies inside the region's closed bounds.
    pub fn contains(&self, coord: RegionCoord, world_x: f64, world_z: f64) -> bool {
        let min = self.origin(coord);
        let max = min + DVec2::splat(self.size);
        (min.x..=max.x).contains(&world_x) && (min.y..=max.y).contains(&world_z)
    }

    /// Region containing the world point under this layout.
    pub fn region_at(&self, world_x: f64, world_z: f64) -> RegionCoord {
        RegionCoord::containing(world_x, world_z, self.size)
    }
}
