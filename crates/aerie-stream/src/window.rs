//! The square window of regions kept around the viewpoint.

use aerie_terrain::RegionCoord;

/// Regions within Chebyshev distance `radius` of `center`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionWindow {
    /// Region containing the viewpoint.
    pub center: RegionCoord,
    /// View distance in regions.
    pub radius: u32,
}

impl RegionWindow {
    /// Create a window.
    pub const fn new(center: RegionCoord, radius: u32) -> Self {
        Self { center, radius }
    }

    /// Whether `coord` lies inside the window.
    pub fn contains(&self, coord: RegionCoord) -> bool {
        self.center.chebyshev_distance(&coord) <= self.radius
    }

    /// Number of regions in a window of this radius, `(2r + 1)²`.
    ///
    /// A window clamped against the grid edge holds fewer, see [`coords`](Self::coords).
    pub fn region_count(&self) -> usize {
        let edge = 2 * self.radius as usize + 1;
        edge * edge
    }

    /// Every region of the window, nearest to the centre first.
    ///
    /// Ties are broken by coordinate so the order is stable. Offsets that
    /// saturate at the grid edge collapse onto one coordinate.
    pub fn coords(&self) -> Vec<RegionCoord> {
        let r = self.radius as i32;
        let mut coords = Vec::with_capacity(self.region_count());
        for dz in -r..=r {
            for dx in -r..=r {
                coords.push(self.center.offset(dx, dz));
            }
        }
        coords.sort_by_key(|c| (self.center.distance_sq(c), *c));
        coords.dedup();
        coords
    }
}
