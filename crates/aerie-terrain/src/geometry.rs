//! Per-region height grid, render mesh and collider construction.
//!
//! [`RegionGeometryBuilder::build`] is CPU-bound and synchronous; callers that
//! cannot block run it on a blocking worker.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::{DVec3, Vec3};
use tracing::trace;

use crate::color::BiomeColorizer;
use crate::error::GenerationError;
use crate::handle::{HandleAllocator, ResourceHandle};
use crate::region::{RegionCoord, RegionLayout};
use crate::settings::GenerationSettings;
use crate::synth::TerrainHeightSynthesizer;

// ---------------------------------------------------------------------------
// Height grid
// ---------------------------------------------------------------------------

/// Square grid of world heights indexed `[row][col]`.
///
/// Rows advance along world +Z, columns along world +X. Sample `[0][0]` sits
/// at the region's min corner.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightGrid {
    samples_per_edge: usize,
    heights: Vec<f64>,
}

impl HeightGrid {
    /// Build a grid by evaluating `f(row, col)` for every sample.
    pub fn from_fn(samples_per_edge: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let samples_per_edge = samples_per_edge.max(1);
        let mut heights = Vec::with_capacity(samples_per_edge * samples_per_edge);
        for row in 0..samples_per_edge {
            for col in 0..samples_per_edge {
                heights.push(f(row, col));
            }
        }
        Self {
            samples_per_edge,
            heights,
        }
    }

    /// Grid with every sample at `height`.
    pub fn flat(samples_per_edge: usize, height: f64) -> Self {
        Self::from_fn(samples_per_edge, |_, _| height)
    }

    /// Samples along one edge.
    pub fn samples_per_edge(&self) -> usize {
        self.samples_per_edge
    }

    /// Cells along one edge.
    pub fn resolution(&self) -> usize {
        self.samples_per_edge - 1
    }

    /// All samples in row-major order.
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Sample at `(row, col)`, or `None` when out of range or not finite.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.samples_per_edge || col >= self.samples_per_edge {
            return None;
        }
        let h = self.heights[row * self.samples_per_edge + col];
        h.is_finite().then_some(h)
    }

    /// One row of samples.
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let start = row.checked_mul(self.samples_per_edge)?;
        self.heights.get(start..start + self.samples_per_edge)
    }

    /// Lowest and highest finite samples.
    pub fn min_max(&self) -> (f64, f64) {
        self.heights
            .iter()
            .filter(|h| h.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// Bilinear interpolation at fractional grid indices.
    ///
    /// Indices are clamped to `[0, resolution]`. If any of the four
    /// neighbouring samples is undefined the origin sample is returned
    /// instead (0 if that too is undefined).
    pub fn sample_bilinear(&self, frac_col: f64, frac_row: f64) -> f64 {
        let max = self.resolution() as f64;
        let fc = if frac_col.is_nan() { 0.0 } else { frac_col.clamp(0.0, max) };
        let fr = if frac_row.is_nan() { 0.0 } else { frac_row.clamp(0.0, max) };

        let c0 = fc.floor() as usize;
        let r0 = fr.floor() as usize;
        let c1 = (c0 + 1).min(self.resolution());
        let r1 = (r0 + 1).min(self.resolution());
        let tc = fc - c0 as f64;
        let tr = fr - r0 as f64;

        let corners = (
            self.get(r0, c0),
            self.get(r0, c1),
            self.get(r1, c0),
            self.get(r1, c1),
        );
        let (Some(h00), Some(h01), Some(h10), Some(h11)) = corners else {
            return self.get(0, 0).unwrap_or(0.0);
        };

        let near = h00 + (h01 - h00) * tc;
        let far = h10 + (h11 - h10) * tc;
        near + (far - near) * tr
    }
}

// ---------------------------------------------------------------------------
// Mesh
// ---------------------------------------------------------------------------

/// One vertex of a region mesh, positioned relative to the region centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainVertex {
    /// Local position; `y` is the world height.
    pub position: [f32; 3],
    /// Unit surface normal, Y-up.
    pub normal: [f32; 3],
    /// Linear RGB vertex color.
    pub color: [f32; 3],
}

/// Indexed triangle mesh for one region.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainMesh {
    /// Identifies this mesh in the scene.
    pub handle: ResourceHandle,
    /// Region the mesh belongs to.
    pub region: RegionCoord,
    /// World translation of the mesh origin (the region centre at y = 0).
    pub translation: DVec3,
    /// `(resolution + 1)²` vertices in grid order.
    pub vertices: Vec<TerrainVertex>,
    /// Two counter-clockwise (seen from +Y) triangles per cell.
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

// ---------------------------------------------------------------------------
// Collider
// ---------------------------------------------------------------------------

/// How region colliders are shaped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColliderPolicy {
    /// Heightfield matching the rendered surface.
    #[default]
    Heightfield,
    /// Horizontal plane at world y = 0.
    FlatPlane,
}

/// Collision geometry handed to the physics collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum ColliderShape {
    /// Heights on a regular grid, shared with the region's mesh build.
    Heightfield {
        /// The region's height grid.
        heights: Arc<HeightGrid>,
        /// Distance between neighbouring samples.
        element_size: f64,
    },
    /// Infinite horizontal plane.
    Plane {
        /// World height of the plane.
        height: f64,
    },
}

/// Collider for one region.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainCollider {
    /// Identifies this collider in the physics world.
    pub handle: ResourceHandle,
    /// Region the collider belongs to.
    pub region: RegionCoord,
    /// World position of the shape origin (grid min corner for heightfields).
    pub origin: DVec3,
    /// The shape itself.
    pub shape: ColliderShape,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Everything generated for one region before population.
#[derive(Clone, Debug)]
pub struct RegionGeometry {
    /// The region.
    pub coord: RegionCoord,
    /// World heights, shared with the heightfield collider.
    pub grid: Arc<HeightGrid>,
    /// Render mesh.
    pub mesh: TerrainMesh,
    /// Collision shape.
    pub collider: TerrainCollider,
}

impl RegionGeometry {
    /// Hash of the generated heights, colors and topology.
    ///
    /// Handles are excluded, so two builds of the same region under the same
    /// seed and settings hash equal.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.coord.hash(&mut hasher);
        for h in self.grid.heights() {
            h.to_bits().hash(&mut hasher);
        }
        for v in &self.mesh.vertices {
            for c in v.color {
                c.to_bits().hash(&mut hasher);
            }
        }
        self.mesh.indices.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builds the height grid, mesh and collider of a region.
#[derive(Clone, Debug)]
pub struct RegionGeometryBuilder {
    synth: TerrainHeightSynthesizer,
    colorizer: BiomeColorizer,
    layout: RegionLayout,
    collider_policy: ColliderPolicy,
}

impl RegionGeometryBuilder {
    /// Builder with the default collider policy.
    pub fn new(
        synth: TerrainHeightSynthesizer,
        colorizer: BiomeColorizer,
        layout: RegionLayout,
    ) -> Self {
        Self {
            synth,
            colorizer,
            layout,
            collider_policy: ColliderPolicy::default(),
        }
    }

    /// Same builder producing colliders under `policy`.
    pub fn with_collider_policy(mut self, policy: ColliderPolicy) -> Self {
        self.collider_policy = policy;
        self
    }

    /// Region geometry shared by every build.
    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// Collider policy in use.
    pub fn collider_policy(&self) -> ColliderPolicy {
        self.collider_policy
    }

    /// The elevation function.
    pub fn synthesizer(&self) -> &TerrainHeightSynthesizer {
        &self.synth
    }

    /// Generate the region at `coord` under `settings`.
    pub fn build(
        &self,
        coord: RegionCoord,
        settings: &GenerationSettings,
        handles: &HandleAllocator,
    ) -> Result<RegionGeometry, GenerationError> {
        settings.validate()?;

        let layout = &self.layout;
        let res = layout.resolution;
        let samples = layout.samples_per_edge();
        let origin = layout.origin(coord);
        let center = layout.center(coord);

        let mut elevations = Vec::with_capacity(samples * samples);
        let mut heights = Vec::with_capacity(samples * samples);
        for row in 0..samples {
            let world_z = origin.y + layout.size * row as f64 / res as f64;
            for col in 0..samples {
                let world_x = origin.x + layout.size * col as f64 / res as f64;
                let elevation =
                    self.synth
                        .elevation(world_x, world_z, settings.noise_input_scale);
                let height = settings.to_height(elevation);
                if !height.is_finite() {
                    return Err(GenerationError::NonFiniteHeight {
                        region: coord,
                        row,
                        col,
                    });
                }
                elevations.push(elevation);
                heights.push(height);
            }
        }
        let grid = Arc::new(HeightGrid {
            samples_per_edge: samples,
            heights,
        });

        let cell = layout.cell_size();
        let half = layout.size * 0.5;
        let normals = grid_normals(&grid, cell);
        let mut vertices = Vec::with_capacity(samples * samples);
        for row in 0..samples {
            for col in 0..samples {
                let i = row * samples + col;
                let x = layout.size * col as f64 / res as f64 - half;
                let z = layout.size * row as f64 / res as f64 - half;
                vertices.push(TerrainVertex {
                    position: [x as f32, grid.heights[i] as f32, z as f32],
                    normal: normals[i].to_array(),
                    color: self.colorizer.color_of(elevations[i]).to_array(),
                });
            }
        }

        let mesh = TerrainMesh {
            handle: handles.next_handle(),
            region: coord,
            translation: DVec3::new(center.x, 0.0, center.y),
            vertices,
            indices: grid_indices(res),
        };

        let collider = match self.collider_policy {
            ColliderPolicy::Heightfield => TerrainCollider {
                handle: handles.next_handle(),
                region: coord,
                origin: DVec3::new(origin.x, 0.0, origin.y),
                shape: ColliderShape::Heightfield {
                    heights: Arc::clone(&grid),
                    element_size: cell,
                },
            },
            ColliderPolicy::FlatPlane => TerrainCollider {
                handle: handles.next_handle(),
                region: coord,
                origin: DVec3::new(center.x, 0.0, center.y),
                shape: ColliderShape::Plane { height: 0.0 },
            },
        };

        trace!(
            region = %coord,
            vertices = mesh.vertices.len(),
            triangles = mesh.triangle_count(),
            "Built region geometry"
        );

        Ok(RegionGeometry {
            coord,
            grid,
            mesh,
            collider,
        })
    }
}

/// Per-sample normals from finite differences of the grid.
///
/// Central differences inside the grid, one-sided on the edges.
pub(crate) fn grid_normals(grid: &HeightGrid, cell_size: f64) -> Vec<Vec3> {
    let n = grid.samples_per_edge;
    let at = |row: usize, col: usize| grid.heights[row * n + col];
    let slope = |lo: usize, hi: usize, h_lo: f64, h_hi: f64| {
        if hi == lo {
            0.0
        } else {
            (h_hi - h_lo) / ((hi - lo) as f64 * cell_size)
        }
    };

    let mut normals = Vec::with_capacity(n * n);
    for row in 0..n {
        let (r_lo, r_hi) = (row.saturating_sub(1), (row + 1).min(n - 1));
        for col in 0..n {
            let (c_lo, c_hi) = (col.saturating_sub(1), (col + 1).min(n - 1));
            let dhdx = slope(c_lo, c_hi, at(row, c_lo), at(row, c_hi));
            let dhdz = slope(r_lo, r_hi, at(r_lo, col), at(r_hi, col));
            let normal = Vec3::new(-dhdx as f32, 1.0, -dhdz as f32).normalize();
            normals.push(normal);
        }
    }
    normals
}

/// Index buffer for a `resolution × resolution` cell grid.
pub(crate) fn grid_indices(resolution: usize) -> Vec<u32> {
    let samples = resolution + 1;
    let mut indices = Vec::with_capacity(resolution * resolution * 6);
    for row in 0..resolution {
        for col in 0..resolution {
            let i0 = (row * samples + col) as u32;
            let i1 = i0 + 1;
            let i2 = i0 + samples as u32;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }
    indices
}
