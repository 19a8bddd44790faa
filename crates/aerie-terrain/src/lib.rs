//! Procedural terrain for streamed regions: seeded gradient noise, biome-blended
//! elevation, elevation-band coloring, and per-region height/mesh/collider builds.

mod color;
mod error;
mod geometry;
mod gradient;
mod handle;
mod region;
mod settings;
mod synth;

pub mod seed;

pub use color::{BiomeColorizer, ColorBand, Rgb};
pub use error::GenerationError;
pub use geometry::{
    ColliderPolicy, ColliderShape, HeightGrid, RegionGeometry, RegionGeometryBuilder,
    TerrainCollider, TerrainMesh, TerrainVertex,
};
pub use gradient::{GradientNoise, OctaveSet, fbm};
pub use handle::{HandleAllocator, ResourceHandle};
pub use region::{REGION_RESOLUTION, REGION_SIZE, RegionCoord, RegionLayout};
pub use settings::GenerationSettings;
pub use synth::{TerrainHeightSynthesizer, TerrainShape};
