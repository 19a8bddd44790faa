//! Conversion from the persisted configuration into streamer parameters.

use aerie_config::{ColliderPolicyConfig, Config, PopulationConfig, TerrainConfig};
use aerie_terrain::{ColliderPolicy, GenerationSettings, RegionLayout, TerrainShape};

use crate::scatter::{PopulationSettings, ScatterCatalog};

/// Fixed parameters of one streaming session.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamerConfig {
    /// Seed for terrain noise and object placement.
    pub world_seed: u64,
    /// Region size and resolution.
    pub layout: RegionLayout,
    /// Window radius in regions.
    pub view_distance: u32,
    /// How region colliders are shaped.
    pub collider_policy: ColliderPolicy,
    /// Elevation synthesis parameters.
    pub shape: TerrainShape,
    /// Scattered models.
    pub catalog: ScatterCatalog,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            world_seed: 42,
            layout: RegionLayout::default(),
            view_distance: 2,
            collider_policy: ColliderPolicy::default(),
            shape: TerrainShape::default(),
            catalog: ScatterCatalog::default(),
        }
    }
}

impl StreamerConfig {
    /// Session parameters from the `streaming` and `terrain` sections.
    pub fn from_config(config: &Config) -> Self {
        let streaming = &config.streaming;
        let terrain = &config.terrain;
        Self {
            world_seed: streaming.seed,
            layout: RegionLayout::new(streaming.region_size, streaming.region_resolution as usize),
            view_distance: streaming.view_distance,
            collider_policy: match streaming.collider_policy {
                ColliderPolicyConfig::Heightfield => ColliderPolicy::Heightfield,
                ColliderPolicyConfig::FlatPlane => ColliderPolicy::FlatPlane,
            },
            shape: TerrainShape {
                mountain_threshold: terrain.mountain_threshold,
                blend_width: terrain.blend_width,
                river_threshold: terrain.river_threshold,
                river_depth: terrain.river_depth,
                ..TerrainShape::default()
            },
            catalog: ScatterCatalog::default(),
        }
    }
}

/// Height mapping snapshot from the `terrain` section.
pub fn generation_settings(terrain: &TerrainConfig) -> GenerationSettings {
    GenerationSettings {
        max_height: terrain.max_height,
        min_height: terrain.min_height,
        noise_input_scale: terrain.noise_input_scale,
    }
}

impl From<&PopulationConfig> for PopulationSettings {
    fn from(population: &PopulationConfig) -> Self {
        Self {
            clusters_per_region: population.clusters_per_region,
            objects_per_cluster: population.objects_per_cluster,
            clouds_per_region: population.clouds_per_region,
        }
    }
}
