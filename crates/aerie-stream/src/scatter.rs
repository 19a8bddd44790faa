//! Decorative object placement.
//!
//! Ground objects (trees, rocks) are placed in clusters and seated on the
//! region's height grid; atmospheric props (clouds) float above the height
//! range. Placement is planned synchronously from a per-region RNG, so the
//! same region under the same seed and settings always gets the same plan.
//! The plan's asset loads then run concurrently.

use std::f64::consts::TAU;
use std::ops::Range;
use std::sync::Arc;

use aerie_terrain::seed::{det_cos, det_sin, region_rng};
use aerie_terrain::{
    GenerationSettings, HandleAllocator, HeightGrid, RegionCoord, RegionLayout, ResourceHandle,
};
use glam::DVec3;
use rand::Rng;
use tokio::task::JoinSet;
use tracing::{trace, warn};

use crate::asset_cache::{AssetCache, AssetId};
use crate::sinks::AssetLoader;

/// Decorative object density for one generation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PopulationSettings {
    /// Ground clusters per region.
    pub clusters_per_region: u32,
    /// Ground objects attempted per cluster.
    pub objects_per_cluster: u32,
    /// Atmospheric props per region.
    pub clouds_per_region: u32,
}

impl Default for PopulationSettings {
    fn default() -> Self {
        Self {
            clusters_per_region: 1,
            objects_per_cluster: 5,
            clouds_per_region: 2,
        }
    }
}

/// Which models are scattered and how they are sized.
#[derive(Clone, Debug, PartialEq)]
pub struct ScatterCatalog {
    /// Models placed on the ground.
    pub ground_models: Vec<AssetId>,
    /// Models placed in the sky.
    pub cloud_models: Vec<AssetId>,
    /// Uniform scale range for ground objects.
    pub ground_scale: Range<f64>,
    /// Uniform scale range for clouds.
    pub cloud_scale: Range<f64>,
    /// Maximum distance of a ground object from its cluster centre.
    pub cluster_radius: f64,
    /// Height of the lowest cloud above the region's max height.
    pub cloud_base_offset: f64,
    /// Random extra cloud height.
    pub cloud_height_jitter: f64,
}

impl Default for ScatterCatalog {
    fn default() -> Self {
        let ground = [
            "assets/models/tree/TreePine.fbx",
            "assets/models/tree/TreeRound.fbx",
            "assets/models/rock/Rock1.fbx",
            "assets/models/rock/Rock2.fbx",
            "assets/models/rock/Rock3.fbx",
            "assets/models/rock/Rock4.fbx",
            "assets/models/rock/Rock5.fbx",
            "assets/models/rock/Rock6.fbx",
        ];
        let clouds = [
            "assets/models/cloud/Cloud_1.fbx",
            "assets/models/cloud/Cloud_2.fbx",
            "assets/models/cloud/Cloud_3.fbx",
            "assets/models/cloud/Cloud_4.fbx",
        ];
        Self {
            ground_models: ground.into_iter().map(AssetId::from).collect(),
            cloud_models: clouds.into_iter().map(AssetId::from).collect(),
            ground_scale: 0.03..0.055,
            cloud_scale: 0.08..0.13,
            cluster_radius: 10.0,
            cloud_base_offset: 70.0,
            cloud_height_jitter: 50.0,
        }
    }
}

/// Ground-seated or floating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Sits on the terrain surface.
    Ground,
    /// Floats above the terrain, independent of it.
    Atmospheric,
}

/// One planned placement, before its asset is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    /// Model to place.
    pub asset: AssetId,
    /// Ground or atmospheric.
    pub kind: EntityKind,
    /// World position.
    pub position: DVec3,
    /// Uniform scale.
    pub scale: f64,
}

/// A loaded, positioned decorative entity owned by its region.
#[derive(Debug)]
pub struct PlacedEntity<A> {
    /// Identifies the entity in the scene.
    pub handle: ResourceHandle,
    /// Region the entity belongs to.
    pub region: RegionCoord,
    /// Model the instance came from.
    pub asset: AssetId,
    /// Ground or atmospheric.
    pub kind: EntityKind,
    /// World position.
    pub position: DVec3,
    /// Uniform scale.
    pub scale: f64,
    /// The loader's instance.
    pub instance: A,
}

/// Terrain height at a world point by bilinear interpolation of `grid`.
///
/// Points outside the region clamp to its edge.
pub fn terrain_height_at(
    layout: &RegionLayout,
    coord: RegionCoord,
    grid: &HeightGrid,
    world_x: f64,
    world_z: f64,
) -> f64 {
    let origin = layout.origin(coord);
    let cell = layout.cell_size();
    grid.sample_bilinear((world_x - origin.x) / cell, (world_z - origin.y) / cell)
}

/// Plans placements for a region and loads their assets.
pub struct ObjectScatterer<L: AssetLoader> {
    world_seed: u64,
    layout: RegionLayout,
    catalog: Arc<ScatterCatalog>,
    cache: AssetCache<L>,
    handles: Arc<HandleAllocator>,
}

impl<L: AssetLoader> Clone for ObjectScatterer<L> {
    fn clone(&self) -> Self {
        Self {
            world_seed: self.world_seed,
            layout: self.layout,
            catalog: Arc::clone(&self.catalog),
            cache: self.cache.clone(),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl<L: AssetLoader> ObjectScatterer<L> {
    /// Scatterer drawing models through `cache` and entity handles from
    /// `handles`.
    pub fn new(
        world_seed: u64,
        layout: RegionLayout,
        catalog: ScatterCatalog,
        cache: AssetCache<L>,
        handles: Arc<HandleAllocator>,
    ) -> Self {
        Self {
            world_seed,
            layout,
            catalog: Arc::new(catalog),
            cache,
            handles,
        }
    }

    /// The shared asset cache.
    pub fn cache(&self) -> &AssetCache<L> {
        &self.cache
    }

    /// The model catalog.
    pub fn catalog(&self) -> &ScatterCatalog {
        &self.catalog
    }

    /// Deterministic placement plan for one region.
    ///
    /// Ground objects that land outside the region are dropped.
    pub fn plan(
        &self,
        coord: RegionCoord,
        grid: &HeightGrid,
        generation: &GenerationSettings,
        population: &PopulationSettings,
    ) -> Vec<Placement> {
        let catalog = &*self.catalog;
        let layout = &self.layout;
        let origin = layout.origin(coord);
        let mut rng = region_rng(self.world_seed, &coord);
        let mut plan = Vec::new();

        for _ in 0..population.clusters_per_region {
            let cx = origin.x + uniform(&mut rng, 0.0..layout.size);
            let cz = origin.y + uniform(&mut rng, 0.0..layout.size);
            for _ in 0..population.objects_per_cluster {
                let angle = uniform(&mut rng, 0.0..TAU);
                let radius = uniform(&mut rng, 0.0..catalog.cluster_radius);
                let model = pick(&mut rng, &catalog.ground_models);
                let scale = uniform(&mut rng, catalog.ground_scale.clone());

                let x = cx + det_cos(angle) * radius;
                let z = cz + det_sin(angle) * radius;
                let Some(asset) = model else { continue };
                if !layout.contains(coord, x, z) {
                    continue;
                }
                let y = terrain_height_at(layout, coord, grid, x, z);
                plan.push(Placement {
                    asset,
                    kind: EntityKind::Ground,
                    position: DVec3::new(x, y, z),
                    scale,
                });
            }
        }

        for _ in 0..population.clouds_per_region {
            let x = origin.x + uniform(&mut rng, 0.0..layout.size);
            let z = origin.y + uniform(&mut rng, 0.0..layout.size);
            let y = generation.max_height
                + catalog.cloud_base_offset
                + uniform(&mut rng, 0.0..catalog.cloud_height_jitter);
            let model = pick(&mut rng, &catalog.cloud_models);
            let scale = uniform(&mut rng, catalog.cloud_scale.clone());
            if let Some(asset) = model {
                plan.push(Placement {
                    asset,
                    kind: EntityKind::Atmospheric,
                    position: DVec3::new(x, y, z),
                    scale,
                });
            }
        }

        plan
    }

    /// Plan the region and load every placement's asset concurrently.
    ///
    /// Returns once all loads settled, in plan order. Placements whose asset
    /// failed to load are logged and left out.
    pub async fn scatter(
        &self,
        coord: RegionCoord,
        grid: &HeightGrid,
        generation: &GenerationSettings,
        population: &PopulationSettings,
    ) -> Vec<PlacedEntity<L::Asset>> {
        let plan = self.plan(coord, grid, generation, population);
        let planned = plan.len();

        let mut loads = JoinSet::new();
        for (index, placement) in plan.into_iter().enumerate() {
            let cache = self.cache.clone();
            loads.spawn(async move {
                let result = cache.load(&placement.asset).await;
                (index, placement, result)
            });
        }

        let mut loaded = Vec::with_capacity(planned);
        while let Some(joined) = loads.join_next().await {
            match joined {
                Ok((index, placement, Ok(instance))) => loaded.push((index, placement, instance)),
                Ok((_, placement, Err(err))) => {
                    warn!(region = %coord, asset = %placement.asset, error = %err, "Skipping placement");
                }
                Err(err) => {
                    warn!(region = %coord, error = %err, "Placement task failed");
                }
            }
        }
        loaded.sort_by_key(|(index, _, _)| *index);

        trace!(region = %coord, planned, placed = loaded.len(), "Scattered region");

        loaded
            .into_iter()
            .map(|(_, placement, instance)| PlacedEntity {
                handle: self.handles.next_handle(),
                region: coord,
                asset: placement.asset,
                kind: placement.kind,
                position: placement.position,
                scale: placement.scale,
                instance,
            })
            .collect()
    }
}

/// Uniform sample from `range`, or its start when the range is empty.
fn uniform(rng: &mut impl Rng, range: Range<f64>) -> f64 {
    if range.start < range.end {
        rng.random_range(range)
    } else {
        range.start
    }
}

fn pick(rng: &mut impl Rng, models: &[AssetId]) -> Option<AssetId> {
    if models.is_empty() {
        return None;
    }
    Some(models[rng.random_range(0..models.len())].clone())
}
