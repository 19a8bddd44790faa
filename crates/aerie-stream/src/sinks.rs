//! Narrow interfaces to the collaborators the streamer drives.
//!
//! The streamer is the only caller of the sink methods, and it calls them
//! while holding its table lock, so implementations see attach/detach calls
//! in a single consistent order.

use aerie_terrain::{TerrainCollider, TerrainMesh};
use glam::DVec3;

use crate::asset_cache::AssetId;
use crate::error::AssetLoadError;
use crate::scatter::PlacedEntity;

/// The rendering scene: receives meshes and placed entities.
pub trait SceneSink<A>: Send {
    /// Make a region mesh visible.
    fn attach_mesh(&mut self, mesh: &TerrainMesh);
    /// Remove a previously attached mesh.
    fn detach_mesh(&mut self, mesh: &TerrainMesh);
    /// Add a scattered entity to the scene.
    fn attach_entity(&mut self, entity: &PlacedEntity<A>);
    /// Remove a previously attached entity.
    fn detach_entity(&mut self, entity: &PlacedEntity<A>);
}

/// The physics world: receives static terrain colliders.
pub trait PhysicsSink: Send {
    /// Register a collider.
    fn attach_collider(&mut self, collider: &TerrainCollider);
    /// Unregister a previously attached collider.
    fn detach_collider(&mut self, collider: &TerrainCollider);
}

/// Produces instances of external assets (models, props).
pub trait AssetLoader: Send + Sync + 'static {
    /// One instantiated asset.
    type Asset: Send + Sync + 'static;

    /// Load and instantiate the asset `id`. Potentially slow.
    fn instantiate(
        &self,
        id: &AssetId,
    ) -> impl Future<Output = Result<Self::Asset, AssetLoadError>> + Send;

    /// Independent copy of an already loaded asset.
    fn clone_instance(&self, raw: &Self::Asset) -> Self::Asset;
}

/// Anything with a world position the window follows.
pub trait Viewpoint {
    /// Current world position.
    fn position(&self) -> DVec3;
}

impl Viewpoint for DVec3 {
    fn position(&self) -> DVec3 {
        *self
    }
}
