//! Headless stand-ins for the scene, physics world and model loader.

use std::time::Duration;

use aerie_stream::{AssetId, AssetLoadError, AssetLoader, PhysicsSink, PlacedEntity, SceneSink};
use aerie_terrain::{ColliderShape, TerrainCollider, TerrainMesh};
use tracing::{debug, trace};

/// A procedurally built prop standing in for a loaded model.
#[derive(Debug)]
pub struct Prop {
    /// Model the prop was built from.
    pub model: AssetId,
    /// Triangle count of the stand-in geometry.
    pub triangles: u32,
}

/// Builds props after a simulated disk latency.
pub struct PropLoader {
    latency: Duration,
}

impl PropLoader {
    /// Loader that takes `latency` per model.
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl AssetLoader for PropLoader {
    type Asset = Prop;

    async fn instantiate(&self, id: &AssetId) -> Result<Prop, AssetLoadError> {
        tokio::time::sleep(self.latency).await;
        let name = id.as_str();
        let triangles = if name.contains("/tree/") {
            640
        } else if name.contains("/rock/") {
            96
        } else if name.contains("/cloud/") {
            220
        } else {
            return Err(AssetLoadError::NotFound { id: id.clone() });
        };
        debug!(model = %id, triangles, "Loaded prop model");
        Ok(Prop {
            model: id.clone(),
            triangles,
        })
    }

    fn clone_instance(&self, raw: &Prop) -> Prop {
        Prop {
            model: raw.model.clone(),
            triangles: raw.triangles,
        }
    }
}

/// Scene that counts what is attached.
#[derive(Debug, Default)]
pub struct LoggingScene {
    /// Meshes currently attached.
    pub meshes: usize,
    /// Entities currently attached.
    pub entities: usize,
    /// Triangles currently attached, terrain and props.
    pub triangles: u64,
}

impl SceneSink<Prop> for LoggingScene {
    fn attach_mesh(&mut self, mesh: &TerrainMesh) {
        self.meshes += 1;
        self.triangles += mesh.triangle_count() as u64;
        trace!(region = %mesh.region, handle = %mesh.handle, "Mesh attached");
    }

    fn detach_mesh(&mut self, mesh: &TerrainMesh) {
        self.meshes -= 1;
        self.triangles -= mesh.triangle_count() as u64;
        trace!(region = %mesh.region, handle = %mesh.handle, "Mesh detached");
    }

    fn attach_entity(&mut self, entity: &PlacedEntity<Prop>) {
        self.entities += 1;
        self.triangles += u64::from(entity.instance.triangles);
    }

    fn detach_entity(&mut self, entity: &PlacedEntity<Prop>) {
        self.entities -= 1;
        self.triangles -= u64::from(entity.instance.triangles);
    }
}

/// Physics world that counts colliders and heightfield cells.
#[derive(Debug, Default)]
pub struct LoggingPhysics {
    /// Colliders currently attached.
    pub colliders: usize,
    /// Heightfield cells currently attached.
    pub cells: usize,
}

fn cell_count(collider: &TerrainCollider) -> usize {
    match &collider.shape {
        ColliderShape::Heightfield { heights, .. } => heights.resolution() * heights.resolution(),
        ColliderShape::Plane { .. } => 0,
    }
}

impl PhysicsSink for LoggingPhysics {
    fn attach_collider(&mut self, collider: &TerrainCollider) {
        self.colliders += 1;
        self.cells += cell_count(collider);
    }

    fn detach_collider(&mut self, collider: &TerrainCollider) {
        self.colliders -= 1;
        self.cells -= cell_count(collider);
    }
}
