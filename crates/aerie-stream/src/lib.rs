//! Region streaming around a moving viewpoint.
//!
//! [`RegionStreamer`] keeps the square window of regions around the viewpoint
//! generated, populated and attached to the scene and physics collaborators,
//! and evicts regions that leave the window. Generation runs on background
//! tasks; results that arrive after their region stopped being wanted are
//! dropped without touching the collaborators.

mod asset_cache;
mod config;
mod error;
mod scatter;
mod sinks;
mod streamer;
mod window;

pub use asset_cache::{AssetCache, AssetId};
pub use config::{StreamerConfig, generation_settings};
pub use error::AssetLoadError;
pub use scatter::{
    EntityKind, ObjectScatterer, PlacedEntity, Placement, PopulationSettings, ScatterCatalog,
    terrain_height_at,
};
pub use sinks::{AssetLoader, PhysicsSink, SceneSink, Viewpoint};
pub use streamer::{RegionStatus, RegionStreamer, StreamStats};
pub use window::RegionWindow;
