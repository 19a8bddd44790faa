//! Tests for the region streaming manager.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use aerie_terrain::{RegionLayout, ResourceHandle};
use glam::DVec3;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use super::*;
use crate::asset_cache::AssetId;
use crate::error::AssetLoadError;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Asset instance that tracks how many instances are alive.
#[derive(Debug)]
struct TestAsset {
    live: Arc<AtomicUsize>,
}

impl Drop for TestAsset {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loader whose loads can be held back until a gate opens, or whose first
/// load can panic.
struct TestLoader {
    live: Arc<AtomicUsize>,
    gate: Option<watch::Receiver<bool>>,
    crash_next: AtomicBool,
}

impl TestLoader {
    fn new(live: Arc<AtomicUsize>) -> Self {
        Self {
            live,
            gate: None,
            crash_next: AtomicBool::new(false),
        }
    }

    fn gated(live: Arc<AtomicUsize>, gate: watch::Receiver<bool>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(live)
        }
    }

    fn crashing_once(live: Arc<AtomicUsize>) -> Self {
        Self {
            crash_next: AtomicBool::new(true),
            ..Self::new(live)
        }
    }

    fn make(&self) -> TestAsset {
        self.live.fetch_add(1, Ordering::SeqCst);
        TestAsset {
            live: Arc::clone(&self.live),
        }
    }
}

impl AssetLoader for TestLoader {
    type Asset = TestAsset;

    async fn instantiate(&self, id: &AssetId) -> Result<TestAsset, AssetLoadError> {
        if self.crash_next.swap(false, Ordering::SeqCst) {
            panic!("model {id} is corrupt");
        }
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }
        Ok(self.make())
    }

    fn clone_instance(&self, _raw: &TestAsset) -> TestAsset {
        self.make()
    }
}

/// Scene that rejects double attaches and unknown detaches.
#[derive(Default)]
struct RecordingScene {
    meshes: FxHashMap<ResourceHandle, RegionCoord>,
    entities: FxHashMap<ResourceHandle, RegionCoord>,
    mesh_attaches: usize,
    mesh_detaches: usize,
}

impl RecordingScene {
    fn mesh_regions(&self) -> Vec<RegionCoord> {
        let mut regions: Vec<RegionCoord> = self.meshes.values().copied().collect();
        regions.sort();
        regions
    }
}

impl SceneSink<TestAsset> for RecordingScene {
    fn attach_mesh(&mut self, mesh: &TerrainMesh) {
        assert!(
            self.meshes.insert(mesh.handle, mesh.region).is_none(),
            "mesh {} attached twice",
            mesh.handle
        );
        assert_eq!(
            self.meshes.values().filter(|r| **r == mesh.region).count(),
            1,
            "two meshes for region {}",
            mesh.region
        );
        self.mesh_attaches += 1;
    }

    fn detach_mesh(&mut self, mesh: &TerrainMesh) {
        assert!(
            self.meshes.remove(&mesh.handle).is_some(),
            "detach of unknown mesh {}",
            mesh.handle
        );
        self.mesh_detaches += 1;
    }

    fn attach_entity(&mut self, entity: &PlacedEntity<TestAsset>) {
        assert!(self.entities.insert(entity.handle, entity.region).is_none());
    }

    fn detach_entity(&mut self, entity: &PlacedEntity<TestAsset>) {
        assert!(self.entities.remove(&entity.handle).is_some());
    }
}

#[derive(Default)]
struct RecordingPhysics {
    colliders: FxHashMap<ResourceHandle, RegionCoord>,
    attaches: usize,
}

impl PhysicsSink for RecordingPhysics {
    fn attach_collider(&mut self, collider: &TerrainCollider) {
        assert!(
            self.colliders
                .insert(collider.handle, collider.region)
                .is_none()
        );
        self.attaches += 1;
    }

    fn detach_collider(&mut self, collider: &TerrainCollider) {
        assert!(self.colliders.remove(&collider.handle).is_some());
    }
}

type TestStreamer = RegionStreamer<RecordingScene, RecordingPhysics, TestLoader>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn small_config(view_distance: u32) -> StreamerConfig {
    StreamerConfig {
        layout: RegionLayout::new(200.0, 8),
        view_distance,
        ..StreamerConfig::default()
    }
}

fn streamer_with(config: StreamerConfig, loader: TestLoader) -> TestStreamer {
    RegionStreamer::new(
        config,
        loader,
        RecordingScene::default(),
        RecordingPhysics::default(),
    )
}

fn clouds_only(count: u32) -> PopulationSettings {
    PopulationSettings {
        clusters_per_region: 0,
        objects_per_cluster: 0,
        clouds_per_region: count,
    }
}

fn at(x: f64, z: f64) -> DVec3 {
    DVec3::new(x, 100.0, z)
}

fn window_coords(center: RegionCoord, radius: u32) -> Vec<RegionCoord> {
    let mut coords = RegionWindow::new(center, radius).coords();
    coords.sort();
    coords
}

async fn wait_for_pending(streamer: &TestStreamer, count: usize) {
    while streamer.pending_count().await < count {
        tokio::task::yield_now().await;
    }
}

async fn wait_until_settled(streamer: &TestStreamer) {
    while streamer.pending_count().await > 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Every live asset instance is owned by an active region or held raw by
/// the cache, and the collaborators hold exactly the active regions.
async fn assert_balanced(streamer: &TestStreamer, live: &AtomicUsize) {
    let active = streamer.active_coords().await;
    let mut entities = 0;
    for coord in &active {
        entities += streamer.entity_count(*coord).await.unwrap_or(0);
    }
    let cached = streamer.asset_cache().cached_count().await;
    assert_eq!(live.load(Ordering::SeqCst), entities + cached);

    let (meshes, scene_entities, colliders) = streamer
        .with_sinks(|scene, physics| {
            let mut colliders: Vec<RegionCoord> = physics.colliders.values().copied().collect();
            colliders.sort();
            (scene.mesh_regions(), scene.entities.len(), colliders)
        })
        .await;
    assert_eq!(meshes, active);
    assert_eq!(colliders, active);
    assert_eq!(scene_entities, entities);
}

// ---------------------------------------------------------------------------
// Window transitions
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_initial_window_and_one_region_move() {
    let live = Arc::new(AtomicUsize::new(0));
    let config = StreamerConfig {
        world_seed: 42,
        layout: RegionLayout::new(200.0, 60),
        view_distance: 2,
        ..StreamerConfig::default()
    };
    let streamer = streamer_with(config, TestLoader::new(Arc::clone(&live)));
    let generation = GenerationSettings::default();
    let population = PopulationSettings::default();

    let center = streamer
        .update_window(&at(0.0, 0.0), generation, population)
        .await;
    assert_eq!(center, RegionCoord::new(0, 0));
    assert_eq!(streamer.active_count().await, 25);
    assert_eq!(streamer.pending_count().await, 0);
    assert_eq!(
        streamer.active_coords().await,
        window_coords(RegionCoord::new(0, 0), 2)
    );

    let center = streamer
        .update_window(&at(200.0, 0.0), generation, population)
        .await;
    assert_eq!(center, RegionCoord::new(1, 0));
    assert_eq!(streamer.active_count().await, 25);
    for z in -2..=2 {
        assert_eq!(
            streamer.status(RegionCoord::new(3, z)).await,
            RegionStatus::Active
        );
        assert_eq!(
            streamer.status(RegionCoord::new(-2, z)).await,
            RegionStatus::Unrequested
        );
    }

    let stats = streamer.stats().await;
    assert_eq!(stats.committed, 30);
    assert_eq!(stats.evicted, 5);
    assert_eq!(stats.discarded, 0);
    assert_eq!(stats.failed, 0);

    let (attaches, detaches, colliders) = streamer
        .with_sinks(|scene, physics| (scene.mesh_attaches, scene.mesh_detaches, physics.attaches))
        .await;
    assert_eq!(attaches, 30);
    assert_eq!(detaches, 5);
    assert_eq!(colliders, 30);
    // A mesh and a collider per committed region, plus the scattered entities.
    assert!(streamer.handles_issued() >= 60);
    assert_balanced(&streamer, &live).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unchanged_window_is_noop() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let generation = GenerationSettings::default();
    let population = PopulationSettings::default();

    streamer
        .update_window(&at(10.0, -20.0), generation, population)
        .await;
    let stats = streamer.stats().await;
    let loads = streamer.asset_cache().instantiate_count();

    // Same region, different point inside it.
    streamer
        .update_window(&at(60.0, 40.0), generation, population)
        .await;
    streamer
        .update_window(&at(10.0, -20.0), generation, population)
        .await;

    assert_eq!(streamer.stats().await, stats);
    assert_eq!(streamer.asset_cache().instantiate_count(), loads);
    let attaches = streamer.with_sinks(|scene, _| scene.mesh_attaches).await;
    assert_eq!(attaches, 9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_long_flight_keeps_resources_balanced() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let generation = GenerationSettings::default();
    let population = PopulationSettings {
        clusters_per_region: 2,
        objects_per_cluster: 4,
        clouds_per_region: 2,
    };

    for step in 0..12 {
        let x = step as f64 * 150.0;
        let z = (step as f64 * 0.7).sin() * 300.0;
        streamer.update_window(&at(x, z), generation, population).await;
        assert_eq!(streamer.active_count().await, 9);
        assert_balanced(&streamer, &live).await;
    }
    assert_eq!(streamer.pending_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_far_viewpoint_clamps_to_grid_edge() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));

    let center = streamer
        .update_window(
            &at(1.0e12, 0.0),
            GenerationSettings::default(),
            clouds_only(0),
        )
        .await;

    assert_eq!(center, RegionCoord::new(i32::MAX, 0));
    // The column beyond the edge collapses onto the edge itself.
    assert_eq!(streamer.active_count().await, 6);
    assert_eq!(streamer.pending_count().await, 0);
    assert_eq!(streamer.stats().await.failed, 0);
    assert_balanced(&streamer, &live).await;
}

// ---------------------------------------------------------------------------
// Races
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_update_still_settles_its_regions() {
    let live = Arc::new(AtomicUsize::new(0));
    let (gate, gate_rx) = watch::channel(false);
    let streamer = streamer_with(
        small_config(1),
        TestLoader::gated(Arc::clone(&live), gate_rx),
    );
    let generation = GenerationSettings::default();
    let population = clouds_only(1);
    let origin = at(0.0, 0.0);

    // A frame budget gives up on the update while every region is held at the gate.
    let budget = tokio::time::timeout(
        Duration::from_millis(50),
        streamer.update_window(&origin, generation, population),
    )
    .await;
    assert!(budget.is_err());
    assert_eq!(streamer.pending_count().await, 9);

    gate.send_replace(true);
    wait_until_settled(&streamer).await;
    assert_eq!(
        streamer.active_coords().await,
        window_coords(RegionCoord::new(0, 0), 1)
    );
    assert_eq!(streamer.stats().await.committed, 9);
    assert_balanced(&streamer, &live).await;

    let center = streamer
        .update_window(&at(5000.0, 0.0), generation, population)
        .await;
    assert_eq!(center, RegionCoord::new(25, 0));
    assert_eq!(streamer.pending_count().await, 0);
    assert_eq!(
        streamer.active_coords().await,
        window_coords(center, 1)
    );
    assert_eq!(streamer.stats().await.evicted, 9);
    assert_balanced(&streamer, &live).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_result_for_excluded_region_is_discarded() {
    let live = Arc::new(AtomicUsize::new(0));
    let (gate, gate_rx) = watch::channel(false);
    let streamer = streamer_with(
        small_config(0),
        TestLoader::gated(Arc::clone(&live), gate_rx),
    );
    let generation = GenerationSettings::default();
    let population = clouds_only(2);
    let origin = at(0.0, 0.0);

    let (first, second, ()) = tokio::join!(
        streamer.update_window(&origin, generation, population),
        async {
            wait_for_pending(&streamer, 1).await;
            streamer
                .update_window(&at(1000.0, 0.0), generation, population)
                .await
        },
        async {
            wait_for_pending(&streamer, 2).await;
            gate.send_replace(true);
        },
    );

    assert_eq!(first, RegionCoord::new(0, 0));
    assert_eq!(second, RegionCoord::new(5, 0));
    assert_eq!(
        streamer.status(RegionCoord::new(0, 0)).await,
        RegionStatus::Unrequested
    );
    assert_eq!(
        streamer.status(RegionCoord::new(5, 0)).await,
        RegionStatus::Active
    );

    let stats = streamer.stats().await;
    assert_eq!(stats.committed, 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.evicted, 0);

    let attaches = streamer.with_sinks(|scene, _| scene.mesh_attaches).await;
    assert_eq!(attaches, 1, "the excluded region never reached the scene");
    assert_balanced(&streamer, &live).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_updates_commit_each_region_once() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let generation = GenerationSettings::default();
    let population = clouds_only(1);
    let origin = at(0.0, 0.0);

    tokio::join!(
        streamer.update_window(&origin, generation, population),
        async {
            wait_for_pending(&streamer, 1).await;
            streamer
                .update_window(&at(200.0, 0.0), generation, population)
                .await
        },
    );

    assert_eq!(
        streamer.active_coords().await,
        window_coords(RegionCoord::new(1, 0), 1)
    );
    let stats = streamer.stats().await;
    assert_eq!(stats.committed + stats.discarded, 12);
    assert_eq!(stats.committed - stats.evicted, 9);
    assert_eq!(streamer.pending_count().await, 0);
    assert_balanced(&streamer, &live).await;
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_generation_is_retried_on_next_update() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let broken = GenerationSettings {
        min_height: 50.0,
        max_height: -50.0,
        ..Default::default()
    };
    let viewpoint = at(0.0, 0.0);

    streamer
        .update_window(&viewpoint, broken, PopulationSettings::default())
        .await;
    let stats = streamer.stats().await;
    assert_eq!(stats.failed, 9);
    assert_eq!(stats.committed, 0);
    assert_eq!(streamer.active_count().await, 0);
    assert_eq!(streamer.pending_count().await, 0);
    assert_eq!(
        streamer.status(RegionCoord::new(1, 1)).await,
        RegionStatus::Unrequested
    );

    // Same centre, but nothing is in the table, so this is not a no-op.
    streamer
        .update_window(
            &viewpoint,
            GenerationSettings::default(),
            PopulationSettings::default(),
        )
        .await;
    assert_eq!(streamer.active_count().await, 9);
    assert_eq!(streamer.stats().await.committed, 9);
    assert_balanced(&streamer, &live).await;
}

#[tokio::test]
async fn test_panicking_generation_becomes_task_failure() {
    let coord = RegionCoord::new(3, -1);
    let outcome = contain_panics(coord, async move {
        if coord.x > 0 {
            panic!("height grid exploded");
        }
        Ok::<(), GenerationError>(())
    })
    .await;
    match outcome {
        Err(GenerationError::Task { region, reason }) => {
            assert_eq!(region, coord);
            assert!(reason.contains("panicked"), "{reason}");
        }
        other => panic!("expected a task failure, got {other:?}"),
    }

    let fine = contain_panics(coord, async { Ok::<u32, GenerationError>(7) }).await;
    assert_eq!(fine, Ok(7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_loader_omits_entity_and_is_retried() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(
        small_config(0),
        TestLoader::crashing_once(Arc::clone(&live)),
    );
    let origin = RegionCoord::new(0, 0);

    streamer
        .update_window(&at(0.0, 0.0), GenerationSettings::default(), clouds_only(1))
        .await;
    assert_eq!(streamer.status(origin).await, RegionStatus::Active);
    assert_eq!(streamer.pending_count().await, 0);
    assert_eq!(streamer.entity_count(origin).await, Some(0));
    assert_eq!(streamer.stats().await.failed, 0);
    assert_balanced(&streamer, &live).await;

    streamer.repopulate(clouds_only(1)).await;
    assert_eq!(streamer.entity_count(origin).await, Some(1));
    assert_eq!(streamer.asset_cache().instantiate_count(), 2);
    assert_balanced(&streamer, &live).await;
}

// ---------------------------------------------------------------------------
// Regeneration
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_regenerate_all_rebuilds_window_with_new_settings() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let viewpoint = at(-450.0, 320.0);

    streamer
        .update_window(
            &viewpoint,
            GenerationSettings::default(),
            PopulationSettings::default(),
        )
        .await;
    let before = streamer.height_at(-450.0, 320.0).await.unwrap();

    let taller = GenerationSettings {
        max_height: 400.0,
        ..Default::default()
    };
    let center = streamer
        .regenerate_all(taller, PopulationSettings::default())
        .await;
    assert_eq!(center, Some(RegionCoord::new(-2, 2)));
    assert_eq!(streamer.active_count().await, 9);
    assert_eq!(streamer.settings().await.0, taller);

    let after = streamer.height_at(-450.0, 320.0).await.unwrap();
    assert!(after >= before, "raising max height never lowers terrain");

    let (attaches, detaches) = streamer
        .with_sinks(|scene, _| (scene.mesh_attaches, scene.mesh_detaches))
        .await;
    assert_eq!(attaches, 18);
    assert_eq!(detaches, 9);
    assert_balanced(&streamer, &live).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_regenerate_discards_in_flight_results() {
    let live = Arc::new(AtomicUsize::new(0));
    let (gate, gate_rx) = watch::channel(false);
    let streamer = streamer_with(
        small_config(0),
        TestLoader::gated(Arc::clone(&live), gate_rx),
    );
    let generation = GenerationSettings::default();
    let rebuilt = GenerationSettings {
        max_height: 90.0,
        ..Default::default()
    };
    let population = clouds_only(1);
    let origin = at(0.0, 0.0);

    let (_, regenerated, ()) = tokio::join!(
        streamer.update_window(&origin, generation, population),
        async {
            wait_for_pending(&streamer, 1).await;
            streamer.regenerate_all(rebuilt, population).await
        },
        async {
            // New settings are recorded together with the new placeholder.
            while streamer.settings().await.0 != rebuilt {
                tokio::task::yield_now().await;
            }
            gate.send_replace(true);
        },
    );

    assert_eq!(regenerated, Some(RegionCoord::new(0, 0)));
    let stats = streamer.stats().await;
    assert_eq!(stats.committed, 1);
    assert_eq!(stats.discarded, 1);
    assert_eq!(streamer.active_count().await, 1);
    assert_balanced(&streamer, &live).await;
}

#[tokio::test]
async fn test_regenerate_before_any_update_does_nothing() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(live));
    let result = streamer
        .regenerate_all(GenerationSettings::default(), PopulationSettings::default())
        .await;
    assert_eq!(result, None);
    assert_eq!(streamer.active_count().await, 0);
    assert_eq!(streamer.stats().await, StreamStats::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_repopulate_keeps_generation_settings() {
    let live = Arc::new(AtomicUsize::new(0));
    let streamer = streamer_with(small_config(1), TestLoader::new(Arc::clone(&live)));
    let generation = GenerationSettings {
        max_height: 120.0,
        ..Default::default()
    };

    streamer
        .update_window(&at(0.0, 0.0), generation, clouds_only(3))
        .await;
    assert_eq!(
        streamer.entity_count(RegionCoord::new(0, 0)).await,
        Some(3)
    );

    streamer.repopulate(clouds_only(0)).await;
    let (kept, population) = streamer.settings().await;
    assert_eq!(kept, generation);
    assert_eq!(population, clouds_only(0));
    for coord in streamer.active_coords().await {
        assert_eq!(streamer.entity_count(coord).await, Some(0));
    }
    assert_balanced(&streamer, &live).await;
}
