//! Streaming manager: keeps the window of regions around the viewpoint
//! generated and attached, and evicts regions that fall out of range.
//!
//! Every coordinate moves through `Unrequested -> Pending -> Active`, or is
//! discarded. A pending record carries the ticket of the generation task that
//! will fill it. When a task settles, its result is committed only if the
//! record still holds that same ticket and the coordinate is still inside the
//! current window. Anything else is dropped on arrival without reaching the
//! scene or physics collaborators. The check and the commit happen under one
//! lock, together with the collaborator calls.
//!
//! Each generation task settles its own result, so a placeholder is resolved
//! even when the update that launched it is no longer being awaited.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use aerie_terrain::{
    BiomeColorizer, GenerationError, GenerationSettings, HandleAllocator, HeightGrid,
    RegionCoord, RegionGeometry, RegionGeometryBuilder, RegionLayout, TerrainCollider,
    TerrainHeightSynthesizer, TerrainMesh,
};
use glam::DVec3;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::asset_cache::AssetCache;
use crate::config::StreamerConfig;
use crate::scatter::{ObjectScatterer, PlacedEntity, PopulationSettings, terrain_height_at};
use crate::sinks::{AssetLoader, PhysicsSink, SceneSink, Viewpoint};
use crate::window::RegionWindow;

/// Lifecycle state of a region as seen from outside the streamer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionStatus {
    /// Not in the table: never requested, evicted, discarded or failed.
    Unrequested,
    /// Generation in flight.
    Pending,
    /// Committed and attached.
    Active,
}

/// Running totals of region outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Results committed to the table.
    pub committed: u64,
    /// Results dropped because their region was no longer wanted.
    pub discarded: u64,
    /// Active regions detached and removed.
    pub evicted: u64,
    /// Generation tasks that failed.
    pub failed: u64,
}

/// Committed content of one region.
struct ActiveRegion<A> {
    grid: Arc<HeightGrid>,
    mesh: TerrainMesh,
    collider: TerrainCollider,
    entities: Vec<PlacedEntity<A>>,
}

enum RegionRecord<A> {
    Pending { ticket: u64 },
    Active(ActiveRegion<A>),
}

/// What a generation task hands back.
struct RegionContent<A> {
    geometry: RegionGeometry,
    entities: Vec<PlacedEntity<A>>,
}

struct StreamState<S, P, A> {
    table: FxHashMap<RegionCoord, RegionRecord<A>>,
    window: Option<RegionWindow>,
    last_center: Option<RegionCoord>,
    last_viewpoint: Option<DVec3>,
    generation: GenerationSettings,
    population: PopulationSettings,
    scene: S,
    physics: P,
    stats: StreamStats,
}

/// Streams regions around a viewpoint into a scene and a physics world.
///
/// All methods take `&self`; overlapping [`update_window`](Self::update_window)
/// calls are allowed and resolve consistently.
pub struct RegionStreamer<S, P, L: AssetLoader> {
    builder: Arc<RegionGeometryBuilder>,
    scatterer: ObjectScatterer<L>,
    handles: Arc<HandleAllocator>,
    view_distance: u32,
    next_ticket: AtomicU64,
    state: Arc<Mutex<StreamState<S, P, L::Asset>>>,
}

impl<S, P, L> RegionStreamer<S, P, L>
where
    S: SceneSink<L::Asset> + 'static,
    P: PhysicsSink + 'static,
    L: AssetLoader,
{
    /// Create a streamer. Nothing is generated until the first
    /// [`update_window`](Self::update_window).
    pub fn new(config: StreamerConfig, loader: L, scene: S, physics: P) -> Self {
        let handles = Arc::new(HandleAllocator::new());
        let synth = TerrainHeightSynthesizer::new(config.world_seed, config.shape);
        let builder = RegionGeometryBuilder::new(synth, BiomeColorizer::default(), config.layout)
            .with_collider_policy(config.collider_policy);
        let scatterer = ObjectScatterer::new(
            config.world_seed,
            config.layout,
            config.catalog,
            AssetCache::new(loader),
            Arc::clone(&handles),
        );

        Self {
            builder: Arc::new(builder),
            scatterer,
            handles,
            view_distance: config.view_distance,
            next_ticket: AtomicU64::new(1),
            state: Arc::new(Mutex::new(StreamState {
                table: FxHashMap::default(),
                window: None,
                last_center: None,
                last_viewpoint: None,
                generation: GenerationSettings::default(),
                population: PopulationSettings::default(),
                scene,
                physics,
                stats: StreamStats::default(),
            })),
        }
    }

    /// Region size and resolution.
    pub fn layout(&self) -> &RegionLayout {
        self.builder.layout()
    }

    /// Window radius in regions.
    pub fn view_distance(&self) -> u32 {
        self.view_distance
    }

    /// The asset cache shared by every region's population.
    pub fn asset_cache(&self) -> &AssetCache<L> {
        self.scatterer.cache()
    }

    /// Mesh, collider and entity handles issued so far, including those of
    /// discarded results.
    pub fn handles_issued(&self) -> u64 {
        self.handles.issued()
    }

    /// Bring the window around `viewpoint` up to date.
    ///
    /// Missing regions are generated concurrently, nearest first. The call
    /// returns after every generation it launched has settled and the
    /// eviction scan ran. Returns the centre region.
    ///
    /// Dropping the returned future before it completes does not strand the
    /// regions it launched: their tasks still settle them, and the eviction
    /// scan it skipped runs on the next update.
    pub async fn update_window<V: Viewpoint + ?Sized>(
        &self,
        viewpoint: &V,
        generation: GenerationSettings,
        population: PopulationSettings,
    ) -> RegionCoord {
        let position = viewpoint.position();
        let center = self.layout().region_at(position.x, position.z);
        if center.is_at_grid_edge() {
            warn!(
                x = position.x,
                z = position.z,
                region = %center,
                "Viewpoint is beyond the region grid, clamping to its edge"
            );
        }
        let window = RegionWindow::new(center, self.view_distance);

        let launches = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.last_viewpoint = Some(position);
            state.generation = generation;
            state.population = population;
            state.window = Some(window);

            let coords = window.coords();
            let unchanged = state.last_center == Some(center)
                && coords.iter().all(|c| state.table.contains_key(c));
            state.last_center = Some(center);
            if unchanged {
                trace!(center = %center, "Region window unchanged");
                return center;
            }

            let mut launches = Vec::new();
            for coord in coords {
                if state.table.contains_key(&coord) {
                    continue;
                }
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                state.table.insert(coord, RegionRecord::Pending { ticket });
                launches.push((coord, ticket));
            }
            launches
        };

        debug!(center = %center, launched = launches.len(), "Region window moved");

        // Plain handles: dropping them detaches the tasks instead of aborting.
        let mut settling = Vec::with_capacity(launches.len());
        for (coord, ticket) in launches {
            let work = generate_region(
                Arc::clone(&self.builder),
                self.scatterer.clone(),
                Arc::clone(&self.handles),
                coord,
                generation,
                population,
            );
            let state = Arc::clone(&self.state);
            settling.push(tokio::spawn(async move {
                let outcome = contain_panics(coord, work).await;
                settle(&state, coord, ticket, outcome).await;
            }));
        }

        for task in settling {
            if let Err(err) = task.await {
                warn!(error = %err, "Region settle task aborted");
            }
        }

        self.evict_outside_window().await;
        center
    }

    /// Throw away every region and rebuild the window at the last viewpoint
    /// with new settings.
    ///
    /// Active regions are detached at once. Pending generations keep running
    /// but their results are discarded on arrival. Returns the centre region,
    /// or `None` if no viewpoint was ever seen.
    pub async fn regenerate_all(
        &self,
        generation: GenerationSettings,
        population: PopulationSettings,
    ) -> Option<RegionCoord> {
        let viewpoint = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let mut cleared = 0usize;
            let mut abandoned = 0usize;
            for (_, record) in state.table.drain() {
                match record {
                    RegionRecord::Active(region) => {
                        detach_region(&mut state.scene, &mut state.physics, &region);
                        state.stats.evicted += 1;
                        cleared += 1;
                    }
                    RegionRecord::Pending { .. } => abandoned += 1,
                }
            }
            state.last_center = None;
            info!(cleared, abandoned, "Regenerating all regions");
            state.last_viewpoint
        };

        let Some(position) = viewpoint else {
            warn!("Regenerate requested before any viewpoint update; nothing to rebuild");
            return None;
        };
        Some(self.update_window(&position, generation, population).await)
    }

    /// Regenerate with new population settings, keeping the last generation
    /// settings.
    pub async fn repopulate(&self, population: PopulationSettings) -> Option<RegionCoord> {
        let generation = self.state.lock().await.generation;
        self.regenerate_all(generation, population).await
    }

    /// Settings used by the most recent update.
    pub async fn settings(&self) -> (GenerationSettings, PopulationSettings) {
        let state = self.state.lock().await;
        (state.generation, state.population)
    }

    /// Lifecycle state of `coord`.
    pub async fn status(&self, coord: RegionCoord) -> RegionStatus {
        match self.state.lock().await.table.get(&coord) {
            None => RegionStatus::Unrequested,
            Some(RegionRecord::Pending { .. }) => RegionStatus::Pending,
            Some(RegionRecord::Active(_)) => RegionStatus::Active,
        }
    }

    /// Number of committed regions.
    pub async fn active_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .table
            .values()
            .filter(|r| matches!(r, RegionRecord::Active(_)))
            .count()
    }

    /// Number of regions with generation in flight.
    pub async fn pending_count(&self) -> usize {
        let state = self.state.lock().await;
        state
            .table
            .values()
            .filter(|r| matches!(r, RegionRecord::Pending { .. }))
            .count()
    }

    /// Committed regions, sorted.
    pub async fn active_coords(&self) -> Vec<RegionCoord> {
        let state = self.state.lock().await;
        let mut coords: Vec<RegionCoord> = state
            .table
            .iter()
            .filter(|(_, r)| matches!(r, RegionRecord::Active(_)))
            .map(|(c, _)| *c)
            .collect();
        coords.sort();
        coords
    }

    /// Scattered entities committed for `coord`.
    pub async fn entity_count(&self, coord: RegionCoord) -> Option<usize> {
        match self.state.lock().await.table.get(&coord) {
            Some(RegionRecord::Active(region)) => Some(region.entities.len()),
            _ => None,
        }
    }

    /// Terrain height under a world point, if its region is active.
    pub async fn height_at(&self, world_x: f64, world_z: f64) -> Option<f64> {
        let layout = *self.layout();
        let coord = layout.region_at(world_x, world_z);
        match self.state.lock().await.table.get(&coord) {
            Some(RegionRecord::Active(region)) => Some(terrain_height_at(
                &layout,
                coord,
                &region.grid,
                world_x,
                world_z,
            )),
            _ => None,
        }
    }

    /// Window recorded by the most recent update.
    pub async fn window(&self) -> Option<RegionWindow> {
        self.state.lock().await.window
    }

    /// Outcome totals so far.
    pub async fn stats(&self) -> StreamStats {
        self.state.lock().await.stats
    }

    /// Inspect the collaborators under the table lock.
    pub async fn with_sinks<R>(&self, f: impl FnOnce(&S, &P) -> R) -> R {
        let state = self.state.lock().await;
        f(&state.scene, &state.physics)
    }

    async fn evict_outside_window(&self) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(window) = state.window else {
            return;
        };

        let mut stale: Vec<RegionCoord> = state
            .table
            .iter()
            .filter(|(c, r)| matches!(r, RegionRecord::Active(_)) && !window.contains(**c))
            .map(|(c, _)| *c)
            .collect();
        stale.sort();

        for coord in stale {
            if let Some(RegionRecord::Active(region)) = state.table.remove(&coord) {
                detach_region(&mut state.scene, &mut state.physics, &region);
                state.stats.evicted += 1;
                trace!(region = %coord, "Region evicted");
            }
        }
    }
}

async fn settle<S, P, A>(
    state: &Mutex<StreamState<S, P, A>>,
    coord: RegionCoord,
    ticket: u64,
    outcome: Result<RegionContent<A>, GenerationError>,
) where
    S: SceneSink<A>,
    P: PhysicsSink,
{
    let mut guard = state.lock().await;
    let state = &mut *guard;
    let owns_record = matches!(
        state.table.get(&coord),
        Some(RegionRecord::Pending { ticket: current }) if *current == ticket
    );
    let wanted = state.window.is_some_and(|w| w.contains(coord));

    match outcome {
        Ok(content) if owns_record && wanted => {
            let RegionContent { geometry, entities } = content;
            state.scene.attach_mesh(&geometry.mesh);
            state.physics.attach_collider(&geometry.collider);
            for entity in &entities {
                state.scene.attach_entity(entity);
            }
            debug!(region = %coord, ticket, entities = entities.len(), "Region committed");
            state.table.insert(
                coord,
                RegionRecord::Active(ActiveRegion {
                    grid: geometry.grid,
                    mesh: geometry.mesh,
                    collider: geometry.collider,
                    entities,
                }),
            );
            state.stats.committed += 1;
        }
        Ok(content) => {
            if owns_record {
                state.table.remove(&coord);
            }
            state.stats.discarded += 1;
            debug!(
                region = %coord,
                ticket,
                entities = content.entities.len(),
                "Discarding result for region no longer wanted"
            );
        }
        Err(err) => {
            if owns_record {
                state.table.remove(&coord);
            }
            state.stats.failed += 1;
            warn!(region = %coord, ticket, error = %err, "Region generation failed");
        }
    }
}

/// Run `work` on its own task so a panic inside it becomes an ordinary
/// generation failure for `coord`.
async fn contain_panics<T, F>(coord: RegionCoord, work: F) -> Result<T, GenerationError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, GenerationError>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(outcome) => outcome,
        Err(err) => Err(GenerationError::Task {
            region: coord,
            reason: err.to_string(),
        }),
    }
}

fn detach_region<S, P, A>(scene: &mut S, physics: &mut P, region: &ActiveRegion<A>)
where
    S: SceneSink<A>,
    P: PhysicsSink,
{
    for entity in &region.entities {
        scene.detach_entity(entity);
    }
    physics.detach_collider(&region.collider);
    scene.detach_mesh(&region.mesh);
}

async fn generate_region<L: AssetLoader>(
    builder: Arc<RegionGeometryBuilder>,
    scatterer: ObjectScatterer<L>,
    handles: Arc<HandleAllocator>,
    coord: RegionCoord,
    generation: GenerationSettings,
    population: PopulationSettings,
) -> Result<RegionContent<L::Asset>, GenerationError> {
    let geometry = tokio::task::spawn_blocking(move || builder.build(coord, &generation, &handles))
        .await
        .map_err(|err| GenerationError::Task {
            region: coord,
            reason: err.to_string(),
        })??;
    let entities = scatterer
        .scatter(coord, &geometry.grid, &generation, &population)
        .await;
    Ok(RegionContent { geometry, entities })
}

#[cfg(test)]
#[path = "streamer_tests.rs"]
mod tests;
