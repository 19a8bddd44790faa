//! Headless fly-over that streams terrain around a moving viewpoint.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p aerie-demo -- --ticks 300 --view-distance 3`.

mod collaborators;

use std::time::{Duration, Instant};

use aerie_config::{CliArgs, Config};
use aerie_stream::{PopulationSettings, RegionStreamer, StreamerConfig, generation_settings};
use clap::Parser;
use glam::DVec3;
use tracing::{info, warn};

use crate::collaborators::{LoggingPhysics, LoggingScene, PropLoader};

/// Simulated per-model load time.
const PROP_LATENCY: Duration = Duration::from_millis(30);

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Resolve config directory
    let config_dir = args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("aerie")
    });

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(2);
    }

    let log_dir = config_dir.join("logs");
    aerie_log::init_logging(
        Some(&log_dir),
        cfg!(debug_assertions) || config.debug.log_to_file,
        Some(&config),
    );

    let streamer = RegionStreamer::new(
        StreamerConfig::from_config(&config),
        PropLoader::new(PROP_LATENCY),
        LoggingScene::default(),
        LoggingPhysics::default(),
    );
    info!(
        seed = config.streaming.seed,
        view_distance = config.streaming.view_distance,
        region_size = config.streaming.region_size,
        "Streamer ready"
    );

    let mut generation = generation_settings(&config.terrain);
    let population = PopulationSettings::from(&config.population);
    let flight = &config.flight;
    let heading = flight.heading_deg.to_radians();
    let direction = DVec3::new(heading.sin(), 0.0, heading.cos());
    let tick = Duration::from_millis(flight.tick_ms);
    let dt = tick.as_secs_f64();

    let started = Instant::now();
    let mut position = DVec3::new(0.0, flight.altitude, 0.0);
    let mut last_center = None;

    for step in 0..flight.ticks {
        if step == flight.ticks / 2 && step > 0 {
            generation.max_height *= 1.5;
            info!(max_height = generation.max_height, "Regenerating world");
            if streamer.regenerate_all(generation, population).await.is_none() {
                warn!("Nothing to regenerate yet");
            }
        }

        let center = streamer
            .update_window(&position, generation, population)
            .await;
        if last_center != Some(center) {
            let ground = streamer.height_at(position.x, position.z).await;
            info!(
                tick = step,
                region = %center,
                x = position.x,
                z = position.z,
                ground = ground.unwrap_or(f64::NAN),
                "Entered region"
            );
            last_center = Some(center);
        }

        position += direction * flight.speed * dt;
        tokio::time::sleep(tick).await;
    }

    let stats = streamer.stats().await;
    let (meshes, entities, triangles, colliders, cells) = streamer
        .with_sinks(|scene, physics| {
            (
                scene.meshes,
                scene.entities,
                scene.triangles,
                physics.colliders,
                physics.cells,
            )
        })
        .await;
    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        committed = stats.committed,
        discarded = stats.discarded,
        evicted = stats.evicted,
        failed = stats.failed,
        models_loaded = streamer.asset_cache().instantiate_count(),
        handles_issued = streamer.handles_issued(),
        "Fly-over finished"
    );
    info!(
        meshes,
        entities, triangles, colliders, cells, "Final scene contents"
    );
}
