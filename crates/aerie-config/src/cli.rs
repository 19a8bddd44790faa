//! Command-line argument parsing for the Aerie demo.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Aerie command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "aerie", about = "Streaming procedural terrain fly-over")]
pub struct CliArgs {
    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Regions kept active on each side of the viewpoint.
    #[arg(long)]
    pub view_distance: Option<u32>,

    /// Number of simulation ticks to run.
    #[arg(long)]
    pub ticks: Option<u32>,

    /// Ground speed in world units per second.
    #[arg(long)]
    pub speed: Option<f64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.streaming.seed = seed;
        }
        if let Some(vd) = args.view_distance {
            self.streaming.view_distance = vd;
        }
        if let Some(ticks) = args.ticks {
            self.flight.ticks = ticks;
        }
        if let Some(speed) = args.speed {
            self.flight.speed = speed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
