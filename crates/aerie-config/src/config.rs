//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Region grid and streaming window.
    pub streaming: StreamingConfig,
    /// Terrain generation parameters.
    pub terrain: TerrainConfig,
    /// Decorative object population.
    pub population: PopulationConfig,
    /// Demo fly-over parameters.
    pub flight: FlightConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Which collision representation a region gets.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColliderPolicyConfig {
    /// Full heightfield matching the rendered surface.
    #[default]
    Heightfield,
    /// Flat reference plane at world height zero.
    FlatPlane,
}

/// Region grid and streaming window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// World seed. The same seed always produces the same terrain.
    pub seed: u64,
    /// Edge length of one region in world units.
    pub region_size: f64,
    /// Number of cells along one region edge.
    pub region_resolution: u32,
    /// Regions kept active on each side of the viewpoint's region.
    pub view_distance: u32,
    /// Collision representation built for each region.
    pub collider_policy: ColliderPolicyConfig,
}

/// Terrain generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Height of normalized elevation 1.0.
    pub max_height: f64,
    /// Height of normalized elevation 0.0.
    pub min_height: f64,
    /// World-to-noise coordinate scale.
    pub noise_input_scale: f64,
    /// Region-type value where plains turn into mountains.
    pub mountain_threshold: f64,
    /// Width of the plains/mountain transition (0 = hard switch).
    pub blend_width: f64,
    /// River mask value under which river carving starts.
    pub river_threshold: f64,
    /// Normalized depth carved at a river centerline.
    pub river_depth: f64,
}

/// Decorative object population configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopulationConfig {
    /// Ground object clusters per region.
    pub clusters_per_region: u32,
    /// Objects attempted per cluster.
    pub objects_per_cluster: u32,
    /// Atmospheric props (clouds) per region.
    pub clouds_per_region: u32,
}

/// Demo fly-over configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlightConfig {
    /// Ground speed in world units per second.
    pub speed: f64,
    /// Heading in degrees, 0 = +X, 90 = +Z.
    pub heading_deg: f64,
    /// Flight altitude (informational; streaming is 2D).
    pub altitude: f64,
    /// Number of simulation ticks to run.
    pub ticks: u32,
    /// Simulated tick length in milliseconds.
    pub tick_ms: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file next to the config.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            region_size: 200.0,
            region_resolution: 60,
            view_distance: 2,
            collider_policy: ColliderPolicyConfig::Heightfield,
        }
    }
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            max_height: 80.0,
            min_height: -40.0,
            noise_input_scale: 0.007,
            mountain_threshold: 0.6,
            blend_width: 0.2,
            river_threshold: 0.1,
            river_depth: 0.15,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            clusters_per_region: 1,
            objects_per_cluster: 5,
            clouds_per_region: 2,
        }
    }
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            speed: 120.0,
            heading_deg: 0.0,
            altitude: 100.0,
            ticks: 600,
            tick_ms: 16,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Rejects values the streamer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let streaming = &self.streaming;
        if !(streaming.region_size.is_finite() && streaming.region_size > 0.0) {
            return Err(invalid("streaming.region_size", "must be a positive number"));
        }
        if streaming.region_resolution == 0 {
            return Err(invalid("streaming.region_resolution", "must be at least 1"));
        }

        let terrain = &self.terrain;
        if !(terrain.min_height.is_finite() && terrain.max_height.is_finite()) {
            return Err(invalid("terrain.max_height", "heights must be finite"));
        }
        if terrain.min_height >= terrain.max_height {
            return Err(ConfigError::InvalidValue {
                field: "terrain.min_height",
                reason: format!(
                    "{} is not below max_height {}",
                    terrain.min_height, terrain.max_height
                ),
            });
        }
        if !(terrain.noise_input_scale.is_finite() && terrain.noise_input_scale > 0.0) {
            return Err(invalid("terrain.noise_input_scale", "must be a positive number"));
        }
        if terrain.blend_width < 0.0 {
            return Err(invalid("terrain.blend_width", "must not be negative"));
        }
        if self.flight.tick_ms == 0 {
            return Err(invalid("flight.tick_ms", "must be at least 1"));
        }
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
        new_config.validate()?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
