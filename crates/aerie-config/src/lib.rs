//! Configuration system for Aerie.
//!
//! Settings persist to disk as RON files. Supports CLI overrides via clap,
//! hot-reload detection, and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    ColliderPolicyConfig, Config, DebugConfig, FlightConfig, PopulationConfig, StreamingConfig,
    TerrainConfig,
};
pub use error::ConfigError;
