//! Terrain generation error types.

use crate::region::RegionCoord;

/// Errors that fail the generation of one region.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// The settings snapshot cannot produce a valid height grid.
    #[error("invalid generation settings: {0}")]
    InvalidSettings(String),

    /// A sample evaluated to NaN or infinity.
    #[error("non-finite height in region {region} at sample ({row}, {col})")]
    NonFiniteHeight {
        /// Region being built.
        region: RegionCoord,
        /// Grid row of the bad sample.
        row: usize,
        /// Grid column of the bad sample.
        col: usize,
    },

    /// The background task running the build did not complete.
    #[error("generation task for region {region} failed: {reason}")]
    Task {
        /// Region being built.
        region: RegionCoord,
        /// Panic message or cancellation reason.
        reason: String,
    },
}
