//! Per-request terrain generation settings.

use crate::error::GenerationError;

/// Immutable snapshot of the height mapping used for one generation request.
///
/// Passed by value into every task, so a region built under one snapshot is
/// self-consistent even if the caller's settings change mid-flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationSettings {
    /// Height of normalized elevation 1.0.
    pub max_height: f64,
    /// Height of normalized elevation 0.0.
    pub min_height: f64,
    /// World-to-noise coordinate scale.
    pub noise_input_scale: f64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_height: 80.0,
            min_height: -40.0,
            noise_input_scale: 0.007,
        }
    }
}

impl GenerationSettings {
    /// Reject snapshots that could produce non-finite or inverted heights.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if !self.max_height.is_finite() || !self.min_height.is_finite() {
            return Err(GenerationError::InvalidSettings(format!(
                "height range must be finite, got [{}, {}]",
                self.min_height, self.max_height
            )));
        }
        if self.min_height >= self.max_height {
            return Err(GenerationError::InvalidSettings(format!(
                "min height {} must be below max height {}",
                self.min_height, self.max_height
            )));
        }
        if !self.noise_input_scale.is_finite() || self.noise_input_scale <= 0.0 {
            return Err(GenerationError::InvalidSettings(format!(
                "noise input scale must be positive, got {}",
                self.noise_input_scale
            )));
        }
        Ok(())
    }

    /// Map a normalized elevation in `[0, 1]` into `[min_height, max_height]`.
    pub fn to_height(&self, normalized: f64) -> f64 {
        let height = self.min_height + normalized * (self.max_height - self.min_height);
        height.clamp(self.min_height, self.max_height)
    }
}
