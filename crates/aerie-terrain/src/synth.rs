//! Biome-blended elevation synthesis.
//!
//! Combines four noise layers into one normalized elevation: a slow
//! "region-type" field selects between plains and mountain octave sets with a
//! smoothstep transition, and a river mask carves troughs along its zero
//! crossings.

use crate::gradient::{GradientNoise, OctaveSet};
use crate::seed::derive_layer_seed;

/// Tunable shape of the synthesized terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainShape {
    /// Slow-varying field choosing plains vs. mountains.
    pub region_type: OctaveSet,
    /// Low-detail rolling terrain.
    pub plains: OctaveSet,
    /// High-detail rugged terrain.
    pub mountain: OctaveSet,
    /// Field whose midpoint crossings become river centerlines.
    pub river: OctaveSet,
    /// Region-type value at the centre of the plains/mountain transition.
    pub mountain_threshold: f64,
    /// Width of the transition. Zero gives a hard switch at the threshold.
    pub blend_width: f64,
    /// River mask value under which carving starts.
    pub river_threshold: f64,
    /// Normalized depth carved at a centerline.
    pub river_depth: f64,
}

impl Default for TerrainShape {
    fn default() -> Self {
        Self {
            region_type: OctaveSet::new(3, 0.4).with_frequency(0.1),
            plains: OctaveSet::new(4, 0.3),
            mountain: OctaveSet::new(8, 0.6),
            river: OctaveSet::new(6, 0.5).with_frequency(0.5),
            mountain_threshold: 0.6,
            blend_width: 0.2,
            river_threshold: 0.1,
            river_depth: 0.15,
        }
    }
}

/// Pure elevation function over world coordinates.
///
/// Holds no mutable state: two calls with identical inputs return
/// bit-identical results, on any thread.
#[derive(Debug, Clone)]
pub struct TerrainHeightSynthesizer {
    region_type_noise: GradientNoise,
    plains_noise: GradientNoise,
    mountain_noise: GradientNoise,
    river_noise: GradientNoise,
    shape: TerrainShape,
}

impl TerrainHeightSynthesizer {
    /// Build the four noise layers for `world_seed`.
    pub fn new(world_seed: u64, shape: TerrainShape) -> Self {
        Self {
            region_type_noise: GradientNoise::new(derive_layer_seed(world_seed, 0)),
            plains_noise: GradientNoise::new(derive_layer_seed(world_seed, 1)),
            mountain_noise: GradientNoise::new(derive_layer_seed(world_seed, 2)),
            river_noise: GradientNoise::new(derive_layer_seed(world_seed, 3)),
            shape,
        }
    }

    /// The shape parameters in use.
    pub fn shape(&self) -> &TerrainShape {
        &self.shape
    }

    /// Normalized elevation in `[0, 1]` at a world position.
    ///
    /// `noise_input_scale` converts world units into noise space.
    pub fn elevation(&self, world_x: f64, world_z: f64, noise_input_scale: f64) -> f64 {
        let x = world_x * noise_input_scale;
        let z = world_z * noise_input_scale;
        let shape = &self.shape;

        let t = shape.region_type.sample(&self.region_type_noise, x, z, 0.0);
        let plains = shape.plains.sample(&self.plains_noise, x, z, 0.0);
        let mountain = shape.mountain.sample(&self.mountain_noise, x, z, 0.0);

        let blend = self.blend_factor(t);
        let mut height = plains + (mountain - plains) * blend;

        let mask = river_mask(shape.river.sample(&self.river_noise, x, z, 0.0));
        height = (height - self.river_penalty(mask)).max(0.0);

        height.clamp(0.0, 1.0)
    }

    /// Weight of the mountain layer for region-type value `t`.
    pub fn blend_factor(&self, t: f64) -> f64 {
        let threshold = self.shape.mountain_threshold;
        let width = self.shape.blend_width;
        if width <= 0.0 {
            return if t < threshold { 0.0 } else { 1.0 };
        }
        smoothstep(threshold - width * 0.5, threshold + width * 0.5, t)
    }

    /// Depth subtracted for a river mask value (0 at the centerline).
    pub fn river_penalty(&self, mask: f64) -> f64 {
        let threshold = self.shape.river_threshold;
        if threshold <= 0.0 || mask >= threshold {
            return 0.0;
        }
        (1.0 - mask / threshold) * self.shape.river_depth
    }
}

/// Distance of a `[0, 1]` noise value from the midpoint, `|2v - 1|`.
fn river_mask(v: f64) -> f64 {
    (v * 2.0 - 1.0).abs()
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
