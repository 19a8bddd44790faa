//! Elevation-band vertex coloring.
//!
//! Maps a normalized elevation to a color by piecewise-linear interpolation
//! inside ordered bands: deep water, shallow water, beach, grass, rock, snow.

/// Linear RGB color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
}

impl Rgb {
    /// Create a color from components.
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Color from a `0xRRGGBB` literal.
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as f32 / 255.0,
            g: ((hex >> 8) & 0xFF) as f32 / 255.0,
            b: (hex & 0xFF) as f32 / 255.0,
        }
    }

    /// Linear interpolation toward `other`; `t` is not clamped.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        Rgb {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    /// Components as an array, the layout used by mesh vertices.
    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// One elevation interval `[lower, upper)` with evenly spaced color stops.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBand {
    /// Inclusive lower elevation.
    pub lower: f64,
    /// Exclusive upper elevation (inclusive for the last band).
    pub upper: f64,
    /// Colors at evenly spaced points from `lower` to `upper`. At least one.
    pub stops: Vec<Rgb>,
}

impl ColorBand {
    /// Band with the given stops.
    pub fn new(lower: f64, upper: f64, stops: Vec<Rgb>) -> Self {
        Self {
            lower,
            upper,
            stops,
        }
    }

    fn sample(&self, elevation: f64) -> Rgb {
        let Some(&first) = self.stops.first() else {
            return Rgb::new(0.0, 0.0, 0.0);
        };
        if self.stops.len() == 1 || self.upper <= self.lower {
            return first;
        }
        let t = ((elevation - self.lower) / (self.upper - self.lower)).clamp(0.0, 1.0);
        let segments = self.stops.len() - 1;
        let scaled = t * segments as f64;
        let index = (scaled.floor() as usize).min(segments - 1);
        let local = (scaled - index as f64) as f32;
        self.stops[index].lerp(self.stops[index + 1], local)
    }
}

/// Maps normalized elevation to a vertex color.
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeColorizer {
    bands: Vec<ColorBand>,
}

const DEEP_WATER: Rgb = Rgb::from_hex(0x003366);
const SHALLOW_WATER: Rgb = Rgb::from_hex(0x007BFF);
const SAND: Rgb = Rgb::from_hex(0x346326);
const GRASS: Rgb = Rgb::from_hex(0x228B22);
const DIRT: Rgb = Rgb::from_hex(0x8B4513);
const ROCK: Rgb = Rgb::from_hex(0x808080);
const SNOW: Rgb = Rgb::from_hex(0xFFFAFA);

impl Default for BiomeColorizer {
    fn default() -> Self {
        Self::new(vec![
            ColorBand::new(0.0, 0.30, vec![DEEP_WATER, SHALLOW_WATER]),
            ColorBand::new(0.30, 0.35, vec![SHALLOW_WATER, SAND]),
            ColorBand::new(0.35, 0.50, vec![SAND, GRASS]),
            ColorBand::new(0.50, 0.70, vec![GRASS, DIRT, ROCK]),
            ColorBand::new(0.70, 1.0, vec![ROCK, SNOW]),
        ])
    }
}

impl BiomeColorizer {
    /// Colorizer over custom bands. Bands are sorted by their lower bound.
    pub fn new(mut bands: Vec<ColorBand>) -> Self {
        bands.sort_by(|a, b| a.lower.total_cmp(&b.lower));
        Self { bands }
    }

    /// The bands in elevation order.
    pub fn bands(&self) -> &[ColorBand] {
        &self.bands
    }

    /// Color for a normalized elevation.
    ///
    /// Values outside `[0, 1]` saturate to the end colors and NaN is treated
    /// as 0.
    pub fn color_of(&self, elevation: f64) -> Rgb {
        let elevation = if elevation.is_nan() {
            0.0
        } else {
            elevation.clamp(0.0, 1.0)
        };
        let band = self
            .bands
            .iter()
            .find(|band| elevation < band.upper)
            .or_else(|| self.bands.last());
        match band {
            Some(band) => band.sample(elevation),
            None => Rgb::new(0.0, 0.0, 0.0),
        }
    }
}
