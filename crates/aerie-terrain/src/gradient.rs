//! Seeded 3D gradient noise and multi-octave summation.
//!
//! The permutation table is shuffled by a linear-congruential generator seeded
//! from the world seed, so a field is fully determined by its seed. The table
//! is computed with integer arithmetic and is identical on every platform.

use noise::NoiseFn;

const LCG_MULTIPLIER: u64 = 1_103_515_245;
const LCG_INCREMENT: u64 = 12_345;
const LCG_MODULUS: u64 = (1 << 31) - 1;

/// Deterministic, seedable 3D gradient noise with output in `[-1, 1]`.
#[derive(Clone)]
pub struct GradientNoise {
    seed: u64,
    /// 256-entry permutation doubled to 512 entries for wraparound lookups.
    perm: [u8; 512],
}

impl GradientNoise {
    /// Build the permutation table for `seed`.
    pub fn new(seed: u64) -> Self {
        let mut state = seed % LCG_MODULUS;
        let mut next_unit = move || {
            state = (LCG_MULTIPLIER * state + LCG_INCREMENT) % LCG_MODULUS;
            state as f64 / LCG_MODULUS as f64
        };

        let mut table = [0u8; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        for i in (1..256usize).rev() {
            let j = ((next_unit() * (i + 1) as f64) as usize).min(i);
            table.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { seed, perm }
    }

    /// The seed this field was built from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sample the field. Same seed and same input always give the same value.
    pub fn noise3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let (xf, yf, zf) = (x.floor(), y.floor(), z.floor());
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let zi = (zf as i64 & 255) as usize;

        let (x, y, z) = (x - xf, y - yf, z - zf);
        let (u, v, w) = (fade(x), fade(y), fade(z));

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        let value = lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z)),
                lerp(u, grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z)),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], x, y, z - 1.0),
                    grad(p[ba + 1], x - 1.0, y, z - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], x, y - 1.0, z - 1.0),
                    grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        );
        value.clamp(-1.0, 1.0)
    }

    /// Sum `octaves` progressively finer layers and normalize to `[0, 1]`.
    pub fn multi_octave(
        &self,
        x: f64,
        y: f64,
        z: f64,
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
    ) -> f64 {
        fbm(self, [x, y, z], octaves, persistence, lacunarity)
    }
}

impl std::fmt::Debug for GradientNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientNoise")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl NoiseFn<f64, 3> for GradientNoise {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.noise3d(point[0], point[1], point[2])
    }
}

/// Multi-octave summation over any 3D noise function, normalized to `[0, 1]`.
///
/// Each octave multiplies frequency by `lacunarity` and amplitude by
/// `persistence`. The weighted sum is divided by the total amplitude and
/// remapped from `[-1, 1]`. Zero octaves yields the midpoint `0.5`.
pub fn fbm(
    noise_fn: &impl NoiseFn<f64, 3>,
    point: [f64; 3],
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut frequency = 1.0;
    let mut amplitude = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        let sample = noise_fn.get([
            point[0] * frequency,
            point[1] * frequency,
            point[2] * frequency,
        ]);
        total += sample * amplitude;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value == 0.0 {
        return 0.5;
    }
    ((total / max_value + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// One named multi-octave configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OctaveSet {
    /// Number of layers summed.
    pub octaves: u32,
    /// Amplitude decay between layers.
    pub persistence: f64,
    /// Frequency growth between layers.
    pub lacunarity: f64,
    /// Multiplier applied to the input point before the first layer.
    pub frequency: f64,
}

impl OctaveSet {
    /// Octave set with lacunarity 2 and unit base frequency.
    pub const fn new(octaves: u32, persistence: f64) -> Self {
        Self {
            octaves,
            persistence,
            lacunarity: 2.0,
            frequency: 1.0,
        }
    }

    /// Same set sampled at a different base frequency.
    pub const fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Sample `noise` with this set; result in `[0, 1]`.
    pub fn sample(&self, noise: &GradientNoise, x: f64, y: f64, z: f64) -> f64 {
        noise.multi_octave(
            x * self.frequency,
            y * self.frequency,
            z * self.frequency,
            self.octaves,
            self.persistence,
            self.lacunarity,
        )
    }
}

#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}
