use glam::Vec2;
use noise::{NoiseFn, Perlin, Simplex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::terrain::settings::{PerlinParams, RidgedParams};

/// Range of the per-octave offset draw. Matching offsets for matching
/// seeds is what makes terrain reproducible, so the stream is a fixed
/// portable generator rather than the platform default.
const OFFSET_RANGE: i32 = 100_000;

/// Fractal Perlin filter.
///
/// Octave offsets are drawn once from the seeded stream at build time;
/// the per-chunk sample center is added at evaluation time, so every
/// chunk samples one continuous field.
pub struct PerlinFilter {
    noise: Perlin,
    base_offsets: Vec<Vec2>,
    scale: f32,
    persistence: f32,
    lacunarity: f32,
}

impl PerlinFilter {
    /// Build from validated parameters.
    pub fn new(params: &PerlinParams) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut base_offsets = Vec::with_capacity(params.octaves as usize);
        for _ in 0..params.octaves {
            let offset_x = rng.random_range(-OFFSET_RANGE..OFFSET_RANGE) as f32 + params.offset[0];
            let offset_y = rng.random_range(-OFFSET_RANGE..OFFSET_RANGE) as f32 - params.offset[1];
            base_offsets.push(Vec2::new(offset_x, offset_y));
        }
        PerlinFilter {
            noise: Perlin::new(params.seed as u32),
            base_offsets,
            scale: params.scale,
            persistence: params.persistence,
            lacunarity: params.lacunarity,
        }
    }

    pub fn evaluate(&self, x: f32, y: f32, sample_center: Vec2) -> f32 {
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut elevation = 0.0;
        for offset in &self.base_offsets {
            let sample_x = (x + offset.x + sample_center.x) / self.scale * frequency;
            let sample_y = (y + offset.y - sample_center.y) / self.scale * frequency;
            // Perlin output is already in [-1, 1].
            let value = self.noise.get([sample_x as f64, sample_y as f64]) as f32;
            elevation += value * amplitude;

            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }
        elevation
    }

    pub fn min_value(&self) -> f32 {
        0.0
    }

    /// Analytic amplitude bound. Must mirror the octave summation in
    /// `evaluate` exactly, or global normalization drifts between chunks.
    pub fn max_value(&self) -> f32 {
        let mut max_value = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..self.base_offsets.len() {
            max_value += amplitude;
            amplitude *= self.persistence;
        }
        max_value
    }
}

/// Ridged simplex filter: sharp crests from `1 - |noise|`, normalized to
/// [0, 1] by the running amplitude sum.
pub struct RidgedFilter {
    noise: Simplex,
    octaves: u32,
    scale: f32,
    persistence: f32,
    base_roughness: f32,
    roughness: f32,
}

impl RidgedFilter {
    pub fn new(params: &RidgedParams) -> Self {
        RidgedFilter {
            noise: Simplex::new(params.seed as u32),
            octaves: params.octaves,
            scale: params.scale,
            persistence: params.persistence,
            base_roughness: params.base_roughness,
            roughness: params.roughness,
        }
    }

    pub fn evaluate(&self, x: f32, y: f32, sample_center: Vec2) -> f32 {
        let mut amplitude = 1.0;
        let mut frequency = self.base_roughness;
        let mut elevation = 0.0;
        let mut max_possible = 0.0;
        for _ in 0..self.octaves {
            let sample_x = (x + sample_center.x) / self.scale * frequency;
            let sample_y = (y - sample_center.y) / self.scale * frequency;
            let value = 1.0 - self.noise.get([sample_x as f64, sample_y as f64]).abs() as f32;
            elevation += value * amplitude;
            max_possible += amplitude;

            frequency *= self.roughness;
            amplitude *= self.persistence;
        }
        elevation / max_possible
    }

    pub fn min_value(&self) -> f32 {
        0.0
    }

    pub fn max_value(&self) -> f32 {
        // evaluate() divides by its own amplitude sum.
        1.0
    }
}

pub enum BuiltFilter {
    Perlin(PerlinFilter),
    Ridged(RidgedFilter),
}

impl BuiltFilter {
    pub fn evaluate(&self, x: f32, y: f32, sample_center: Vec2) -> f32 {
        match self {
            BuiltFilter::Perlin(filter) => filter.evaluate(x, y, sample_center),
            BuiltFilter::Ridged(filter) => filter.evaluate(x, y, sample_center),
        }
    }

    pub fn min_value(&self) -> f32 {
        match self {
            BuiltFilter::Perlin(filter) => filter.min_value(),
            BuiltFilter::Ridged(filter) => filter.min_value(),
        }
    }

    pub fn max_value(&self) -> f32 {
        match self {
            BuiltFilter::Perlin(filter) => filter.max_value(),
            BuiltFilter::Ridged(filter) => filter.max_value(),
        }
    }
}
