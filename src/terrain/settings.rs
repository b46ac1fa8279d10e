use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::terrain::curve::ResponseCurve;

pub const NUM_SUPPORTED_LODS: usize = 5;
pub const NUM_SUPPORTED_CHUNK_SIZES: usize = 9;
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;
/// Chunk sizes are multiples of 24 so every LOD skip increment (1, 2, 4,
/// 6, 8) divides the main-vertex span evenly.
pub const SUPPORTED_CHUNK_SIZES: [u32; NUM_SUPPORTED_CHUNK_SIZES] =
    [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// How the heightmap generator rescales raw noise into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Rescale against the observed min/max of the single generated grid.
    /// Adjacent chunks will not match at their edges; only usable when
    /// chunks are visually independent.
    Local,
    /// Rescale against the analytic maximum of the noise field, so the
    /// same world point maps to the same value from any chunk's grid.
    /// Required for seamless infinite streaming.
    Global,
}

// --- Noise layer configuration ---

/// Per-filter algorithm parameters. Scale, octaves, lacunarity and
/// persistence are clamped by `validated()` before a generation pass ever
/// sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum FilterParams {
    Perlin(PerlinParams),
    Ridged(RidgedParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerlinParams {
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: u64,
    pub offset: [f32; 2],
}

impl Default for PerlinParams {
    fn default() -> Self {
        PerlinParams {
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            lacunarity: 2.0,
            seed: 0,
            offset: [0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgedParams {
    pub scale: f32,
    pub octaves: u32,
    pub persistence: f32,
    pub base_roughness: f32,
    pub roughness: f32,
    pub seed: u64,
}

impl Default for RidgedParams {
    fn default() -> Self {
        RidgedParams {
            scale: 50.0,
            octaves: 6,
            persistence: 0.6,
            base_roughness: 1.0,
            roughness: 2.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseLayer {
    pub enabled: bool,
    pub strength: f32,
    /// Multiply this layer by the raw value of layer 0, so it only
    /// contributes where the base layer is active. Ignored on layer 0.
    pub use_first_layer_as_mask: bool,
    pub filter: FilterParams,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        NoiseLayer {
            enabled: true,
            strength: 1.0,
            use_first_layer_as_mask: false,
            filter: FilterParams::Perlin(PerlinParams::default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseLayerConfig {
    /// Divisor applied to the combined elevation to keep the field bounded.
    pub global_height_scale: f32,
    pub layers: Vec<NoiseLayer>,
}

impl Default for NoiseLayerConfig {
    fn default() -> Self {
        NoiseLayerConfig {
            global_height_scale: 1.0,
            layers: vec![NoiseLayer::default()],
        }
    }
}

impl NoiseLayerConfig {
    /// Copy-on-read validation: returns a corrected copy with soft limits
    /// clamped, or an error for values that cannot be repaired.
    pub fn validated(&self) -> Result<NoiseLayerConfig, ConfigError> {
        if self.global_height_scale <= 0.0 {
            return Err(ConfigError::NonPositiveGlobalScale(self.global_height_scale));
        }
        let mut out = self.clone();
        for layer in &mut out.layers {
            layer.strength = layer.strength.clamp(0.0, 1.0);
            match &mut layer.filter {
                FilterParams::Perlin(p) => {
                    p.scale = p.scale.max(0.01);
                    p.octaves = p.octaves.max(1);
                    p.lacunarity = p.lacunarity.max(1.0);
                    p.persistence = p.persistence.clamp(0.0, 1.0);
                }
                FilterParams::Ridged(r) => {
                    r.scale = r.scale.max(0.01);
                    r.octaves = r.octaves.max(1);
                    r.roughness = r.roughness.max(1.0);
                    r.base_roughness = r.base_roughness.max(0.0);
                    r.persistence = r.persistence.clamp(0.0, 1.0);
                }
            }
        }
        Ok(out)
    }
}

// --- Heightmap settings ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightmapSettings {
    pub normalize_mode: NormalizeMode,
    pub use_falloff: bool,
    pub height_multiplier: f32,
    pub noise: NoiseLayerConfig,
    /// Radial falloff profile, keyed by distance from map center in [0, 1].
    pub falloff_curve: ResponseCurve,
    /// Height response, keyed by normalized elevation in [0, 1].
    pub height_curve: ResponseCurve,
}

impl Default for HeightmapSettings {
    fn default() -> Self {
        HeightmapSettings {
            normalize_mode: NormalizeMode::Global,
            use_falloff: false,
            height_multiplier: 10.0,
            noise: NoiseLayerConfig::default(),
            falloff_curve: ResponseCurve::linear(),
            height_curve: ResponseCurve::linear(),
        }
    }
}

impl HeightmapSettings {
    pub fn min_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(0.0)
    }

    pub fn max_height(&self) -> f32 {
        self.height_multiplier * self.height_curve.evaluate(1.0)
    }

    pub fn validated(&self) -> Result<HeightmapSettings, ConfigError> {
        self.falloff_curve.validate()?;
        self.height_curve.validate()?;
        let mut out = self.clone();
        out.noise = self.noise.validated()?;
        Ok(out)
    }
}

// --- Mesh settings ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSettings {
    pub chunk_size_index: usize,
    pub flat_shaded_chunk_size_index: usize,
    pub mesh_scale: f32,
    pub use_flat_shading: bool,
}

impl Default for MeshSettings {
    fn default() -> Self {
        MeshSettings {
            chunk_size_index: 0,
            flat_shaded_chunk_size_index: 0,
            mesh_scale: 2.0,
            use_flat_shading: false,
        }
    }
}

impl MeshSettings {
    /// Vertices per mesh line at LOD 0. Includes the 2 out-of-mesh verts
    /// used only for normal calculation and the 2 edge-connection verts
    /// that let chunks of different LODs connect without gaps.
    pub fn num_verts_per_line(&self) -> usize {
        let index = if self.use_flat_shading {
            self.flat_shaded_chunk_size_index
        } else {
            self.chunk_size_index
        };
        SUPPORTED_CHUNK_SIZES[index] as usize + 5
    }

    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() as f32 - 3.0) * self.mesh_scale
    }

    pub fn validated(&self) -> Result<MeshSettings, ConfigError> {
        if self.mesh_scale <= 0.0 {
            return Err(ConfigError::NonPositiveMeshScale(self.mesh_scale));
        }
        if self.chunk_size_index >= NUM_SUPPORTED_CHUNK_SIZES {
            return Err(ConfigError::ChunkSizeIndexOutOfRange {
                index: self.chunk_size_index,
                max: NUM_SUPPORTED_CHUNK_SIZES,
            });
        }
        if self.use_flat_shading
            && self.flat_shaded_chunk_size_index >= NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES
        {
            return Err(ConfigError::FlatShadedSizeUnsupported {
                index: self.flat_shaded_chunk_size_index,
                max: NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES,
            });
        }
        Ok(self.clone())
    }
}

// --- LOD table ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodInfo {
    pub lod: usize,
    pub visible_distance_threshold: f32,
}

impl LodInfo {
    pub fn sqr_visible_distance_threshold(&self) -> f32 {
        self.visible_distance_threshold * self.visible_distance_threshold
    }
}

/// Validate a detail-level table: non-empty, thresholds strictly
/// ascending and positive, LOD indices within the supported range.
pub fn validate_detail_levels(levels: &[LodInfo]) -> Result<(), ConfigError> {
    if levels.is_empty() {
        return Err(ConfigError::EmptyDetailLevels);
    }
    for (i, level) in levels.iter().enumerate() {
        if level.lod >= NUM_SUPPORTED_LODS {
            return Err(ConfigError::LodOutOfRange {
                lod: level.lod,
                max: NUM_SUPPORTED_LODS - 1,
            });
        }
        if level.visible_distance_threshold <= 0.0 {
            return Err(ConfigError::NonPositiveThreshold { index: i });
        }
        if i > 0
            && level.visible_distance_threshold <= levels[i - 1].visible_distance_threshold
        {
            return Err(ConfigError::NonAscendingThresholds { index: i });
        }
    }
    Ok(())
}
