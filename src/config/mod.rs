//! Configuration records and file loading.
//!
//! The terrain core consumes plain immutable settings structs; this
//! module is the external configuration layer that produces them. Files
//! are TOML or JSON, deserialized with serde and validated before any
//! generation work starts. A malformed configuration is the only
//! condition that aborts, and it is caught here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::terrain::settings::{
    HeightmapSettings, LodInfo, MeshSettings, validate_detail_levels,
};

fn default_collider_commit_distance() -> f32 {
    10.0
}

fn default_chunk_cache_size() -> usize {
    400
}

/// The full set of records the streamer needs: heightmap settings, mesh
/// settings, the LOD table and streaming tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainAssets {
    /// Index into `detail_levels` whose mesh doubles as the collision
    /// surface.
    pub collider_lod_index: usize,
    /// Distance to the chunk edge below which the collider is committed.
    #[serde(default = "default_collider_commit_distance")]
    pub collider_commit_distance: f32,
    /// Capacity of the retired-chunk cache.
    #[serde(default = "default_chunk_cache_size")]
    pub chunk_cache_size: usize,
    pub heightmap: HeightmapSettings,
    pub mesh: MeshSettings,
    pub detail_levels: Vec<LodInfo>,
}

impl Default for TerrainAssets {
    fn default() -> Self {
        TerrainAssets {
            collider_lod_index: 0,
            collider_commit_distance: default_collider_commit_distance(),
            chunk_cache_size: default_chunk_cache_size(),
            heightmap: HeightmapSettings::default(),
            mesh: MeshSettings::default(),
            detail_levels: vec![
                LodInfo { lod: 0, visible_distance_threshold: 150.0 },
                LodInfo { lod: 1, visible_distance_threshold: 300.0 },
                LodInfo { lod: 2, visible_distance_threshold: 450.0 },
            ],
        }
    }
}

impl TerrainAssets {
    /// Validate the whole record set. Soft limits are clamped into a
    /// corrected copy; structural problems are errors.
    pub fn validated(&self) -> Result<TerrainAssets, ConfigError> {
        validate_detail_levels(&self.detail_levels)?;
        if self.collider_lod_index >= self.detail_levels.len() {
            return Err(ConfigError::ColliderLodOutOfRange {
                index: self.collider_lod_index,
                len: self.detail_levels.len(),
            });
        }
        let mut out = self.clone();
        out.heightmap = self.heightmap.validated()?;
        out.mesh = self.mesh.validated()?;
        out.collider_commit_distance = self.collider_commit_distance.max(0.0);
        out.chunk_cache_size = self.chunk_cache_size.max(1);
        Ok(out)
    }

    /// Load and validate from a `.toml` or `.json` file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<TerrainAssets, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let assets: TerrainAssets = match extension.as_str() {
            "toml" => toml::from_str(&contents)?,
            "json" => serde_json::from_str(&contents)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        info!(path = %path.display(), "loaded terrain config");
        assets.validated()
    }
}

/// Published on the event bus when the external layer has a new validated
/// configuration; the streamer applies it on its next tick.
#[derive(Debug, Clone)]
pub struct SettingsChanged {
    pub assets: TerrainAssets,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE_TOML: &str = r#"
collider_lod_index = 1

[heightmap]
normalize_mode = "Global"
use_falloff = true
height_multiplier = 25.0

[heightmap.noise]
global_height_scale = 1.0

[[heightmap.noise.layers]]
enabled = true
strength = 1.0
use_first_layer_as_mask = false

[heightmap.noise.layers.filter]
algorithm = "Perlin"
scale = 60.0
octaves = 5
persistence = 0.5
lacunarity = 2.0
seed = 1337
offset = [0.0, 0.0]

[[heightmap.noise.layers]]
enabled = true
strength = 0.4
use_first_layer_as_mask = true

[heightmap.noise.layers.filter]
algorithm = "Ridged"
scale = 30.0
octaves = 4
persistence = 0.55
base_roughness = 1.0
roughness = 2.2
seed = 7

[heightmap.falloff_curve]
keys = [{ t = 0.0, value = 0.0 }, { t = 0.6, value = 0.2 }, { t = 1.0, value = 1.0 }]

[heightmap.height_curve]
keys = [{ t = 0.0, value = 0.0 }, { t = 1.0, value = 1.0 }]

[mesh]
chunk_size_index = 2
flat_shaded_chunk_size_index = 0
mesh_scale = 2.5
use_flat_shading = false

[[detail_levels]]
lod = 0
visible_distance_threshold = 200.0

[[detail_levels]]
lod = 2
visible_distance_threshold = 500.0

[[detail_levels]]
lod = 4
visible_distance_threshold = 1000.0
"#;

    #[test]
    fn test_load_toml_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(EXAMPLE_TOML.as_bytes()).unwrap();
        let assets = TerrainAssets::load_from_file(file.path()).unwrap();
        assert_eq!(assets.detail_levels.len(), 3);
        assert_eq!(assets.collider_lod_index, 1);
        assert_eq!(assets.mesh.chunk_size_index, 2);
        assert!(assets.heightmap.use_falloff);
        assert_eq!(assets.heightmap.noise.layers.len(), 2);
        // Defaults fill in unspecified tunables.
        assert_eq!(assets.collider_commit_distance, 10.0);
        assert_eq!(assets.chunk_cache_size, 400);
    }

    #[test]
    fn test_load_json_config() {
        let assets = TerrainAssets::default();
        let json = serde_json::to_string(&assets).unwrap();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let loaded = TerrainAssets::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.detail_levels.len(), assets.detail_levels.len());
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b"whatever").unwrap();
        assert!(matches!(
            TerrainAssets::load_from_file(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let assets = TerrainAssets::default();
        let text = toml::to_string(&assets).unwrap();
        let back: TerrainAssets = toml::from_str(&text).unwrap();
        assert_eq!(back.detail_levels.len(), assets.detail_levels.len());
        assert_eq!(back.mesh.chunk_size_index, assets.mesh.chunk_size_index);
    }

    #[test]
    fn test_validation_rejects_bad_collider_index() {
        let assets = TerrainAssets {
            collider_lod_index: 9,
            ..TerrainAssets::default()
        };
        assert!(matches!(
            assets.validated(),
            Err(ConfigError::ColliderLodOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_validation_rejects_empty_detail_levels() {
        let assets = TerrainAssets {
            detail_levels: Vec::new(),
            collider_lod_index: 0,
            ..TerrainAssets::default()
        };
        assert!(assets.validated().is_err());
    }

    #[test]
    fn test_validation_clamps_soft_fields() {
        let assets = TerrainAssets {
            chunk_cache_size: 0,
            collider_commit_distance: -5.0,
            ..TerrainAssets::default()
        };
        let validated = assets.validated().unwrap();
        assert_eq!(validated.chunk_cache_size, 1);
        assert_eq!(validated.collider_commit_distance, 0.0);
    }
}
