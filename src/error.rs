use thiserror::Error;

/// Errors raised while loading or validating configuration records.
///
/// Soft violations (noise scale too small, octaves below one, persistence
/// outside [0,1]) are clamped during validation and never surface here.
/// Anything in this enum aborts streamer construction before a single
/// worker is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("detail level table is empty")]
    EmptyDetailLevels,

    #[error("detail level thresholds must be strictly ascending (entry {index})")]
    NonAscendingThresholds { index: usize },

    #[error("detail level {index} has non-positive visible distance threshold")]
    NonPositiveThreshold { index: usize },

    #[error("lod {lod} exceeds the maximum supported lod {max}")]
    LodOutOfRange { lod: usize, max: usize },

    #[error("chunk size index {index} out of range (table holds {max} entries)")]
    ChunkSizeIndexOutOfRange { index: usize, max: usize },

    #[error("flat-shaded chunk size index {index} out of range (only {max} sizes supported)")]
    FlatShadedSizeUnsupported { index: usize, max: usize },

    #[error("collider lod index {index} out of range for {len} detail levels")]
    ColliderLodOutOfRange { index: usize, len: usize },

    #[error("mesh scale must be positive, got {0}")]
    NonPositiveMeshScale(f32),

    #[error("global height scale must be positive, got {0}")]
    NonPositiveGlobalScale(f32),

    #[error("invalid response curve: {0}")]
    InvalidCurve(String),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read config file")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config")]
    ParseToml(#[from] toml::de::Error),

    #[error("failed to parse JSON config")]
    ParseJson(#[from] serde_json::Error),
}
