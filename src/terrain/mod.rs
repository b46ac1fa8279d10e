// Export all components from the terrain module
pub mod chunk;
pub mod curve;
pub mod grid;
pub mod heightmap;
pub mod mesh_builder;
pub mod noise;
pub mod settings;
pub mod streamer;

// Re-export main types for easier access
pub use chunk::{ChunkCoord, TerrainChunk};
pub use curve::{CurveKey, ResponseCurve};
pub use grid::FloatGrid;
pub use heightmap::{FalloffMap, Heightmap, HeightmapGenerator};
pub use mesh_builder::{MeshData, build_terrain_mesh};
pub use noise::NoiseField;
pub use settings::{
    HeightmapSettings, LodInfo, MeshSettings, NoiseLayer, NoiseLayerConfig, NormalizeMode,
};
pub use streamer::TerrainStreamer;
