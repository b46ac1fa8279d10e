//! Narrow contracts toward the host engine.
//!
//! The core never talks to a renderer or input system directly; it drives
//! these traits. A host binds them to its scene graph, the tests bind
//! them to recorders, and headless tools use [`NullRenderer`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

use crate::terrain::chunk::ChunkCoord;
use crate::terrain::mesh_builder::MeshData;

/// Opaque identifier for one chunk's drawable object, issued by the
/// renderer binding at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle(pub u64);

/// Rendering collaborator. The core calls `create_chunk` exactly once per
/// chunk object and `set_mesh`/`set_collision_mesh` at most once per
/// LOD or collider change; all calls arrive on the consuming thread.
pub trait TerrainRenderer: Send + Sync {
    /// Instantiate a drawable object for a chunk at a world position
    /// (xz plane). The object starts without a mesh.
    fn create_chunk(&self, coord: ChunkCoord, world_position: Vec2) -> ChunkHandle;

    /// Swap the displayed mesh.
    fn set_mesh(&self, handle: ChunkHandle, mesh: Arc<MeshData>);

    /// Swap the collision mesh.
    fn set_collision_mesh(&self, handle: ChunkHandle, mesh: Arc<MeshData>);

    fn set_visible(&self, handle: ChunkHandle, visible: bool);

    /// Tear the object down; the handle is dead afterwards.
    fn remove_chunk(&self, handle: ChunkHandle);
}

/// Source of the viewer's current position on the xz plane. Treated as a
/// pure read, polled once per tick.
pub trait ViewerSource: Send + Sync {
    fn position(&self) -> Vec2;
}

/// Renderer binding that discards everything. Useful for headless
/// generation runs and benchmarks.
pub struct NullRenderer {
    next_handle: AtomicU64,
}

impl NullRenderer {
    pub fn new() -> Self {
        NullRenderer {
            next_handle: AtomicU64::new(0),
        }
    }
}

impl Default for NullRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainRenderer for NullRenderer {
    fn create_chunk(&self, _coord: ChunkCoord, _world_position: Vec2) -> ChunkHandle {
        ChunkHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn set_mesh(&self, _handle: ChunkHandle, _mesh: Arc<MeshData>) {}

    fn set_collision_mesh(&self, _handle: ChunkHandle, _mesh: Arc<MeshData>) {}

    fn set_visible(&self, _handle: ChunkHandle, _visible: bool) {}

    fn remove_chunk(&self, _handle: ChunkHandle) {}
}
