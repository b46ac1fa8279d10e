//! Per-chunk lifecycle: heightmap request, LOD mesh cache, visibility.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use glam::Vec2;
use tracing::debug;

use crate::bridge::{ChunkHandle, TerrainRenderer, ViewerSource};
use crate::terrain::heightmap::{Heightmap, HeightmapGenerator};
use crate::terrain::mesh_builder::{MeshData, build_terrain_mesh};
use crate::terrain::settings::{LodInfo, MeshSettings};
use crate::threading::work_queue::WorkQueue;

/// Integer grid position of a chunk. Unique key in the streamer's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkCoord { x, z }
    }

    pub fn world_position(&self, chunk_world_size: f32) -> Vec2 {
        Vec2::new(self.x as f32, self.z as f32) * chunk_world_size
    }
}

/// Axis-aligned bounds on the xz plane.
#[derive(Debug, Clone, Copy)]
pub struct Bounds2 {
    center: Vec2,
    half_extents: Vec2,
}

impl Bounds2 {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Bounds2 {
            center,
            half_extents: size * 0.5,
        }
    }

    /// Squared distance from `point` to the closest point of the bounds;
    /// zero inside.
    pub fn sqr_distance(&self, point: Vec2) -> f32 {
        let delta = ((point - self.center).abs() - self.half_extents).max(Vec2::ZERO);
        delta.length_squared()
    }
}

/// Everything chunk updates need besides the chunk itself. Built once by
/// the streamer, shared with every completion callback.
pub(crate) struct ChunkContext {
    pub work_queue: Arc<WorkQueue>,
    pub renderer: Arc<dyn TerrainRenderer>,
    pub viewer: Arc<dyn ViewerSource>,
    pub generator: Arc<HeightmapGenerator>,
    pub mesh_settings: MeshSettings,
    pub detail_levels: Arc<[LodInfo]>,
    pub collider_lod_index: usize,
    pub collider_commit_distance: f32,
    pub max_view_distance: f32,
    /// Coordinates of currently visible chunks, maintained through
    /// visibility transitions so the streamer can re-evaluate them every
    /// tick. Only touched from the consuming thread.
    pub visible: Mutex<HashSet<ChunkCoord>>,
}

/// Cache slot for one LOD level: not requested -> requested -> available.
struct LodMesh {
    lod: usize,
    requested: bool,
    mesh: Option<Arc<MeshData>>,
}

pub struct TerrainChunk {
    coord: ChunkCoord,
    sample_center: Vec2,
    bounds: Bounds2,
    handle: ChunkHandle,
    heightmap: Option<Arc<Heightmap>>,
    lod_meshes: Vec<LodMesh>,
    previous_lod_index: Option<usize>,
    visible: bool,
    has_set_collider: bool,
    /// Set when the streamer discards the chunk for good. Late worker
    /// results still land in the cache but stop driving the renderer.
    detached: bool,
}

impl TerrainChunk {
    /// Create the chunk object and its drawable, invisible until its
    /// heightmap arrives.
    pub(crate) fn create(coord: ChunkCoord, ctx: &Arc<ChunkContext>) -> Arc<Mutex<TerrainChunk>> {
        let chunk_world_size = ctx.mesh_settings.mesh_world_size();
        let position = coord.world_position(chunk_world_size);
        let sample_center = position / ctx.mesh_settings.mesh_scale;
        let bounds = Bounds2::new(position, Vec2::splat(chunk_world_size));

        let handle = ctx.renderer.create_chunk(coord, position);
        ctx.renderer.set_visible(handle, false);

        let lod_meshes = ctx
            .detail_levels
            .iter()
            .map(|level| LodMesh {
                lod: level.lod,
                requested: false,
                mesh: None,
            })
            .collect();

        Arc::new(Mutex::new(TerrainChunk {
            coord,
            sample_center,
            bounds,
            handle,
            heightmap: None,
            lod_meshes,
            previous_lod_index: None,
            visible: false,
            has_set_collider: false,
            detached: false,
        }))
    }

    /// Submit the heightmap request. The chunk becomes ready on the drain
    /// that delivers it, then immediately evaluates visibility and LOD.
    pub(crate) fn load(chunk: &Arc<Mutex<TerrainChunk>>, ctx: &Arc<ChunkContext>) {
        let generator = Arc::clone(&ctx.generator);
        let sample_center = chunk.lock().unwrap().sample_center;
        let chunk_cb = Arc::clone(chunk);
        let ctx_cb = Arc::clone(ctx);
        ctx.work_queue.submit(
            move || generator.generate(sample_center),
            move |heightmap| {
                chunk_cb.lock().unwrap().heightmap = Some(Arc::new(heightmap));
                update_terrain_chunk(&chunk_cb, &ctx_cb);
            },
        );
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_heightmap(&self) -> bool {
        self.heightmap.is_some()
    }

    pub(crate) fn handle(&self) -> ChunkHandle {
        self.handle
    }

    pub(crate) fn detach(&mut self) {
        self.detached = true;
    }

    pub(crate) fn set_hidden(&mut self) {
        self.visible = false;
    }
}

/// First index whose threshold covers `distance`, scanning the ascending
/// table; clamps to the coarsest level beyond the last threshold.
pub(crate) fn select_lod(detail_levels: &[LodInfo], distance: f32) -> usize {
    let mut lod_index = 0;
    for i in 0..detail_levels.len() - 1 {
        if distance > detail_levels[i].visible_distance_threshold {
            lod_index = i + 1;
        } else {
            break;
        }
    }
    lod_index
}

/// Re-evaluate visibility and LOD against the current viewer position.
///
/// Shows the cached mesh for the newly selected LOD when available,
/// otherwise requests it and keeps showing the previous mesh, never a
/// blocking wait. A mesh arriving for a LOD that is no longer selected
/// stays cached and unused.
pub(crate) fn update_terrain_chunk(chunk: &Arc<Mutex<TerrainChunk>>, ctx: &Arc<ChunkContext>) {
    let mut guard = chunk.lock().unwrap();
    if guard.heightmap.is_none() || guard.detached {
        return;
    }

    let viewer_position = ctx.viewer.position();
    let distance_to_viewer = guard.bounds.sqr_distance(viewer_position).sqrt();
    let was_visible = guard.visible;
    let visible = distance_to_viewer <= ctx.max_view_distance;

    if visible {
        let lod_index = select_lod(&ctx.detail_levels, distance_to_viewer);
        if guard.previous_lod_index != Some(lod_index) {
            if let Some(mesh) = guard.lod_meshes[lod_index].mesh.clone() {
                guard.previous_lod_index = Some(lod_index);
                ctx.renderer.set_mesh(guard.handle, mesh);
            } else if !guard.lod_meshes[lod_index].requested {
                request_mesh(&mut guard, chunk, ctx, lod_index);
            }
        }
    }

    if was_visible != visible {
        guard.visible = visible;
        ctx.renderer.set_visible(guard.handle, visible);
        let coord = guard.coord;
        drop(guard);
        let mut visible_set = ctx.visible.lock().unwrap();
        if visible {
            visible_set.insert(coord);
        } else {
            visible_set.remove(&coord);
        }
    }
}

/// Collider handling for chunks near the viewer: request the designated
/// collider LOD early, commit it once within the commit distance.
/// One-shot; never re-requested for this chunk instance after commit.
pub(crate) fn update_collision_mesh(chunk: &Arc<Mutex<TerrainChunk>>, ctx: &Arc<ChunkContext>) {
    let mut guard = chunk.lock().unwrap();
    if guard.has_set_collider || guard.heightmap.is_none() || guard.detached {
        return;
    }

    let sqr_distance_to_edge = guard.bounds.sqr_distance(ctx.viewer.position());
    let collider_index = ctx.collider_lod_index;

    if sqr_distance_to_edge < ctx.detail_levels[collider_index].sqr_visible_distance_threshold()
        && !guard.lod_meshes[collider_index].requested
    {
        request_mesh(&mut guard, chunk, ctx, collider_index);
    }

    if sqr_distance_to_edge < ctx.collider_commit_distance * ctx.collider_commit_distance {
        if let Some(mesh) = guard.lod_meshes[collider_index].mesh.clone() {
            ctx.renderer.set_collision_mesh(guard.handle, mesh);
            guard.has_set_collider = true;
            debug!(coord = ?guard.coord, "collision mesh committed");
        }
    }
}

/// Submit a mesh build for one LOD slot. Called with the chunk lock held;
/// the submission only enqueues work, the completion callback re-locks on
/// a later drain.
fn request_mesh(
    guard: &mut TerrainChunk,
    chunk: &Arc<Mutex<TerrainChunk>>,
    ctx: &Arc<ChunkContext>,
    lod_index: usize,
) {
    let Some(heightmap) = guard.heightmap.clone() else {
        return;
    };
    guard.lod_meshes[lod_index].requested = true;
    let lod = guard.lod_meshes[lod_index].lod;
    let mesh_settings = ctx.mesh_settings.clone();
    let chunk_cb = Arc::clone(chunk);
    let ctx_cb = Arc::clone(ctx);
    ctx.work_queue.submit(
        move || build_terrain_mesh(&heightmap.values, &mesh_settings, lod),
        move |mesh| {
            chunk_cb.lock().unwrap().lod_meshes[lod_index].mesh = Some(Arc::new(mesh));
            update_terrain_chunk(&chunk_cb, &ctx_cb);
            if lod_index == ctx_cb.collider_lod_index {
                update_collision_mesh(&chunk_cb, &ctx_cb);
            }
        },
    );
}
