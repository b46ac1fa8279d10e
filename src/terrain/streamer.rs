//! Top-level streaming control loop.
//!
//! Owns the chunk table, decides which coordinates exist, and drives
//! per-tick re-evaluation. All state mutation happens on the thread that
//! calls [`TerrainStreamer::tick`]; workers only ever hand results back
//! through the completion queue.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use glam::Vec2;
use lru::LruCache;
use tracing::{debug, info, warn};

use crate::bridge::{TerrainRenderer, ViewerSource};
use crate::config::{SettingsChanged, TerrainAssets};
use crate::core::event_bus::EventBus;
use crate::error::ConfigError;
use crate::terrain::chunk::{
    ChunkContext, ChunkCoord, TerrainChunk, update_collision_mesh, update_terrain_chunk,
};
use crate::terrain::heightmap::HeightmapGenerator;
use crate::threading::work_queue::WorkQueue;

/// Viewer travel distance that triggers a full window rescan. Visible
/// chunks are re-evaluated every tick regardless.
const VIEWER_MOVE_THRESHOLD: f32 = 25.0;
const SQR_VIEWER_MOVE_THRESHOLD: f32 = VIEWER_MOVE_THRESHOLD * VIEWER_MOVE_THRESHOLD;

/// Extra rings beyond the active window a chunk may occupy before it is
/// retired to the cache.
const RETIRE_BUFFER: i32 = 2;

/// Number of chunk rings covered by the max view distance.
pub(crate) fn chunks_in_distance(max_view_distance: f32, chunk_world_size: f32) -> i32 {
    (max_view_distance / chunk_world_size).round() as i32
}

pub struct TerrainStreamer {
    ctx: Arc<ChunkContext>,
    chunks: HashMap<ChunkCoord, Arc<Mutex<TerrainChunk>>>,
    /// Chunks that left the window, kept for revival instead of being
    /// regenerated. Eviction from here destroys the render object.
    retired: LruCache<ChunkCoord, Arc<Mutex<TerrainChunk>>>,
    chunk_world_size: f32,
    chunks_in_distance: i32,
    viewer_position_old: Option<Vec2>,
    pending_settings: Arc<Mutex<Option<TerrainAssets>>>,
}

impl TerrainStreamer {
    /// Validate the configuration and set up the streaming state. No
    /// worker is spawned until the first `tick`.
    pub fn new(
        assets: &TerrainAssets,
        renderer: Arc<dyn TerrainRenderer>,
        viewer: Arc<dyn ViewerSource>,
        work_queue: Arc<WorkQueue>,
    ) -> Result<Self, ConfigError> {
        let assets = assets.validated()?;
        let ctx = build_context(&assets, renderer, viewer, work_queue)?;
        let chunk_world_size = assets.mesh.mesh_world_size();
        let in_distance = chunks_in_distance(ctx.max_view_distance, chunk_world_size);
        let cache_size = NonZeroUsize::new(assets.chunk_cache_size)
            .unwrap_or(NonZeroUsize::MIN);
        info!(
            chunk_world_size,
            chunks_in_distance = in_distance,
            max_view_distance = ctx.max_view_distance,
            "terrain streamer ready"
        );
        Ok(TerrainStreamer {
            ctx,
            chunks: HashMap::new(),
            retired: LruCache::new(cache_size),
            chunk_world_size,
            chunks_in_distance: in_distance,
            viewer_position_old: None,
            pending_settings: Arc::new(Mutex::new(None)),
        })
    }

    /// Subscribe to [`SettingsChanged`] events. The newest published
    /// configuration is applied at the start of the next tick.
    pub fn connect_settings_channel(&self, bus: &EventBus) {
        let pending = Arc::clone(&self.pending_settings);
        bus.subscribe(move |event: &SettingsChanged| {
            *pending.lock().unwrap() = Some(event.assets.clone());
        });
    }

    /// One iteration of the consuming loop: apply pending settings, drain
    /// completed worker results, re-evaluate visible chunks, and rescan
    /// the coordinate window if the viewer moved far enough.
    pub fn tick(&mut self) {
        self.apply_pending_settings();
        self.ctx.work_queue.drain();

        let viewer_position = self.ctx.viewer.position();

        // Chunks already visible get fresh LOD and collider evaluation
        // every tick for smooth transitions.
        let visible_coords: Vec<ChunkCoord> = self
            .ctx
            .visible
            .lock()
            .unwrap()
            .iter()
            .copied()
            .collect();
        for coord in &visible_coords {
            if let Some(chunk) = self.chunks.get(coord) {
                update_terrain_chunk(chunk, &self.ctx);
                update_collision_mesh(chunk, &self.ctx);
            }
        }

        // The full window scan is rate-limited by viewer travel.
        let rescan = self
            .viewer_position_old
            .is_none_or(|old| (old - viewer_position).length_squared() > SQR_VIEWER_MOVE_THRESHOLD);
        if rescan {
            self.viewer_position_old = Some(viewer_position);
            self.update_visible_chunks(viewer_position, &visible_coords);
        }
    }

    /// Number of chunks currently in the active table.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Coordinates currently marked visible.
    pub fn visible_coords(&self) -> Vec<ChunkCoord> {
        self.ctx.visible.lock().unwrap().iter().copied().collect()
    }

    /// Replace the configuration: existing chunks are discarded and the
    /// terrain regenerates under the new settings.
    pub fn reconfigure(&mut self, assets: &TerrainAssets) -> Result<(), ConfigError> {
        let assets = assets.validated()?;
        let ctx = build_context(
            &assets,
            Arc::clone(&self.ctx.renderer),
            Arc::clone(&self.ctx.viewer),
            Arc::clone(&self.ctx.work_queue),
        )?;

        for (_, chunk) in self.chunks.drain() {
            let mut guard = chunk.lock().unwrap();
            guard.detach();
            self.ctx.renderer.remove_chunk(guard.handle());
        }
        while let Some((_, chunk)) = self.retired.pop_lru() {
            let mut guard = chunk.lock().unwrap();
            guard.detach();
            self.ctx.renderer.remove_chunk(guard.handle());
        }
        self.ctx.visible.lock().unwrap().clear();

        self.chunk_world_size = assets.mesh.mesh_world_size();
        self.chunks_in_distance = chunks_in_distance(ctx.max_view_distance, self.chunk_world_size);
        self.retired.resize(
            NonZeroUsize::new(assets.chunk_cache_size).unwrap_or(NonZeroUsize::MIN),
        );
        self.ctx = ctx;
        self.viewer_position_old = None;
        info!("terrain streamer reconfigured, world regenerates");
        Ok(())
    }

    fn apply_pending_settings(&mut self) {
        let pending = self.pending_settings.lock().unwrap().take();
        if let Some(assets) = pending {
            if let Err(error) = self.reconfigure(&assets) {
                warn!(%error, "rejected settings update, keeping previous configuration");
            }
        }
    }

    fn update_visible_chunks(&mut self, viewer_position: Vec2, already_updated: &[ChunkCoord]) {
        let current_chunk_x = (viewer_position.x / self.chunk_world_size).round() as i32;
        let current_chunk_z = (viewer_position.y / self.chunk_world_size).round() as i32;
        let already: HashSet<ChunkCoord> = already_updated.iter().copied().collect();

        for z_offset in -self.chunks_in_distance..=self.chunks_in_distance {
            for x_offset in -self.chunks_in_distance..=self.chunks_in_distance {
                let coord =
                    ChunkCoord::new(current_chunk_x + x_offset, current_chunk_z + z_offset);
                if already.contains(&coord) {
                    continue;
                }
                if let Some(chunk) = self.chunks.get(&coord) {
                    update_terrain_chunk(chunk, &self.ctx);
                } else if let Some(chunk) = self.retired.pop(&coord) {
                    debug!(?coord, "revived retired chunk");
                    self.chunks.insert(coord, Arc::clone(&chunk));
                    update_terrain_chunk(&chunk, &self.ctx);
                } else {
                    let chunk = TerrainChunk::create(coord, &self.ctx);
                    TerrainChunk::load(&chunk, &self.ctx);
                    self.chunks.insert(coord, chunk);
                }
            }
        }

        self.retire_distant_chunks(current_chunk_x, current_chunk_z);
    }

    /// Move chunks far outside the window into the retirement cache.
    fn retire_distant_chunks(&mut self, current_chunk_x: i32, current_chunk_z: i32) {
        let keep_distance = self.chunks_in_distance + RETIRE_BUFFER;
        let to_retire: Vec<ChunkCoord> = self
            .chunks
            .keys()
            .filter(|coord| {
                (coord.x - current_chunk_x).abs() > keep_distance
                    || (coord.z - current_chunk_z).abs() > keep_distance
            })
            .copied()
            .collect();

        for coord in to_retire {
            let Some(chunk) = self.chunks.remove(&coord) else {
                continue;
            };
            {
                let mut guard = chunk.lock().unwrap();
                if guard.is_visible() {
                    guard.set_hidden();
                    self.ctx.renderer.set_visible(guard.handle(), false);
                    self.ctx.visible.lock().unwrap().remove(&coord);
                }
            }
            if let Some((old_coord, old_chunk)) = self.retired.push(coord, chunk) {
                // An older chunk fell off the end of the cache; its
                // render object goes with it.
                if old_coord != coord {
                    let mut guard = old_chunk.lock().unwrap();
                    guard.detach();
                    self.ctx.renderer.remove_chunk(guard.handle());
                    debug!(?old_coord, "evicted chunk from retirement cache");
                }
            }
        }
    }
}

fn build_context(
    assets: &TerrainAssets,
    renderer: Arc<dyn TerrainRenderer>,
    viewer: Arc<dyn ViewerSource>,
    work_queue: Arc<WorkQueue>,
) -> Result<Arc<ChunkContext>, ConfigError> {
    let num_verts = assets.mesh.num_verts_per_line();
    let generator = HeightmapGenerator::new(&assets.heightmap, num_verts, num_verts)?;
    let max_view_distance = assets
        .detail_levels
        .last()
        .map(|level| level.visible_distance_threshold)
        .ok_or(ConfigError::EmptyDetailLevels)?;
    Ok(Arc::new(ChunkContext {
        work_queue,
        renderer,
        viewer,
        generator: Arc::new(generator),
        mesh_settings: assets.mesh.clone(),
        detail_levels: assets.detail_levels.clone().into(),
        collider_lod_index: assets.collider_lod_index,
        collider_commit_distance: assets.collider_commit_distance,
        max_view_distance,
        visible: Mutex::new(HashSet::new()),
    }))
}
