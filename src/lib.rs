//! Streaming procedural terrain.
//!
//! An unbounded heightmap terrain around a moving viewpoint: layered
//! fractal noise produces chunk heightmaps, a LOD-aware mesh builder
//! turns them into seam-free geometry, and a streaming manager decides
//! which chunks exist and at what detail. All generation runs on worker
//! threads; all render-facing mutation is confined to the single thread
//! that drives [`terrain::TerrainStreamer::tick`].
//!
//! The host engine is reached only through the narrow traits in
//! [`bridge`]; settings are plain records loaded and validated by
//! [`config`] before any work starts.
//!
//! ```no_run
//! use std::sync::Arc;
//! use terrastream::bridge::{NullRenderer, ViewerSource};
//! use terrastream::config::TerrainAssets;
//! use terrastream::terrain::TerrainStreamer;
//! use terrastream::threading::WorkQueue;
//!
//! struct OriginViewer;
//! impl ViewerSource for OriginViewer {
//!     fn position(&self) -> glam::Vec2 {
//!         glam::Vec2::ZERO
//!     }
//! }
//!
//! let mut streamer = TerrainStreamer::new(
//!     &TerrainAssets::default(),
//!     Arc::new(NullRenderer::new()),
//!     Arc::new(OriginViewer),
//!     Arc::new(WorkQueue::new()),
//! )?;
//! loop {
//!     streamer.tick();
//!     # break;
//! }
//! # Ok::<(), terrastream::ConfigError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod terrain;
pub mod threading;

pub use config::{SettingsChanged, TerrainAssets};
pub use error::ConfigError;
pub use terrain::{HeightmapSettings, LodInfo, MeshSettings, TerrainStreamer};
pub use threading::WorkQueue;
