//! quadtile - Engine independent quadtree tile selection and loading
//!
//! This crate decides which map tiles a camera needs, loads their content off
//! the render thread and hands the results to the renderer as ordered batches
//! of scene changes.
//!
//! # Features
//!
//! - **Importance sampling**: tiles are split while their projected screen area
//!   stays above a threshold, with per-level overrides and a tile cap
//! - **Incremental updates**: each pass reports only the tiles added, removed
//!   or re-skirted since the last one, within a per-pass churn budget
//! - **Edge matching**: skirts on tiles whose neighbours sit at another level
//! - **Tile loader**: fetch, interpret and merge with generation-based
//!   cancellation, multi-frame tiles and throttled parsing on rayon
//! - **Change queue**: renderer-agnostic scene tables fed by `ChangeSet`s and
//!   drained on the render thread
//!
//! # Example
//!
//! ```ignore
//! use quadtile::{QuadSamplingController, SamplingParams, Scene, TileGeometryBuilder};
//! use quadtile::coord::DisplaySurface;
//!
//! let scene = Scene::new();
//! let mut controller = QuadSamplingController::new(SamplingParams::default(), DisplaySurface::Globe);
//! controller.add_builder(Arc::new(Mutex::new(TileGeometryBuilder::new())));
//!
//! // Each frame:
//! controller.update_view(&view, &scene);
//! controller.tick(&scene);
//! scene.process_changes(&mut renderer, Some(&view), scene.current_time());
//! ```

pub mod error;
pub mod identity;

pub use error::{FetchError, QuadTileError, Result};
pub use identity::{SimpleIdentity, EMPTY_IDENTITY};

// Coordinate systems and display surface
pub mod coord;

// Camera snapshots
pub mod view;
pub use view::ViewState;

// Tile selection
pub mod quadtree;
pub use quadtree::{
  PassStats, QuadSamplingController, QuadTileBuilder, QuadTreeIdentifier, SamplingParams, TileBatch, TileBudget,
};

// Scene tables and the change queue
pub mod scene;
pub use scene::{ChangeRequest, ChangeSet, RenderBackend, Scene};

// Placeholder tile geometry
pub mod builder;
pub use builder::TileGeometryBuilder;

// Fetch, interpret, merge
pub mod loader;
pub use loader::{LoaderConfig, QuadTileLoader};

// Layer thread
pub mod layer;
pub use layer::{LayerConfig, LayerHandle, QuadDisplayLayer};

// Feature-gated metrics
pub mod metrics;

#[cfg(test)]
mod test_utils;
