//! Quadtree module for importance-driven tile selection.
//!
//! The tree is implicit: only the loaded set is stored, parent/child and
//! neighbor relationships are computed from `(x, y, level)`.
//!
//! # Level Convention
//!
//! Level 0 = one tile covering the whole coordinate system, higher = finer.
//!
//! ```text
//! Tile Size = bounds.size() / 2^level
//! ```
//!
//! # Module Structure
//!
//! - [`node`]: `QuadTreeIdentifier` - immutable tile identifier and ordering
//! - [`params`]: `SamplingParams` - per-layer configuration
//! - [`budget`]: `TileBudget` churn limits and `PassStats`
//! - [`importance`]: screen-space area of a tile under a view
//! - [`edge`]: `EdgeMatch` skirt flags
//! - [`sampling`]: `QuadSamplingController` and the `QuadTileBuilder` delegate

pub mod budget;
pub mod edge;
pub mod importance;
pub mod node;
pub mod params;
pub mod sampling;

// Re-exports
pub use budget::{PassStats, TileBudget};
pub use edge::{compute_edge_match, EdgeMatch};
pub use importance::ImportanceCalculator;
pub use node::{Edge, QuadTreeIdentifier, MAX_LEVEL};
pub use params::SamplingParams;
pub use sampling::{
  BuilderContext, BuilderId, ControllerId, Pole, QuadSamplingController, QuadTileBuilder, SharedBuilder, TileBatch,
  TileBuildRequest,
};
