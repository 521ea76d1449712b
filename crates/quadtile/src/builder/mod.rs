//! Tile geometry: grid meshes, skirts, pole caps and the geometry builder.
//!
//! # Module Structure
//!
//! - [`mesh`]: `TileMesh`, `build_tile_mesh`, `build_pole_cap`
//! - [`geometry`]: `TileGeometryBuilder` - one drawable per loaded tile

pub mod geometry;
pub mod mesh;

// Re-exports
pub use geometry::TileGeometryBuilder;
pub use mesh::{build_pole_cap, build_tile_mesh, MeshSettings, TileMesh};
