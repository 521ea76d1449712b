//! Coordinate systems, local bounds and the display surface adapter.

pub mod display;
pub mod mbr;
pub mod system;

// Re-exports
pub use display::DisplaySurface;
pub use mbr::Mbr;
pub use system::{CoordSystem, CoordSystemKind, FlatCoordSystem, PlateCarree, SphericalMercator};
