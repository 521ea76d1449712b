//! Coordinate systems.
//!
//! A coordinate system defines the local space the quadtree tiles. Tile
//! (x, y, level) covers a `1/2^level` fraction of [`CoordSystem::bounds`] on
//! each axis. Geographic coordinates are (longitude, latitude) in radians.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::Mbr;

/// Capabilities every coordinate system provides.
pub trait CoordSystem {
  /// Convert local coordinates to (longitude, latitude) in radians.
  fn local_to_geographic(&self, local: DVec2) -> DVec2;

  /// Convert (longitude, latitude) in radians to local coordinates.
  fn geographic_to_local(&self, geo: DVec2) -> DVec2;

  /// True when the system has no meaningful mapping onto a sphere.
  fn is_flat(&self) -> bool;

  /// Local extents covered by the level 0 tile(s).
  fn bounds(&self) -> Mbr;

  /// True when the bounds wrap the full 360 degrees of longitude.
  fn is_world_spanning(&self) -> bool {
    false
  }

  /// True when the bounds reach both poles.
  fn covers_poles(&self) -> bool {
    false
  }
}

/// Longitude/latitude in radians used directly as local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlateCarree;

impl CoordSystem for PlateCarree {
  fn local_to_geographic(&self, local: DVec2) -> DVec2 {
    local
  }

  fn geographic_to_local(&self, geo: DVec2) -> DVec2 {
    geo
  }

  fn is_flat(&self) -> bool {
    false
  }

  fn bounds(&self) -> Mbr {
    Mbr::new(DVec2::new(-PI, -FRAC_PI_2), DVec2::new(PI, FRAC_PI_2))
  }

  fn is_world_spanning(&self) -> bool {
    true
  }

  fn covers_poles(&self) -> bool {
    true
  }
}

/// Spherical (web) mercator on the unit sphere.
///
/// Local x is longitude in radians, local y is `ln(tan(pi/4 + lat/2))`. The
/// square bounds [-pi, pi] cut latitude off at roughly 85.0511 degrees, so the
/// poles need separate cap geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SphericalMercator;

impl SphericalMercator {
  /// Latitude at which local y reaches pi.
  pub fn max_latitude() -> f64 {
    2.0 * PI.exp().atan() - FRAC_PI_2
  }
}

impl CoordSystem for SphericalMercator {
  fn local_to_geographic(&self, local: DVec2) -> DVec2 {
    DVec2::new(local.x, 2.0 * local.y.exp().atan() - FRAC_PI_2)
  }

  fn geographic_to_local(&self, geo: DVec2) -> DVec2 {
    let max_lat = Self::max_latitude();
    let lat = geo.y.clamp(-max_lat, max_lat);
    DVec2::new(geo.x, (FRAC_PI_4 + lat / 2.0).tan().ln())
  }

  fn is_flat(&self) -> bool {
    false
  }

  fn bounds(&self) -> Mbr {
    Mbr::new(DVec2::splat(-PI), DVec2::splat(PI))
  }

  fn is_world_spanning(&self) -> bool {
    true
  }
}

/// Cartesian map space with caller-chosen bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatCoordSystem {
  pub bounds: Mbr,
}

impl CoordSystem for FlatCoordSystem {
  fn local_to_geographic(&self, local: DVec2) -> DVec2 {
    local
  }

  fn geographic_to_local(&self, geo: DVec2) -> DVec2 {
    geo
  }

  fn is_flat(&self) -> bool {
    true
  }

  fn bounds(&self) -> Mbr {
    self.bounds
  }
}

/// Coordinate systems by value.
///
/// Sampling params hold one of these so they can be compared structurally and
/// loaded from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordSystemKind {
  PlateCarree,
  SphericalMercator,
  Flat(FlatCoordSystem),
}

impl CoordSystemKind {
  fn inner(&self) -> &dyn CoordSystem {
    match self {
      CoordSystemKind::PlateCarree => &PlateCarree,
      CoordSystemKind::SphericalMercator => &SphericalMercator,
      CoordSystemKind::Flat(flat) => flat,
    }
  }
}

impl CoordSystem for CoordSystemKind {
  fn local_to_geographic(&self, local: DVec2) -> DVec2 {
    self.inner().local_to_geographic(local)
  }

  fn geographic_to_local(&self, geo: DVec2) -> DVec2 {
    self.inner().geographic_to_local(geo)
  }

  fn is_flat(&self) -> bool {
    self.inner().is_flat()
  }

  fn bounds(&self) -> Mbr {
    self.inner().bounds()
  }

  fn is_world_spanning(&self) -> bool {
    self.inner().is_world_spanning()
  }

  fn covers_poles(&self) -> bool {
    self.inner().covers_poles()
  }
}
