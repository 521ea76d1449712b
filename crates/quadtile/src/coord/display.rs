//! Display surface - maps local coordinates into the renderer's 3D space.
//!
//! Globe: unit sphere, x = cos(lat)cos(lon), y = cos(lat)sin(lon), z = sin(lat).
//! Flat: the coordinate system bounds scaled so their width spans [-1, 1] on
//! the XY plane, +Z up.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::{CoordSystem, CoordSystemKind};

/// Which surface tiles are draped over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySurface {
  #[default]
  Globe,
  Flat,
}

impl DisplaySurface {
  /// Convert a local coordinate to display space.
  pub fn local_to_display(&self, cs: &CoordSystemKind, local: DVec2) -> DVec3 {
    match self {
      DisplaySurface::Globe => {
        let geo = cs.local_to_geographic(local);
        let (sin_lon, cos_lon) = geo.x.sin_cos();
        let (sin_lat, cos_lat) = geo.y.sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
      }
      DisplaySurface::Flat => {
        let bounds = cs.bounds();
        let scale = 2.0 / bounds.size().x.max(f64::EPSILON);
        let p = (local - bounds.center()) * scale;
        DVec3::new(p.x, p.y, 0.0)
      }
    }
  }

  /// Convert (longitude, latitude) in radians to display space.
  pub fn geographic_to_display(&self, cs: &CoordSystemKind, geo: DVec2) -> DVec3 {
    self.local_to_display(cs, cs.geographic_to_local(geo))
  }

  /// Outward surface normal at a display-space point on the surface.
  pub fn normal_at(&self, point: DVec3) -> DVec3 {
    match self {
      DisplaySurface::Globe => point.normalize_or_zero(),
      DisplaySurface::Flat => DVec3::Z,
    }
  }

  /// Height of a display-space eye position above the surface.
  pub fn height_above_surface(&self, eye: DVec3) -> f64 {
    match self {
      DisplaySurface::Globe => eye.length() - 1.0,
      DisplaySurface::Flat => eye.z,
    }
  }

  /// True when the surface at `point` faces the eye.
  ///
  /// Always true for flat surfaces; the plane is viewed from above or culled
  /// by the frustum.
  pub fn faces_eye(&self, point: DVec3, eye: DVec3) -> bool {
    match self {
      DisplaySurface::Globe => self.normal_at(point).dot(eye - point) > -1e-9,
      DisplaySurface::Flat => true,
    }
  }

  /// True for the globe surface.
  pub fn is_globe(&self) -> bool {
    matches!(self, DisplaySurface::Globe)
  }
}
