//! ViewState - immutable per-frame camera snapshot.
//!
//! Built fresh whenever the camera changes. Sampling compares the last
//! evaluated snapshot by value and skips the pass when nothing moved.

use glam::{DMat4, DVec2, DVec3, DVec4};

/// Camera snapshot used for tile importance.
///
/// Model space is display space (see `DisplaySurface`). Projection depth is
/// the [0, 1] range produced by `DMat4::perspective_rh`.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
  /// Display space to world.
  pub model: DMat4,
  /// World to eye.
  pub view: DMat4,
  /// Eye to clip.
  pub projection: DMat4,
  /// `projection * view * model`.
  pub full_matrix: DMat4,
  /// Eye position in model (display) space.
  pub eye_pos: DVec3,
  /// Eye position in world space.
  pub eye_world: DVec3,
  /// Near clip plane distance.
  pub near: f64,
  /// Far clip plane distance.
  pub far: f64,
  /// Frustum corners in model space: near plane (4) then far plane (4).
  pub frustum_corners: [DVec3; 8],
  /// Viewport size in pixels.
  pub screen_size: DVec2,
}

impl ViewState {
  /// Build a snapshot from explicit matrices.
  pub fn new(
    model: DMat4,
    view: DMat4,
    projection: DMat4,
    near: f64,
    far: f64,
    screen_size: DVec2,
  ) -> Self {
    let full_matrix = projection * view * model;
    let eye_world = view.inverse().transform_point3(DVec3::ZERO);
    let eye_pos = model.inverse().transform_point3(eye_world);

    let inv_full = full_matrix.inverse();
    let mut frustum_corners = [DVec3::ZERO; 8];
    let ndc = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    for (plane, z) in [0.0, 1.0].into_iter().enumerate() {
      for (i, (x, y)) in ndc.iter().enumerate() {
        frustum_corners[plane * 4 + i] = inv_full.project_point3(DVec3::new(*x, *y, z));
      }
    }

    Self {
      model,
      view,
      projection,
      full_matrix,
      eye_pos,
      eye_world,
      near,
      far,
      frustum_corners,
      screen_size,
    }
  }

  /// Perspective camera at `eye` looking at `target`, identity model matrix.
  pub fn look_at(
    eye: DVec3,
    target: DVec3,
    up: DVec3,
    fov_y: f64,
    screen_size: DVec2,
    near: f64,
    far: f64,
  ) -> Self {
    let aspect = screen_size.x / screen_size.y.max(1.0);
    let view = DMat4::look_at_rh(eye, target, up);
    let projection = DMat4::perspective_rh(fov_y, aspect, near, far);
    Self::new(DMat4::IDENTITY, view, projection, near, far, screen_size)
  }

  /// Camera above a point of the unit globe, looking at its center.
  ///
  /// `lon`/`lat` are in radians, `height` is in globe radii above the surface.
  pub fn globe_orbit(lon: f64, lat: f64, height: f64, fov_y: f64, screen_size: DVec2) -> Self {
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let dir = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);
    let eye = dir * (1.0 + height);
    let up = if dir.z.abs() > 0.99 { DVec3::Y } else { DVec3::Z };
    let near = (height * 0.01).max(1e-6);
    let far = 1.0 + height + 2.0;
    Self::look_at(eye, DVec3::ZERO, up, fov_y, screen_size, near, far)
  }

  /// Camera straight above a point of the flat display plane.
  pub fn flat_overhead(center: DVec2, height: f64, fov_y: f64, screen_size: DVec2) -> Self {
    let target = DVec3::new(center.x, center.y, 0.0);
    let eye = target + DVec3::Z * height;
    let near = (height * 0.01).max(1e-6);
    Self::look_at(eye, target, DVec3::Y, fov_y, screen_size, near, height * 4.0 + 1.0)
  }

  /// Transform a model-space point into clip space.
  #[inline]
  pub fn to_clip(&self, point: DVec3) -> DVec4 {
    self.full_matrix * point.extend(1.0)
  }

  /// Convert a clip-space point with positive w to pixel coordinates.
  ///
  /// Origin top-left, y down.
  #[inline]
  pub fn clip_to_screen(&self, clip: DVec4) -> DVec2 {
    let ndc = DVec2::new(clip.x / clip.w, clip.y / clip.w);
    DVec2::new(
      (ndc.x + 1.0) * 0.5 * self.screen_size.x,
      (1.0 - ndc.y) * 0.5 * self.screen_size.y,
    )
  }

  /// Viewport area in pixels.
  pub fn screen_area(&self) -> f64 {
    self.screen_size.x * self.screen_size.y
  }
}

#[cfg(test)]
#[path = "view_state_test.rs"]
mod view_state_test;
