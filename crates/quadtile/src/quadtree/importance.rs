//! Screen-space importance of a tile.
//!
//! Importance is the on-screen area, in pixels², of the tile surface that
//! faces the camera. The tile is sampled on its tessellation grid; each cell
//! is back-face tested (globe), clipped against the near plane, projected and
//! dropped when its screen bounds miss the viewport. The remaining cell areas
//! are summed and scaled by `bounds_scale²`.

use glam::{DVec2, DVec3, DVec4};
use smallvec::SmallVec;

use crate::coord::{CoordSystem, CoordSystemKind, DisplaySurface, Mbr};
use crate::view::ViewState;

use super::{QuadTreeIdentifier, SamplingParams};

/// Upper bound on grid cells per axis used for importance sampling.
const MAX_SAMPLE_CELLS: u32 = 16;

/// Computes tile importance for one view and one configuration.
pub struct ImportanceCalculator<'a> {
  cs: &'a CoordSystemKind,
  bounds: Mbr,
  display: DisplaySurface,
  view: &'a ViewState,
  viewport: Mbr,
  clip_bounds: Option<Mbr>,
  cells_x: u32,
  cells_y: u32,
  area_scale: f64,
}

impl<'a> ImportanceCalculator<'a> {
  pub fn new(
    params: &SamplingParams,
    cs: &'a CoordSystemKind,
    display: DisplaySurface,
    view: &'a ViewState,
  ) -> Self {
    Self {
      cs,
      bounds: cs.bounds(),
      display,
      view,
      viewport: Mbr::new(DVec2::ZERO, view.screen_size.max(DVec2::ONE)),
      clip_bounds: params.clip_bounds,
      cells_x: params.tessellation_x.clamp(1, MAX_SAMPLE_CELLS),
      cells_y: params.tessellation_y.clamp(1, MAX_SAMPLE_CELLS),
      area_scale: params.bounds_scale * params.bounds_scale,
    }
  }

  /// Importance of a tile. 0 means invisible or clipped away.
  pub fn importance(&self, ident: &QuadTreeIdentifier) -> f64 {
    let tile_bounds = ident.local_bounds(&self.bounds);
    if let Some(clip) = &self.clip_bounds {
      if !clip.overlaps(&tile_bounds) {
        return 0.0;
      }
    }

    let (nx, ny) = (self.cells_x as usize, self.cells_y as usize);
    let size = tile_bounds.size();
    let mut display_pts: Vec<DVec3> = Vec::with_capacity((nx + 1) * (ny + 1));
    for iy in 0..=ny {
      for ix in 0..=nx {
        let local = tile_bounds.ll + DVec2::new(size.x * ix as f64 / nx as f64, size.y * iy as f64 / ny as f64);
        display_pts.push(self.display.local_to_display(self.cs, local));
      }
    }
    let clip_pts: Vec<DVec4> = display_pts.iter().map(|p| self.view.to_clip(*p)).collect();

    let idx = |ix: usize, iy: usize| iy * (nx + 1) + ix;
    let mut area = 0.0;
    for iy in 0..ny {
      for ix in 0..nx {
        let corners = [idx(ix, iy), idx(ix + 1, iy), idx(ix + 1, iy + 1), idx(ix, iy + 1)];

        if self.display.is_globe() {
          let center = corners.iter().map(|&c| display_pts[c]).sum::<DVec3>() * 0.25;
          if !self.display.faces_eye(center.normalize_or_zero(), self.view.eye_pos) {
            continue;
          }
        }

        let quad = corners.map(|c| clip_pts[c]);
        area += self.cell_area(&quad);
      }
    }

    area * self.area_scale
  }

  /// On-screen area of one grid cell given in clip space.
  fn cell_area(&self, quad: &[DVec4; 4]) -> f64 {
    let near = self.view.near;
    if quad.iter().all(|p| p.w < near) {
      return 0.0;
    }

    let mut clipped: SmallVec<[DVec4; 8]> = SmallVec::new();
    clip_against_near(quad, near, &mut clipped);
    if clipped.len() < 3 {
      return 0.0;
    }

    let screen: SmallVec<[DVec2; 8]> = clipped.iter().map(|p| self.view.clip_to_screen(*p)).collect();
    let (min, max) = screen.iter().fold(
      (DVec2::splat(f64::INFINITY), DVec2::splat(f64::NEG_INFINITY)),
      |(lo, hi), p| (lo.min(*p), hi.max(*p)),
    );
    if !min.is_finite() || !max.is_finite() {
      return 0.0;
    }
    if !self.viewport.overlaps(&Mbr { ll: min, ur: max }) {
      return 0.0;
    }

    polygon_area(&screen)
  }
}

/// Sutherland-Hodgman against the plane `w = near`.
fn clip_against_near(poly: &[DVec4], near: f64, out: &mut SmallVec<[DVec4; 8]>) {
  let n = poly.len();
  for i in 0..n {
    let a = poly[i];
    let b = poly[(i + 1) % n];
    let da = a.w - near;
    let db = b.w - near;
    if da >= 0.0 {
      out.push(a);
    }
    if (da >= 0.0) != (db >= 0.0) {
      let t = da / (da - db);
      out.push(a + (b - a) * t);
    }
  }
}

/// Shoelace area of a simple polygon.
pub fn polygon_area(points: &[DVec2]) -> f64 {
  let n = points.len();
  if n < 3 {
    return 0.0;
  }
  let twice: f64 = (0..n)
    .map(|i| {
      let a = points[i];
      let b = points[(i + 1) % n];
      a.x * b.y - b.x * a.y
    })
    .sum();
  twice.abs() * 0.5
}

#[cfg(test)]
#[path = "importance_test.rs"]
mod importance_test;
