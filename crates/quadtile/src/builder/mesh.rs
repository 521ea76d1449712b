//! Tile mesh generation.
//!
//! A tile is a `tess_x × tess_y` grid over its local bounds, converted to
//! display space. Flagged edges get a skirt: a copy of the edge row pushed
//! toward the globe center (or below the plane) and stitched to the edge so
//! a coarser neighbor's gap is covered.

use glam::{DVec2, DVec3, Vec2, Vec3};

use crate::coord::{CoordSystem, CoordSystemKind, DisplaySurface, Mbr};
use crate::quadtree::{Edge, EdgeMatch, Pole, QuadTreeIdentifier};
use crate::scene::Drawable;

/// Skirt depth relative to the tile's display-space diagonal.
const SKIRT_FACTOR: f64 = 0.05;

/// Segments around a polar cap.
const POLE_SEGMENTS: usize = 64;

/// CPU-side tile geometry, positions relative to `center`.
#[derive(Clone, Debug, Default)]
pub struct TileMesh {
  pub center: DVec3,
  pub positions: Vec<Vec3>,
  pub tex_coords: Vec<Vec2>,
  pub indices: Vec<u32>,
}

impl TileMesh {
  #[inline]
  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  #[inline]
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Absolute display-space position of a vertex.
  pub fn display_position(&self, index: usize) -> Option<DVec3> {
    self.positions.get(index).map(|p| self.center + p.as_dvec3())
  }

  /// Move the geometry into a new drawable.
  pub fn into_drawable(self, name: impl Into<String>) -> Drawable {
    let mut drawable = Drawable::new(name);
    drawable.center = self.center;
    drawable.positions = self.positions;
    drawable.tex_coords = self.tex_coords;
    drawable.indices = self.indices;
    drawable
  }

  fn push_vertex(&mut self, display: DVec3, uv: Vec2) -> u32 {
    let index = self.positions.len() as u32;
    self.positions.push((display - self.center).as_vec3());
    self.tex_coords.push(uv);
    index
  }
}

/// Inputs shared by every tile of one configuration.
#[derive(Clone, Copy, Debug)]
pub struct MeshSettings<'a> {
  pub coord_sys: &'a CoordSystemKind,
  pub display: DisplaySurface,
  pub tess_x: u32,
  pub tess_y: u32,
  /// Image row 0 at the bottom of the tile instead of the top.
  pub flip_y: bool,
}

/// Grid mesh for one tile with skirts on the flagged edges.
pub fn build_tile_mesh(settings: &MeshSettings<'_>, ident: &QuadTreeIdentifier, edges: EdgeMatch) -> TileMesh {
  let bounds = ident.local_bounds(&settings.coord_sys.bounds());
  let (nx, ny) = (settings.tess_x.max(1) as usize, settings.tess_y.max(1) as usize);
  let to_display = |local: DVec2| settings.display.local_to_display(settings.coord_sys, local);

  let mut mesh = TileMesh {
    center: to_display(bounds.center()),
    ..Default::default()
  };

  let size = bounds.size();
  for iy in 0..=ny {
    for ix in 0..=nx {
      let t = DVec2::new(ix as f64 / nx as f64, iy as f64 / ny as f64);
      let local = bounds.ll + size * t;
      mesh.push_vertex(to_display(local), grid_uv(t, settings.flip_y));
    }
  }

  let row = nx as u32 + 1;
  for iy in 0..ny as u32 {
    for ix in 0..nx as u32 {
      let a = iy * row + ix;
      let b = a + 1;
      let c = a + row;
      let d = c + 1;
      mesh.indices.extend_from_slice(&[a, b, d, a, d, c]);
    }
  }

  if !edges.is_empty() {
    let diagonal = (to_display(bounds.ur) - to_display(bounds.ll)).length();
    let depth = diagonal * SKIRT_FACTOR;
    for edge in edges.edges() {
      add_skirt(&mut mesh, settings.display, edge_vertices(edge, nx, ny), depth);
    }
  }

  mesh
}

fn grid_uv(t: DVec2, flip_y: bool) -> Vec2 {
  let v = if flip_y { t.y } else { 1.0 - t.y };
  Vec2::new(t.x as f32, v as f32)
}

/// Grid indices along one edge, in order.
fn edge_vertices(edge: Edge, nx: usize, ny: usize) -> Vec<u32> {
  let row = nx + 1;
  let ids: Vec<usize> = match edge {
    Edge::Bottom => (0..=nx).collect(),
    Edge::Top => (0..=nx).map(|ix| ny * row + ix).collect(),
    Edge::Left => (0..=ny).map(|iy| iy * row).collect(),
    Edge::Right => (0..=ny).map(|iy| iy * row + nx).collect(),
  };
  ids.into_iter().map(|i| i as u32).collect()
}

fn add_skirt(mesh: &mut TileMesh, display: DisplaySurface, edge: Vec<u32>, depth: f64) {
  let mut dropped = Vec::with_capacity(edge.len());
  for &index in &edge {
    let Some(top) = mesh.display_position(index as usize) else {
      continue;
    };
    let bottom = match display {
      DisplaySurface::Globe => top * (1.0 - depth),
      DisplaySurface::Flat => top - DVec3::Z * depth,
    };
    let uv = mesh.tex_coords[index as usize];
    dropped.push(mesh.push_vertex(bottom, uv));
  }

  for i in 0..edge.len().saturating_sub(1).min(dropped.len().saturating_sub(1)) {
    let (a, b) = (edge[i], edge[i + 1]);
    let (c, d) = (dropped[i], dropped[i + 1]);
    mesh.indices.extend_from_slice(&[a, c, b, b, c, d]);
  }
}

/// Triangle fan closing the gap between the coordinate system's latitude
/// limit and the pole. Globe only.
pub fn build_pole_cap(coord_sys: &CoordSystemKind, display: DisplaySurface, pole: Pole) -> Option<TileMesh> {
  if !display.is_globe() {
    return None;
  }
  let bounds: Mbr = coord_sys.bounds();
  let (edge_y, apex) = match pole {
    Pole::North => (bounds.ur.y, DVec3::Z),
    Pole::South => (bounds.ll.y, -DVec3::Z),
  };

  let mut mesh = TileMesh {
    center: apex,
    ..Default::default()
  };
  let apex_index = mesh.push_vertex(apex, Vec2::new(0.5, 0.5));

  let mut ring = Vec::with_capacity(POLE_SEGMENTS + 1);
  for i in 0..=POLE_SEGMENTS {
    let t = i as f64 / POLE_SEGMENTS as f64;
    let local = DVec2::new(bounds.ll.x + bounds.size().x * t, edge_y);
    ring.push(mesh.push_vertex(display.local_to_display(coord_sys, local), Vec2::new(t as f32, 0.0)));
  }

  for pair in ring.windows(2) {
    match pole {
      Pole::North => mesh.indices.extend_from_slice(&[apex_index, pair[0], pair[1]]),
      Pole::South => mesh.indices.extend_from_slice(&[apex_index, pair[1], pair[0]]),
    }
  }

  Some(mesh)
}

#[cfg(test)]
#[path = "mesh_test.rs"]
mod mesh_test;
