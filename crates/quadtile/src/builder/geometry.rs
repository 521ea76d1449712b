//! TileGeometryBuilder - one untextured grid drawable per loaded tile.
//!
//! Useful on its own as placeholder coverage under a loader, and as the
//! simplest complete `QuadTileBuilder`.

use std::collections::HashMap;

use glam::Vec4;

use super::mesh::{build_pole_cap, build_tile_mesh, MeshSettings};
use crate::identity::SimpleIdentity;
use crate::quadtree::{BuilderContext, Pole, QuadTileBuilder, QuadTreeIdentifier, TileBatch, TileBuildRequest};
use crate::scene::{AddDrawableReq, ChangeSet, RemDrawableReq};

/// Builds display-space tile meshes, with skirts where edge matching asks.
pub struct TileGeometryBuilder {
  tiles: HashMap<QuadTreeIdentifier, SimpleIdentity>,
  poles: HashMap<Pole, SimpleIdentity>,
  color: Vec4,
  draw_priority: i32,
  context: Option<BuilderContext>,
}

impl Default for TileGeometryBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl TileGeometryBuilder {
  pub fn new() -> Self {
    Self {
      tiles: HashMap::new(),
      poles: HashMap::new(),
      color: Vec4::ONE,
      draw_priority: 0,
      context: None,
    }
  }

  pub fn with_color(mut self, color: Vec4) -> Self {
    self.color = color;
    self
  }

  pub fn with_draw_priority(mut self, priority: i32) -> Self {
    self.draw_priority = priority;
    self
  }

  /// Drawable currently standing in for `ident`.
  pub fn drawable_for(&self, ident: &QuadTreeIdentifier) -> Option<SimpleIdentity> {
    self.tiles.get(ident).copied()
  }

  pub fn pole_drawable(&self, pole: Pole) -> Option<SimpleIdentity> {
    self.poles.get(&pole).copied()
  }

  pub fn tile_count(&self) -> usize {
    self.tiles.len()
  }

  fn add_tile(&mut self, batch: &TileBatch, request: &TileBuildRequest, changes: &mut ChangeSet) {
    let Some(coord_sys) = batch.params.coord_sys.as_ref() else {
      return;
    };
    let settings = MeshSettings {
      coord_sys,
      display: batch.display,
      tess_x: batch.params.tessellation_x,
      tess_y: batch.params.tessellation_y,
      flip_y: false,
    };
    let ident = request.ident;
    let mesh = build_tile_mesh(&settings, &ident, request.edges);
    let mut drawable = mesh.into_drawable(format!("tile {}/{}/{}", ident.level, ident.x, ident.y));
    drawable.color = self.color;
    // Finer tiles draw over coarser ones.
    drawable.draw_priority = self.draw_priority + ident.level;

    self.tiles.insert(ident, drawable.id);
    changes.push(Box::new(AddDrawableReq::new(drawable)));
  }

  fn remove_tile(&mut self, ident: &QuadTreeIdentifier, changes: &mut ChangeSet) {
    if let Some(id) = self.tiles.remove(ident) {
      changes.push(Box::new(RemDrawableReq::new(id)));
    }
  }

  fn add_pole(&mut self, batch: &TileBatch, pole: Pole, changes: &mut ChangeSet) {
    let Some(coord_sys) = batch.params.coord_sys.as_ref() else {
      return;
    };
    let Some(mesh) = build_pole_cap(coord_sys, batch.display, pole) else {
      return;
    };
    let mut drawable = mesh.into_drawable(format!("pole {pole:?}"));
    drawable.color = self.color;
    drawable.draw_priority = self.draw_priority;
    self.poles.insert(pole, drawable.id);
    changes.push(Box::new(AddDrawableReq::new(drawable)));
  }
}

impl QuadTileBuilder for TileGeometryBuilder {
  fn builder_attached(&mut self, ctx: &BuilderContext) {
    self.context = Some(*ctx);
  }

  fn builder_update(&mut self, batch: &TileBatch, changes: &mut ChangeSet) {
    for ident in &batch.to_remove {
      self.remove_tile(ident, changes);
    }
    for pole in &batch.poles_to_remove {
      if let Some(id) = self.poles.remove(pole) {
        changes.push(Box::new(RemDrawableReq::new(id)));
      }
    }

    // Edge flags changed: swap in a rebuilt mesh within the same set.
    for request in &batch.to_update {
      self.remove_tile(&request.ident, changes);
      self.add_tile(batch, request, changes);
    }
    for request in &batch.to_add {
      if self.tiles.contains_key(&request.ident) {
        self.remove_tile(&request.ident, changes);
      }
      self.add_tile(batch, request, changes);
    }
    for pole in &batch.poles_to_add {
      if !self.poles.contains_key(pole) {
        self.add_pole(batch, *pole, changes);
      }
    }

    if !batch.is_empty() {
      tracing::trace!(
        builder = self.context.map(|c| c.builder.raw()),
        tiles = self.tiles.len(),
        "geometry updated"
      );
    }
  }

  fn builder_detached(&mut self, changes: &mut ChangeSet) {
    for (_, id) in self.tiles.drain() {
      changes.push(Box::new(RemDrawableReq::new(id)));
    }
    for (_, id) in self.poles.drain() {
      changes.push(Box::new(RemDrawableReq::new(id)));
    }
    self.context = None;
  }
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;
