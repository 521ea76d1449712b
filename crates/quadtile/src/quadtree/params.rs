//! SamplingParams - configuration for one quadtree sampling session.
//!
//! Compared by value: the controller only resamples from scratch when the
//! new params differ structurally from the ones it already runs with.

use serde::{Deserialize, Serialize};

use crate::coord::{CoordSystem, CoordSystemKind, Mbr};
use crate::error::{QuadTileError, Result};

use super::node::MAX_LEVEL;

/// Configuration for tile selection and tile geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
  /// Coordinate system being tiled. None is a configuration error and
  /// produces an empty tile set.
  pub coord_sys: Option<CoordSystemKind>,

  /// Coarsest level loaded. Root tiles live here.
  pub min_zoom: i32,

  /// Finest level loaded.
  pub max_zoom: i32,

  /// Maximum number of tiles in the wanted set.
  pub max_tiles: usize,

  /// Screen area in pixels² a tile must cover to be loaded.
  pub min_importance: f64,

  /// Override of `min_importance` for `min_zoom` tiles (0 = no override).
  pub min_importance_top: f64,

  /// Per-level thresholds, indexed by level. Missing entries fall back to
  /// the global thresholds; negative entries disable the level.
  pub importance_per_level: Vec<f64>,

  /// Scale applied to a tile's projected size before measuring its area.
  pub bounds_scale: f64,

  /// Synthesize polar cap geometry for world-spanning systems that stop
  /// short of the poles.
  pub cover_poles: bool,

  /// Emit skirts where neighboring tiles differ in level.
  pub edge_matching: bool,

  /// Grid cells per tile along x.
  pub tessellation_x: u32,

  /// Grid cells per tile along y.
  pub tessellation_y: u32,

  /// Keep only the deepest loaded level instead of the whole ancestry.
  pub single_level: bool,

  /// Levels up to and including this one load regardless of importance.
  pub force_min_level: Option<i32>,

  /// Camera height below which `force_min_level` applies (0 = always).
  pub force_min_level_height: f64,

  /// Restrict loading to tiles overlapping these local bounds.
  pub clip_bounds: Option<Mbr>,
}

impl SamplingParams {
  /// World-spanning spherical mercator configuration.
  pub fn spherical_mercator() -> Self {
    Self::default()
  }

  /// Local bounds of the coordinate system, if any.
  pub fn bounds(&self) -> Option<Mbr> {
    self.coord_sys.as_ref().map(|cs| cs.bounds())
  }

  /// Check the params can drive a sampling pass.
  pub fn validate(&self) -> Result<()> {
    let cs = self.coord_sys.as_ref().ok_or(QuadTileError::MissingCoordSystem)?;
    if !cs.bounds().is_valid() {
      return Err(QuadTileError::MissingCoordSystem);
    }
    if self.min_zoom < 0 || self.max_zoom < self.min_zoom || self.max_zoom > MAX_LEVEL {
      return Err(QuadTileError::InvalidZoomRange {
        min: self.min_zoom,
        max: self.max_zoom,
      });
    }
    if self.tessellation_x == 0 || self.tessellation_y == 0 {
      return Err(QuadTileError::InvalidTessellation {
        x: self.tessellation_x,
        y: self.tessellation_y,
      });
    }
    if self.max_tiles == 0 {
      return Err(QuadTileError::InvalidMaxTiles);
    }
    Ok(())
  }

  /// Importance threshold for tiles at `level`.
  ///
  /// Returns None when the level is disabled by a negative per-level entry.
  pub fn importance_for_level(&self, level: i32) -> Option<f64> {
    let per_level = usize::try_from(level)
      .ok()
      .and_then(|idx| self.importance_per_level.get(idx))
      .copied();
    if per_level.is_some_and(|value| value < 0.0) {
      return None;
    }
    if level == self.min_zoom && self.min_importance_top > 0.0 {
      return Some(self.min_importance_top);
    }
    Some(per_level.unwrap_or(self.min_importance))
  }

  /// Set a per-level threshold, growing the table as needed.
  pub fn set_importance_level(&mut self, level: i32, importance: f64) {
    let Ok(idx) = usize::try_from(level) else {
      return;
    };
    if self.importance_per_level.len() <= idx {
      let fill = self.min_importance;
      self.importance_per_level.resize(idx + 1, fill);
    }
    self.importance_per_level[idx] = importance;
  }
}

impl Default for SamplingParams {
  fn default() -> Self {
    Self {
      coord_sys: Some(CoordSystemKind::SphericalMercator),
      min_zoom: 0,
      max_zoom: 18,
      max_tiles: 256,
      min_importance: 256.0 * 256.0,
      min_importance_top: 0.0,
      importance_per_level: Vec::new(),
      bounds_scale: 1.0,
      cover_poles: false,
      edge_matching: true,
      tessellation_x: 10,
      tessellation_y: 10,
      single_level: false,
      force_min_level: None,
      force_min_level_height: 0.0,
      clip_bounds: None,
    }
  }
}

#[cfg(test)]
#[path = "params_test.rs"]
mod params_test;
