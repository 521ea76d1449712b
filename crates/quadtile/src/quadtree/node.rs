//! QuadTreeIdentifier - immutable value type naming one tile.
//!
//! Level 0 is the single root tile, each level doubles the tile count per
//! axis. `y` grows upward in local coordinates (tile (0, 0) holds the
//! lower-left corner of the coordinate system bounds).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::coord::Mbr;

/// Deepest level whose node numbers fit in a `u64`.
pub const MAX_LEVEL: i32 = 31;

/// Tile identifier - immutable value type.
///
/// Ordering is by level, then y, then x, which is the same order as
/// [`QuadTreeIdentifier::node_number`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct QuadTreeIdentifier {
  /// Column at this level
  pub x: i32,
  /// Row at this level
  pub y: i32,
  /// Level of detail (0 = root, higher = finer)
  pub level: i32,
}

/// One of the four tile edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Edge {
  Left,
  Right,
  Bottom,
  Top,
}

impl Edge {
  pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Bottom, Edge::Top];

  /// Grid offset toward the neighbor across this edge.
  #[inline]
  pub fn offset(&self) -> (i32, i32) {
    match self {
      Edge::Left => (-1, 0),
      Edge::Right => (1, 0),
      Edge::Bottom => (0, -1),
      Edge::Top => (0, 1),
    }
  }

  /// The same edge seen from the neighbor.
  #[inline]
  pub fn opposite(&self) -> Edge {
    match self {
      Edge::Left => Edge::Right,
      Edge::Right => Edge::Left,
      Edge::Bottom => Edge::Top,
      Edge::Top => Edge::Bottom,
    }
  }
}

impl QuadTreeIdentifier {
  /// Create a new identifier.
  pub fn new(x: i32, y: i32, level: i32) -> Self {
    Self { x, y, level }
  }

  /// Tiles per axis at `level`.
  #[inline]
  pub fn tiles_per_axis(level: i32) -> i64 {
    1i64 << level
  }

  /// True when `0 <= x, y < 2^level` and the level is representable.
  pub fn is_valid(&self) -> bool {
    if self.level < 0 || self.level > MAX_LEVEL {
      return false;
    }
    let n = Self::tiles_per_axis(self.level);
    self.x >= 0 && self.y >= 0 && (self.x as i64) < n && (self.y as i64) < n
  }

  /// Dense global ordinal over all nodes of all levels.
  ///
  /// `(4^level - 1) / 3 + y * 2^level + x`: every node at level L numbers
  /// below every node at level L + 1.
  #[inline]
  pub fn node_number(&self) -> u64 {
    let level = self.level as u32;
    let before = ((1u64 << (2 * level)) - 1) / 3;
    before + ((self.y as u64) << level) + self.x as u64
  }

  /// Inverse of [`node_number`](Self::node_number).
  ///
  /// None for numbers past the last node of `MAX_LEVEL`.
  pub fn from_node_number(number: u64) -> Option<Self> {
    let mut before = 0u64;
    for level in 0..=MAX_LEVEL as u32 {
      let count = 1u64 << (2 * level);
      if number - before < count {
        let offset = number - before;
        return Some(Self {
          x: (offset & ((1u64 << level) - 1)) as i32,
          y: (offset >> level) as i32,
          level: level as i32,
        });
      }
      before += count;
    }
    None
  }

  /// Child in the given quadrant (bit 0: +x, bit 1: +y).
  ///
  /// Returns None for quadrants outside 0..4 or when already at MAX_LEVEL.
  pub fn get_child(&self, quadrant: u8) -> Option<Self> {
    if quadrant > 3 || self.level >= MAX_LEVEL {
      return None;
    }
    Some(Self {
      x: self.x * 2 + (quadrant & 1) as i32,
      y: self.y * 2 + ((quadrant >> 1) & 1) as i32,
      level: self.level + 1,
    })
  }

  /// All four children.
  pub fn children(&self) -> impl Iterator<Item = Self> + '_ {
    (0..4u8).filter_map(move |q| self.get_child(q))
  }

  /// Parent tile, None at level 0.
  pub fn parent(&self) -> Option<Self> {
    if self.level <= 0 {
      return None;
    }
    Some(Self {
      x: self.x / 2,
      y: self.y / 2,
      level: self.level - 1,
    })
  }

  /// Same-level neighbor across `edge`, None when it falls outside the grid.
  pub fn neighbor(&self, edge: Edge) -> Option<Self> {
    let (dx, dy) = edge.offset();
    let n = Self::new(self.x + dx, self.y + dy, self.level);
    n.is_valid().then_some(n)
  }

  /// The two children that touch `edge`.
  pub fn children_along(&self, edge: Edge) -> [Self; 2] {
    let (x, y, level) = (self.x * 2, self.y * 2, self.level + 1);
    match edge {
      Edge::Left => [Self::new(x, y, level), Self::new(x, y + 1, level)],
      Edge::Right => [Self::new(x + 1, y, level), Self::new(x + 1, y + 1, level)],
      Edge::Bottom => [Self::new(x, y, level), Self::new(x + 1, y, level)],
      Edge::Top => [Self::new(x, y + 1, level), Self::new(x + 1, y + 1, level)],
    }
  }

  /// Local extents of this tile inside the coordinate system bounds.
  pub fn local_bounds(&self, bounds: &Mbr) -> Mbr {
    let n = Self::tiles_per_axis(self.level) as f64;
    let size = bounds.size() / n;
    let ll = bounds.ll + glam::DVec2::new(self.x as f64 * size.x, self.y as f64 * size.y);
    Mbr::new(ll, ll + size)
  }
}

impl PartialOrd for QuadTreeIdentifier {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for QuadTreeIdentifier {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .level
      .cmp(&other.level)
      .then(self.y.cmp(&other.y))
      .then(self.x.cmp(&other.x))
  }
}

impl std::fmt::Display for QuadTreeIdentifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}/{}/{}", self.level, self.x, self.y)
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
