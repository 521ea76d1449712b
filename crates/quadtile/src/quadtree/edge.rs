//! Edge matching between tiles loaded at different levels.
//!
//! A set bit means the tile's neighbor across that edge is drawn at another
//! level and the tile needs a skirt there to hide the crack.

use super::{Edge, QuadTreeIdentifier};

/// 4-bit mask of tile edges that need a skirt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EdgeMatch(u8);

impl EdgeMatch {
  pub const NONE: Self = Self(0);
  pub const LEFT: Self = Self(1 << 0);
  pub const RIGHT: Self = Self(1 << 1);
  pub const BOTTOM: Self = Self(1 << 2);
  pub const TOP: Self = Self(1 << 3);
  pub const ALL: Self = Self(0b1111);

  #[inline]
  pub fn from_edge(edge: Edge) -> Self {
    match edge {
      Edge::Left => Self::LEFT,
      Edge::Right => Self::RIGHT,
      Edge::Bottom => Self::BOTTOM,
      Edge::Top => Self::TOP,
    }
  }

  #[inline]
  pub fn bits(self) -> u8 {
    self.0
  }

  #[inline]
  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  #[inline]
  pub fn contains(self, edge: Edge) -> bool {
    self.0 & Self::from_edge(edge).0 != 0
  }

  #[inline]
  pub fn insert(&mut self, edge: Edge) {
    self.0 |= Self::from_edge(edge).0;
  }

  /// Edges present in the mask, in `Edge::ALL` order.
  pub fn edges(self) -> impl Iterator<Item = Edge> {
    Edge::ALL.into_iter().filter(move |edge| self.contains(*edge))
  }
}

impl std::ops::BitOr for EdgeMatch {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

/// Compute the skirt mask for `ident` against the wanted set.
///
/// Across each edge: no neighbor in the grid means no skirt; a same-level
/// neighbor that is not wanted means the area is drawn coarser; a wanted
/// neighbor whose children along the shared edge are wanted means it is
/// drawn finer. Both mismatches set the bit.
pub fn compute_edge_match(
  ident: &QuadTreeIdentifier,
  is_wanted: impl Fn(&QuadTreeIdentifier) -> bool,
) -> EdgeMatch {
  let mut mask = EdgeMatch::NONE;

  for edge in Edge::ALL {
    let Some(neighbor) = ident.neighbor(edge) else {
      continue;
    };

    if !is_wanted(&neighbor) {
      mask.insert(edge);
      continue;
    }

    let finer = neighbor
      .children_along(edge.opposite())
      .iter()
      .any(|child| is_wanted(child));
    if finer {
      mask.insert(edge);
    }
  }

  mask
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  fn wanted(ids: &[(i32, i32, i32)]) -> HashSet<QuadTreeIdentifier> {
    ids.iter().map(|&(x, y, l)| QuadTreeIdentifier::new(x, y, l)).collect()
  }

  #[test]
  fn test_mask_bits() {
    let mut mask = EdgeMatch::NONE;
    assert!(mask.is_empty());
    mask.insert(Edge::Top);
    mask.insert(Edge::Left);
    assert_eq!(mask, EdgeMatch::TOP | EdgeMatch::LEFT);
    assert!(mask.contains(Edge::Top));
    assert!(!mask.contains(Edge::Right));
    assert_eq!(mask.edges().collect::<Vec<_>>(), vec![Edge::Left, Edge::Top]);
    assert_eq!(EdgeMatch::ALL.bits(), 0b1111);
  }

  #[test]
  fn test_uniform_level_needs_no_skirts() {
    let set = wanted(&[(0, 0, 0), (0, 0, 1), (1, 0, 1), (0, 1, 1), (1, 1, 1)]);
    for ident in set.iter().filter(|i| i.level == 1) {
      assert!(compute_edge_match(ident, |n| set.contains(n)).is_empty(), "{}", ident);
    }
  }

  #[test]
  fn test_coarser_and_finer_neighbors() {
    // Level 1 everywhere, with (1, 0, 1) split into level 2.
    let set = wanted(&[
      (0, 0, 0),
      (0, 0, 1),
      (1, 0, 1),
      (0, 1, 1),
      (1, 1, 1),
      (2, 0, 2),
      (3, 0, 2),
      (2, 1, 2),
      (3, 1, 2),
    ]);
    let is_wanted = |n: &QuadTreeIdentifier| set.contains(n);

    // (0, 0, 1) sees finer tiles on its right.
    assert_eq!(compute_edge_match(&QuadTreeIdentifier::new(0, 0, 1), is_wanted), EdgeMatch::RIGHT);
    // (1, 1, 1) sees finer tiles below.
    assert_eq!(compute_edge_match(&QuadTreeIdentifier::new(1, 1, 1), is_wanted), EdgeMatch::BOTTOM);
    // (2, 1, 2) sees a coarser tile on the left and above.
    assert_eq!(
      compute_edge_match(&QuadTreeIdentifier::new(2, 1, 2), is_wanted),
      EdgeMatch::LEFT | EdgeMatch::TOP
    );
    // (3, 0, 2) sits in the corner of the grid.
    assert!(compute_edge_match(&QuadTreeIdentifier::new(3, 0, 2), is_wanted).is_empty());
  }
}
