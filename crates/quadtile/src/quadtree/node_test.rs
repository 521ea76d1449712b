use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use glam::DVec2;
use rand::Rng;

use super::*;

/// Two identifiers with same x, y, level are equal and hash equally.
#[test]
fn test_identifier_equality_and_hash() {
  let a = QuadTreeIdentifier::new(3, 5, 4);
  let b = QuadTreeIdentifier::new(3, 5, 4);
  let c = QuadTreeIdentifier::new(3, 5, 5);

  assert_eq!(a, b);
  assert_ne!(a, c);

  let hash = |n: &QuadTreeIdentifier| {
    let mut hasher = DefaultHasher::new();
    n.hash(&mut hasher);
    hasher.finish()
  };
  assert_eq!(hash(&a), hash(&b), "Equal nodes must have equal hashes");
}

#[test]
fn test_node_number_known_values() {
  assert_eq!(QuadTreeIdentifier::new(0, 0, 0).node_number(), 0);
  assert_eq!(QuadTreeIdentifier::new(0, 0, 1).node_number(), 1);
  assert_eq!(QuadTreeIdentifier::new(1, 1, 1).node_number(), 4);
  assert_eq!(QuadTreeIdentifier::new(0, 0, 2).node_number(), 5);
  // (4^3 - 1) / 3 + 5 * 8 + 5
  assert_eq!(QuadTreeIdentifier::new(5, 5, 3).node_number(), 21 + 45);
}

/// Node numbers are dense and injective over all levels up to 6.
#[test]
fn test_node_number_dense_and_injective() {
  let mut seen = HashSet::new();
  let mut max = 0;
  for level in 0..=6 {
    let n = 1 << level;
    for y in 0..n {
      for x in 0..n {
        let num = QuadTreeIdentifier::new(x, y, level).node_number();
        assert!(seen.insert(num), "duplicate node number {}", num);
        max = max.max(num);
      }
    }
  }
  assert_eq!(max as usize + 1, seen.len(), "numbers should be densely packed");
}

/// Every node at level L numbers below any node at level L + 1.
#[test]
fn test_node_number_strictly_increasing_across_levels() {
  let mut rng = rand::rng();
  for _ in 0..2000 {
    let level = rng.random_range(0..20);
    let n = 1 << level;
    let a = QuadTreeIdentifier::new(rng.random_range(0..n), rng.random_range(0..n), level);
    let m = 1 << (level + 1);
    let b = QuadTreeIdentifier::new(rng.random_range(0..m), rng.random_range(0..m), level + 1);

    assert!(a.node_number() < b.node_number(), "{} !< {}", a, b);
  }

  let last_of_level = QuadTreeIdentifier::new(7, 7, 3);
  let first_of_next = QuadTreeIdentifier::new(0, 0, 4);
  assert_eq!(last_of_level.node_number() + 1, first_of_next.node_number());
}

/// `Ord` agrees with node number ordering.
#[test]
fn test_ordering_matches_node_number() {
  let mut rng = rand::rng();
  let mut nodes: Vec<_> = (0..500)
    .map(|_| {
      let level = rng.random_range(0..12);
      let n = 1 << level;
      QuadTreeIdentifier::new(rng.random_range(0..n), rng.random_range(0..n), level)
    })
    .collect();

  nodes.sort();
  for pair in nodes.windows(2) {
    assert!(pair[0].node_number() <= pair[1].node_number());
  }
}

#[test]
fn test_node_number_roundtrip() {
  for num in 0..2000u64 {
    let node = QuadTreeIdentifier::from_node_number(num).expect("in range");
    assert!(node.is_valid());
    assert_eq!(node.node_number(), num);
  }
  let deep = QuadTreeIdentifier::new(123_456, 654_321, 20);
  assert_eq!(QuadTreeIdentifier::from_node_number(deep.node_number()), Some(deep));
}

#[test]
fn test_node_number_past_deepest_level() {
  let n = QuadTreeIdentifier::tiles_per_axis(MAX_LEVEL) as i32 - 1;
  let last = QuadTreeIdentifier::new(n, n, MAX_LEVEL);
  assert!(last.is_valid());
  assert_eq!(QuadTreeIdentifier::from_node_number(last.node_number()), Some(last));
  assert_eq!(QuadTreeIdentifier::from_node_number(last.node_number() + 1), None);
  assert_eq!(QuadTreeIdentifier::from_node_number(u64::MAX), None);
}

#[test]
fn test_validity() {
  assert!(QuadTreeIdentifier::new(0, 0, 0).is_valid());
  assert!(QuadTreeIdentifier::new(7, 7, 3).is_valid());
  assert!(!QuadTreeIdentifier::new(8, 0, 3).is_valid());
  assert!(!QuadTreeIdentifier::new(0, -1, 3).is_valid());
  assert!(!QuadTreeIdentifier::new(0, 0, -1).is_valid());
}

#[test]
fn test_child_parent_roundtrip() {
  let original = QuadTreeIdentifier::new(5, 9, 6);
  for quadrant in 0..4u8 {
    let child = original.get_child(quadrant).expect("Should get child");
    assert_eq!(child.level, 7);
    assert_eq!(child.parent(), Some(original));
  }
  assert!(original.get_child(4).is_none());
  assert!(QuadTreeIdentifier::new(0, 0, 0).parent().is_none());
}

#[test]
fn test_neighbors_stay_inside_grid() {
  let corner = QuadTreeIdentifier::new(0, 0, 2);
  assert!(corner.neighbor(Edge::Left).is_none());
  assert!(corner.neighbor(Edge::Bottom).is_none());
  assert_eq!(corner.neighbor(Edge::Right), Some(QuadTreeIdentifier::new(1, 0, 2)));
  assert_eq!(corner.neighbor(Edge::Top), Some(QuadTreeIdentifier::new(0, 1, 2)));
}

#[test]
fn test_children_along_edge_touch_neighbor() {
  let tile = QuadTreeIdentifier::new(1, 1, 2);
  for edge in Edge::ALL {
    let [a, b] = tile.children_along(edge);
    assert_eq!(a.parent(), Some(tile));
    assert_eq!(b.parent(), Some(tile));
    // Moving across the edge from a child must land outside the parent.
    let outside = a.neighbor(edge).and_then(|n| n.parent());
    assert_ne!(outside, Some(tile), "edge {:?}", edge);
  }
}

#[test]
fn test_local_bounds_subdivide_evenly() {
  let bounds = Mbr::new(DVec2::new(-4.0, -2.0), DVec2::new(4.0, 2.0));
  let tile = QuadTreeIdentifier::new(3, 0, 2);
  let mbr = tile.local_bounds(&bounds);
  assert_eq!(mbr.ll, DVec2::new(2.0, -2.0));
  assert_eq!(mbr.ur, DVec2::new(4.0, -1.0));
}
