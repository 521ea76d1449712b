//! Two-dimensional bounding rectangle in local coordinates.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Double-precision axis-aligned bounding rectangle.
///
/// Used for coordinate system extents, tile extents and clip bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mbr {
	/// Lower-left corner (inclusive).
	pub ll: DVec2,
	/// Upper-right corner (inclusive).
	pub ur: DVec2,
}

impl Mbr {
	/// Create a new rectangle from its corners.
	///
	/// # Panics
	/// Debug-asserts that ll <= ur on both axes.
	pub fn new(ll: DVec2, ur: DVec2) -> Self {
		debug_assert!(ll.x <= ur.x && ll.y <= ur.y, "Mbr ll must be <= ur on both axes");
		Self { ll, ur }
	}

	/// Create a rectangle from center and half-extents.
	pub fn from_center_half_extents(center: DVec2, half_extents: DVec2) -> Self {
		Self {
			ll: center - half_extents,
			ur: center + half_extents,
		}
	}

	/// Check if this rectangle overlaps another.
	///
	/// Rectangles sharing only a boundary count as overlapping.
	#[inline]
	pub fn overlaps(&self, other: &Mbr) -> bool {
		self.ll.x <= other.ur.x && self.ur.x >= other.ll.x && self.ll.y <= other.ur.y && self.ur.y >= other.ll.y
	}

	/// Check if this rectangle contains a point.
	#[inline]
	pub fn contains_point(&self, point: DVec2) -> bool {
		point.x >= self.ll.x && point.x <= self.ur.x && point.y >= self.ll.y && point.y <= self.ur.y
	}

	/// Size of the rectangle (ur - ll).
	#[inline]
	pub fn size(&self) -> DVec2 {
		self.ur - self.ll
	}

	/// Center of the rectangle.
	#[inline]
	pub fn center(&self) -> DVec2 {
		(self.ll + self.ur) * 0.5
	}

	/// True when the rectangle has positive, finite area.
	#[inline]
	pub fn is_valid(&self) -> bool {
		let size = self.size();
		size.x > 0.0 && size.y > 0.0 && size.is_finite()
	}

	/// Clamp a point into the rectangle.
	#[inline]
	pub fn clamp(&self, point: DVec2) -> DVec2 {
		point.clamp(self.ll, self.ur)
	}
}
