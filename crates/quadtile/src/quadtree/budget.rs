//! Rate limiting for tile churn.
//!
//! Prevents frame spikes from a fast-moving camera by limiting how many tiles
//! a single sampling pass may add or remove. Whatever is cut is picked up by
//! the next pass.

use serde::{Deserialize, Serialize};

/// Rate limiting configuration for sampling passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileBudget {
	/// Maximum tiles added per pass (0 = unlimited).
	pub max_adds: usize,
	/// Maximum tiles removed per pass (0 = unlimited).
	pub max_removes: usize,
}

impl TileBudget {
	/// Default budget with reasonable limits.
	pub const DEFAULT: Self = Self {
		max_adds: 64,
		max_removes: 128,
	};

	/// No limits. Every pass converges immediately.
	pub const UNLIMITED: Self = Self {
		max_adds: 0,
		max_removes: 0,
	};

	/// How many of `pending` additions may run this pass.
	#[inline]
	pub fn adds_allowed(&self, pending: usize) -> usize {
		if self.max_adds == 0 {
			pending
		} else {
			pending.min(self.max_adds)
		}
	}

	/// How many of `pending` removals may run this pass.
	#[inline]
	pub fn removes_allowed(&self, pending: usize) -> usize {
		if self.max_removes == 0 {
			pending
		} else {
			pending.min(self.max_removes)
		}
	}
}

impl Default for TileBudget {
	fn default() -> Self {
		Self::UNLIMITED
	}
}

/// Statistics from one sampling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
	/// Candidate nodes whose importance was evaluated.
	pub nodes_evaluated: usize,
	/// Size of the wanted set after the max_tiles cut.
	pub wanted: usize,
	/// Nodes dropped by the max_tiles cut.
	pub dropped_by_max_tiles: usize,
	/// Tiles emitted as additions.
	pub added: usize,
	/// Tiles emitted as removals.
	pub removed: usize,
	/// Still-wanted tiles whose edge flags changed.
	pub updated: usize,
	/// Additions held back by the budget.
	pub deferred_adds: usize,
	/// Removals held back by the budget.
	pub deferred_removes: usize,
	/// Pass time in microseconds.
	pub pass_us: u64,
}

impl PassStats {
	/// Total tile events emitted.
	#[inline]
	pub fn total_changes(&self) -> usize {
		self.added + self.removed + self.updated
	}

	/// True when the budget cut anything.
	#[inline]
	pub fn has_deferred(&self) -> bool {
		self.deferred_adds > 0 || self.deferred_removes > 0
	}
}
