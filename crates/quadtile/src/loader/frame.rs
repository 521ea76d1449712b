//! Frame slots for multi-frame (animated) tiles.

use serde::{Deserialize, Serialize};

/// Which frame of a tile a fetch or return belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct QuadFrameInfo {
  pub index: usize,
}

impl QuadFrameInfo {
  pub fn new(index: usize) -> Self {
    Self { index }
  }
}

/// Load state of one frame of one tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FrameState {
  /// Wanted, nothing requested yet (or cancelled).
  #[default]
  Idle,
  /// Fetch dispatched, waiting on the fetcher.
  Fetching,
  /// Bytes received, queued for or running in the interpreter.
  Interpreting,
  /// Merged into the scene. Sources with no data for a frame also land here.
  Loaded,
  /// Fetch or interpretation failed; retried on the next pass.
  Failed,
}

impl FrameState {
  #[inline]
  pub fn is_in_flight(&self) -> bool {
    matches!(self, FrameState::Fetching | FrameState::Interpreting)
  }
}

/// Counts for one frame index across every wanted tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FrameStat {
  pub total: usize,
  pub in_flight: usize,
  pub loaded: usize,
  pub failed: usize,
}

impl FrameStat {
  pub(crate) fn record(&mut self, state: FrameState) {
    self.total += 1;
    match state {
      FrameState::Fetching | FrameState::Interpreting => self.in_flight += 1,
      FrameState::Loaded => self.loaded += 1,
      FrameState::Failed => self.failed += 1,
      FrameState::Idle => {}
    }
  }
}

/// Per-frame load progress, used to decide when an animation can start.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FrameStats {
  pub frames: Vec<FrameStat>,
}

impl FrameStats {
  pub fn with_frames(count: usize) -> Self {
    Self {
      frames: vec![FrameStat::default(); count],
    }
  }

  /// True when every frame of every wanted tile is loaded.
  ///
  /// Vacuously true when nothing is wanted.
  pub fn all_loaded(&self) -> bool {
    self.frames.iter().all(|f| f.loaded == f.total)
  }

  /// Frames with everything loaded.
  pub fn loaded_frames(&self) -> usize {
    self.frames.iter().filter(|f| f.loaded == f.total).count()
  }

  pub fn in_flight(&self) -> usize {
    self.frames.iter().map(|f| f.in_flight).sum()
  }

  pub fn failed(&self) -> usize {
    self.frames.iter().map(|f| f.failed).sum()
  }
}
