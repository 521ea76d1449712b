//! Engine-agnostic metrics for display layers.
//!
//! Feature-gated and runtime-toggled; with the `metrics` feature off every
//! `record_*` call returns immediately.
//!
//! # Usage
//!
//! ```ignore
//! use quadtile::metrics::{LayerMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! metrics.record_pass(&stats, &controller.loaded_tiles());
//! metrics.record_tick_timing(tick_us);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::quadtree::{PassStats, QuadTreeIdentifier, MAX_LEVEL};

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// True when compiled with `metrics` and the runtime toggle is on.
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Last `capacity` timings in microseconds, with a running total.
#[derive(Debug, Clone)]
pub struct TimingHistory {
  samples: VecDeque<u64>,
  capacity: usize,
  total_us: u64,
}

impl TimingHistory {
  pub fn new(capacity: usize) -> Self {
    Self {
      samples: VecDeque::with_capacity(capacity),
      capacity: capacity.max(1),
      total_us: 0,
    }
  }

  pub fn record(&mut self, us: u64) {
    if self.samples.len() == self.capacity {
      if let Some(evicted) = self.samples.pop_front() {
        self.total_us -= evicted;
      }
    }
    self.samples.push_back(us);
    self.total_us += us;
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn average_us(&self) -> f64 {
    if self.samples.is_empty() {
      return 0.0;
    }
    self.total_us as f64 / self.samples.len() as f64
  }

  /// Slowest timing still in the window.
  pub fn peak_us(&self) -> Option<u64> {
    self.samples.iter().copied().max()
  }
}

impl Default for TimingHistory {
  fn default() -> Self {
    Self::new(128)
  }
}

const LEVELS: usize = MAX_LEVEL as usize + 1;

/// Per-layer statistics, updated by the layer thread.
#[derive(Debug, Clone)]
pub struct LayerMetrics {
  /// Loaded tiles at each level after the last pass.
  pub tiles_per_level: [u32; LEVELS],

  // Timing
  /// Sampling pass times in microseconds.
  pub pass_timings: TimingHistory,
  /// Builder tick (merge) times in microseconds.
  pub tick_timings: TimingHistory,
  pub last_pass_us: u64,

  // Totals since creation
  pub total_passes: u64,
  pub total_added: u64,
  pub total_removed: u64,
  pub total_dropped_by_max_tiles: u64,
  pub total_ticks: u64,
}

impl Default for LayerMetrics {
  fn default() -> Self {
    Self {
      tiles_per_level: [0; LEVELS],
      pass_timings: TimingHistory::default(),
      tick_timings: TimingHistory::default(),
      last_pass_us: 0,
      total_passes: 0,
      total_added: 0,
      total_removed: 0,
      total_dropped_by_max_tiles: 0,
      total_ticks: 0,
    }
  }
}

impl LayerMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record one sampling pass and the loaded set it left behind.
  pub fn record_pass(&mut self, stats: &PassStats, loaded: &[QuadTreeIdentifier]) {
    if !is_enabled() {
      return;
    }
    self.pass_timings.record(stats.pass_us);
    self.last_pass_us = stats.pass_us;
    self.total_passes += 1;
    self.total_added += stats.added as u64;
    self.total_removed += stats.removed as u64;
    self.total_dropped_by_max_tiles += stats.dropped_by_max_tiles as u64;

    self.tiles_per_level.fill(0);
    for ident in loaded {
      let level = (ident.level.max(0) as usize).min(LEVELS - 1);
      self.tiles_per_level[level] += 1;
    }
  }

  /// Record one builder tick (fetch drain, parse dispatch and merge).
  pub fn record_tick_timing(&mut self, timing_us: u64) {
    if !is_enabled() {
      return;
    }
    self.tick_timings.record(timing_us);
    self.total_ticks += 1;
  }

  pub fn total_tiles(&self) -> u32 {
    self.tiles_per_level.iter().sum()
  }

  /// Finest level with at least one tile.
  pub fn deepest_level(&self) -> Option<i32> {
    self.tiles_per_level.iter().rposition(|&n| n > 0).map(|l| l as i32)
  }

  pub fn avg_pass_timing_us(&self) -> f64 {
    self.pass_timings.average_us()
  }

  pub fn avg_tick_timing_us(&self) -> f64 {
    self.tick_timings.average_us()
  }
}
