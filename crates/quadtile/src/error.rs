//! Error types.
//!
//! Only configuration and I/O boundaries produce errors. Stale results and
//! missing resources are not errors; they are discarded or ignored where they
//! are detected.

use thiserror::Error;

/// Configuration and interpretation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuadTileError {
  #[error("sampling params have no coordinate system")]
  MissingCoordSystem,

  #[error("invalid zoom range {min}..={max}")]
  InvalidZoomRange { min: i32, max: i32 },

  #[error("tessellation must be at least 1x1, got {x}x{y}")]
  InvalidTessellation { x: u32, y: u32 },

  #[error("max_tiles must be greater than zero")]
  InvalidMaxTiles,

  #[error("loader needs at least one frame")]
  InvalidFrameCount,

  #[error("interpreter failed: {0}")]
  Interpret(String),

  #[error("failed to start layer thread: {0}")]
  LayerThread(String),
}

/// Failure reported by a tile fetcher.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
  #[error("tile not found")]
  NotFound,

  #[error("i/o error: {0}")]
  Io(String),

  #[error("fetch cancelled")]
  Cancelled,

  #[error("{0}")]
  Other(String),
}

pub type Result<T, E = QuadTileError> = std::result::Result<T, E>;
