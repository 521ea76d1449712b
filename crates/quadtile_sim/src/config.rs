//! Simulation configuration.

use std::path::Path;

use anyhow::{Context, Result};
use quadtile::coord::DisplaySurface;
use quadtile::{LoaderConfig, SamplingParams, TileBudget};
use serde::Deserialize;

/// Root configuration. Every section falls back to its defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimConfig {
  pub sampling: SamplingParams,
  pub loader: LoaderConfig,
  pub budget: TileBudget,
  pub camera: CameraPath,
  pub source: SourceConfig,
}

/// Straight-line camera flight, interpolated in `steps` moves.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraPath {
  pub display: DisplaySurface,
  /// Globe: lon/lat in degrees. Flat: display-plane position.
  pub start: [f64; 2],
  pub end: [f64; 2],
  /// Globe radii (globe) or display units (flat) above the surface.
  pub start_height: f64,
  pub end_height: f64,
  pub steps: usize,
  /// Builder ticks run between two camera moves.
  pub ticks_per_step: usize,
  pub fov_deg: f64,
  pub screen: [f64; 2],
}

impl Default for CameraPath {
  fn default() -> Self {
    Self {
      display: DisplaySurface::Globe,
      start: [0.0, 20.0],
      end: [12.0, 45.0],
      start_height: 3.0,
      end_height: 0.05,
      steps: 40,
      ticks_per_step: 4,
      fov_deg: 60.0,
      screen: [1280.0, 720.0],
    }
  }
}

/// Synthetic tile server behaviour.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  pub template: String,
  pub min_zoom: i32,
  pub max_zoom: i32,
  /// Pixels per tile side.
  pub tile_size: u32,
  /// Simulated network delay per fetch.
  pub latency_ms: u64,
  /// Every n-th fetch fails with an I/O error (0 = never).
  pub fail_every: u64,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      template: "synthetic://{z}/{x}/{y}?frame={frame}".to_string(),
      min_zoom: 0,
      max_zoom: 18,
      tile_size: 64,
      latency_ms: 2,
      fail_every: 0,
    }
  }
}

impl SimConfig {
  /// Load configuration from a TOML file.
  pub fn load(path: &Path) -> Result<Self> {
    let content =
      std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: SimConfig = toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    self.sampling.validate().context("Invalid [sampling] section")?;
    self.loader.validate().context("Invalid [loader] section")?;
    if self.camera.steps == 0 {
      anyhow::bail!("camera.steps must be at least 1");
    }
    if self.camera.start_height <= 0.0 || self.camera.end_height <= 0.0 {
      anyhow::bail!("camera heights must be positive");
    }
    if self.source.tile_size == 0 {
      anyhow::bail!("source.tile_size must be at least 1");
    }
    Ok(())
  }
}
