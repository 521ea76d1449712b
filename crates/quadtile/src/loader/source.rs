//! Tile info sources - map a tile frame to fetch info.

use serde::{Deserialize, Serialize};

use super::fetcher::FetchInfo;
use super::frame::QuadFrameInfo;
use crate::quadtree::QuadTreeIdentifier;

/// Describes where each tile frame lives.
pub trait TileInfoSource: Send + Sync {
  /// None when the source has no data for this tile frame; the frame is
  /// then treated as loaded and empty.
  fn fetch_info(&self, ident: &QuadTreeIdentifier, frame: QuadFrameInfo) -> Option<FetchInfo>;
}

/// Classic `{z}/{x}/{y}` URL templates.
///
/// `{frame}` is replaced with the frame index for animated sources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlTemplateSource {
  pub template: String,
  pub min_zoom: i32,
  pub max_zoom: i32,
  /// Count rows from the bottom (TMS) instead of the top.
  pub flip_y: bool,
}

impl Default for UrlTemplateSource {
  fn default() -> Self {
    Self {
      template: String::new(),
      min_zoom: 0,
      max_zoom: 18,
      flip_y: false,
    }
  }
}

impl UrlTemplateSource {
  pub fn new(template: impl Into<String>, min_zoom: i32, max_zoom: i32) -> Self {
    Self {
      template: template.into(),
      min_zoom,
      max_zoom,
      flip_y: false,
    }
  }

  pub fn with_flip_y(mut self, flip_y: bool) -> Self {
    self.flip_y = flip_y;
    self
  }

  /// Expand the template for one tile frame.
  pub fn url_for(&self, ident: &QuadTreeIdentifier, frame: QuadFrameInfo) -> String {
    // Tiles count rows from the bottom; XYZ servers count from the top.
    let y = if self.flip_y {
      ident.y as i64
    } else {
      QuadTreeIdentifier::tiles_per_axis(ident.level) - 1 - ident.y as i64
    };
    self
      .template
      .replace("{x}", &ident.x.to_string())
      .replace("{y}", &y.to_string())
      .replace("{z}", &ident.level.to_string())
      .replace("{frame}", &frame.index.to_string())
  }
}

impl TileInfoSource for UrlTemplateSource {
  fn fetch_info(&self, ident: &QuadTreeIdentifier, frame: QuadFrameInfo) -> Option<FetchInfo> {
    if ident.level < self.min_zoom || ident.level > self.max_zoom {
      return None;
    }
    Some(FetchInfo::new(self.url_for(ident, frame)))
  }
}
