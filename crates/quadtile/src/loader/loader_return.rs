//! QuadLoaderReturn - the parcel an interpreter hands back for one tile frame.

use super::fetcher::FetchTicket;
use super::frame::QuadFrameInfo;
use crate::quadtree::QuadTreeIdentifier;
use crate::scene::{ChangeSet, ComponentObject, Texture};

/// Interpreted content for one tile frame, not yet applied to the scene.
///
/// Nothing in here touches the scene until the loader merges it. A return
/// that fails the merge checks is dropped along with its textures and
/// requests.
pub struct QuadLoaderReturn {
  pub ident: QuadTreeIdentifier,
  pub frame: QuadFrameInfo,
  /// Loader generation the fetch was issued under.
  pub generation: u64,
  pub ticket: FetchTicket,
  /// Decoded images. Queued as texture adds ahead of `changes`.
  pub images: Vec<Texture>,
  /// Component objects grouping the resources created for this frame.
  pub comp_objs: Vec<ComponentObject>,
  pub changes: ChangeSet,
  pub has_error: bool,
  /// The tile was cancelled before or during interpretation.
  pub cancelled: bool,
}

impl QuadLoaderReturn {
  pub fn new(ident: QuadTreeIdentifier, frame: QuadFrameInfo, generation: u64, ticket: FetchTicket) -> Self {
    Self {
      ident,
      frame,
      generation,
      ticket,
      images: Vec::new(),
      comp_objs: Vec::new(),
      changes: ChangeSet::new(),
      has_error: false,
      cancelled: false,
    }
  }

  /// True when there is nothing to merge.
  pub fn is_empty(&self) -> bool {
    self.images.is_empty() && self.comp_objs.is_empty() && self.changes.is_empty()
  }
}

impl std::fmt::Debug for QuadLoaderReturn {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QuadLoaderReturn")
      .field("ident", &self.ident)
      .field("frame", &self.frame)
      .field("generation", &self.generation)
      .field("ticket", &self.ticket)
      .field("images", &self.images.len())
      .field("comp_objs", &self.comp_objs.len())
      .field("changes", &self.changes.len())
      .field("has_error", &self.has_error)
      .field("cancelled", &self.cancelled)
      .finish()
  }
}
