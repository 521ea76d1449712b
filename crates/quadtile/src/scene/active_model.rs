//! Active models - per-frame hooks that run on the render thread.

use super::change::ChangeSet;
use super::Scene;

/// Per-frame generator (particle systems, view-tracked overlays).
///
/// Runs after pre-execute requests and before the regular change drain, so
/// requests it queues are applied in the same frame.
pub trait ActiveModel: Send {
  /// False lets the scene skip the model this frame.
  fn has_changes(&self) -> bool {
    true
  }

  fn update_for_frame(&mut self, scene: &Scene, now: f64, changes: &mut ChangeSet);

  /// Called once when the model is removed from the scene.
  fn teardown(&mut self, _scene: &Scene, _changes: &mut ChangeSet) {}
}
