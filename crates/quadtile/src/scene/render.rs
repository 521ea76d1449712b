//! RenderBackend - callback interface for the GPU side.
//!
//! The scene never talks to a graphics API. Change requests executed on the
//! render thread forward resource setup and teardown to this trait so an
//! engine bridge (OpenGL, Metal, wgpu) can mirror the scene tables.

use super::resources::{Drawable, Program, RenderTarget, Texture, UniformValue};
use crate::identity::SimpleIdentity;

/// GPU resource lifecycle hooks.
///
/// Only called from the thread that drains the scene's change queue.
pub trait RenderBackend {
  fn setup_texture(&mut self, texture: &Texture);

  fn teardown_texture(&mut self, id: SimpleIdentity);

  fn setup_drawable(&mut self, drawable: &Drawable);

  fn teardown_drawable(&mut self, id: SimpleIdentity);

  fn setup_program(&mut self, _program: &Program) {}

  fn teardown_program(&mut self, _id: SimpleIdentity) {}

  fn setup_render_target(&mut self, _target: &RenderTarget) {}

  fn teardown_render_target(&mut self, _id: SimpleIdentity) {}

  /// A program uniform changed value.
  fn uniform_changed(&mut self, _program: SimpleIdentity, _name: &str, _value: &UniformValue) {}
}

/// No-op implementation for testing and headless operation.
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
  fn setup_texture(&mut self, _texture: &Texture) {
    // No-op
  }

  fn teardown_texture(&mut self, _id: SimpleIdentity) {
    // No-op
  }

  fn setup_drawable(&mut self, _drawable: &Drawable) {
    // No-op
  }

  fn teardown_drawable(&mut self, _id: SimpleIdentity) {
    // No-op
  }
}
