//! Change requests - the only way worker threads mutate the scene.
//!
//! Workers build a `ChangeSet` and hand it to `Scene::add_change_requests`.
//! The render thread drains the queue and executes each request once.
//! `execute` consumes the boxed request, so a request cannot run twice.

use glam::Vec4;

use super::render::RenderBackend;
use super::resources::{Drawable, Program, RenderTarget, Texture, UniformValue};
use super::Scene;
use crate::identity::SimpleIdentity;
use crate::view::ViewState;

/// One scene mutation.
///
/// Requests referencing a missing resource do nothing.
pub trait ChangeRequest: Send {
  /// Apply the mutation. Render thread only.
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, view: Option<&ViewState>);

  /// Scene time (seconds) before which the request must not run. 0 = now.
  fn when(&self) -> f64 {
    0.0
  }

  /// Run before active models update so the frame can see the resource.
  fn need_pre_execute(&self) -> bool {
    false
  }

  /// Short name used in trace logs.
  fn name(&self) -> &'static str;
}

/// Ordered batch of change requests.
pub type ChangeSet = Vec<Box<dyn ChangeRequest>>;

/// Wraps a request so it runs no earlier than `when`.
pub struct DelayedReq {
  inner: Box<dyn ChangeRequest>,
  when: f64,
}

impl DelayedReq {
  pub fn new(inner: Box<dyn ChangeRequest>, when: f64) -> Self {
    Self { inner, when }
  }
}

impl ChangeRequest for DelayedReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, view: Option<&ViewState>) {
    self.inner.execute(scene, renderer, view);
  }

  fn when(&self) -> f64 {
    self.when
  }

  fn need_pre_execute(&self) -> bool {
    self.inner.need_pre_execute()
  }

  fn name(&self) -> &'static str {
    self.inner.name()
  }
}

// =============================================================================
// Textures
// =============================================================================

pub struct AddTextureReq {
  texture: Texture,
}

impl AddTextureReq {
  pub fn new(texture: Texture) -> Self {
    Self { texture }
  }
}

impl ChangeRequest for AddTextureReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    renderer.setup_texture(&self.texture);
    scene.add_texture(self.texture);
  }

  fn need_pre_execute(&self) -> bool {
    true
  }

  fn name(&self) -> &'static str {
    "add_texture"
  }
}

pub struct RemTextureReq {
  id: SimpleIdentity,
}

impl RemTextureReq {
  pub fn new(id: SimpleIdentity) -> Self {
    Self { id }
  }
}

impl ChangeRequest for RemTextureReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    if scene.remove_texture(self.id).is_some() {
      renderer.teardown_texture(self.id);
    }
  }

  fn name(&self) -> &'static str {
    "rem_texture"
  }
}

// =============================================================================
// Drawables
// =============================================================================

pub struct AddDrawableReq {
  drawable: Drawable,
}

impl AddDrawableReq {
  pub fn new(drawable: Drawable) -> Self {
    Self { drawable }
  }
}

impl ChangeRequest for AddDrawableReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    renderer.setup_drawable(&self.drawable);
    scene.add_drawable(self.drawable);
  }

  fn name(&self) -> &'static str {
    "add_drawable"
  }
}

pub struct RemDrawableReq {
  id: SimpleIdentity,
}

impl RemDrawableReq {
  pub fn new(id: SimpleIdentity) -> Self {
    Self { id }
  }
}

impl ChangeRequest for RemDrawableReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    if scene.remove_drawable(self.id).is_some() {
      renderer.teardown_drawable(self.id);
    }
  }

  fn name(&self) -> &'static str {
    "rem_drawable"
  }
}

/// Enable or disable a drawable.
pub struct OnOffDrawableReq {
  id: SimpleIdentity,
  on: bool,
}

impl OnOffDrawableReq {
  pub fn new(id: SimpleIdentity, on: bool) -> Self {
    Self { id, on }
  }
}

impl ChangeRequest for OnOffDrawableReq {
  fn execute(self: Box<Self>, scene: &Scene, _renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    scene.update_drawable(self.id, |d| d.enabled = self.on);
  }

  fn name(&self) -> &'static str {
    "on_off_drawable"
  }
}

pub struct DrawPriorityReq {
  id: SimpleIdentity,
  priority: i32,
}

impl DrawPriorityReq {
  pub fn new(id: SimpleIdentity, priority: i32) -> Self {
    Self { id, priority }
  }
}

impl ChangeRequest for DrawPriorityReq {
  fn execute(self: Box<Self>, scene: &Scene, _renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    scene.update_drawable(self.id, |d| d.draw_priority = self.priority);
  }

  fn name(&self) -> &'static str {
    "draw_priority"
  }
}

// =============================================================================
// Programs
// =============================================================================

pub struct AddProgramReq {
  program: Program,
}

impl AddProgramReq {
  pub fn new(program: Program) -> Self {
    Self { program }
  }
}

impl ChangeRequest for AddProgramReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    renderer.setup_program(&self.program);
    scene.add_program(self.program);
  }

  fn need_pre_execute(&self) -> bool {
    true
  }

  fn name(&self) -> &'static str {
    "add_program"
  }
}

pub struct RemProgramReq {
  id: SimpleIdentity,
}

impl RemProgramReq {
  pub fn new(id: SimpleIdentity) -> Self {
    Self { id }
  }
}

impl ChangeRequest for RemProgramReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    if scene.remove_program(self.id).is_some() {
      renderer.teardown_program(self.id);
    }
  }

  fn name(&self) -> &'static str {
    "rem_program"
  }
}

/// Set one uniform on a program.
pub struct SetUniformReq {
  program_id: SimpleIdentity,
  uniform: String,
  value: UniformValue,
}

impl SetUniformReq {
  pub fn new(program_id: SimpleIdentity, uniform: impl Into<String>, value: UniformValue) -> Self {
    Self {
      program_id,
      uniform: uniform.into(),
      value,
    }
  }
}

impl ChangeRequest for SetUniformReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    let SetUniformReq {
      program_id,
      uniform,
      value,
    } = *self;
    let found = scene.update_program(program_id, |p| {
      p.uniforms.insert(uniform.clone(), value);
    });
    if found {
      renderer.uniform_changed(program_id, &uniform, &value);
    }
  }

  fn name(&self) -> &'static str {
    "set_uniform"
  }
}

// =============================================================================
// Render targets
// =============================================================================

pub struct AddRenderTargetReq {
  target: RenderTarget,
}

impl AddRenderTargetReq {
  pub fn new(target: RenderTarget) -> Self {
    Self { target }
  }

  pub fn with_clear_color(mut self, color: Vec4) -> Self {
    self.target.clear_color = color;
    self
  }
}

impl ChangeRequest for AddRenderTargetReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    renderer.setup_render_target(&self.target);
    scene.add_render_target(self.target);
  }

  fn need_pre_execute(&self) -> bool {
    true
  }

  fn name(&self) -> &'static str {
    "add_render_target"
  }
}

pub struct RemRenderTargetReq {
  id: SimpleIdentity,
}

impl RemRenderTargetReq {
  pub fn new(id: SimpleIdentity) -> Self {
    Self { id }
  }
}

impl ChangeRequest for RemRenderTargetReq {
  fn execute(self: Box<Self>, scene: &Scene, renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    if scene.remove_render_target(self.id).is_some() {
      renderer.teardown_render_target(self.id);
    }
  }

  fn name(&self) -> &'static str {
    "rem_render_target"
  }
}
