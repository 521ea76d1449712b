//! Scene - resource tables plus the pending change queue.
//!
//! Each resource category lives behind its own lock. Worker threads only ever
//! touch the pending queue (`add_change_requests`); the tables are mutated
//! by change requests executing on the render thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use web_time::Instant;

use super::active_model::ActiveModel;
use super::change::{ChangeRequest, ChangeSet};
use super::manager::{ComponentManager, SceneManager, COMPONENT_MANAGER};
use super::render::RenderBackend;
use super::resources::{Drawable, Program, RenderTarget, Texture};
use crate::identity::SimpleIdentity;
use crate::view::ViewState;

/// A queued request stamped with its enqueue order.
struct PendingRequest {
  seq: u64,
  when: f64,
  request: Box<dyn ChangeRequest>,
}

/// Requests waiting to execute.
///
/// `ready` is in enqueue order. `deferred` is sorted by `(when, seq)`.
#[derive(Default)]
struct PendingQueue {
  next_seq: u64,
  ready: Vec<PendingRequest>,
  deferred: Vec<PendingRequest>,
}

impl PendingQueue {
  fn push(&mut self, request: Box<dyn ChangeRequest>) {
    let seq = self.next_seq;
    self.next_seq += 1;
    let when = request.when();
    let pending = PendingRequest { seq, when, request };
    if when > 0.0 {
      let pos = self
        .deferred
        .partition_point(|p| p.when.total_cmp(&when).then(p.seq.cmp(&seq)).is_lt());
      self.deferred.insert(pos, pending);
    } else {
      self.ready.push(pending);
    }
  }

  /// Move deferred requests whose time has come into `ready`, keeping `ready`
  /// in sequence order.
  fn promote(&mut self, now: f64) {
    let due = self.deferred.partition_point(|p| p.when <= now);
    if due == 0 {
      return;
    }
    self.ready.extend(self.deferred.drain(..due));
    self.ready.sort_by_key(|p| p.seq);
  }

  fn len(&self) -> usize {
    self.ready.len() + self.deferred.len()
  }
}

/// Owner of every GPU-visible resource, keyed by `SimpleIdentity`.
pub struct Scene {
  drawables: RwLock<HashMap<SimpleIdentity, Drawable>>,
  textures: RwLock<HashMap<SimpleIdentity, Arc<Texture>>>,
  programs: RwLock<HashMap<SimpleIdentity, Program>>,
  render_targets: RwLock<HashMap<SimpleIdentity, RenderTarget>>,
  managers: RwLock<HashMap<String, Arc<dyn SceneManager>>>,
  component_manager: Arc<ComponentManager>,
  pending: Mutex<PendingQueue>,
  active_models: Mutex<Vec<(SimpleIdentity, Box<dyn ActiveModel>)>>,
  removed_models: Mutex<Vec<SimpleIdentity>>,
  start: Instant,
}

impl Default for Scene {
  fn default() -> Self {
    Self::new()
  }
}

impl Scene {
  /// Empty scene with a component manager registered.
  pub fn new() -> Self {
    let component_manager = Arc::new(ComponentManager::new());
    let mut managers: HashMap<String, Arc<dyn SceneManager>> = HashMap::new();
    managers.insert(COMPONENT_MANAGER.to_string(), component_manager.clone());

    Self {
      drawables: RwLock::new(HashMap::new()),
      textures: RwLock::new(HashMap::new()),
      programs: RwLock::new(HashMap::new()),
      render_targets: RwLock::new(HashMap::new()),
      managers: RwLock::new(managers),
      component_manager,
      pending: Mutex::new(PendingQueue::default()),
      active_models: Mutex::new(Vec::new()),
      removed_models: Mutex::new(Vec::new()),
      start: Instant::now(),
    }
  }

  /// Seconds since the scene was created.
  pub fn current_time(&self) -> f64 {
    self.start.elapsed().as_secs_f64()
  }

  // ===========================================================================
  // Change queue
  // ===========================================================================

  /// Queue requests for the render thread. Never blocks on GPU work.
  ///
  /// The set is appended as one contiguous block.
  pub fn add_change_requests(&self, changes: ChangeSet) {
    if changes.is_empty() {
      return;
    }
    let mut pending = lock(&self.pending);
    for request in changes {
      pending.push(request);
    }
  }

  /// Requests waiting to execute, deferred ones included.
  pub fn pending_count(&self) -> usize {
    lock(&self.pending).len()
  }

  /// Execute every ready request in enqueue order. Returns how many ran.
  ///
  /// Requests with `when > now` stay queued. The queue lock is released
  /// before executing, so requests may enqueue more work.
  #[tracing::instrument(skip_all, name = "scene::process_changes")]
  pub fn process_changes(&self, renderer: &mut dyn RenderBackend, view: Option<&ViewState>, now: f64) -> usize {
    let ready = {
      let mut pending = lock(&self.pending);
      pending.promote(now);
      std::mem::take(&mut pending.ready)
    };
    self.execute_all(ready, renderer, view)
  }

  /// Execute only the ready requests that flag `need_pre_execute`.
  pub fn process_pre_changes(&self, renderer: &mut dyn RenderBackend, view: Option<&ViewState>, now: f64) -> usize {
    let pre = {
      let mut pending = lock(&self.pending);
      pending.promote(now);
      let (pre, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut pending.ready)
        .into_iter()
        .partition(|p| p.request.need_pre_execute());
      pending.ready = rest;
      pre
    };
    self.execute_all(pre, renderer, view)
  }

  fn execute_all(&self, ready: Vec<PendingRequest>, renderer: &mut dyn RenderBackend, view: Option<&ViewState>) -> usize {
    let count = ready.len();
    for PendingRequest { seq, request, .. } in ready {
      tracing::trace!(seq, request = request.name(), "execute");
      request.execute(self, renderer, view);
    }
    if count > 0 {
      tracing::debug!(count, "change requests executed");
    }
    count
  }

  /// One render frame: pre-execute requests, active models, then the rest.
  pub fn process_frame(&self, renderer: &mut dyn RenderBackend, view: Option<&ViewState>, now: f64) -> usize {
    let _span = tracing::info_span!("scene_frame").entered();

    let mut executed = self.process_pre_changes(renderer, view, now);

    let mut models = std::mem::take(&mut *lock(&self.active_models));
    let mut changes = ChangeSet::new();
    for (_, model) in models.iter_mut() {
      if model.has_changes() {
        model.update_for_frame(self, now, &mut changes);
      }
    }
    // Models added while we ran were pushed onto the emptied list.
    models.append(&mut lock(&self.active_models));
    let removed = std::mem::take(&mut *lock(&self.removed_models));
    let (dropped, kept): (Vec<_>, Vec<_>) = models.into_iter().partition(|(id, _)| removed.contains(id));
    // Teardown may touch the scene, so no model lock is held here.
    for (_, mut model) in dropped {
      model.teardown(self, &mut changes);
    }
    {
      let mut current = lock(&self.active_models);
      let added = std::mem::replace(&mut *current, kept);
      current.extend(added);
    }
    self.add_change_requests(changes);

    executed += self.process_changes(renderer, view, now);
    executed
  }

  /// Set up every resident resource on a fresh renderer. Render thread only.
  pub fn setup_for_renderer(&self, renderer: &mut dyn RenderBackend) {
    for texture in read(&self.textures).values() {
      renderer.setup_texture(texture);
    }
    for program in read(&self.programs).values() {
      renderer.setup_program(program);
    }
    for target in read(&self.render_targets).values() {
      renderer.setup_render_target(target);
    }
    for drawable in read(&self.drawables).values() {
      renderer.setup_drawable(drawable);
    }
  }

  /// Queue teardown from every manager, then run everything left in the queue,
  /// deferred requests included.
  pub fn teardown(&self, renderer: &mut dyn RenderBackend) -> usize {
    let mut changes = ChangeSet::new();
    let managers: Vec<_> = read(&self.managers).values().cloned().collect();
    for manager in managers {
      manager.teardown(&mut changes);
    }
    self.add_change_requests(changes);
    self.process_changes(renderer, None, f64::INFINITY)
  }

  // ===========================================================================
  // Active models
  // ===========================================================================

  pub fn add_active_model(&self, model: Box<dyn ActiveModel>) -> SimpleIdentity {
    let id = SimpleIdentity::generate();
    lock(&self.active_models).push((id, model));
    id
  }

  /// Remove a model. It is torn down on the next `process_frame`.
  pub fn remove_active_model(&self, id: SimpleIdentity) {
    lock(&self.removed_models).push(id);
  }

  pub fn active_model_count(&self) -> usize {
    let removed = lock(&self.removed_models);
    lock(&self.active_models)
      .iter()
      .filter(|(id, _)| !removed.contains(id))
      .count()
  }

  // ===========================================================================
  // Managers
  // ===========================================================================

  pub fn add_manager(&self, manager: Arc<dyn SceneManager>) {
    write(&self.managers).insert(manager.name().to_string(), manager);
  }

  pub fn get_manager(&self, name: &str) -> Option<Arc<dyn SceneManager>> {
    read(&self.managers).get(name).cloned()
  }

  pub fn component_manager(&self) -> &Arc<ComponentManager> {
    &self.component_manager
  }

  // ===========================================================================
  // Resource tables
  //
  // Mutators are meant for change requests on the render thread.
  // ===========================================================================

  pub fn add_texture(&self, texture: Texture) {
    write(&self.textures).insert(texture.id, Arc::new(texture));
  }

  pub fn remove_texture(&self, id: SimpleIdentity) -> Option<Arc<Texture>> {
    write(&self.textures).remove(&id)
  }

  pub fn get_texture(&self, id: SimpleIdentity) -> Option<Arc<Texture>> {
    read(&self.textures).get(&id).cloned()
  }

  pub fn texture_count(&self) -> usize {
    read(&self.textures).len()
  }

  pub fn add_drawable(&self, drawable: Drawable) {
    write(&self.drawables).insert(drawable.id, drawable);
  }

  pub fn remove_drawable(&self, id: SimpleIdentity) -> Option<Drawable> {
    write(&self.drawables).remove(&id)
  }

  /// Mutate a drawable in place. Returns false when it does not exist.
  pub fn update_drawable(&self, id: SimpleIdentity, f: impl FnOnce(&mut Drawable)) -> bool {
    match write(&self.drawables).get_mut(&id) {
      Some(drawable) => {
        f(drawable);
        true
      }
      None => false,
    }
  }

  /// Read a drawable without cloning its geometry.
  pub fn with_drawable<R>(&self, id: SimpleIdentity, f: impl FnOnce(&Drawable) -> R) -> Option<R> {
    read(&self.drawables).get(&id).map(f)
  }

  pub fn has_drawable(&self, id: SimpleIdentity) -> bool {
    read(&self.drawables).contains_key(&id)
  }

  pub fn drawable_count(&self) -> usize {
    read(&self.drawables).len()
  }

  /// Sorted IDs of every drawable.
  pub fn drawable_ids(&self) -> Vec<SimpleIdentity> {
    let mut ids: Vec<_> = read(&self.drawables).keys().copied().collect();
    ids.sort();
    ids
  }

  pub fn add_program(&self, program: Program) {
    write(&self.programs).insert(program.id, program);
  }

  pub fn remove_program(&self, id: SimpleIdentity) -> Option<Program> {
    write(&self.programs).remove(&id)
  }

  pub fn get_program(&self, id: SimpleIdentity) -> Option<Program> {
    read(&self.programs).get(&id).cloned()
  }

  /// Mutate a program in place. Returns false when it does not exist.
  pub fn update_program(&self, id: SimpleIdentity, f: impl FnOnce(&mut Program)) -> bool {
    match write(&self.programs).get_mut(&id) {
      Some(program) => {
        f(program);
        true
      }
      None => false,
    }
  }

  pub fn add_render_target(&self, target: RenderTarget) {
    write(&self.render_targets).insert(target.id, target);
  }

  pub fn remove_render_target(&self, id: SimpleIdentity) -> Option<RenderTarget> {
    write(&self.render_targets).remove(&id)
  }

  pub fn has_render_target(&self, id: SimpleIdentity) -> bool {
    read(&self.render_targets).contains_key(&id)
  }
}

// Every table stays consistent between statements, so a poisoned lock is
// still safe to use.

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
  lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tables_test.rs"]
mod tables_test;
