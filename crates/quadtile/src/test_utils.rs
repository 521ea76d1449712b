//! Test utilities: recording renderer and builder, mock fetcher, counting
//! interpreter and camera fixtures.

use std::f64::consts::FRAC_PI_3;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use glam::DVec2;

use crate::error::{FetchError, QuadTileError, Result};
use crate::identity::SimpleIdentity;
use crate::loader::{
  FetchTicket, LoaderData, LoaderInterpreter, QuadFrameInfo, QuadLoaderReturn, TileFetchRequest, TileFetcher,
};
use crate::quadtree::{BuilderContext, QuadTileBuilder, QuadTreeIdentifier, SharedBuilder, TileBatch};
use crate::scene::{
  AddDrawableReq, ChangeRequest, ChangeSet, ComponentObject, Drawable, RenderBackend, Scene, Texture,
};
use crate::view::ViewState;

// =============================================================================
// Cameras
// =============================================================================

pub const TEST_SCREEN: DVec2 = DVec2::new(512.0, 512.0);

/// Straight-down camera over a flat display, 60° vertical fov, 512x512.
pub fn flat_view(center: DVec2, height: f64) -> ViewState {
  ViewState::flat_overhead(center, height, FRAC_PI_3, TEST_SCREEN)
}

// =============================================================================
// Renderer
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEvent {
  SetupTexture(SimpleIdentity),
  TeardownTexture(SimpleIdentity),
  SetupDrawable(SimpleIdentity),
  TeardownDrawable(SimpleIdentity),
}

/// Records every backend call in order.
#[derive(Default)]
pub struct RecordingRenderer {
  pub events: Vec<RenderEvent>,
}

impl RecordingRenderer {
  pub fn count_teardown_drawables(&self) -> usize {
    self
      .events
      .iter()
      .filter(|e| matches!(e, RenderEvent::TeardownDrawable(_)))
      .count()
  }
}

impl RenderBackend for RecordingRenderer {
  fn setup_texture(&mut self, texture: &Texture) {
    self.events.push(RenderEvent::SetupTexture(texture.id));
  }

  fn teardown_texture(&mut self, id: SimpleIdentity) {
    self.events.push(RenderEvent::TeardownTexture(id));
  }

  fn setup_drawable(&mut self, drawable: &Drawable) {
    self.events.push(RenderEvent::SetupDrawable(drawable.id));
  }

  fn teardown_drawable(&mut self, id: SimpleIdentity) {
    self.events.push(RenderEvent::TeardownDrawable(id));
  }
}

/// Change request that appends its value to a shared log.
pub struct RecordReq {
  log: Arc<Mutex<Vec<usize>>>,
  value: usize,
}

impl RecordReq {
  pub fn boxed(log: &Arc<Mutex<Vec<usize>>>, value: usize) -> Box<dyn ChangeRequest> {
    Box::new(Self {
      log: log.clone(),
      value,
    })
  }
}

impl ChangeRequest for RecordReq {
  fn execute(self: Box<Self>, _scene: &Scene, _renderer: &mut dyn RenderBackend, _view: Option<&ViewState>) {
    self.log.lock().unwrap().push(self.value);
  }

  fn name(&self) -> &'static str {
    "record"
  }
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Default)]
struct BuilderLogState {
  attached: Option<BuilderContext>,
  batches: Vec<TileBatch>,
  ticks: usize,
  detached: bool,
}

/// Read side of a `RecordingBuilder`.
#[derive(Clone, Default)]
pub struct BuilderLog {
  state: Arc<Mutex<BuilderLogState>>,
}

impl BuilderLog {
  fn lock(&self) -> MutexGuard<'_, BuilderLogState> {
    self.state.lock().unwrap()
  }

  pub fn last_batch(&self) -> Option<TileBatch> {
    self.lock().batches.last().cloned()
  }

  pub fn batches(&self) -> Vec<TileBatch> {
    self.lock().batches.clone()
  }

  pub fn attached(&self) -> Option<BuilderContext> {
    self.lock().attached
  }

  pub fn detached(&self) -> bool {
    self.lock().detached
  }

  pub fn ticks(&self) -> usize {
    self.lock().ticks
  }
}

/// Builder that records every call and produces no content.
pub struct RecordingBuilder {
  log: BuilderLog,
}

impl RecordingBuilder {
  pub fn shared() -> (SharedBuilder, BuilderLog) {
    let log = BuilderLog::default();
    let builder: SharedBuilder = Arc::new(Mutex::new(Self { log: log.clone() }));
    (builder, log)
  }
}

impl QuadTileBuilder for RecordingBuilder {
  fn builder_attached(&mut self, ctx: &BuilderContext) {
    self.log.lock().attached = Some(*ctx);
  }

  fn builder_update(&mut self, batch: &TileBatch, _changes: &mut ChangeSet) {
    self.log.lock().batches.push(batch.clone());
  }

  fn builder_tick(&mut self, _scene: &Scene) {
    self.log.lock().ticks += 1;
  }

  fn builder_detached(&mut self, _changes: &mut ChangeSet) {
    self.log.lock().detached = true;
  }
}

// =============================================================================
// Fetcher
// =============================================================================

#[derive(Default)]
struct MockFetcherState {
  pending: Vec<TileFetchRequest>,
  started: Vec<(FetchTicket, QuadTreeIdentifier, QuadFrameInfo, i32)>,
  cancelled: Vec<FetchTicket>,
  priority_updates: Vec<(FetchTicket, i32, f64)>,
}

/// Fetcher that holds requests until the test completes them.
///
/// Cancels are recorded but the request stays completable, like a network
/// fetch that finishes anyway.
#[derive(Clone, Default)]
pub struct MockFetcher {
  state: Arc<Mutex<MockFetcherState>>,
}

impl MockFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn boxed(&self) -> Box<dyn TileFetcher> {
    Box::new(self.clone())
  }

  fn lock(&self) -> MutexGuard<'_, MockFetcherState> {
    self.state.lock().unwrap()
  }

  pub fn pending_count(&self) -> usize {
    self.lock().pending.len()
  }

  /// Every request ever started, in start order.
  pub fn started(&self) -> Vec<(FetchTicket, QuadTreeIdentifier, QuadFrameInfo, i32)> {
    self.lock().started.clone()
  }

  pub fn started_for(&self, ident: &QuadTreeIdentifier) -> Vec<FetchTicket> {
    self
      .lock()
      .started
      .iter()
      .filter(|(_, i, _, _)| i == ident)
      .map(|(ticket, ..)| *ticket)
      .collect()
  }

  pub fn cancelled(&self) -> Vec<FetchTicket> {
    self.lock().cancelled.clone()
  }

  pub fn priority_updates(&self) -> Vec<(FetchTicket, i32, f64)> {
    self.lock().priority_updates.clone()
  }

  /// Finish the request with this ticket. False when it is not pending.
  pub fn complete_ticket(&self, ticket: FetchTicket, result: std::result::Result<Vec<u8>, FetchError>) -> bool {
    let request = {
      let mut state = self.lock();
      let Some(pos) = state.pending.iter().position(|r| r.ticket == ticket) else {
        return false;
      };
      state.pending.remove(pos)
    };
    request.responder.finish(result);
    true
  }

  /// Finish the oldest pending request for a tile frame.
  pub fn complete(
    &self,
    ident: &QuadTreeIdentifier,
    frame: usize,
    result: std::result::Result<Vec<u8>, FetchError>,
  ) -> bool {
    let ticket = self
      .lock()
      .pending
      .iter()
      .find(|r| r.ident == *ident && r.frame.index == frame)
      .map(|r| r.ticket);
    ticket.is_some_and(|t| self.complete_ticket(t, result))
  }

  /// Finish every pending request with `result_for`. Returns how many.
  pub fn complete_all(
    &self,
    result_for: impl Fn(&TileFetchRequest) -> std::result::Result<Vec<u8>, FetchError>,
  ) -> usize {
    let requests = std::mem::take(&mut self.lock().pending);
    let count = requests.len();
    for request in requests {
      let result = result_for(&request);
      request.responder.finish(result);
    }
    count
  }
}

impl TileFetcher for MockFetcher {
  fn start_tile_fetches(&mut self, requests: Vec<TileFetchRequest>) {
    let mut state = self.lock();
    for request in requests {
      state
        .started
        .push((request.ticket, request.ident, request.frame, request.priority));
      state.pending.push(request);
    }
  }

  fn cancel_tile_fetches(&mut self, tickets: &[FetchTicket]) {
    self.lock().cancelled.extend_from_slice(tickets);
  }

  fn update_priorities(&mut self, updates: &[(FetchTicket, i32, f64)]) {
    self.lock().priority_updates.extend_from_slice(updates);
  }
}

// =============================================================================
// Interpreter
// =============================================================================

/// Bytes the counting interpreter rejects.
pub const BAD_TILE: &[u8] = b"bad";

/// Produces one untextured drawable per frame and counts calls.
#[derive(Default)]
pub struct CountingInterpreter {
  calls: AtomicUsize,
}

impl CountingInterpreter {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl LoaderInterpreter for CountingInterpreter {
  fn interpret(&self, data: LoaderData, ret: &mut QuadLoaderReturn) -> Result<()> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if data.bytes == BAD_TILE {
      return Err(QuadTileError::Interpret("bad tile".into()));
    }
    let mut drawable = Drawable::new(format!("{} frame {}", data.ident, data.frame.index));
    drawable.enabled = data.enabled;
    drawable.draw_priority = data.draw_priority;

    let mut component = ComponentObject::new();
    component.drawable_ids.push(drawable.id);
    component.enabled = data.enabled;

    ret.changes.push(Box::new(AddDrawableReq::new(drawable)));
    ret.comp_objs.push(component);
    Ok(())
  }
}

/// Poll `tick` with 1 ms sleeps until `done` holds. Returns whether it did.
pub fn poll_until(mut tick: impl FnMut(), mut done: impl FnMut() -> bool) -> bool {
  for _ in 0..2000 {
    tick();
    if done() {
      return true;
    }
    std::thread::sleep(std::time::Duration::from_millis(1));
  }
  false
}
