//! QuadTileLoader - fetch, interpret and merge tile content.
//!
//! # Pipeline
//!
//! ```text
//! builder_update ──► request frames ──► TileFetcher (external I/O)
//!                                            │ FetchResponder::finish
//!                                            ▼
//! tick: drain fetch results ──► parse queue ──► rayon (throttled)
//!                                                   │ LoaderInterpreter
//!                                                   ▼
//!       drain returns ──► merge checks ──► one ChangeSet per tile frame
//!                         (generation,
//!                          still wanted,
//!                          ticket)
//! ```
//!
//! Only the merge touches scene state. Everything before it may be thrown
//! away at any time: a reload bumps the generation, an unwanted tile drops
//! out of the table, and results that no longer match are discarded without
//! side effects.
//!
//! # Frame states
//!
//! ```text
//! Idle ─► Fetching ─► Interpreting ─► Loaded
//!  ▲         │              │
//!  │         └──► Failed ◄──┘   (retried on the next pass)
//!  └── cancel / reload / edge update
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, Sender};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::fetcher::{FetchResponder, FetchResult, FetchTicket, TileFetchRequest, TileFetcher};
use super::frame::{FrameState, FrameStats, QuadFrameInfo};
use super::interpreter::{LoaderData, LoaderInterpreter};
use super::loader_return::QuadLoaderReturn;
use super::source::TileInfoSource;
use super::throttle::ParseThrottle;
use crate::coord::DisplaySurface;
use crate::error::{FetchError, QuadTileError, Result};
use crate::identity::SimpleIdentity;
use crate::quadtree::{BuilderContext, EdgeMatch, QuadTileBuilder, QuadTreeIdentifier, SamplingParams, TileBatch};
use crate::scene::{AddTextureReq, ChangeSet, ComponentManager, Scene};

// =============================================================================
// Configuration
// =============================================================================

/// Per-loader settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
  /// Frames per tile. More than one for animated sources.
  pub num_frames: usize,
  /// Interpretations allowed in flight at once.
  pub max_parse_jobs: usize,
  /// Passed to interpreters: image row 0 at the bottom of the tile.
  pub flip_y: bool,
  /// Draw priority of level 0; finer levels add their level.
  pub base_draw_priority: i32,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      num_frames: 1,
      max_parse_jobs: 4,
      flip_y: false,
      base_draw_priority: 100,
    }
  }
}

impl LoaderConfig {
  pub fn validate(&self) -> Result<()> {
    if self.num_frames == 0 {
      return Err(QuadTileError::InvalidFrameCount);
    }
    Ok(())
  }
}

/// Running totals since the loader was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoaderStats {
  pub fetches_started: usize,
  pub merged: usize,
  /// Stale, cancelled or unwanted results thrown away.
  pub discarded: usize,
  pub failed: usize,
}

// =============================================================================
// Per-tile state
// =============================================================================

#[derive(Debug, Default)]
struct FrameSlot {
  state: FrameState,
  ticket: Option<FetchTicket>,
  /// Set while interpreting; raising it makes the job skip or flag its work.
  cancel: Option<Arc<AtomicBool>>,
  /// Component objects currently in the scene for this frame.
  comp_objs: SmallVec<[SimpleIdentity; 2]>,
}

impl FrameSlot {
  /// Abandon in-flight work. Returns false when nothing was in flight.
  fn cancel_in_flight(&mut self, to_cancel: &mut Vec<FetchTicket>) -> bool {
    match self.state {
      FrameState::Fetching => {
        if let Some(ticket) = self.ticket {
          to_cancel.push(ticket);
        }
      }
      FrameState::Interpreting => {
        if let Some(cancel) = &self.cancel {
          cancel.store(true, Ordering::Release);
        }
      }
      FrameState::Idle | FrameState::Loaded | FrameState::Failed => return false,
    }
    self.state = FrameState::Idle;
    self.ticket = None;
    self.cancel = None;
    true
  }
}

#[derive(Debug)]
struct TileEntry {
  importance: f64,
  edges: EdgeMatch,
  frames: SmallVec<[FrameSlot; 1]>,
}

impl TileEntry {
  fn new(num_frames: usize, importance: f64, edges: EdgeMatch) -> Self {
    Self {
      importance,
      edges,
      frames: (0..num_frames).map(|_| FrameSlot::default()).collect(),
    }
  }
}

struct ParseJob {
  ticket: FetchTicket,
  generation: u64,
  data: LoaderData,
  cancel: Arc<AtomicBool>,
}

// =============================================================================
// Loader
// =============================================================================

/// Builder that fetches real content for every wanted tile.
///
/// Register it with a `QuadSamplingController`; the controller's tick drives
/// `tick`, which merges finished work into the scene.
pub struct QuadTileLoader {
  config: LoaderConfig,
  source: Arc<dyn TileInfoSource>,
  fetcher: Box<dyn TileFetcher>,
  interpreter: Arc<dyn LoaderInterpreter>,
  components: Arc<ComponentManager>,
  generation: u64,
  current_frame: usize,
  tiles: BTreeMap<QuadTreeIdentifier, TileEntry>,
  params: Option<Arc<SamplingParams>>,
  display: DisplaySurface,
  fetch_tx: Sender<FetchResult>,
  fetch_rx: Receiver<FetchResult>,
  return_tx: Sender<QuadLoaderReturn>,
  return_rx: Receiver<QuadLoaderReturn>,
  parse_queue: VecDeque<ParseJob>,
  throttle: ParseThrottle,
  to_fetch: Vec<TileFetchRequest>,
  to_cancel: Vec<FetchTicket>,
  /// Changes made outside a pass, flushed on the next update or tick.
  pending: ChangeSet,
  context: Option<BuilderContext>,
  stats: LoaderStats,
}

impl QuadTileLoader {
  pub fn new(
    config: LoaderConfig,
    source: Arc<dyn TileInfoSource>,
    fetcher: Box<dyn TileFetcher>,
    interpreter: Arc<dyn LoaderInterpreter>,
    scene: &Scene,
  ) -> Result<Self> {
    config.validate()?;
    let (fetch_tx, fetch_rx) = channel::unbounded();
    let (return_tx, return_rx) = channel::unbounded();
    Ok(Self {
      throttle: ParseThrottle::new(config.max_parse_jobs),
      config,
      source,
      fetcher,
      interpreter,
      components: scene.component_manager().clone(),
      generation: 1,
      current_frame: 0,
      tiles: BTreeMap::new(),
      params: None,
      display: DisplaySurface::default(),
      fetch_tx,
      fetch_rx,
      return_tx,
      return_rx,
      parse_queue: VecDeque::new(),
      to_fetch: Vec::new(),
      to_cancel: Vec::new(),
      pending: ChangeSet::new(),
      context: None,
      stats: LoaderStats::default(),
    })
  }

  pub fn config(&self) -> &LoaderConfig {
    &self.config
  }

  /// Current generation. Starts at 1 and grows with every reload.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn stats(&self) -> LoaderStats {
    self.stats
  }

  /// Wanted tiles, loaded or not.
  pub fn tile_count(&self) -> usize {
    self.tiles.len()
  }

  pub fn current_frame(&self) -> usize {
    self.current_frame
  }

  pub fn frame_state(&self, ident: &QuadTreeIdentifier, frame: usize) -> Option<FrameState> {
    self.tiles.get(ident)?.frames.get(frame).map(|slot| slot.state)
  }

  /// Component objects shown for a tile frame.
  pub fn components_of(&self, ident: &QuadTreeIdentifier, frame: usize) -> Vec<SimpleIdentity> {
    self
      .tiles
      .get(ident)
      .and_then(|entry| entry.frames.get(frame))
      .map(|slot| slot.comp_objs.to_vec())
      .unwrap_or_default()
  }

  /// True when every frame of the tile is loaded.
  pub fn is_tile_loaded(&self, ident: &QuadTreeIdentifier) -> bool {
    self
      .tiles
      .get(ident)
      .is_some_and(|entry| entry.frames.iter().all(|slot| slot.state == FrameState::Loaded))
  }

  pub fn parse_jobs_in_flight(&self) -> usize {
    self.throttle.in_flight()
  }

  /// Per-frame progress over every wanted tile.
  pub fn frame_stats(&self) -> FrameStats {
    let mut stats = FrameStats::with_frames(self.config.num_frames);
    for entry in self.tiles.values() {
      for (stat, slot) in stats.frames.iter_mut().zip(&entry.frames) {
        stat.record(slot.state);
      }
    }
    stats
  }

  // ===========================================================================
  // Control
  // ===========================================================================

  /// Refetch everything under a new generation.
  ///
  /// In-flight work from the old generation is cancelled and its results are
  /// discarded when they arrive. Loaded content stays visible until its
  /// replacement merges.
  pub fn reload(&mut self) {
    self.generation += 1;
    tracing::debug!(generation = self.generation, tiles = self.tiles.len(), "loader reload");

    for entry in self.tiles.values_mut() {
      for slot in entry.frames.iter_mut() {
        slot.cancel_in_flight(&mut self.to_cancel);
        slot.state = FrameState::Idle;
      }
    }
    for job in self.parse_queue.drain(..) {
      job.cancel.store(true, Ordering::Release);
    }
    self.request_unloaded();
    self.flush_fetcher(Vec::new());
  }

  /// Cancel the in-flight frames of one tile.
  ///
  /// Loaded frames keep their content. Returns false when nothing was in
  /// flight, so a second call is a no-op.
  pub fn cancel_tile(&mut self, ident: &QuadTreeIdentifier) -> bool {
    let Some(entry) = self.tiles.get_mut(ident) else {
      return false;
    };
    let mut cancelled = false;
    for slot in entry.frames.iter_mut() {
      cancelled |= slot.cancel_in_flight(&mut self.to_cancel);
    }
    if cancelled {
      tracing::trace!(tile = %ident, "tile cancelled");
      self.flush_fetcher(Vec::new());
    }
    cancelled
  }

  /// Show `index` and hide every other frame.
  ///
  /// Returns false for an out-of-range index.
  pub fn set_current_frame(&mut self, index: usize, changes: &mut ChangeSet) -> bool {
    if index >= self.config.num_frames {
      return false;
    }
    self.current_frame = index;
    for entry in self.tiles.values() {
      for (frame, slot) in entry.frames.iter().enumerate() {
        self.components.enable_components(&slot.comp_objs, frame == index, changes);
      }
    }
    true
  }

  // ===========================================================================
  // Requests
  // ===========================================================================

  /// Request every frame that is idle or failed.
  fn request_unloaded(&mut self) {
    let wanted: Vec<(QuadTreeIdentifier, usize)> = self
      .tiles
      .iter()
      .flat_map(|(ident, entry)| {
        entry
          .frames
          .iter()
          .enumerate()
          .filter(|(_, slot)| matches!(slot.state, FrameState::Idle | FrameState::Failed))
          .map(move |(frame, _)| (*ident, frame))
      })
      .collect();
    for (ident, frame) in wanted {
      self.request_frame(ident, frame);
    }
  }

  fn request_frame(&mut self, ident: QuadTreeIdentifier, index: usize) {
    let Some(params) = self.params.clone() else {
      return;
    };
    let frame = QuadFrameInfo::new(index);
    let info = self.source.fetch_info(&ident, frame);
    let Some(entry) = self.tiles.get_mut(&ident) else {
      return;
    };
    let importance = entry.importance;
    let Some(slot) = entry.frames.get_mut(index) else {
      return;
    };

    let Some(info) = info else {
      // No data for this frame: loaded and empty.
      slot.state = FrameState::Loaded;
      let old = std::mem::take(&mut slot.comp_objs);
      self.components.remove_components(&old, &mut self.pending);
      return;
    };

    let ticket = FetchTicket::next();
    slot.state = FrameState::Fetching;
    slot.ticket = Some(ticket);
    self.to_fetch.push(TileFetchRequest {
      ticket,
      ident,
      frame,
      priority: fetch_priority(&params, &ident),
      importance,
      info,
      responder: FetchResponder::new(ticket, ident, frame, self.generation, self.fetch_tx.clone()),
    });
  }

  /// Hand queued cancels, fetches and priority changes to the fetcher.
  fn flush_fetcher(&mut self, priority_updates: Vec<(FetchTicket, i32, f64)>) {
    if !self.to_cancel.is_empty() {
      let tickets = std::mem::take(&mut self.to_cancel);
      self.fetcher.cancel_tile_fetches(&tickets);
    }
    if !self.to_fetch.is_empty() {
      let mut requests = std::mem::take(&mut self.to_fetch);
      requests.sort_by(|a, b| {
        b.priority
          .cmp(&a.priority)
          .then(b.importance.total_cmp(&a.importance))
          .then(a.ident.cmp(&b.ident))
      });
      self.stats.fetches_started += requests.len();
      self.fetcher.start_tile_fetches(requests);
    }
    if !priority_updates.is_empty() {
      self.fetcher.update_priorities(&priority_updates);
    }
  }

  // ===========================================================================
  // Tick
  // ===========================================================================

  /// Move finished fetches into interpretation and merge finished
  /// interpretations into the scene. Returns the number of tile frames
  /// merged.
  #[tracing::instrument(skip_all, name = "loader::tick")]
  pub fn tick(&mut self, scene: &Scene) -> usize {
    {
      let _span = tracing::info_span!("drain_fetches").entered();
      while let Ok(result) = self.fetch_rx.try_recv() {
        self.handle_fetch(result);
      }
    }

    {
      let _span = tracing::info_span!("dispatch_parses").entered();
      self.dispatch_parses();
    }

    let mut merged = 0;
    {
      let _span = tracing::info_span!("merge").entered();
      while let Ok(ret) = self.return_rx.try_recv() {
        if let Some(block) = self.merge(ret) {
          scene.add_change_requests(block);
          merged += 1;
        }
      }
    }

    if !self.pending.is_empty() {
      scene.add_change_requests(std::mem::take(&mut self.pending));
    }
    merged
  }

  fn handle_fetch(&mut self, result: FetchResult) {
    let Some(params) = self.params.clone() else {
      return;
    };
    let current = result.generation == self.generation;
    let entry = self.tiles.get_mut(&result.ident);
    let edges = entry.as_ref().map(|e| e.edges).unwrap_or_default();
    let slot = entry.and_then(|e| e.frames.get_mut(result.frame.index));
    let Some(slot) = slot.filter(|s| current && s.state == FrameState::Fetching && s.ticket == Some(result.ticket))
    else {
      tracing::trace!(tile = %result.ident, generation = result.generation, "stale fetch discarded");
      self.stats.discarded += 1;
      return;
    };

    match result.result {
      Ok(bytes) => {
        let cancel = Arc::new(AtomicBool::new(false));
        slot.state = FrameState::Interpreting;
        slot.cancel = Some(cancel.clone());
        self.parse_queue.push_back(ParseJob {
          ticket: result.ticket,
          generation: result.generation,
          data: LoaderData {
            ident: result.ident,
            frame: result.frame,
            bytes,
            params,
            display: self.display,
            edges,
            enabled: result.frame.index == self.current_frame,
            draw_priority: self.config.base_draw_priority + result.ident.level,
            flip_y: self.config.flip_y,
          },
          cancel,
        });
      }
      Err(FetchError::NotFound) => {
        slot.state = FrameState::Loaded;
        slot.ticket = None;
        let old = std::mem::take(&mut slot.comp_objs);
        self.components.remove_components(&old, &mut self.pending);
      }
      Err(FetchError::Cancelled) => {
        // The fetcher gave up on its own; ask again next pass.
        slot.state = FrameState::Idle;
        slot.ticket = None;
      }
      Err(err) => {
        tracing::warn!(tile = %result.ident, frame = result.frame.index, %err, "tile fetch failed");
        slot.state = FrameState::Failed;
        slot.ticket = None;
        self.stats.failed += 1;
      }
    }
  }

  fn dispatch_parses(&mut self) {
    while !self.parse_queue.is_empty() {
      let Some(permit) = self.throttle.try_acquire() else {
        tracing::trace!(queued = self.parse_queue.len(), "parse throttle full");
        break;
      };
      let Some(job) = self.parse_queue.pop_front() else {
        break;
      };
      if job.cancel.load(Ordering::Acquire) {
        continue;
      }

      let interpreter = self.interpreter.clone();
      let sender = self.return_tx.clone();
      rayon::spawn(move || {
        let ParseJob {
          ticket,
          generation,
          data,
          cancel,
        } = job;
        let mut ret = QuadLoaderReturn::new(data.ident, data.frame, generation, ticket);
        if !cancel.load(Ordering::Acquire) {
          if let Err(err) = interpreter.interpret(data, &mut ret) {
            tracing::debug!(tile = %ret.ident, %err, "interpretation failed");
            ret.has_error = true;
          }
        }
        ret.cancelled = cancel.load(Ordering::Acquire);
        drop(permit);
        // Receiver gone means the loader was dropped.
        let _ = sender.send(ret);
      });
    }
  }

  /// Apply the merge checks and build the tile frame's change block.
  fn merge(&mut self, mut ret: QuadLoaderReturn) -> Option<ChangeSet> {
    let current = !ret.cancelled && ret.generation == self.generation;
    let slot = self
      .tiles
      .get_mut(&ret.ident)
      .and_then(|entry| entry.frames.get_mut(ret.frame.index))
      .filter(|s| current && s.state == FrameState::Interpreting && s.ticket == Some(ret.ticket));
    let Some(slot) = slot else {
      tracing::trace!(
        tile = %ret.ident,
        generation = ret.generation,
        cancelled = ret.cancelled,
        "stale return discarded"
      );
      self.stats.discarded += 1;
      return None;
    };

    slot.ticket = None;
    slot.cancel = None;
    if ret.has_error {
      slot.state = FrameState::Failed;
      self.stats.failed += 1;
      return None;
    }

    let mut block = ChangeSet::with_capacity(ret.images.len() + ret.changes.len() + 2);
    for texture in ret.images.drain(..) {
      block.push(Box::new(AddTextureReq::new(texture)));
    }
    block.append(&mut ret.changes);

    let old = std::mem::take(&mut slot.comp_objs);
    for component in ret.comp_objs.drain(..) {
      slot.comp_objs.push(component.id);
      self.components.add_component(component);
    }
    // The frame shown may have changed while this one was interpreted.
    let shown = ret.frame.index == self.current_frame;
    self.components.enable_components(&slot.comp_objs, shown, &mut block);
    // Replaced content leaves in the same block the new content arrives in.
    self.components.remove_components(&old, &mut block);

    slot.state = FrameState::Loaded;
    self.stats.merged += 1;
    Some(block)
  }
}

/// Coarser levels first so coverage fills in before detail.
fn fetch_priority(params: &SamplingParams, ident: &QuadTreeIdentifier) -> i32 {
  params.max_zoom - ident.level
}

// =============================================================================
// Builder delegate
// =============================================================================

impl QuadTileBuilder for QuadTileLoader {
  fn builder_attached(&mut self, ctx: &BuilderContext) {
    self.context = Some(*ctx);
    tracing::debug!(
      controller = ctx.controller.raw(),
      builder = ctx.builder.raw(),
      frames = self.config.num_frames,
      "loader attached"
    );
  }

  fn builder_update(&mut self, batch: &TileBatch, changes: &mut ChangeSet) {
    self.params = Some(batch.params.clone());
    self.display = batch.display;

    for ident in &batch.to_remove {
      let Some(mut entry) = self.tiles.remove(ident) else {
        continue;
      };
      let mut ids: SmallVec<[SimpleIdentity; 4]> = SmallVec::new();
      for slot in entry.frames.iter_mut() {
        slot.cancel_in_flight(&mut self.to_cancel);
        ids.extend(slot.comp_objs.drain(..));
      }
      self.components.remove_components(&ids, changes);
    }

    // Edge flags changed: refetch so the new mesh gets the right skirts.
    for request in &batch.to_update {
      let Some(entry) = self.tiles.get_mut(&request.ident) else {
        continue;
      };
      entry.edges = request.edges;
      entry.importance = request.importance;
      for slot in entry.frames.iter_mut() {
        slot.cancel_in_flight(&mut self.to_cancel);
        slot.state = FrameState::Idle;
      }
    }

    let num_frames = self.config.num_frames;
    for request in &batch.to_add {
      let entry = self
        .tiles
        .entry(request.ident)
        .or_insert_with(|| TileEntry::new(num_frames, request.importance, request.edges));
      entry.importance = request.importance;
      if entry.edges != request.edges {
        entry.edges = request.edges;
        for slot in entry.frames.iter_mut() {
          slot.cancel_in_flight(&mut self.to_cancel);
          slot.state = FrameState::Idle;
        }
      }
    }

    // Importance drifts as the camera moves; keep queued fetches ordered.
    let mut priority_updates = Vec::new();
    for (ident, entry) in self.tiles.iter_mut() {
      let Some(importance) = batch.importance(ident) else {
        continue;
      };
      if importance == entry.importance {
        continue;
      }
      entry.importance = importance;
      let priority = fetch_priority(&batch.params, ident);
      for slot in &entry.frames {
        if let (FrameState::Fetching, Some(ticket)) = (slot.state, slot.ticket) {
          priority_updates.push((ticket, priority, importance));
        }
      }
    }

    self.request_unloaded();
    changes.append(&mut self.pending);
    self.flush_fetcher(priority_updates);
  }

  fn builder_tick(&mut self, scene: &Scene) {
    self.tick(scene);
  }

  fn builder_detached(&mut self, changes: &mut ChangeSet) {
    let mut ids = Vec::new();
    for entry in self.tiles.values_mut() {
      for slot in entry.frames.iter_mut() {
        slot.cancel_in_flight(&mut self.to_cancel);
        ids.extend(slot.comp_objs.drain(..));
      }
    }
    self.tiles.clear();
    for job in self.parse_queue.drain(..) {
      job.cancel.store(true, Ordering::Release);
    }
    self.components.remove_components(&ids, changes);
    changes.append(&mut self.pending);
    self.flush_fetcher(Vec::new());
    if let Some(ctx) = self.context.take() {
      tracing::debug!(builder = ctx.builder.raw(), "loader detached");
    }
  }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;
