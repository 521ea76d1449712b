//! QuadSamplingController - decides which tiles should be loaded.
//!
//! One pass per view change:
//!
//! ```text
//! ViewState ─► evaluate importance ─► max_tiles cut ─► diff vs loaded ─► budget
//!                 (pruned recursion)    (by importance)      (stable order)
//!                                                              │
//!                        builders ◄── one TileBatch each ◄─────┘
//! ```
//!
//! The controller owns the loaded set. Builders only see batches; they never
//! observe a half-applied pass.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;
use web_time::Instant;

use super::edge::{compute_edge_match, EdgeMatch};
use super::importance::ImportanceCalculator;
use super::{PassStats, QuadTreeIdentifier, SamplingParams, TileBudget};
use crate::coord::{CoordSystem, CoordSystemKind, DisplaySurface};
use crate::scene::{ChangeSet, Scene};
use crate::view::ViewState;

// =============================================================================
// Identifiers
// =============================================================================

static CONTROLLER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static BUILDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque controller identifier, unique within the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ControllerId(u64);

impl ControllerId {
  fn next() -> Self {
    Self(CONTROLLER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// Registration handle for a builder attached to a controller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BuilderId(u64);

impl BuilderId {
  fn next() -> Self {
    Self(BUILDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
  }

  pub fn raw(&self) -> u64 {
    self.0
  }
}

// =============================================================================
// Batches
// =============================================================================

/// Polar cap outside the normal tile grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum Pole {
  North,
  South,
}

/// One tile to build or rebuild.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TileBuildRequest {
  pub ident: QuadTreeIdentifier,
  pub importance: f64,
  /// Edges that need a skirt.
  pub edges: EdgeMatch,
}

/// Everything one builder learns from one sampling pass.
///
/// Lists are sorted by node number.
#[derive(Clone, Debug)]
pub struct TileBatch {
  pub params: Arc<SamplingParams>,
  pub display: DisplaySurface,
  pub to_add: Vec<TileBuildRequest>,
  /// Still-loaded tiles whose edge flags changed.
  pub to_update: Vec<TileBuildRequest>,
  pub to_remove: Vec<QuadTreeIdentifier>,
  pub poles_to_add: SmallVec<[Pole; 2]>,
  pub poles_to_remove: SmallVec<[Pole; 2]>,
  /// Importance of every tile loaded after this pass.
  pub loaded: Arc<BTreeMap<QuadTreeIdentifier, f64>>,
}

impl TileBatch {
  /// True when the batch carries no tile events.
  pub fn is_empty(&self) -> bool {
    self.to_add.is_empty()
      && self.to_update.is_empty()
      && self.to_remove.is_empty()
      && self.poles_to_add.is_empty()
      && self.poles_to_remove.is_empty()
  }

  /// Importance of a loaded tile, None when it is not loaded.
  pub fn importance(&self, ident: &QuadTreeIdentifier) -> Option<f64> {
    self.loaded.get(ident).copied()
  }

  pub fn is_loaded(&self, ident: &QuadTreeIdentifier) -> bool {
    self.loaded.contains_key(ident)
  }
}

// =============================================================================
// Builder delegate
// =============================================================================

/// Registration details handed to a builder when it is attached.
#[derive(Clone, Copy, Debug)]
pub struct BuilderContext {
  pub controller: ControllerId,
  pub builder: BuilderId,
}

/// Delegate that turns tile events into scene content.
///
/// All calls come from the thread driving the controller.
pub trait QuadTileBuilder: Send {
  /// Called once when registered.
  fn builder_attached(&mut self, _ctx: &BuilderContext) {}

  /// Exactly one call per sampling pass, empty batches included.
  fn builder_update(&mut self, batch: &TileBatch, changes: &mut ChangeSet);

  /// Called on every controller tick, whether or not a pass ran.
  fn builder_tick(&mut self, _scene: &Scene) {}

  /// Called once when unregistered. The builder must not be called again.
  fn builder_detached(&mut self, _changes: &mut ChangeSet) {}
}

/// Shared handle to a builder.
pub type SharedBuilder = Arc<Mutex<dyn QuadTileBuilder>>;

struct RegisteredBuilder {
  id: BuilderId,
  builder: SharedBuilder,
  /// Gets every loaded tile as an add on the next pass.
  needs_full: bool,
}

#[derive(Clone, Copy, Debug)]
struct LoadedTile {
  importance: f64,
  edges: EdgeMatch,
}

// =============================================================================
// Controller
// =============================================================================

/// Maintains the loaded tile set for one `SamplingParams`.
pub struct QuadSamplingController {
  id: ControllerId,
  params: Arc<SamplingParams>,
  display: DisplaySurface,
  budget: TileBudget,
  builders: Vec<RegisteredBuilder>,
  loaded: BTreeMap<QuadTreeIdentifier, LoadedTile>,
  poles: BTreeSet<Pole>,
  last_view: Option<ViewState>,
  dirty: bool,
  last_stats: PassStats,
}

impl QuadSamplingController {
  pub fn new(params: SamplingParams, display: DisplaySurface) -> Self {
    if let Err(err) = params.validate() {
      tracing::warn!(%err, "sampling params invalid, nothing will load");
    }
    Self {
      id: ControllerId::next(),
      params: Arc::new(params),
      display,
      budget: TileBudget::UNLIMITED,
      builders: Vec::new(),
      loaded: BTreeMap::new(),
      poles: BTreeSet::new(),
      last_view: None,
      dirty: true,
      last_stats: PassStats::default(),
    }
  }

  pub fn with_budget(mut self, budget: TileBudget) -> Self {
    self.budget = budget;
    self
  }

  pub fn id(&self) -> ControllerId {
    self.id
  }

  pub fn params(&self) -> &Arc<SamplingParams> {
    &self.params
  }

  pub fn display(&self) -> DisplaySurface {
    self.display
  }

  pub fn budget(&self) -> TileBudget {
    self.budget
  }

  pub fn set_budget(&mut self, budget: TileBudget) {
    self.budget = budget;
  }

  /// Stats of the most recent pass.
  pub fn last_stats(&self) -> PassStats {
    self.last_stats
  }

  /// Loaded tiles in node number order.
  pub fn loaded_tiles(&self) -> Vec<QuadTreeIdentifier> {
    self.loaded.keys().copied().collect()
  }

  pub fn loaded_count(&self) -> usize {
    self.loaded.len()
  }

  pub fn is_loaded(&self, ident: &QuadTreeIdentifier) -> bool {
    self.loaded.contains_key(ident)
  }

  pub fn importance_of(&self, ident: &QuadTreeIdentifier) -> Option<f64> {
    self.loaded.get(ident).map(|t| t.importance)
  }

  pub fn edges_of(&self, ident: &QuadTreeIdentifier) -> Option<EdgeMatch> {
    self.loaded.get(ident).map(|t| t.edges)
  }

  pub fn loaded_poles(&self) -> Vec<Pole> {
    self.poles.iter().copied().collect()
  }

  pub fn builder_count(&self) -> usize {
    self.builders.len()
  }

  /// Make the next `update_view` run a pass even if the view is unchanged.
  pub fn force_refresh(&mut self) {
    self.dirty = true;
  }

  // ===========================================================================
  // Builders
  // ===========================================================================

  /// Register a builder. It receives every loaded tile on the next pass.
  pub fn add_builder(&mut self, builder: SharedBuilder) -> BuilderId {
    let id = BuilderId::next();
    lock_builder(&builder).builder_attached(&BuilderContext {
      controller: self.id,
      builder: id,
    });
    self.builders.push(RegisteredBuilder {
      id,
      builder,
      needs_full: true,
    });
    self.dirty = true;
    tracing::debug!(controller = self.id.raw(), builder = id.raw(), "builder attached");
    id
  }

  /// Unregister a builder. Returns false for unknown IDs.
  ///
  /// The builder queues removal of its own content in `builder_detached`.
  pub fn remove_builder(&mut self, id: BuilderId, scene: &Scene) -> bool {
    let Some(pos) = self.builders.iter().position(|b| b.id == id) else {
      return false;
    };
    let registered = self.builders.remove(pos);
    let mut changes = ChangeSet::new();
    lock_builder(&registered.builder).builder_detached(&mut changes);
    scene.add_change_requests(changes);
    tracing::debug!(controller = self.id.raw(), builder = id.raw(), "builder detached");
    true
  }

  // ===========================================================================
  // Reconfiguration
  // ===========================================================================

  /// Replace the sampling params.
  ///
  /// Structurally equal params are ignored (returns false). Otherwise every
  /// builder gets a full removal batch and the next pass starts over.
  pub fn set_params(&mut self, params: SamplingParams, scene: &Scene) -> bool {
    if *self.params == params {
      return false;
    }
    if let Err(err) = params.validate() {
      tracing::warn!(%err, "sampling params invalid, nothing will load");
    }
    self.reset_all(scene);
    self.params = Arc::new(params);
    self.dirty = true;
    true
  }

  /// Replace the coordinate system. Bounds are recomputed on the next pass.
  pub fn set_coord_sys(&mut self, coord_sys: CoordSystemKind, scene: &Scene) -> bool {
    let params = SamplingParams {
      coord_sys: Some(coord_sys),
      ..(*self.params).clone()
    };
    self.set_params(params, scene)
  }

  /// Final removal batch for every builder, then detach them all.
  ///
  /// No drawable created through this controller survives.
  pub fn shutdown(&mut self, scene: &Scene) -> PassStats {
    self.reset_all(scene);
    let mut changes = ChangeSet::new();
    for registered in self.builders.drain(..) {
      lock_builder(&registered.builder).builder_detached(&mut changes);
    }
    scene.add_change_requests(changes);
    tracing::debug!(controller = self.id.raw(), "controller shut down");
    self.last_stats
  }

  /// Send a batch removing everything loaded and forget it.
  fn reset_all(&mut self, scene: &Scene) {
    let removed = std::mem::take(&mut self.loaded);
    let poles = std::mem::take(&mut self.poles);
    let batch = TileBatch {
      params: self.params.clone(),
      display: self.display,
      to_add: Vec::new(),
      to_update: Vec::new(),
      to_remove: removed.into_keys().collect(),
      poles_to_add: SmallVec::new(),
      poles_to_remove: poles.into_iter().collect(),
      loaded: Arc::new(BTreeMap::new()),
    };

    let mut changes = ChangeSet::new();
    for registered in &mut self.builders {
      lock_builder(&registered.builder).builder_update(&batch, &mut changes);
      registered.needs_full = true;
    }
    scene.add_change_requests(changes);
    self.last_view = None;
  }

  // ===========================================================================
  // Sampling pass
  // ===========================================================================

  /// Run a sampling pass for `view` and notify builders.
  ///
  /// Returns None when the pass was skipped: same view, no forced refresh and
  /// nothing deferred by the budget.
  #[tracing::instrument(skip_all, name = "sampling::update_view")]
  pub fn update_view(&mut self, view: &ViewState, scene: &Scene) -> Option<PassStats> {
    let unchanged = self.last_view.as_ref() == Some(view);
    if unchanged && !self.dirty && !self.last_stats.has_deferred() {
      return None;
    }

    let start = Instant::now();
    let mut stats = PassStats::default();

    let wanted = {
      let _span = tracing::info_span!("evaluate_importance").entered();
      self.evaluate(view, &mut stats)
    };

    let wanted = {
      let _span = tracing::info_span!("max_tiles_cut").entered();
      self.apply_max_tiles(wanted, &mut stats)
    };

    let batches = {
      let _span = tracing::info_span!("diff").entered();
      self.diff(wanted, &mut stats)
    };

    {
      let _span = tracing::info_span!("dispatch").entered();
      self.dispatch(&batches, scene);
    }

    stats.pass_us = start.elapsed().as_micros() as u64;
    tracing::debug!(
      controller = self.id.raw(),
      evaluated = stats.nodes_evaluated,
      wanted = stats.wanted,
      added = stats.added,
      removed = stats.removed,
      updated = stats.updated,
      deferred_adds = stats.deferred_adds,
      deferred_removes = stats.deferred_removes,
      pass_us = stats.pass_us,
      "sampling pass"
    );

    self.last_view = Some(view.clone());
    self.dirty = false;
    self.last_stats = stats;
    Some(stats)
  }

  /// Let every builder drain its async work.
  pub fn tick(&mut self, scene: &Scene) {
    for registered in &self.builders {
      lock_builder(&registered.builder).builder_tick(scene);
    }
  }

  /// Importance-driven recursion from the root tile.
  ///
  /// A node below its threshold is dropped together with its whole subtree.
  /// Levels under `min_zoom` are walked only through visible tiles, so the
  /// pass cost follows what the camera sees rather than `4^min_zoom`.
  fn evaluate(&self, view: &ViewState, stats: &mut PassStats) -> BTreeMap<QuadTreeIdentifier, f64> {
    let mut wanted = BTreeMap::new();
    let params = &*self.params;
    if let Err(err) = params.validate() {
      tracing::warn!(%err, "no tiles sampled");
      return wanted;
    }
    let Some(cs) = params.coord_sys.as_ref() else {
      return wanted;
    };

    let calc = ImportanceCalculator::new(params, cs, self.display, view);
    let height = self.display.height_above_surface(view.eye_pos);
    let forced_level = params
      .force_min_level
      .filter(|_| params.force_min_level_height <= 0.0 || height < params.force_min_level_height);

    let mut stack: Vec<QuadTreeIdentifier> = Vec::with_capacity(64);
    stack.push(QuadTreeIdentifier::new(0, 0, 0));

    while let Some(node) = stack.pop() {
      stats.nodes_evaluated += 1;
      let forced = forced_level.is_some_and(|level| node.level <= level);

      // Above min_zoom nodes are never wanted; they only gate their subtree
      // on being visible at all.
      if node.level < params.min_zoom {
        if forced || calc.importance(&node) > 0.0 {
          stack.extend(node.children());
        }
        continue;
      }

      let importance = if forced {
        f64::MAX
      } else {
        let Some(threshold) = params.importance_for_level(node.level) else {
          continue;
        };
        let importance = calc.importance(&node);
        if importance <= 0.0 || importance < threshold {
          continue;
        }
        importance
      };

      wanted.insert(node, importance);
      if node.level < params.max_zoom {
        stack.extend(node.children());
      }
    }

    if params.single_level {
      let frontier: BTreeMap<_, _> = wanted
        .iter()
        .filter(|(ident, _)| !ident.children().any(|child| wanted.contains_key(&child)))
        .map(|(ident, imp)| (*ident, *imp))
        .collect();
      wanted = frontier;
    }

    wanted
  }

  /// Keep the `max_tiles` most important nodes, ties by node number.
  fn apply_max_tiles(
    &self,
    wanted: BTreeMap<QuadTreeIdentifier, f64>,
    stats: &mut PassStats,
  ) -> BTreeMap<QuadTreeIdentifier, f64> {
    let max_tiles = self.params.max_tiles;
    if wanted.len() <= max_tiles {
      stats.wanted = wanted.len();
      return wanted;
    }

    let mut ranked: Vec<(QuadTreeIdentifier, f64)> = wanted.into_iter().collect();
    ranked.sort_by(|a, b| {
      b.1
        .total_cmp(&a.1)
        .then(a.0.node_number().cmp(&b.0.node_number()))
    });
    stats.dropped_by_max_tiles = ranked.len() - max_tiles;
    ranked.truncate(max_tiles);
    stats.wanted = ranked.len();
    ranked.into_iter().collect()
  }

  /// Diff the wanted set against the loaded set, apply the budget and
  /// update `self.loaded`. Returns the batch for incremental builders and,
  /// when any builder was just attached, the batch for those.
  fn diff(&mut self, wanted: BTreeMap<QuadTreeIdentifier, f64>, stats: &mut PassStats) -> PassBatches {
    // Adds, most important first so the budget defers the least important.
    let mut adds: Vec<(QuadTreeIdentifier, f64)> = wanted
      .iter()
      .filter(|(ident, _)| !self.loaded.contains_key(ident))
      .map(|(ident, imp)| (*ident, *imp))
      .collect();
    adds.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    // Removes, finest first so coarse coverage goes last.
    let mut removes: Vec<QuadTreeIdentifier> = self
      .loaded
      .keys()
      .filter(|ident| !wanted.contains_key(ident))
      .copied()
      .collect();
    removes.sort_by(|a, b| b.level.cmp(&a.level).then(a.cmp(b)));

    let add_limit = self.budget.adds_allowed(adds.len());
    let remove_limit = self.budget.removes_allowed(removes.len());
    stats.deferred_adds = adds.len() - add_limit;
    stats.deferred_removes = removes.len() - remove_limit;
    adds.truncate(add_limit);
    removes.truncate(remove_limit);

    // New loaded key set; edge flags are computed against it.
    for ident in &removes {
      self.loaded.remove(ident);
    }
    let added: BTreeSet<QuadTreeIdentifier> = adds.iter().map(|(ident, _)| *ident).collect();
    for (ident, importance) in &adds {
      self.loaded.insert(
        *ident,
        LoadedTile {
          importance: *importance,
          edges: EdgeMatch::NONE,
        },
      );
    }

    let edge_matching = self.params.edge_matching;
    let keys: BTreeSet<QuadTreeIdentifier> = self.loaded.keys().copied().collect();
    let mut to_add = Vec::with_capacity(adds.len());
    let mut to_update = Vec::new();
    for (ident, tile) in self.loaded.iter_mut() {
      if let Some(importance) = wanted.get(ident) {
        tile.importance = *importance;
      }
      let edges = if edge_matching {
        compute_edge_match(ident, |n| keys.contains(n))
      } else {
        EdgeMatch::NONE
      };
      let request = TileBuildRequest {
        ident: *ident,
        importance: tile.importance,
        edges,
      };
      if added.contains(ident) {
        tile.edges = edges;
        to_add.push(request);
      } else if tile.edges != edges {
        tile.edges = edges;
        to_update.push(request);
      }
    }
    removes.sort();

    // Poles follow the loaded set.
    let want_poles = self.wants_poles();
    let (poles_to_add, poles_to_remove): (SmallVec<[Pole; 2]>, SmallVec<[Pole; 2]>) = if want_poles {
      let add = [Pole::North, Pole::South]
        .into_iter()
        .filter(|p| !self.poles.contains(p))
        .collect();
      (add, SmallVec::new())
    } else {
      (SmallVec::new(), self.poles.iter().copied().collect())
    };
    for pole in &poles_to_add {
      self.poles.insert(*pole);
    }
    for pole in &poles_to_remove {
      self.poles.remove(pole);
    }

    stats.added = to_add.len();
    stats.removed = removes.len();
    stats.updated = to_update.len();

    let loaded: Arc<BTreeMap<QuadTreeIdentifier, f64>> =
      Arc::new(self.loaded.iter().map(|(ident, t)| (*ident, t.importance)).collect());

    let full = self.builders.iter().any(|b| b.needs_full).then(|| TileBatch {
      params: self.params.clone(),
      display: self.display,
      to_add: self
        .loaded
        .iter()
        .map(|(ident, t)| TileBuildRequest {
          ident: *ident,
          importance: t.importance,
          edges: t.edges,
        })
        .collect(),
      to_update: Vec::new(),
      to_remove: Vec::new(),
      poles_to_add: self.poles.iter().copied().collect(),
      poles_to_remove: SmallVec::new(),
      loaded: loaded.clone(),
    });

    PassBatches {
      incremental: TileBatch {
        params: self.params.clone(),
        display: self.display,
        to_add,
        to_update,
        to_remove: removes,
        poles_to_add,
        poles_to_remove,
        loaded,
      },
      full,
    }
  }

  fn wants_poles(&self) -> bool {
    let params = &*self.params;
    let Some(cs) = params.coord_sys.as_ref() else {
      return false;
    };
    params.cover_poles
      && self.display.is_globe()
      && cs.is_world_spanning()
      && !cs.covers_poles()
      && !self.loaded.is_empty()
  }

  /// One `builder_update` per builder, all changes queued as one block.
  fn dispatch(&mut self, batches: &PassBatches, scene: &Scene) {
    let mut changes = ChangeSet::new();
    for registered in &mut self.builders {
      let batch = match (&batches.full, registered.needs_full) {
        (Some(full), true) => full,
        _ => &batches.incremental,
      };
      lock_builder(&registered.builder).builder_update(batch, &mut changes);
      registered.needs_full = false;
    }
    scene.add_change_requests(changes);
  }
}

struct PassBatches {
  incremental: TileBatch,
  /// Everything loaded, for builders attached since the last pass.
  full: Option<TileBatch>,
}

fn lock_builder(builder: &SharedBuilder) -> MutexGuard<'_, dyn QuadTileBuilder + 'static> {
  builder.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "sampling_test.rs"]
mod sampling_test;
