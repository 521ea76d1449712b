//! QuadDisplayLayer - a dedicated thread that owns one sampling controller.
//!
//! ```text
//! caller ──update_view──► command channel ──► layer thread
//!                                              │ every tick_interval:
//!                                              │   update_view(latest)
//!                                              │   controller.tick
//!                                              ▼
//!                                            Scene (ChangeSets)
//! ```
//!
//! Views are coalesced: only the most recent one received before a tick is
//! sampled. The render thread keeps calling `Scene::process_changes` as usual.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};
use web_time::Instant;

use crate::error::{QuadTileError, Result};
use crate::metrics::LayerMetrics;
use crate::quadtree::{PassStats, QuadSamplingController};
use crate::scene::Scene;
use crate::view::ViewState;

/// Layer thread settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerConfig {
  /// How often pending views are sampled and builders ticked.
  pub tick_interval: Duration,
}

impl Default for LayerConfig {
  fn default() -> Self {
    Self {
      tick_interval: Duration::from_millis(16),
    }
  }
}

enum LayerCommand {
  View(Box<ViewState>),
  ForceRefresh,
  Shutdown,
}

pub struct QuadDisplayLayer;

impl QuadDisplayLayer {
  /// Move `controller` onto a new thread named after it.
  pub fn spawn(controller: QuadSamplingController, scene: Arc<Scene>, config: LayerConfig) -> Result<LayerHandle> {
    let (commands_tx, commands_rx) = channel::unbounded();
    let metrics = Arc::new(Mutex::new(LayerMetrics::new()));
    let name = format!("quad-layer-{}", controller.id().raw());

    let thread_metrics = metrics.clone();
    let thread = std::thread::Builder::new()
      .name(name)
      .spawn(move || run_layer(controller, &scene, config, commands_rx, &thread_metrics))
      .map_err(|err| QuadTileError::LayerThread(err.to_string()))?;

    Ok(LayerHandle {
      commands: commands_tx,
      thread: Some(thread),
      metrics,
    })
  }
}

fn run_layer(
  mut controller: QuadSamplingController,
  scene: &Scene,
  config: LayerConfig,
  commands: Receiver<LayerCommand>,
  metrics: &Mutex<LayerMetrics>,
) -> PassStats {
  tracing::debug!(controller = controller.id().raw(), "layer thread started");
  let ticker = channel::tick(config.tick_interval);
  let mut latest: Option<ViewState> = None;

  loop {
    channel::select! {
      recv(commands) -> command => match command {
        Ok(LayerCommand::View(view)) => latest = Some(*view),
        Ok(LayerCommand::ForceRefresh) => controller.force_refresh(),
        Ok(LayerCommand::Shutdown) | Err(_) => break,
      },
      recv(ticker) -> _ => {
        // The pass and the tick run unlocked so readers never wait on them.
        let pass = latest
          .as_ref()
          .and_then(|view| controller.update_view(view, scene))
          .map(|stats| (stats, controller.loaded_tiles()));
        let start = Instant::now();
        controller.tick(scene);
        let tick_us = start.elapsed().as_micros() as u64;

        let mut metrics = metrics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((stats, loaded)) = &pass {
          metrics.record_pass(stats, loaded);
        }
        metrics.record_tick_timing(tick_us);
      }
    }
  }

  let stats = controller.shutdown(scene);
  tracing::debug!(controller = controller.id().raw(), "layer thread stopped");
  stats
}

/// Control side of a running layer. Dropping it shuts the layer down.
pub struct LayerHandle {
  commands: Sender<LayerCommand>,
  thread: Option<JoinHandle<PassStats>>,
  metrics: Arc<Mutex<LayerMetrics>>,
}

impl LayerHandle {
  /// Queue a view; it replaces any view not yet sampled.
  pub fn update_view(&self, view: &ViewState) {
    let _ = self.commands.send(LayerCommand::View(Box::new(view.clone())));
  }

  /// Sample on the next tick even if the view has not changed.
  pub fn force_refresh(&self) {
    let _ = self.commands.send(LayerCommand::ForceRefresh);
  }

  /// Snapshot of the layer's metrics.
  pub fn metrics(&self) -> LayerMetrics {
    self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Stop the thread after a final removal pass. Returns the controller's
  /// last pass stats.
  pub fn shutdown(mut self) -> PassStats {
    self.stop()
  }

  fn stop(&mut self) -> PassStats {
    let Some(thread) = self.thread.take() else {
      return PassStats::default();
    };
    let _ = self.commands.send(LayerCommand::Shutdown);
    match thread.join() {
      Ok(stats) => stats,
      Err(_) => {
        tracing::warn!("layer thread panicked");
        PassStats::default()
      }
    }
  }
}

impl Drop for LayerHandle {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use glam::DVec2;

  use super::*;
  use crate::builder::TileGeometryBuilder;
  use crate::coord::{CoordSystemKind, DisplaySurface, FlatCoordSystem, Mbr};
  use crate::quadtree::{QuadTileBuilder, SamplingParams, TileBatch};
  use crate::scene::{ChangeSet, NullRenderer};
  use crate::test_utils::{flat_view, poll_until, RecordingBuilder};

  fn flat_params() -> SamplingParams {
    SamplingParams {
      coord_sys: Some(CoordSystemKind::Flat(FlatCoordSystem {
        bounds: Mbr::new(DVec2::ZERO, DVec2::ONE),
      })),
      max_zoom: 6,
      max_tiles: 10_000,
      min_importance: 64.0 * 64.0,
      ..Default::default()
    }
  }

  #[test]
  fn test_latest_view_wins() {
    let scene = Arc::new(Scene::new());
    let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
    let (builder, log) = RecordingBuilder::shared();
    controller.add_builder(builder);
    let layer = QuadDisplayLayer::spawn(
      controller,
      scene.clone(),
      LayerConfig {
        tick_interval: Duration::from_millis(100),
      },
    )
    .expect("spawn");

    let far = flat_view(DVec2::ZERO, 4.0);
    let near = flat_view(DVec2::new(0.2, 0.1), 0.3);
    layer.update_view(&far);
    layer.update_view(&near);
    assert!(poll_until(|| {}, || !log.batches().is_empty()));

    let batches = log.batches();
    assert_eq!(batches.len(), 1);

    let mut expected = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
    expected.update_view(&near, &Scene::new());
    let added: BTreeSet<_> = batches[0].to_add.iter().map(|r| r.ident).collect();
    let wanted: BTreeSet<_> = expected.loaded_tiles().into_iter().collect();
    assert_eq!(added, wanted);

    layer.shutdown();
    assert!(log.detached());
  }

  #[test]
  fn test_force_refresh_runs_a_pass() {
    let scene = Arc::new(Scene::new());
    let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
    let (builder, log) = RecordingBuilder::shared();
    controller.add_builder(builder);
    let layer = QuadDisplayLayer::spawn(controller, scene, LayerConfig::default()).expect("spawn");

    layer.update_view(&flat_view(DVec2::ZERO, 1.0));
    assert!(poll_until(|| {}, || log.batches().len() == 1));
    assert!(poll_until(|| {}, || log.ticks() >= 2));
    assert_eq!(log.batches().len(), 1);

    layer.force_refresh();
    assert!(poll_until(|| {}, || log.batches().len() == 2));
    assert!(log.last_batch().expect("batch").is_empty());
  }

  #[test]
  fn test_shutdown_removes_everything() {
    let scene = Arc::new(Scene::new());
    let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
    controller.add_builder(Arc::new(Mutex::new(TileGeometryBuilder::new())));
    let layer = QuadDisplayLayer::spawn(controller, scene.clone(), LayerConfig::default()).expect("spawn");

    layer.update_view(&flat_view(DVec2::ZERO, 1.0));
    assert!(poll_until(
      || {
        scene.process_changes(&mut NullRenderer, None, f64::INFINITY);
      },
      || scene.drawable_count() > 0
    ));

    let stats = layer.shutdown();
    assert!(stats.wanted > 0);
    scene.process_changes(&mut NullRenderer, None, f64::INFINITY);
    assert_eq!(scene.drawable_count(), 0);
  }

  /// Blocks its first tick until `release` fires or is dropped.
  struct GatedBuilder {
    entered: Sender<()>,
    release: Receiver<()>,
  }

  impl QuadTileBuilder for GatedBuilder {
    fn builder_update(&mut self, _batch: &TileBatch, _changes: &mut ChangeSet) {}

    fn builder_tick(&mut self, _scene: &Scene) {
      let _ = self.entered.try_send(());
      let _ = self.release.recv();
    }
  }

  #[test]
  fn test_metrics_readable_during_slow_tick() {
    let scene = Arc::new(Scene::new());
    let (entered_tx, entered_rx) = channel::unbounded();
    let (release_tx, release_rx) = channel::unbounded::<()>();
    let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
    controller.add_builder(Arc::new(Mutex::new(GatedBuilder {
      entered: entered_tx,
      release: release_rx,
    })));
    let layer = QuadDisplayLayer::spawn(controller, scene, LayerConfig::default()).expect("spawn");
    entered_rx.recv_timeout(Duration::from_secs(5)).expect("tick started");

    let (done_tx, done_rx) = channel::bounded(1);
    let read = std::thread::scope(|s| {
      s.spawn(|| {
        let _ = layer.metrics();
        let _ = done_tx.send(());
      });
      let read = done_rx.recv_timeout(Duration::from_secs(2));
      drop(release_tx);
      read
    });
    assert!(read.is_ok(), "metrics blocked behind the builder tick");

    layer.shutdown();
  }
}
