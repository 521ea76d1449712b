//! Headless fly-through for the quadtile pipeline.
//!
//! Samples a camera path, loads synthetic PNG tiles through the real loader
//! and interpreter, drains the scene change queue into a counting renderer and
//! prints what happened. Exits with an error if anything survives shutdown.

mod config;
mod fetcher;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec2;
use quadtile::coord::DisplaySurface;
use quadtile::loader::{ImageInterpreter, UrlTemplateSource};
use quadtile::scene::{Drawable, Texture};
use quadtile::{
  ChangeSet, LayerConfig, QuadDisplayLayer, QuadSamplingController, QuadTileLoader, RenderBackend, Scene,
  SimpleIdentity, TileGeometryBuilder, ViewState,
};
use web_time::Instant;

use config::{CameraPath, SimConfig};
use fetcher::{FetchCounters, SyntheticFetcher};

/// Flies a synthetic camera over a synthetic tile source.
#[derive(Parser, Debug)]
#[command(name = "quadtile_sim")]
#[command(about = "Drives tile sampling and loading without a GPU")]
struct Args {
  /// Path to configuration TOML file (built-in defaults when omitted).
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Override camera.steps.
  #[arg(long)]
  steps: Option<usize>,

  /// Reload every tile after this step.
  #[arg(long)]
  reload_at: Option<usize>,

  /// Also build placeholder geometry for every wanted tile.
  #[arg(long)]
  placeholders: bool,

  /// Run sampling on a layer thread instead of inline.
  #[arg(long)]
  layer: bool,

  /// Print one line per camera step.
  #[arg(short, long)]
  verbose: bool,
}

/// Counts what a GPU backend would have been asked to do.
#[derive(Debug, Default)]
struct StatsRenderer {
  textures_up: usize,
  textures_down: usize,
  texture_bytes: usize,
  drawables_up: usize,
  drawables_down: usize,
}

impl RenderBackend for StatsRenderer {
  fn setup_texture(&mut self, texture: &Texture) {
    self.textures_up += 1;
    self.texture_bytes += texture.data.len();
  }

  fn teardown_texture(&mut self, _id: SimpleIdentity) {
    self.textures_down += 1;
  }

  fn setup_drawable(&mut self, _drawable: &Drawable) {
    self.drawables_up += 1;
  }

  fn teardown_drawable(&mut self, _id: SimpleIdentity) {
    self.drawables_down += 1;
  }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Position along the path; height is interpolated geometrically so the zoom
/// rate stays constant.
fn camera_view(camera: &CameraPath, t: f64) -> ViewState {
  let lerp = |a: f64, b: f64| a + (b - a) * t;
  let pos = DVec2::new(lerp(camera.start[0], camera.end[0]), lerp(camera.start[1], camera.end[1]));
  let height = camera.start_height * (camera.end_height / camera.start_height).powf(t);
  let fov = camera.fov_deg.to_radians();
  let screen = DVec2::from(camera.screen);
  match camera.display {
    DisplaySurface::Globe => ViewState::globe_orbit(pos.x.to_radians(), pos.y.to_radians(), height, fov, screen),
    DisplaySurface::Flat => ViewState::flat_overhead(pos, height, fov, screen),
  }
}

fn step_t(step: usize, steps: usize) -> f64 {
  if steps <= 1 {
    1.0
  } else {
    step as f64 / (steps - 1) as f64
  }
}

fn main() -> Result<()> {
  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => {
      println!("Loading config from: {}", path.display());
      SimConfig::load(path)?
    }
    None => SimConfig::default(),
  };
  if let Some(steps) = args.steps {
    config.camera.steps = steps;
  }
  config.validate()?;

  let scene = Arc::new(Scene::new());
  let fetcher = SyntheticFetcher::new(&config.source);
  let counters = fetcher.counters();
  let source = UrlTemplateSource::new(&config.source.template, config.source.min_zoom, config.source.max_zoom);
  let loader = QuadTileLoader::new(
    config.loader.clone(),
    Arc::new(source),
    Box::new(fetcher),
    Arc::new(ImageInterpreter::new()),
    &scene,
  )
  .context("Failed to create tile loader")?;
  let loader = Arc::new(Mutex::new(loader));

  let mut controller =
    QuadSamplingController::new(config.sampling.clone(), config.camera.display).with_budget(config.budget);
  controller.add_builder(loader.clone());
  if args.placeholders {
    controller.add_builder(Arc::new(Mutex::new(TileGeometryBuilder::new().with_draw_priority(0))));
  }

  println!(
    "Flying {} steps over a {:?} display, zoom {}..={}",
    config.camera.steps, config.camera.display, config.sampling.min_zoom, config.sampling.max_zoom
  );

  let start = Instant::now();
  let mut renderer = StatsRenderer::default();
  if args.layer {
    run_layered(&args, &config, controller, &scene, &loader, &mut renderer)?;
  } else {
    run_inline(&args, &config, controller, &scene, &loader, &mut renderer)?;
  }

  print_summary(&loader, &counters, &scene, &renderer);
  println!("Elapsed: {:.1} ms", start.elapsed().as_secs_f64() * 1000.0);

  anyhow::ensure!(
    scene.drawable_count() == 0 && scene.texture_count() == 0,
    "{} drawables and {} textures survived shutdown",
    scene.drawable_count(),
    scene.texture_count()
  );
  println!("\nDone! Scene empty after shutdown.");
  Ok(())
}

/// Show the next frame of every animated tile.
fn advance_frame(loader: &Mutex<QuadTileLoader>, scene: &Scene, step: usize) {
  let mut loader = lock(loader);
  let frames = loader.config().num_frames;
  if frames > 1 {
    let mut changes = ChangeSet::new();
    loader.set_current_frame(step % frames, &mut changes);
    scene.add_change_requests(changes);
  }
}

fn run_inline(
  args: &Args,
  config: &SimConfig,
  mut controller: QuadSamplingController,
  scene: &Scene,
  loader: &Mutex<QuadTileLoader>,
  renderer: &mut StatsRenderer,
) -> Result<()> {
  let steps = config.camera.steps;
  for step in 0..steps {
    let view = camera_view(&config.camera, step_t(step, steps));
    let pass = controller.update_view(&view, scene);
    if args.reload_at == Some(step) {
      lock(loader).reload();
      println!("Reloaded after step {step}");
    }
    advance_frame(loader, scene, step);

    for _ in 0..config.camera.ticks_per_step {
      controller.tick(scene);
      scene.process_changes(renderer, Some(&view), scene.current_time());
      std::thread::sleep(Duration::from_millis(1));
    }

    if args.verbose {
      let stats = pass.unwrap_or_default();
      println!(
        "  step {:>3}: {:>4} wanted  +{:<4} -{:<4} ~{:<3} deferred {}/{}  {:>6} us",
        step,
        controller.loaded_count(),
        stats.added,
        stats.removed,
        stats.updated,
        stats.deferred_adds,
        stats.deferred_removes,
        stats.pass_us
      );
    }
  }

  // Let in-flight tiles land. Failed frames retry on every pass.
  let view = camera_view(&config.camera, 1.0);
  let deadline = Instant::now() + Duration::from_secs(10);
  loop {
    let frames = lock(loader).frame_stats();
    if frames.in_flight() == 0 && frames.failed() == 0 && !controller.last_stats().has_deferred() {
      break;
    }
    if Instant::now() > deadline {
      println!("Timed out waiting for tiles to settle");
      break;
    }
    controller.force_refresh();
    controller.update_view(&view, scene);
    controller.tick(scene);
    scene.process_changes(renderer, Some(&view), scene.current_time());
    std::thread::sleep(Duration::from_millis(2));
  }

  let mut levels: BTreeMap<i32, usize> = BTreeMap::new();
  for ident in controller.loaded_tiles() {
    *levels.entry(ident.level).or_default() += 1;
  }
  println!("\nWanted tiles per level at the end of the flight:");
  for (level, count) in &levels {
    println!("  level {level:>2}: {count}");
  }
  print_loaded(loader, scene);

  controller.shutdown(scene);
  scene.process_changes(renderer, None, f64::INFINITY);
  Ok(())
}

fn run_layered(
  args: &Args,
  config: &SimConfig,
  controller: QuadSamplingController,
  scene: &Arc<Scene>,
  loader: &Mutex<QuadTileLoader>,
  renderer: &mut StatsRenderer,
) -> Result<()> {
  let layer_config = LayerConfig::default();
  let layer = QuadDisplayLayer::spawn(controller, scene.clone(), layer_config)?;
  let step_time = layer_config.tick_interval * config.camera.ticks_per_step.max(1) as u32;

  let steps = config.camera.steps;
  for step in 0..steps {
    let view = camera_view(&config.camera, step_t(step, steps));
    layer.update_view(&view);
    if args.reload_at == Some(step) {
      lock(loader).reload();
      println!("Reloaded after step {step}");
    }
    advance_frame(loader, scene, step);

    let until = Instant::now() + step_time;
    while Instant::now() < until {
      scene.process_changes(renderer, Some(&view), scene.current_time());
      std::thread::sleep(Duration::from_millis(1));
    }
  }

  let view = camera_view(&config.camera, 1.0);
  let deadline = Instant::now() + Duration::from_secs(10);
  loop {
    scene.process_changes(renderer, Some(&view), scene.current_time());
    let frames = lock(loader).frame_stats();
    if frames.in_flight() == 0 && frames.failed() == 0 {
      break;
    }
    if Instant::now() > deadline {
      println!("Timed out waiting for tiles to settle");
      break;
    }
    if frames.failed() > 0 {
      layer.force_refresh();
    }
    std::thread::sleep(Duration::from_millis(2));
  }

  let metrics = layer.metrics();
  println!("\nLayer thread:");
  println!("  passes: {}  ticks: {}", metrics.total_passes, metrics.total_ticks);
  println!(
    "  avg pass: {:.1} us  avg tick: {:.1} us",
    metrics.avg_pass_timing_us(),
    metrics.avg_tick_timing_us()
  );
  if let Some(peak) = metrics.pass_timings.peak_us() {
    println!("  slowest recent pass: {peak} us");
  }
  if let Some(level) = metrics.deepest_level() {
    println!("  deepest level: {level}  tiles: {}", metrics.total_tiles());
  }
  print_loaded(loader, scene);

  layer.shutdown();
  scene.process_changes(renderer, None, f64::INFINITY);
  Ok(())
}

fn print_loaded(loader: &Mutex<QuadTileLoader>, scene: &Scene) {
  let loader = lock(loader);
  let frames = loader.frame_stats();
  println!(
    "Loader: {} tiles, {} frames loaded, generation {}",
    loader.tile_count(),
    frames.loaded_frames(),
    loader.generation()
  );
  println!(
    "Scene before shutdown: {} drawables, {} textures",
    scene.drawable_count(),
    scene.texture_count()
  );
}

fn print_summary(loader: &Mutex<QuadTileLoader>, counters: &FetchCounters, scene: &Scene, renderer: &StatsRenderer) {
  use std::sync::atomic::Ordering;

  let stats = lock(loader).stats();
  println!("\nFetches:");
  println!("  started:   {}", stats.fetches_started);
  println!("  served:    {}", counters.served.load(Ordering::Relaxed));
  println!("  failed:    {}", counters.failed.load(Ordering::Relaxed));
  println!("  cancelled: {}", counters.cancelled.load(Ordering::Relaxed));
  println!("Merges:");
  println!("  merged:    {}", stats.merged);
  println!("  discarded: {}", stats.discarded);
  println!("  failed:    {}", stats.failed);
  println!("Renderer:");
  println!(
    "  textures:  {} up, {} down, {:.2} MiB uploaded",
    renderer.textures_up,
    renderer.textures_down,
    renderer.texture_bytes as f64 / 1_048_576.0
  );
  println!("  drawables: {} up, {} down", renderer.drawables_up, renderer.drawables_down);
  println!(
    "Scene after shutdown: {} drawables, {} textures, {} queued",
    scene.drawable_count(),
    scene.texture_count(),
    scene.pending_count()
  );
}
