use std::sync::{Arc, Mutex};

use glam::DVec2;

use super::*;
use crate::coord::{CoordSystemKind, DisplaySurface, FlatCoordSystem, Mbr};
use crate::quadtree::{EdgeMatch, QuadSamplingController, SamplingParams};
use crate::scene::{NullRenderer, Scene};
use crate::test_utils::flat_view;
use crate::view::ViewState;

fn flat_params() -> SamplingParams {
  SamplingParams {
    coord_sys: Some(CoordSystemKind::Flat(FlatCoordSystem {
      bounds: Mbr::new(DVec2::ZERO, DVec2::new(1.0, 1.0)),
    })),
    min_zoom: 0,
    max_zoom: 6,
    max_tiles: 10_000,
    min_importance: 96.0 * 96.0,
    tessellation_x: 4,
    tessellation_y: 4,
    ..Default::default()
  }
}

fn apply(scene: &Scene) {
  scene.process_changes(&mut NullRenderer, None, f64::INFINITY);
}

#[test]
fn test_one_drawable_per_loaded_tile() {
  let scene = Scene::new();
  let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new()));
  controller.add_builder(builder.clone());

  controller.update_view(&flat_view(DVec2::new(0.2, 0.1), 0.5), &scene);
  apply(&scene);

  let geometry = builder.lock().expect("lock");
  assert!(controller.loaded_count() > 1);
  assert_eq!(geometry.tile_count(), controller.loaded_count());
  assert_eq!(scene.drawable_count(), controller.loaded_count());
  for ident in controller.loaded_tiles() {
    let id = geometry.drawable_for(&ident).expect("drawable for loaded tile");
    assert!(scene.has_drawable(id));
  }
}

#[test]
fn test_zoom_out_removes_drawables() {
  let scene = Scene::new();
  let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new()));
  controller.add_builder(builder.clone());

  controller.update_view(&flat_view(DVec2::ZERO, 0.3), &scene);
  apply(&scene);
  let close = scene.drawable_count();

  controller.update_view(&flat_view(DVec2::ZERO, 4.0), &scene);
  apply(&scene);

  assert!(scene.drawable_count() < close);
  assert_eq!(scene.drawable_count(), controller.loaded_count());
  assert_eq!(builder.lock().expect("lock").tile_count(), controller.loaded_count());
}

#[test]
fn test_edge_update_swaps_drawable() {
  let scene = Scene::new();
  let mut params = flat_params();
  params.edge_matching = true;
  params.max_zoom = 1;
  let mut controller = QuadSamplingController::new(params, DisplaySurface::Flat);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new()));
  controller.add_builder(builder.clone());

  let root = QuadTreeIdentifier::new(0, 0, 0);
  let child = QuadTreeIdentifier::new(0, 0, 1);
  let batch = |to_add: Vec<TileBuildRequest>, to_update: Vec<TileBuildRequest>| TileBatch {
    params: controller.params().clone(),
    display: DisplaySurface::Flat,
    to_add,
    to_update,
    to_remove: Vec::new(),
    poles_to_add: Default::default(),
    poles_to_remove: Default::default(),
    loaded: Default::default(),
  };
  let request = |ident, edges| TileBuildRequest {
    ident,
    importance: 1.0,
    edges,
  };

  let mut geometry = builder.lock().expect("lock");
  let mut changes = ChangeSet::new();
  geometry.builder_update(
    &batch(vec![request(root, EdgeMatch::NONE), request(child, EdgeMatch::NONE)], Vec::new()),
    &mut changes,
  );
  scene.add_change_requests(changes);
  apply(&scene);
  let before = geometry.drawable_for(&child).expect("child drawable");
  let plain_vertices = scene.with_drawable(before, |d| d.vertex_count()).expect("in scene");

  let mut changes = ChangeSet::new();
  geometry.builder_update(&batch(Vec::new(), vec![request(child, EdgeMatch::RIGHT)]), &mut changes);
  // Remove then add, queued together.
  assert_eq!(changes.len(), 2);
  assert_eq!(changes[0].name(), "rem_drawable");
  assert_eq!(changes[1].name(), "add_drawable");
  scene.add_change_requests(changes);
  apply(&scene);

  let after = geometry.drawable_for(&child).expect("child drawable");
  assert_ne!(before, after);
  assert!(!scene.has_drawable(before));
  let skirted_vertices = scene.with_drawable(after, |d| d.vertex_count()).expect("in scene");
  assert_eq!(skirted_vertices, plain_vertices + 5);
}

#[test]
fn test_pole_caps_on_globe() {
  let scene = Scene::new();
  let params = SamplingParams {
    cover_poles: true,
    min_importance: 1.0,
    max_zoom: 1,
    ..Default::default()
  };
  let mut controller = QuadSamplingController::new(params, DisplaySurface::Globe);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new()));
  controller.add_builder(builder.clone());

  let view = ViewState::globe_orbit(0.0, 0.0, 3.0, std::f64::consts::FRAC_PI_3, DVec2::new(512.0, 512.0));
  controller.update_view(&view, &scene);
  apply(&scene);

  let geometry = builder.lock().expect("lock");
  let north = geometry.pole_drawable(Pole::North).expect("north cap");
  let south = geometry.pole_drawable(Pole::South).expect("south cap");
  assert!(scene.has_drawable(north));
  assert!(scene.has_drawable(south));
  assert_eq!(scene.drawable_count(), geometry.tile_count() + 2);
}

#[test]
fn test_detach_removes_everything() {
  let scene = Scene::new();
  let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new()));
  controller.add_builder(builder.clone());

  controller.update_view(&flat_view(DVec2::ZERO, 0.5), &scene);
  apply(&scene);
  assert!(scene.drawable_count() > 0);

  controller.shutdown(&scene);
  apply(&scene);
  assert_eq!(scene.drawable_count(), 0);
  assert_eq!(builder.lock().expect("lock").tile_count(), 0);
}

#[test]
fn test_finer_tiles_draw_above_coarser() {
  let scene = Scene::new();
  let mut controller = QuadSamplingController::new(flat_params(), DisplaySurface::Flat);
  let builder = Arc::new(Mutex::new(TileGeometryBuilder::new().with_draw_priority(100)));
  controller.add_builder(builder.clone());

  controller.update_view(&flat_view(DVec2::ZERO, 0.5), &scene);
  apply(&scene);

  let geometry = builder.lock().expect("lock");
  for ident in controller.loaded_tiles() {
    let id = geometry.drawable_for(&ident).expect("drawable");
    let priority = scene.with_drawable(id, |d| d.draw_priority).expect("in scene");
    assert_eq!(priority, 100 + ident.level);
  }
}
