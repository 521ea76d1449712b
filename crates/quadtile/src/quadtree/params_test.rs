use super::*;
use crate::coord::FlatCoordSystem;
use glam::DVec2;

#[test]
fn test_default_params_are_valid() {
  let params = SamplingParams::default();
  assert!(params.validate().is_ok());
  assert_eq!(params.coord_sys, Some(CoordSystemKind::SphericalMercator));
}

#[test]
fn test_missing_coord_sys_is_error() {
  let params = SamplingParams {
    coord_sys: None,
    ..Default::default()
  };
  assert_eq!(params.validate(), Err(QuadTileError::MissingCoordSystem));
  assert!(params.bounds().is_none());
}

#[test]
fn test_degenerate_bounds_is_error() {
  let params = SamplingParams {
    coord_sys: Some(CoordSystemKind::Flat(FlatCoordSystem {
      bounds: Mbr::new(DVec2::ZERO, DVec2::new(10.0, 0.0)),
    })),
    ..Default::default()
  };
  assert_eq!(params.validate(), Err(QuadTileError::MissingCoordSystem));
}

#[test]
fn test_bad_zoom_range_is_error() {
  let params = SamplingParams {
    min_zoom: 5,
    max_zoom: 3,
    ..Default::default()
  };
  assert_eq!(
    params.validate(),
    Err(QuadTileError::InvalidZoomRange { min: 5, max: 3 })
  );
}

#[test]
fn test_zero_tessellation_and_tiles_are_errors() {
  let params = SamplingParams {
    tessellation_y: 0,
    ..Default::default()
  };
  assert!(matches!(
    params.validate(),
    Err(QuadTileError::InvalidTessellation { .. })
  ));

  let params = SamplingParams {
    max_tiles: 0,
    ..Default::default()
  };
  assert_eq!(params.validate(), Err(QuadTileError::InvalidMaxTiles));
}

#[test]
fn test_importance_fallbacks() {
  let mut params = SamplingParams {
    min_importance: 100.0,
    min_importance_top: 10.0,
    ..Default::default()
  };
  assert_eq!(params.importance_for_level(0), Some(10.0));
  assert_eq!(params.importance_for_level(3), Some(100.0));

  params.set_importance_level(3, 500.0);
  assert_eq!(params.importance_for_level(3), Some(500.0));
  // Levels filled in by the resize keep the global value.
  assert_eq!(params.importance_for_level(2), Some(100.0));
  // The top override still wins over a filled entry.
  assert_eq!(params.importance_for_level(0), Some(10.0));

  params.set_importance_level(4, -1.0);
  assert_eq!(params.importance_for_level(4), None);
}

#[test]
fn test_structural_equality() {
  let a = SamplingParams::default();
  let mut b = SamplingParams::default();
  assert_eq!(a, b);

  b.coord_sys = Some(CoordSystemKind::PlateCarree);
  assert_ne!(a, b);

  let mut c = SamplingParams::default();
  c.set_importance_level(2, 1.0);
  assert_ne!(a, c);
}
