use super::*;

fn screen() -> DVec2 {
  DVec2::new(1024.0, 768.0)
}

#[test]
fn test_eye_position_recovered_from_view_matrix() {
  let eye = DVec3::new(0.0, 0.0, 3.0);
  let view = ViewState::look_at(eye, DVec3::ZERO, DVec3::Y, 1.0, screen(), 0.1, 10.0);

  assert!((view.eye_world - eye).length() < 1e-9);
  assert!((view.eye_pos - eye).length() < 1e-9);
}

#[test]
fn test_model_matrix_moves_eye_into_model_space() {
  let eye = DVec3::new(0.0, 0.0, 3.0);
  let base = ViewState::look_at(eye, DVec3::ZERO, DVec3::Y, 1.0, screen(), 0.1, 10.0);
  let model = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
  let view = ViewState::new(model, base.view, base.projection, 0.1, 10.0, screen());

  assert!((view.eye_world - eye).length() < 1e-9);
  assert!((view.eye_pos - DVec3::new(-1.0, 0.0, 3.0)).length() < 1e-9);
}

#[test]
fn test_target_projects_to_screen_center() {
  let view = ViewState::globe_orbit(0.3, 0.2, 2.0, 0.8, screen());
  let clip = view.to_clip(DVec3::ZERO);
  assert!(clip.w > 0.0);
  let px = view.clip_to_screen(clip);
  assert!((px - screen() * 0.5).length() < 1e-6, "center at {:?}", px);
}

#[test]
fn test_frustum_corners_lie_on_near_and_far_planes() {
  let eye = DVec3::new(0.0, 0.0, 5.0);
  let view = ViewState::look_at(eye, DVec3::ZERO, DVec3::Y, 1.0, screen(), 1.0, 4.0);

  for corner in &view.frustum_corners[0..4] {
    assert!((corner.z - 4.0).abs() < 1e-6, "near corner {:?}", corner);
  }
  for corner in &view.frustum_corners[4..8] {
    assert!((corner.z - 1.0).abs() < 1e-6, "far corner {:?}", corner);
  }
}

#[test]
fn test_equal_cameras_compare_equal() {
  let a = ViewState::globe_orbit(0.1, 0.1, 1.0, 0.8, screen());
  let b = ViewState::globe_orbit(0.1, 0.1, 1.0, 0.8, screen());
  let c = ViewState::globe_orbit(0.1, 0.1, 0.9, 0.8, screen());

  assert_eq!(a, b);
  assert_ne!(a, c);
}

#[test]
fn test_orbit_over_pole_uses_alternate_up() {
  let view = ViewState::globe_orbit(0.0, std::f64::consts::FRAC_PI_2, 1.0, 0.8, screen());
  assert!(view.full_matrix.is_finite());
  assert!((view.eye_pos - DVec3::new(0.0, 0.0, 2.0)).length() < 1e-9);
}
